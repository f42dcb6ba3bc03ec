// Backend module - Vulkan abstraction layer
//
// Thin RAII wrappers around ash. Every component holds an Arc<VulkanDevice>
// and destroys its own handles on drop, so the device always goes last.

pub mod buffer;
pub mod capabilities;
pub mod commands;
pub mod debug;
pub mod device;
pub mod frame;
pub mod pipeline;
pub mod shader;
pub mod swapchain;
pub mod sync;

pub use buffer::{Mesh, Vertex};
pub use commands::CommandRecorder;
pub use device::VulkanDevice;
pub use frame::{FrameLoop, FrameTarget, MAX_FRAMES_IN_FLIGHT};
pub use pipeline::TrianglePipeline;
pub use swapchain::Swapchain;
pub use sync::FrameSlot;
