// vk-triangle: a minimal Vulkan renderer that draws one triangle.
//
// ┌──────────────────────────────────────────────────────────────────┐
// │  main: config, logging, collaborators                            │
// │    └── Renderer                                                  │
// │          └── VulkanDevice (instance, surface, queues, allocator) │
// │                └── Swapchain -> Pipeline -> Command buffers      │
// │                      └── FrameLoop (fences, semaphores)          │
// └──────────────────────────────────────────────────────────────────┘

pub mod backend;
pub mod config;
pub mod error;
pub mod fs;
pub mod renderer;
pub mod window;

pub use error::{Error, Result};
pub use renderer::Renderer;
