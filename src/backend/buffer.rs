// Vertex buffers
//
// Host-visible (CpuToGpu) memory from gpu-allocator, filled once at creation.
// The triangle pipeline takes its geometry from the vertex shader, so this is
// only needed by pipelines that declare vertex input.

use super::VulkanDevice;
use crate::error::{Error, Result, VkResultExt};
use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use std::mem::{offset_of, size_of};
use std::sync::Arc;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub color: Vec3,
}

impl Vertex {
    pub const fn new(position: Vec3, color: Vec3) -> Self {
        Self { position, color }
    }
}

/// How `Vertex` is laid out for the input assembler.
pub struct VertexLayout;

impl VertexLayout {
    pub const BINDING: u32 = 0;

    pub fn binding() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: Self::BINDING,
            stride: size_of::<Vertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// location 0 = position, location 1 = color
    pub fn attributes() -> [vk::VertexInputAttributeDescription; 2] {
        [
            vk::VertexInputAttributeDescription {
                location: 0,
                binding: Self::BINDING,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: offset_of!(Vertex, position) as u32,
            },
            vk::VertexInputAttributeDescription {
                location: 1,
                binding: Self::BINDING,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: offset_of!(Vertex, color) as u32,
            },
        ]
    }
}

/// A vertex buffer with its vertices already uploaded.
pub struct Mesh {
    buffer: vk::Buffer,
    allocation: Option<Allocation>,
    vertex_count: u32,
    device: Arc<VulkanDevice>,
}

impl Mesh {
    pub fn new(device: Arc<VulkanDevice>, vertices: &[Vertex]) -> Result<Self> {
        if vertices.is_empty() {
            return Err(Error::renderer("Cannot create a mesh without vertices"));
        }

        let bytes: &[u8] = bytemuck::cast_slice(vertices);

        let buffer_info = vk::BufferCreateInfo::builder()
            .size(bytes.len() as vk::DeviceSize)
            .usage(vk::BufferUsageFlags::VERTEX_BUFFER)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.device.create_buffer(&buffer_info, None) }
            .renderer_context("Failed to create vertex buffer")?;

        // From here on Drop cleans up whatever exists.
        let mut mesh = Self {
            buffer,
            allocation: None,
            vertex_count: vertices.len() as u32,
            device,
        };

        let requirements = unsafe { mesh.device.device.get_buffer_memory_requirements(buffer) };

        let allocation = mesh
            .device
            .allocator()
            .lock()
            .allocate(&AllocationCreateDesc {
                name: "mesh vertices",
                requirements,
                location: MemoryLocation::CpuToGpu,
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| Error::renderer(format!("Failed to allocate vertex memory: {e}")))?;
        let allocation = mesh.allocation.insert(allocation);

        unsafe {
            mesh.device
                .device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
        }
        .renderer_context("Failed to bind vertex buffer memory")?;

        let mapped = allocation
            .mapped_slice_mut()
            .ok_or_else(|| Error::renderer("Vertex memory is not host-mapped"))?;
        mapped[..bytes.len()].copy_from_slice(bytes);

        log::debug!("Uploaded {} vertices ({} bytes)", mesh.vertex_count, bytes.len());
        Ok(mesh)
    }

    pub fn buffer(&self) -> vk::Buffer {
        self.buffer
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }
}

impl Drop for Mesh {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            if let Err(e) = self.device.allocator().lock().free(allocation) {
                log::error!("Failed to free vertex memory: {e}");
            }
        }
        unsafe { self.device.device.destroy_buffer(self.buffer, None) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_is_two_packed_vec3s() {
        assert_eq!(size_of::<Vertex>(), 24);
        assert_eq!(VertexLayout::binding().stride, 24);
        assert_eq!(VertexLayout::binding().input_rate, vk::VertexInputRate::VERTEX);
    }

    #[test]
    fn attributes_point_at_position_then_color() {
        let [position, color] = VertexLayout::attributes();

        assert_eq!(position.location, 0);
        assert_eq!(position.offset, 0);
        assert_eq!(color.location, 1);
        assert_eq!(color.offset, 12);
        assert_eq!(color.format, vk::Format::R32G32B32_SFLOAT);
        assert_eq!(position.binding, VertexLayout::BINDING);
    }

    #[test]
    fn vertices_cast_to_raw_floats() {
        let vertices = [Vertex::new(Vec3::new(0.0, -0.4, 0.0), Vec3::X)];
        let floats: &[f32] = bytemuck::cast_slice(&vertices);

        assert_eq!(floats, &[0.0, -0.4, 0.0, 1.0, 0.0, 0.0]);
    }
}
