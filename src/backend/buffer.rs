// Vertex buffer backed by gpu-allocator
//
// The triangle never changes, so the buffer lives in host-visible memory
// and is written once through its persistent mapping.

use anyhow::{Context, Result};
use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;

use super::VulkanDevice;
use crate::geometry::{vertex_bytes, Vertex};

pub struct VertexBuffer {
    pub buffer: vk::Buffer,
    allocation: Allocation,
    pub vertex_count: u32,
}

impl VertexBuffer {
    pub fn new(device: &VulkanDevice, vertices: &[Vertex]) -> Result<Self> {
        let bytes = vertex_bytes(vertices);

        let buffer_info = vk::BufferCreateInfo::builder()
            .size(bytes.len() as vk::DeviceSize)
            .usage(vk::BufferUsageFlags::VERTEX_BUFFER)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe {
            device
                .device
                .create_buffer(&buffer_info, None)
                .context("Failed to create vertex buffer")?
        };

        match Self::allocate_and_fill(device, buffer, bytes) {
            Ok(allocation) => {
                log::debug!("Uploaded {} vertices ({} bytes)", vertices.len(), bytes.len());
                Ok(Self {
                    buffer,
                    allocation,
                    vertex_count: vertices.len() as u32,
                })
            }
            Err(e) => {
                unsafe { device.device.destroy_buffer(buffer, None) };
                Err(e)
            }
        }
    }

    fn allocate_and_fill(
        device: &VulkanDevice,
        buffer: vk::Buffer,
        bytes: &[u8],
    ) -> Result<Allocation> {
        let requirements = unsafe { device.device.get_buffer_memory_requirements(buffer) };

        let mut allocator = device.allocator().lock();
        let mut allocation = allocator
            .allocate(&AllocationCreateDesc {
                name: "triangle vertices",
                requirements,
                location: MemoryLocation::CpuToGpu,
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .context("Failed to allocate vertex buffer memory")?;

        let upload = match allocation.mapped_slice_mut() {
            Some(mapped) if mapped.len() >= bytes.len() => {
                mapped[..bytes.len()].copy_from_slice(bytes);
                unsafe {
                    device
                        .device
                        .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
                        .context("Failed to bind vertex buffer memory")
                }
            }
            _ => Err(anyhow::anyhow!("Vertex buffer memory is not host mapped")),
        };

        if let Err(e) = upload {
            let _ = allocator.free(allocation);
            return Err(e);
        }

        Ok(allocation)
    }

    pub fn destroy(self, device: &VulkanDevice) {
        unsafe { device.device.destroy_buffer(self.buffer, None) };
        if let Err(e) = device.allocator().lock().free(self.allocation) {
            log::warn!("Failed to free vertex buffer memory: {}", e);
        }
    }
}
