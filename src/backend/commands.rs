// Command queue: graphics queue + command pool + per-frame sync slots
//
// Each frame in flight owns one command buffer, the semaphores that order
// acquire -> render -> present on the GPU, and a fence the CPU waits on
// before reusing the slot.

use anyhow::{Context, Result};
use ash::prelude::VkResult;
use ash::vk;

use super::VulkanDevice;

pub struct FrameSlot {
    pub command_buffer: vk::CommandBuffer,
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    pub in_flight: vk::Fence,
}

impl FrameSlot {
    fn new(device: &VulkanDevice, command_buffer: vk::CommandBuffer) -> Result<Self> {
        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        // Signaled so the first wait on a fresh slot returns at once
        let fence_info = vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED);

        unsafe {
            Ok(Self {
                command_buffer,
                image_available: device.device.create_semaphore(&semaphore_info, None)?,
                render_finished: device.device.create_semaphore(&semaphore_info, None)?,
                in_flight: device.device.create_fence(&fence_info, None)?,
            })
        }
    }

    fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_semaphore(self.image_available, None);
            device.destroy_semaphore(self.render_finished, None);
            device.destroy_fence(self.in_flight, None);
        }
    }
}

pub struct CommandQueue {
    pub queue: vk::Queue,
    pool: vk::CommandPool,
    slots: Vec<FrameSlot>,
    current: usize,
}

impl CommandQueue {
    pub fn new(device: &VulkanDevice, frames_in_flight: usize) -> Result<Self> {
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(device.graphics_queue_family)
            // Buffers are re-recorded every frame
            .flags(
                vk::CommandPoolCreateFlags::TRANSIENT
                    | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            );

        let pool = unsafe { device.device.create_command_pool(&pool_info, None) }
            .context("Failed to create command pool")?;

        let mut queue = Self {
            queue: device.graphics_queue,
            pool,
            slots: Vec::with_capacity(frames_in_flight),
            current: 0,
        };

        if let Err(e) = queue.allocate_slots(device, frames_in_flight) {
            queue.destroy(device);
            return Err(e);
        }

        log::info!("Created command queue with {} frames in flight", frames_in_flight);
        Ok(queue)
    }

    fn allocate_slots(&mut self, device: &VulkanDevice, count: usize) -> Result<()> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count as u32);

        let command_buffers = unsafe { device.device.allocate_command_buffers(&alloc_info) }
            .context("Failed to allocate command buffers")?;

        for command_buffer in command_buffers {
            let slot = FrameSlot::new(device, command_buffer)
                .context("Failed to create frame synchronization")?;
            self.slots.push(slot);
        }
        Ok(())
    }

    pub fn current(&self) -> &FrameSlot {
        &self.slots[self.current]
    }

    /// Block until the GPU has finished the last frame that used this slot.
    pub fn wait_for_current(&self, device: &ash::Device) -> VkResult<()> {
        unsafe { device.wait_for_fences(&[self.current().in_flight], true, u64::MAX) }
    }

    /// Put the current slot back in its idle state after a frame that was
    /// acquired but never submitted: an empty batch consumes the pending
    /// image-available signal and signals the fence.
    pub fn rearm_current(&mut self, device: &VulkanDevice) -> Result<()> {
        let slot = &self.slots[self.current];
        let wait_semaphores = [slot.image_available];
        let wait_stages = [vk::PipelineStageFlags::ALL_COMMANDS];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages);

        unsafe {
            device
                .device
                .reset_fences(&[slot.in_flight])
                .context("Failed to reset frame fence")?;
            device
                .device
                .queue_submit(self.queue, &[submit_info.build()], slot.in_flight)
                .context("Failed to submit empty batch")?;
        }
        Ok(())
    }

    /// Replace the current slot's image-available semaphore and fence once
    /// the device is idle. The new fence starts signaled.
    pub fn recreate_current(&mut self, device: &VulkanDevice) -> Result<()> {
        device.wait_idle()?;

        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        let fence_info = vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED);
        let slot = &mut self.slots[self.current];

        unsafe {
            let image_available = device
                .device
                .create_semaphore(&semaphore_info, None)
                .context("Failed to create semaphore")?;
            let in_flight = match device.device.create_fence(&fence_info, None) {
                Ok(fence) => fence,
                Err(e) => {
                    device.device.destroy_semaphore(image_available, None);
                    return Err(e).context("Failed to create fence");
                }
            };

            device.device.destroy_semaphore(slot.image_available, None);
            device.device.destroy_fence(slot.in_flight, None);
            slot.image_available = image_available;
            slot.in_flight = in_flight;
        }
        Ok(())
    }

    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.slots.len();
    }

    pub fn destroy(&mut self, device: &VulkanDevice) {
        for slot in self.slots.drain(..) {
            slot.destroy(&device.device);
        }
        // Destroying the pool frees its command buffers
        unsafe { device.device.destroy_command_pool(self.pool, None) };
    }
}
