// Vulkan implementation of GraphicsBackend
//
// FRAME TIMELINE:
// ┌──────────────────────────────────────────────────────────────────────┐
// │  wait_fence ─> acquire_image ─> record ─> submit ─> present ─> next  │
// │                                                                      │
// │  (CPU waits    (display       (barriers, (GPU      (display          │
// │   for slot)     backpressure)  draw)      works)    shows)           │
// └──────────────────────────────────────────────────────────────────────┘

use anyhow::Result;
use ash::vk;
use std::path::PathBuf;
use std::sync::Arc;

use super::buffer::VertexBuffer;
use super::commands::CommandQueue;
use super::pipeline::TrianglePipeline;
use super::shader::ShaderLibrary;
use super::swapchain::COLOR_SUBRESOURCE_RANGE;
use super::window::{VulkanWindow, WindowSettings};
use super::{GraphicsBackend, VulkanDevice, WindowEvents};
use crate::config::Config;
use crate::error::FrameFailure;
use crate::geometry::{Vertex, VertexLayout};
use crate::stats::FrameRate;

/// One acquired swapchain image
#[derive(Debug, Clone, Copy)]
pub struct Drawable {
    pub image_index: u32,
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub extent: vk::Extent2D,
}

/// Command buffer being recorded with dynamic rendering open on `image`
pub struct Encoder {
    command_buffer: vk::CommandBuffer,
    image: vk::Image,
}

pub struct VulkanBackend {
    app_name: String,
    enable_validation: bool,
    window: WindowSettings,
    shader_dir: PathBuf,
    clear_color: [f32; 4],
    frames_in_flight: usize,
}

impl VulkanBackend {
    pub fn new(config: &Config) -> Self {
        Self {
            app_name: config.window.title.clone(),
            // Enable validation layers based on config (and debug build)
            enable_validation: cfg!(debug_assertions) && config.debug.validation_layers,
            window: WindowSettings {
                title: config.window.title.clone(),
                width: config.window.width,
                height: config.window.height,
                fullscreen: config.window.fullscreen,
                present_mode: config.present_mode(),
            },
            shader_dir: config.graphics.shader_dir.clone(),
            clear_color: config.graphics.clear_color,
            frames_in_flight: config.graphics.frames_in_flight(),
        }
    }
}

fn layout_barrier(
    image: vk::Image,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
    src_access: vk::AccessFlags,
    dst_access: vk::AccessFlags,
) -> vk::ImageMemoryBarrier {
    vk::ImageMemoryBarrier::builder()
        .src_access_mask(src_access)
        .dst_access_mask(dst_access)
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(COLOR_SUBRESOURCE_RANGE)
        .build()
}

fn rejected(what: &str, e: vk::Result) -> FrameFailure {
    FrameFailure::SubmissionRejected(format!("{what}: {e}"))
}

impl GraphicsBackend for VulkanBackend {
    type Device = Arc<VulkanDevice>;
    type Window = VulkanWindow;
    type ShaderLibrary = ShaderLibrary;
    type VertexBuffer = VertexBuffer;
    type Pipeline = TrianglePipeline;
    type CommandQueue = CommandQueue;
    type Drawable = Drawable;
    type Encoder = Encoder;

    fn create_device(&mut self) -> Result<Self::Device> {
        VulkanDevice::new(&self.app_name, self.enable_validation)
    }

    fn create_window(&mut self, device: &Self::Device) -> Result<Self::Window> {
        VulkanWindow::open(device, &self.window)
    }

    fn create_shader_library(&mut self, device: &Self::Device) -> Result<Self::ShaderLibrary> {
        ShaderLibrary::load(device, &self.shader_dir)
    }

    fn create_vertex_buffer(
        &mut self,
        device: &Self::Device,
        vertices: &[Vertex],
    ) -> Result<Self::VertexBuffer> {
        VertexBuffer::new(device, vertices)
    }

    fn create_pipeline(
        &mut self,
        device: &Self::Device,
        window: &Self::Window,
        shaders: &Self::ShaderLibrary,
        layout: &VertexLayout,
    ) -> Result<Self::Pipeline> {
        TrianglePipeline::new(device, shaders, layout, window.surface_format.format)
    }

    fn create_command_queue(&mut self, device: &Self::Device) -> Result<Self::CommandQueue> {
        CommandQueue::new(device, self.frames_in_flight)
    }

    fn poll_events(&mut self, window: &mut Self::Window) -> WindowEvents {
        window.poll()
    }

    fn acquire_drawable(
        &mut self,
        device: &Self::Device,
        window: &mut Self::Window,
        queue: &mut Self::CommandQueue,
    ) -> Result<Self::Drawable, FrameFailure> {
        if window.needs_resize || window.swapchain.is_none() {
            window.recreate_swapchain(device).map_err(|e| {
                FrameFailure::DrawableUnavailable(format!("swapchain recreation failed: {e:#}"))
            })?;
        }

        let Some(swapchain) = window.swapchain.as_ref() else {
            return Err(FrameFailure::DrawableUnavailable(
                "window has no visible area".to_string(),
            ));
        };

        queue.wait_for_current(&device.device).map_err(|e| {
            FrameFailure::DrawableUnavailable(format!("waiting for frame slot: {e}"))
        })?;

        let slot = queue.current();
        let (image_index, suboptimal) =
            match swapchain.acquire_next_image(u64::MAX, slot.image_available) {
                Ok(acquired) => acquired,
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                    window.needs_resize = true;
                    return Err(FrameFailure::DrawableUnavailable(
                        "swapchain out of date".to_string(),
                    ));
                }
                Err(e) => return Err(FrameFailure::DrawableUnavailable(e.to_string())),
            };

        // Still usable this frame; rebuild before the next one
        if suboptimal {
            window.needs_resize = true;
        }

        let index = image_index as usize;
        Ok(Drawable {
            image_index,
            image: swapchain.images[index],
            view: swapchain.image_views[index],
            extent: swapchain.extent,
        })
    }

    fn begin_encoding(
        &mut self,
        device: &Self::Device,
        queue: &mut Self::CommandQueue,
        drawable: &Self::Drawable,
    ) -> Result<Self::Encoder, FrameFailure> {
        let device = &device.device;
        let cmd = queue.current().command_buffer;

        unsafe {
            device
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
                .map_err(|e| rejected("resetting command buffer", e))?;

            let begin_info = vk::CommandBufferBeginInfo::builder()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            device
                .begin_command_buffer(cmd, &begin_info)
                .map_err(|e| rejected("beginning command buffer", e))?;

            // UNDEFINED -> COLOR_ATTACHMENT: previous contents are cleared anyway
            let to_attachment = layout_barrier(
                drawable.image,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                vk::AccessFlags::empty(),
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            );
            device.cmd_pipeline_barrier(
                cmd,
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_attachment],
            );

            let color_attachment = vk::RenderingAttachmentInfo::builder()
                .image_view(drawable.view)
                .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .clear_value(vk::ClearValue {
                    color: vk::ClearColorValue {
                        float32: self.clear_color,
                    },
                })
                .build();
            let color_attachments = [color_attachment];

            let render_area = vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: drawable.extent,
            };
            let rendering_info = vk::RenderingInfo::builder()
                .render_area(render_area)
                .layer_count(1)
                .color_attachments(&color_attachments);
            device.cmd_begin_rendering(cmd, &rendering_info);

            let viewport = vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: drawable.extent.width as f32,
                height: drawable.extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            };
            device.cmd_set_viewport(cmd, 0, &[viewport]);
            device.cmd_set_scissor(cmd, 0, &[render_area]);
        }

        Ok(Encoder {
            command_buffer: cmd,
            image: drawable.image,
        })
    }

    fn encode_draw(
        &mut self,
        device: &Self::Device,
        encoder: &mut Self::Encoder,
        pipeline: &Self::Pipeline,
        vertex_buffer: &Self::VertexBuffer,
        vertex_count: u32,
    ) {
        let device = &device.device;
        let cmd = encoder.command_buffer;
        // Never read past the uploaded vertices
        let vertex_count = vertex_count.min(vertex_buffer.vertex_count);

        unsafe {
            device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline.pipeline);
            device.cmd_bind_vertex_buffers(cmd, 0, &[vertex_buffer.buffer], &[0]);
            device.cmd_draw(cmd, vertex_count, 1, 0, 0);
        }
    }

    fn submit(
        &mut self,
        device: &Self::Device,
        queue: &mut Self::CommandQueue,
        encoder: Self::Encoder,
    ) -> Result<(), FrameFailure> {
        let slot = queue.current();
        let cmd = encoder.command_buffer;
        let device = &device.device;

        unsafe {
            device.cmd_end_rendering(cmd);

            // COLOR_ATTACHMENT -> PRESENT_SRC for the presentation engine
            let to_present = layout_barrier(
                encoder.image,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                vk::ImageLayout::PRESENT_SRC_KHR,
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
                vk::AccessFlags::empty(),
            );
            device.cmd_pipeline_barrier(
                cmd,
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_present],
            );

            device
                .end_command_buffer(cmd)
                .map_err(|e| rejected("ending command buffer", e))?;

            let wait_semaphores = [slot.image_available];
            let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
            let signal_semaphores = [slot.render_finished];
            let command_buffers = [cmd];

            let submit_info = vk::SubmitInfo::builder()
                .wait_semaphores(&wait_semaphores)
                .wait_dst_stage_mask(&wait_stages)
                .command_buffers(&command_buffers)
                .signal_semaphores(&signal_semaphores);

            // Reset only once submission is certain to be attempted
            device
                .reset_fences(&[slot.in_flight])
                .map_err(|e| rejected("resetting frame fence", e))?;
            device
                .queue_submit(queue.queue, &[submit_info.build()], slot.in_flight)
                .map_err(|e| rejected("queue submit", e))?;
        }

        Ok(())
    }

    fn present(
        &mut self,
        _device: &Self::Device,
        window: &mut Self::Window,
        queue: &mut Self::CommandQueue,
        drawable: Self::Drawable,
    ) -> Result<(), FrameFailure> {
        let render_finished = queue.current().render_finished;
        queue.advance();

        let Some(swapchain) = window.swapchain.as_ref() else {
            return Err(FrameFailure::PresentationFailed(
                "swapchain was released".to_string(),
            ));
        };

        match swapchain.present(queue.queue, drawable.image_index, &[render_finished]) {
            Ok(stale) => {
                if stale {
                    window.needs_resize = true;
                }
                Ok(())
            }
            Err(e) => {
                window.needs_resize = true;
                Err(FrameFailure::PresentationFailed(e.to_string()))
            }
        }
    }

    fn abandon_frame(
        &mut self,
        device: &Self::Device,
        window: &mut Self::Window,
        queue: &mut Self::CommandQueue,
        _drawable: Self::Drawable,
    ) {
        // The image stays acquired until the swapchain is rebuilt
        window.needs_resize = true;

        if let Err(e) = queue.rearm_current(device) {
            log::warn!("Could not re-arm frame slot ({:#}), recreating its sync objects", e);
            if let Err(e) = queue.recreate_current(device) {
                log::error!("Failed to recreate frame synchronization: {:#}", e);
            }
        }
    }

    fn report_frame_rate(&mut self, window: &mut Self::Window, rate: FrameRate) {
        window.show_frame_rate(rate.fps, rate.frame_time_ms);
    }

    fn wait_idle(&mut self, device: &Self::Device) {
        if let Err(e) = device.wait_idle() {
            log::warn!("Device did not go idle before cleanup: {:#}", e);
        }
    }

    fn release_command_queue(&mut self, device: &Self::Device, mut queue: Self::CommandQueue) {
        queue.destroy(device);
    }

    fn release_pipeline(&mut self, device: &Self::Device, pipeline: Self::Pipeline) {
        pipeline.destroy(device);
    }

    fn release_vertex_buffer(&mut self, device: &Self::Device, buffer: Self::VertexBuffer) {
        buffer.destroy(device);
    }

    fn release_shader_library(&mut self, device: &Self::Device, shaders: Self::ShaderLibrary) {
        shaders.destroy(device);
    }

    fn release_window(&mut self, _device: &Self::Device, window: Self::Window) {
        window.destroy();
    }

    fn release_device(&mut self, device: Self::Device) {
        if Arc::strong_count(&device) > 1 {
            log::warn!("Device still referenced at release; destruction deferred");
        }
        drop(device);
    }
}
