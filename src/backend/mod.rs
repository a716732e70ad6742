// Backend module - the seam between the engine and a graphics API
//
// `GraphicsBackend` is what the engine drives; the Vulkan types below are
// the production implementation of it.

pub mod buffer;
pub mod commands;
pub mod device;
pub mod pipeline;
pub mod shader;
pub mod swapchain;
pub mod vulkan;
pub mod window;

pub use device::VulkanDevice;
pub use swapchain::Swapchain;
pub use vulkan::VulkanBackend;

use anyhow::Result;

use crate::error::FrameFailure;
use crate::geometry::{Vertex, VertexLayout};
use crate::stats::FrameRate;

/// Window state observed while pumping platform events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowEvents {
    pub close_requested: bool,
    /// Zero-sized surface; nothing can be presented this iteration
    pub minimized: bool,
}

/// Capabilities the engine needs from a graphics API and windowing system.
///
/// Creation methods are called once each, in declaration order, and every
/// created handle is handed back to exactly one `release_*` call. Frame
/// methods are called in the order acquire, begin, draw, submit, present;
/// a frame that fails after acquire ends in `abandon_frame` instead.
pub trait GraphicsBackend {
    type Device;
    type Window;
    type ShaderLibrary;
    type VertexBuffer;
    type Pipeline;
    type CommandQueue;
    /// Presentable image for one frame
    type Drawable;
    /// Command buffer with an open render pass targeting a drawable
    type Encoder;

    fn create_device(&mut self) -> Result<Self::Device>;
    fn create_window(&mut self, device: &Self::Device) -> Result<Self::Window>;
    fn create_shader_library(&mut self, device: &Self::Device) -> Result<Self::ShaderLibrary>;
    fn create_vertex_buffer(
        &mut self,
        device: &Self::Device,
        vertices: &[Vertex],
    ) -> Result<Self::VertexBuffer>;
    fn create_pipeline(
        &mut self,
        device: &Self::Device,
        window: &Self::Window,
        shaders: &Self::ShaderLibrary,
        layout: &VertexLayout,
    ) -> Result<Self::Pipeline>;
    fn create_command_queue(&mut self, device: &Self::Device) -> Result<Self::CommandQueue>;

    fn poll_events(&mut self, window: &mut Self::Window) -> WindowEvents;

    /// May block until the presentation engine hands back an image.
    fn acquire_drawable(
        &mut self,
        device: &Self::Device,
        window: &mut Self::Window,
        queue: &mut Self::CommandQueue,
    ) -> Result<Self::Drawable, FrameFailure>;

    fn begin_encoding(
        &mut self,
        device: &Self::Device,
        queue: &mut Self::CommandQueue,
        drawable: &Self::Drawable,
    ) -> Result<Self::Encoder, FrameFailure>;

    fn encode_draw(
        &mut self,
        device: &Self::Device,
        encoder: &mut Self::Encoder,
        pipeline: &Self::Pipeline,
        vertex_buffer: &Self::VertexBuffer,
        vertex_count: u32,
    );

    /// Ends the encoder and submits its command buffer.
    fn submit(
        &mut self,
        device: &Self::Device,
        queue: &mut Self::CommandQueue,
        encoder: Self::Encoder,
    ) -> Result<(), FrameFailure>;

    fn present(
        &mut self,
        device: &Self::Device,
        window: &mut Self::Window,
        queue: &mut Self::CommandQueue,
        drawable: Self::Drawable,
    ) -> Result<(), FrameFailure>;

    /// Hand back a drawable whose frame failed after acquisition, so the
    /// backend can return its image and frame slot to a usable state.
    /// Called at most once per drawable, instead of `present`.
    fn abandon_frame(
        &mut self,
        device: &Self::Device,
        window: &mut Self::Window,
        queue: &mut Self::CommandQueue,
        drawable: Self::Drawable,
    );

    fn report_frame_rate(&mut self, _window: &mut Self::Window, _rate: FrameRate) {}

    /// Block until the device has finished all submitted work.
    fn wait_idle(&mut self, device: &Self::Device);

    fn release_command_queue(&mut self, device: &Self::Device, queue: Self::CommandQueue);
    fn release_pipeline(&mut self, device: &Self::Device, pipeline: Self::Pipeline);
    fn release_vertex_buffer(&mut self, device: &Self::Device, buffer: Self::VertexBuffer);
    fn release_shader_library(&mut self, device: &Self::Device, shaders: Self::ShaderLibrary);
    fn release_window(&mut self, device: &Self::Device, window: Self::Window);
    fn release_device(&mut self, device: Self::Device);
}
