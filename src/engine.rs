// =============================================================================
// RENDER ENGINE - lifecycle and frame loop
// =============================================================================
//
// LIFECYCLE:
//   Uninitialized --init()--> Initialized --run()/tick()--> Running
//   any state --cleanup()--> Stopped (terminal)
//
// FRAME FLOW (one iteration of run()):
// 1. Pump window events (close request sets the stop flag)
// 2. Acquire drawable (may block: display backpressure)
// 3. Begin command buffer + render pass targeting the drawable
// 4. Bind pipeline and vertex buffer, draw 3 vertices
// 5. Submit, present
//
// =============================================================================

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::backend::GraphicsBackend;
use crate::error::{EngineError, FrameFailure, SetupFailure, SetupStage};
use crate::geometry::{Vertex, TRIANGLE_VERTEX_COUNT, TRIANGLE_VERTICES};
use crate::stats::{FpsCounter, FrameStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Initialized,
    Running,
    Stopped,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineState::Uninitialized => "uninitialized",
            EngineState::Initialized => "initialized",
            EngineState::Running => "running",
            EngineState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Shared stop flag, observed by the render loop between frames.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// What one loop iteration did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented,
    /// A `FrameFailure` cost this frame
    Skipped,
    /// Nothing to draw: window minimized, or stop was requested
    Idle,
}

/// Every handle the engine owns. Fields are filled in creation order and
/// emptied in reverse; a `None` means not created yet or already released.
struct Resources<B: GraphicsBackend> {
    device: Option<B::Device>,
    window: Option<B::Window>,
    shaders: Option<B::ShaderLibrary>,
    vertex_buffer: Option<B::VertexBuffer>,
    pipeline: Option<B::Pipeline>,
    queue: Option<B::CommandQueue>,
}

impl<B: GraphicsBackend> Resources<B> {
    fn empty() -> Self {
        Self {
            device: None,
            window: None,
            shaders: None,
            vertex_buffer: None,
            pipeline: None,
            queue: None,
        }
    }

    fn create(&mut self, backend: &mut B, vertices: &[Vertex]) -> Result<(), SetupFailure> {
        let device = &*self
            .device
            .insert(backend.create_device().map_err(SetupFailure::at(SetupStage::Device))?);

        let window = &*self.window.insert(
            backend
                .create_window(device)
                .map_err(SetupFailure::at(SetupStage::Window))?,
        );

        let shaders = &*self.shaders.insert(
            backend
                .create_shader_library(device)
                .map_err(SetupFailure::at(SetupStage::ShaderLibrary))?,
        );

        self.vertex_buffer = Some(
            backend
                .create_vertex_buffer(device, vertices)
                .map_err(SetupFailure::at(SetupStage::VertexBuffer))?,
        );

        self.pipeline = Some(
            backend
                .create_pipeline(device, window, shaders, &Vertex::LAYOUT)
                .map_err(SetupFailure::at(SetupStage::Pipeline))?,
        );

        self.queue = Some(
            backend
                .create_command_queue(device)
                .map_err(SetupFailure::at(SetupStage::CommandQueue))?,
        );

        Ok(())
    }

    /// Release whatever exists, in reverse creation order.
    fn release(&mut self, backend: &mut B) {
        let Some(device) = self.device.take() else {
            return;
        };

        backend.wait_idle(&device);

        if let Some(queue) = self.queue.take() {
            backend.release_command_queue(&device, queue);
        }
        if let Some(pipeline) = self.pipeline.take() {
            backend.release_pipeline(&device, pipeline);
        }
        if let Some(buffer) = self.vertex_buffer.take() {
            backend.release_vertex_buffer(&device, buffer);
        }
        if let Some(shaders) = self.shaders.take() {
            backend.release_shader_library(&device, shaders);
        }
        if let Some(window) = self.window.take() {
            backend.release_window(&device, window);
        }
        backend.release_device(device);
    }

    fn draw(&mut self, backend: &mut B) -> Result<(), FrameFailure> {
        let Resources {
            device: Some(device),
            window: Some(window),
            vertex_buffer: Some(vertex_buffer),
            pipeline: Some(pipeline),
            queue: Some(queue),
            ..
        } = self
        else {
            return Err(FrameFailure::NotReady);
        };

        let drawable = backend.acquire_drawable(device, window, queue)?;

        // From here on the drawable must reach either present or abandon_frame
        let recorded = backend
            .begin_encoding(device, queue, &drawable)
            .and_then(|mut encoder| {
                backend.encode_draw(
                    device,
                    &mut encoder,
                    pipeline,
                    vertex_buffer,
                    TRIANGLE_VERTEX_COUNT,
                );
                backend.submit(device, queue, encoder)
            });

        if let Err(failure) = recorded {
            backend.abandon_frame(device, window, queue, drawable);
            return Err(failure);
        }

        backend.present(device, window, queue, drawable)
    }
}

/// Draws one triangle per frame through a [`GraphicsBackend`].
pub struct RenderEngine<B: GraphicsBackend> {
    backend: B,
    resources: Resources<B>,
    state: EngineState,
    stop: StopHandle,
    stats: FrameStats,
    fps: Option<FpsCounter>,
}

impl<B: GraphicsBackend> RenderEngine<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            resources: Resources::empty(),
            state: EngineState::Uninitialized,
            stop: StopHandle::default(),
            stats: FrameStats::default(),
            fps: None,
        }
    }

    /// Report FPS through the backend once per second while running.
    pub fn with_fps_reporting(mut self, enabled: bool) -> Self {
        self.fps = enabled.then(|| FpsCounter::new(Instant::now()));
        self
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Create device, window, shaders, vertex buffer, pipeline and command
    /// queue, in that order.
    ///
    /// On failure everything created so far is released and the engine is
    /// left `Stopped`.
    pub fn init(&mut self) -> Result<(), EngineError> {
        self.expect_state("init", &[EngineState::Uninitialized])?;
        log::info!("Initializing renderer...");

        if let Err(failure) = self.resources.create(&mut self.backend, &TRIANGLE_VERTICES) {
            log::error!("Renderer setup failed: {failure}: {:#}", failure.source);
            self.resources.release(&mut self.backend);
            self.state = EngineState::Stopped;
            return Err(failure.into());
        }

        self.state = EngineState::Initialized;
        log::info!("Renderer initialized successfully!");
        Ok(())
    }

    /// Block in the render loop until the stop flag is set.
    pub fn run(&mut self) -> Result<(), EngineError> {
        self.expect_state("run", &[EngineState::Initialized])?;
        self.state = EngineState::Running;
        log::info!("Entering render loop");

        while !self.stop.is_stop_requested() {
            self.frame();
        }

        log::info!(
            "Render loop stopped after {} frames ({} skipped)",
            self.stats.presented,
            self.stats.skipped
        );
        Ok(())
    }

    /// Run exactly one loop iteration. For harnesses that drive frames
    /// explicitly instead of calling `run()`.
    pub fn tick(&mut self) -> Result<FrameOutcome, EngineError> {
        self.expect_state("tick", &[EngineState::Initialized, EngineState::Running])?;
        self.state = EngineState::Running;
        Ok(self.frame())
    }

    /// Release all resources in reverse creation order. Safe to call from
    /// any state and more than once.
    pub fn cleanup(&mut self) {
        if self.resources.device.is_some() {
            log::info!("Cleaning up renderer resources...");
        }
        self.resources.release(&mut self.backend);
        self.state = EngineState::Stopped;
    }

    fn frame(&mut self) -> FrameOutcome {
        if let Some(window) = self.resources.window.as_mut() {
            let events = self.backend.poll_events(window);
            if events.close_requested {
                log::info!("Close requested, shutting down...");
                self.stop.request_stop();
            }
            if events.minimized {
                return FrameOutcome::Idle;
            }
        }

        if self.stop.is_stop_requested() {
            return FrameOutcome::Idle;
        }

        match self.resources.draw(&mut self.backend) {
            Ok(()) => {
                self.stats.presented += 1;
                self.report_fps();
                FrameOutcome::Presented
            }
            Err(failure) => {
                log::warn!("Skipping frame: {failure}");
                self.stats.skipped += 1;
                FrameOutcome::Skipped
            }
        }
    }

    fn report_fps(&mut self) {
        let Some(rate) = self
            .fps
            .as_mut()
            .and_then(|fps| fps.frame_presented(Instant::now()))
        else {
            return;
        };

        log::debug!("{:.0} FPS ({:.2}ms)", rate.fps, rate.frame_time_ms);
        if let Some(window) = self.resources.window.as_mut() {
            self.backend.report_frame_rate(window, rate);
        }
    }

    fn expect_state(
        &self,
        operation: &'static str,
        allowed: &[EngineState],
    ) -> Result<(), EngineError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(EngineError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }
}

impl<B: GraphicsBackend> Drop for RenderEngine<B> {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_handle_clones_share_the_flag() {
        let handle = StopHandle::default();
        let other = handle.clone();
        assert!(!other.is_stop_requested());

        handle.request_stop();
        assert!(other.is_stop_requested());
    }

    #[test]
    fn state_names() {
        assert_eq!(EngineState::Uninitialized.to_string(), "uninitialized");
        assert_eq!(EngineState::Running.to_string(), "running");
    }
}
