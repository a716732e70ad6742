//! Minimal real-time triangle renderer.
//!
//! [`RenderEngine`] owns the lifecycle (`init` / `run` / `cleanup`) and the
//! per-frame draw; everything platform- or API-specific sits behind
//! [`GraphicsBackend`], implemented for Vulkan by [`VulkanBackend`].

pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod logging;
pub mod stats;

pub use backend::{GraphicsBackend, VulkanBackend, WindowEvents};
pub use config::Config;
pub use engine::{EngineState, FrameOutcome, RenderEngine, StopHandle};
pub use error::{EngineError, FrameFailure, SetupFailure, SetupStage};
pub use geometry::{Vertex, VertexLayout, TRIANGLE_VERTEX_COUNT, TRIANGLE_VERTICES};
pub use stats::{FrameRate, FrameStats};
