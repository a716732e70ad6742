//! Error types for the renderer lifecycle.
//!
//! Only two failure kinds exist: [`SetupFailure`] is fatal and aborts
//! `init()`, [`FrameFailure`] costs one frame and the loop keeps going.

use std::fmt;
use thiserror::Error;

use crate::engine::EngineState;

/// Boxed backend error carried as the source of a setup failure.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Initialization step that produced a [`SetupFailure`], in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetupStage {
    Device,
    Window,
    ShaderLibrary,
    VertexBuffer,
    Pipeline,
    CommandQueue,
}

impl SetupStage {
    /// All stages in the order `init()` runs them.
    pub const ORDER: [SetupStage; 6] = [
        SetupStage::Device,
        SetupStage::Window,
        SetupStage::ShaderLibrary,
        SetupStage::VertexBuffer,
        SetupStage::Pipeline,
        SetupStage::CommandQueue,
    ];
}

impl fmt::Display for SetupStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SetupStage::Device => "device",
            SetupStage::Window => "window",
            SetupStage::ShaderLibrary => "shader library",
            SetupStage::VertexBuffer => "vertex buffer",
            SetupStage::Pipeline => "render pipeline",
            SetupStage::CommandQueue => "command queue",
        };
        f.write_str(name)
    }
}

/// A resource could not be created during `init()`.
#[derive(Debug, Error)]
#[error("failed to create {stage}")]
pub struct SetupFailure {
    pub stage: SetupStage,
    #[source]
    pub source: BoxedError,
}

impl SetupFailure {
    pub fn new(stage: SetupStage, source: impl Into<BoxedError>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }

    /// Adapter for `map_err` on a backend creation call.
    pub fn at(stage: SetupStage) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| Self::new(stage, source)
    }
}

/// One frame could not be produced. Logged, counted and skipped.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FrameFailure {
    #[error("frame resources are not initialized")]
    NotReady,

    #[error("drawable unavailable: {0}")]
    DrawableUnavailable(String),

    #[error("submission rejected: {0}")]
    SubmissionRejected(String),

    #[error("presentation failed: {0}")]
    PresentationFailed(String),
}

/// Errors returned by the engine's lifecycle methods.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Setup(#[from] SetupFailure),

    #[error("cannot {operation} while the engine is {state}")]
    InvalidState {
        operation: &'static str,
        state: EngineState,
    },
}
