//! Headless `GraphicsBackend` that records every call instead of touching a GPU.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use anyhow::{anyhow, Result};
use triangle_renderer::{
    FrameFailure, GraphicsBackend, SetupStage, StopHandle, Vertex, VertexLayout, WindowEvents,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Device,
    Window,
    ShaderLibrary,
    VertexBuffer,
    Pipeline,
    CommandQueue,
}

impl Kind {
    fn for_stage(stage: SetupStage) -> Self {
        match stage {
            SetupStage::Device => Kind::Device,
            SetupStage::Window => Kind::Window,
            SetupStage::ShaderLibrary => Kind::ShaderLibrary,
            SetupStage::VertexBuffer => Kind::VertexBuffer,
            SetupStage::Pipeline => Kind::Pipeline,
            SetupStage::CommandQueue => Kind::CommandQueue,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create(Kind),
    PollEvents,
    Acquire(u64),
    BeginEncoding(u64),
    Draw { frame: u64, vertex_count: u32 },
    Submit(u64),
    Present(u64),
    Abandon(u64),
    WaitIdle,
    Release(Kind),
}

/// Opaque handle standing in for a GPU object
#[derive(Debug)]
pub struct Handle(pub Kind);

#[derive(Debug)]
pub struct Drawable(pub u64);

#[derive(Debug)]
pub struct Encoder(pub u64);

#[derive(Default)]
struct Script {
    calls: Vec<Call>,
    fail_at: Option<SetupStage>,
    failing_acquires: HashSet<u64>,
    failing_encodings: HashSet<u64>,
    rejected_submits: HashSet<u64>,
    stop_after_presents: Option<(u64, StopHandle)>,
    close_after_polls: Option<u64>,
    minimized_polls: HashSet<u64>,
    vertices_uploaded: usize,
    acquires: u64,
    presents: u64,
    polls: u64,
}

/// Test-side view of the backend's shared script and call log
#[derive(Clone)]
pub struct Probe(Rc<RefCell<Script>>);

impl Probe {
    pub fn calls(&self) -> Vec<Call> {
        self.0.borrow().calls.clone()
    }

    pub fn fail_at(&self, stage: SetupStage) {
        self.0.borrow_mut().fail_at = Some(stage);
    }

    /// Acquisition number `n` (starting at 1) fails
    pub fn fail_acquire(&self, n: u64) {
        self.0.borrow_mut().failing_acquires.insert(n);
    }

    /// Encoding of frame `n` (starting at 1) fails after acquisition
    pub fn fail_encoding(&self, n: u64) {
        self.0.borrow_mut().failing_encodings.insert(n);
    }

    /// Submission of frame `n` (starting at 1) is rejected
    pub fn reject_submit(&self, n: u64) {
        self.0.borrow_mut().rejected_submits.insert(n);
    }

    pub fn stop_after_presents(&self, presents: u64, handle: StopHandle) {
        self.0.borrow_mut().stop_after_presents = Some((presents, handle));
    }

    pub fn close_after_polls(&self, polls: u64) {
        self.0.borrow_mut().close_after_polls = Some(polls);
    }

    /// Poll number `n` (starting at 1) reports a minimized window
    pub fn minimize_on_poll(&self, n: u64) {
        self.0.borrow_mut().minimized_polls.insert(n);
    }

    pub fn vertices_uploaded(&self) -> usize {
        self.0.borrow().vertices_uploaded
    }

    pub fn created(&self) -> Vec<Kind> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Create(kind) => Some(kind),
                _ => None,
            })
            .collect()
    }

    pub fn released(&self) -> Vec<Kind> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Release(kind) => Some(kind),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.0.borrow().calls.iter().filter(|c| matches(c)).count()
    }
}

pub struct RecordingBackend {
    script: Rc<RefCell<Script>>,
}

impl RecordingBackend {
    pub fn new() -> (Self, Probe) {
        let script = Rc::new(RefCell::new(Script::default()));
        (
            Self {
                script: script.clone(),
            },
            Probe(script),
        )
    }

    fn create(&mut self, stage: SetupStage) -> Result<Handle> {
        let mut script = self.script.borrow_mut();
        if script.fail_at == Some(stage) {
            return Err(anyhow!("scripted {stage} failure"));
        }
        let kind = Kind::for_stage(stage);
        script.calls.push(Call::Create(kind));
        Ok(Handle(kind))
    }

    fn release(&mut self, handle: Handle) {
        self.script.borrow_mut().calls.push(Call::Release(handle.0));
    }

    fn record(&mut self, call: Call) {
        self.script.borrow_mut().calls.push(call);
    }
}

impl GraphicsBackend for RecordingBackend {
    type Device = Handle;
    type Window = Handle;
    type ShaderLibrary = Handle;
    type VertexBuffer = Handle;
    type Pipeline = Handle;
    type CommandQueue = Handle;
    type Drawable = Drawable;
    type Encoder = Encoder;

    fn create_device(&mut self) -> Result<Handle> {
        self.create(SetupStage::Device)
    }

    fn create_window(&mut self, _device: &Handle) -> Result<Handle> {
        self.create(SetupStage::Window)
    }

    fn create_shader_library(&mut self, _device: &Handle) -> Result<Handle> {
        self.create(SetupStage::ShaderLibrary)
    }

    fn create_vertex_buffer(&mut self, _device: &Handle, vertices: &[Vertex]) -> Result<Handle> {
        let handle = self.create(SetupStage::VertexBuffer)?;
        self.script.borrow_mut().vertices_uploaded = vertices.len();
        Ok(handle)
    }

    fn create_pipeline(
        &mut self,
        _device: &Handle,
        _window: &Handle,
        _shaders: &Handle,
        _layout: &VertexLayout,
    ) -> Result<Handle> {
        self.create(SetupStage::Pipeline)
    }

    fn create_command_queue(&mut self, _device: &Handle) -> Result<Handle> {
        self.create(SetupStage::CommandQueue)
    }

    fn poll_events(&mut self, _window: &mut Handle) -> WindowEvents {
        let mut script = self.script.borrow_mut();
        script.polls += 1;
        script.calls.push(Call::PollEvents);
        let polls = script.polls;
        WindowEvents {
            close_requested: script.close_after_polls.is_some_and(|n| polls >= n),
            minimized: script.minimized_polls.contains(&polls),
        }
    }

    fn acquire_drawable(
        &mut self,
        _device: &Handle,
        _window: &mut Handle,
        _queue: &mut Handle,
    ) -> Result<Drawable, FrameFailure> {
        let mut script = self.script.borrow_mut();
        script.acquires += 1;
        let frame = script.acquires;
        script.calls.push(Call::Acquire(frame));
        if script.failing_acquires.contains(&frame) {
            return Err(FrameFailure::DrawableUnavailable("scripted".to_string()));
        }
        Ok(Drawable(frame))
    }

    fn begin_encoding(
        &mut self,
        _device: &Handle,
        _queue: &mut Handle,
        drawable: &Drawable,
    ) -> Result<Encoder, FrameFailure> {
        let mut script = self.script.borrow_mut();
        script.calls.push(Call::BeginEncoding(drawable.0));
        if script.failing_encodings.contains(&drawable.0) {
            return Err(FrameFailure::SubmissionRejected("scripted".to_string()));
        }
        Ok(Encoder(drawable.0))
    }

    fn encode_draw(
        &mut self,
        _device: &Handle,
        encoder: &mut Encoder,
        _pipeline: &Handle,
        _vertex_buffer: &Handle,
        vertex_count: u32,
    ) {
        self.record(Call::Draw {
            frame: encoder.0,
            vertex_count,
        });
    }

    fn submit(
        &mut self,
        _device: &Handle,
        _queue: &mut Handle,
        encoder: Encoder,
    ) -> Result<(), FrameFailure> {
        let mut script = self.script.borrow_mut();
        script.calls.push(Call::Submit(encoder.0));
        if script.rejected_submits.contains(&encoder.0) {
            return Err(FrameFailure::SubmissionRejected("scripted".to_string()));
        }
        Ok(())
    }

    fn present(
        &mut self,
        _device: &Handle,
        _window: &mut Handle,
        _queue: &mut Handle,
        drawable: Drawable,
    ) -> Result<(), FrameFailure> {
        let mut script = self.script.borrow_mut();
        script.calls.push(Call::Present(drawable.0));
        script.presents += 1;
        if let Some((after, handle)) = &script.stop_after_presents {
            if script.presents >= *after {
                handle.request_stop();
            }
        }
        Ok(())
    }

    fn abandon_frame(
        &mut self,
        _device: &Handle,
        _window: &mut Handle,
        _queue: &mut Handle,
        drawable: Drawable,
    ) {
        self.record(Call::Abandon(drawable.0));
    }

    fn wait_idle(&mut self, _device: &Handle) {
        self.record(Call::WaitIdle);
    }

    fn release_command_queue(&mut self, _device: &Handle, queue: Handle) {
        self.release(queue);
    }

    fn release_pipeline(&mut self, _device: &Handle, pipeline: Handle) {
        self.release(pipeline);
    }

    fn release_vertex_buffer(&mut self, _device: &Handle, buffer: Handle) {
        self.release(buffer);
    }

    fn release_shader_library(&mut self, _device: &Handle, shaders: Handle) {
        self.release(shaders);
    }

    fn release_window(&mut self, _device: &Handle, window: Handle) {
        self.release(window);
    }

    fn release_device(&mut self, device: Handle) {
        self.release(device);
    }
}
