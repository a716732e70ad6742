mod common;

use common::{Call, Kind, RecordingBackend};
use triangle_renderer::{
    EngineError, EngineState, FrameOutcome, RenderEngine, SetupStage, TRIANGLE_VERTEX_COUNT,
};

const CREATION_ORDER: [Kind; 6] = [
    Kind::Device,
    Kind::Window,
    Kind::ShaderLibrary,
    Kind::VertexBuffer,
    Kind::Pipeline,
    Kind::CommandQueue,
];

fn reversed(kinds: &[Kind]) -> Vec<Kind> {
    kinds.iter().rev().copied().collect()
}

#[test]
fn init_creates_resources_in_dependency_order() {
    let (backend, probe) = RecordingBackend::new();
    let mut engine = RenderEngine::new(backend);
    assert_eq!(engine.state(), EngineState::Uninitialized);

    engine.init().unwrap();

    assert_eq!(engine.state(), EngineState::Initialized);
    assert_eq!(probe.created(), CREATION_ORDER.to_vec());
    assert_eq!(probe.vertices_uploaded(), 3);
}

#[test]
fn init_then_cleanup_releases_each_handle_once_in_reverse() {
    let (backend, probe) = RecordingBackend::new();
    let mut engine = RenderEngine::new(backend);

    engine.init().unwrap();
    engine.cleanup();

    assert_eq!(engine.state(), EngineState::Stopped);
    assert_eq!(probe.released(), reversed(&CREATION_ORDER));

    // Device idles before the first release
    let calls = probe.calls();
    let idle = calls.iter().position(|c| *c == Call::WaitIdle).unwrap();
    let first_release = calls
        .iter()
        .position(|c| matches!(c, Call::Release(_)))
        .unwrap();
    assert!(idle < first_release);
}

#[test]
fn second_cleanup_releases_nothing() {
    let (backend, probe) = RecordingBackend::new();
    let mut engine = RenderEngine::new(backend);

    engine.init().unwrap();
    engine.cleanup();
    let after_first = probe.calls().len();

    engine.cleanup();

    assert_eq!(probe.calls().len(), after_first);
    assert_eq!(probe.released().len(), 6);
    assert_eq!(engine.state(), EngineState::Stopped);
}

#[test]
fn dropping_the_engine_cleans_up() {
    let (backend, probe) = RecordingBackend::new();
    {
        let mut engine = RenderEngine::new(backend);
        engine.init().unwrap();
    }
    assert_eq!(probe.released(), reversed(&CREATION_ORDER));
}

#[test]
fn one_frame_then_stop_presents_exactly_one_drawable() {
    let (backend, probe) = RecordingBackend::new();
    let mut engine = RenderEngine::new(backend);
    probe.stop_after_presents(1, engine.stop_handle());

    engine.init().unwrap();
    engine.run().unwrap();

    assert_eq!(probe.count(|c| matches!(c, Call::Acquire(_))), 1);
    assert_eq!(probe.count(|c| matches!(c, Call::Present(_))), 1);
    assert_eq!(engine.stats().presented, 1);

    engine.cleanup();
    let released = probe.released();
    assert_eq!(released.len(), 6);
    assert_eq!(released, reversed(&CREATION_ORDER));
}

#[test]
fn frame_steps_run_in_order_with_three_vertices() {
    let (backend, probe) = RecordingBackend::new();
    let mut engine = RenderEngine::new(backend);
    probe.stop_after_presents(3, engine.stop_handle());

    engine.init().unwrap();
    engine.run().unwrap();

    let frame_calls: Vec<Call> = probe
        .calls()
        .into_iter()
        .filter(|c| !matches!(c, Call::Create(_) | Call::PollEvents))
        .collect();

    let mut expected = Vec::new();
    for frame in 1..=3 {
        expected.push(Call::Acquire(frame));
        expected.push(Call::BeginEncoding(frame));
        expected.push(Call::Draw {
            frame,
            vertex_count: 3,
        });
        expected.push(Call::Submit(frame));
        expected.push(Call::Present(frame));
    }
    assert_eq!(frame_calls, expected);
    assert_eq!(TRIANGLE_VERTEX_COUNT, 3);
}

#[test]
fn nothing_is_drawn_before_pipeline_and_vertex_buffer_exist() {
    let (backend, probe) = RecordingBackend::new();
    let mut engine = RenderEngine::new(backend);
    probe.stop_after_presents(2, engine.stop_handle());

    engine.init().unwrap();
    engine.run().unwrap();

    let calls = probe.calls();
    let pipeline = calls
        .iter()
        .position(|c| *c == Call::Create(Kind::Pipeline))
        .unwrap();
    let vertex_buffer = calls
        .iter()
        .position(|c| *c == Call::Create(Kind::VertexBuffer))
        .unwrap();
    let first_draw = calls
        .iter()
        .position(|c| matches!(c, Call::Draw { .. }))
        .unwrap();

    assert!(pipeline < first_draw);
    assert!(vertex_buffer < first_draw);
}

#[test]
fn setup_failure_releases_earlier_stages_in_reverse() {
    for (index, stage) in SetupStage::ORDER.into_iter().enumerate() {
        let (backend, probe) = RecordingBackend::new();
        probe.fail_at(stage);
        let mut engine = RenderEngine::new(backend);

        let err = engine.init().unwrap_err();

        match err {
            EngineError::Setup(failure) => assert_eq!(failure.stage, stage),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(engine.state(), EngineState::Stopped);
        assert_eq!(probe.created(), CREATION_ORDER[..index].to_vec());
        assert_eq!(probe.released(), reversed(&CREATION_ORDER[..index]));
    }
}

#[test]
fn failed_init_leaves_no_usable_engine() {
    let (backend, probe) = RecordingBackend::new();
    probe.fail_at(SetupStage::ShaderLibrary);
    let mut engine = RenderEngine::new(backend);

    assert!(engine.init().is_err());

    assert!(matches!(
        engine.run(),
        Err(EngineError::InvalidState {
            operation: "run",
            state: EngineState::Stopped
        })
    ));
    assert!(engine.tick().is_err());
    assert_eq!(probe.count(|c| matches!(c, Call::Acquire(_))), 0);
}

#[test]
fn run_requires_initialized_engine() {
    let (backend, _probe) = RecordingBackend::new();
    let mut engine = RenderEngine::new(backend);

    let err = engine.run().unwrap_err();
    assert_eq!(
        err.to_string(),
        "cannot run while the engine is uninitialized"
    );
    assert_eq!(engine.state(), EngineState::Uninitialized);
}

#[test]
fn init_twice_is_rejected() {
    let (backend, probe) = RecordingBackend::new();
    let mut engine = RenderEngine::new(backend);

    engine.init().unwrap();
    assert!(matches!(
        engine.init(),
        Err(EngineError::InvalidState { operation: "init", .. })
    ));
    assert_eq!(probe.created().len(), 6);
}

#[test]
fn stopped_engine_cannot_restart() {
    let (backend, _probe) = RecordingBackend::new();
    let mut engine = RenderEngine::new(backend);

    engine.init().unwrap();
    engine.cleanup();

    assert!(engine.init().is_err());
    assert!(engine.run().is_err());
    assert_eq!(engine.state(), EngineState::Stopped);
}

#[test]
fn cleanup_before_init_is_harmless() {
    let (backend, probe) = RecordingBackend::new();
    let mut engine = RenderEngine::new(backend);

    engine.cleanup();

    assert_eq!(engine.state(), EngineState::Stopped);
    assert!(probe.calls().is_empty());
}

#[test]
fn frame_failures_are_skipped_and_the_loop_continues() {
    let (backend, probe) = RecordingBackend::new();
    let mut engine = RenderEngine::new(backend);
    probe.fail_acquire(2);
    probe.reject_submit(3);
    probe.stop_after_presents(2, engine.stop_handle());

    engine.init().unwrap();
    engine.run().unwrap();

    let stats = engine.stats();
    assert_eq!(stats.presented, 2);
    assert_eq!(stats.skipped, 2);

    // A failed acquisition never reaches the encoder
    assert_eq!(probe.count(|c| *c == Call::BeginEncoding(2)), 0);
    // A rejected submission is never presented
    assert_eq!(probe.count(|c| *c == Call::Present(3)), 0);
    assert_eq!(probe.count(|c| *c == Call::Present(4)), 1);

    // Only the frame that got past acquisition hands its drawable back
    assert_eq!(probe.count(|c| matches!(c, Call::Abandon(_))), 1);
    assert_eq!(probe.count(|c| *c == Call::Abandon(3)), 1);
}

#[test]
fn failed_encoding_returns_the_drawable_and_the_loop_continues() {
    let (backend, probe) = RecordingBackend::new();
    let mut engine = RenderEngine::new(backend);
    probe.fail_encoding(2);
    probe.stop_after_presents(2, engine.stop_handle());

    engine.init().unwrap();
    engine.run().unwrap();

    assert_eq!(engine.stats().skipped, 1);
    assert_eq!(engine.stats().presented, 2);

    let calls = probe.calls();
    assert_eq!(calls.iter().filter(|c| **c == Call::Abandon(2)).count(), 1);
    assert!(!calls.contains(&Call::Draw {
        frame: 2,
        vertex_count: 3
    }));
    assert!(!calls.contains(&Call::Submit(2)));
    assert!(!calls.contains(&Call::Present(2)));
    assert!(calls.contains(&Call::Present(3)));

    // The abandoned drawable is returned right after its failed encoding
    let begin = calls.iter().position(|c| *c == Call::BeginEncoding(2)).unwrap();
    assert_eq!(calls[begin + 1], Call::Abandon(2));
}

#[test]
fn presented_frames_are_never_abandoned() {
    let (backend, probe) = RecordingBackend::new();
    let mut engine = RenderEngine::new(backend);
    probe.stop_after_presents(3, engine.stop_handle());

    engine.init().unwrap();
    engine.run().unwrap();

    assert_eq!(probe.count(|c| matches!(c, Call::Abandon(_))), 0);
}

#[test]
fn close_request_stops_the_loop() {
    let (backend, probe) = RecordingBackend::new();
    let mut engine = RenderEngine::new(backend);
    probe.close_after_polls(3);

    engine.init().unwrap();
    engine.run().unwrap();

    assert!(engine.stop_handle().is_stop_requested());
    assert_eq!(engine.stats().presented, 2);
    assert_eq!(probe.count(|c| matches!(c, Call::Acquire(_))), 2);
}

#[test]
fn minimized_window_idles_without_acquiring() {
    let (backend, probe) = RecordingBackend::new();
    let mut engine = RenderEngine::new(backend);
    probe.minimize_on_poll(1);
    engine.init().unwrap();

    assert_eq!(engine.tick().unwrap(), FrameOutcome::Idle);
    assert_eq!(probe.count(|c| matches!(c, Call::Acquire(_))), 0);

    assert_eq!(engine.tick().unwrap(), FrameOutcome::Presented);
    assert_eq!(engine.state(), EngineState::Running);
}

#[test]
fn tick_reports_skipped_frames() {
    let (backend, probe) = RecordingBackend::new();
    let mut engine = RenderEngine::new(backend);
    probe.fail_acquire(1);
    engine.init().unwrap();

    assert_eq!(engine.tick().unwrap(), FrameOutcome::Skipped);
    assert_eq!(engine.tick().unwrap(), FrameOutcome::Presented);
    assert_eq!(engine.stats().skipped, 1);
    assert_eq!(engine.stats().presented, 1);
}

#[test]
fn stop_before_run_draws_nothing() {
    let (backend, probe) = RecordingBackend::new();
    let mut engine = RenderEngine::new(backend);
    engine.init().unwrap();

    engine.stop_handle().request_stop();
    engine.run().unwrap();

    assert_eq!(engine.state(), EngineState::Running);
    assert_eq!(probe.count(|c| matches!(c, Call::Acquire(_))), 0);
}
