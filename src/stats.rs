// Frame counters and FPS tracking

use std::time::{Duration, Instant};

/// Running totals kept by the engine across its lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frames whose drawable reached the presentation engine
    pub presented: u64,
    /// Frames abandoned because of a `FrameFailure`
    pub skipped: u64,
}

/// Snapshot produced once per reporting interval
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRate {
    pub fps: f32,
    pub frame_time_ms: f32,
}

/// Averages presented frames over one-second windows
#[derive(Debug)]
pub struct FpsCounter {
    interval: Duration,
    frame_count: u32,
    last_report: Instant,
    last_frame: Instant,
}

impl FpsCounter {
    pub fn new(now: Instant) -> Self {
        Self {
            interval: Duration::from_secs(1),
            frame_count: 0,
            last_report: now,
            last_frame: now,
        }
    }

    /// Record one presented frame; returns a rate once per interval.
    pub fn frame_presented(&mut self, now: Instant) -> Option<FrameRate> {
        let frame_time = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.frame_count += 1;

        let elapsed = now.duration_since(self.last_report);
        if elapsed < self.interval {
            return None;
        }

        let rate = FrameRate {
            fps: self.frame_count as f32 / elapsed.as_secs_f32(),
            frame_time_ms: frame_time * 1000.0,
        };
        self.frame_count = 0;
        self.last_report = now;
        Some(rate)
    }
}
