//! Health counters for a live session

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Health metrics for one session
///
/// Updated by the reader and processor tasks of the same connection, hence
/// the atomics.
pub struct SessionHealth {
    /// Frames analyzed (with or without a detected pose)
    pub frames_processed: AtomicU64,

    /// Frames where the estimator found nobody
    pub no_pose_frames: AtomicU64,

    /// Frames dropped because the inbound queue was full
    pub frame_drops: AtomicU64,

    /// Frame payloads that failed base64 or image decoding
    pub decode_failures: AtomicU64,

    /// Messages that could not be parsed or were rejected
    pub malformed_messages: AtomicU64,

    /// Frames whose processing exceeded the latency budget
    pub over_budget: AtomicU64,

    /// Sum of per-frame processing time, in microseconds
    pub processing_micros: AtomicU64,
}

impl SessionHealth {
    /// Create a new health tracker with all counters at zero
    pub fn new() -> Self {
        Self {
            frames_processed: AtomicU64::new(0),
            no_pose_frames: AtomicU64::new(0),
            frame_drops: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            malformed_messages: AtomicU64::new(0),
            over_budget: AtomicU64::new(0),
            processing_micros: AtomicU64::new(0),
        }
    }

    /// Record a frame dropped on a full inbound queue
    pub fn record_frame_drop(&self) {
        self.frame_drops.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a frame payload that could not be decoded
    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rejected inbound message
    pub fn record_malformed(&self) {
        self.malformed_messages.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an analyzed frame; returns true when it blew the budget
    pub fn record_frame(&self, elapsed: Duration, no_pose: bool, budget: Duration) -> bool {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
        self.processing_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        if no_pose {
            self.no_pose_frames.fetch_add(1, Ordering::Relaxed);
        }
        let over = elapsed > budget;
        if over {
            self.over_budget.fetch_add(1, Ordering::Relaxed);
        }
        over
    }

    /// Get the number of frames analyzed
    pub fn frames_processed(&self) -> u64 {
        self.frames_processed.load(Ordering::Relaxed)
    }

    /// Get the number of frame drops
    pub fn frame_drops(&self) -> u64 {
        self.frame_drops.load(Ordering::Relaxed)
    }

    /// Get the number of decode failures
    pub fn decode_failures(&self) -> u64 {
        self.decode_failures.load(Ordering::Relaxed)
    }

    /// Get the number of rejected messages
    pub fn malformed_messages(&self) -> u64 {
        self.malformed_messages.load(Ordering::Relaxed)
    }

    /// Get the number of frames without a detected pose
    pub fn no_pose_frames(&self) -> u64 {
        self.no_pose_frames.load(Ordering::Relaxed)
    }

    /// Get the number of frames over the latency budget
    pub fn over_budget(&self) -> u64 {
        self.over_budget.load(Ordering::Relaxed)
    }

    /// Frame drop rate as a percentage of frames received
    pub fn frame_drop_rate(&self) -> f64 {
        let drops = self.frame_drops();
        let received = drops + self.frames_processed();
        if received == 0 {
            return 0.0;
        }
        (drops as f64 / received as f64) * 100.0
    }

    /// Mean processing time per analyzed frame
    pub fn mean_latency(&self) -> Duration {
        let frames = self.frames_processed();
        if frames == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(self.processing_micros.load(Ordering::Relaxed) / frames)
    }

    /// Get a summary of health metrics
    pub fn summary(&self) -> HealthSummary {
        HealthSummary {
            frames_processed: self.frames_processed(),
            no_pose_frames: self.no_pose_frames(),
            frame_drops: self.frame_drops(),
            decode_failures: self.decode_failures(),
            malformed_messages: self.malformed_messages(),
            over_budget: self.over_budget(),
            frame_drop_rate: self.frame_drop_rate(),
            mean_latency: self.mean_latency(),
        }
    }
}

impl Default for SessionHealth {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of health metrics
#[derive(Debug, Clone)]
pub struct HealthSummary {
    pub frames_processed: u64,
    pub no_pose_frames: u64,
    pub frame_drops: u64,
    pub decode_failures: u64,
    pub malformed_messages: u64,
    pub over_budget: u64,
    pub frame_drop_rate: f64,
    pub mean_latency: Duration,
}

impl std::fmt::Display for HealthSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Health: {} frames ({} without pose, {} over budget, mean {:?}), {} drops ({:.2}%), {} decode failures, {} malformed",
            self.frames_processed,
            self.no_pose_frames,
            self.over_budget,
            self.mean_latency,
            self.frame_drops,
            self.frame_drop_rate,
            self.decode_failures,
            self.malformed_messages
        )
    }
}
