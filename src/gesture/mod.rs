//! Gesture subsystem: classification of raw pointer input into semantic
//! gestures and conversion of pan displacement into rotary velocity
//! commands.
//!
//! The recognizer consumes pointer samples from the input task and emits
//! `GestureEvent`s over an mpsc channel. The pan controller consumes
//! normalized pan deltas and broadcasts velocity or halt commands on a
//! fixed cadence, independent of the incoming sample rate.

pub mod pan_controller;
pub mod recognizer;

pub use pan_controller::{
    PanCommand, PanController, PanState, RotaryDirection, SpeedConfig, SpeedTables, StreamType,
};
pub use recognizer::{GestureConfig, GestureRecognizer, GestureState};

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Semantic gesture emitted by the recognizer.
///
/// `x`/`y` are pointer coordinates in device pixels at event time,
/// `timestamp` is the monotonic millisecond timestamp supplied with the
/// raw sample, and `frame_timestamp` correlates the event to the video
/// frame displayed at that instant (None when the frame clock has not
/// been fed yet).
#[derive(Debug, Clone, PartialEq)]
pub enum GestureEvent {
    Tap {
        x: i32,
        y: i32,
        timestamp: i64,
        frame_timestamp: Option<i64>,
    },
    DoubleTap {
        x: i32,
        y: i32,
        timestamp: i64,
        frame_timestamp: Option<i64>,
    },
    PanStart {
        x: i32,
        y: i32,
        timestamp: i64,
        frame_timestamp: Option<i64>,
    },
    PanMove {
        x: i32,
        y: i32,
        delta_x: i32,
        delta_y: i32,
        timestamp: i64,
        frame_timestamp: Option<i64>,
    },
    PanStop {
        x: i32,
        y: i32,
        timestamp: i64,
        frame_timestamp: Option<i64>,
    },
    WheelUp {
        x: i32,
        y: i32,
        amount: i32,
        timestamp: i64,
        frame_timestamp: Option<i64>,
    },
    WheelDown {
        x: i32,
        y: i32,
        amount: i32,
        timestamp: i64,
        frame_timestamp: Option<i64>,
    },
}

impl GestureEvent {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            GestureEvent::Tap { .. } => "tap",
            GestureEvent::DoubleTap { .. } => "double-tap",
            GestureEvent::PanStart { .. } => "pan-start",
            GestureEvent::PanMove { .. } => "pan-move",
            GestureEvent::PanStop { .. } => "pan-stop",
            GestureEvent::WheelUp { .. } => "wheel-up",
            GestureEvent::WheelDown { .. } => "wheel-down",
        }
    }
}

/// Source of the frame timestamp used to correlate gestures with the
/// video frame visible when they happened.
pub trait FrameSource: Send + Sync {
    /// Timestamp of the currently displayed frame, or None if no frame
    /// has been presented yet.
    fn current_frame_timestamp(&self) -> Option<i64>;
}

/// Shared frame clock fed by the video pipeline and read once per emitted
/// gesture event. -1 is the internal sentinel for "no frame yet".
#[derive(Debug, Clone)]
pub struct FrameClock {
    inner: Arc<AtomicI64>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(AtomicI64::new(-1)),
        }
    }

    /// Record the timestamp of the frame currently being presented.
    pub fn mark_frame(&self, timestamp: i64) {
        self.inner.store(timestamp, Ordering::Release);
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for FrameClock {
    fn current_frame_timestamp(&self) -> Option<i64> {
        match self.inner.load(Ordering::Acquire) {
            t if t < 0 => None,
            t => Some(t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_clock_starts_unknown() {
        let clock = FrameClock::new();
        assert_eq!(clock.current_frame_timestamp(), None);
    }

    #[test]
    fn frame_clock_reports_last_marked_frame() {
        let clock = FrameClock::new();
        clock.mark_frame(1000);
        clock.mark_frame(1033);
        assert_eq!(clock.current_frame_timestamp(), Some(1033));
    }
}
