//! Pointer gesture recognition.
//!
//! Classifies raw pointer-down/drag/up/wheel samples into semantic
//! gestures. All timestamps are monotonic milliseconds supplied by the
//! caller; the recognizer never reads a wall clock, which keeps event
//! ordering deterministic and the state machine directly testable.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use super::{FrameSource, GestureEvent};

/// Tunables for gesture classification. Fixed at recognizer construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Pixels of movement before a pending touch becomes a pan
    pub move_threshold: i32,
    /// Maximum press duration in ms for a release to count as a tap
    pub tap_long_press_threshold: i64,
    /// Maximum ms between two taps for double-tap promotion
    pub double_tap_threshold: i64,
    /// Minimum ms between emitted pan updates
    pub pan_update_interval: i64,
    /// Pixel tolerance on each axis for double-tap position matching
    pub double_tap_tolerance: i32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            move_threshold: 20,
            tap_long_press_threshold: 300,
            double_tap_threshold: 300,
            pan_update_interval: 120,
            double_tap_tolerance: 10,
        }
    }
}

/// Classification state. Exactly one value at a time, owned by the
/// recognizer and mutated only by its own event methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GestureState {
    Idle,
    Pending,
    Panning,
}

/// Stateful classifier turning raw pointer samples into [`GestureEvent`]s.
///
/// Events are emitted synchronously from the calling task into the
/// provided channel; the owner guarantees samples arrive in wall-clock
/// order (single consumer task, no internal reordering). None of the
/// operations fail: malformed input such as a non-primary button is
/// ignored, not rejected.
pub struct GestureRecognizer {
    config: GestureConfig,
    events: mpsc::Sender<GestureEvent>,
    frames: Arc<dyn FrameSource>,

    state: GestureState,
    start_x: i32,
    start_y: i32,
    start_time: i64,

    // Double-tap memory: time and position of the last qualifying single
    // tap, cleared on promotion so a third click starts over
    last_tap: Option<(i64, i32, i32)>,

    // Timestamp of the last emitted pan event (PanStart or PanMove)
    last_pan_update: i64,
}

impl GestureRecognizer {
    pub fn new(
        config: GestureConfig,
        events: mpsc::Sender<GestureEvent>,
        frames: Arc<dyn FrameSource>,
    ) -> Self {
        debug!("Creating gesture recognizer with config: {:?}", config);
        Self {
            config,
            events,
            frames,
            state: GestureState::Idle,
            start_x: 0,
            start_y: 0,
            start_time: 0,
            last_tap: None,
            last_pan_update: 0,
        }
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    /// Primary button press starts a pending session, unconditionally
    /// overwriting any prior one. Other buttons are ignored.
    pub fn pointer_pressed(&mut self, x: i32, y: i32, primary: bool, time: i64) {
        if !primary {
            return;
        }

        self.start_x = x;
        self.start_y = y;
        self.start_time = time;
        self.state = GestureState::Pending;
        trace!("Pointer down at ({}, {}), t={}", x, y, time);
    }

    /// Drag sample. Promotes a pending session to a pan once movement
    /// exceeds the move threshold, then emits throttled pan updates whose
    /// deltas are absolute offsets from the press origin.
    pub fn pointer_dragged(&mut self, x: i32, y: i32, time: i64) {
        match self.state {
            GestureState::Idle => {}
            GestureState::Pending => {
                if self.distance_from_start(x, y) > self.config.move_threshold as f64 {
                    self.state = GestureState::Panning;
                    self.last_pan_update = time;
                    self.emit(GestureEvent::PanStart {
                        x: self.start_x,
                        y: self.start_y,
                        timestamp: time,
                        frame_timestamp: self.frames.current_frame_timestamp(),
                    });
                }
            }
            GestureState::Panning => {
                // Latest-sample throttle: skipped samples are not buffered
                if time - self.last_pan_update >= self.config.pan_update_interval {
                    self.last_pan_update = time;
                    self.emit(GestureEvent::PanMove {
                        x,
                        y,
                        delta_x: x - self.start_x,
                        delta_y: y - self.start_y,
                        timestamp: time,
                        frame_timestamp: self.frames.current_frame_timestamp(),
                    });
                }
            }
        }
    }

    /// Primary button release. A short, small-movement pending release is
    /// a tap, promoted to a double-tap when the previous tap was close
    /// enough in time and position; any other pending release is silently
    /// discarded (no swipe gesture exists). A panning release emits
    /// PanStop. Always returns to Idle.
    pub fn pointer_released(&mut self, x: i32, y: i32, primary: bool, time: i64) {
        if !primary {
            return;
        }

        let elapsed = time - self.start_time;
        let distance = self.distance_from_start(x, y);

        match self.state {
            GestureState::Pending => {
                if distance <= self.config.move_threshold as f64
                    && elapsed < self.config.tap_long_press_threshold
                {
                    if self.is_double_tap(x, y, time) {
                        self.emit(GestureEvent::DoubleTap {
                            x,
                            y,
                            timestamp: time,
                            frame_timestamp: self.frames.current_frame_timestamp(),
                        });
                        self.last_tap = None;
                    } else {
                        self.emit(GestureEvent::Tap {
                            x,
                            y,
                            timestamp: time,
                            frame_timestamp: self.frames.current_frame_timestamp(),
                        });
                        self.last_tap = Some((time, x, y));
                    }
                }
            }
            GestureState::Panning => {
                self.emit(GestureEvent::PanStop {
                    x,
                    y,
                    timestamp: time,
                    frame_timestamp: self.frames.current_frame_timestamp(),
                });
            }
            GestureState::Idle => {}
        }

        self.state = GestureState::Idle;
        self.last_pan_update = 0;
    }

    /// Wheel sample. Negative rotation scrolls up, positive scrolls down,
    /// zero emits nothing. Independent of pointer-button state.
    pub fn wheel(&mut self, x: i32, y: i32, rotation: i32, time: i64) {
        if rotation < 0 {
            self.emit(GestureEvent::WheelUp {
                x,
                y,
                amount: rotation.abs(),
                timestamp: time,
                frame_timestamp: self.frames.current_frame_timestamp(),
            });
        } else if rotation > 0 {
            self.emit(GestureEvent::WheelDown {
                x,
                y,
                amount: rotation,
                timestamp: time,
                frame_timestamp: self.frames.current_frame_timestamp(),
            });
        }
    }

    /// Force the state machine back to Idle and clear the pan session
    /// bookkeeping. Double-tap memory survives a reset.
    pub fn reset(&mut self) {
        self.state = GestureState::Idle;
        self.last_pan_update = 0;
        debug!("Gesture recognizer reset to idle");
    }

    fn is_double_tap(&self, x: i32, y: i32, time: i64) -> bool {
        match self.last_tap {
            Some((tap_time, tap_x, tap_y)) => {
                time - tap_time < self.config.double_tap_threshold
                    && (x - tap_x).abs() < self.config.double_tap_tolerance
                    && (y - tap_y).abs() < self.config.double_tap_tolerance
            }
            None => false,
        }
    }

    fn distance_from_start(&self, x: i32, y: i32) -> f64 {
        let dx = (x - self.start_x) as f64;
        let dy = (y - self.start_y) as f64;
        dx.hypot(dy)
    }

    fn emit(&self, event: GestureEvent) {
        trace!("Emitting gesture: {}", event.name());
        if let Err(e) = self.events.try_send(event) {
            warn!("Dropping gesture event, channel unavailable: {}", e);
        }
    }
}
