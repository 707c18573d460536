//! Pan-to-velocity control for the rotary platform.
//!
//! Converts normalized pan displacement into a target rotary velocity
//! using a dead-zone/curve model and broadcasts it (or a halt) on a fixed
//! cadence, decoupled from the rate of incoming pointer samples. The
//! curve concentrates fine control near the dead-zone edge and saturates
//! at the NDC threshold; its numeric output must match the paired
//! device-side/web implementation.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Cadence of the periodic velocity/halt emission, matching the web
/// frontend.
pub const UPDATE_INTERVAL_MS: u64 = 120;

/// Video stream channel the pan gesture is controlling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StreamType {
    Heat,
    Day,
}

impl StreamType {
    pub fn as_keyword(&self) -> &'static str {
        match self {
            StreamType::Heat => "heat",
            StreamType::Day => "day",
        }
    }
}

/// Rotation direction for one rotary axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RotaryDirection {
    Clockwise,
    CounterClockwise,
}

impl RotaryDirection {
    pub fn as_keyword(&self) -> &'static str {
        match self {
            RotaryDirection::Clockwise => "clockwise",
            RotaryDirection::CounterClockwise => "counter-clockwise",
        }
    }

    /// Direction selection from the sign of the raw pan delta.
    fn from_delta(delta: f64) -> Self {
        if delta >= 0.0 {
            RotaryDirection::Clockwise
        } else {
            RotaryDirection::CounterClockwise
        }
    }
}

/// Most recently computed velocity target, published as one value so the
/// periodic task can never observe a torn combination of speed, dead-zone
/// flag and direction deltas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PanState {
    pub azimuth_speed: f64,
    pub elevation_speed: f64,
    pub in_dead_zone: bool,
    /// Raw deltas of the last update, kept for direction selection
    pub raw_dx: f64,
    pub raw_dy: f64,
}

impl Default for PanState {
    fn default() -> Self {
        Self {
            azimuth_speed: 0.0,
            elevation_speed: 0.0,
            in_dead_zone: true,
            raw_dx: 0.0,
            raw_dy: 0.0,
        }
    }
}

/// Curve parameters for one zoom level of one stream.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedConfig {
    pub max_rotation_speed: f64,
    pub min_rotation_speed: f64,
    /// Normalized displacement at which maximum speed is reached
    pub ndc_threshold: f64,
    pub dead_zone_radius: f64,
    /// Exponent applied to the normalized magnitude
    pub curve_steepness: f64,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            max_rotation_speed: 1.0,
            min_rotation_speed: 0.0001,
            ndc_threshold: 0.5,
            dead_zone_radius: 0.05,
            curve_steepness: 4.0,
        }
    }
}

impl SpeedConfig {
    fn with_max(max_rotation_speed: f64) -> Self {
        Self {
            max_rotation_speed,
            ..Self::default()
        }
    }

    /// True when the displacement magnitude carries no movement intent.
    pub fn in_dead_zone(&self, dx: f64, dy: f64) -> bool {
        dx.hypot(dy) <= self.dead_zone_radius
    }

    /// Per-axis rotation speeds for a displacement outside the dead zone.
    ///
    /// The magnitude is shifted past the dead zone, normalized against
    /// the span up to `ndc_threshold`, raised to `curve_steepness` and
    /// interpolated between min and max speed. Each axis is the unit
    /// direction component scaled by that speed, floored at the minimum.
    pub fn rotation_speeds(&self, dx: f64, dy: f64) -> (f64, f64) {
        let magnitude = dx.hypot(dy);

        let unit_x = dx / magnitude;
        let unit_y = dy / magnitude;

        let adjusted = (magnitude - self.dead_zone_radius).max(0.0);
        let span = self.ndc_threshold - self.dead_zone_radius;
        let normalized = (adjusted / span).min(1.0);
        let curved = normalized.powf(self.curve_steepness);

        let speed = self.min_rotation_speed
            + (self.max_rotation_speed - self.min_rotation_speed) * curved;

        (
            (unit_x * speed).abs().max(self.min_rotation_speed),
            (unit_y * speed).abs().max(self.min_rotation_speed),
        )
    }
}

/// Per-stream, per-zoom speed configuration. Zoom levels beyond a table's
/// length reuse the last entry; an empty table falls back to the default
/// config.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedTables {
    pub heat: Vec<SpeedConfig>,
    pub day: Vec<SpeedConfig>,
}

impl Default for SpeedTables {
    fn default() -> Self {
        // Reference zoom tables of the paired rotary firmware
        Self {
            heat: vec![
                SpeedConfig::with_max(0.1),
                SpeedConfig::with_max(0.25),
                SpeedConfig::with_max(0.5),
                SpeedConfig::with_max(1.0),
            ],
            day: vec![
                SpeedConfig::with_max(0.05),
                SpeedConfig::with_max(0.15),
                SpeedConfig::with_max(0.5),
                SpeedConfig::with_max(1.0),
            ],
        }
    }
}

impl SpeedTables {
    pub fn for_zoom(&self, stream: StreamType, zoom_level: usize) -> SpeedConfig {
        let table = match stream {
            StreamType::Heat => &self.heat,
            StreamType::Day => &self.day,
        };
        table
            .get(zoom_level)
            .or_else(|| table.last())
            .copied()
            .unwrap_or_default()
    }
}

/// Command emitted by the periodic task (and by `stop_pan`). The owner
/// maps these onto the outbound rotary command surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PanCommand {
    Velocity {
        azimuth_speed: f64,
        elevation_speed: f64,
        azimuth_direction: RotaryDirection,
        elevation_direction: RotaryDirection,
    },
    Halt,
}

/// Maintains a target rotary velocity and broadcasts it on a fixed
/// cadence.
///
/// `update_pan` is called from the gesture task while the periodic task
/// fires on its own schedule; both observe PanState as a whole value
/// through a watch channel. The periodic task is the only source of
/// velocity emission, so velocity and halt commands are never produced
/// concurrently for one controller.
pub struct PanController {
    commands: mpsc::Sender<PanCommand>,
    stream: StreamType,
    tables: SpeedTables,
    state: watch::Sender<PanState>,
    current_config: SpeedConfig,
    cancel: Option<CancellationToken>,
}

impl PanController {
    pub fn new(
        commands: mpsc::Sender<PanCommand>,
        stream: StreamType,
        tables: SpeedTables,
    ) -> Self {
        debug!("Creating pan controller for {} stream", stream.as_keyword());
        let (state, _) = watch::channel(PanState::default());
        Self {
            commands,
            stream,
            tables,
            state,
            current_config: SpeedConfig::default(),
            cancel: None,
        }
    }

    /// Reset the velocity target and (re)start the periodic task. Any
    /// previously running task is cancelled first; at most one task is
    /// ever outstanding. The first emission happens immediately.
    pub fn start_pan(&mut self) {
        self.state.send_replace(PanState::default());
        self.cancel_task();

        let token = CancellationToken::new();
        self.cancel = Some(token.clone());

        let mut state_rx = self.state.subscribe();
        let commands = self.commands.clone();
        info!("Starting periodic pan update task");

        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_millis(UPDATE_INTERVAL_MS));
            loop {
                tokio::select! {
                    // Cancellation wins over a ready tick, so no velocity
                    // can follow the halt emitted by stop_pan
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let state = *state_rx.borrow_and_update();
                        let command = if state.in_dead_zone {
                            PanCommand::Halt
                        } else {
                            PanCommand::Velocity {
                                azimuth_speed: state.azimuth_speed,
                                elevation_speed: state.elevation_speed,
                                azimuth_direction: RotaryDirection::from_delta(state.raw_dx),
                                elevation_direction: RotaryDirection::from_delta(state.raw_dy),
                            }
                        };
                        trace!("Periodic pan emission: {:?}", command);
                        if commands.send(command).await.is_err() {
                            warn!("Pan command channel closed, stopping periodic task");
                            break;
                        }
                    }
                }
            }
            debug!("Periodic pan update task finished");
        });
    }

    /// Recompute the velocity target from a normalized displacement and
    /// the current zoom level, publishing it as one atomic value.
    pub fn update_pan(&mut self, ndc_dx: f64, ndc_dy: f64, zoom_level: usize) {
        self.current_config = self.tables.for_zoom(self.stream, zoom_level);

        let new_state = if self.current_config.in_dead_zone(ndc_dx, ndc_dy) {
            PanState {
                raw_dx: ndc_dx,
                raw_dy: ndc_dy,
                ..PanState::default()
            }
        } else {
            let (azimuth_speed, elevation_speed) =
                self.current_config.rotation_speeds(ndc_dx, ndc_dy);
            PanState {
                azimuth_speed,
                elevation_speed,
                in_dead_zone: false,
                raw_dx: ndc_dx,
                raw_dy: ndc_dy,
            }
        };

        self.state.send_replace(new_state);
    }

    /// Cancel the periodic task and emit a halt exactly once. A
    /// momentarily full channel delays the halt until capacity frees up
    /// instead of losing it.
    pub fn stop_pan(&mut self) {
        self.cancel_task();
        match self.commands.try_send(PanCommand::Halt) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(command)) => {
                let commands = self.commands.clone();
                tokio::spawn(async move {
                    if commands.send(command).await.is_err() {
                        warn!("Pan command channel closed before halt was delivered");
                    }
                });
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Pan command channel closed, dropping halt");
            }
        }
    }

    /// Cancel any running task without emitting. Idempotent.
    pub fn shutdown(&mut self) {
        self.cancel_task();
    }

    /// Speed config selected by the most recent `update_pan`, exposed so
    /// the clamp/fallback policy is observable.
    pub fn current_speed_config(&self) -> SpeedConfig {
        self.current_config
    }

    /// Current velocity target as published to the periodic task.
    pub fn pan_state(&self) -> PanState {
        *self.state.borrow()
    }

    fn cancel_task(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
    }
}

impl Drop for PanController {
    fn drop(&mut self) {
        self.cancel_task();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn zero_displacement_is_dead_zone() {
        let cfg = SpeedConfig::default();
        assert!(cfg.in_dead_zone(0.0, 0.0));
        assert!(cfg.in_dead_zone(0.03, 0.04)); // magnitude 0.05, boundary inclusive
        assert!(!cfg.in_dead_zone(0.05, 0.01));
    }

    #[test]
    fn magnitude_at_ndc_threshold_saturates_at_max_speed() {
        let cfg = SpeedConfig::default();
        let (az, el) = cfg.rotation_speeds(cfg.ndc_threshold, 0.0);
        assert!((az - cfg.max_rotation_speed).abs() < EPS);
        assert!((el - cfg.min_rotation_speed).abs() < EPS);
    }

    #[test]
    fn magnitude_beyond_threshold_stays_clamped() {
        let cfg = SpeedConfig::default();
        let (az, el) = cfg.rotation_speeds(0.0, 2.0);
        assert!((el - cfg.max_rotation_speed).abs() < EPS);
        assert!((az - cfg.min_rotation_speed).abs() < EPS);
    }

    #[test]
    fn curve_midpoint_matches_reference_math() {
        let cfg = SpeedConfig::default();
        // magnitude 0.275: adjusted 0.225 over a 0.45 span, normalized 0.5,
        // curved 0.5^4 = 0.0625
        let (az, _) = cfg.rotation_speeds(0.275, 0.0);
        let expected = 0.0001 + (1.0 - 0.0001) * 0.0625;
        assert!((az - expected).abs() < EPS);
    }

    #[test]
    fn diagonal_split_respects_unit_direction() {
        let cfg = SpeedConfig::default();
        let d = 0.5 / std::f64::consts::SQRT_2;
        let (az, el) = cfg.rotation_speeds(d, -d);
        assert!((az - el).abs() < EPS);
        let expected = cfg.max_rotation_speed / std::f64::consts::SQRT_2;
        assert!((az - expected).abs() < 1e-9);
    }

    #[test]
    fn zoom_beyond_table_length_reuses_last_entry() {
        let tables = SpeedTables::default();
        assert_eq!(tables.for_zoom(StreamType::Heat, 1).max_rotation_speed, 0.25);
        assert_eq!(tables.for_zoom(StreamType::Heat, 99).max_rotation_speed, 1.0);
        assert_eq!(tables.for_zoom(StreamType::Day, 0).max_rotation_speed, 0.05);
        assert_eq!(tables.for_zoom(StreamType::Day, 7).max_rotation_speed, 1.0);
    }

    #[test]
    fn empty_table_falls_back_to_default_config() {
        let tables = SpeedTables {
            heat: Vec::new(),
            day: Vec::new(),
        };
        assert_eq!(tables.for_zoom(StreamType::Heat, 0), SpeedConfig::default());
    }

    #[test]
    fn update_pan_exposes_selected_config_and_state() {
        let (tx, _rx) = mpsc::channel(8);
        let mut pan = PanController::new(tx, StreamType::Heat, SpeedTables::default());

        pan.update_pan(0.0, 0.0, 2);
        assert_eq!(pan.current_speed_config().max_rotation_speed, 0.5);
        let state = pan.pan_state();
        assert!(state.in_dead_zone);
        assert_eq!(state.azimuth_speed, 0.0);
        assert_eq!(state.elevation_speed, 0.0);

        pan.update_pan(0.3, -0.1, 2);
        let state = pan.pan_state();
        assert!(!state.in_dead_zone);
        assert!(state.azimuth_speed > 0.0);
        assert!(state.azimuth_speed <= 0.5);
        assert_eq!(state.raw_dy, -0.1);
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_task_emits_halt_then_velocity_then_halt_on_stop() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut pan = PanController::new(tx, StreamType::Day, SpeedTables::default());

        pan.start_pan();
        // First fire happens immediately, before any update: dead zone
        assert_eq!(rx.recv().await, Some(PanCommand::Halt));

        pan.update_pan(0.4, -0.3, 3);
        match rx.recv().await {
            Some(PanCommand::Velocity {
                azimuth_direction,
                elevation_direction,
                azimuth_speed,
                ..
            }) => {
                assert_eq!(azimuth_direction, RotaryDirection::Clockwise);
                assert_eq!(elevation_direction, RotaryDirection::CounterClockwise);
                assert!(azimuth_speed > 0.0);
            }
            other => panic!("expected velocity command, got {:?}", other),
        }

        pan.stop_pan();
        // The immediate halt from stop_pan; the periodic task is cancelled
        let mut saw_halt = false;
        while let Ok(cmd) = rx.try_recv() {
            saw_halt = cmd == PanCommand::Halt;
        }
        assert!(saw_halt);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn halt_survives_a_momentarily_full_channel() {
        let (tx, mut rx) = mpsc::channel(1);
        let mut pan = PanController::new(tx.clone(), StreamType::Heat, SpeedTables::default());

        let filler = PanCommand::Velocity {
            azimuth_speed: 0.2,
            elevation_speed: 0.2,
            azimuth_direction: RotaryDirection::Clockwise,
            elevation_direction: RotaryDirection::Clockwise,
        };
        tx.try_send(filler).unwrap();

        // Channel is at capacity; the halt must still arrive once the
        // filler is consumed
        pan.stop_pan();
        assert_eq!(rx.recv().await, Some(filler));
        assert_eq!(rx.recv().await, Some(PanCommand::Halt));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn restart_resets_state_and_keeps_one_task() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut pan = PanController::new(tx, StreamType::Heat, SpeedTables::default());

        pan.start_pan();
        pan.update_pan(0.4, 0.4, 0);
        assert!(!pan.pan_state().in_dead_zone);

        pan.start_pan();
        // Restart resets the velocity target back to the dead zone
        assert!(pan.pan_state().in_dead_zone);

        // Drain a full second of emissions: one task at 120ms cadence
        // produces at most 9 (immediate fire + 8 ticks)
        tokio::time::sleep(Duration::from_millis(1000)).await;
        pan.shutdown();
        let mut count = 0;
        while let Ok(cmd) = rx.try_recv() {
            assert_eq!(cmd, PanCommand::Halt);
            count += 1;
        }
        assert!(count <= 10, "more emissions than one task can produce: {count}");

        // Idempotent shutdown
        pan.shutdown();
    }
}
