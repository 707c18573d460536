//! Pipeline from raw pointer/window events to outbound commands.
//!
//! Two tokio tasks chained over channels: an input task driving the
//! gesture recognizer, and a gesture task mapping classified gestures to
//! pan-controller calls and camera commands. A third small task forwards
//! the pan controller's periodic emissions into the shared command
//! channel.
//!
//! ```text
//! RawInputEvent ─→ input task ─[GestureEvent]→ gesture task ─→ Command
//!                                                  │
//!                                           PanController ─[PanCommand]→ forwarder ─→ Command
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::command::Command;
use crate::gesture::{
    FrameClock, GestureConfig, GestureEvent, GestureRecognizer, PanController, SpeedTables,
    StreamType,
};
use crate::input::ndc::NdcSpace;
use crate::input::throttle::Throttler;

/// Pointer button identity as delivered by the host toolkit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

/// Raw event from the video-overlay surface, stamped at capture time.
#[derive(Clone, Debug)]
pub enum RawInputEvent {
    PointerPressed {
        x: i32,
        y: i32,
        button: PointerButton,
        timestamp: DateTime<Local>,
    },
    PointerReleased {
        x: i32,
        y: i32,
        button: PointerButton,
        timestamp: DateTime<Local>,
    },
    PointerDragged {
        x: i32,
        y: i32,
        timestamp: DateTime<Local>,
    },
    Wheel {
        x: i32,
        y: i32,
        rotation: i32,
        timestamp: DateTime<Local>,
    },
    SurfaceResized {
        width: i32,
        height: i32,
    },
}

/// Settings for one pipeline instance.
#[derive(Clone, Debug)]
pub struct PipelineSettings {
    /// Stream whose overlay this pipeline serves
    pub stream: StreamType,
    pub gesture: GestureConfig,
    pub speeds: SpeedTables,
    /// Minimum ms between outbound zoom step commands
    pub wheel_throttle_ms: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            stream: StreamType::Heat,
            gesture: GestureConfig::default(),
            speeds: SpeedTables::default(),
            wheel_throttle_ms: 50,
        }
    }
}

/// Handle for the spawned pipeline tasks.
///
/// The tasks shut down as a cascade when the raw input channel closes:
/// the input task drops the gesture sender, the gesture task shuts the
/// pan controller down, and the forwarder ends with the pan channel.
pub struct InputPipeline {}

impl InputPipeline {
    /// Wire and spawn the pipeline. `zoom_level` is the externally owned
    /// current zoom of the stream; `frame_clock` is fed by the video
    /// pipeline and stamps every emitted gesture.
    pub fn spawn(
        settings: PipelineSettings,
        raw_events: mpsc::Receiver<RawInputEvent>,
        commands: mpsc::Sender<Command>,
        zoom_level: watch::Receiver<usize>,
        frame_clock: FrameClock,
    ) -> Self {
        info!(
            "Spawning input pipeline for {} stream with settings: {:?}",
            settings.stream.as_keyword(),
            settings
        );

        let (gesture_tx, gesture_rx) = mpsc::channel(100);
        let (pan_tx, pan_rx) = mpsc::channel(32);
        let (surface_tx, surface_rx) = watch::channel::<Option<NdcSpace>>(None);

        let recognizer =
            GestureRecognizer::new(settings.gesture.clone(), gesture_tx, Arc::new(frame_clock));
        tokio::spawn(run_input_task(raw_events, recognizer, surface_tx));

        let pan = PanController::new(pan_tx, settings.stream, settings.speeds.clone());
        tokio::spawn(run_gesture_task(
            gesture_rx,
            pan,
            commands.clone(),
            surface_rx,
            zoom_level,
            settings.stream,
            Duration::from_millis(settings.wheel_throttle_ms),
        ));

        tokio::spawn(run_pan_forwarder(pan_rx, commands));

        Self {}
    }
}

/// Consume raw events, drive the recognizer and publish the surface size.
async fn run_input_task(
    mut raw_events: mpsc::Receiver<RawInputEvent>,
    mut recognizer: GestureRecognizer,
    surface: watch::Sender<Option<NdcSpace>>,
) {
    debug!("Input task started");
    while let Some(event) = raw_events.recv().await {
        match event {
            RawInputEvent::PointerPressed {
                x,
                y,
                button,
                timestamp,
            } => {
                recognizer.pointer_pressed(
                    x,
                    y,
                    button == PointerButton::Primary,
                    timestamp.timestamp_millis(),
                );
            }
            RawInputEvent::PointerReleased {
                x,
                y,
                button,
                timestamp,
            } => {
                recognizer.pointer_released(
                    x,
                    y,
                    button == PointerButton::Primary,
                    timestamp.timestamp_millis(),
                );
            }
            RawInputEvent::PointerDragged { x, y, timestamp } => {
                recognizer.pointer_dragged(x, y, timestamp.timestamp_millis());
            }
            RawInputEvent::Wheel {
                x,
                y,
                rotation,
                timestamp,
            } => {
                recognizer.wheel(x, y, rotation, timestamp.timestamp_millis());
            }
            RawInputEvent::SurfaceResized { width, height } => match NdcSpace::new(width, height)
            {
                Ok(space) => {
                    debug!("Surface resized to {}x{}", width, height);
                    surface.send_replace(Some(space));
                }
                Err(e) => warn!("Ignoring surface resize: {}", e),
            },
        }
    }
    recognizer.reset();
    debug!("Input task finished, raw event channel closed");
}

/// Map gestures onto pan-controller calls and camera commands.
async fn run_gesture_task(
    mut gestures: mpsc::Receiver<GestureEvent>,
    mut pan: PanController,
    commands: mpsc::Sender<Command>,
    surface: watch::Receiver<Option<NdcSpace>>,
    zoom_level: watch::Receiver<usize>,
    stream: StreamType,
    wheel_throttle: Duration,
) {
    debug!("Gesture task started");
    let zoom_throttle = Throttler::new(wheel_throttle);

    while let Some(event) = gestures.recv().await {
        debug!("Handling gesture: {}", event.name());
        match event {
            GestureEvent::PanStart { .. } => pan.start_pan(),
            GestureEvent::PanMove {
                delta_x, delta_y, ..
            } => {
                if let Some(space) = *surface.borrow() {
                    let (ndc_dx, ndc_dy) = space.delta_to_ndc(delta_x, delta_y);
                    pan.update_pan(ndc_dx, ndc_dy, *zoom_level.borrow());
                } else {
                    debug!("Ignoring pan move before the first surface size");
                }
            }
            GestureEvent::PanStop { .. } => pan.stop_pan(),
            GestureEvent::Tap {
                x,
                y,
                frame_timestamp,
                ..
            } => {
                if let Some(command) = goto_command(&surface, stream, x, y, frame_timestamp, false)
                {
                    send_command(&commands, command).await;
                }
            }
            GestureEvent::DoubleTap {
                x,
                y,
                frame_timestamp,
                ..
            } => {
                if let Some(command) = goto_command(&surface, stream, x, y, frame_timestamp, true)
                {
                    send_command(&commands, command).await;
                }
            }
            GestureEvent::WheelUp { .. } => {
                trigger_zoom(&zoom_throttle, &commands, stream, true);
            }
            GestureEvent::WheelDown { .. } => {
                trigger_zoom(&zoom_throttle, &commands, stream, false);
            }
        }
    }

    zoom_throttle.cleanup();
    pan.shutdown();
    debug!("Gesture task finished, gesture channel closed");
}

/// Forward periodic pan emissions into the shared command channel.
async fn run_pan_forwarder(
    mut pan_commands: mpsc::Receiver<crate::gesture::PanCommand>,
    commands: mpsc::Sender<Command>,
) {
    while let Some(pan_command) = pan_commands.recv().await {
        if commands.send(Command::from_pan(pan_command)).await.is_err() {
            warn!("Command channel closed, stopping pan forwarder");
            break;
        }
    }
}

fn goto_command(
    surface: &watch::Receiver<Option<NdcSpace>>,
    stream: StreamType,
    x: i32,
    y: i32,
    frame_time: Option<i64>,
    track: bool,
) -> Option<Command> {
    let Some(space) = *surface.borrow() else {
        debug!("Ignoring tap before the first surface size");
        return None;
    };
    let (ndc_x, ndc_y) = space.point_to_ndc(x, y);
    let rotary = if track {
        crate::command::RotaryCommand::StartTrackNdc {
            channel: stream,
            x: ndc_x,
            y: ndc_y,
            frame_time,
        }
    } else {
        crate::command::RotaryCommand::GotoNdc {
            channel: stream,
            x: ndc_x,
            y: ndc_y,
            frame_time,
        }
    };
    Some(Command::Rotary(rotary))
}

fn trigger_zoom(
    throttle: &Throttler,
    commands: &mpsc::Sender<Command>,
    stream: StreamType,
    zoom_in: bool,
) {
    let commands = commands.clone();
    throttle.trigger(move || {
        if let Err(e) = commands.try_send(Command::zoom_step(stream, zoom_in)) {
            warn!("Failed to emit zoom command: {}", e);
        }
    });
}

async fn send_command(commands: &mpsc::Sender<Command>, command: Command) {
    if let Err(e) = commands.send(command).await {
        warn!("Failed to emit command: {}", e);
    }
}
