//! Typed outbound command surface.
//!
//! Each semantic command maps to a nested keyed structure with fixed
//! lowercase hyphenated identifiers, e.g. `{rotary: {goto-ndc: {channel,
//! x, y}}}`. Optional fields such as the frame-time correlation id are
//! omitted entirely when absent. Encoding to the wire format and the
//! transport itself live outside this subsystem.

use serde::Serialize;

use crate::gesture::{PanCommand, RotaryDirection, StreamType};

/// Top-level command envelope keyed by the target subsystem.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Command {
    Rotary(RotaryCommand),
    DayCamera(CameraCommand),
    HeatCamera(CameraCommand),
}

/// Rotary platform commands.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case", rename_all_fields = "kebab-case")]
pub enum RotaryCommand {
    GotoNdc {
        channel: StreamType,
        x: f64,
        y: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        frame_time: Option<i64>,
    },
    StartTrackNdc {
        channel: StreamType,
        x: f64,
        y: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        frame_time: Option<i64>,
    },
    SetVelocity {
        azimuth_speed: f64,
        elevation_speed: f64,
        azimuth_direction: RotaryDirection,
        elevation_direction: RotaryDirection,
    },
    Halt {},
}

/// Camera channel commands driven by wheel gestures.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CameraCommand {
    ZoomIn {},
    ZoomOut {},
}

impl Command {
    /// Rotary command from a pan-controller emission.
    pub fn from_pan(command: PanCommand) -> Self {
        match command {
            PanCommand::Velocity {
                azimuth_speed,
                elevation_speed,
                azimuth_direction,
                elevation_direction,
            } => Command::Rotary(RotaryCommand::SetVelocity {
                azimuth_speed,
                elevation_speed,
                azimuth_direction,
                elevation_direction,
            }),
            PanCommand::Halt => Command::Rotary(RotaryCommand::Halt {}),
        }
    }

    /// Zoom step on the camera behind the given stream.
    pub fn zoom_step(stream: StreamType, zoom_in: bool) -> Self {
        let camera = if zoom_in {
            CameraCommand::ZoomIn {}
        } else {
            CameraCommand::ZoomOut {}
        };
        match stream {
            StreamType::Day => Command::DayCamera(camera),
            StreamType::Heat => Command::HeatCamera(camera),
        }
    }
}
