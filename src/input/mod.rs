//! Raw input delivery and the pipeline wiring gestures to outbound
//! commands.

pub mod handler;
pub mod ndc;
pub mod throttle;

pub use handler::{InputPipeline, PipelineSettings, PointerButton, RawInputEvent};
pub use ndc::{NdcError, NdcSpace};
pub use throttle::Throttler;
