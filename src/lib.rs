//! Capture and trigger engine for a software oscilloscope.
//!
//! [`OscilloscopeProcessor`] runs inside the audio callback and decimates one
//! monitored channel into a fixed-width min/max point buffer. A display reads
//! the result through a [`ScopeDisplay`] handle without taking any locks.

pub mod config;
pub mod dsp;
pub mod params;
pub mod util;

pub use dsp::oscilloscope::{OscilloscopeProcessor, ScopeDisplay, ScopeStatus};
pub use dsp::peaks::{CENTER, COLUMNS, HEIGHT, POINT_COUNT, Point};
pub use dsp::trigger::TriggerMode;
pub use dsp::{AudioBlock, AudioProcessor, ProcessorUpdate};
pub use params::{PARAM_COUNT, ParamError, ParamId, STATE_LEN, ScopeParams, StateError};
