//! Parameter store shared between the control surface and the audio thread.
//!
//! All ten values are plain normalized floats. Nothing is validated or
//! clamped on the way in; values are only interpreted when the engine derives
//! its per-block settings from them.

use crate::dsp::peaks::column_increment;
use crate::dsp::trigger::{TriggerMode, TriggerSettings};
use crate::util::audio::amplitude_to_db;
use atomic_float::AtomicF32;
use serde::{Deserialize, Serialize};
use std::sync::atomic::Ordering;
use tracing::{debug, warn};

pub const PARAM_COUNT: usize = 10;
/// Size of the persisted parameter block in bytes.
pub const STATE_LEN: usize = PARAM_COUNT * std::mem::size_of::<f32>();

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamId {
    TriggerSpeed,
    TriggerType,
    TriggerLevel,
    TriggerLimit,
    TimeWindow,
    AmpWindow,
    SyncDraw,
    Channel,
    Freeze,
    DcKill,
}

impl ParamId {
    /// Persisted order. Never reorder.
    pub const ALL: [ParamId; PARAM_COUNT] = [
        ParamId::TriggerSpeed,
        ParamId::TriggerType,
        ParamId::TriggerLevel,
        ParamId::TriggerLimit,
        ParamId::TimeWindow,
        ParamId::AmpWindow,
        ParamId::SyncDraw,
        ParamId::Channel,
        ParamId::Freeze,
        ParamId::DcKill,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Result<Self, ParamError> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or(ParamError::Index(index))
    }

    pub fn default_value(self) -> f32 {
        match self {
            ParamId::TriggerSpeed => 0.5,
            ParamId::TriggerType => 0.0,
            ParamId::TriggerLevel => 0.5,
            ParamId::TriggerLimit => 0.5,
            ParamId::TimeWindow => 0.75,
            ParamId::AmpWindow => 0.5,
            ParamId::SyncDraw
            | ParamId::Channel
            | ParamId::Freeze
            | ParamId::DcKill => 0.0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ParamId::TriggerSpeed => "Internal Trigger Speed",
            ParamId::TriggerType => "Trigger Type",
            ParamId::TriggerLevel => "Trigger Level",
            ParamId::TriggerLimit => "Retrigger Threshold",
            ParamId::TimeWindow => "Time",
            ParamId::AmpWindow => "Amp",
            ParamId::SyncDraw => "Sync Redraw",
            ParamId::Channel => "Channel",
            ParamId::Freeze => "Freeze",
            ParamId::DcKill => "DC Kill",
        }
    }

    pub fn is_toggle(self) -> bool {
        matches!(
            self,
            ParamId::SyncDraw | ParamId::Channel | ParamId::Freeze | ParamId::DcKill
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    Index(usize),
}

impl std::fmt::Display for ParamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamError::Index(i) => {
                write!(f, "parameter index {i} out of range (0..{PARAM_COUNT})")
            }
        }
    }
}

impl std::error::Error for ParamError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    Length { expected: usize, actual: usize },
}

impl std::fmt::Display for StateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateError::Length { expected, actual } => write!(
                f,
                "parameter block is {actual} bytes, expected {expected}"
            ),
        }
    }
}

impl std::error::Error for StateError {}

// derived quantities

/// Linear gain, -60 dB to +60 dB over the parameter range.
#[inline]
pub fn amp_gain(amp: f32) -> f32 {
    10.0f32.powf(amp * 6.0 - 3.0)
}

#[inline]
pub fn amp_gain_db(amp: f32) -> f32 {
    amplitude_to_db(amp_gain(amp))
}

/// Trigger level in [-1, 1].
#[inline]
pub fn trigger_level(value: f32) -> f32 {
    value * 2.0 - 1.0
}

/// Phase increment per sample of the internal trigger oscillator.
#[inline]
pub fn trigger_speed_increment(speed: f32) -> f64 {
    10f64.powf(f64::from(speed) * 2.5 - 5.0)
}

/// Retrigger lockout in samples, 1 to 10000 over the parameter range.
pub fn retrigger_samples(limit: f32) -> u32 {
    let samples = 10f64.powf(f64::from(limit) * 4.0).round();
    if samples.is_nan() {
        1
    } else {
        // `as` saturates at the u32 bounds.
        (samples as u32).max(1)
    }
}

#[inline]
pub fn is_on(value: f32) -> bool {
    value > 0.5
}

/// One consistent-enough read of every parameter, taken once per block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamValues(pub [f32; PARAM_COUNT]);

impl Default for ParamValues {
    fn default() -> Self {
        Self(ParamId::ALL.map(ParamId::default_value))
    }
}

impl ParamValues {
    #[inline]
    pub fn get(&self, id: ParamId) -> f32 {
        self.0[id.index()]
    }

    pub fn gain(&self) -> f32 {
        amp_gain(self.get(ParamId::AmpWindow))
    }

    pub fn column_increment(&self) -> f64 {
        column_increment(self.get(ParamId::TimeWindow))
    }

    pub fn trigger_mode(&self) -> TriggerMode {
        TriggerMode::from_normalized(self.get(ParamId::TriggerType))
    }

    pub fn trigger(&self) -> TriggerSettings {
        TriggerSettings {
            mode: self.trigger_mode(),
            level: trigger_level(self.get(ParamId::TriggerLevel)),
            increment: trigger_speed_increment(self.get(ParamId::TriggerSpeed)),
            lockout: retrigger_samples(self.get(ParamId::TriggerLimit)),
        }
    }

    pub fn freeze(&self) -> bool {
        is_on(self.get(ParamId::Freeze))
    }

    pub fn dc_kill(&self) -> bool {
        is_on(self.get(ParamId::DcKill))
    }

    pub fn sync_draw(&self) -> bool {
        is_on(self.get(ParamId::SyncDraw))
    }

    /// Channel index for multi-channel input: 0 (left) or 1 (right).
    pub fn channel(&self) -> usize {
        usize::from(is_on(self.get(ParamId::Channel)))
    }
}

#[derive(Debug)]
pub struct ScopeParams {
    values: [AtomicF32; PARAM_COUNT],
}

impl Default for ScopeParams {
    fn default() -> Self {
        Self {
            values: ParamId::ALL.map(|id| AtomicF32::new(id.default_value())),
        }
    }
}

impl ScopeParams {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn set(&self, id: ParamId, value: f32) {
        self.values[id.index()].store(value, Ordering::Relaxed);
    }

    #[inline]
    pub fn get(&self, id: ParamId) -> f32 {
        self.values[id.index()].load(Ordering::Relaxed)
    }

    pub fn set_index(&self, index: usize, value: f32) -> Result<(), ParamError> {
        self.set(ParamId::from_index(index)?, value);
        Ok(())
    }

    pub fn get_index(&self, index: usize) -> Result<f32, ParamError> {
        Ok(self.get(ParamId::from_index(index)?))
    }

    pub fn values(&self) -> ParamValues {
        ParamValues(ParamId::ALL.map(|id| self.get(id)))
    }

    pub fn restore_defaults(&self) {
        for id in ParamId::ALL {
            self.set(id, id.default_value());
        }
    }

    /// The whole parameter block as little-endian f32s in `ParamId::ALL` order.
    pub fn save(&self) -> [u8; STATE_LEN] {
        let mut out = [0u8; STATE_LEN];
        for (chunk, id) in out.chunks_exact_mut(4).zip(ParamId::ALL) {
            chunk.copy_from_slice(&self.get(id).to_le_bytes());
        }
        out
    }

    /// Loads a block written by [`save`](Self::save). Any bit pattern of the
    /// right length is accepted as is, including NaN and out of range values.
    pub fn load(&self, bytes: &[u8]) -> Result<(), StateError> {
        if bytes.len() != STATE_LEN {
            warn!(
                "[params] rejecting state block of {} bytes (expected {STATE_LEN})",
                bytes.len()
            );
            return Err(StateError::Length {
                expected: STATE_LEN,
                actual: bytes.len(),
            });
        }
        for (chunk, id) in bytes.chunks_exact(4).zip(ParamId::ALL) {
            let raw = [chunk[0], chunk[1], chunk[2], chunk[3]];
            self.set(id, f32::from_le_bytes(raw));
        }
        debug!("[params] loaded state block");
        Ok(())
    }

    /// Human readable value in the parameter's physical unit.
    pub fn display_value(&self, id: ParamId, sample_rate: f64) -> String {
        format_value(id, self.get(id), sample_rate)
    }
}

pub fn format_value(id: ParamId, value: f32, sample_rate: f64) -> String {
    match id {
        ParamId::TimeWindow => {
            format_metric(10f64.powf(1.5 - f64::from(value) * 5.0) as f32)
        }
        ParamId::AmpWindow => format_metric(amp_gain(value)),
        ParamId::TriggerSpeed => {
            format_metric((trigger_speed_increment(value) * sample_rate) as f32)
        }
        ParamId::TriggerLimit => format_metric(retrigger_samples(value) as f32),
        ParamId::TriggerLevel => format!("{:.3}", trigger_level(value)),
        ParamId::TriggerType => TriggerMode::from_normalized(value).label().to_owned(),
        ParamId::Channel => String::from(if is_on(value) { "Right" } else { "Left" }),
        ParamId::SyncDraw | ParamId::Freeze | ParamId::DcKill => {
            String::from(if is_on(value) { "On" } else { "Off" })
        }
    }
}

// Three decimals for small readings, whole numbers past 1000.
fn format_metric(value: f32) -> String {
    if value < 1000.0 {
        format!("{value:.3}")
    } else {
        format!("{}", value as i64)
    }
}
