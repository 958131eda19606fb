//! Per-sample DC removal and gain staging ahead of the trigger.

use crate::util::audio::{DEFAULT_SAMPLE_RATE, clip};

// Corner frequency of the DC blocker. The coefficient is derived from it
// per sample rate.
pub const DC_CORNER_HZ: f64 = 250.0;

// Filter output below this magnitude is flushed to zero.
const DENORMAL_THRESHOLD: f64 = 1.0e-10;

/// One-pole high pass: `y = x - x[n-1] + R * y[n-1]`.
#[derive(Debug, Clone, Copy)]
pub struct DcBlocker {
    r: f64,
    x1: f64,
    y1: f64,
}

impl DcBlocker {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            r: Self::coefficient(sample_rate),
            x1: 0.0,
            y1: 0.0,
        }
    }

    pub fn coefficient(sample_rate: f64) -> f64 {
        1.0 - DC_CORNER_HZ / sample_rate
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.r = Self::coefficient(sample_rate);
    }

    pub fn r(&self) -> f64 {
        self.r
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f64 {
        let x = f64::from(x);
        let mut y = x - self.x1 + self.r * self.y1;
        // A non-finite input would otherwise stay in the state forever.
        if !y.is_finite() {
            self.reset();
            return 0.0;
        }
        if y.abs() < DENORMAL_THRESHOLD {
            y = 0.0;
        }
        self.x1 = x;
        self.y1 = y;
        y
    }

    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.y1 = 0.0;
    }
}

impl Default for DcBlocker {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE)
    }
}

/// Turns raw input into a display sample in [-1, 1].
#[derive(Debug, Clone, Copy, Default)]
pub struct Conditioner {
    dc: DcBlocker,
}

impl Conditioner {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            dc: DcBlocker::new(sample_rate),
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.dc.set_sample_rate(sample_rate);
    }

    pub fn dc_blocker(&self) -> &DcBlocker {
        &self.dc
    }

    /// The DC blocker runs on every sample so its state stays warm, its output
    /// is only used when `dc_kill` is set. NaN (bad input or a NaN gain) is
    /// treated as silence, and a non-finite input restarts the blocker.
    #[inline]
    pub fn process(&mut self, x: f32, gain: f32, dc_kill: bool) -> f32 {
        let filtered = self.dc.process(x);
        let source = if dc_kill { filtered as f32 } else { x };
        let y = clip(source * gain, 1.0);
        if y.is_nan() { 0.0 } else { y }
    }

    pub fn reset(&mut self) {
        self.dc.reset();
    }
}
