//! Test signals for driving the scope without an audio device.

use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Signal {
    Sine { frequency: f64, amplitude: f32 },
    Square { frequency: f64, amplitude: f32 },
    Saw { frequency: f64, amplitude: f32 },
}

impl Default for Signal {
    fn default() -> Self {
        Signal::Sine {
            frequency: 220.0,
            amplitude: 0.8,
        }
    }
}

impl Signal {
    fn frequency(&self) -> f64 {
        match *self {
            Signal::Sine { frequency, .. }
            | Signal::Square { frequency, .. }
            | Signal::Saw { frequency, .. } => frequency,
        }
    }

    #[inline]
    fn shape(&self, phase: f64) -> f32 {
        match *self {
            Signal::Sine { amplitude, .. } => amplitude * (TAU * phase).sin() as f32,
            Signal::Square { amplitude, .. } => {
                if phase < 0.5 { amplitude } else { -amplitude }
            }
            Signal::Saw { amplitude, .. } => amplitude * (2.0 * phase - 1.0) as f32,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignalGenerator {
    signal: Signal,
    dc_offset: f32,
    step: f64,
    phase: f64,
}

impl SignalGenerator {
    pub fn new(signal: Signal, dc_offset: f32, sample_rate: f64) -> Self {
        let step = signal.frequency() / sample_rate.max(1.0);
        Self {
            signal,
            dc_offset,
            step: if step.is_finite() { step.rem_euclid(1.0) } else { 0.0 },
            phase: 0.0,
        }
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let out = self.signal.shape(self.phase) + self.dc_offset;
        self.phase = (self.phase + self.step).fract();
        out
    }

    /// Writes the same sample to every channel of each interleaved frame.
    pub fn fill_interleaved(&mut self, out: &mut [f32], channels: usize) {
        for frame in out.chunks_exact_mut(channels.max(1)) {
            frame.fill(self.next_sample());
        }
    }
}
