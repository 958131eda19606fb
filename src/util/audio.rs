// Default sample rate (Hz) used until the host prepares the engine.
// prepare() always overrides it, this exists mainly as a default during
// init and a fallback.
pub const DEFAULT_SAMPLE_RATE: f64 = 44_100.0;

// decibel conversion constants/utils

// Floor value (dB) reported for silent or zero gain.
pub const DB_FLOOR: f32 = -1000.0;

// Smallest magnitude that still converts to a finite dB value.
const AMPLITUDE_EPSILON: f32 = 1.0e-30;

// Convert a linear amplitude to decibels: 20 * log10(|x|).
#[inline(always)]
pub fn amplitude_to_db(linear: f32) -> f32 {
    let magnitude = linear.abs();
    if magnitude > AMPLITUDE_EPSILON {
        20.0 * magnitude.log10()
    } else {
        DB_FLOOR
    }
}

// Hard clip into [-limit, limit]. NaN passes through unchanged.
#[inline(always)]
pub fn clip(sample: f32, limit: f32) -> f32 {
    if sample > limit {
        limit
    } else if sample < -limit {
        -limit
    } else {
        sample
    }
}
