//! Trigger detection with retrigger lockout.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerMode {
    /// Retrigger whenever the display has filled up.
    #[default]
    Free,
    Rising,
    Falling,
    /// Free-running phase accumulator.
    Internal,
}

impl TriggerMode {
    pub const ALL: [TriggerMode; 4] = [
        TriggerMode::Free,
        TriggerMode::Rising,
        TriggerMode::Falling,
        TriggerMode::Internal,
    ];
    pub const COUNT: usize = Self::ALL.len();

    /// Decodes a normalized parameter value by scaling to the mode count and
    /// truncating. Out of range values clamp to the nearest mode, NaN is `Free`.
    pub fn from_normalized(value: f32) -> Self {
        let scaled = value * Self::COUNT as f32 + 1.0e-4;
        // `as` saturates and maps NaN to zero.
        let index = (scaled as usize).min(Self::COUNT - 1);
        Self::ALL[index]
    }

    pub fn to_normalized(self) -> f32 {
        self.index() as f32 / Self::COUNT as f32
    }

    pub fn index(self) -> usize {
        match self {
            TriggerMode::Free => 0,
            TriggerMode::Rising => 1,
            TriggerMode::Falling => 2,
            TriggerMode::Internal => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TriggerMode::Free => "Free",
            TriggerMode::Rising => "Rising",
            TriggerMode::Falling => "Falling",
            TriggerMode::Internal => "Internal",
        }
    }

    /// Only the edge modes honour the retrigger threshold.
    #[inline]
    pub fn uses_lockout(self) -> bool {
        matches!(self, TriggerMode::Rising | TriggerMode::Falling)
    }
}

/// Per-block trigger settings, derived from the parameter store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerSettings {
    pub mode: TriggerMode,
    /// Level in [-1, 1] for the edge modes.
    pub level: f32,
    /// Phase increment per sample for `Internal`.
    pub increment: f64,
    /// Minimum number of samples between two edge triggers.
    pub lockout: u32,
}

impl Default for TriggerSettings {
    fn default() -> Self {
        Self {
            mode: TriggerMode::Free,
            level: 0.0,
            increment: 0.0,
            lockout: 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TriggerDetector {
    previous: f32,
    phase: f64,
    since_last: u32,
}

impl TriggerDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluates one conditioned sample. `display_full` is only consulted in
    /// `Free` mode. The sample becomes the edge history for the next call
    /// whether or not the trigger fired.
    pub fn check(&mut self, settings: &TriggerSettings, sample: f32, display_full: bool) -> bool {
        let level = settings.level;
        let mut fired = match settings.mode {
            TriggerMode::Free => display_full,
            TriggerMode::Rising => sample >= level && self.previous < level,
            TriggerMode::Falling => sample <= level && self.previous > level,
            TriggerMode::Internal => {
                self.phase += settings.increment;
                if !self.phase.is_finite() {
                    self.phase = 0.0;
                    false
                } else if self.phase >= 1.0 {
                    // Increments above one wrap instead of piling up.
                    self.phase = self.phase.fract();
                    true
                } else {
                    false
                }
            }
        };

        self.since_last = self.since_last.saturating_add(1);
        if fired && settings.mode.uses_lockout() && self.since_last < settings.lockout {
            fired = false;
        }

        self.previous = sample;
        fired
    }

    /// Restarts the lockout window after a trigger. Edge history and the
    /// internal oscillator phase carry over.
    pub fn rearm(&mut self) {
        self.since_last = 0;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn samples_since_trigger(&self) -> u32 {
        self.since_last
    }
}
