//! Min/max decimation into screen-space point buffers.
//!
//! Every display column is stored as two points sharing the same x: the
//! column's minimum and maximum, ordered so that a line drawn through the
//! points zig-zags instead of crossing itself.

use serde::Serialize;
use std::hint;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering, fence};

/// Horizontal resolution of the display, in columns.
pub const COLUMNS: usize = 628;
/// Vertical resolution of the display.
pub const HEIGHT: i32 = 270;
/// Y coordinate of a zero sample.
pub const CENTER: i32 = HEIGHT / 2 - 1;
/// Two points (min and max) per column.
pub const POINT_COUNT: usize = COLUMNS * 2;

// Running extrema start outside any conditioned sample.
const EXTREMA_SENTINEL: f32 = 1.0e30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    #[inline]
    pub const fn centered(slot: usize) -> Self {
        Self {
            x: (slot / 2) as i32,
            y: CENTER,
        }
    }
}

pub fn neutral_points() -> Vec<Point> {
    (0..POINT_COUNT).map(Point::centered).collect()
}

/// Maps a sample in [-1, 1] to a y coordinate. Larger values are higher up on
/// screen, so they get smaller coordinates.
#[inline]
pub fn sample_to_y(value: f32) -> i32 {
    let center = CENTER as f32;
    (center - value * center) as i32
}

/// One finished column, in draw order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub first: i32,
    pub second: i32,
}

/// Y coordinates of a point buffer. X is implied by the slot.
#[derive(Debug)]
struct PointArray {
    ys: Box<[AtomicI32]>,
}

impl PointArray {
    fn new() -> Self {
        Self {
            ys: (0..POINT_COUNT).map(|_| AtomicI32::new(CENTER)).collect(),
        }
    }

    #[inline]
    fn store(&self, slot: usize, y: i32) {
        self.ys[slot].store(y, Ordering::Relaxed);
    }

    #[inline]
    fn load(&self, slot: usize) -> i32 {
        self.ys[slot].load(Ordering::Relaxed)
    }

    fn read_into(&self, out: &mut [Point]) {
        for (slot, (point, y)) in out.iter_mut().zip(self.ys.iter()).enumerate() {
            *point = Point {
                x: (slot / 2) as i32,
                y: y.load(Ordering::Relaxed),
            };
        }
    }
}

/// The live and snapshot point buffers, shared between the audio thread
/// (sole writer) and any number of readers.
///
/// The live buffer is read without coordination and may show a frame that is
/// still being drawn. The snapshot buffer is only rewritten on a trigger, and
/// that copy is guarded by a sequence counter so readers never return a
/// partially copied frame.
#[derive(Debug)]
pub struct DisplayBuffers {
    live: PointArray,
    snapshot: PointArray,
    // Odd while a snapshot copy is in progress.
    sequence: AtomicU32,
}

impl Default for DisplayBuffers {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayBuffers {
    pub fn new() -> Self {
        Self {
            live: PointArray::new(),
            snapshot: PointArray::new(),
            sequence: AtomicU32::new(0),
        }
    }

    pub(crate) fn write_column(&self, column: usize, values: Column) {
        debug_assert!(column < COLUMNS);
        self.live.store(column * 2, values.first);
        self.live.store(column * 2 + 1, values.second);
    }

    /// Flattens every column from `column` to the right edge.
    pub(crate) fn clear_from(&self, column: usize) {
        for slot in (column * 2).min(POINT_COUNT)..POINT_COUNT {
            self.live.store(slot, CENTER);
        }
    }

    /// Copies the live buffer into the snapshot buffer.
    pub(crate) fn publish_snapshot(&self) {
        let seq = self.sequence.load(Ordering::Relaxed);
        self.sequence.store(seq.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);
        for slot in 0..POINT_COUNT {
            self.snapshot.store(slot, self.live.load(slot));
        }
        self.sequence.store(seq.wrapping_add(2), Ordering::Release);
    }

    /// Number of completed snapshot copies, usable as a frame counter.
    pub fn snapshot_generation(&self) -> u32 {
        self.sequence.load(Ordering::Acquire) / 2
    }

    pub fn read_live(&self, out: &mut [Point]) {
        self.live.read_into(out);
    }

    pub fn read_snapshot(&self, out: &mut [Point]) {
        loop {
            let start = self.sequence.load(Ordering::Acquire);
            if start & 1 == 0 {
                self.snapshot.read_into(out);
                fence(Ordering::Acquire);
                if self.sequence.load(Ordering::Relaxed) == start {
                    return;
                }
            }
            hint::spin_loop();
        }
    }

    pub fn live_points(&self) -> Vec<Point> {
        let mut out = neutral_points();
        self.read_live(&mut out);
        out
    }

    pub fn snapshot_points(&self) -> Vec<Point> {
        let mut out = neutral_points();
        self.read_snapshot(&mut out);
        out
    }
}

/// Running min/max and the fractional column counter.
#[derive(Debug, Clone, Copy)]
pub struct PeakTracker {
    min: f32,
    max: f32,
    // Whether the most recent extreme update was a new maximum.
    last_is_max: bool,
    counter: f64,
}

impl Default for PeakTracker {
    fn default() -> Self {
        Self {
            min: EXTREMA_SENTINEL,
            max: -EXTREMA_SENTINEL,
            last_is_max: false,
            counter: 1.0,
        }
    }
}

impl PeakTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a fresh column and resets the counter.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[inline]
    pub fn track(&mut self, sample: f32) {
        if sample > self.max {
            self.max = sample;
            self.last_is_max = true;
        }
        if sample < self.min {
            self.min = sample;
            self.last_is_max = false;
        }
    }

    /// Advances the counter by `increment` columns. Returns the finished
    /// column when the counter crosses 1.0, consuming the integer part.
    ///
    /// Callers pass an increment already clamped by [`column_increment`], so
    /// at most one column finishes per sample.
    #[inline]
    pub fn advance(&mut self, increment: f64) -> Option<Column> {
        self.counter += increment;
        if self.counter < 1.0 {
            return None;
        }
        self.counter -= 1.0;

        let max_y = sample_to_y(self.max);
        let min_y = sample_to_y(self.min);
        let column = if self.last_is_max {
            Column {
                first: min_y,
                second: max_y,
            }
        } else {
            Column {
                first: max_y,
                second: min_y,
            }
        };
        self.min = EXTREMA_SENTINEL;
        self.max = -EXTREMA_SENTINEL;
        Some(column)
    }

    pub fn counter(&self) -> f64 {
        self.counter
    }

    pub fn extrema(&self) -> (f32, f32) {
        (self.min, self.max)
    }
}

/// Columns per sample for a time window value: `10^(1.5 - t * 5)`, clamped
/// to [0, 1]. NaN and non-positive rates never finish a column, anything
/// above one finishes exactly one column per sample.
pub fn column_increment(time_window: f32) -> f64 {
    let rate = 10f64.powf(1.5 - f64::from(time_window) * 5.0);
    if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) }
}
