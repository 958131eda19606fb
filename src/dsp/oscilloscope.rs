//! Triggered oscilloscope capture.
//!
//! Samples are conditioned, checked against the trigger and decimated into
//! min/max columns of the live point buffer. Each trigger flattens whatever
//! the previous sweep did not reach, copies the live buffer into the snapshot
//! buffer and restarts the sweep from the left edge.

use super::conditioner::Conditioner;
use super::peaks::{COLUMNS, DisplayBuffers, PeakTracker, Point};
use super::trigger::TriggerDetector;
use super::{AudioBlock, AudioProcessor, ProcessorUpdate};
use crate::params::{ParamValues, ScopeParams};
use crate::util::audio::DEFAULT_SAMPLE_RATE;
use atomic_float::AtomicF64;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing::{debug, info};

/// Emitted for blocks in which at least one trigger fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeStatus {
    pub triggers: u32,
    /// Write index at the end of the block.
    pub index: usize,
}

#[derive(Debug)]
struct Shared {
    buffers: DisplayBuffers,
    sample_rate: AtomicF64,
}

/// Read side of the engine for a display thread. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ScopeDisplay {
    shared: Arc<Shared>,
    params: Arc<ScopeParams>,
}

impl ScopeDisplay {
    pub fn params(&self) -> &Arc<ScopeParams> {
        &self.params
    }

    pub fn sample_rate(&self) -> f64 {
        self.shared.sample_rate.load(Ordering::Relaxed)
    }

    pub fn buffers(&self) -> &DisplayBuffers {
        &self.shared.buffers
    }

    /// The buffer currently being written. May show a sweep in progress.
    pub fn live_points(&self) -> Vec<Point> {
        self.shared.buffers.live_points()
    }

    /// The frame captured at the most recent trigger.
    pub fn snapshot_points(&self) -> Vec<Point> {
        self.shared.buffers.snapshot_points()
    }

    /// Snapshot in sync redraw mode, live otherwise.
    pub fn active_points(&self) -> Vec<Point> {
        if self.params.values().sync_draw() {
            self.snapshot_points()
        } else {
            self.live_points()
        }
    }
}

#[derive(Debug)]
pub struct OscilloscopeProcessor {
    params: Arc<ScopeParams>,
    shared: Arc<Shared>,
    sample_rate: f64,
    // Columns finished since the last trigger or reset.
    index: usize,
    conditioner: Conditioner,
    trigger: TriggerDetector,
    peaks: PeakTracker,
}

impl Default for OscilloscopeProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl OscilloscopeProcessor {
    pub fn new() -> Self {
        Self::with_params(Arc::new(ScopeParams::new()))
    }

    pub fn with_params(params: Arc<ScopeParams>) -> Self {
        Self {
            params,
            shared: Arc::new(Shared {
                buffers: DisplayBuffers::new(),
                sample_rate: AtomicF64::new(DEFAULT_SAMPLE_RATE),
            }),
            sample_rate: DEFAULT_SAMPLE_RATE,
            index: 0,
            conditioner: Conditioner::new(DEFAULT_SAMPLE_RATE),
            trigger: TriggerDetector::new(),
            peaks: PeakTracker::new(),
        }
    }

    pub fn params(&self) -> &Arc<ScopeParams> {
        &self.params
    }

    pub fn display(&self) -> ScopeDisplay {
        ScopeDisplay {
            shared: Arc::clone(&self.shared),
            params: Arc::clone(&self.params),
        }
    }

    /// Sets the operating sample rate and restarts capture. Must be called
    /// before processing and whenever the host rate changes.
    pub fn prepare(&mut self, sample_rate: f64) {
        if sample_rate != self.sample_rate {
            info!("[scope] sample rate {} Hz -> {sample_rate} Hz", self.sample_rate);
        }
        self.set_sample_rate(sample_rate);
        debug!(
            "[scope] prepared, dc coefficient {:.6}",
            self.conditioner.dc_blocker().r()
        );
    }

    // Silent counterpart of `prepare` for use inside the audio callback.
    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.shared.sample_rate.store(sample_rate, Ordering::Relaxed);
        self.conditioner.set_sample_rate(sample_rate);
        self.restart();
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn write_index(&self) -> usize {
        self.index
    }

    pub fn live_points(&self) -> Vec<Point> {
        self.shared.buffers.live_points()
    }

    pub fn snapshot_points(&self) -> Vec<Point> {
        self.shared.buffers.snapshot_points()
    }

    // Transient state only, the point buffers are left alone.
    fn restart(&mut self) {
        self.index = 0;
        self.peaks.reset();
        self.trigger.reset();
        self.conditioner.reset();
    }

    /// Processes one channel of audio. Returns the number of triggers.
    pub fn process(&mut self, samples: &[f32]) -> u32 {
        self.run(samples.iter().copied())
    }

    fn run(&mut self, samples: impl Iterator<Item = f32>) -> u32 {
        let values = self.params.values();
        if values.freeze() {
            self.restart();
            return 0;
        }
        self.capture(&values, samples)
    }

    fn capture(&mut self, values: &ParamValues, samples: impl Iterator<Item = f32>) -> u32 {
        let gain = values.gain();
        let dc_kill = values.dc_kill();
        let settings = values.trigger();
        let increment = values.column_increment();
        let buffers = &self.shared.buffers;
        let mut triggers = 0;

        for x in samples {
            let sample = self.conditioner.process(x, gain, dc_kill);

            if self.trigger.check(&settings, sample, self.index >= COLUMNS) {
                buffers.clear_from(self.index);
                buffers.publish_snapshot();
                self.index = 0;
                self.peaks.reset();
                self.trigger.rearm();
                triggers += 1;
            }

            self.peaks.track(sample);
            if let Some(column) = self.peaks.advance(increment) {
                // Sweeps longer than the display drop their tail.
                if self.index < COLUMNS {
                    buffers.write_column(self.index, column);
                    self.index += 1;
                }
            }
        }

        triggers
    }
}

impl AudioProcessor for OscilloscopeProcessor {
    type Output = ScopeStatus;

    fn process_block(&mut self, block: &AudioBlock<'_>) -> ProcessorUpdate<Self::Output> {
        if block.sample_rate != self.sample_rate {
            self.set_sample_rate(block.sample_rate);
        }
        if block.frame_count() == 0 {
            return ProcessorUpdate::None;
        }
        let channel = self.params.values().channel();
        match self.run(block.channel(channel)) {
            0 => ProcessorUpdate::None,
            triggers => ProcessorUpdate::Snapshot(ScopeStatus {
                triggers,
                index: self.index,
            }),
        }
    }

    fn reset(&mut self) {
        self.restart();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::peaks::{CENTER, POINT_COUNT, neutral_points, sample_to_y};
    use crate::dsp::trigger::TriggerMode;
    use crate::params::ParamId;

    const SR: f64 = 48_000.0;
    // 10^(1.5 - 0.3 * 5) = 1 column per sample.
    const ONE_SAMPLE_PER_COLUMN: f32 = 0.3;

    fn scope(mode: TriggerMode, time: f32) -> OscilloscopeProcessor {
        let mut s = OscilloscopeProcessor::new();
        s.params().set(ParamId::TriggerType, mode.to_normalized());
        s.params().set(ParamId::TimeWindow, time);
        s.prepare(SR);
        s
    }

    fn square(len: usize, half_period: usize) -> Vec<f32> {
        (0..len)
            .map(|n| if (n / half_period) % 2 == 0 { 1.0 } else { -1.0 })
            .collect()
    }

    fn time_for(columns_per_sample: f64) -> f32 {
        ((1.5 - columns_per_sample.log10()) / 5.0) as f32
    }

    fn column(points: &[Point], c: usize) -> (i32, i32) {
        (points[2 * c].y, points[2 * c + 1].y)
    }

    #[test]
    fn zero_length_blocks_are_ignored() {
        let mut s = scope(TriggerMode::Free, 0.5);
        assert_eq!(s.process(&[]), 0);
        assert_eq!(s.write_index(), 0);
        assert_eq!(
            s.process_block(&AudioBlock::mono(&[], SR)),
            ProcessorUpdate::None
        );
    }

    #[test]
    fn buffers_start_flat() {
        let s = OscilloscopeProcessor::new();
        assert_eq!(s.live_points(), neutral_points());
        assert_eq!(s.snapshot_points(), neutral_points());
        assert_eq!(s.live_points().len(), POINT_COUNT);
        assert_eq!(s.live_points()[7], Point { x: 3, y: CENTER });
    }

    #[test]
    fn free_mode_index_never_exceeds_capacity() {
        let mut s = scope(TriggerMode::Free, ONE_SAMPLE_PER_COLUMN);
        let mut last = 0;
        let input = square(5_000, 3);
        for (n, &x) in input.iter().enumerate() {
            let fired = s.process(&[x]);
            let index = s.write_index();
            assert!(index <= COLUMNS);
            if fired == 0 {
                assert!(index > last || n == 0, "index stalled at sample {n}");
            }
            last = index;
        }
    }

    #[test]
    fn free_mode_retriggers_when_display_fills() {
        let mut s = scope(TriggerMode::Free, ONE_SAMPLE_PER_COLUMN);
        assert_eq!(s.process(&vec![0.0; COLUMNS]), 0);
        assert_eq!(s.write_index(), COLUMNS);
        assert_eq!(s.process(&[0.5]), 1);
        assert_eq!(s.write_index(), 1);
    }

    #[test]
    fn full_scale_square_spans_both_extremes() {
        let mut s = scope(TriggerMode::Free, ONE_SAMPLE_PER_COLUMN);
        s.process(&square(COLUMNS, 2));
        assert_eq!(s.write_index(), COLUMNS);
        let live = s.live_points();
        let top = sample_to_y(1.0);
        let bottom = sample_to_y(-1.0);
        for c in 0..COLUMNS {
            let expected = if (c / 2) % 2 == 0 { top } else { bottom };
            assert_eq!(column(&live, c), (expected, expected), "column {c}");
        }
        assert_eq!(live.iter().map(|p| p.y).min(), Some(top));
        assert_eq!(live.iter().map(|p| p.y).max(), Some(bottom));
    }

    #[test]
    fn decimated_square_columns_hold_min_and_max() {
        // Every column after the first spans at least three samples.
        let mut s = scope(TriggerMode::Free, time_for(0.3));
        s.process(&square(COLUMNS * 2, 2));
        assert!(s.write_index() > COLUMNS / 2);
        let live = s.live_points();
        let top = sample_to_y(1.0);
        let bottom = sample_to_y(-1.0);
        for c in 1..s.write_index() {
            let (a, b) = column(&live, c);
            assert_eq!((a.min(b), a.max(b)), (top, bottom), "column {c}");
        }
    }

    #[test]
    fn point_order_follows_most_recent_extreme() {
        let mut s = scope(TriggerMode::Free, time_for(0.3));
        // The first sample closes column 0, then three samples per column.
        s.process(&[0.0]);
        s.process(&[-0.8, 0.0, 0.8]);
        s.process(&[0.8, 0.0, -0.8]);
        assert_eq!(s.write_index(), 3);
        let live = s.live_points();
        assert_eq!(column(&live, 1), (sample_to_y(-0.8), sample_to_y(0.8)));
        assert_eq!(column(&live, 2), (sample_to_y(0.8), sample_to_y(-0.8)));
    }

    #[test]
    fn rising_trigger_fires_at_crossing() {
        let mut s = scope(TriggerMode::Rising, ONE_SAMPLE_PER_COLUMN);
        s.params().set(ParamId::TriggerLevel, 0.5); // level 0.0
        s.params().set(ParamId::TriggerLimit, 0.0); // one sample lockout
        let mut input = vec![-0.5; 200];
        input[137] = 0.25;
        let mut fired_at = Vec::new();
        for (n, &x) in input.iter().enumerate() {
            if s.process(&[x]) > 0 {
                fired_at.push(n);
            }
        }
        assert_eq!(fired_at, [137]);
        // The crossing sample is the first column of the new sweep.
        assert_eq!(s.write_index(), 200 - 137);
        assert_eq!(column(&s.live_points(), 0), (sample_to_y(0.25), sample_to_y(0.25)));
    }

    #[test]
    fn lockout_merges_close_crossings() {
        let mut s = scope(TriggerMode::Rising, 0.5);
        s.params().set(ParamId::TriggerLevel, 0.5);
        s.params().set(ParamId::TriggerLimit, 0.5); // 100 samples
        let mut input = vec![-0.5; 400];
        for n in [150, 160, 300] {
            input[n] = 0.5;
        }
        assert_eq!(s.process(&input), 2);
    }

    #[test]
    fn internal_trigger_runs_at_oscillator_rate() {
        let mut s = scope(TriggerMode::Internal, 0.5);
        // 10^(0.8 * 2.5 - 5) = 1/1000 per sample.
        s.params().set(ParamId::TriggerSpeed, 0.8);
        s.params().set(ParamId::TriggerLimit, 1.0);
        let fired = s.process(&vec![0.0; 10_500]);
        assert!((9..=10).contains(&fired), "{fired} triggers");
    }

    #[test]
    fn reset_is_idempotent() {
        let mut s = scope(TriggerMode::Rising, 0.5);
        s.process(&square(777, 5));
        s.reset();
        let once = format!("{s:?}");
        s.reset();
        assert_eq!(format!("{s:?}"), once);
        assert_eq!(s.write_index(), 0);
        assert_eq!(s.peaks.counter(), 1.0);
    }

    #[test]
    fn reset_keeps_buffer_contents() {
        let mut s = scope(TriggerMode::Free, ONE_SAMPLE_PER_COLUMN);
        s.process(&square(100, 2));
        let live = s.live_points();
        s.reset();
        s.prepare(96_000.0);
        assert_eq!(s.live_points(), live);
        assert_eq!(s.sample_rate(), 96_000.0);
        assert_eq!(s.display().sample_rate(), 96_000.0);
    }

    #[test]
    fn freeze_leaves_buffers_untouched() {
        let mut s = scope(TriggerMode::Free, ONE_SAMPLE_PER_COLUMN);
        s.process(&square(COLUMNS + 50, 3));
        let live = s.live_points();
        let snap = s.snapshot_points();

        s.params().set(ParamId::Freeze, 1.0);
        for _ in 0..10 {
            assert_eq!(s.process(&square(3_000, 7)), 0);
        }
        assert_eq!(s.live_points(), live);
        assert_eq!(s.snapshot_points(), snap);
        assert_eq!(s.write_index(), 0);

        // Leaving freeze starts a fresh sweep.
        s.params().set(ParamId::Freeze, 0.0);
        s.process(&[0.0]);
        assert_eq!(s.write_index(), 1);
    }

    #[test]
    fn snapshot_matches_live_at_trigger() {
        let mut s = scope(TriggerMode::Rising, ONE_SAMPLE_PER_COLUMN);
        s.params().set(ParamId::TriggerLevel, 0.5);
        s.params().set(ParamId::TriggerLimit, 0.0);

        // Partial sweep, then a crossing.
        let mut first = vec![-0.5; 40];
        first[10] = 0.5;
        s.process(&first);
        let index = s.write_index();
        let mut expected = s.live_points();
        for p in &mut expected[2 * index..] {
            p.y = CENTER;
        }
        assert_eq!(s.process(&[0.9]), 1);
        assert_eq!(s.snapshot_points(), expected);

        // No crossing: the snapshot holds while the live buffer moves on.
        s.process(&vec![0.9; 100]);
        assert_eq!(s.snapshot_points(), expected);
        assert_ne!(s.live_points(), expected);
    }

    #[test]
    fn trigger_flattens_unreached_columns() {
        let mut s = scope(TriggerMode::Rising, ONE_SAMPLE_PER_COLUMN);
        s.params().set(ParamId::TriggerLevel, 0.5);
        s.params().set(ParamId::TriggerLimit, 0.0);
        // A full sweep at a high level, then a short sweep cut off by the
        // next crossing.
        s.process(&[-0.5]);
        s.process(&vec![0.5; COLUMNS + 5]);
        assert_eq!(s.process(&[-0.5, 0.5]), 1);
        s.process(&[0.5, 0.5, -0.5]);
        assert_eq!(s.write_index(), 4);
        assert_eq!(s.process(&[0.5]), 1);

        let snap = s.snapshot_points();
        assert_eq!(column(&snap, 0).0, sample_to_y(0.5));
        assert_eq!(column(&snap, 3).0, sample_to_y(-0.5));
        assert!(snap[2 * 4..].iter().all(|p| p.y == CENTER));
    }

    #[test]
    fn degenerate_time_window_never_hangs() {
        for time in [f32::NAN, f32::INFINITY, 5.0] {
            let mut s = scope(TriggerMode::Free, time);
            s.process(&square(10_000, 4));
            // Only the column opened by the restart ever closes.
            assert_eq!(s.write_index(), 1, "time {time}");
        }
        for time in [f32::NEG_INFINITY, -3.0] {
            let mut s = scope(TriggerMode::Free, time);
            // Clamped to one column per sample.
            s.process(&[0.1; 10]);
            assert_eq!(s.write_index(), 10, "time {time}");
        }
    }

    #[test]
    fn internal_trigger_recovers_after_extreme_speed() {
        let mut s = scope(TriggerMode::Internal, 0.5);
        s.params().set(ParamId::TriggerSpeed, 10.0);
        s.process(&[0.0; 4]);
        // 10^(0.5 * 2.5 - 5), roughly one trigger per 5600 samples.
        s.params().set(ParamId::TriggerSpeed, 0.5);
        let fired = s.process(&vec![0.0; 10_000]);
        assert!((1..=2).contains(&fired), "{fired} triggers");

        s.params().set(ParamId::TriggerSpeed, f32::NAN);
        s.process(&[0.0; 4]);
        s.params().set(ParamId::TriggerSpeed, 0.8);
        let fired = s.process(&vec![0.0; 10_500]);
        assert!((9..=10).contains(&fired), "{fired} triggers");
    }

    #[test]
    fn dc_kill_survives_a_nan_sample() {
        let mut s = scope(TriggerMode::Free, ONE_SAMPLE_PER_COLUMN);
        s.params().set(ParamId::DcKill, 1.0);
        s.process(&[f32::NAN]);
        let input: Vec<f32> = square(2_000, 8).iter().map(|x| x * 0.9).collect();
        s.process(&input);
        assert!(s.live_points().iter().any(|p| p.y != CENTER));
    }

    #[test]
    fn degenerate_parameters_keep_samples_bounded() {
        let mut s = scope(TriggerMode::Free, ONE_SAMPLE_PER_COLUMN);
        s.params().set(ParamId::AmpWindow, f32::NAN);
        s.params().set(ParamId::TriggerType, -7.0);
        s.params().set(ParamId::TriggerLimit, f32::NAN);
        s.process(&square(2_000, 3));
        let live = s.live_points();
        assert!(live.iter().all(|p| (0..=2 * CENTER).contains(&p.y)));

        s.params().set(ParamId::AmpWindow, 50.0);
        s.process(&square(2_000, 3));
        assert!(s.live_points().iter().all(|p| (0..=2 * CENTER).contains(&p.y)));
    }

    #[test]
    fn dc_kill_centres_offset_signal() {
        let mut s = scope(TriggerMode::Free, ONE_SAMPLE_PER_COLUMN);
        s.params().set(ParamId::DcKill, 1.0);
        s.process(&vec![0.5; 48_000]);
        s.process(&vec![0.5; COLUMNS]);
        assert!(s.live_points().iter().all(|p| p.y == CENTER));
    }

    #[test]
    fn channel_select_reads_right_channel() {
        let mut s = scope(TriggerMode::Free, ONE_SAMPLE_PER_COLUMN);
        let frames: Vec<f32> = (0..10).flat_map(|_| [0.5, -0.5]).collect();
        s.process_block(&AudioBlock::new(&frames, 2, SR));
        assert_eq!(column(&s.live_points(), 9).0, sample_to_y(0.5));

        s.params().set(ParamId::Channel, 1.0);
        s.reset();
        s.process_block(&AudioBlock::new(&frames, 2, SR));
        assert_eq!(column(&s.live_points(), 9).0, sample_to_y(-0.5));
    }

    #[test]
    fn process_block_reports_triggers_and_follows_rate() {
        let mut s = scope(TriggerMode::Free, ONE_SAMPLE_PER_COLUMN);
        let block = vec![0.0; COLUMNS + 10];
        let update = s.process_block(&AudioBlock::mono(&block, 96_000.0));
        assert_eq!(s.sample_rate(), 96_000.0);
        assert_eq!(
            update,
            ProcessorUpdate::Snapshot(ScopeStatus {
                triggers: 1,
                index: 10,
            })
        );
        let update = s.process_block(&AudioBlock::mono(&block[..5], 96_000.0));
        assert_eq!(update, ProcessorUpdate::None);
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn block_rate_change_is_silent() {
        let log = LogBuffer::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_writer(move || writer.clone())
            .finish();

        let mut s = scope(TriggerMode::Free, ONE_SAMPLE_PER_COLUMN);
        tracing::subscriber::with_default(subscriber, || {
            s.process_block(&AudioBlock::mono(&[0.0; 64], 96_000.0));
            assert_eq!(s.sample_rate(), 96_000.0);
            assert!(log.0.lock().unwrap().is_empty());

            s.prepare(SR);
        });
        let text = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();
        assert!(text.contains("[scope]"), "{text}");
    }

    #[test]
    fn display_handle_follows_sync_flag() {
        let mut s = scope(TriggerMode::Free, ONE_SAMPLE_PER_COLUMN);
        let display = s.display();
        s.process(&vec![0.5; 20]);
        assert_eq!(display.active_points(), s.live_points());
        display.params().set(ParamId::SyncDraw, 1.0);
        assert_eq!(display.active_points(), neutral_points());
        assert_eq!(display.buffers().snapshot_generation(), 0);
    }
}
