pub mod conditioner;
pub mod oscilloscope;
pub mod peaks;
pub mod trigger;

#[derive(Debug, Clone, Copy)]
pub struct AudioBlock<'a> {
    /// Interleaved frames.
    pub samples: &'a [f32],
    pub channels: usize,
    pub sample_rate: f64,
}

impl<'a> AudioBlock<'a> {
    pub fn new(samples: &'a [f32], channels: usize, sample_rate: f64) -> Self {
        Self {
            samples,
            channels,
            sample_rate,
        }
    }

    pub fn mono(samples: &'a [f32], sample_rate: f64) -> Self {
        Self::new(samples, 1, sample_rate)
    }

    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels.max(1)
    }

    /// Samples of one channel. Channels past the last one read the last.
    pub fn channel(&self, index: usize) -> impl Iterator<Item = f32> + 'a {
        let channels = self.channels.max(1);
        let offset = index.min(channels - 1);
        let frames = self.frame_count();
        self.samples
            .iter()
            .skip(offset)
            .step_by(channels)
            .take(frames)
            .copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessorUpdate<T> {
    None,
    Snapshot(T),
}

impl<T> From<ProcessorUpdate<T>> for Option<T> {
    fn from(update: ProcessorUpdate<T>) -> Self {
        match update {
            ProcessorUpdate::Snapshot(s) => Some(s),
            ProcessorUpdate::None => None,
        }
    }
}

pub trait AudioProcessor {
    type Output;

    fn process_block(&mut self, block: &AudioBlock<'_>) -> ProcessorUpdate<Self::Output>;
    fn reset(&mut self);
}
