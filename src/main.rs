use anyhow::{Context, Result};
use openscope::config::ScopeConfig;
use openscope::params::ParamId;
use openscope::util::signal::SignalGenerator;
use openscope::{AudioBlock, AudioProcessor, OscilloscopeProcessor, Point, ProcessorUpdate};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Serialize)]
struct Frame<'a> {
    sample_rate: f64,
    synced: bool,
    triggers: u64,
    params: Vec<(&'static str, String)>,
    points: &'a [Point],
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = ScopeConfig::load_or_default(path.as_deref());
    info!(
        "[scope] {} blocks of {} frames at {} Hz, {:?}",
        config.blocks, config.block_size, config.sample_rate, config.signal
    );

    let mut scope = OscilloscopeProcessor::new();
    config.apply(scope.params());
    scope.prepare(config.sample_rate);
    let display = scope.display();

    let mut generator = SignalGenerator::new(config.signal, config.dc_offset, config.sample_rate);
    let mut buffer = vec![0.0f32; config.block_size * config.channels];
    let mut triggers = 0u64;
    for _ in 0..config.blocks {
        generator.fill_interleaved(&mut buffer, config.channels);
        let block = AudioBlock::new(&buffer, config.channels, config.sample_rate);
        if let ProcessorUpdate::Snapshot(status) = scope.process_block(&block) {
            triggers += u64::from(status.triggers);
        }
    }
    info!("[scope] {triggers} triggers, sweep at column {}", scope.write_index());

    let params = display.params();
    let points = display.active_points();
    let frame = Frame {
        sample_rate: display.sample_rate(),
        synced: params.values().sync_draw(),
        triggers,
        params: ParamId::ALL
            .iter()
            .map(|&id| (id.name(), params.display_value(id, display.sample_rate())))
            .collect(),
        points: &points,
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer(&mut out, &frame).context("failed to write frame")?;
    writeln!(out).context("failed to write frame")?;
    Ok(())
}
