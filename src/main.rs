use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use slot_reels::config::{self, Config};
use slot_reels::{
    FrameDeduplicator, ReelAssembler, ReelScanner, SymbolCropper, SymbolIdentifier, io,
};

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env().context("failed to load configuration")?;

    // Frames directory: first argument, or SLOT_REELS_FRAMES_DIR
    let frames_dir = match std::env::args().nth(1) {
        Some(dir) => PathBuf::from(dir),
        None => PathBuf::from(config::required_env("SLOT_REELS_FRAMES_DIR")?),
    };

    tracing::info!(
        "slot-reels starting, frames: {}, catalog: {}, grid: {}x{}",
        frames_dir.display(),
        config.catalog_dir.display(),
        config.grid.columns(),
        config.grid.rows(),
    );

    let catalog = io::load_catalog(&config.catalog_dir).context("failed to load catalog")?;
    tracing::info!("loaded {} catalog symbol(s)", catalog.len());

    let mut cropper = SymbolCropper::new();
    if let Some(dir) = &config.debug_dir {
        tracing::info!("writing debug crops to {}", dir.display());
        cropper = cropper.with_debug_dir(dir);
    }

    let scanner = ReelScanner::new(
        config.grid,
        cropper,
        ReelAssembler::new(SymbolIdentifier::from_config(&config.matching), &catalog),
    );

    let frames = io::frame_stream(&frames_dir).context("failed to list frames")?;
    let settled = FrameDeduplicator::new(config.settle)
        .with_roi(config.roi)
        .settle(frames);

    let report = scanner.process_stream(settled).context("scan failed")?;

    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("failed to serialize report")?
    );

    Ok(())
}
