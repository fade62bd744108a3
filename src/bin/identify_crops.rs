use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use slot_reels::{Config, FrameResult, ReelAssembler, Reel, SymbolIdentifier, io};

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: identify_crops <frame_crops_dir> [frame_crops_dir ...]");
        std::process::exit(1);
    }

    let config = Config::from_env().context("failed to load configuration")?;
    let catalog = io::load_catalog(&config.catalog_dir).context("failed to load catalog")?;
    let assembler = ReelAssembler::new(SymbolIdentifier::from_config(&config.matching), &catalog);

    let mut results = Vec::new();
    for dir in args[1..].iter().map(PathBuf::from) {
        let symbols = io::read_cropped_symbols(&dir)
            .with_context(|| format!("failed to read crops from {}", dir.display()))?;
        let Some(first) = symbols.first() else {
            tracing::warn!("no crops in {}, skipping", dir.display());
            continue;
        };
        let frame = first.frame.clone();

        let reels = assembler
            .assemble(&symbols)
            .with_context(|| format!("failed to assemble {frame}"))?;
        results.push(FrameResult {
            frame,
            reels: reels.map(|reels| reels.iter().map(Reel::names).collect()),
        });
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&results).context("failed to serialize results")?
    );

    Ok(())
}
