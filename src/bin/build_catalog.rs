use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use slot_reels::{CatalogBuilder, Config, io};

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: build_catalog <crops_dir> <output_dir>");
        std::process::exit(1);
    }
    let crops_dir = PathBuf::from(&args[1]);
    let output_dir = PathBuf::from(&args[2]);

    let config = Config::from_env().context("failed to load configuration")?;

    let crops = io::read_symbol_crops(&crops_dir).context("failed to read symbol crops")?;
    tracing::info!("read {} crop(s) from {}", crops.len(), crops_dir.display());

    let symbols = CatalogBuilder::new(config.cluster)
        .build(&crops)
        .context("clustering failed")?;

    io::save_images(&output_dir, &symbols).context("failed to save catalog")?;
    tracing::info!("wrote {} symbol(s) to {}", symbols.len(), output_dir.display());

    Ok(())
}
