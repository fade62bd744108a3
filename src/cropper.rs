use std::path::{Path, PathBuf};

use image::RgbImage;

use crate::error::ReelError;
use crate::geometry::{SymbolsGrid, Vector};

/// One grid cell cut out of a frame.
#[derive(Debug, Clone)]
pub struct CroppedSymbol {
    pub frame: String,
    /// (column, row) in the grid.
    pub index: Vector,
    pub image: RgbImage,
}

/// Slices frames into per-cell crops.
#[derive(Debug, Clone, Default)]
pub struct SymbolCropper {
    /// When set, every crop is also written to `<dir>/<frame>/symbol_<x>_<y>.png`.
    debug_dir: Option<PathBuf>,
}

impl SymbolCropper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_debug_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.debug_dir = Some(dir.into());
        self
    }

    pub fn extract_symbols(
        &self,
        frame: &str,
        frame_image: &RgbImage,
        grid: &SymbolsGrid,
    ) -> Result<Vec<CroppedSymbol>, ReelError> {
        let symbols = grid
            .cells()
            .into_iter()
            .map(|cell| {
                Ok(CroppedSymbol {
                    frame: frame.to_owned(),
                    index: cell.index,
                    image: cell.roi.crop(frame_image)?,
                })
            })
            .collect::<Result<Vec<_>, ReelError>>()?;

        if let Some(dir) = &self.debug_dir {
            save_debug_crops(&dir.join(frame), &symbols);
        }

        Ok(symbols)
    }
}

/// Debug output is best effort; failures are logged and otherwise ignored.
fn save_debug_crops(dir: &Path, symbols: &[CroppedSymbol]) {
    if let Err(e) = std::fs::create_dir_all(dir) {
        tracing::warn!("failed to create debug dir {}: {e}", dir.display());
        return;
    }

    for symbol in symbols {
        let path = dir.join(format!("symbol_{}_{}.png", symbol.index.x, symbol.index.y));
        if let Err(e) = symbol.image.save(&path) {
            tracing::warn!("failed to save debug crop {}: {e}", path.display());
        }
    }
}
