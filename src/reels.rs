use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use crate::catalog::CatalogEntry;
use crate::cropper::CroppedSymbol;
use crate::error::ReelError;
use crate::identifier::{CorrelationMatcher, PreparedEntry, SymbolIdentifier, SymbolMatcher};

/// The symbols of one grid column in one frame, keyed by row.
#[derive(Debug, Clone)]
pub struct Reel {
    pub frame: String,
    pub index: u32,
    pub symbols: BTreeMap<u32, Arc<CatalogEntry>>,
}

impl Reel {
    pub fn empty(frame: &str, index: u32) -> Self {
        Self {
            frame: frame.to_owned(),
            index,
            symbols: BTreeMap::new(),
        }
    }

    pub fn add_symbol(&mut self, row: u32, symbol: Arc<CatalogEntry>) {
        self.symbols.insert(row, symbol);
    }

    /// Row -> symbol name.
    pub fn names(&self) -> BTreeMap<u32, String> {
        self.symbols
            .iter()
            .map(|(&row, entry)| (row, entry.name.clone()))
            .collect()
    }
}

/// Turns the crops of one frame into reels, all or nothing.
pub struct ReelAssembler<M = CorrelationMatcher> {
    identifier: SymbolIdentifier<M>,
    catalog: Vec<PreparedEntry>,
}

impl<M: SymbolMatcher> ReelAssembler<M> {
    /// Catalog templates are prepared here, once for the assembler's lifetime.
    pub fn new(identifier: SymbolIdentifier<M>, catalog: &[Arc<CatalogEntry>]) -> Self {
        let catalog = identifier.prepare(catalog);
        Self {
            identifier,
            catalog,
        }
    }

    /// Identify every crop and group the results into one reel per column.
    ///
    /// Returns `Ok(None)` as soon as one crop matches nothing: the frame is
    /// either mid-spin or shows a symbol missing from the catalog, and its
    /// other cells are not trusted either. Grid extents come from the
    /// largest column and row indices present; an index that could not be
    /// part of a complete grid of this many crops is rejected up front.
    pub fn assemble(&self, crops: &[CroppedSymbol]) -> Result<Option<Vec<Reel>>, ReelError> {
        let started = Instant::now();

        let Some(first) = crops.first() else {
            return Err(ReelError::EmptyBatch);
        };
        let frame = first.frame.as_str();
        if let Some(other) = crops.iter().find(|c| c.frame != frame) {
            return Err(ReelError::MixedFrames {
                expected: frame.to_owned(),
                found: other.frame.clone(),
            });
        }

        if let Some(stray) = crops
            .iter()
            .find(|c| c.index.x as usize >= crops.len() || c.index.y as usize >= crops.len())
        {
            return Err(ReelError::IndexOutOfRange {
                frame: frame.to_owned(),
                column: stray.index.x,
                row: stray.index.y,
                crops: crops.len(),
            });
        }

        // both maxima are below crops.len(), so neither extent overflows
        let columns = crops.iter().map(|c| c.index.x as usize).max().unwrap_or(0) + 1;
        let rows = crops.iter().map(|c| c.index.y as usize).max().unwrap_or(0) + 1;

        let mut reels: Vec<Reel> = (0..columns).map(|i| Reel::empty(frame, i as u32)).collect();

        for crop in crops {
            let Some(symbol) = self.identifier.identify(crop, &self.catalog) else {
                tracing::info!(
                    "in frame {frame} symbol {:?} is not detected, frame is invalid",
                    (crop.index.x, crop.index.y)
                );
                return Ok(None);
            };
            reels[crop.index.x as usize].add_symbol(crop.index.y, symbol);
        }

        if let Some(reel) = reels.iter().find(|r| r.symbols.len() != rows) {
            return Err(ReelError::IncompleteGrid {
                frame: frame.to_owned(),
                column: reel.index,
                expected: rows,
                found: reel.symbols.len(),
            });
        }

        tracing::debug!("frame {frame} processed in {:?}", started.elapsed());
        Ok(Some(reels))
    }
}
