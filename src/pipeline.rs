use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use image::RgbImage;
use serde::Serialize;

use crate::cropper::SymbolCropper;
use crate::error::ReelError;
use crate::geometry::SymbolsGrid;
use crate::identifier::{CorrelationMatcher, SymbolMatcher};
use crate::reels::{Reel, ReelAssembler};

/// Outcome for one settled frame; `reels` is `None` when the frame was rejected.
#[derive(Debug, Clone, Serialize)]
pub struct FrameResult {
    pub frame: String,
    pub reels: Option<Vec<BTreeMap<u32, String>>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub frames: Vec<FrameResult>,
}

impl ScanReport {
    pub fn accepted(&self) -> usize {
        self.frames.iter().filter(|f| f.reels.is_some()).count()
    }
}

/// Crops, identifies and assembles frames cut to the region of interest.
pub struct ReelScanner<M = CorrelationMatcher> {
    grid: SymbolsGrid,
    cropper: SymbolCropper,
    assembler: ReelAssembler<M>,
}

impl<M: SymbolMatcher> ReelScanner<M> {
    pub fn new(grid: SymbolsGrid, cropper: SymbolCropper, assembler: ReelAssembler<M>) -> Self {
        Self {
            grid,
            cropper,
            assembler,
        }
    }

    pub fn process_frame(
        &self,
        frame: &str,
        image: &RgbImage,
    ) -> Result<Option<Vec<Reel>>, ReelError> {
        let symbols = self.cropper.extract_symbols(frame, image, &self.grid)?;
        self.assembler.assemble(&symbols)
    }

    /// Process settled frames in order, naming them `frame_<i>`.
    ///
    /// Stops at the first caller error; rejected frames are recorded with no
    /// reels and processing continues.
    pub fn process_stream<I>(&self, frames: I) -> Result<ScanReport, ReelError>
    where
        I: IntoIterator<Item = Result<RgbImage, ReelError>>,
    {
        let started_at = Utc::now();
        let mut results = Vec::new();

        for (index, frame) in frames.into_iter().enumerate() {
            let name = format!("frame_{index}");
            let reels = self.process_frame(&name, &frame?)?;
            if reels.is_some() {
                tracing::info!("{name}: reels identified");
            }
            results.push(FrameResult {
                frame: name,
                reels: reels.map(|reels| reels.iter().map(Reel::names).collect()),
            });
        }

        let report = ScanReport {
            started_at,
            finished_at: Utc::now(),
            frames: results,
        };
        tracing::info!(
            "processed {} settled frame(s), {} accepted",
            report.frames.len(),
            report.accepted()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::catalog::CatalogEntry;
    use crate::dedup::{FrameDeduplicator, SettleConfig};
    use crate::geometry::Vector;
    use crate::identifier::tests::noise;
    use crate::identifier::{MatchConfig, SymbolIdentifier};

    const CELL: u32 = 30;

    fn grid() -> SymbolsGrid {
        SymbolsGrid {
            start_point: Vector::new(5, 5),
            symbol_size: Vector::new(CELL, CELL),
            offset: Vector::new(4, 4),
            number_of_elements: Vector::new(3, 2),
        }
    }

    fn catalog() -> Vec<Arc<CatalogEntry>> {
        (0..4)
            .map(|i| Arc::new(CatalogEntry::new(format!("sym{i}"), noise(CELL, CELL, i))))
            .collect()
    }

    /// Paint symbol `layout[row][column]` into each cell of a blank frame.
    fn render(layout: [[u64; 3]; 2]) -> RgbImage {
        let mut frame = RgbImage::new(120, 80);
        for cell in grid().cells() {
            let symbol = noise(CELL, CELL, layout[cell.index.y as usize][cell.index.x as usize]);
            let (x, y) = (cell.roi.left as i64, cell.roi.top as i64);
            image::imageops::replace(&mut frame, &symbol, x, y);
        }
        frame
    }

    fn scanner() -> ReelScanner {
        ReelScanner::new(
            grid(),
            SymbolCropper::new(),
            ReelAssembler::new(
                SymbolIdentifier::from_config(&MatchConfig::default()),
                &catalog(),
            ),
        )
    }

    #[test]
    fn test_process_frame() {
        let reels = scanner()
            .process_frame("frame_0", &render([[0, 1, 2], [3, 0, 1]]))
            .unwrap()
            .unwrap();
        assert_eq!(reels.len(), 3);
        assert_eq!(reels[1].names(), BTreeMap::from([(0, "sym1".into()), (1, "sym0".into())]));
    }

    #[test]
    fn test_process_stream_from_deduplicator() {
        let settle = SettleConfig {
            skip_frames: 1,
            min_similar_run: 1,
            ..Default::default()
        };
        let first = render([[0, 1, 2], [3, 0, 1]]);
        let second = render([[2, 2, 3], [1, 0, 0]]);
        let mut raw = vec![first.clone(); 3];
        raw.extend(vec![second.clone(); 3]);

        let settled = FrameDeduplicator::new(settle).settle(raw);
        let report = scanner().process_stream(settled).unwrap();

        assert_eq!(report.frames.len(), 2);
        assert_eq!(report.accepted(), 2);
        assert_eq!(report.frames[1].frame, "frame_1");
        let reels = report.frames[1].reels.as_ref().unwrap();
        assert_eq!(reels[0][&0], "sym2");
        assert_eq!(reels[2][&0], "sym3");

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["frames"][0]["reels"][0]["1"], "sym3");
    }

    #[test]
    fn test_rejected_frame_is_recorded() {
        let mut frame = render([[0, 1, 2], [3, 0, 1]]);
        let unknown = noise(CELL, CELL, 500);
        image::imageops::replace(&mut frame, &unknown, 5, 5);

        let report = scanner().process_stream(vec![Ok(frame)]).unwrap();
        assert_eq!(report.frames.len(), 1);
        assert!(report.frames[0].reels.is_none());
        assert_eq!(report.accepted(), 0);
    }

    #[test]
    fn test_stream_error_propagates() {
        let frames = vec![Ok(RgbImage::new(10, 10))];
        let err = scanner().process_stream(frames).unwrap_err();
        assert!(matches!(err, ReelError::OutOfBounds { .. }));
    }
}
