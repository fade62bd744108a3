use std::sync::Arc;
use std::time::Instant;

use image::{GrayImage, RgbImage};
use imageproc::template_matching::{MatchTemplateMethod, match_template};
use serde::{Deserialize, Serialize};

use crate::catalog::CatalogEntry;
use crate::correlation::{channel, trim, window_correlation};
use crate::cropper::CroppedSymbol;

/// Color channel used for matching.
const MATCH_CHANNEL: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchConfig {
    /// A catalog entry matches when its score is strictly above this.
    pub threshold: f64,
    /// Fraction of the reference width/height trimmed off every edge.
    pub window_trim: f32,
    /// Pixel step between window positions.
    pub window_step: u32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            threshold: 0.7,
            window_trim: 0.1,
            window_step: 3,
        }
    }
}

/// Scores a crop against one prepared reference; higher is more alike.
///
/// Both images are single-channel: `candidate` is the whole crop, `template`
/// the trimmed reference. `None` means the score is undefined for this pair
/// (for instance the template is bigger than the crop, or one of them is flat).
pub trait SymbolMatcher {
    fn score(&self, candidate: &GrayImage, template: &GrayImage) -> Option<f64>;
}

/// Maximum Pearson correlation of the template slid over the crop.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationMatcher {
    step: u32,
}

impl CorrelationMatcher {
    pub fn new(config: &MatchConfig) -> Self {
        Self {
            step: config.window_step,
        }
    }
}

impl Default for CorrelationMatcher {
    fn default() -> Self {
        Self::new(&MatchConfig::default())
    }
}

impl SymbolMatcher for CorrelationMatcher {
    fn score(&self, candidate: &GrayImage, template: &GrayImage) -> Option<f64> {
        window_correlation(candidate, template, self.step)
    }
}

/// Normalized cross-correlation from `imageproc`, evaluated at every offset.
///
/// Not mean-centered, so unrelated bright images still score fairly high;
/// use a stricter threshold than with [`CorrelationMatcher`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateMatcher;

impl SymbolMatcher for TemplateMatcher {
    fn score(&self, candidate: &GrayImage, template: &GrayImage) -> Option<f64> {
        if template.width() == 0
            || template.height() == 0
            || template.width() > candidate.width()
            || template.height() > candidate.height()
        {
            return None;
        }

        let result = match_template(
            candidate,
            template,
            MatchTemplateMethod::CrossCorrelationNormalized,
        );

        result
            .pixels()
            .map(|p| p.0[0])
            .filter(|s| s.is_finite())
            .fold(None, |best: Option<f32>, s| Some(best.map_or(s, |b| b.max(s))))
            .map(f64::from)
    }
}

/// A catalog entry together with its matching template.
#[derive(Debug, Clone)]
pub struct PreparedEntry {
    pub entry: Arc<CatalogEntry>,
    pub template: GrayImage,
}

/// Reduce a reference image to the template every matcher compares against.
pub fn reference_template(image: &RgbImage, trim_part: f32) -> GrayImage {
    trim(&channel(image, MATCH_CHANNEL), trim_part)
}

/// Picks the catalog entry shown in a crop.
pub struct SymbolIdentifier<M = CorrelationMatcher> {
    matcher: M,
    threshold: f64,
    window_trim: f32,
}

impl SymbolIdentifier<CorrelationMatcher> {
    pub fn from_config(config: &MatchConfig) -> Self {
        Self::new(CorrelationMatcher::new(config), config)
    }
}

impl<M: SymbolMatcher> SymbolIdentifier<M> {
    /// Uses `config` for the threshold and reference trim; the matcher brings
    /// its own settings.
    pub fn new(matcher: M, config: &MatchConfig) -> Self {
        Self {
            matcher,
            threshold: config.threshold,
            window_trim: config.window_trim,
        }
    }

    /// Compute the template of every entry once, keeping catalog order.
    pub fn prepare(&self, catalog: &[Arc<CatalogEntry>]) -> Vec<PreparedEntry> {
        let started = Instant::now();
        let prepared: Vec<PreparedEntry> = catalog
            .iter()
            .map(|entry| PreparedEntry {
                template: reference_template(&entry.image, self.window_trim),
                entry: entry.clone(),
            })
            .collect();
        tracing::debug!(
            "prepared {} catalog template(s) in {:?}",
            prepared.len(),
            started.elapsed()
        );
        prepared
    }

    /// First entry, in catalog order, scoring above the threshold.
    ///
    /// This is first-match rather than best-match: when two entries are
    /// similar the one listed earlier wins.
    pub fn identify(
        &self,
        crop: &CroppedSymbol,
        catalog: &[PreparedEntry],
    ) -> Option<Arc<CatalogEntry>> {
        let started = Instant::now();
        let candidate = channel(&crop.image, MATCH_CHANNEL);

        for (tried, prepared) in catalog.iter().enumerate() {
            let score = self.matcher.score(&candidate, &prepared.template);
            if let Some(score) = score
                && score > self.threshold
            {
                tracing::debug!(
                    "symbol {:?} identified as {} (score {:.3}), tried {} entries in {:?}",
                    (crop.index.x, crop.index.y),
                    prepared.entry.name,
                    score,
                    tried + 1,
                    started.elapsed()
                );
                return Some(prepared.entry.clone());
            }
        }

        tracing::debug!(
            "symbol {:?} not identified, tried {} entries in {:?}",
            (crop.index.x, crop.index.y),
            catalog.len(),
            started.elapsed()
        );
        None
    }
}
