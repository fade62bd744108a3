use std::iter::FusedIterator;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::correlation::pearson;
use crate::error::ReelError;
use crate::geometry::Roi;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SettleConfig {
    /// Only every `skip_frames`-th frame is compared.
    pub skip_frames: u32,
    /// A stable run must last strictly longer than this many samples.
    pub min_similar_run: u32,
    /// Consecutive samples are similar when their correlation is above this.
    pub similarity_threshold: f64,
    /// Emit the last frame when the stream ends during a stable run.
    pub flush_trailing_run: bool,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            skip_frames: 5,
            min_similar_run: 3,
            similarity_threshold: 0.9,
            flush_trailing_run: true,
        }
    }
}

/// Filters a raw frame stream down to frames the picture settled on.
#[derive(Debug, Clone, Default)]
pub struct FrameDeduplicator {
    config: SettleConfig,
    roi: Option<Roi>,
}

impl FrameDeduplicator {
    pub fn new(config: SettleConfig) -> Self {
        Self { config, roi: None }
    }

    /// Crop every frame to `roi` before comparing and emitting it.
    pub fn with_roi(mut self, roi: Roi) -> Self {
        self.roi = Some(roi);
        self
    }

    pub fn settle<I>(&self, frames: I) -> SettledFrames<I::IntoIter>
    where
        I: IntoIterator<Item = RgbImage>,
    {
        SettledFrames {
            frames: frames.into_iter(),
            config: self.config,
            roi: self.roi,
            previous: None,
            similar_run: 0,
            sample_counter: 0,
            done: false,
        }
    }
}

/// Lazy, single-pass stream of settled frames.
///
/// Consumes the underlying frame iterator; it cannot be restarted. A frame
/// that does not contain the region of interest yields one error, after which
/// the stream ends.
pub struct SettledFrames<I> {
    frames: I,
    config: SettleConfig,
    roi: Option<Roi>,
    previous: Option<RgbImage>,
    similar_run: u32,
    sample_counter: u32,
    done: bool,
}

impl<I> SettledFrames<I> {
    fn is_similar(&self, current: &RgbImage, previous: &RgbImage) -> bool {
        pearson(current.as_raw(), previous.as_raw())
            .is_some_and(|r| r > self.config.similarity_threshold)
    }

    fn finish(&mut self) -> Option<RgbImage> {
        self.done = true;
        let settled = self.config.flush_trailing_run
            && self.similar_run > self.config.min_similar_run;
        self.similar_run = 0;
        if settled {
            tracing::info!("stream ended on a settled frame");
            self.previous.take()
        } else {
            None
        }
    }
}

impl<I> Iterator for SettledFrames<I>
where
    I: Iterator<Item = RgbImage>,
{
    type Item = Result<RgbImage, ReelError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let Some(raw) = self.frames.next() else {
                return self.finish().map(Ok);
            };

            let current = match self.roi {
                Some(roi) => match roi.crop(&raw) {
                    Ok(cropped) => cropped,
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                },
                None => raw,
            };

            let Some(previous) = self.previous.take() else {
                self.previous = Some(current);
                continue;
            };

            self.sample_counter += 1;
            if self.sample_counter < self.config.skip_frames {
                self.previous = Some(previous);
                continue;
            }
            self.sample_counter = 0;

            let mut settled = None;
            if self.is_similar(&current, &previous) {
                self.similar_run += 1;
            } else {
                if self.similar_run > self.config.min_similar_run {
                    tracing::info!(
                        "scene changed after {} similar samples, emitting settled frame",
                        self.similar_run
                    );
                    settled = Some(previous);
                }
                self.similar_run = 0;
            }
            self.previous = Some(current);

            if let Some(frame) = settled {
                return Some(Ok(frame));
            }
        }
    }
}

impl<I> FusedIterator for SettledFrames<I> where I: Iterator<Item = RgbImage> {}
