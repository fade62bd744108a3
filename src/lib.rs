pub mod catalog;
pub mod config;
pub mod correlation;
pub mod cropper;
pub mod dedup;
pub mod error;
pub mod geometry;
pub mod identifier;
pub mod io;
pub mod pipeline;
pub mod reels;

pub use catalog::{CatalogBuilder, CatalogEntry, ClusterConfig};
pub use config::{Config, ConfigError};
pub use cropper::{CroppedSymbol, SymbolCropper};
pub use dedup::{FrameDeduplicator, SettleConfig, SettledFrames};
pub use error::ReelError;
pub use geometry::{GridCell, Roi, SymbolsGrid, Vector};
pub use identifier::{
    CorrelationMatcher, MatchConfig, PreparedEntry, SymbolIdentifier, SymbolMatcher,
    TemplateMatcher,
};
pub use pipeline::{FrameResult, ReelScanner, ScanReport};
pub use reels::{Reel, ReelAssembler};
