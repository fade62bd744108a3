use thiserror::Error;

/// Caller errors raised by the matching pipeline.
///
/// A symbol that cannot be identified is not an error: it is reported as
/// `None` by the identifier and the assembler.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReelError {
    #[error("all symbols should be from one frame, got {expected:?} and {found:?}")]
    MixedFrames { expected: String, found: String },

    #[error("no symbols to assemble")]
    EmptyBatch,

    #[error("reel {column} of frame {frame:?} has {found} symbol(s), expected {expected}")]
    IncompleteGrid {
        frame: String,
        column: u32,
        expected: usize,
        found: usize,
    },

    #[error("symbol ({column}, {row}) of frame {frame:?} lies outside a grid of {crops} crop(s)")]
    IndexOutOfRange {
        frame: String,
        column: u32,
        row: u32,
        crops: usize,
    },

    #[error(
        "region [{left}, {right}) x [{top}, {bottom}) does not fit a {width}x{height} image"
    )]
    OutOfBounds {
        left: u32,
        right: u32,
        top: u32,
        bottom: u32,
        width: u32,
        height: u32,
    },

    #[error("image {index} is {found:?}, expected {expected:?}")]
    DimensionMismatch {
        index: usize,
        expected: (u32, u32),
        found: (u32, u32),
    },
}
