use image::RgbImage;
use image::imageops;
use serde::{Deserialize, Serialize};

use crate::error::ReelError;

/// Integer (x, y) pair, used both for pixel offsets and grid indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vector {
    pub x: u32,
    pub y: u32,
}

impl Vector {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Pixel rectangle `[left, right) x [top, bottom)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

impl Roi {
    pub const fn new(left: u32, right: u32, top: u32, bottom: u32) -> Self {
        Self {
            left,
            right,
            top,
            bottom,
        }
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    /// Copy the rectangle out of `image`.
    ///
    /// `imageops::crop_imm` silently clamps to the image, so the bounds are
    /// checked here: a grid that does not fit the frame is a caller error.
    pub fn crop(&self, image: &RgbImage) -> Result<RgbImage, ReelError> {
        let (width, height) = image.dimensions();
        if self.left > self.right
            || self.top > self.bottom
            || self.right > width
            || self.bottom > height
        {
            return Err(ReelError::OutOfBounds {
                left: self.left,
                right: self.right,
                top: self.top,
                bottom: self.bottom,
                width,
                height,
            });
        }

        Ok(imageops::crop_imm(image, self.left, self.top, self.width(), self.height()).to_image())
    }
}

/// One symbol position: its (column, row) index and pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridCell {
    pub index: Vector,
    pub roi: Roi,
}

/// Fixed layout of the symbol grid inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolsGrid {
    pub start_point: Vector,
    pub symbol_size: Vector,
    /// Gap between neighbouring cells.
    pub offset: Vector,
    /// Number of (columns, rows).
    pub number_of_elements: Vector,
}

impl SymbolsGrid {
    pub fn columns(&self) -> u32 {
        self.number_of_elements.x
    }

    pub fn rows(&self) -> u32 {
        self.number_of_elements.y
    }

    /// Cells in row-major order: every column of row 0, then row 1, ...
    pub fn cells(&self) -> Vec<GridCell> {
        let mut cells = Vec::with_capacity((self.columns() * self.rows()) as usize);

        for row in 0..self.rows() {
            let top = self.start_point.y + (self.symbol_size.y + self.offset.y) * row;
            let bottom = top + self.symbol_size.y;

            for column in 0..self.columns() {
                let left = self.start_point.x + (self.symbol_size.x + self.offset.x) * column;
                let right = left + self.symbol_size.x;
                cells.push(GridCell {
                    index: Vector::new(column, row),
                    roi: Roi::new(left, right, top, bottom),
                });
            }
        }

        cells
    }
}
