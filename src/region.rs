//! Caller-requested sub-windows and the clamped rectangles they become.

/// A requested rectangular window, inclusive on both ends.
///
/// Coordinates may be negative, inverted or past the image edge; they are
/// repaired by [`clamp`](Self::clamp) before use, never rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub x0: i64,
    pub y0: i64,
    pub x1: i64,
    pub y1: i64,
}

impl Region {
    pub fn new(x0: i64, y0: i64, x1: i64, y1: i64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Clamp into `[0, width-1] x [0, height-1]`.
    ///
    /// `x1`/`y1` are clamped to no less than the clamped `x0`/`y0`, so an
    /// inverted region collapses to a single column or row. Both dimensions
    /// must be non-zero.
    pub fn clamp(&self, width: u32, height: u32) -> PixelRect {
        debug_assert!(width > 0 && height > 0);
        let max_x = i64::from(width.max(1)) - 1;
        let max_y = i64::from(height.max(1)) - 1;
        let x0 = self.x0.clamp(0, max_x);
        let y0 = self.y0.clamp(0, max_y);
        let x1 = self.x1.clamp(x0, max_x);
        let y1 = self.y1.clamp(y0, max_y);
        PixelRect {
            x0: x0 as u32,
            y0: y0 as u32,
            x1: x1 as u32,
            y1: y1 as u32,
        }
    }
}

/// An in-bounds rectangle, inclusive on both ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PixelRect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl PixelRect {
    /// The whole of a `width` x `height` image.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x0: 0,
            y0: 0,
            x1: width.saturating_sub(1),
            y1: height.saturating_sub(1),
        }
    }

    pub fn width(&self) -> u32 {
        self.x1 - self.x0 + 1
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0 + 1
    }

    pub fn intersect(&self, other: &PixelRect) -> Option<PixelRect> {
        let x0 = self.x0.max(other.x0);
        let y0 = self.y0.max(other.y0);
        let x1 = self.x1.min(other.x1);
        let y1 = self.y1.min(other.y1);
        (x0 <= x1 && y0 <= y1).then_some(PixelRect { x0, y0, x1, y1 })
    }

    /// Mirror vertically inside an image of `height` rows.
    ///
    /// Converts between raster rows (bottom-up) and file rows (top-down).
    pub fn flip_rows(&self, height: u32) -> PixelRect {
        PixelRect {
            x0: self.x0,
            y0: height - 1 - self.y1,
            x1: self.x1,
            y1: height - 1 - self.y0,
        }
    }
}
