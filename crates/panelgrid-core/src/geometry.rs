#![forbid(unsafe_code)]

//! Geometric primitives.

use serde::{Deserialize, Serialize};

/// A rectangle in grid-cell space.
///
/// Uses grid coordinates (0-indexed, origin at top-left). Rows are unbounded,
/// so `y` and `height` are only limited by `u16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CellRect {
    /// Left edge (inclusive), in columns.
    pub x: u16,
    /// Top edge (inclusive), in rows.
    pub y: u16,
    /// Width in columns.
    pub width: u16,
    /// Height in rows.
    pub height: u16,
}

impl CellRect {
    /// Create a new rectangle.
    #[inline]
    pub const fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Right edge (exclusive).
    #[inline]
    pub const fn right(&self) -> u16 {
        self.x.saturating_add(self.width)
    }

    /// Bottom edge (exclusive).
    #[inline]
    pub const fn bottom(&self) -> u16 {
        self.y.saturating_add(self.height)
    }

    /// Area in cells.
    #[inline]
    pub const fn area(&self) -> u32 {
        self.width as u32 * self.height as u32
    }

    /// Check if the rectangle has zero area.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Check if a cell is inside the rectangle.
    #[inline]
    pub const fn contains(&self, x: u16, y: u16) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Whether the two rectangles share at least one cell.
    ///
    /// Rectangles that only touch along an edge do not intersect.
    #[inline]
    pub const fn intersects(&self, other: &CellRect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// The smallest rectangle containing both.
    pub fn union(&self, other: &CellRect) -> CellRect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());

        CellRect {
            x,
            y,
            width: right.saturating_sub(x),
            height: bottom.saturating_sub(y),
        }
    }

    /// Same size, top edge moved to `y`.
    #[inline]
    pub const fn with_y(self, y: u16) -> CellRect {
        CellRect { y, ..self }
    }
}

/// A rectangle in container pixel space, used for rendering and hit testing.
///
/// `x`/`y` are signed so a rectangle may start in the container padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    #[inline]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Check if a pixel is inside the rectangle.
    #[inline]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        let right = i64::from(self.x) + i64::from(self.width);
        let bottom = i64::from(self.y) + i64::from(self.height);
        x >= self.x && i64::from(x) < right && y >= self.y && i64::from(y) < bottom
    }
}

#[cfg(test)]
mod tests {
    use super::{CellRect, PixelRect};

    #[test]
    fn rect_contains_edges() {
        let rect = CellRect::new(2, 3, 4, 5);
        assert!(rect.contains(2, 3));
        assert!(rect.contains(5, 7));
        assert!(!rect.contains(6, 3));
        assert!(!rect.contains(2, 8));
    }

    #[test]
    fn touching_rects_do_not_intersect() {
        let a = CellRect::new(0, 0, 6, 6);
        let below = CellRect::new(0, 6, 6, 3);
        let beside = CellRect::new(6, 0, 3, 6);
        assert!(!a.intersects(&below));
        assert!(!a.intersects(&beside));
        assert!(a.intersects(&CellRect::new(5, 5, 3, 3)));
    }

    #[test]
    fn empty_rect_never_intersects() {
        let a = CellRect::new(0, 0, 6, 6);
        assert!(!a.intersects(&CellRect::new(1, 1, 0, 4)));
    }

    #[test]
    fn union_covers_both() {
        let a = CellRect::new(0, 0, 6, 6);
        let b = CellRect::new(0, 6, 6, 3);
        assert_eq!(a.union(&b), CellRect::new(0, 0, 6, 9));
        let c = CellRect::new(8, 2, 2, 2);
        assert_eq!(a.union(&c), CellRect::new(0, 0, 10, 6));
    }

    #[test]
    fn edges_saturate() {
        let rect = CellRect::new(u16::MAX - 1, 0, 10, 1);
        assert_eq!(rect.right(), u16::MAX);
        assert_eq!(rect.area(), 10);
    }

    #[test]
    fn pixel_rect_contains_respects_negative_origin() {
        let rect = PixelRect::new(-5, -5, 10, 10);
        assert!(rect.contains(-5, -5));
        assert!(rect.contains(4, 4));
        assert!(!rect.contains(5, 0));
    }
}
