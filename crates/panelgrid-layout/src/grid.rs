//! Grid model: pixel/cell conversion and vertical compaction.
//!
//! Everything here is a pure function of its inputs. Columns are a fixed
//! count whose pixel width follows the live container width; rows have a
//! fixed pixel height and are unbounded.
//!
//! # Pixel mapping
//!
//! ```text
//! column_width = (container - 2*padding - margin*(columns-1)) / columns
//! x_px(cell)   = padding + cell * (column_width + margin)
//! y_px(cell)   = padding + cell * (row_height + margin)
//! ```
//!
//! # Compaction
//!
//! [`compact`] packs every placement upward as far as it can go without
//! colliding with a placement that precedes it in `(y, x)` order. Items that
//! overlap are pushed down below whatever they hit. Relative vertical order
//! is preserved and the result is a fixed point: compacting it again
//! changes nothing.

use std::hash::Hash;

use panelgrid_core::geometry::{CellRect, PixelRect};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::panel::{PanelId, PanelPlacement};

/// Layout axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Horizontal,
    Vertical,
}

/// Workspace-wide grid configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Fixed number of columns.
    pub columns: u16,
    /// Height of one row in pixels.
    pub row_height_px: u32,
    /// Gap between adjacent cells in pixels, on both axes.
    pub margin_px: u32,
    /// Inset between the container edge and the first cell, in pixels.
    pub padding_px: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            columns: 12,
            row_height_px: 30,
            margin_px: 10,
            padding_px: 10,
        }
    }
}

impl GridConfig {
    /// Convert a pixel snap distance into grid units.
    ///
    /// The conversion goes through the row height on both axes so one
    /// threshold feels the same whichever side a panel approaches from.
    #[must_use]
    pub fn snap_threshold_cells(&self, snap_distance_px: u32) -> f64 {
        if self.row_height_px == 0 {
            return 0.0;
        }
        f64::from(snap_distance_px) / f64::from(self.row_height_px)
    }
}

/// Hard bounds every stored placement satisfies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLimits {
    pub columns: u16,
    pub min_w: u16,
    pub min_h: u16,
}

impl Default for GridLimits {
    fn default() -> Self {
        Self {
            columns: 12,
            min_w: 3,
            min_h: 3,
        }
    }
}

impl GridLimits {
    #[must_use]
    pub const fn new(columns: u16, min_w: u16, min_h: u16) -> Self {
        Self {
            columns,
            min_w,
            min_h,
        }
    }

    /// Clamp a placement to the minimum size and the grid width.
    ///
    /// Never rejects: a panel always ends up with some valid placement.
    #[must_use]
    pub fn normalize(&self, placement: &PanelPlacement) -> PanelPlacement {
        let columns = self.columns.max(1);
        let min_w = self.min_w.clamp(1, columns);
        let min_h = self.min_h.max(1);
        let w = placement.w.clamp(min_w, columns);
        let h = placement.h.max(min_h);
        let x = placement.x.min(columns - w);
        PanelPlacement {
            id: placement.id.clone(),
            x,
            y: placement.y,
            w,
            h,
        }
    }

    #[must_use]
    pub fn is_valid(&self, placement: &PanelPlacement) -> bool {
        placement.w >= self.min_w
            && placement.h >= self.min_h
            && u32::from(placement.x) + u32::from(placement.w) <= u32::from(self.columns)
    }
}

/// Pixel/cell conversion for one container width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    config: GridConfig,
    container_width_px: u32,
}

impl GridGeometry {
    #[must_use]
    pub const fn new(config: GridConfig, container_width_px: u32) -> Self {
        Self {
            config,
            container_width_px,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &GridConfig {
        &self.config
    }

    #[must_use]
    pub const fn container_width_px(&self) -> u32 {
        self.container_width_px
    }

    #[must_use]
    pub fn column_width_px(&self) -> f64 {
        let columns = f64::from(self.config.columns.max(1));
        let margin = f64::from(self.config.margin_px);
        let padding = f64::from(self.config.padding_px);
        let inner = f64::from(self.container_width_px) - 2.0 * padding - margin * (columns - 1.0);
        (inner / columns).max(0.0)
    }

    /// Size of one cell on `axis` without the trailing margin.
    #[must_use]
    pub fn cell_size_px(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Horizontal => self.column_width_px(),
            Axis::Vertical => f64::from(self.config.row_height_px),
        }
    }

    /// Distance between the starts of two adjacent cells on `axis`.
    #[must_use]
    pub fn pitch_px(&self, axis: Axis) -> f64 {
        self.cell_size_px(axis) + f64::from(self.config.margin_px)
    }

    /// Pixel offset of the leading edge of `cell`.
    #[must_use]
    pub fn cell_to_pixel(&self, cell: u16, axis: Axis) -> i32 {
        let px = f64::from(self.config.padding_px) + f64::from(cell) * self.pitch_px(axis);
        round_to_i32(px)
    }

    /// Nearest cell index for a pixel offset, clamped to the grid.
    #[must_use]
    pub fn pixel_to_cell(&self, px: i32, axis: Axis) -> u16 {
        let pitch = self.pitch_px(axis);
        if pitch <= 0.0 {
            return 0;
        }
        let raw = ((f64::from(px) - f64::from(self.config.padding_px)) / pitch).round();
        let max = match axis {
            Axis::Horizontal => f64::from(self.config.columns.saturating_sub(1)),
            Axis::Vertical => f64::from(u16::MAX),
        };
        raw.clamp(0.0, max) as u16
    }

    /// Pixel length of `span` cells, including the margins between them.
    #[must_use]
    pub fn span_to_pixels(&self, span: u16, axis: Axis) -> u32 {
        if span == 0 {
            return 0;
        }
        let size = self.cell_size_px(axis) * f64::from(span)
            + f64::from(self.config.margin_px) * f64::from(span - 1);
        size.round().clamp(0.0, f64::from(u32::MAX)) as u32
    }

    /// Fractional number of cells covered by a pixel delta.
    #[must_use]
    pub fn pixels_to_cells(&self, delta_px: i32, axis: Axis) -> f64 {
        let pitch = self.pitch_px(axis);
        if pitch <= 0.0 {
            return 0.0;
        }
        f64::from(delta_px) / pitch
    }

    #[must_use]
    pub fn cell_rect_to_pixels(&self, rect: CellRect) -> PixelRect {
        PixelRect::new(
            self.cell_to_pixel(rect.x, Axis::Horizontal),
            self.cell_to_pixel(rect.y, Axis::Vertical),
            self.span_to_pixels(rect.width, Axis::Horizontal),
            self.span_to_pixels(rect.height, Axis::Vertical),
        )
    }
}

fn round_to_i32(value: f64) -> i32 {
    value.round().clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32
}

/// Vertical compaction with one panel per block.
#[must_use]
pub fn compact(placements: &[PanelPlacement], limits: GridLimits) -> Vec<PanelPlacement> {
    compact_groups(placements, limits, |p| p.id.clone())
}

/// Vertical compaction where placements sharing a group key move together.
///
/// Each group is treated as one rigid block the size of its bounding
/// rectangle, so relative positions inside a group never change. Output
/// keeps the input order.
#[must_use]
pub fn compact_groups<K, F>(
    placements: &[PanelPlacement],
    limits: GridLimits,
    group_of: F,
) -> Vec<PanelPlacement>
where
    K: Eq + Hash,
    F: Fn(&PanelPlacement) -> K,
{
    let mut out: Vec<PanelPlacement> = placements.iter().map(|p| limits.normalize(p)).collect();

    let mut index: FxHashMap<K, usize> = FxHashMap::default();
    let mut blocks: Vec<Block> = Vec::new();
    for (i, placement) in out.iter().enumerate() {
        let key = group_of(placement);
        if let Some(&b) = index.get(&key) {
            let block = &mut blocks[b];
            block.members.push(i);
            block.bounds = block.bounds.union(&placement.rect());
        } else {
            index.insert(key, blocks.len());
            blocks.push(Block {
                first: i,
                members: vec![i],
                bounds: placement.rect(),
            });
        }
    }

    let mut order: Vec<usize> = (0..blocks.len()).collect();
    order.sort_by_key(|&b| (blocks[b].bounds.y, blocks[b].bounds.x, blocks[b].first));

    let mut placed: Vec<CellRect> = Vec::with_capacity(blocks.len());
    for b in order {
        let block = &blocks[b];
        let y = settle(block.bounds, &placed);
        placed.push(block.bounds.with_y(y));
        let dy = i32::from(y) - i32::from(block.bounds.y);
        if dy == 0 {
            continue;
        }
        for &m in &block.members {
            let moved = (i32::from(out[m].y) + dy).clamp(0, i32::from(u16::MAX));
            out[m].y = moved as u16;
        }
    }
    out
}

struct Block {
    first: usize,
    members: Vec<usize>,
    bounds: CellRect,
}

/// Final row for `rect` given the blocks already placed.
fn settle(rect: CellRect, placed: &[CellRect]) -> u16 {
    let floor = placed.iter().map(CellRect::bottom).max().unwrap_or(0);
    let mut y = rect.y.min(floor);
    while y > 0 && first_collision(rect.with_y(y - 1), placed).is_none() {
        y -= 1;
    }
    while let Some(hit) = first_collision(rect.with_y(y), placed) {
        if hit.bottom() <= y {
            break;
        }
        y = hit.bottom();
    }
    y
}

fn first_collision(rect: CellRect, placed: &[CellRect]) -> Option<CellRect> {
    placed.iter().copied().find(|other| rect.intersects(other))
}

/// Every pair of overlapping placements, by id.
#[must_use]
pub fn overlapping_pairs(placements: &[PanelPlacement]) -> Vec<(PanelId, PanelId)> {
    let mut pairs = Vec::new();
    for (i, a) in placements.iter().enumerate() {
        for b in &placements[i + 1..] {
            if a.overlaps(b) {
                pairs.push((a.id.clone(), b.id.clone()));
            }
        }
    }
    pairs
}

/// Keep `rect` where it is unless it collides with `occupied`, in which case
/// drop it below everything.
#[must_use]
pub fn place_without_collision(rect: CellRect, occupied: &[CellRect]) -> CellRect {
    if first_collision(rect, occupied).is_none() {
        return rect;
    }
    let floor = occupied.iter().map(CellRect::bottom).max().unwrap_or(0);
    rect.with_y(floor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(id: &str, x: u16, y: u16, w: u16, h: u16) -> PanelPlacement {
        PanelPlacement::new(id, x, y, w, h)
    }

    fn geometry() -> GridGeometry {
        // 12 columns, 10px padding, 10px margin: (1230 - 20 - 110) / 12 = 91.67
        GridGeometry::new(GridConfig::default(), 1230)
    }

    #[test]
    fn column_width_accounts_for_margins_and_padding() {
        let g = GridGeometry::new(GridConfig::default(), 1350);
        assert!((g.column_width_px() - 101.666).abs() < 0.01);
        assert_eq!(g.cell_size_px(Axis::Vertical), 30.0);
        assert_eq!(g.pitch_px(Axis::Vertical), 40.0);
    }

    #[test]
    fn cell_pixel_round_trip() {
        let g = geometry();
        for cell in 0..12 {
            let px = g.cell_to_pixel(cell, Axis::Horizontal);
            assert_eq!(g.pixel_to_cell(px, Axis::Horizontal), cell);
        }
        for row in [0u16, 1, 7, 400] {
            let px = g.cell_to_pixel(row, Axis::Vertical);
            assert_eq!(g.pixel_to_cell(px, Axis::Vertical), row);
        }
    }

    #[test]
    fn pixel_to_cell_clamps_to_grid() {
        let g = geometry();
        assert_eq!(g.pixel_to_cell(-500, Axis::Horizontal), 0);
        assert_eq!(g.pixel_to_cell(50_000, Axis::Horizontal), 11);
        assert_eq!(g.pixel_to_cell(-500, Axis::Vertical), 0);
    }

    #[test]
    fn span_includes_inner_margins() {
        let g = geometry();
        assert_eq!(g.span_to_pixels(0, Axis::Vertical), 0);
        assert_eq!(g.span_to_pixels(1, Axis::Vertical), 30);
        assert_eq!(g.span_to_pixels(3, Axis::Vertical), 110);
    }

    #[test]
    fn narrow_container_never_goes_negative() {
        let g = GridGeometry::new(GridConfig::default(), 10);
        assert_eq!(g.column_width_px(), 0.0);
        assert_eq!(g.pixel_to_cell(400, Axis::Horizontal), 11);
    }

    #[test]
    fn snap_threshold_uses_row_height() {
        let config = GridConfig::default();
        assert!((config.snap_threshold_cells(20) - 0.6667).abs() < 0.001);
        let flat = GridConfig {
            row_height_px: 0,
            ..GridConfig::default()
        };
        assert_eq!(flat.snap_threshold_cells(20), 0.0);
    }

    #[test]
    fn normalize_clamps_size_and_columns() {
        let limits = GridLimits::default();
        assert_eq!(limits.normalize(&p("a", 0, 0, 0, 0)), p("a", 0, 0, 3, 3));
        assert_eq!(limits.normalize(&p("a", 11, 2, 4, 5)), p("a", 8, 2, 4, 5));
        assert_eq!(limits.normalize(&p("a", 0, 0, 40, 3)), p("a", 0, 0, 12, 3));
    }

    #[test]
    fn compact_packs_upward() {
        let out = compact(&[p("a", 0, 5, 4, 3), p("b", 0, 20, 4, 3)], GridLimits::default());
        assert_eq!(out, vec![p("a", 0, 0, 4, 3), p("b", 0, 3, 4, 3)]);
    }

    #[test]
    fn compact_resolves_overlap_by_pushing_down() {
        let out = compact(&[p("a", 0, 0, 6, 6), p("b", 2, 2, 6, 6)], GridLimits::default());
        assert_eq!(out, vec![p("a", 0, 0, 6, 6), p("b", 2, 6, 6, 6)]);
        assert!(overlapping_pairs(&out).is_empty());
    }

    #[test]
    fn compact_keeps_side_by_side_panels() {
        let input = [p("a", 0, 0, 6, 4), p("b", 6, 0, 6, 8), p("c", 0, 9, 6, 3)];
        let out = compact(&input, GridLimits::default());
        assert_eq!(out[2], p("c", 0, 4, 6, 3));
        assert_eq!(out[1], p("b", 6, 0, 6, 8));
    }

    #[test]
    fn compact_is_idempotent_on_example() {
        let input = [
            p("a", 3, 7, 4, 3),
            p("b", 0, 0, 5, 4),
            p("c", 4, 2, 6, 6),
            p("d", 1, 1, 3, 9),
        ];
        let once = compact(&input, GridLimits::default());
        let twice = compact(&once, GridLimits::default());
        assert_eq!(once, twice);
        assert!(overlapping_pairs(&once).is_empty());
    }

    #[test]
    fn degenerate_placements_are_clamped_before_compaction() {
        let out = compact(&[p("a", 0, 0, 0, 0), p("b", 0, 0, 0, 0)], GridLimits::default());
        assert_eq!(out, vec![p("a", 0, 0, 3, 3), p("b", 0, 3, 3, 3)]);
    }

    #[test]
    fn grouped_compaction_moves_groups_rigidly() {
        // a and b form one group; the gap between them must survive.
        let input = [p("a", 0, 4, 6, 3), p("b", 0, 7, 6, 2), p("c", 6, 10, 6, 3)];
        let out = compact_groups(&input, GridLimits::default(), |pl| {
            if pl.id.as_str() == "c" { "c" } else { "ab" }
        });
        assert_eq!(out[0], p("a", 0, 0, 6, 3));
        assert_eq!(out[1], p("b", 0, 3, 6, 2));
        assert_eq!(out[2], p("c", 6, 0, 6, 3));
    }

    #[test]
    fn place_without_collision_drops_below_occupied() {
        let occupied = [CellRect::new(0, 0, 6, 6), CellRect::new(6, 0, 6, 9)];
        assert_eq!(
            place_without_collision(CellRect::new(0, 6, 6, 3), &occupied),
            CellRect::new(0, 6, 6, 3)
        );
        assert_eq!(
            place_without_collision(CellRect::new(3, 2, 6, 3), &occupied),
            CellRect::new(3, 9, 6, 3)
        );
    }
}
