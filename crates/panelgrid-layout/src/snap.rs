//! Snap detection for a panel being dragged.
//!
//! [`detect`] is evaluated on every drag tick. For each declared
//! [`SnapTarget`] present in the layout and each edge it allows, it measures
//! the signed distance (in cells) between the matching edges of the dragged
//! panel and the target:
//!
//! | Edge     | Dragged edge | Target edge  |
//! |----------|--------------|--------------|
//! | `bottom` | top          | bottom       |
//! | `top`    | bottom       | top          |
//! | `right`  | left         | right        |
//! | `left`   | right        | left         |
//!
//! Candidates within the target's threshold get a flush position; the
//! closest one wins. Equal distances resolve to the earlier declared
//! target/edge, so the result is a pure function of its inputs.

use panelgrid_core::geometry::CellRect;
use serde::{Deserialize, Serialize};

use crate::grid::GridConfig;
use crate::panel::{Edge, PanelId, PanelPlacement, SnapTarget};

/// Where a panel currently is mid-drag, in fractional cells.
///
/// Origins are fractional because pointer deltas rarely land on a cell
/// boundary; size stays integral during a move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LivePlacement {
    pub x: f64,
    pub y: f64,
    pub w: u16,
    pub h: u16,
}

impl LivePlacement {
    #[must_use]
    pub const fn new(x: f64, y: f64, w: u16, h: u16) -> Self {
        Self { x, y, w, h }
    }

    #[must_use]
    pub fn from_placement(placement: &PanelPlacement) -> Self {
        Self {
            x: f64::from(placement.x),
            y: f64::from(placement.y),
            w: placement.w,
            h: placement.h,
        }
    }

    /// Nearest whole-cell rectangle.
    #[must_use]
    pub fn rounded(&self) -> CellRect {
        CellRect::new(
            self.x.round().clamp(0.0, f64::from(u16::MAX)) as u16,
            self.y.round().clamp(0.0, f64::from(u16::MAX)) as u16,
            self.w,
            self.h,
        )
    }
}

/// Active snap candidate, recomputed every drag tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapZone {
    pub target: PanelId,
    pub edge: Edge,
    /// Flush rectangle the dragged panel would be committed to.
    pub snapped: CellRect,
    /// Absolute edge distance in cells.
    pub distance: f64,
}

impl SnapZone {
    /// Top-left cell of the snapped rectangle.
    #[must_use]
    pub const fn snap_position(&self) -> (u16, u16) {
        (self.snapped.x, self.snapped.y)
    }

    #[must_use]
    pub fn placement_for(&self, id: PanelId) -> PanelPlacement {
        PanelPlacement::from_rect(id, self.snapped)
    }
}

/// Find the closest snap zone for `dragged` at `live`.
///
/// Targets that are missing from `placements`, or that name the dragged
/// panel itself, yield no candidate. Flush positions that would leave the
/// grid (negative origin, or past the last column) are skipped.
#[must_use]
pub fn detect(
    dragged: &PanelId,
    live: &LivePlacement,
    placements: &[PanelPlacement],
    targets: &[SnapTarget],
    grid: &GridConfig,
    default_distance_px: u32,
) -> Option<SnapZone> {
    detect_accepting(
        dragged,
        live,
        placements,
        targets,
        grid,
        default_distance_px,
        |_| true,
    )
}

/// [`detect`], skipping targets for which `accepts` is false.
///
/// The drag controller passes the attachment graph here so a zone is only
/// offered when releasing on it can actually attach.
#[must_use]
pub fn detect_accepting(
    dragged: &PanelId,
    live: &LivePlacement,
    placements: &[PanelPlacement],
    targets: &[SnapTarget],
    grid: &GridConfig,
    default_distance_px: u32,
    accepts: impl Fn(&PanelId) -> bool,
) -> Option<SnapZone> {
    let mut best: Option<SnapZone> = None;
    for target in targets {
        if &target.target == dragged || !accepts(&target.target) {
            continue;
        }
        let Some(anchor) = placements.iter().find(|p| p.id == target.target) else {
            continue;
        };
        let threshold =
            grid.snap_threshold_cells(target.snap_distance_px.unwrap_or(default_distance_px));
        for &edge in &target.edges {
            let Some((distance, snapped)) = candidate(edge, live, anchor, grid.columns) else {
                continue;
            };
            let distance = distance.abs();
            if distance > threshold {
                continue;
            }
            if best.as_ref().is_none_or(|b| distance < b.distance) {
                best = Some(SnapZone {
                    target: anchor.id.clone(),
                    edge,
                    snapped,
                    distance,
                });
            }
        }
    }
    best
}

/// Signed distance and flush rectangle for one target edge.
fn candidate(
    edge: Edge,
    live: &LivePlacement,
    anchor: &PanelPlacement,
    columns: u16,
) -> Option<(f64, CellRect)> {
    let (ax, ay, aw, ah) = (
        f64::from(anchor.x),
        f64::from(anchor.y),
        f64::from(anchor.w),
        f64::from(anchor.h),
    );
    let (w, h) = (f64::from(live.w), f64::from(live.h));
    match edge {
        Edge::Bottom => {
            let y = anchor.y.checked_add(anchor.h)?;
            Some((
                live.y - (ay + ah),
                CellRect::new(anchor.x, y, anchor.w, live.h),
            ))
        }
        Edge::Top => {
            let y = anchor.y.checked_sub(live.h)?;
            Some((live.y + h - ay, CellRect::new(anchor.x, y, anchor.w, live.h)))
        }
        Edge::Right => {
            let x = anchor.x.checked_add(anchor.w)?;
            if u32::from(x) + u32::from(live.w) > u32::from(columns) {
                return None;
            }
            Some((
                live.x - (ax + aw),
                CellRect::new(x, anchor.y, live.w, anchor.h),
            ))
        }
        Edge::Left => {
            let x = anchor.x.checked_sub(live.w)?;
            Some((live.x + w - ax, CellRect::new(x, anchor.y, live.w, anchor.h)))
        }
    }
}
