//! Panel identity, placement, and static registration data.

use std::fmt;

use panelgrid_core::geometry::CellRect;
use serde::{Deserialize, Serialize};

/// Stable panel identifier, unique within a workspace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PanelId(String);

impl PanelId {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PanelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PanelId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for PanelId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

/// Workspace (tab) key. Each workspace has an independent layout.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkspaceId(String);

impl WorkspaceId {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkspaceId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Where one panel sits on the grid, in cells.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PanelPlacement {
    #[serde(alias = "i")]
    pub id: PanelId,
    pub x: u16,
    pub y: u16,
    pub w: u16,
    pub h: u16,
}

impl PanelPlacement {
    #[must_use]
    pub fn new(id: impl Into<PanelId>, x: u16, y: u16, w: u16, h: u16) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            w,
            h,
        }
    }

    #[must_use]
    pub fn from_rect(id: PanelId, rect: CellRect) -> Self {
        Self {
            id,
            x: rect.x,
            y: rect.y,
            w: rect.width,
            h: rect.height,
        }
    }

    #[must_use]
    pub const fn rect(&self) -> CellRect {
        CellRect::new(self.x, self.y, self.w, self.h)
    }

    #[must_use]
    pub fn overlaps(&self, other: &PanelPlacement) -> bool {
        self.rect().intersects(&other.rect())
    }

    /// Apply a partial update; unset fields keep their value.
    #[must_use]
    pub fn patched(&self, patch: PlacementPatch) -> PanelPlacement {
        PanelPlacement {
            id: self.id.clone(),
            x: patch.x.unwrap_or(self.x),
            y: patch.y.unwrap_or(self.y),
            w: patch.w.unwrap_or(self.w),
            h: patch.h.unwrap_or(self.h),
        }
    }
}

/// Partial placement update for [`crate::store::LayoutStore::patch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlacementPatch {
    pub x: Option<u16>,
    pub y: Option<u16>,
    pub w: Option<u16>,
    pub h: Option<u16>,
}

impl PlacementPatch {
    #[must_use]
    pub const fn moved_to(x: u16, y: u16) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            w: None,
            h: None,
        }
    }

    #[must_use]
    pub const fn resized_to(w: u16, h: u16) -> Self {
        Self {
            x: None,
            y: None,
            w: Some(w),
            h: Some(h),
        }
    }

    #[must_use]
    pub const fn from_placement(placement: &PanelPlacement) -> Self {
        Self {
            x: Some(placement.x),
            y: Some(placement.y),
            w: Some(placement.w),
            h: Some(placement.h),
        }
    }
}

/// Side of a parent panel that an attached child is glued to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    Top,
    Bottom,
    Left,
    Right,
}

impl Edge {
    pub const ALL: [Edge; 4] = [Edge::Top, Edge::Bottom, Edge::Left, Edge::Right];

    /// Top/bottom attachments share the parent's width; left/right share its height.
    #[must_use]
    pub const fn is_vertical(self) -> bool {
        matches!(self, Self::Top | Self::Bottom)
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::Left => "left",
            Self::Right => "right",
        })
    }
}

/// Static snap configuration: which panel this one may attach to, on which
/// of the target's sides, and how close (in pixels) triggers the snap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapTarget {
    #[serde(alias = "targetPanelId")]
    pub target: PanelId,
    pub edges: Vec<Edge>,
    /// Falls back to the engine's default snap distance when unset.
    #[serde(default, alias = "snapDistance")]
    pub snap_distance_px: Option<u32>,
}

impl SnapTarget {
    #[must_use]
    pub fn new(target: impl Into<PanelId>, edges: impl IntoIterator<Item = Edge>) -> Self {
        Self {
            target: target.into(),
            edges: edges.into_iter().collect(),
            snap_distance_px: None,
        }
    }

    #[must_use]
    pub fn with_distance(mut self, px: u32) -> Self {
        self.snap_distance_px = Some(px);
        self
    }
}

/// One visible panel as described by the workspace layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelRegistration {
    pub id: PanelId,
    #[serde(default)]
    pub title: String,
    pub default_placement: CellRect,
    #[serde(default)]
    pub snap_targets: Vec<SnapTarget>,
}

impl PanelRegistration {
    #[must_use]
    pub fn new(id: impl Into<PanelId>, title: impl Into<String>, default_placement: CellRect) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            default_placement,
            snap_targets: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_snap_target(mut self, target: SnapTarget) -> Self {
        self.snap_targets.push(target);
        self
    }

    #[must_use]
    pub fn default_panel_placement(&self) -> PanelPlacement {
        PanelPlacement::from_rect(self.id.clone(), self.default_placement)
    }
}

/// Ordered set of registrations for the active workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PanelRegistry {
    panels: Vec<PanelRegistration>,
}

impl PanelRegistry {
    /// Later duplicates of an id are ignored.
    #[must_use]
    pub fn new(registrations: impl IntoIterator<Item = PanelRegistration>) -> Self {
        let mut panels: Vec<PanelRegistration> = Vec::new();
        for registration in registrations {
            if panels.iter().any(|p| p.id == registration.id) {
                tracing::warn!(panel = %registration.id, "duplicate panel registration ignored");
                continue;
            }
            panels.push(registration);
        }
        Self { panels }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PanelRegistration> + '_ {
        self.panels.iter()
    }

    #[must_use]
    pub fn get(&self, id: &PanelId) -> Option<&PanelRegistration> {
        self.panels.iter().find(|p| &p.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: &PanelId) -> bool {
        self.get(id).is_some()
    }

    #[must_use]
    pub fn snap_targets_of(&self, id: &PanelId) -> &[SnapTarget] {
        self.get(id).map_or(&[], |p| p.snap_targets.as_slice())
    }

    /// Every registered panel at its default placement, in registration order.
    #[must_use]
    pub fn default_layout(&self) -> Vec<PanelPlacement> {
        self.panels
            .iter()
            .map(PanelRegistration::default_panel_placement)
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.panels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_keeps_unset_fields() {
        let placement = PanelPlacement::new("a", 1, 2, 6, 4);
        let moved = placement.patched(PlacementPatch::moved_to(3, 9));
        assert_eq!(moved, PanelPlacement::new("a", 3, 9, 6, 4));
        let resized = placement.patched(PlacementPatch::resized_to(8, 5));
        assert_eq!(resized, PanelPlacement::new("a", 1, 2, 8, 5));
    }

    #[test]
    fn registry_ignores_duplicate_ids() {
        let registry = PanelRegistry::new([
            PanelRegistration::new("a", "First", CellRect::new(0, 0, 4, 4)),
            PanelRegistration::new("a", "Second", CellRect::new(4, 0, 4, 4)),
        ]);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&PanelId::new("a")).unwrap().title, "First");
    }

    #[test]
    fn snap_targets_of_unknown_panel_is_empty() {
        let registry = PanelRegistry::default();
        assert!(registry.snap_targets_of(&PanelId::new("ghost")).is_empty());
    }

    #[test]
    fn snap_target_accepts_camel_case_aliases() {
        let json = r#"{"targetPanelId":"mixer","edges":["bottom"],"snapDistance":20}"#;
        let target: SnapTarget = serde_json::from_str(json).unwrap();
        assert_eq!(target, SnapTarget::new("mixer", [Edge::Bottom]).with_distance(20));
    }

    #[test]
    fn edge_orientation() {
        assert!(Edge::Top.is_vertical());
        assert!(Edge::Bottom.is_vertical());
        assert!(!Edge::Left.is_vertical());
        assert_eq!(Edge::Right.to_string(), "right");
    }
}
