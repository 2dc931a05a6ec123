//! Attachment graph and enforcement.
//!
//! An [`Attachment`] glues a child panel to one edge of a parent. The graph
//! is a forest: every panel has at most one parent, every parent carries at
//! most one child, and cycles are rejected when an attachment is created.
//! A root together with everything attached below it forms an
//! [`AttachedUnit`], which moves and compacts as one rigid block.
//!
//! # Edge rules
//!
//! | Edge     | Child origin                    | Shared extent |
//! |----------|---------------------------------|---------------|
//! | `bottom` | `(p.x, p.y + p.h)`              | width         |
//! | `top`    | `(p.x, p.y - child.h)`          | width         |
//! | `right`  | `(p.x + p.w, p.y)`              | height        |
//! | `left`   | `(p.x - child.w, p.y)`          | height        |
//!
//! [`enforce`] walks each unit from its root to its leaves, so one pass
//! settles every descendant. [`AttachmentEnforcer::install`] runs it after
//! every committed store change.

use std::collections::BTreeMap;

use panelgrid_core::geometry::CellRect;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::AttachError;
use crate::panel::{Edge, PanelId, PanelPlacement};
use crate::store::{ChangeCause, LayoutChange, LayoutStore, Subscription};

/// Directed glue from `child` to one side of `parent`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(alias = "childId")]
    pub child: PanelId,
    #[serde(alias = "parentId")]
    pub parent: PanelId,
    pub edge: Edge,
}

impl Attachment {
    #[must_use]
    pub fn new(child: impl Into<PanelId>, parent: impl Into<PanelId>, edge: Edge) -> Self {
        Self {
            child: child.into(),
            parent: parent.into(),
            edge,
        }
    }
}

/// A root panel and every panel attached beneath it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedUnit {
    pub root: PanelId,
    /// Root first, then descendants from parent to child.
    pub members: Vec<PanelId>,
    /// Bounding rectangle of all members.
    pub bounds: CellRect,
}

/// Child → (parent, edge) forest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentGraph {
    parents: BTreeMap<PanelId, (PanelId, Edge)>,
}

impl AttachmentGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from untrusted attachments, keeping those that pass
    /// [`Self::attach`] and returning the rest with their rejection reason.
    pub fn from_attachments(
        attachments: impl IntoIterator<Item = Attachment>,
        placements: &[PanelPlacement],
        columns: u16,
    ) -> (Self, Vec<(Attachment, AttachError)>) {
        let mut graph = Self::new();
        let mut rejected = Vec::new();
        for attachment in attachments {
            if let Err(err) = graph.attach(attachment.clone(), placements, columns) {
                rejected.push((attachment, err));
            }
        }
        (graph, rejected)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// Attachments ordered by child id.
    pub fn iter(&self) -> impl Iterator<Item = Attachment> + '_ {
        self.parents
            .iter()
            .map(|(child, (parent, edge))| Attachment::new(child.clone(), parent.clone(), *edge))
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<Attachment> {
        self.iter().collect()
    }

    #[must_use]
    pub fn parent_of(&self, child: &PanelId) -> Option<(&PanelId, Edge)> {
        self.parents.get(child).map(|(parent, edge)| (parent, *edge))
    }

    #[must_use]
    pub fn child_of(&self, parent: &PanelId) -> Option<(&PanelId, Edge)> {
        self.parents
            .iter()
            .find(|(_, (p, _))| p == parent)
            .map(|(child, (_, edge))| (child, *edge))
    }

    /// Whether `panel` takes part in any attachment.
    #[must_use]
    pub fn is_attached(&self, panel: &PanelId) -> bool {
        self.parents.contains_key(panel) || self.child_of(panel).is_some()
    }

    /// Topmost ancestor of `panel` (the panel itself when unattached).
    #[must_use]
    pub fn root_of(&self, panel: &PanelId) -> PanelId {
        let mut current = panel;
        for _ in 0..=self.parents.len() {
            match self.parents.get(current) {
                Some((parent, _)) => current = parent,
                None => break,
            }
        }
        current.clone()
    }

    /// Everything attached below `panel`, nearest first.
    #[must_use]
    pub fn descendants(&self, panel: &PanelId) -> Vec<PanelId> {
        let mut out = Vec::new();
        let mut current = panel;
        while let Some((child, _)) = self.child_of(current) {
            if child == panel || out.contains(child) {
                break;
            }
            out.push(child.clone());
            current = child;
        }
        out
    }

    /// Whether `child` may hang off `parent` without a self attachment, a
    /// cycle, or displacing another child. Placement checks are left to
    /// [`attach`](Self::attach).
    #[must_use]
    pub fn accepts(&self, child: &PanelId, parent: &PanelId) -> bool {
        child != parent
            && !self.is_ancestor(child, parent)
            && self
                .child_of(parent)
                .is_none_or(|(existing, _)| existing == child)
    }

    /// Add or re-parent an attachment.
    ///
    /// Returns the attachment it replaced when `child` was already attached.
    /// On error the graph is unchanged.
    pub fn attach(
        &mut self,
        attachment: Attachment,
        placements: &[PanelPlacement],
        columns: u16,
    ) -> Result<Option<Attachment>, AttachError> {
        let Attachment {
            child,
            parent,
            edge,
        } = &attachment;
        if child == parent {
            return Err(AttachError::SelfAttachment {
                panel: child.clone(),
            });
        }
        for panel in [child, parent] {
            if !placements.iter().any(|p| &p.id == panel) {
                return Err(AttachError::UnknownPanel {
                    panel: panel.clone(),
                });
            }
        }
        if self.is_ancestor(child, parent) {
            return Err(AttachError::Cycle {
                child: child.clone(),
                parent: parent.clone(),
            });
        }
        match self.child_of(parent) {
            Some((existing, _)) if existing != child => {
                return Err(AttachError::ParentOccupied {
                    parent: parent.clone(),
                    existing: existing.clone(),
                });
            }
            _ => {}
        }

        let mut trial = self.clone();
        trial.parents.insert(child.clone(), (parent.clone(), *edge));
        let root = trial.root_of(child);
        let by_id = index(placements);
        let resolved = trial.resolve_unit(&root, &by_id);
        match fit_unit(&resolved, columns) {
            Ok(_) => {}
            Err(UnitProblem::TooWide { width }) => {
                return Err(AttachError::UnitTooWide {
                    child: child.clone(),
                    parent: parent.clone(),
                    width,
                    columns,
                });
            }
            Err(UnitProblem::Overlap) => {
                return Err(AttachError::UnitOverlap {
                    child: child.clone(),
                    parent: parent.clone(),
                });
            }
        }

        let previous = self.parents.insert(child.clone(), (parent.clone(), *edge));
        debug!(child = %child, parent = %parent, edge = %edge, "attachment created");
        Ok(previous.map(|(parent, edge)| Attachment::new(child.clone(), parent, edge)))
    }

    /// Remove the attachment of `child`. Neither panel moves.
    pub fn detach(&mut self, child: &PanelId) -> Option<Attachment> {
        self.parents
            .remove(child)
            .map(|(parent, edge)| Attachment::new(child.clone(), parent, edge))
    }

    /// Remove every attachment that names `panel`.
    pub fn remove_panel(&mut self, panel: &PanelId) -> Vec<Attachment> {
        let mut removed = Vec::new();
        if let Some(own) = self.detach(panel) {
            removed.push(own);
        }
        let children: Vec<PanelId> = self
            .parents
            .iter()
            .filter(|(_, (parent, _))| parent == panel)
            .map(|(child, _)| child.clone())
            .collect();
        for child in children {
            removed.extend(self.detach(&child));
        }
        removed
    }

    /// Drop attachments whose child or parent is missing from `placements`.
    pub fn prune_dangling(&mut self, placements: &[PanelPlacement]) -> Vec<Attachment> {
        let present = |id: &PanelId| placements.iter().any(|p| &p.id == id);
        let dangling: Vec<PanelId> = self
            .parents
            .iter()
            .filter(|(child, (parent, _))| !present(child) || !present(parent))
            .map(|(child, _)| child.clone())
            .collect();
        dangling
            .into_iter()
            .filter_map(|child| self.detach(&child))
            .collect()
    }

    /// Every unit with at least one attachment, ordered by root id.
    #[must_use]
    pub fn units(&self, placements: &[PanelPlacement]) -> Vec<AttachedUnit> {
        let by_id = index(placements);
        self.unit_roots()
            .into_iter()
            .filter_map(|root| {
                let mut members = vec![root.clone()];
                members.extend(self.descendants(&root));
                let bounds = members
                    .iter()
                    .filter_map(|id| by_id.get(id).map(|p| p.rect()))
                    .reduce(|acc, rect| acc.union(&rect))?;
                Some(AttachedUnit {
                    root,
                    members,
                    bounds,
                })
            })
            .collect()
    }

    /// Whether `ancestor` is `panel` or sits above it.
    fn is_ancestor(&self, ancestor: &PanelId, panel: &PanelId) -> bool {
        let mut current = panel;
        for _ in 0..=self.parents.len() {
            if current == ancestor {
                return true;
            }
            match self.parents.get(current) {
                Some((parent, _)) => current = parent,
                None => return false,
            }
        }
        false
    }

    fn unit_roots(&self) -> Vec<PanelId> {
        let mut roots: Vec<PanelId> = self
            .parents
            .values()
            .filter(|(parent, _)| !self.parents.contains_key(parent))
            .map(|(parent, _)| parent.clone())
            .collect();
        roots.sort();
        roots.dedup();
        roots
    }

    /// Expected rectangles for a unit, computed from the root down.
    fn resolve_unit(
        &self,
        root: &PanelId,
        by_id: &FxHashMap<&PanelId, &PanelPlacement>,
    ) -> Vec<Resolved> {
        let Some(root_placement) = by_id.get(root) else {
            return Vec::new();
        };
        let mut out = vec![Resolved::from_placement(root_placement, 0)];
        let mut parent = out[0].clone();
        for child in self.descendants(root) {
            let Some(child_placement) = by_id.get(&child) else {
                break;
            };
            let Some((_, edge)) = self.parent_of(&child) else {
                break;
            };
            let next = parent.glue(edge, child_placement);
            out.push(next.clone());
            parent = next;
        }
        out
    }
}

fn index(placements: &[PanelPlacement]) -> FxHashMap<&PanelId, &PanelPlacement> {
    placements.iter().map(|p| (&p.id, p)).collect()
}

/// A unit member's expected rectangle before it is fitted to the grid.
#[derive(Debug, Clone)]
struct Resolved {
    id: PanelId,
    depth: usize,
    x: i32,
    y: i32,
    w: u16,
    h: u16,
}

impl Resolved {
    fn from_placement(placement: &PanelPlacement, depth: usize) -> Self {
        Self {
            id: placement.id.clone(),
            depth,
            x: i32::from(placement.x),
            y: i32::from(placement.y),
            w: placement.w,
            h: placement.h,
        }
    }

    fn right(&self) -> i32 {
        self.x + i32::from(self.w)
    }

    fn bottom(&self) -> i32 {
        self.y + i32::from(self.h)
    }

    fn intersects(&self, other: &Resolved) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Where `child` belongs when glued to `edge` of `self`.
    fn glue(&self, edge: Edge, child: &PanelPlacement) -> Resolved {
        let depth = self.depth + 1;
        let id = child.id.clone();
        match edge {
            Edge::Bottom => Resolved {
                id,
                depth,
                x: self.x,
                y: self.bottom(),
                w: self.w,
                h: child.h,
            },
            Edge::Top => Resolved {
                id,
                depth,
                x: self.x,
                y: self.y - i32::from(child.h),
                w: self.w,
                h: child.h,
            },
            Edge::Right => Resolved {
                id,
                depth,
                x: self.right(),
                y: self.y,
                w: child.w,
                h: self.h,
            },
            Edge::Left => Resolved {
                id,
                depth,
                x: self.x - i32::from(child.w),
                y: self.y,
                w: child.w,
                h: self.h,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnitProblem {
    TooWide { width: u32 },
    Overlap,
}

/// Rigid translation that brings a resolved unit onto the grid.
fn fit_unit(resolved: &[Resolved], columns: u16) -> Result<(i32, i32), UnitProblem> {
    let Some(min_x) = resolved.iter().map(|r| r.x).min() else {
        return Ok((0, 0));
    };
    let max_x = resolved.iter().map(Resolved::right).max().unwrap_or(min_x);
    let min_y = resolved.iter().map(|r| r.y).min().unwrap_or(0);
    let columns = i32::from(columns);

    let width = max_x - min_x;
    if width > columns {
        return Err(UnitProblem::TooWide {
            width: width.unsigned_abs(),
        });
    }
    for (i, a) in resolved.iter().enumerate() {
        if resolved[i + 1..].iter().any(|b| a.intersects(b)) {
            return Err(UnitProblem::Overlap);
        }
    }

    let dx = if min_x < 0 {
        -min_x
    } else if max_x > columns {
        columns - max_x
    } else {
        0
    };
    let dy = if min_y < 0 { -min_y } else { 0 };
    Ok((dx, dy))
}

/// Result of one enforcement pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enforcement {
    pub placements: Vec<PanelPlacement>,
    /// Attachments removed because a panel they name is gone.
    pub pruned: Vec<Attachment>,
    /// Attachments removed because their unit could not be laid out.
    pub dropped: Vec<Attachment>,
}

impl Enforcement {
    #[must_use]
    pub fn changed(&self, before: &[PanelPlacement]) -> bool {
        self.placements != before || !self.pruned.is_empty() || !self.dropped.is_empty()
    }
}

/// Glue every attached child to its parent.
///
/// Dangling attachments are pruned first. A unit that cannot be laid out
/// loses its deepest attachment, and the pass repeats until every unit fits.
pub fn enforce(
    placements: &[PanelPlacement],
    graph: &mut AttachmentGraph,
    columns: u16,
) -> Enforcement {
    let pruned = graph.prune_dangling(placements);
    for attachment in &pruned {
        info!(
            child = %attachment.child,
            parent = %attachment.parent,
            reason = "panel removed",
            "pruned dangling attachment"
        );
    }

    let mut dropped = Vec::new();
    let updates = loop {
        let by_id = index(placements);
        let mut updates: Vec<Resolved> = Vec::new();
        let mut unfit = None;
        for root in graph.unit_roots() {
            let resolved = graph.resolve_unit(&root, &by_id);
            match fit_unit(&resolved, columns) {
                Ok((dx, dy)) => updates.extend(resolved.into_iter().map(|mut r| {
                    r.x += dx;
                    r.y += dy;
                    r
                })),
                Err(problem) => {
                    unfit = resolved
                        .iter()
                        .max_by_key(|r| r.depth)
                        .map(|leaf| (leaf.id.clone(), problem));
                    break;
                }
            }
        }
        let Some((leaf, problem)) = unfit else {
            break updates;
        };
        if let Some(attachment) = graph.detach(&leaf) {
            warn!(
                child = %attachment.child,
                parent = %attachment.parent,
                problem = ?problem,
                "dropped attachment that no longer fits the grid"
            );
            dropped.push(attachment);
        }
    };

    let mut out = placements.to_vec();
    for update in updates {
        if let Some(slot) = out.iter_mut().find(|p| p.id == update.id) {
            slot.x = to_cell(update.x);
            slot.y = to_cell(update.y);
            slot.w = update.w;
            slot.h = update.h;
        }
    }
    Enforcement {
        placements: out,
        pruned,
        dropped,
    }
}

fn to_cell(value: i32) -> u16 {
    value.clamp(0, i32::from(u16::MAX)) as u16
}

/// Store listener that keeps attached children flush with their parents.
#[derive(Debug)]
pub struct AttachmentEnforcer;

impl AttachmentEnforcer {
    /// Subscribe to `store`. Enforcement stops when the returned guard drops.
    ///
    /// Corrections are committed back through [`LayoutStore::replace`] with
    /// [`ChangeCause::Enforce`], which notifies listeners again; a second
    /// pass over an enforced layout changes nothing, so the cascade ends.
    pub fn install(store: &LayoutStore) -> Subscription {
        let handle = store.downgrade();
        store.subscribe(move |change: &LayoutChange| {
            let Some(store) = handle.upgrade() else {
                return;
            };
            let mut layout = change.layout.clone();
            let columns = store.limits().columns;
            let outcome = enforce(&layout.placements, &mut layout.attachments, columns);
            if !outcome.changed(&layout.placements) {
                return;
            }
            layout.placements = outcome.placements;
            store.replace(&change.workspace, layout, ChangeCause::Enforce);
        })
    }
}
