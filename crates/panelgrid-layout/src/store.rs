//! Authoritative per-workspace layout state with change notification.
//!
//! # Design
//!
//! [`LayoutStore`] keeps one [`WorkspaceLayout`] per workspace in shared,
//! reference-counted storage (`Rc<RefCell<..>>`). Cloning the store hands
//! out another handle to the same state, so the controller, the enforcer,
//! the persistence adapter, and a renderer can each hold one without any
//! global.
//!
//! Every mutation goes through one commit pipeline:
//!
//! 1. duplicate panel ids are dropped (first wins),
//! 2. placements are clamped to [`GridLimits`] and compacted, with attached
//!    units moving as rigid blocks,
//! 3. if the result equals the stored layout nothing else happens,
//! 4. otherwise the version is bumped and subscribers run synchronously.
//!
//! # Invariants
//!
//! 1. Stored placements never overlap and always satisfy the limits.
//! 2. `version` increments by exactly 1 per effective commit.
//! 3. Subscribers run in registration order.
//! 4. A subscriber may commit re-entrantly. Remaining subscribers of the
//!    superseded notification are skipped; they see the newer one instead.

use std::any::Any;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;
use tracing::{debug, debug_span, warn};

use crate::attach::{AttachedUnit, Attachment, AttachmentGraph};
use crate::error::LayoutError;
use crate::grid::{GridLimits, compact, compact_groups, overlapping_pairs};
use crate::panel::{PanelId, PanelPlacement, PlacementPatch, WorkspaceId};

/// Placements plus attachments for one workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceLayout {
    pub placements: Vec<PanelPlacement>,
    pub attachments: AttachmentGraph,
}

impl WorkspaceLayout {
    #[must_use]
    pub fn new(placements: Vec<PanelPlacement>) -> Self {
        Self {
            placements,
            attachments: AttachmentGraph::new(),
        }
    }

    #[must_use]
    pub fn with_attachments(mut self, attachments: AttachmentGraph) -> Self {
        self.attachments = attachments;
        self
    }

    #[must_use]
    pub fn placement(&self, id: &PanelId) -> Option<&PanelPlacement> {
        self.placements.iter().find(|p| &p.id == id)
    }

    /// Attached units, for rendering a parent and its child as one block.
    #[must_use]
    pub fn units(&self) -> Vec<AttachedUnit> {
        self.attachments.units(&self.placements)
    }
}

/// What triggered a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeCause {
    Set,
    Patch,
    Gesture,
    Attach,
    Detach,
    Remove,
    Enforce,
    Restore,
}

/// Notification payload, cloned once per commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutChange {
    pub workspace: WorkspaceId,
    pub version: u64,
    pub cause: ChangeCause,
    pub layout: WorkspaceLayout,
}

type Listener = dyn Fn(&LayoutChange);

#[derive(Debug, Default)]
struct Entry {
    layout: WorkspaceLayout,
    version: u64,
}

struct StoreInner {
    limits: GridLimits,
    workspaces: FxHashMap<WorkspaceId, Entry>,
    subscribers: Vec<Weak<Listener>>,
}

/// Shared handle to all workspace layouts.
#[derive(Clone)]
pub struct LayoutStore {
    inner: Rc<RefCell<StoreInner>>,
}

impl std::fmt::Debug for LayoutStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("LayoutStore")
            .field("limits", &inner.limits)
            .field("workspaces", &inner.workspaces.len())
            .field("subscriber_count", &inner.subscribers.len())
            .finish()
    }
}

/// Non-owning store handle, for listeners that must not keep it alive.
#[derive(Clone)]
pub struct WeakLayoutStore {
    inner: Weak<RefCell<StoreInner>>,
}

impl WeakLayoutStore {
    #[must_use]
    pub fn upgrade(&self) -> Option<LayoutStore> {
        self.inner.upgrade().map(|inner| LayoutStore { inner })
    }
}

impl LayoutStore {
    #[must_use]
    pub fn new(limits: GridLimits) -> Self {
        Self {
            inner: Rc::new(RefCell::new(StoreInner {
                limits,
                workspaces: FxHashMap::default(),
                subscribers: Vec::new(),
            })),
        }
    }

    #[must_use]
    pub fn limits(&self) -> GridLimits {
        self.inner.borrow().limits
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakLayoutStore {
        WeakLayoutStore {
            inner: Rc::downgrade(&self.inner),
        }
    }

    #[must_use]
    pub fn contains(&self, workspace: &WorkspaceId) -> bool {
        self.inner.borrow().workspaces.contains_key(workspace)
    }

    /// Placements of `workspace`; empty when it has never been committed.
    #[must_use]
    pub fn get(&self, workspace: &WorkspaceId) -> Vec<PanelPlacement> {
        self.inner
            .borrow()
            .workspaces
            .get(workspace)
            .map(|e| e.layout.placements.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn layout(&self, workspace: &WorkspaceId) -> Option<WorkspaceLayout> {
        self.inner
            .borrow()
            .workspaces
            .get(workspace)
            .map(|e| e.layout.clone())
    }

    #[must_use]
    pub fn attachments(&self, workspace: &WorkspaceId) -> Vec<Attachment> {
        self.inner
            .borrow()
            .workspaces
            .get(workspace)
            .map(|e| e.layout.attachments.to_vec())
            .unwrap_or_default()
    }

    /// Commit counter of `workspace`; 0 before the first commit.
    #[must_use]
    pub fn version(&self, workspace: &WorkspaceId) -> u64 {
        self.inner
            .borrow()
            .workspaces
            .get(workspace)
            .map_or(0, |e| e.version)
    }

    /// Replace every placement, keeping the current attachments.
    ///
    /// Attachments that no longer match a placement are pruned by the
    /// enforcer on the resulting notification.
    pub fn set(&self, workspace: &WorkspaceId, placements: Vec<PanelPlacement>) -> u64 {
        let attachments = self
            .layout(workspace)
            .map(|l| l.attachments)
            .unwrap_or_default();
        self.commit(
            workspace,
            WorkspaceLayout {
                placements,
                attachments,
            },
            ChangeCause::Set,
        )
    }

    /// Move and/or resize one panel.
    pub fn patch(
        &self,
        workspace: &WorkspaceId,
        panel: &PanelId,
        patch: PlacementPatch,
    ) -> Result<u64, LayoutError> {
        let mut layout = self.existing(workspace)?;
        let slot = layout
            .placements
            .iter_mut()
            .find(|p| &p.id == panel)
            .ok_or_else(|| LayoutError::UnknownPanel {
                workspace: workspace.clone(),
                panel: panel.clone(),
            })?;
        *slot = slot.patched(patch);
        Ok(self.commit(workspace, layout, ChangeCause::Patch))
    }

    /// Create or re-parent an attachment. The enforcer moves the child.
    pub fn attach(&self, workspace: &WorkspaceId, attachment: Attachment) -> Result<u64, LayoutError> {
        let mut layout = self.existing(workspace)?;
        let columns = self.limits().columns;
        layout
            .attachments
            .attach(attachment, &layout.placements, columns)?;
        Ok(self.commit(workspace, layout, ChangeCause::Attach))
    }

    /// Remove the attachment of `child`. No panel moves.
    pub fn detach(
        &self,
        workspace: &WorkspaceId,
        child: &PanelId,
    ) -> Result<Option<Attachment>, LayoutError> {
        let mut layout = self.existing(workspace)?;
        let removed = layout.attachments.detach(child);
        if removed.is_some() {
            self.commit(workspace, layout, ChangeCause::Detach);
        }
        Ok(removed)
    }

    /// Drop a panel and every attachment naming it.
    pub fn remove_panel(&self, workspace: &WorkspaceId, panel: &PanelId) -> Result<u64, LayoutError> {
        let mut layout = self.existing(workspace)?;
        let before = layout.placements.len();
        layout.placements.retain(|p| &p.id != panel);
        if layout.placements.len() == before {
            return Err(LayoutError::UnknownPanel {
                workspace: workspace.clone(),
                panel: panel.clone(),
            });
        }
        for attachment in layout.attachments.remove_panel(panel) {
            debug!(
                child = %attachment.child,
                parent = %attachment.parent,
                "attachment removed with panel"
            );
        }
        Ok(self.commit(workspace, layout, ChangeCause::Remove))
    }

    /// Commit a complete layout, placements and attachments together.
    pub fn replace(&self, workspace: &WorkspaceId, layout: WorkspaceLayout, cause: ChangeCause) -> u64 {
        self.commit(workspace, layout, cause)
    }

    /// Forget a workspace entirely. Subscribers are not notified.
    pub fn remove_workspace(&self, workspace: &WorkspaceId) -> bool {
        self.inner
            .borrow_mut()
            .workspaces
            .remove(workspace)
            .is_some()
    }

    /// Register a change listener.
    ///
    /// The callback stays registered while the returned [`Subscription`]
    /// is alive.
    pub fn subscribe(&self, callback: impl Fn(&LayoutChange) + 'static) -> Subscription {
        let strong: Rc<Listener> = Rc::new(callback);
        self.inner
            .borrow_mut()
            .subscribers
            .push(Rc::downgrade(&strong));
        Subscription {
            _guard: Box::new(strong),
        }
    }

    /// Registered listeners, including dropped ones not yet pruned.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    fn existing(&self, workspace: &WorkspaceId) -> Result<WorkspaceLayout, LayoutError> {
        self.layout(workspace)
            .ok_or_else(|| LayoutError::UnknownWorkspace {
                workspace: workspace.clone(),
            })
    }

    fn commit(&self, workspace: &WorkspaceId, layout: WorkspaceLayout, cause: ChangeCause) -> u64 {
        let _span = debug_span!(
            "panelgrid.commit",
            workspace = %workspace,
            cause = ?cause,
            panels = layout.placements.len(),
            version = tracing::field::Empty,
        )
        .entered();

        let limits = self.limits();
        let WorkspaceLayout {
            placements,
            attachments,
        } = layout;
        let placements = dedupe(placements);
        let mut settled = compact_groups(&placements, limits, |p| attachments.root_of(&p.id));
        if !overlapping_pairs(&settled).is_empty() {
            warn!(
                workspace = %workspace,
                "attached unit overlaps itself; compacting panels individually"
            );
            settled = compact(&placements, limits);
        }
        let next = WorkspaceLayout {
            placements: settled,
            attachments,
        };

        let change = {
            let mut inner = self.inner.borrow_mut();
            if let Some(entry) = inner.workspaces.get(workspace)
                && entry.layout == next
            {
                return entry.version;
            }
            let entry = inner.workspaces.entry(workspace.clone()).or_default();
            entry.layout = next;
            entry.version += 1;
            LayoutChange {
                workspace: workspace.clone(),
                version: entry.version,
                cause,
                layout: entry.layout.clone(),
            }
        };
        tracing::Span::current().record("version", change.version);
        debug!("layout committed");

        let version = change.version;
        self.notify(&change);
        version
    }

    fn notify(&self, change: &LayoutChange) {
        let callbacks: Vec<Rc<Listener>> = {
            let mut inner = self.inner.borrow_mut();
            inner.subscribers.retain(|w| w.strong_count() > 0);
            inner.subscribers.iter().filter_map(Weak::upgrade).collect()
        };
        for callback in callbacks {
            if self.version(&change.workspace) != change.version {
                break;
            }
            callback(change);
        }
    }
}

fn dedupe(placements: Vec<PanelPlacement>) -> Vec<PanelPlacement> {
    let mut out: Vec<PanelPlacement> = Vec::with_capacity(placements.len());
    for placement in placements {
        if out.iter().any(|p| p.id == placement.id) {
            warn!(panel = %placement.id, "duplicate placement dropped");
            continue;
        }
        out.push(placement);
    }
    out
}

/// RAII guard for a store listener.
///
/// Dropping it makes the listener unreachable; the dead entry is pruned on
/// the next notification.
pub struct Subscription {
    _guard: Box<dyn Any>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
