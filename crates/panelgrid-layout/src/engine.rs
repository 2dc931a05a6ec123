//! Host-facing façade that wires the layout components together.
//!
//! [`PanelEngine`] owns one [`LayoutStore`] with the attachment enforcer and
//! autosave installed on it, the registry of the active workspace, the
//! gesture machine, and a [`FrameCoalescer`] for pointer moves and
//! container resizes.
//!
//! # Input flow
//!
//! ```text
//! host event -> handle_input -> coalescer --(discrete)--> flush pending, dispatch
//!                                  \--(move/resize)--> held until on_frame
//! ```
//!
//! Pointer-down, pointer-up, and cancel flush pending input first, so a
//! release always commits the most recent pointer position.

use panelgrid_core::coalescer::FrameCoalescer;
use panelgrid_core::event::{ContainerSize, InputEvent, PointerPosition};
use panelgrid_core::geometry::PixelRect;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::attach::{AttachedUnit, Attachment, AttachmentEnforcer};
use crate::config::EngineConfig;
use crate::controller::{
    CancelReason, DragHandle, DragResizeMachine, GestureCommit, GestureContext, GestureEffect,
    GestureEvent, GestureEventKind, GestureState, GestureTransition,
};
use crate::error::{ConfigError, LayoutError};
use crate::grid::GridGeometry;
use crate::panel::{PanelId, PanelPlacement, PanelRegistry, WorkspaceId};
use crate::persist::{LayoutStorage, LoadOutcome, PersistenceAdapter};
use crate::snap::SnapZone;
use crate::store::{ChangeCause, LayoutStore, Subscription, WorkspaceLayout};

/// Hit-test payload of a pointer-down: which panel, which handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerTarget {
    pub panel: PanelId,
    pub handle: DragHandle,
}

impl PointerTarget {
    #[must_use]
    pub fn new(panel: impl Into<PanelId>, handle: DragHandle) -> Self {
        Self {
            panel: panel.into(),
            handle,
        }
    }
}

pub struct PanelEngine<S> {
    config: EngineConfig,
    store: LayoutStore,
    persistence: PersistenceAdapter<S>,
    registry: PanelRegistry,
    workspace: Option<WorkspaceId>,
    machine: DragResizeMachine,
    coalescer: FrameCoalescer<PointerTarget>,
    container: ContainerSize,
    sequence: u64,
    _enforcer: Subscription,
    _autosave: Subscription,
}

impl<S> std::fmt::Debug for PanelEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanelEngine")
            .field("workspace", &self.workspace)
            .field("container", &self.container)
            .field("gesture", &self.machine.state().phase())
            .finish_non_exhaustive()
    }
}

impl<S: LayoutStorage + 'static> PanelEngine<S> {
    /// Build an engine. No workspace is active until
    /// [`Self::switch_workspace`] is called.
    pub fn new(config: EngineConfig, storage: S, container: ContainerSize) -> Result<Self, ConfigError> {
        let config = config.validated()?;
        let machine = DragResizeMachine::new_with_hysteresis(
            config.gesture.drag_threshold_px,
            config.gesture.update_hysteresis_px,
        )
        .map_err(|err| ConfigError::Validation(vec![err.to_string()]))?;
        let store = LayoutStore::new(config.limits());
        // Enforcer first: autosave must only see enforced layouts.
        let enforcer = AttachmentEnforcer::install(&store);
        let persistence = PersistenceAdapter::new(storage);
        let autosave = persistence.install(&store);
        Ok(Self {
            config,
            store,
            persistence,
            registry: PanelRegistry::default(),
            workspace: None,
            machine,
            coalescer: FrameCoalescer::new(),
            container,
            sequence: 0,
            _enforcer: enforcer,
            _autosave: autosave,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Shared store handle, e.g. for a renderer to subscribe to.
    #[must_use]
    pub const fn store(&self) -> &LayoutStore {
        &self.store
    }

    #[must_use]
    pub const fn persistence(&self) -> &PersistenceAdapter<S> {
        &self.persistence
    }

    #[must_use]
    pub const fn registry(&self) -> &PanelRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn workspace(&self) -> Option<&WorkspaceId> {
        self.workspace.as_ref()
    }

    #[must_use]
    pub const fn container_size(&self) -> ContainerSize {
        self.container
    }

    #[must_use]
    pub const fn gesture(&self) -> &GestureState {
        self.machine.state()
    }

    #[must_use]
    pub const fn geometry(&self) -> GridGeometry {
        GridGeometry::new(self.config.grid, self.container.width)
    }

    /// Layout of the active workspace.
    #[must_use]
    pub fn layout(&self) -> Option<WorkspaceLayout> {
        self.workspace.as_ref().and_then(|ws| self.store.layout(ws))
    }

    #[must_use]
    pub fn units(&self) -> Vec<AttachedUnit> {
        self.layout().map(|l| l.units()).unwrap_or_default()
    }

    /// Snap zone of the drag in progress, for the snap indicator.
    #[must_use]
    pub fn snap_zone(&self) -> Option<&SnapZone> {
        self.machine.snap_zone()
    }

    /// Where the panel under the pointer should be drawn right now.
    #[must_use]
    pub fn live_placement(&self) -> Option<PanelPlacement> {
        match self.machine.state() {
            GestureState::Dragging { panel, live, .. } => {
                Some(PanelPlacement::from_rect(panel.clone(), live.rounded()))
            }
            GestureState::Resizing { proposed, .. } => Some(proposed.clone()),
            GestureState::Idle | GestureState::Armed { .. } => None,
        }
    }

    /// Pixel rectangle of a committed panel at the current container width.
    #[must_use]
    pub fn panel_rect_px(&self, panel: &PanelId) -> Option<PixelRect> {
        let layout = self.layout()?;
        let placement = layout.placement(panel)?;
        Some(self.geometry().cell_rect_to_pixels(placement.rect()))
    }

    /// Topmost committed panel under `position`, if any.
    ///
    /// Panels never overlap once committed, so the first hit is the only one.
    #[must_use]
    pub fn hit_test(&self, position: PointerPosition) -> Option<PanelId> {
        let layout = self.layout()?;
        let geometry = self.geometry();
        layout
            .placements
            .iter()
            .find(|p| {
                geometry
                    .cell_rect_to_pixels(p.rect())
                    .contains(position.x, position.y)
            })
            .map(|p| p.id.clone())
    }

    /// Activate `workspace` with the panels in `registry`.
    ///
    /// Any gesture in flight is canceled. The persisted layout is restored
    /// and merged with registry defaults.
    pub fn switch_workspace(&mut self, workspace: WorkspaceId, registry: PanelRegistry) -> LoadOutcome {
        self.on_frame();
        if let Some(transition) = self.machine.force_cancel(CancelReason::WorkspaceSwitched) {
            debug!(transition_id = transition.transition_id, "gesture canceled by workspace switch");
        }
        self.registry = registry;
        let outcome = self.persistence.restore(&self.store, &workspace, &self.registry);
        info!(workspace = %workspace, outcome = ?outcome, "workspace activated");
        self.workspace = Some(workspace);
        outcome
    }

    /// Feed one host event.
    ///
    /// Moves and resizes are held until [`Self::on_frame`]; everything else
    /// is applied immediately after any held input.
    pub fn handle_input(&mut self, event: InputEvent<PointerTarget>) -> Vec<GestureTransition> {
        let Some(event) = self.coalescer.push(event) else {
            return Vec::new();
        };
        let mut transitions = self.on_frame();
        transitions.extend(self.dispatch(event));
        transitions
    }

    /// Apply held input. Call once per rendered frame.
    pub fn on_frame(&mut self) -> Vec<GestureTransition> {
        let pending = self.coalescer.flush();
        pending
            .into_iter()
            .filter_map(|event| self.dispatch(event))
            .collect()
    }

    pub fn pointer_down(
        &mut self,
        panel: impl Into<PanelId>,
        pointer_id: u32,
        position: PointerPosition,
        handle: DragHandle,
    ) -> Vec<GestureTransition> {
        self.handle_input(InputEvent::PointerDown {
            pointer_id,
            position,
            target: PointerTarget::new(panel, handle),
        })
    }

    pub fn pointer_move(&mut self, pointer_id: u32, position: PointerPosition) {
        self.handle_input(InputEvent::PointerMove {
            pointer_id,
            position,
        });
    }

    pub fn pointer_up(&mut self, pointer_id: u32, position: PointerPosition) -> Vec<GestureTransition> {
        self.handle_input(InputEvent::PointerUp {
            pointer_id,
            position,
        })
    }

    pub fn container_resized(&mut self, size: ContainerSize) {
        self.handle_input(InputEvent::ContainerResized(size));
    }

    /// Abort the gesture in flight without committing.
    pub fn cancel(&mut self, reason: CancelReason) -> Vec<GestureTransition> {
        let mut transitions = self.on_frame();
        transitions.extend(self.apply_gesture(GestureEventKind::Cancel { reason }));
        transitions
    }

    /// Detach `child` from its parent in the active workspace.
    pub fn detach(&mut self, child: &PanelId) -> Result<Option<Attachment>, LayoutError> {
        let workspace = self.active_workspace()?;
        self.store.detach(&workspace, child)
    }

    /// Remove a panel from the active workspace along with its attachments.
    pub fn remove_panel(&mut self, panel: &PanelId) -> Result<u64, LayoutError> {
        let workspace = self.active_workspace()?;
        if self.machine.state().panel() == Some(panel) {
            self.machine.force_cancel(CancelReason::Programmatic);
        }
        self.store.remove_panel(&workspace, panel)
    }

    fn active_workspace(&self) -> Result<WorkspaceId, LayoutError> {
        self.workspace.clone().ok_or(LayoutError::NoActiveWorkspace)
    }

    fn dispatch(&mut self, event: InputEvent<PointerTarget>) -> Option<GestureTransition> {
        match event {
            InputEvent::PointerDown {
                pointer_id,
                position,
                target,
            } => self.apply_gesture(GestureEventKind::PointerDown {
                panel: target.panel,
                pointer_id,
                position,
                handle: target.handle,
            }),
            InputEvent::PointerMove {
                pointer_id,
                position,
            } => self.apply_gesture(GestureEventKind::PointerMove {
                pointer_id,
                position,
            }),
            InputEvent::PointerUp {
                pointer_id,
                position,
            } => self.apply_gesture(GestureEventKind::PointerUp {
                pointer_id,
                position,
            }),
            InputEvent::ContainerResized(size) => {
                self.container = size;
                None
            }
            InputEvent::Cancel => self.apply_gesture(GestureEventKind::Cancel {
                reason: CancelReason::EscapeKey,
            }),
        }
    }

    fn apply_gesture(&mut self, kind: GestureEventKind) -> Option<GestureTransition> {
        let workspace = self.workspace.clone()?;
        let current = self.store.layout(&workspace).unwrap_or_default();
        let panel = match &kind {
            GestureEventKind::PointerDown { panel, .. } => Some(panel.clone()),
            _ => self.machine.state().panel().cloned(),
        };
        let snap_targets = panel
            .as_ref()
            .map_or(&[][..], |p| self.registry.snap_targets_of(p));
        let geometry = GridGeometry::new(self.config.grid, self.container.width);
        self.sequence = self.sequence.saturating_add(1);
        let ctx = GestureContext {
            geometry: &geometry,
            placements: &current.placements,
            snap_targets,
            attachments: &current.attachments,
            limits: self.store.limits(),
            default_snap_distance_px: self.config.gesture.snap_distance_px,
        };
        let transition = self
            .machine
            .apply_event(&GestureEvent::new(self.sequence, kind), &ctx);
        if let GestureEffect::Committed(commit) = &transition.effect {
            self.commit_gesture(&workspace, commit);
        }
        Some(transition)
    }

    /// Turn a finished gesture into one store commit.
    fn commit_gesture(&self, workspace: &WorkspaceId, commit: &GestureCommit) {
        let Some(mut layout) = self.store.layout(workspace) else {
            return;
        };
        let columns = self.store.limits().columns;
        match commit {
            GestureCommit::Resized { placement, .. } => {
                if let Some(slot) = layout.placements.iter_mut().find(|p| p.id == placement.id) {
                    *slot = placement.clone();
                }
            }
            GestureCommit::Moved { placement } => move_unit(&mut layout, placement, columns),
            GestureCommit::Snapped {
                placement,
                attachment,
            } => {
                let mut snapped = layout.clone();
                snapped.attachments.detach(&placement.id);
                move_with_descendants(&mut snapped, placement);
                match snapped
                    .attachments
                    .attach(attachment.clone(), &snapped.placements, columns)
                {
                    Ok(_) => layout = snapped,
                    Err(err) => {
                        warn!(
                            child = %attachment.child,
                            parent = %attachment.parent,
                            error = %err,
                            "snap rejected; committing position only"
                        );
                        move_unit(&mut layout, placement, columns);
                    }
                }
            }
        }
        self.store.replace(workspace, layout, ChangeCause::Gesture);
    }
}

/// Move `placement.id` to `placement`, dragging its descendants along.
fn move_with_descendants(layout: &mut WorkspaceLayout, placement: &PanelPlacement) {
    let Some(old) = layout.placement(&placement.id).cloned() else {
        return;
    };
    let dx = i32::from(placement.x) - i32::from(old.x);
    let dy = i32::from(placement.y) - i32::from(old.y);
    let descendants = layout.attachments.descendants(&placement.id);
    for slot in &mut layout.placements {
        if slot.id == placement.id {
            *slot = placement.clone();
        } else if descendants.contains(&slot.id) {
            slot.x = shift(slot.x, dx);
            slot.y = shift(slot.y, dy);
        }
    }
}

/// Translate the whole attached unit containing `placement.id` so that
/// panel lands on `placement`, keeping the unit inside the grid.
fn move_unit(layout: &mut WorkspaceLayout, placement: &PanelPlacement, columns: u16) {
    let Some(old) = layout.placement(&placement.id).cloned() else {
        return;
    };
    let root = layout.attachments.root_of(&placement.id);
    let mut members = vec![root.clone()];
    members.extend(layout.attachments.descendants(&root));
    if members.len() == 1 {
        if let Some(slot) = layout.placements.iter_mut().find(|p| p.id == placement.id) {
            *slot = placement.clone();
        }
        return;
    }

    let unit: Vec<&PanelPlacement> = layout
        .placements
        .iter()
        .filter(|p| members.contains(&p.id))
        .collect();
    let min_x = unit.iter().map(|p| i32::from(p.x)).min().unwrap_or(0);
    let max_x = unit.iter().map(|p| i32::from(p.x) + i32::from(p.w)).max().unwrap_or(0);
    let min_y = unit.iter().map(|p| i32::from(p.y)).min().unwrap_or(0);
    let dx = (i32::from(placement.x) - i32::from(old.x))
        .min(i32::from(columns) - max_x)
        .max(-min_x);
    let dy = (i32::from(placement.y) - i32::from(old.y)).max(-min_y);

    for slot in &mut layout.placements {
        if members.contains(&slot.id) {
            slot.x = shift(slot.x, dx);
            slot.y = shift(slot.y, dy);
        }
    }
}

fn shift(value: u16, delta: i32) -> u16 {
    (i32::from(value) + delta).clamp(0, i32::from(u16::MAX)) as u16
}
