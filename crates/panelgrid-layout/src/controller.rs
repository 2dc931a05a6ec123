//! Drag/resize gesture state machine.
//!
//! ```text
//! Idle -> Armed -> Dragging -> Idle   (move handle; commit on pointer-up)
//!           \----> Resizing -> Idle   (resize grip; commit on pointer-up)
//!           \----> Idle               (released before the threshold, or canceled)
//! ```
//!
//! The machine never touches the store. Each call to
//! [`DragResizeMachine::apply_event`] returns a [`GestureTransition`] whose
//! effect tells the caller what to render (live placement, snap zone) and,
//! on pointer-up, what to commit. Only one gesture is tracked at a time;
//! a second pointer-down while active is a no-op.

use panelgrid_core::event::PointerPosition;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::attach::{Attachment, AttachmentGraph};
use crate::error::GestureError;
use crate::grid::{Axis, GridGeometry, GridLimits};
use crate::panel::{PanelId, PanelPlacement, SnapTarget};
use crate::snap::{LivePlacement, SnapZone, detect_accepting};

/// Default pointer travel, in pixels, before a press becomes a gesture.
pub const DEFAULT_DRAG_THRESHOLD_PX: u16 = 3;

/// Default minimum pointer travel, in pixels, between two live updates.
pub const DEFAULT_UPDATE_HYSTERESIS_PX: u16 = 1;

/// One of the eight resize grips around a panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeGrip {
    Top,
    Bottom,
    Left,
    Right,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl ResizeGrip {
    pub const ALL: [ResizeGrip; 8] = [
        Self::Top,
        Self::Bottom,
        Self::Left,
        Self::Right,
        Self::TopLeft,
        Self::TopRight,
        Self::BottomLeft,
        Self::BottomRight,
    ];

    #[must_use]
    pub const fn moves_left(self) -> bool {
        matches!(self, Self::Left | Self::TopLeft | Self::BottomLeft)
    }

    #[must_use]
    pub const fn moves_right(self) -> bool {
        matches!(self, Self::Right | Self::TopRight | Self::BottomRight)
    }

    #[must_use]
    pub const fn moves_top(self) -> bool {
        matches!(self, Self::Top | Self::TopLeft | Self::TopRight)
    }

    #[must_use]
    pub const fn moves_bottom(self) -> bool {
        matches!(self, Self::Bottom | Self::BottomLeft | Self::BottomRight)
    }
}

/// What the pointer went down on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "handle", content = "grip", rename_all = "snake_case")]
pub enum DragHandle {
    Move,
    Resize(ResizeGrip),
}

/// Why a gesture ended without a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    EscapeKey,
    PointerCancel,
    FocusLost,
    WorkspaceSwitched,
    Programmatic,
}

/// Gesture input with a caller-assigned sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GestureEvent {
    pub sequence: u64,
    pub kind: GestureEventKind,
}

impl GestureEvent {
    #[must_use]
    pub const fn new(sequence: u64, kind: GestureEventKind) -> Self {
        Self { sequence, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GestureEventKind {
    PointerDown {
        panel: PanelId,
        pointer_id: u32,
        position: PointerPosition,
        handle: DragHandle,
    },
    PointerMove {
        pointer_id: u32,
        position: PointerPosition,
    },
    PointerUp {
        pointer_id: u32,
        position: PointerPosition,
    },
    Cancel {
        reason: CancelReason,
    },
}

/// Read-only inputs the machine needs on each event.
#[derive(Debug, Clone, Copy)]
pub struct GestureContext<'a> {
    pub geometry: &'a GridGeometry,
    pub placements: &'a [PanelPlacement],
    /// Snap targets declared by the panel under the pointer.
    pub snap_targets: &'a [SnapTarget],
    /// Current attachments; targets that could not take the dragged panel
    /// as a child never become a snap zone.
    pub attachments: &'a AttachmentGraph,
    pub limits: GridLimits,
    pub default_snap_distance_px: u32,
}

/// Full gesture state.
#[derive(Debug, Clone, PartialEq)]
pub enum GestureState {
    Idle,
    Armed {
        panel: PanelId,
        pointer_id: u32,
        handle: DragHandle,
        origin: PointerPosition,
        start: PanelPlacement,
        started_sequence: u64,
    },
    Dragging {
        panel: PanelId,
        pointer_id: u32,
        origin: PointerPosition,
        current: PointerPosition,
        start: PanelPlacement,
        live: LivePlacement,
        snap: Option<SnapZone>,
    },
    Resizing {
        panel: PanelId,
        pointer_id: u32,
        grip: ResizeGrip,
        origin: PointerPosition,
        current: PointerPosition,
        start: PanelPlacement,
        proposed: PanelPlacement,
    },
}

impl GestureState {
    #[must_use]
    pub const fn phase(&self) -> GesturePhase {
        match self {
            Self::Idle => GesturePhase::Idle,
            Self::Armed { .. } => GesturePhase::Armed,
            Self::Dragging { .. } => GesturePhase::Dragging,
            Self::Resizing { .. } => GesturePhase::Resizing,
        }
    }

    #[must_use]
    pub const fn panel(&self) -> Option<&PanelId> {
        match self {
            Self::Idle => None,
            Self::Armed { panel, .. } | Self::Dragging { panel, .. } | Self::Resizing { panel, .. } => {
                Some(panel)
            }
        }
    }

    const fn pointer_id(&self) -> Option<u32> {
        match self {
            Self::Idle => None,
            Self::Armed { pointer_id, .. }
            | Self::Dragging { pointer_id, .. }
            | Self::Resizing { pointer_id, .. } => Some(*pointer_id),
        }
    }
}

/// Coarse state label carried by transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GesturePhase {
    Idle,
    Armed,
    Dragging,
    Resizing,
}

/// Why an event was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureNoopReason {
    IdleWithoutActiveGesture,
    GestureAlreadyInProgress,
    PointerMismatch,
    UnknownPanel,
    ThresholdNotReached,
    BelowHysteresis,
}

/// The placement (and attachment) a finished gesture asks to commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GestureCommit {
    Moved {
        placement: PanelPlacement,
    },
    Snapped {
        placement: PanelPlacement,
        attachment: Attachment,
    },
    Resized {
        placement: PanelPlacement,
        grip: ResizeGrip,
    },
}

impl GestureCommit {
    #[must_use]
    pub const fn placement(&self) -> &PanelPlacement {
        match self {
            Self::Moved { placement }
            | Self::Snapped { placement, .. }
            | Self::Resized { placement, .. } => placement,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GestureEffect {
    Armed {
        panel: PanelId,
        pointer_id: u32,
        handle: DragHandle,
    },
    DragStarted {
        panel: PanelId,
        live: LivePlacement,
        snap: Option<SnapZone>,
    },
    DragUpdated {
        panel: PanelId,
        live: LivePlacement,
        snap: Option<SnapZone>,
    },
    ResizeStarted {
        panel: PanelId,
        proposed: PanelPlacement,
    },
    ResizeUpdated {
        panel: PanelId,
        proposed: PanelPlacement,
    },
    Committed(GestureCommit),
    /// Pointer released before the drag threshold: a click, nothing to commit.
    Released {
        panel: PanelId,
    },
    Canceled {
        panel: Option<PanelId>,
        reason: CancelReason,
    },
    Noop {
        reason: GestureNoopReason,
    },
}

/// One machine step.
#[derive(Debug, Clone, PartialEq)]
pub struct GestureTransition {
    pub transition_id: u64,
    pub sequence: u64,
    pub from: GesturePhase,
    pub to: GesturePhase,
    pub effect: GestureEffect,
}

/// Drag/resize lifecycle machine for a single pointer.
#[derive(Debug, Clone, PartialEq)]
pub struct DragResizeMachine {
    state: GestureState,
    drag_threshold: u16,
    update_hysteresis: u16,
    transition_counter: u64,
}

impl Default for DragResizeMachine {
    fn default() -> Self {
        Self {
            state: GestureState::Idle,
            drag_threshold: DEFAULT_DRAG_THRESHOLD_PX,
            update_hysteresis: DEFAULT_UPDATE_HYSTERESIS_PX,
            transition_counter: 0,
        }
    }
}

impl DragResizeMachine {
    pub fn new(drag_threshold: u16) -> Result<Self, GestureError> {
        Self::new_with_hysteresis(drag_threshold, DEFAULT_UPDATE_HYSTERESIS_PX)
    }

    pub fn new_with_hysteresis(drag_threshold: u16, update_hysteresis: u16) -> Result<Self, GestureError> {
        if drag_threshold == 0 {
            return Err(GestureError::InvalidDragThreshold {
                threshold: drag_threshold,
            });
        }
        if update_hysteresis == 0 {
            return Err(GestureError::InvalidUpdateHysteresis {
                hysteresis: update_hysteresis,
            });
        }
        Ok(Self {
            state: GestureState::Idle,
            drag_threshold,
            update_hysteresis,
            transition_counter: 0,
        })
    }

    #[must_use]
    pub const fn state(&self) -> &GestureState {
        &self.state
    }

    #[must_use]
    pub const fn drag_threshold(&self) -> u16 {
        self.drag_threshold
    }

    #[must_use]
    pub const fn update_hysteresis(&self) -> u16 {
        self.update_hysteresis
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        !matches!(self.state, GestureState::Idle)
    }

    /// Snap zone of the drag in progress, for indicator rendering.
    #[must_use]
    pub fn snap_zone(&self) -> Option<&SnapZone> {
        match &self.state {
            GestureState::Dragging { snap, .. } => snap.as_ref(),
            _ => None,
        }
    }

    /// Reset to Idle without committing. `None` when already idle.
    pub fn force_cancel(&mut self, reason: CancelReason) -> Option<GestureTransition> {
        if !self.is_active() {
            return None;
        }
        let from = self.state.phase();
        let panel = self.state.panel().cloned();
        self.state = GestureState::Idle;
        Some(self.transition(
            0,
            from,
            GestureEffect::Canceled { panel, reason },
        ))
    }

    /// Apply one event.
    pub fn apply_event(&mut self, event: &GestureEvent, ctx: &GestureContext<'_>) -> GestureTransition {
        let from = self.state.phase();
        let effect = match &event.kind {
            GestureEventKind::PointerDown {
                panel,
                pointer_id,
                position,
                handle,
            } => self.pointer_down(panel, *pointer_id, *position, *handle, event.sequence, ctx),
            GestureEventKind::PointerMove {
                pointer_id,
                position,
            } => self.pointer_move(*pointer_id, *position, ctx),
            GestureEventKind::PointerUp {
                pointer_id,
                position,
            } => self.pointer_up(*pointer_id, *position, ctx),
            GestureEventKind::Cancel { reason } => {
                if self.is_active() {
                    let panel = self.state.panel().cloned();
                    self.state = GestureState::Idle;
                    GestureEffect::Canceled {
                        panel,
                        reason: *reason,
                    }
                } else {
                    GestureEffect::Noop {
                        reason: GestureNoopReason::IdleWithoutActiveGesture,
                    }
                }
            }
        };
        self.transition(event.sequence, from, effect)
    }

    fn transition(&mut self, sequence: u64, from: GesturePhase, effect: GestureEffect) -> GestureTransition {
        self.transition_counter = self.transition_counter.saturating_add(1);
        GestureTransition {
            transition_id: self.transition_counter,
            sequence,
            from,
            to: self.state.phase(),
            effect,
        }
    }

    fn pointer_down(
        &mut self,
        panel: &PanelId,
        pointer_id: u32,
        position: PointerPosition,
        handle: DragHandle,
        sequence: u64,
        ctx: &GestureContext<'_>,
    ) -> GestureEffect {
        if self.is_active() {
            return GestureEffect::Noop {
                reason: GestureNoopReason::GestureAlreadyInProgress,
            };
        }
        let Some(start) = ctx.placements.iter().find(|p| &p.id == panel) else {
            return GestureEffect::Noop {
                reason: GestureNoopReason::UnknownPanel,
            };
        };
        self.state = GestureState::Armed {
            panel: panel.clone(),
            pointer_id,
            handle,
            origin: position,
            start: start.clone(),
            started_sequence: sequence,
        };
        GestureEffect::Armed {
            panel: panel.clone(),
            pointer_id,
            handle,
        }
    }

    fn pointer_move(
        &mut self,
        pointer_id: u32,
        position: PointerPosition,
        ctx: &GestureContext<'_>,
    ) -> GestureEffect {
        match self.state.pointer_id() {
            None => {
                return GestureEffect::Noop {
                    reason: GestureNoopReason::IdleWithoutActiveGesture,
                };
            }
            Some(active) if active != pointer_id => {
                return GestureEffect::Noop {
                    reason: GestureNoopReason::PointerMismatch,
                };
            }
            Some(_) => {}
        }

        match &self.state {
            GestureState::Armed {
                panel,
                handle,
                origin,
                start,
                ..
            } => {
                if !crossed_threshold(*origin, position, self.drag_threshold) {
                    return GestureEffect::Noop {
                        reason: GestureNoopReason::ThresholdNotReached,
                    };
                }
                let (panel, handle, origin, start) = (panel.clone(), *handle, *origin, start.clone());
                match handle {
                    DragHandle::Move => {
                        let (live, snap) = drag_step(&panel, &start, origin, position, ctx);
                        log_snap(&panel, None, snap.as_ref());
                        self.state = GestureState::Dragging {
                            panel: panel.clone(),
                            pointer_id,
                            origin,
                            current: position,
                            start,
                            live,
                            snap: snap.clone(),
                        };
                        GestureEffect::DragStarted { panel, live, snap }
                    }
                    DragHandle::Resize(grip) => {
                        let proposed = resize_step(&start, grip, origin, position, ctx);
                        self.state = GestureState::Resizing {
                            panel: panel.clone(),
                            pointer_id,
                            grip,
                            origin,
                            current: position,
                            start,
                            proposed: proposed.clone(),
                        };
                        GestureEffect::ResizeStarted { panel, proposed }
                    }
                }
            }
            GestureState::Dragging {
                panel,
                origin,
                current,
                start,
                snap: previous_snap,
                ..
            } => {
                if !crossed_threshold(*current, position, self.update_hysteresis) {
                    return GestureEffect::Noop {
                        reason: GestureNoopReason::BelowHysteresis,
                    };
                }
                let (live, snap) = drag_step(panel, start, *origin, position, ctx);
                log_snap(panel, previous_snap.as_ref(), snap.as_ref());
                let panel = panel.clone();
                if let GestureState::Dragging {
                    current,
                    live: stored_live,
                    snap: stored_snap,
                    ..
                } = &mut self.state
                {
                    *current = position;
                    *stored_live = live;
                    *stored_snap = snap.clone();
                }
                GestureEffect::DragUpdated { panel, live, snap }
            }
            GestureState::Resizing {
                panel,
                grip,
                origin,
                current,
                start,
                ..
            } => {
                if !crossed_threshold(*current, position, self.update_hysteresis) {
                    return GestureEffect::Noop {
                        reason: GestureNoopReason::BelowHysteresis,
                    };
                }
                let proposed = resize_step(start, *grip, *origin, position, ctx);
                let panel = panel.clone();
                if let GestureState::Resizing {
                    current,
                    proposed: stored,
                    ..
                } = &mut self.state
                {
                    *current = position;
                    *stored = proposed.clone();
                }
                GestureEffect::ResizeUpdated { panel, proposed }
            }
            GestureState::Idle => GestureEffect::Noop {
                reason: GestureNoopReason::IdleWithoutActiveGesture,
            },
        }
    }

    fn pointer_up(
        &mut self,
        pointer_id: u32,
        position: PointerPosition,
        ctx: &GestureContext<'_>,
    ) -> GestureEffect {
        match self.state.pointer_id() {
            None => {
                return GestureEffect::Noop {
                    reason: GestureNoopReason::IdleWithoutActiveGesture,
                };
            }
            Some(active) if active != pointer_id => {
                return GestureEffect::Noop {
                    reason: GestureNoopReason::PointerMismatch,
                };
            }
            Some(_) => {}
        }

        let state = std::mem::replace(&mut self.state, GestureState::Idle);
        let commit = match state {
            GestureState::Idle => {
                return GestureEffect::Noop {
                    reason: GestureNoopReason::IdleWithoutActiveGesture,
                };
            }
            GestureState::Armed { panel, .. } => return GestureEffect::Released { panel },
            GestureState::Dragging {
                panel,
                origin,
                current,
                start,
                live,
                snap,
                ..
            } => {
                let (live, snap) = if position == current {
                    (live, snap)
                } else {
                    drag_step(&panel, &start, origin, position, ctx)
                };
                match snap {
                    Some(zone) => GestureCommit::Snapped {
                        placement: zone.placement_for(panel.clone()),
                        attachment: Attachment::new(panel, zone.target, zone.edge),
                    },
                    None => GestureCommit::Moved {
                        placement: PanelPlacement::from_rect(panel, live.rounded()),
                    },
                }
            }
            GestureState::Resizing {
                grip,
                origin,
                current,
                start,
                proposed,
                ..
            } => {
                let placement = if position == current {
                    proposed
                } else {
                    resize_step(&start, grip, origin, position, ctx)
                };
                GestureCommit::Resized { placement, grip }
            }
        };
        let placement = commit.placement();
        debug!(
            panel = %placement.id,
            x = placement.x,
            y = placement.y,
            w = placement.w,
            h = placement.h,
            snapped = matches!(commit, GestureCommit::Snapped { .. }),
            "gesture committed"
        );
        GestureEffect::Committed(commit)
    }
}

fn crossed_threshold(origin: PointerPosition, current: PointerPosition, threshold: u16) -> bool {
    let (dx, dy) = current.delta_from(origin);
    let threshold = i64::from(threshold);
    let squared = i64::from(dx) * i64::from(dx) + i64::from(dy) * i64::from(dy);
    squared >= threshold * threshold
}

/// Live placement and snap zone for a move handle at `position`.
fn drag_step(
    panel: &PanelId,
    start: &PanelPlacement,
    origin: PointerPosition,
    position: PointerPosition,
    ctx: &GestureContext<'_>,
) -> (LivePlacement, Option<SnapZone>) {
    let (dx, dy) = position.delta_from(origin);
    let max_x = f64::from(ctx.limits.columns.saturating_sub(start.w));
    let x = (f64::from(start.x) + ctx.geometry.pixels_to_cells(dx, Axis::Horizontal)).clamp(0.0, max_x);
    let y = (f64::from(start.y) + ctx.geometry.pixels_to_cells(dy, Axis::Vertical)).max(0.0);
    let live = LivePlacement::new(x, y, start.w, start.h);
    let snap = detect_accepting(
        panel,
        &live,
        ctx.placements,
        ctx.snap_targets,
        ctx.geometry.config(),
        ctx.default_snap_distance_px,
        |target| ctx.attachments.accepts(panel, target),
    );
    (live, snap)
}

/// Proposed placement for a resize grip at `position`.
fn resize_step(
    start: &PanelPlacement,
    grip: ResizeGrip,
    origin: PointerPosition,
    position: PointerPosition,
    ctx: &GestureContext<'_>,
) -> PanelPlacement {
    let (dx, dy) = position.delta_from(origin);
    let dx = ctx.geometry.pixels_to_cells(dx, Axis::Horizontal).round() as i32;
    let dy = ctx.geometry.pixels_to_cells(dy, Axis::Vertical).round() as i32;
    let columns = i32::from(ctx.limits.columns.max(1));
    let min_w = i32::from(ctx.limits.min_w.max(1)).min(columns);
    let min_h = i32::from(ctx.limits.min_h.max(1));

    let mut left = i32::from(start.x);
    let mut top = i32::from(start.y);
    let mut right = left + i32::from(start.w);
    let mut bottom = top + i32::from(start.h);
    if grip.moves_left() {
        left = (left + dx).min(right - min_w).max(0);
    }
    if grip.moves_right() {
        right = (right + dx).max(left + min_w).min(columns);
    }
    if grip.moves_top() {
        top = (top + dy).min(bottom - min_h).max(0);
    }
    if grip.moves_bottom() {
        bottom = (bottom + dy).max(top + min_h);
    }
    let cell = |v: i32| v.clamp(0, i32::from(u16::MAX)) as u16;
    ctx.limits.normalize(&PanelPlacement {
        id: start.id.clone(),
        x: cell(left),
        y: cell(top),
        w: cell(right - left),
        h: cell(bottom - top),
    })
}

fn log_snap(panel: &PanelId, previous: Option<&SnapZone>, next: Option<&SnapZone>) {
    let key = |z: &SnapZone| (z.target.clone(), z.edge, z.snapped);
    if previous.map(key) == next.map(key) {
        return;
    }
    match next {
        Some(zone) => debug!(
            panel = %panel,
            target = %zone.target,
            edge = %zone.edge,
            distance = zone.distance,
            "snap zone entered"
        ),
        None => debug!(panel = %panel, "snap zone left"),
    }
}
