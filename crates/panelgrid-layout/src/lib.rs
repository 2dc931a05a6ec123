#![forbid(unsafe_code)]

//! Grid panel layout: compaction, snapping, and attached units.
//!
//! # Role in panelgrid
//! `panelgrid-layout` owns every panel rectangle of every workspace. Hosts
//! register panels, feed pointer input, and render whatever the store
//! publishes; they never compute positions themselves.
//!
//! # Primary responsibilities
//! - **Grid**: pixel/cell conversion and vertical compaction ([`grid`]).
//! - **Store**: versioned per-workspace layouts with change notification ([`store`]).
//! - **Snap**: edge proximity detection during a drag ([`snap`]).
//! - **Attach**: the attachment graph and its enforcer ([`attach`]).
//! - **Gestures**: the drag/resize state machine ([`controller`]).
//! - **Persistence**: versioned layout records and storage backends ([`persist`]).
//!
//! [`engine::PanelEngine`] wires all of the above for a single host surface.
//!
//! ```
//! use panelgrid_core::event::ContainerSize;
//! use panelgrid_core::geometry::CellRect;
//! use panelgrid_layout::{
//!     EngineConfig, MemoryStorage, PanelEngine, PanelRegistration, PanelRegistry, WorkspaceId,
//! };
//!
//! let mut engine = PanelEngine::new(
//!     EngineConfig::default(),
//!     MemoryStorage::new(),
//!     ContainerSize::new(1280, 720),
//! )
//! .unwrap();
//! engine.switch_workspace(
//!     WorkspaceId::new("main"),
//!     PanelRegistry::new([PanelRegistration::new("mixer", "Mixer", CellRect::new(0, 4, 6, 4))]),
//! );
//! // Compaction floats the panel to the top.
//! let layout = engine.layout().unwrap();
//! assert_eq!(layout.placements[0].y, 0);
//! ```

pub mod attach;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod grid;
pub mod panel;
pub mod persist;
pub mod snap;
pub mod store;

pub use attach::{AttachedUnit, Attachment, AttachmentEnforcer, AttachmentGraph, enforce};
pub use config::{EngineConfig, GestureConfig, PanelLimitsConfig};
pub use controller::{
    CancelReason, DragHandle, DragResizeMachine, GestureCommit, GestureEffect, GesturePhase,
    GestureState, GestureTransition, ResizeGrip,
};
pub use engine::{PanelEngine, PointerTarget};
pub use error::{AttachError, ConfigError, GestureError, LayoutError, PersistError};
pub use grid::{GridConfig, GridGeometry, GridLimits, compact};
pub use panel::{
    Edge, PanelId, PanelPlacement, PanelRegistration, PanelRegistry, PlacementPatch, SnapTarget,
    WorkspaceId,
};
pub use persist::{
    FileStorage, LayoutRecord, LayoutStorage, LoadOutcome, MemoryStorage, PersistenceAdapter,
};
pub use snap::{LivePlacement, SnapZone};
pub use store::{ChangeCause, LayoutChange, LayoutStore, Subscription, WorkspaceLayout};
