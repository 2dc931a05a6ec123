use std::path::PathBuf;

use thiserror::Error;

use crate::panel::{PanelId, WorkspaceId};

/// Programmer errors from store operations.
///
/// Expected lifecycle conditions (missing snap target, dangling attachment,
/// corrupt persisted record) never surface here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("workspace {workspace} has no layout")]
    UnknownWorkspace { workspace: WorkspaceId },

    #[error("panel {panel} is not part of workspace {workspace}")]
    UnknownPanel {
        workspace: WorkspaceId,
        panel: PanelId,
    },

    #[error("no workspace is active")]
    NoActiveWorkspace,

    #[error(transparent)]
    Attach(#[from] AttachError),
}

/// Reasons an attachment request is rejected. The graph is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttachError {
    #[error("panel {panel} cannot be attached to itself")]
    SelfAttachment { panel: PanelId },

    #[error("panel {panel} is not in the layout")]
    UnknownPanel { panel: PanelId },

    #[error("attaching {child} to {parent} would close a cycle")]
    Cycle { child: PanelId, parent: PanelId },

    #[error("panel {parent} already has {existing} attached")]
    ParentOccupied { parent: PanelId, existing: PanelId },

    #[error("attaching {child} to {parent} would overlap panels within the unit")]
    UnitOverlap { child: PanelId, parent: PanelId },

    #[error("attaching {child} to {parent} would make the unit {width} columns wide (grid has {columns})")]
    UnitTooWide {
        child: PanelId,
        parent: PanelId,
        width: u32,
        columns: u16,
    },
}

/// Persistence transport and decoding failures.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported layout record version {found} (newest known is {supported})")]
    UnsupportedVersion { found: u16, supported: u16 },
}

/// Errors that can occur when loading an engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("validation errors: {}", .0.join("; "))]
    Validation(Vec<String>),
}

/// Gesture machine configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GestureError {
    #[error("drag threshold must be > 0 (got {threshold})")]
    InvalidDragThreshold { threshold: u16 },

    #[error("update hysteresis must be > 0 (got {hysteresis})")]
    InvalidUpdateHysteresis { hysteresis: u16 },
}
