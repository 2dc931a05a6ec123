#![forbid(unsafe_code)]

//! Host input events, captured as plain scalars.
//!
//! Pointer events coming from a host toolkit may be recycled once the
//! handler returns. Everything the engine needs (pointer id, position,
//! container size) is copied into these types synchronously at
//! event-handling time, so they can be queued and replayed on the next
//! frame without touching the host event object.

use serde::{Deserialize, Serialize};

/// Pointer location in container pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PointerPosition {
    pub x: i32,
    pub y: i32,
}

impl PointerPosition {
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Signed delta from `origin` to `self`, saturating on overflow.
    #[must_use]
    pub const fn delta_from(self, origin: PointerPosition) -> (i32, i32) {
        (
            self.x.saturating_sub(origin.x),
            self.y.saturating_sub(origin.y),
        )
    }
}

/// Live pixel size of the rendering surface, as reported by a resize observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ContainerSize {
    pub width: u32,
    pub height: u32,
}

impl ContainerSize {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Canonical input event delivered by the host.
///
/// `T` is the hit-test payload attached to a pointer-down (for example which
/// panel and which handle was pressed); the core crate does not interpret it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputEvent<T> {
    PointerDown {
        pointer_id: u32,
        position: PointerPosition,
        target: T,
    },
    PointerMove {
        pointer_id: u32,
        position: PointerPosition,
    },
    PointerUp {
        pointer_id: u32,
        position: PointerPosition,
    },
    ContainerResized(ContainerSize),
    /// Host-wired cancel (Escape, window blur).
    Cancel,
}
