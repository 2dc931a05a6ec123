#![forbid(unsafe_code)]

//! Per-frame coalescing for high-frequency input.
//!
//! Pointer moves arrive far more often than the display refreshes, and a
//! resize observer can fire several times while a window is dragged. Each of
//! those would otherwise trigger a layout recomputation. [`FrameCoalescer`]
//! keeps at most one pending pointer move and one pending container resize;
//! the host flushes it once per rendered frame.
//!
//! # Rules
//!
//! - **Pointer move**: latest position wins; intermediate moves are dropped.
//! - **Container resize**: latest size wins.
//! - **Everything else** (down, up, cancel) passes through immediately. The
//!   caller is expected to [`FrameCoalescer::flush`] first so the pending
//!   move is applied before the pointer-up that ends the gesture.
//!
//! # Usage
//!
//! ```
//! use panelgrid_core::coalescer::FrameCoalescer;
//! use panelgrid_core::event::{InputEvent, PointerPosition};
//!
//! let mut coalescer: FrameCoalescer<()> = FrameCoalescer::new();
//! let mv = |x| InputEvent::PointerMove { pointer_id: 1, position: PointerPosition::new(x, 0) };
//!
//! assert!(coalescer.push(mv(10)).is_none());
//! assert!(coalescer.push(mv(20)).is_none());
//!
//! let pending = coalescer.flush();
//! assert_eq!(pending, vec![mv(20)]);
//! assert!(!coalescer.has_pending());
//! ```

use crate::event::{ContainerSize, InputEvent, PointerPosition};

/// Coalesces pointer moves and container resizes into one update per frame.
///
/// Not thread-safe; it lives on the thread that handles input.
#[derive(Debug, Clone)]
pub struct FrameCoalescer<T> {
    pending_move: Option<(u32, PointerPosition)>,
    pending_resize: Option<ContainerSize>,
    dropped: u64,
    _target: std::marker::PhantomData<fn() -> T>,
}

impl<T> Default for FrameCoalescer<T> {
    fn default() -> Self {
        Self {
            pending_move: None,
            pending_resize: None,
            dropped: 0,
            _target: std::marker::PhantomData,
        }
    }
}

impl<T> FrameCoalescer<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push an event.
    ///
    /// Returns `Some(event)` if it must be handled now, `None` if it was
    /// absorbed into the pending frame state.
    pub fn push(&mut self, event: InputEvent<T>) -> Option<InputEvent<T>> {
        match event {
            InputEvent::PointerMove {
                pointer_id,
                position,
            } => {
                if self.pending_move.replace((pointer_id, position)).is_some() {
                    self.dropped = self.dropped.saturating_add(1);
                }
                None
            }
            InputEvent::ContainerResized(size) => {
                if self.pending_resize.replace(size).is_some() {
                    self.dropped = self.dropped.saturating_add(1);
                }
                None
            }
            other => Some(other),
        }
    }

    /// Drain pending events: the resize first (it changes the cell pitch
    /// the move is converted with), then the pointer move.
    #[must_use]
    pub fn flush(&mut self) -> Vec<InputEvent<T>> {
        let mut events = Vec::with_capacity(2);
        self.flush_each(|event| events.push(event));
        events
    }

    /// Drain pending events into a closure, same order as [`Self::flush`].
    pub fn flush_each<F>(&mut self, mut f: F)
    where
        F: FnMut(InputEvent<T>),
    {
        if let Some(size) = self.pending_resize.take() {
            f(InputEvent::ContainerResized(size));
        }
        if let Some((pointer_id, position)) = self.pending_move.take() {
            f(InputEvent::PointerMove {
                pointer_id,
                position,
            });
        }
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending_move.is_some() || self.pending_resize.is_some()
    }

    /// Number of events superseded before they were flushed.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }

    /// Discard pending input, e.g. when the active workspace changes.
    pub fn clear(&mut self) {
        self.pending_move = None;
        self.pending_resize = None;
    }
}
