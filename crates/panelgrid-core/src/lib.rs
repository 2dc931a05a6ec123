#![forbid(unsafe_code)]

//! Core: cell geometry, captured host input, and frame coalescing.
//!
//! # Role in panelgrid
//! `panelgrid-core` is the input and geometry layer. It knows nothing about
//! panels or attachments; the layout engine (`panelgrid-layout`) consumes
//! its [`event::InputEvent`] values and [`geometry::CellRect`] primitives.
//!
//! # Primary responsibilities
//! - **Geometry**: cell and pixel rectangles.
//! - **Event**: pointer and container-size input, copied out of host events.
//! - **Coalescing**: at most one pointer move and one resize per frame.

pub mod coalescer;
pub mod event;
pub mod geometry;
pub mod logging;

// Re-export tracing macros at crate root for ergonomic use.
#[cfg(feature = "tracing")]
pub use logging::{
    debug, debug_span, error, error_span, info, info_span, trace, trace_span, warn, warn_span,
};
