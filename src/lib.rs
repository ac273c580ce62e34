//! StudioPlay editing & compositing engine.
//!
//! Non-destructive adjustments with linear undo/redo, a freehand mask painter
//! producing strict binary selections, draggable overlay layers, and a
//! preview/exact compositor whose two paths share one transform and filter
//! definition. Collage and platform export sit on top of the exact pass; the
//! remote generation service and item store are reached through traits.

#![allow(clippy::too_many_arguments)]

pub mod cli;
pub mod collage;
pub mod components;
pub mod compositor;
pub mod coords;
pub mod edit_state;
pub mod error;
pub mod export;
pub mod generation;
pub mod io;
pub mod logger;
pub mod ops;
pub mod session;
pub mod settings;
pub mod store;
pub mod surface;
pub mod viewport;

#[cfg(test)]
pub(crate) mod testing;

pub use edit_state::EditState;
pub use error::{EngineError, GenerationError, Result, ValidationError};
pub use surface::Surface;
