//! Per-outliner client selection state.

pub mod store;
