//! Condition resolution: pure branch selection over chip values.
//!
//! [`engine::resolve`] is the only decision point. The selectors in
//! [`select`] apply it to conditional atoms, bucketed payloads, geometry
//! alternatives and tile layers.

pub mod engine;
pub mod select;
