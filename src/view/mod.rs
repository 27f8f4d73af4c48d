//! View projection and terminal rendering.

pub mod icons;
pub mod primitives;
pub mod project;
pub mod render;
pub mod text;
pub mod theme;
