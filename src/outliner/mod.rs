//! Outliner panel: Elm-style model and update, collaborator seams, host loop.

pub mod chrome;
pub mod model;
pub mod runtime;
pub mod update;
