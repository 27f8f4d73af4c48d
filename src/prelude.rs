//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use stack_outliner::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{Result, SolError};

// Logger
pub use crate::logger::jsonl::{EventType, LogEntry, Severity};
pub use crate::logger::sink::{EventSink, JsonlSink, MemorySink, NullSink};

// Tree
pub use crate::tree::decode::{DecodeReport, decode, parse_response};
pub use crate::tree::model::{
    Atom, Condition, DisplayResponse, DisplayTree, FeatureId, Line, NodeRef,
};
pub use crate::tree::request::{EvaluationRequest, ViewContext};

// State and resolution
pub use crate::resolve::engine::{Resolution, resolve};
pub use crate::state::store::{ChipSource, ClientState};

// View
pub use crate::view::primitives::{RenderedLine, RenderedStack};
pub use crate::view::project::{ProjectionContext, project};
pub use crate::view::render::{TextOptions, render_text};

// Sync
pub use crate::sync::map::{MapCollaborator, RecordingMap};
pub use crate::sync::synchronizer::{MapState, MapSynchronizer, SharedSynchronizer};

// Outliner
pub use crate::outliner::chrome::{Decoded, EvaluationClient, OutlinerChrome};
pub use crate::outliner::model::{OutlinerCmd, OutlinerModel, OutlinerMsg};
pub use crate::outliner::runtime::OutlinerHost;
