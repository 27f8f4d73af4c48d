#![forbid(unsafe_code)]

//! Stack outliner (sol): client-side core for rendering evaluation result
//! trees and keeping a shared map in sync with them.
//!
//! A response from the evaluation backend is decoded into a typed
//! [`tree::model::DisplayTree`] plus side tables. Condition-guarded branches
//! are resolved against per-outliner chip state, projected into renderable
//! primitives, and their feature highlights and colour buckets are published
//! to the map through a reference-counted synchronizer.
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use stack_outliner::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use stack_outliner::core::config::Config;
//! use stack_outliner::tree::decode::parse_response;
//! ```

pub mod prelude;

pub mod core;
pub mod logger;
pub mod outliner;
pub mod resolve;
pub mod state;
pub mod sync;
pub mod tree;
pub mod view;
