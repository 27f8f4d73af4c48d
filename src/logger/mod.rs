//! Structured event journal: JSONL append-only writer plus in-process sinks.

pub mod jsonl;
pub mod sink;
