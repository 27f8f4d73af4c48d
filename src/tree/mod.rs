//! Display tree: typed model, wire decoder and the evaluation request envelope.

pub mod decode;
pub mod model;
pub mod request;
