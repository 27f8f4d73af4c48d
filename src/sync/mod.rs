//! Map synchronization: collaborator seam, highlight ledger and the shared
//! synchronizer that publishes resolved highlight, bucket and layer state.

pub mod ledger;
pub mod map;
pub mod synchronizer;
