//! Error taxonomy (§7). The policy core has no recoverable failure mode
//! of its own: [`ConfigError`] is the one place a caller gets back a
//! `Result`, and [`CoreWarning`] names the "drop the input, log it"
//! invariant-violation class that never panics and never aborts.

use thiserror::Error;

pub use crate::config::ConfigError;
use crate::node::NodeId;
use crate::station::StationId;

/// Structured warning for an abnormal-but-not-fatal input (§7). Never
/// returned as an `Err` — [`crate::core::SteeringCore`] logs these with
/// `tracing::warn!` at the point of detection and drops the offending
/// call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreWarning {
    #[error("station event for node {node} that has no registered observations")]
    UnknownNode { node: NodeId },
    #[error("duplicate (station, node) observation for {station} on {node}")]
    DuplicateObservation { station: StationId, node: NodeId },
}
