//! Policy/decision core of a multi-AP Wi-Fi band-steering and
//! load-balancing daemon: candidate selection, request admission, the
//! per-station roam trigger state machine, and the per-node kick
//! controller. See `SPEC_FULL.md` for the full design.
//!
//! The core performs no I/O of its own. An embedder drives it through
//! [`core::SteeringCore`]'s five entry points and supplies an
//! [`action::ActionSink`] (outbound RPC calls) and an [`event::EventSink`]
//! (decision-record consumer) — see `src/bin/steerd_sim.rs` for a worked
//! example.

pub mod action;
pub mod admission;
pub mod candidate;
pub mod clock;
pub mod config;
pub mod core;
pub mod error;
pub mod event;
pub mod kick;
pub mod node;
pub mod roam;
pub mod station;

pub use action::ActionSink;
pub use clock::Clock;
pub use config::{Config, ConfigError, ConfigValue};
pub use core::{NodeSnapshot, SteeringCore};
pub use error::CoreWarning;
pub use event::{DecisionEvent, DecisionKind, EventSink, Reason, ReasonSet, RequestKind};
pub use node::{Node, NodeId, NodeKind, NodeRegistry};
pub use station::{ConnectedState, RoamState, Station, StationId, StationInfo, StationRegistry};
