//! Decision events (§6) and the reason bitset (§4.1, design note 4).

use std::fmt;
use std::ops::{BitAnd, BitOr};

use serde::{Deserialize, Serialize};

use crate::node::NodeId;
use crate::station::StationId;

/// The type of inbound station-management request (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestKind {
    Probe,
    Assoc,
    Auth,
}

impl RequestKind {
    pub(crate) const COUNT: usize = 3;

    pub(crate) fn index(self) -> usize {
        match self {
            RequestKind::Probe => 0,
            RequestKind::Assoc => 1,
            RequestKind::Auth => 2,
        }
    }
}

/// A single orthogonal reason a candidate AP beats the station's current
/// one. Kept as a `u8` bitset rather than a `HashSet<Reason>` so tie-break
/// code can combine/test reasons with plain bitwise ops, matching the
/// "required_bits" parameter of `find_better` in §4.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReasonSet(u8);

impl ReasonSet {
    pub const NONE: ReasonSet = ReasonSet(0);
    pub const NUM_ASSOC: ReasonSet = ReasonSet(1 << 0);
    pub const SIGNAL: ReasonSet = ReasonSet(1 << 1);
    pub const LOAD: ReasonSet = ReasonSet(1 << 2);
    pub const ALL: ReasonSet = ReasonSet(Self::NUM_ASSOC.0 | Self::SIGNAL.0 | Self::LOAD.0);

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: ReasonSet) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: ReasonSet) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for ReasonSet {
    type Output = ReasonSet;
    fn bitor(self, rhs: ReasonSet) -> ReasonSet {
        ReasonSet(self.0 | rhs.0)
    }
}

impl BitAnd for ReasonSet {
    type Output = ReasonSet;
    fn bitand(self, rhs: ReasonSet) -> ReasonSet {
        ReasonSet(self.0 & rhs.0)
    }
}

impl fmt::Display for ReasonSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.member_names();
        write!(f, "[{}]", names.join(","))
    }
}

impl ReasonSet {
    fn member_names(self) -> Vec<&'static str> {
        let mut v = Vec::with_capacity(3);
        if self.contains(ReasonSet::NUM_ASSOC) {
            v.push("NUM_ASSOC");
        }
        if self.contains(ReasonSet::SIGNAL) {
            v.push("SIGNAL");
        }
        if self.contains(ReasonSet::LOAD) {
            v.push("LOAD");
        }
        v
    }
}

impl Serialize for ReasonSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.member_names().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ReasonSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let names: Vec<String> = Vec::deserialize(deserializer)?;
        let mut set = ReasonSet::NONE;
        for name in names {
            set = set
                | match name.as_str() {
                    "NUM_ASSOC" => ReasonSet::NUM_ASSOC,
                    "SIGNAL" => ReasonSet::SIGNAL,
                    "LOAD" => ReasonSet::LOAD,
                    _ => ReasonSet::NONE,
                };
        }
        Ok(set)
    }
}

/// Admission-reject reason tag (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reason {
    LowSignal,
    ConnectDelay,
    BetterCandidate,
    RetryExceeded,
}

/// The kind of decision event emitted to the [`EventSink`] (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum DecisionKind {
    ProbeAccept,
    ProbeReject,
    AssocAccept,
    AssocReject,
    AuthAccept,
    AuthReject,
    SignalKick,
    LoadKickTrigger,
    LoadKickReset,
    LoadKickMinClients,
    LoadKickNoClient,
    LoadKickClient,
    RoamTrigger,
}

/// One structured decision record (§6). Every field but `timestamp` and
/// `kind` is optional: each emission site fills in only what applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionEvent {
    pub timestamp: u64,
    pub kind: DecisionKind,
    pub station: Option<StationId>,
    pub node_cur: Option<NodeId>,
    pub node_target: Option<NodeId>,
    pub signal: Option<i32>,
    pub threshold_cur: Option<i64>,
    pub threshold_ref: Option<i64>,
    pub reason: Option<Reason>,
    pub select_reasons: Option<ReasonSet>,
}

impl DecisionEvent {
    pub(crate) fn new(timestamp: u64, kind: DecisionKind) -> Self {
        DecisionEvent {
            timestamp,
            kind,
            station: None,
            node_cur: None,
            node_target: None,
            signal: None,
            threshold_cur: None,
            threshold_ref: None,
            reason: None,
            select_reasons: None,
        }
    }
}

/// One-way sink for decision events (§6, design note 3). The core never
/// inspects or depends on what consumes its events — a log file, an ubus
/// broadcast, and a Lua hook can all be plugged in behind the same trait
/// without the core knowing any of them exist.
pub trait EventSink {
    fn emit(&mut self, event: DecisionEvent);
}

/// An [`EventSink`] that drops everything; useful in tests that only care
/// about the return value of an operation.
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: DecisionEvent) {}
}

/// An [`EventSink`] that records events in order, for assertions in tests.
#[derive(Debug, Default)]
pub struct RecordingSink(pub Vec<DecisionEvent>);

impl EventSink for RecordingSink {
    fn emit(&mut self, event: DecisionEvent) {
        self.0.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_set_union_and_intersection() {
        let both = ReasonSet::NUM_ASSOC | ReasonSet::SIGNAL;
        assert!(both.contains(ReasonSet::NUM_ASSOC));
        assert!(both.contains(ReasonSet::SIGNAL));
        assert!(!both.contains(ReasonSet::LOAD));
        assert!((both & ReasonSet::LOAD).is_empty());
    }

    #[test]
    fn reason_set_round_trips_through_json() {
        let set = ReasonSet::SIGNAL | ReasonSet::LOAD;
        let json = serde_json::to_string(&set).unwrap();
        let back: ReasonSet = serde_json::from_str(&json).unwrap();
        assert_eq!(set, back);
    }
}
