//! Station registry (§3, §4.7): deduplicates clients by MAC and indexes
//! their per-node observations.

use std::fmt;

use generational_arena::{Arena, Index};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::event::RequestKind;
use crate::node::NodeId;

/// 6-byte hardware address identifying a Wi-Fi client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StationId(pub [u8; 6]);

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Stable handle to a [`StationInfo`] living in the [`StationRegistry`]
/// arena. Outlives any particular position in a `Station`'s or `Node`'s
/// ordered membership list, and is invalidated (by generation) once the
/// slot is reused — see design note on arenas in SPEC_FULL.md §3.
pub type StationInfoHandle = Index;

/// Tri-state connection status of a (station, node) observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectedState {
    NotConnected,
    Pending,
    Connected,
}

/// Per-request-type admission counters (§3).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestStats {
    pub requests: u32,
    pub blocked_cur: u32,
    pub blocked_total: u32,
    pub blocked_last_time: u64,
}

/// States of the roam trigger state machine (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoamState {
    #[default]
    Idle,
    Scan,
    ScanDone,
    WaitKick,
    NotifyKick,
    Kick,
}

/// The (station, node) observation — `sta_info` in the original (§3).
#[derive(Debug, Clone)]
pub struct StationInfo {
    pub station: StationId,
    pub node: NodeId,

    pub created: u64,
    pub seen: u64,
    pub signal: i32,
    pub connected: ConnectedState,

    pub stats: [RequestStats; RequestKind::COUNT],

    pub roam_state: RoamState,
    pub roam_tries: u32,
    pub roam_event: u64,
    /// Timestamp this station was last kicked via the roam SM or the
    /// per-node kick controller; gates the roam sweep's
    /// `roam_trigger_interval` cooldown (§4.5 phase 1).
    pub roam_kick: u64,
    pub roam_scan_start: u64,
    pub roam_scan_timeout_start: u64,

    pub kick_count: u32,
    /// Consecutive ticks this station has been below `min_snr` while
    /// connected (§4.5 phase 2 hysteresis).
    pub below_min_snr: u32,

    /// True once a scan hint has told the client to report a candidate on
    /// the non-current band; carried through from `usteer.h`'s
    /// `scan_band` bitfield though nothing in the core's operations reads
    /// it back yet (see SPEC_FULL.md §3).
    pub scan_band: bool,
}

impl StationInfo {
    pub(crate) fn new(station: StationId, node: NodeId, now: u64) -> Self {
        StationInfo {
            station,
            node,
            created: now,
            seen: now,
            signal: i32::MIN,
            connected: ConnectedState::NotConnected,
            stats: Default::default(),
            roam_state: RoamState::Idle,
            roam_tries: 0,
            roam_event: 0,
            roam_kick: 0,
            roam_scan_start: 0,
            roam_scan_timeout_start: 0,
            kick_count: 0,
            below_min_snr: 0,
            scan_band: false,
        }
    }
}

/// A Wi-Fi client as seen across the whole mesh (§3).
#[derive(Debug, Clone, Default)]
pub struct Station {
    pub seen_2ghz: bool,
    pub seen_5ghz: bool,
    /// Per-node observations, in the order they were first linked —
    /// `find_better` (§4.2) relies on this order being preserved.
    nodes: IndexMap<NodeId, StationInfoHandle>,
}

impl Station {
    pub fn handle_for(&self, node: &NodeId) -> Option<StationInfoHandle> {
        self.nodes.get(node).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, StationInfoHandle)> {
        self.nodes.iter().map(|(k, v)| (k, *v))
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }
}

/// Owns every [`StationInfo`] in a stable arena and indexes [`Station`]s by
/// MAC. A `StationInfo` is jointly referenced by its `Station` and its
/// `Node`; it is dropped from the arena only once both have released their
/// handle (§3 "Ownership").
#[derive(Debug, Default)]
pub struct StationRegistry {
    arena: Arena<StationInfo>,
    stations: IndexMap<StationId, Station>,
}

impl StationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn station(&self, id: StationId) -> Option<&Station> {
        self.stations.get(&id)
    }

    pub fn station_mut(&mut self, id: StationId) -> Option<&mut Station> {
        self.stations.get_mut(&id)
    }

    pub fn info(&self, handle: StationInfoHandle) -> Option<&StationInfo> {
        self.arena.get(handle)
    }

    pub fn info_mut(&mut self, handle: StationInfoHandle) -> Option<&mut StationInfo> {
        self.arena.get_mut(handle)
    }

    /// Fetch the existing (station, node) observation, or create both the
    /// `Station` (if this is the first time this MAC has been seen) and
    /// the `StationInfo` (if this is the first time this MAC has been seen
    /// on this node). Mirrors `usteer_sta_get` + `usteer_sta_info_get`
    /// (§4.7); the at-most-one-per-pair invariant (§3) is enforced here,
    /// not trusted from callers.
    pub fn get_or_create(
        &mut self,
        station_id: StationId,
        node_id: NodeId,
        now: u64,
    ) -> StationInfoHandle {
        let station = self.stations.entry(station_id).or_default();
        if let Some(handle) = station.nodes.get(&node_id) {
            return *handle;
        }
        let handle = self.arena.insert(StationInfo::new(station_id, node_id.clone(), now));
        station.nodes.insert(node_id, handle);
        handle
    }

    /// Remove a single (station, node) observation. Drops the owning
    /// `Station` entirely once its last observation is gone (§3: "a
    /// station... destroyed when every per-node observation has
    /// expired").
    pub fn unlink(&mut self, station_id: StationId, node_id: &NodeId) -> Option<StationInfo> {
        let station = self.stations.get_mut(&station_id)?;
        let handle = station.nodes.shift_remove(node_id)?;
        let removed = self.arena.remove(handle);
        if station.nodes.is_empty() {
            self.stations.shift_remove(&station_id);
        }
        removed
    }

    pub fn stations(&self) -> impl Iterator<Item = (&StationId, &Station)> {
        self.stations.iter()
    }
}
