//! Node registry (§3, §4.8): local and remote APs, each a ordered set of
//! the stations currently associated to it.

use std::fmt;

use indexmap::IndexMap;

use crate::station::StationInfoHandle;

/// Identifies one AP radio, `"<host>/<ifname>"` by convention (e.g.
/// `"local/wlan0"` or `"office-ap-3/wlan1"`). Opaque to the core: the RPC
/// adapter decides what distinguishes two radios.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId::new(s)
    }
}

/// Bookkeeping that only applies to a node this process directly manages
/// (§4.8: `usteer_local_node` vs. `usteer_remote_node`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalNodeState {
    /// Consecutive ticks this node's load has been at/over
    /// `load_kick_threshold` (§4.5 phase 3 hysteresis).
    pub load_thr_count: u32,
}

/// Distinguishes a radio this process drives directly from one it only
/// hears about over the mesh control channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NodeKind {
    #[default]
    Remote,
    Local,
}

/// One AP radio (§3 `usteer_node`), local or remote.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub ssid: String,
    pub bssid: [u8; 6],
    pub freq: u32,
    pub noise: i32,
    pub n_assoc: u32,
    pub max_assoc: u32,
    pub load: u32,
    pub disabled: bool,

    pub local: LocalNodeState,

    /// Stations currently associated here, in join order — `find_better`
    /// and the kick controller's victim scan (§4.5 phase 3) both rely on
    /// this being deterministic.
    stations: IndexMap<StationInfoHandle, ()>,
}

impl Node {
    pub(crate) fn new(id: NodeId, kind: NodeKind) -> Self {
        Node {
            id,
            kind,
            ssid: String::new(),
            bssid: [0; 6],
            freq: 0,
            noise: 0,
            n_assoc: 0,
            max_assoc: 0,
            load: 0,
            disabled: false,
            local: LocalNodeState::default(),
            stations: IndexMap::new(),
        }
    }

    pub fn link_station(&mut self, handle: StationInfoHandle) {
        self.stations.insert(handle, ());
    }

    pub fn unlink_station(&mut self, handle: StationInfoHandle) {
        self.stations.shift_remove(&handle);
    }

    pub fn stations(&self) -> impl Iterator<Item = StationInfoHandle> + '_ {
        self.stations.keys().copied()
    }

    pub fn station_count(&self) -> usize {
        self.stations.len()
    }
}

/// Owns every known [`Node`], indexed by [`NodeId`] in first-seen order
/// (§3: node iteration order must be deterministic for `find_better`).
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: IndexMap<NodeId, Node>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Insert a node the first time it's referenced, defaulting it to
    /// [`NodeKind::Remote`] until `on_node_update` (local) marks it
    /// otherwise. Mirrors `usteer_node_get`/`usteer_node_create` (§4.8).
    pub fn ensure(&mut self, id: NodeId) -> &mut Node {
        self.nodes.entry(id.clone()).or_insert_with(|| Node::new(id, NodeKind::Remote))
    }

    pub fn mark_local(&mut self, id: NodeId) -> &mut Node {
        let node = self.nodes.entry(id.clone()).or_insert_with(|| Node::new(id, NodeKind::Local));
        node.kind = NodeKind::Local;
        node
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &Node)> {
        self.nodes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_creates_remote_by_default() {
        let mut reg = NodeRegistry::new();
        let node = reg.ensure(NodeId::new("ap1/wlan0"));
        assert_eq!(node.kind, NodeKind::Remote);
    }

    #[test]
    fn mark_local_upgrades_existing_node() {
        let mut reg = NodeRegistry::new();
        reg.ensure(NodeId::new("ap1/wlan0"));
        let node = reg.mark_local(NodeId::new("ap1/wlan0"));
        assert_eq!(node.kind, NodeKind::Local);
    }

    #[test]
    fn node_iteration_is_insertion_ordered() {
        let mut reg = NodeRegistry::new();
        reg.ensure(NodeId::new("b"));
        reg.ensure(NodeId::new("a"));
        let order: Vec<_> = reg.iter().map(|(id, _)| id.as_str().to_string()).collect();
        assert_eq!(order, vec!["b", "a"]);
    }
}
