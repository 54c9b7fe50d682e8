//! Candidate evaluation (§4.1, §4.2): the pure predicate `evaluate` and the
//! `find_better` search built on top of it.

use crate::config::Config;
use crate::event::ReasonSet;
use crate::node::{Node, NodeId, NodeRegistry};
use crate::station::{Station, StationInfo, StationRegistry};

/// Convert a threshold expressed as SNR (positive dB) to an absolute
/// signal level in dBm using the node's noise floor, defaulting the floor
/// to -95 dBm when the node hasn't reported one. Negative inputs are
/// already expressed in dBm and pass through unchanged, so a threshold in
/// config can be given either way.
pub fn snr_to_signal(node: &Node, snr: i32) -> i32 {
    if snr < 0 {
        return snr;
    }
    let noise = if node.noise != 0 { node.noise } else { -95 };
    noise + snr
}

/// True when `node` has room for one more association.
pub fn below_max_assoc(node: &Node) -> bool {
    node.max_assoc == 0 || node.n_assoc < node.max_assoc
}

/// True when `node` is over its configured load-shed threshold (§4.1
/// "below load threshold" — named for the original's perspective of the
/// *reference*, but it actually reports the opposite of what it sounds
/// like: true once the node qualifies as overloaded).
fn below_load_threshold(cfg: &Config, node: &Node) -> bool {
    node.n_assoc >= cfg.load_kick_min_clients && node.load > cfg.load_kick_threshold
}

/// True when `reference` is overloaded and `candidate` is not — i.e.
/// `candidate` offers load relief. The upstream C wrote the outer check
/// in `is_better_candidate` as `has_better_load(a, b) && !has_better_load(a,
/// b)` (always false, silently disabling the LOAD reason) and, separately,
/// defined this helper itself with the arguments' overload tests
/// backwards (`!below_load_threshold(cur) && below_load_threshold(new)`,
/// which flags the *candidate's* overload rather than the reference's —
/// see DESIGN.md). Both are corrected here: this fires iff the reference
/// is the overloaded one and the candidate genuinely has headroom.
pub fn has_better_load(cfg: &Config, reference: &Node, candidate: &Node) -> bool {
    below_load_threshold(cfg, reference) && !below_load_threshold(cfg, candidate)
}

/// NUM_ASSOC comparison (§4.1): `a`'s association count, band-adjusted
/// relative to `b` and penalized by `load_balancing_threshold`, is at
/// most `b`'s.
fn assoc_favors(cfg: &Config, a: &Node, b: &Node) -> bool {
    let mut n_a = a.n_assoc as i64;
    let mut n_b = b.n_assoc as i64;
    let a_5g = a.freq > 4_000;
    let b_5g = b.freq > 4_000;

    if a_5g && !b_5g {
        n_b += cfg.band_steering_threshold;
    } else if !a_5g && b_5g {
        n_a += cfg.band_steering_threshold;
    }
    n_b += cfg.load_balancing_threshold;

    n_b <= n_a
}

fn signal_improves(cfg: &Config, reference_signal: i32, candidate_signal: i32) -> bool {
    cfg.signal_diff_threshold > 0 && candidate_signal - reference_signal > cfg.signal_diff_threshold
}

/// Compare `candidate` against `reference` and report which of the three
/// independent reasons (§4.1) make it a better association target.
/// Returns the empty set immediately if either hard filter fails:
/// `candidate`'s node is full, or `candidate`'s signal is below a
/// configured SNR floor.
pub fn evaluate(
    cfg: &Config,
    reference: &Node,
    reference_info: &StationInfo,
    candidate: &Node,
    candidate_info: &StationInfo,
) -> ReasonSet {
    if !below_max_assoc(candidate) {
        return ReasonSet::NONE;
    }
    if cfg.min_snr > 0 && candidate_info.signal < snr_to_signal(candidate, cfg.min_snr) {
        return ReasonSet::NONE;
    }
    if cfg.roam_trigger_snr > 0 && candidate_info.signal < snr_to_signal(candidate, cfg.roam_trigger_snr) {
        return ReasonSet::NONE;
    }

    let mut reasons = ReasonSet::NONE;

    if assoc_favors(cfg, reference, candidate) && !assoc_favors(cfg, candidate, reference) {
        reasons = reasons | ReasonSet::NUM_ASSOC;
    }
    if signal_improves(cfg, reference_info.signal, candidate_info.signal) {
        reasons = reasons | ReasonSet::SIGNAL;
    }
    if has_better_load(cfg, reference, candidate) {
        reasons = reasons | ReasonSet::LOAD;
    }

    reasons
}

/// Search a station's other observations for the first one that beats
/// `ref_node`/`ref_info` on at least one of `required` (§4.2).
///
/// Iterates in the order observations were linked to the station
/// (`Station::iter`, backed by an `IndexMap`) so the result is
/// deterministic. Skips the reference node itself, observations staler
/// than `seen_policy_timeout` (a `seen_policy_timeout` of 0 is treated as
/// "no freshness limit", consistent with every other threshold in §3
/// defaulting to "disabled" at 0 — see DESIGN.md), observations with a
/// different SSID than the reference, and (when `max_age != 0`)
/// observations older than `max_age`.
#[allow(clippy::too_many_arguments)]
pub fn find_better(
    cfg: &Config,
    now: u64,
    nodes: &NodeRegistry,
    stations: &StationRegistry,
    station: &Station,
    ref_node_id: &NodeId,
    ref_node: &Node,
    ref_info: &StationInfo,
    required: ReasonSet,
    max_age: u64,
) -> Option<(NodeId, ReasonSet)> {
    for (node_id, handle) in station.iter() {
        if node_id == ref_node_id {
            continue;
        }

        let Some(cand_info) = stations.info(handle) else {
            continue;
        };
        if cfg.seen_policy_timeout != 0 && now.saturating_sub(cand_info.seen) > cfg.seen_policy_timeout {
            continue;
        }
        if max_age != 0 && now.saturating_sub(cand_info.seen) > max_age {
            continue;
        }

        let Some(cand_node) = nodes.get(node_id) else {
            continue;
        };
        if cand_node.ssid != ref_node.ssid {
            continue;
        }

        let reasons = evaluate(cfg, ref_node, ref_info, cand_node, cand_info);
        if reasons.is_empty() || !reasons.intersects(required) {
            continue;
        }

        return Some((node_id.clone(), reasons));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeId, NodeKind};
    use crate::station::{ConnectedState, StationId};

    fn node(n_assoc: u32, max_assoc: u32, load: u32, noise: i32, freq: u32) -> Node {
        let mut n = Node::new(NodeId::new("n"), NodeKind::Local);
        n.n_assoc = n_assoc;
        n.max_assoc = max_assoc;
        n.load = load;
        n.noise = noise;
        n.freq = freq;
        n
    }

    fn info(signal: i32) -> StationInfo {
        let mut i = StationInfo::new(StationId([0; 6]), NodeId::new("n"), 0);
        i.signal = signal;
        i.connected = ConnectedState::Connected;
        i
    }

    #[test]
    fn evaluate_empty_when_candidate_node_full() {
        let cfg = Config::default();
        let reference = node(2, 0, 0, -90, 2_437_000);
        let candidate = node(10, 10, 0, -90, 5_180_000);
        let reasons = evaluate(&cfg, &reference, &info(-50), &candidate, &info(-50));
        assert!(reasons.is_empty());
    }

    #[test]
    fn num_assoc_is_never_true_both_ways() {
        let mut cfg = Config::default();
        cfg.band_steering_threshold = 5;
        let a = node(2, 0, 0, -90, 2_437_000);
        let b = node(4, 0, 0, -90, 5_180_000);
        let a_over_b = evaluate(&cfg, &a, &info(-60), &b, &info(-65));
        let b_over_a = evaluate(&cfg, &b, &info(-65), &a, &info(-60));
        assert!(!(a_over_b.contains(ReasonSet::NUM_ASSOC) && b_over_a.contains(ReasonSet::NUM_ASSOC)));
    }

    #[test]
    fn s1_band_steering_matches_spec_example() {
        // N24 freq 2437000 n_assoc 2, N5 freq 5180000 n_assoc 4,
        // band_steering_threshold=5: adjusted cur 2+5=7 vs new 4 -> NUM_ASSOC.
        let mut cfg = Config::default();
        cfg.band_steering_threshold = 5;
        cfg.load_balancing_threshold = 0;
        let n24 = node(2, 0, 0, -90, 2_437_000);
        let n5 = node(4, 0, 0, -90, 5_180_000);
        let reasons = evaluate(&cfg, &n24, &info(-60), &n5, &info(-65));
        assert_eq!(reasons, ReasonSet::NUM_ASSOC);
    }

    #[test]
    fn has_better_load_requires_reference_overloaded_and_candidate_not() {
        let mut cfg = Config::default();
        cfg.load_kick_threshold = 70;
        cfg.load_kick_min_clients = 1;
        let overloaded = node(5, 0, 80, -90, 2_437_000);
        let idle = node(5, 0, 10, -90, 2_437_000);
        assert!(has_better_load(&cfg, &overloaded, &idle));
        assert!(!has_better_load(&cfg, &idle, &overloaded));
        assert!(!has_better_load(&cfg, &overloaded, &overloaded));
    }

    fn setup_two_node_station() -> (NodeRegistry, StationRegistry, crate::station::StationId, NodeId, NodeId) {
        use crate::station::StationId;

        let mut nodes = NodeRegistry::new();
        let sid = StationId([1; 6]);
        let n1 = NodeId::new("local/wlan0");
        let n2 = NodeId::new("local/wlan1");

        {
            let node1 = nodes.ensure(n1.clone());
            node1.n_assoc = 4;
            node1.freq = 2_437_000;
            node1.noise = -90;
        }
        {
            let node2 = nodes.ensure(n2.clone());
            node2.n_assoc = 0;
            node2.freq = 5_180_000;
            node2.noise = -90;
        }

        let mut stations = StationRegistry::new();
        let h1 = stations.get_or_create(sid, n1.clone(), 0);
        let h2 = stations.get_or_create(sid, n2.clone(), 0);
        stations.info_mut(h1).unwrap().signal = -60;
        stations.info_mut(h2).unwrap().signal = -55;

        (nodes, stations, sid, n1, n2)
    }

    #[test]
    fn find_better_returns_first_qualifying_candidate_in_insertion_order() {
        let (nodes, stations, sid, n1, _n2) = setup_two_node_station();
        let mut cfg = Config::default();
        cfg.band_steering_threshold = 5;

        let station = stations.station(sid).unwrap();
        let ref_node = nodes.get(&n1).unwrap();
        let ref_info = stations.info(station.handle_for(&n1).unwrap()).unwrap();

        let result = find_better(&cfg, 0, &nodes, &stations, station, &n1, ref_node, ref_info, ReasonSet::ALL, 0);
        assert!(result.is_some());
        let (target, reasons) = result.unwrap();
        assert_eq!(target, NodeId::new("local/wlan1"));
        assert!(reasons.contains(ReasonSet::NUM_ASSOC));
    }

    #[test]
    fn find_better_returns_none_when_required_is_empty() {
        let (nodes, stations, sid, n1, _n2) = setup_two_node_station();
        let cfg = Config::default();

        let station = stations.station(sid).unwrap();
        let ref_node = nodes.get(&n1).unwrap();
        let ref_info = stations.info(station.handle_for(&n1).unwrap()).unwrap();

        let result = find_better(&cfg, 0, &nodes, &stations, station, &n1, ref_node, ref_info, ReasonSet::NONE, 0);
        assert!(result.is_none());
    }
}
