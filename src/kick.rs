//! Per-node kick controller (§4.5): the three-phase tick run once per
//! `local_sta_update` interval for every local node — roam sweep, SNR
//! floor kick, then load shedding.

use crate::action::ActionSink;
use crate::candidate::{find_better, snr_to_signal};
use crate::config::Config;
use crate::event::{DecisionEvent, DecisionKind, EventSink};
use crate::node::{NodeId, NodeRegistry};
use crate::station::{ConnectedState, RoamState, StationInfoHandle, StationRegistry};
use crate::roam;

/// Run all three phases for one local node (§4.5). `node_id` must name a
/// node already present in `nodes`; unknown nodes are a caller error and
/// this is a no-op (the facade in `core.rs` logs the `UnknownNode`
/// warning before ever reaching here).
pub fn tick(
    cfg: &Config,
    now: u64,
    nodes: &mut NodeRegistry,
    stations: &mut StationRegistry,
    node_id: &NodeId,
    actions: &mut dyn ActionSink,
    events: &mut dyn EventSink,
) {
    roam_sweep(cfg, now, nodes, stations, node_id, actions, events);
    snr_floor_kick(cfg, now, nodes, stations, node_id, actions, events);
    load_shed(cfg, now, nodes, stations, node_id, actions, events);
}

/// Phase 1 (§4.5): sweep every connected station on the node through the
/// roam trigger state machine, stopping as soon as one is kicked.
///
/// `roam::step` needs a mutable borrow of the station being driven *and*
/// a read-only view of the rest of the registries (for `find_better`).
/// Those can't coexist as live borrows of the same `StationRegistry`
/// arena, so each station's `StationInfo` is snapshotted out, driven as
/// a detached value, and written back — the arena handle stays stable
/// throughout.
fn roam_sweep(
    cfg: &Config,
    now: u64,
    nodes: &NodeRegistry,
    stations: &mut StationRegistry,
    node_id: &NodeId,
    actions: &mut dyn ActionSink,
    events: &mut dyn EventSink,
) {
    if cfg.roam_scan_snr == 0 && cfg.roam_trigger_snr == 0 {
        return;
    }
    let Some(node) = nodes.get(node_id) else {
        return;
    };
    let snr = if cfg.roam_scan_snr != 0 { cfg.roam_scan_snr } else { cfg.roam_trigger_snr };
    let threshold = snr_to_signal(node, snr);
    let node_snapshot = node.clone();
    let handles: Vec<StationInfoHandle> = node.stations().collect();

    for handle in handles {
        let Some(info) = stations.info(handle) else {
            continue;
        };
        if info.connected != ConnectedState::Connected
            || info.signal >= threshold
            || now.saturating_sub(info.roam_kick) < cfg.roam_trigger_interval
        {
            if let Some(info) = stations.info_mut(handle) {
                roam::enter_state(info, &node_snapshot, now, RoamState::Idle, events);
            }
            continue;
        }

        let mut snapshot = info.clone();
        let station_id = snapshot.station;
        let kicked = roam::step(
            cfg,
            now,
            &node_snapshot,
            &mut snapshot,
            |ref_info, required, max_age| {
                let station = stations.station(station_id)?;
                find_better(cfg, now, nodes, stations, station, node_id, &node_snapshot, ref_info, required, max_age)
            },
            actions,
            events,
        );
        if let Some(slot) = stations.info_mut(handle) {
            *slot = snapshot;
        }

        if kicked {
            return;
        }
    }
}

/// Phase 2 (§4.5): SNR-floor kick with a `min_snr_kick_delay` hysteresis
/// window, expressed in ticks via `min_count = ceil(min_snr_kick_delay /
/// local_sta_update)`.
fn snr_floor_kick(
    cfg: &Config,
    now: u64,
    nodes: &NodeRegistry,
    stations: &mut StationRegistry,
    node_id: &NodeId,
    actions: &mut dyn ActionSink,
    events: &mut dyn EventSink,
) {
    if cfg.min_snr == 0 {
        return;
    }
    let Some(node) = nodes.get(node_id) else {
        return;
    };
    let threshold = snr_to_signal(node, cfg.min_snr);
    let min_count = div_round_up(cfg.min_snr_kick_delay, cfg.local_sta_update.max(1));
    let handles: Vec<StationInfoHandle> = node.stations().collect();

    for handle in handles {
        let Some(info) = stations.info_mut(handle) else {
            continue;
        };
        if info.connected != ConnectedState::Connected {
            continue;
        }

        if info.signal >= threshold {
            info.below_min_snr = 0;
            continue;
        }

        info.below_min_snr += 1;
        if info.below_min_snr <= min_count {
            continue;
        }

        info.kick_count += 1;
        let station = info.station;
        let signal = info.signal;

        let mut event = DecisionEvent::new(now, DecisionKind::SignalKick);
        event.station = Some(station);
        event.node_cur = Some(node_id.clone());
        event.signal = Some(signal);
        event.threshold_ref = Some(threshold as i64);
        events.emit(event);

        actions.kick_client(station, cfg.load_kick_reason_code);
        return;
    }
}

/// Phase 3 (§4.5): load shedding. `load_thr_count` hysteresis mirrors
/// phase 2's shape but lives on the node, not the station, since it
/// tracks *this node's* sustained overload rather than any one client.
fn load_shed(
    cfg: &Config,
    now: u64,
    nodes: &mut NodeRegistry,
    stations: &mut StationRegistry,
    node_id: &NodeId,
    actions: &mut dyn ActionSink,
    events: &mut dyn EventSink,
) {
    if !cfg.load_kick_enabled || cfg.load_kick_threshold == 0 || cfg.load_kick_delay == 0 {
        return;
    }

    let min_count = div_round_up(cfg.load_kick_delay, cfg.local_sta_update.max(1));

    let (load, n_assoc, load_thr_count) = {
        let Some(node) = nodes.get(node_id) else {
            return;
        };
        (node.load, node.n_assoc, node.local.load_thr_count)
    };

    if load < cfg.load_kick_threshold {
        if load_thr_count > 0 {
            nodes.get_mut(node_id).unwrap().local.load_thr_count = 0;
            let mut event = DecisionEvent::new(now, DecisionKind::LoadKickReset);
            event.node_cur = Some(node_id.clone());
            event.threshold_cur = Some(load as i64);
            event.threshold_ref = Some(cfg.load_kick_threshold as i64);
            events.emit(event);
        }
        return;
    }

    let new_count = load_thr_count + 1;
    nodes.get_mut(node_id).unwrap().local.load_thr_count = new_count;

    if new_count <= min_count {
        if new_count == 1 {
            let mut event = DecisionEvent::new(now, DecisionKind::LoadKickTrigger);
            event.node_cur = Some(node_id.clone());
            event.threshold_cur = Some(load as i64);
            event.threshold_ref = Some(cfg.load_kick_threshold as i64);
            events.emit(event);
        }
        return;
    }

    nodes.get_mut(node_id).unwrap().local.load_thr_count = 0;

    if n_assoc < cfg.load_kick_min_clients {
        let mut event = DecisionEvent::new(now, DecisionKind::LoadKickMinClients);
        event.node_cur = Some(node_id.clone());
        event.threshold_cur = Some(n_assoc as i64);
        event.threshold_ref = Some(cfg.load_kick_min_clients as i64);
        events.emit(event);
        return;
    }

    let Some(victim) = select_load_victim(cfg, now, nodes, stations, node_id) else {
        let mut event = DecisionEvent::new(now, DecisionKind::LoadKickNoClient);
        event.node_cur = Some(node_id.clone());
        events.emit(event);
        return;
    };

    let info = stations.info_mut(victim.handle).unwrap();
    info.kick_count += 1;
    let station = info.station;

    let mut event = DecisionEvent::new(now, DecisionKind::LoadKickClient);
    event.station = Some(station);
    event.node_cur = Some(node_id.clone());
    event.node_target = victim.alternative;
    events.emit(event);

    actions.kick_client(station, cfg.load_kick_reason_code);
}

struct Victim {
    handle: StationInfoHandle,
    alternative: Option<NodeId>,
}

/// `more_kickable` plus the `kick1`/`kick2` selection of §4.5 phase 3:
/// `kick1` is the single most-kickable connected station on the node;
/// `kick2` is the most-kickable station that also has a strictly better
/// `LOAD` alternative, preferred over `kick1` whenever one exists.
fn select_load_victim(
    cfg: &Config,
    now: u64,
    nodes: &NodeRegistry,
    stations: &StationRegistry,
    node_id: &NodeId,
) -> Option<Victim> {
    let node = nodes.get(node_id)?;

    let mut kick1: Option<StationInfoHandle> = None;
    let mut kick2: Option<StationInfoHandle> = None;
    let mut candidate: Option<NodeId> = None;

    for handle in node.stations() {
        let Some(info) = stations.info(handle) else {
            continue;
        };
        if info.connected != ConnectedState::Connected {
            continue;
        }

        if more_kickable(stations, kick1, handle) {
            kick1 = Some(handle);
        }

        let Some(station) = stations.station(info.station) else {
            continue;
        };
        let better = find_better(cfg, now, nodes, stations, station, node_id, node, info, crate::event::ReasonSet::LOAD, 0);
        if let Some((target, _)) = better {
            if more_kickable(stations, kick2, handle) {
                kick2 = Some(handle);
                candidate = Some(target);
            }
        }
    }

    let victim = kick2.or(kick1)?;
    let alternative = if kick2 == Some(victim) { candidate } else { None };
    Some(Victim { handle: victim, alternative })
}

/// `more_kickable(cur, new)` (§4.5): `cur` missing, or `new` has been
/// kicked no more than `cur` while having a stronger signal (i.e. `cur`
/// needs the kick less than `new` would relieve it).
fn more_kickable(stations: &StationRegistry, cur: Option<StationInfoHandle>, new: StationInfoHandle) -> bool {
    let Some(cur) = cur else {
        return true;
    };
    let (Some(cur_info), Some(new_info)) = (stations.info(cur), stations.info(new)) else {
        return true;
    };
    if new_info.kick_count > cur_info.kick_count {
        return false;
    }
    cur_info.signal > new_info.signal
}

fn div_round_up(n: u64, d: u64) -> u64 {
    (n + d - 1) / d
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::RecordingActions;
    use crate::event::RecordingSink;
    use crate::node::NodeKind;
    use crate::station::StationId;

    fn setup_node(nodes: &mut NodeRegistry, id: &str) -> NodeId {
        let node_id = NodeId::new(id);
        let node = nodes.mark_local(node_id.clone());
        node.noise = -90;
        node_id
    }

    #[test]
    fn s6_snr_hysteresis_kicks_once_after_min_count_ticks() {
        let mut cfg = Config::default();
        cfg.min_snr = 20; // threshold = -90 + 20 = -70
        cfg.min_snr_kick_delay = 3_000;
        cfg.local_sta_update = 1_000; // min_count = 3

        let mut nodes = NodeRegistry::new();
        let node_id = setup_node(&mut nodes, "local/wlan0");
        let mut stations = StationRegistry::new();
        let sid = StationId([1; 6]);
        let handle = stations.get_or_create(sid, node_id.clone(), 0);
        nodes.get_mut(&node_id).unwrap().link_station(handle);
        stations.info_mut(handle).unwrap().connected = ConnectedState::Connected;
        stations.info_mut(handle).unwrap().signal = -75; // below -70

        let mut actions = RecordingActions::default();
        let mut events = RecordingSink::default();

        for tick_n in 0..3 {
            snr_floor_kick(&cfg, tick_n * 1000, &nodes, &mut stations, &node_id, &mut actions, &mut events);
            assert!(actions.0.is_empty(), "should not kick before tick 4");
        }
        snr_floor_kick(&cfg, 3_000, &nodes, &mut stations, &node_id, &mut actions, &mut events);
        assert_eq!(actions.0.len(), 1);
    }

    #[test]
    fn s6_recovered_signal_resets_counter() {
        let mut cfg = Config::default();
        cfg.min_snr = 20;
        cfg.min_snr_kick_delay = 3_000;
        cfg.local_sta_update = 1_000;

        let mut nodes = NodeRegistry::new();
        let node_id = setup_node(&mut nodes, "local/wlan0");
        let mut stations = StationRegistry::new();
        let sid = StationId([1; 6]);
        let handle = stations.get_or_create(sid, node_id.clone(), 0);
        nodes.get_mut(&node_id).unwrap().link_station(handle);
        stations.info_mut(handle).unwrap().connected = ConnectedState::Connected;

        let mut actions = RecordingActions::default();
        let mut events = RecordingSink::default();

        stations.info_mut(handle).unwrap().signal = -75;
        snr_floor_kick(&cfg, 0, &nodes, &mut stations, &node_id, &mut actions, &mut events);
        snr_floor_kick(&cfg, 1_000, &nodes, &mut stations, &node_id, &mut actions, &mut events);

        stations.info_mut(handle).unwrap().signal = -60; // recovers
        snr_floor_kick(&cfg, 2_000, &nodes, &mut stations, &node_id, &mut actions, &mut events);
        assert_eq!(stations.info(handle).unwrap().below_min_snr, 0);

        stations.info_mut(handle).unwrap().signal = -75;
        snr_floor_kick(&cfg, 3_000, &nodes, &mut stations, &node_id, &mut actions, &mut events);
        snr_floor_kick(&cfg, 4_000, &nodes, &mut stations, &node_id, &mut actions, &mut events);
        snr_floor_kick(&cfg, 5_000, &nodes, &mut stations, &node_id, &mut actions, &mut events);
        assert!(actions.0.is_empty());
    }

    #[test]
    fn p6_at_most_one_kick_per_tick() {
        let mut cfg = Config::default();
        cfg.min_snr = 20;
        cfg.min_snr_kick_delay = 0; // min_count = 0, kicks immediately

        let mut nodes = NodeRegistry::new();
        let node_id = setup_node(&mut nodes, "local/wlan0");
        let mut stations = StationRegistry::new();

        for b in 1..=3u8 {
            let sid = StationId([b; 6]);
            let handle = stations.get_or_create(sid, node_id.clone(), 0);
            nodes.get_mut(&node_id).unwrap().link_station(handle);
            stations.info_mut(handle).unwrap().connected = ConnectedState::Connected;
            stations.info_mut(handle).unwrap().signal = -80;
        }

        let mut actions = RecordingActions::default();
        let mut events = RecordingSink::default();
        snr_floor_kick(&cfg, 0, &nodes, &mut stations, &node_id, &mut actions, &mut events);
        assert_eq!(actions.0.len(), 1);
    }

    #[test]
    fn s4_load_shed_picks_station_with_better_load_alternative() {
        let mut cfg = Config::default();
        cfg.load_kick_enabled = true;
        cfg.load_kick_threshold = 70;
        cfg.load_kick_delay = 5_000;
        cfg.local_sta_update = 1_000; // min_count = 5
        cfg.load_kick_min_clients = 1;

        let mut nodes = NodeRegistry::new();
        let node_id = setup_node(&mut nodes, "local/wlan0");
        {
            let node = nodes.get_mut(&node_id).unwrap();
            node.load = 80;
            node.n_assoc = 3;
        }
        let alt_id = NodeId::new("local/wlan1");
        {
            let alt = nodes.ensure(alt_id.clone());
            alt.load = 10;
            alt.n_assoc = 0;
            alt.noise = -90;
        }

        let mut stations = StationRegistry::new();
        let a = StationId([0xA; 6]);
        let b = StationId([0xB; 6]);
        let c = StationId([0xC; 6]);

        let ha = stations.get_or_create(a, node_id.clone(), 0);
        nodes.get_mut(&node_id).unwrap().link_station(ha);
        stations.info_mut(ha).unwrap().connected = ConnectedState::Connected;
        stations.info_mut(ha).unwrap().signal = -55;

        let hb = stations.get_or_create(b, node_id.clone(), 0);
        nodes.get_mut(&node_id).unwrap().link_station(hb);
        stations.info_mut(hb).unwrap().connected = ConnectedState::Connected;
        stations.info_mut(hb).unwrap().signal = -60;
        let hb_alt = stations.get_or_create(b, alt_id.clone(), 0);
        nodes.get_mut(&alt_id).unwrap().link_station(hb_alt);
        stations.info_mut(hb_alt).unwrap().signal = -60;

        let hc = stations.get_or_create(c, node_id.clone(), 0);
        nodes.get_mut(&node_id).unwrap().link_station(hc);
        stations.info_mut(hc).unwrap().connected = ConnectedState::Connected;
        stations.info_mut(hc).unwrap().signal = -50;
        stations.info_mut(hc).unwrap().kick_count = 1;

        let mut actions = RecordingActions::default();
        let mut events = RecordingSink::default();

        for tick_n in 0..5 {
            load_shed(&cfg, tick_n * 1_000, &mut nodes, &mut stations, &node_id, &mut actions, &mut events);
        }
        load_shed(&cfg, 5_000, &mut nodes, &mut stations, &node_id, &mut actions, &mut events);

        assert_eq!(actions.0.len(), 1);
        match &actions.0[0] {
            crate::action::RecordedAction::Kick(station, _) => assert_eq!(*station, b),
            other => panic!("expected a kick, got {other:?}"),
        }
    }
}
