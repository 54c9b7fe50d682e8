//! Per-station roam trigger state machine (§4.4): the escalation from
//! idle observation through a scan hint, a BTM notice, to a forced kick.

use crate::action::ActionSink;
use crate::candidate::snr_to_signal;
use crate::config::Config;
use crate::event::{DecisionEvent, DecisionKind, EventSink, ReasonSet};
use crate::node::{Node, NodeId};
use crate::station::{RoamState, StationInfo};

/// Decide (and, if the current state stays `IDLE`, possibly) the target
/// of a `scan_start` call (§4.4): restart scanning once the scan-timeout
/// cooldown has elapsed, otherwise fall back to `IDLE` unless already
/// there. Returns `None` when the machine should simply stay put.
fn scan_start_target(cfg: &Config, now: u64, info: &StationInfo) -> Option<RoamState> {
    if cfg.roam_scan_timeout == 0 || now > info.roam_scan_timeout_start + cfg.roam_scan_timeout {
        Some(RoamState::Scan)
    } else if info.roam_state == RoamState::Idle {
        None
    } else {
        Some(RoamState::Idle)
    }
}

/// Apply a state transition: stamp `roam_event`, roll `roam_tries` per
/// §4.4 ("resets if state changes, increments if re-entered, except
/// IDLE which always resets"), and emit the `ROAM_TRIGGER` event — except
/// when `target` is `IDLE` and the station is already `IDLE`, which is a
/// no-op re-affirmation rather than a transition and emits nothing
/// (matches `usteer_roam_set_state`'s early return for that case). Also
/// used by the kick controller's phase-1 sweep (`kick.rs`) to force a
/// station back to `IDLE` outside of `step`, matching the original's
/// `usteer_roam_set_state(si, IDLE, ev)` call at the same site.
pub(crate) fn enter_state(
    info: &mut StationInfo,
    node: &Node,
    now: u64,
    target: RoamState,
    events: &mut dyn EventSink,
) {
    info.roam_event = now;

    if target == info.roam_state {
        if target == RoamState::Idle {
            info.roam_tries = 0;
            return;
        }
        info.roam_tries += 1;
    } else {
        info.roam_tries = 0;
    }
    info.roam_state = target;

    let mut event = DecisionEvent::new(now, DecisionKind::RoamTrigger);
    event.station = Some(info.station);
    event.node_cur = Some(node.id.clone());
    event.signal = Some(info.signal);
    events.emit(event);
}

fn scan_max_age(cfg: &Config, now: u64, info: &StationInfo) -> u64 {
    let since_start = now.saturating_sub(info.roam_scan_start);
    std::cmp::min(2 * cfg.roam_scan_interval, since_start)
}

/// Drive the state machine for one (station, node) observation by one
/// invocation. `find_better` must behave like `find_better(info, ReasonSet::SIGNAL, max_age)`
/// against the rest of that station's observations, returning the target
/// node and the reasons it qualified. Returns `true` iff a kick was
/// issued this call — the caller (the node kick controller, §4.5) must
/// then stop its sweep for this tick.
pub fn step(
    cfg: &Config,
    now: u64,
    node: &Node,
    info: &mut StationInfo,
    mut find_better: impl FnMut(&StationInfo, ReasonSet, u64) -> Option<(NodeId, ReasonSet)>,
    actions: &mut dyn ActionSink,
    events: &mut dyn EventSink,
) -> bool {
    match info.roam_state {
        RoamState::Idle => {
            if let Some(target) = scan_start_target(cfg, now, info) {
                enter_state(info, node, now, target, events);
            }
            false
        }

        RoamState::Scan => {
            if info.roam_tries == 0 {
                info.roam_scan_start = now;
            }
            let max_age = scan_max_age(cfg, now, info);
            if find_better(info, ReasonSet::SIGNAL, max_age).is_some() {
                enter_state(info, node, now, RoamState::ScanDone, events);
                return false;
            }
            if now.saturating_sub(info.roam_event) < cfg.roam_scan_interval {
                return false;
            }
            if cfg.roam_scan_tries > 0 && info.roam_tries >= cfg.roam_scan_tries {
                if cfg.roam_scan_timeout == 0 {
                    enter_state(info, node, now, RoamState::WaitKick, events);
                } else {
                    info.roam_scan_timeout_start = now;
                    enter_state(info, node, now, RoamState::Idle, events);
                }
                return false;
            }
            actions.trigger_client_scan(info.station);
            if let Some(target) = scan_start_target(cfg, now, info) {
                enter_state(info, node, now, target, events);
            }
            false
        }

        RoamState::ScanDone => {
            let max_age = scan_max_age(cfg, now, info);
            if find_better(info, ReasonSet::SIGNAL, max_age).is_some() {
                enter_state(info, node, now, RoamState::WaitKick, events);
            } else if let Some(target) = scan_start_target(cfg, now, info) {
                enter_state(info, node, now, target, events);
            }
            false
        }

        RoamState::WaitKick => {
            let min_signal = snr_to_signal(node, cfg.roam_trigger_snr);
            if info.signal > min_signal {
                return false;
            }
            enter_state(info, node, now, RoamState::NotifyKick, events);
            actions.notify_client_disassoc(info.station);
            false
        }

        RoamState::NotifyKick => {
            if now.saturating_sub(info.roam_event) < cfg.roam_kick_delay * 10 {
                return false;
            }
            enter_state(info, node, now, RoamState::Kick, events);
            false
        }

        RoamState::Kick => {
            actions.kick_client(info.station, cfg.load_kick_reason_code);
            info.roam_kick = now;
            info.kick_count += 1;
            enter_state(info, node, now, RoamState::Idle, events);
            true
        }
    }
}
