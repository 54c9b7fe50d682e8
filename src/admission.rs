//! Request admission filter (§4.3): accept or reject a probe, auth, or
//! assoc event, tagging the reason and building the decision event the
//! caller emits.

use crate::candidate::{find_better, snr_to_signal};
use crate::config::Config;
use crate::event::{DecisionEvent, DecisionKind, Reason, ReasonSet};
use crate::node::{Node, NodeId, NodeRegistry};
use crate::station::{Station, StationInfo, StationRegistry};

/// Outcome of the admission decision table, before the decision event is
/// assembled (§4.3). `accept` mirrors the bool `check_request` returns to
/// its caller.
struct Verdict {
    accept: bool,
    reason: Option<Reason>,
    threshold_cur: Option<i64>,
    threshold_ref: Option<i64>,
    node_target: Option<NodeId>,
    select_reasons: Option<ReasonSet>,
}

impl Verdict {
    fn accept() -> Self {
        Verdict {
            accept: true,
            reason: None,
            threshold_cur: None,
            threshold_ref: None,
            node_target: None,
            select_reasons: None,
        }
    }

    fn reject(reason: Reason, threshold_cur: i64, threshold_ref: i64) -> Self {
        Verdict {
            accept: false,
            reason: Some(reason),
            threshold_cur: Some(threshold_cur),
            threshold_ref: Some(threshold_ref),
            node_target: None,
            select_reasons: None,
        }
    }

    fn reject_plain(reason: Reason) -> Self {
        Verdict {
            accept: false,
            reason: Some(reason),
            threshold_cur: None,
            threshold_ref: None,
            node_target: None,
            select_reasons: None,
        }
    }

    fn reject_better_candidate(node_target: NodeId, select_reasons: ReasonSet) -> Self {
        Verdict {
            accept: false,
            reason: Some(Reason::BetterCandidate),
            threshold_cur: None,
            threshold_ref: None,
            node_target: Some(node_target),
            select_reasons: Some(select_reasons),
        }
    }
}

/// The decision table of §4.3, first matching rule wins.
#[allow(clippy::too_many_arguments)]
fn decide(
    cfg: &Config,
    now: u64,
    nodes: &NodeRegistry,
    stations: &StationRegistry,
    station: &Station,
    ref_node_id: &NodeId,
    ref_node: &Node,
    ref_info: &StationInfo,
    kind: RequestKind,
) -> Verdict {
    if kind == RequestKind::Auth {
        return Verdict::accept();
    }

    if kind == RequestKind::Assoc && cfg.min_snr > 0 {
        let threshold = snr_to_signal(ref_node, cfg.min_snr);
        if ref_info.signal < threshold {
            return Verdict::reject(Reason::LowSignal, ref_info.signal as i64, threshold as i64);
        }
    }

    if kind == RequestKind::Assoc && !cfg.assoc_steering {
        return Verdict::accept();
    }

    let connect_threshold = snr_to_signal(ref_node, cfg.min_connect_snr);
    if ref_info.signal < connect_threshold {
        return Verdict::reject(Reason::LowSignal, ref_info.signal as i64, connect_threshold as i64);
    }

    if kind == RequestKind::Probe && now.saturating_sub(ref_info.created) < cfg.initial_connect_delay {
        return Verdict::reject_plain(Reason::ConnectDelay);
    }

    if let Some((target, reasons)) = find_better(
        cfg,
        now,
        nodes,
        stations,
        station,
        ref_node_id,
        ref_node,
        ref_info,
        ReasonSet::ALL,
        0,
    ) {
        return Verdict::reject_better_candidate(target, reasons);
    }

    Verdict::accept()
}

fn decision_kind(kind: RequestKind, accept: bool) -> DecisionKind {
    match (kind, accept) {
        (RequestKind::Probe, true) => DecisionKind::ProbeAccept,
        (RequestKind::Probe, false) => DecisionKind::ProbeReject,
        (RequestKind::Assoc, true) => DecisionKind::AssocAccept,
        (RequestKind::Assoc, false) => DecisionKind::AssocReject,
        (RequestKind::Auth, true) => DecisionKind::AuthAccept,
        (RequestKind::Auth, false) => DecisionKind::AuthReject,
    }
}

pub use crate::event::RequestKind;

/// `check_request` (§4.3): decide whether to admit `kind` for the
/// station/node pair described by `ref_info`, with the retry-exceeded
/// override applied from `ref_info`'s *current* counters (the caller
/// bumps them only after this call returns, per §4.3 "Side effects on
/// caller"). Returns the accept/reject bool and the event to emit —
/// the caller is responsible for handing the event to an `EventSink`.
#[allow(clippy::too_many_arguments)]
pub fn check_request(
    cfg: &Config,
    now: u64,
    nodes: &NodeRegistry,
    stations: &StationRegistry,
    station: &Station,
    ref_node_id: &NodeId,
    ref_node: &Node,
    ref_info: &StationInfo,
    kind: RequestKind,
) -> (bool, DecisionEvent) {
    let mut verdict = decide(cfg, now, nodes, stations, station, ref_node_id, ref_node, ref_info, kind);

    if !verdict.accept && cfg.max_retry_band > 0 {
        let blocked_cur = ref_info.stats[kind.index()].blocked_cur;
        if blocked_cur >= cfg.max_retry_band {
            verdict.reason = Some(Reason::RetryExceeded);
            verdict.threshold_cur = Some(blocked_cur as i64);
            verdict.threshold_ref = Some(cfg.max_retry_band as i64);
        }
    }

    let mut event = DecisionEvent::new(now, decision_kind(kind, verdict.accept));
    event.station = Some(ref_info.station);
    event.node_cur = Some(ref_node_id.clone());
    event.node_target = verdict.node_target;
    event.signal = Some(ref_info.signal);
    event.threshold_cur = verdict.threshold_cur;
    event.threshold_ref = verdict.threshold_ref;
    event.reason = verdict.reason;
    event.select_reasons = verdict.select_reasons;

    (verdict.accept, event)
}
