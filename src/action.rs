//! Outbound, fire-and-forget actions the core asks the RPC adapter to
//! perform (§6). None of these wait for a reply: §7 treats adapter-side
//! failure as something the *next* tick naturally re-evaluates, so the
//! trait methods return nothing.

use crate::station::StationId;

/// Capability the core uses to ask the surrounding RPC adapter to act on a
/// station. The core holds no reference to a transport, a socket, or a
/// ubus object — an embedder wires this to whatever sends the real 802.11
/// frames.
pub trait ActionSink {
    /// Ask the client to perform an 802.11k beacon request / scan report.
    fn trigger_client_scan(&mut self, station: StationId);

    /// Send an 802.11v BSS-transition-management "please roam" notice.
    fn notify_client_disassoc(&mut self, station: StationId);

    /// Force a deauth with the given 802.11 reason code.
    fn kick_client(&mut self, station: StationId, reason_code: u16);
}

/// An [`ActionSink`] that records calls in order, for assertions in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedAction {
    Scan(StationId),
    NotifyDisassoc(StationId),
    Kick(StationId, u16),
}

#[derive(Debug, Default)]
pub struct RecordingActions(pub Vec<RecordedAction>);

impl ActionSink for RecordingActions {
    fn trigger_client_scan(&mut self, station: StationId) {
        self.0.push(RecordedAction::Scan(station));
    }

    fn notify_client_disassoc(&mut self, station: StationId) {
        self.0.push(RecordedAction::NotifyDisassoc(station));
    }

    fn kick_client(&mut self, station: StationId, reason_code: u16) {
        self.0.push(RecordedAction::Kick(station, reason_code));
    }
}
