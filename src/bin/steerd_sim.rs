//! `steerd-sim` — drives [`steerd_core::SteeringCore`] from a small,
//! fixed synthetic event script so the external-interface contract (§6)
//! can be exercised end to end without a real RPC bus or radio driver.
//!
//! Wires a stdout [`EventSink`] (one JSON object per line) and an
//! [`ActionSink`] that logs every `trigger_client_scan` / `kick_client` /
//! `notify_client_disassoc` call through `tracing`, forwarding them onto
//! an unbounded channel the way a real adapter would hand them off to its
//! ubus/netlink dispatch task.

use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;

use steerd_core::{
    ActionSink, Config, ConnectedState, DecisionEvent, EventSink, NodeSnapshot, RequestKind,
    SteeringCore, StationId,
};

#[derive(Parser)]
#[command(name = "steerd-sim", version, about = "Synthetic driver for the steerd policy core")]
struct Args {
    /// Number of `tick_local_node` rounds to simulate.
    #[arg(short, long, default_value_t = 8)]
    ticks: u64,

    /// Tick period in milliseconds (mirrors `local_sta_update`).
    #[arg(short = 'u', long, default_value_t = 1_000)]
    tick_ms: u64,

    /// SNR floor (dB) for the roam trigger state machine; 0 disables it.
    #[arg(long, default_value_t = 20)]
    roam_trigger_snr: i32,

    /// Minimum SNR (dB) required to stay connected; 0 disables the check.
    #[arg(long, default_value_t = 0)]
    min_snr: i32,
}

/// Every outbound action the core asks for, forwarded to a channel and
/// logged — the shape a real adapter's ubus dispatch task would consume.
#[derive(Debug)]
enum RadioAction {
    Scan(StationId),
    NotifyDisassoc(StationId),
    Kick(StationId, u16),
}

struct UbusActionSink {
    tx: mpsc::UnboundedSender<RadioAction>,
}

impl ActionSink for UbusActionSink {
    fn trigger_client_scan(&mut self, station: StationId) {
        let _ = self.tx.send(RadioAction::Scan(station));
    }

    fn notify_client_disassoc(&mut self, station: StationId) {
        let _ = self.tx.send(RadioAction::NotifyDisassoc(station));
    }

    fn kick_client(&mut self, station: StationId, reason_code: u16) {
        let _ = self.tx.send(RadioAction::Kick(station, reason_code));
    }
}

struct StdoutSink;

impl EventSink for StdoutSink {
    fn emit(&mut self, event: DecisionEvent) {
        match serde_json::to_string(&event) {
            Ok(line) => println!("{line}"),
            Err(e) => eprintln!("failed to serialize decision event: {e}"),
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("steerd_sim=info".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    let config = Config {
        roam_trigger_snr: args.roam_trigger_snr,
        roam_scan_tries: 3,
        roam_scan_interval: args.tick_ms,
        roam_kick_delay: 50, // 500 ms dwell in NOTIFY_KICK
        min_snr: args.min_snr,
        local_sta_update: args.tick_ms,
        ..Config::default()
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut core = SteeringCore::new(config, UbusActionSink { tx });
    let mut sink = StdoutSink;

    core.on_node_update(
        "local/wlan0",
        NodeSnapshot {
            ssid: "corp".into(),
            bssid: [0xaa, 0xbb, 0xcc, 0x00, 0x00, 0x01],
            freq: 2_437_000,
            noise: -90,
            n_assoc: 1,
            max_assoc: 0,
            load: 10,
            disabled: false,
        },
    );
    core.on_remote_node_update(
        "ap-2",
        "wlan0",
        NodeSnapshot {
            ssid: "corp".into(),
            bssid: [0xaa, 0xbb, 0xcc, 0x00, 0x00, 0x02],
            freq: 5_180_000,
            noise: -92,
            n_assoc: 0,
            max_assoc: 0,
            load: 5,
            disabled: false,
        },
    );
    info!(
        local_bssid = %hex::encode([0xaa, 0xbb, 0xcc, 0x00, 0x00, 0x01]),
        "local/wlan0 ready, corp SSID, 2.4 GHz"
    );

    let station = StationId([0x02, 0x11, 0x22, 0x33, 0x44, 0x55]);
    core.on_station_event(&mut sink, 0, "local/wlan0", station, RequestKind::Probe, 2_437_000, -65);
    core.on_station_event(&mut sink, 50, "local/wlan0", station, RequestKind::Auth, 2_437_000, -65);
    let accepted = core.on_station_event(&mut sink, 100, "local/wlan0", station, RequestKind::Assoc, 2_437_000, -65);
    info!(accepted, "initial association on local/wlan0");
    core.on_station_update(
        "local/wlan0",
        station,
        -65,
        ConnectedState::Connected,
        100,
    );
    // A second AP also hears this client, weaker but with headroom — the
    // candidate evaluator and roam SM (driven below) may eventually prefer
    // it once the local signal degrades.
    core.on_station_update("ap-2/wlan0", station, -70, ConnectedState::NotConnected, 100);

    let mut now_ms = 0u64;
    for tick in 0..args.ticks {
        now_ms += args.tick_ms;
        // Simulate signal decay on the local AP so the roam SM eventually
        // engages (S3): drop 3 dB per tick from the initial -65 dBm.
        let decayed_signal = -65 - 3 * tick as i32;
        core.on_station_update("local/wlan0", station, decayed_signal, ConnectedState::Connected, now_ms);

        core.tick_local_node(&mut sink, now_ms, "local/wlan0");

        while let Ok(action) = rx.try_recv() {
            match action {
                RadioAction::Scan(sta) => info!(%sta, tick, "trigger_client_scan"),
                RadioAction::NotifyDisassoc(sta) => info!(%sta, tick, "notify_client_disassoc"),
                RadioAction::Kick(sta, reason) => info!(%sta, tick, reason, "kick_client"),
            }
        }

        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}
