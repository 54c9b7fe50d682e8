//! Process-wide config snapshot (§3) and the flat key→value map it loads
//! from.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// One value in the flat config map named in §6 ("a flat key→typed-value
/// map matching §3; no file format is part of the core").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(b) => write!(f, "{b}"),
            ConfigValue::Int(i) => write!(f, "{i}"),
            ConfigValue::UInt(u) => write!(f, "{u}"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required config key {0:?}")]
    MissingKey(&'static str),
    #[error("config key {key:?} expected a {expected} value, found {found}")]
    WrongType {
        key: &'static str,
        expected: &'static str,
        found: String,
    },
    #[error("config key {key:?} = {value} is out of range")]
    OutOfRange { key: &'static str, value: i64 },
}

/// The options recognized by the core, per §3. Unknown keys in the input
/// map are ignored: the embedder may be carrying options for other parts
/// of the daemon (Lua hooks, CLI, logging) in the same map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub sta_block_timeout: u64,
    pub local_sta_timeout: u64,
    pub local_sta_update: u64,

    pub max_retry_band: u32,
    pub seen_policy_timeout: u64,

    pub assoc_steering: bool,

    pub band_steering_threshold: i64,
    pub load_balancing_threshold: i64,

    pub min_snr: i32,
    pub min_connect_snr: i32,
    pub min_snr_kick_delay: u64,
    pub signal_diff_threshold: i32,

    pub roam_scan_snr: i32,
    pub roam_trigger_snr: i32,
    pub roam_scan_tries: u32,
    pub roam_scan_interval: u64,
    pub roam_scan_timeout: u64,
    pub roam_trigger_interval: u64,
    pub roam_kick_delay: u64,

    pub initial_connect_delay: u64,

    pub load_kick_enabled: bool,
    pub load_kick_threshold: u32,
    pub load_kick_delay: u64,
    pub load_kick_min_clients: u32,
    /// 802.11 deauth reason code sent with a load-shed kick.
    pub load_kick_reason_code: u16,
}

impl Default for Config {
    /// Every threshold defaults to "feature disabled" (0, or `false` for
    /// the steering-bypass flags), per §7: a misconfigured/absent
    /// threshold is interpreted as disabled rather than as an error.
    fn default() -> Self {
        Config {
            sta_block_timeout: 0,
            local_sta_timeout: 0,
            local_sta_update: 1_000,

            max_retry_band: 0,
            seen_policy_timeout: 0,

            assoc_steering: true,

            band_steering_threshold: 0,
            load_balancing_threshold: 0,

            min_snr: 0,
            min_connect_snr: 0,
            min_snr_kick_delay: 0,
            signal_diff_threshold: 0,

            roam_scan_snr: 0,
            roam_trigger_snr: 0,
            roam_scan_tries: 0,
            roam_scan_interval: 0,
            roam_scan_timeout: 0,
            roam_trigger_interval: 0,
            roam_kick_delay: 0,

            initial_connect_delay: 0,

            load_kick_enabled: false,
            load_kick_threshold: 0,
            load_kick_delay: 0,
            load_kick_min_clients: 0,
            load_kick_reason_code: 5,
        }
    }
}

macro_rules! read_opt {
    ($map:expr, $key:literal, $variant:ident, $default:expr) => {
        match $map.get($key) {
            None => $default,
            Some(ConfigValue::$variant(v)) => *v,
            Some(other) => {
                return Err(ConfigError::WrongType {
                    key: $key,
                    expected: stringify!($variant),
                    found: other.to_string(),
                })
            }
        }
    };
}

impl Config {
    /// Build a [`Config`] from the flat map, falling back to
    /// [`Config::default`] for any key the map omits.
    pub fn from_map(map: &HashMap<String, ConfigValue>) -> Result<Config, ConfigError> {
        let defaults = Config::default();
        let cfg = Config {
            sta_block_timeout: read_opt!(map, "sta_block_timeout", UInt, defaults.sta_block_timeout),
            local_sta_timeout: read_opt!(map, "local_sta_timeout", UInt, defaults.local_sta_timeout),
            local_sta_update: read_opt!(map, "local_sta_update", UInt, defaults.local_sta_update),

            max_retry_band: read_opt!(map, "max_retry_band", UInt, defaults.max_retry_band as u64) as u32,
            seen_policy_timeout: read_opt!(map, "seen_policy_timeout", UInt, defaults.seen_policy_timeout),

            assoc_steering: read_opt!(map, "assoc_steering", Bool, defaults.assoc_steering),

            band_steering_threshold: read_opt!(map, "band_steering_threshold", Int, defaults.band_steering_threshold),
            load_balancing_threshold: read_opt!(map, "load_balancing_threshold", Int, defaults.load_balancing_threshold),

            min_snr: read_opt!(map, "min_snr", Int, defaults.min_snr as i64) as i32,
            min_connect_snr: read_opt!(map, "min_connect_snr", Int, defaults.min_connect_snr as i64) as i32,
            min_snr_kick_delay: read_opt!(map, "min_snr_kick_delay", UInt, defaults.min_snr_kick_delay),
            signal_diff_threshold: read_opt!(map, "signal_diff_threshold", Int, defaults.signal_diff_threshold as i64) as i32,

            roam_scan_snr: read_opt!(map, "roam_scan_snr", Int, defaults.roam_scan_snr as i64) as i32,
            roam_trigger_snr: read_opt!(map, "roam_trigger_snr", Int, defaults.roam_trigger_snr as i64) as i32,
            roam_scan_tries: read_opt!(map, "roam_scan_tries", UInt, defaults.roam_scan_tries as u64) as u32,
            roam_scan_interval: read_opt!(map, "roam_scan_interval", UInt, defaults.roam_scan_interval),
            roam_scan_timeout: read_opt!(map, "roam_scan_timeout", UInt, defaults.roam_scan_timeout),
            roam_trigger_interval: read_opt!(map, "roam_trigger_interval", UInt, defaults.roam_trigger_interval),
            roam_kick_delay: read_opt!(map, "roam_kick_delay", UInt, defaults.roam_kick_delay),

            initial_connect_delay: read_opt!(map, "initial_connect_delay", UInt, defaults.initial_connect_delay),

            load_kick_enabled: read_opt!(map, "load_kick_enabled", Bool, defaults.load_kick_enabled),
            load_kick_threshold: read_opt!(map, "load_kick_threshold", UInt, defaults.load_kick_threshold as u64) as u32,
            load_kick_delay: read_opt!(map, "load_kick_delay", UInt, defaults.load_kick_delay),
            load_kick_min_clients: read_opt!(map, "load_kick_min_clients", UInt, defaults.load_kick_min_clients as u64) as u32,
            load_kick_reason_code: read_opt!(map, "load_kick_reason_code", UInt, defaults.load_kick_reason_code as u64) as u16,
        };

        if cfg.load_kick_threshold > 100 {
            return Err(ConfigError::OutOfRange {
                key: "load_kick_threshold",
                value: cfg.load_kick_threshold as i64,
            });
        }

        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_disable_every_threshold() {
        let cfg = Config::default();
        assert_eq!(cfg.min_snr, 0);
        assert_eq!(cfg.load_kick_threshold, 0);
        assert!(!cfg.load_kick_enabled);
    }

    #[test]
    fn from_map_overrides_only_named_keys() {
        let mut map = HashMap::new();
        map.insert("min_snr".to_string(), ConfigValue::Int(20));
        map.insert("assoc_steering".to_string(), ConfigValue::Bool(false));
        let cfg = Config::from_map(&map).unwrap();
        assert_eq!(cfg.min_snr, 20);
        assert!(!cfg.assoc_steering);
        assert_eq!(cfg.load_kick_threshold, 0);
    }

    #[test]
    fn from_map_rejects_wrong_type() {
        let mut map = HashMap::new();
        map.insert("min_snr".to_string(), ConfigValue::Bool(true));
        assert!(matches!(
            Config::from_map(&map),
            Err(ConfigError::WrongType { key: "min_snr", .. })
        ));
    }

    #[test]
    fn from_map_rejects_out_of_range_load_threshold() {
        let mut map = HashMap::new();
        map.insert("load_kick_threshold".to_string(), ConfigValue::UInt(150));
        assert!(matches!(
            Config::from_map(&map),
            Err(ConfigError::OutOfRange { key: "load_kick_threshold", .. })
        ));
    }
}
