use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Runtime settings, read from `SLOTGUARD_*` environment variables. Unset or
/// unparsable values fall back to the defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub metrics_port: Option<u16>,
    /// WAL appends since the last compaction before the compactor rewrites it.
    pub compact_threshold: u64,
    pub compact_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            metrics_port: None,
            compact_threshold: 1000,
            compact_interval: Duration::from_secs(30),
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|s| s.trim().parse().ok())
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; tests pass a map instead of the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            data_dir: lookup("SLOTGUARD_DATA_DIR").map_or(defaults.data_dir, PathBuf::from),
            metrics_port: parsed(&lookup, "SLOTGUARD_METRICS_PORT"),
            compact_threshold: parsed(&lookup, "SLOTGUARD_COMPACT_THRESHOLD")
                .unwrap_or(defaults.compact_threshold),
            compact_interval: parsed(&lookup, "SLOTGUARD_COMPACT_INTERVAL_SECS")
                .map_or(defaults.compact_interval, Duration::from_secs),
        }
    }

    /// Log file inside the configured data directory.
    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("ledger.wal")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = from(&[]);
        assert_eq!(config, Config::default());
        assert_eq!(config.wal_path(), PathBuf::from("./data/ledger.wal"));
    }

    #[test]
    fn reads_every_variable() {
        let config = from(&[
            ("SLOTGUARD_DATA_DIR", "/var/lib/slotguard"),
            ("SLOTGUARD_METRICS_PORT", "9100"),
            ("SLOTGUARD_COMPACT_THRESHOLD", "50"),
            ("SLOTGUARD_COMPACT_INTERVAL_SECS", "5"),
        ]);
        assert_eq!(config.wal_path(), PathBuf::from("/var/lib/slotguard/ledger.wal"));
        assert_eq!(config.metrics_port, Some(9100));
        assert_eq!(config.compact_threshold, 50);
        assert_eq!(config.compact_interval, Duration::from_secs(5));
    }

    #[test]
    fn garbage_falls_back() {
        let config = from(&[
            ("SLOTGUARD_METRICS_PORT", "not-a-port"),
            ("SLOTGUARD_COMPACT_THRESHOLD", "-3"),
        ]);
        assert_eq!(config.metrics_port, None);
        assert_eq!(config.compact_threshold, 1000);
    }
}
