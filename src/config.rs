/*!
 * Runtime Configuration
 *
 * Tunables for active expiration and SCAN. Defaults suit an interactive
 * workload; each value can be overridden through the environment.
 */

use log::warn;
use std::str::FromStr;
use std::time::Duration;

pub const ENV_SWEEP_INTERVAL_MS: &str = "LODESTORE_SWEEP_INTERVAL_MS";
pub const ENV_SWEEP_BATCH: &str = "LODESTORE_SWEEP_BATCH";
pub const ENV_SCAN_COUNT: &str = "LODESTORE_SCAN_COUNT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Pause between active expiration rounds
    pub sweep_interval: Duration,
    /// Most keys removed per round while holding the shard lock
    pub sweep_batch: usize,
    /// SCAN COUNT used when the caller gives none
    pub scan_count: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_millis(100),
            sweep_batch: 20,
            scan_count: 10,
        }
    }
}

impl Config {
    /// Defaults overridden by `LODESTORE_*` variables.
    ///
    /// Unparsable or zero values are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`Config::from_env`] with an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(ms) = positive::<u64>(&lookup, ENV_SWEEP_INTERVAL_MS) {
            cfg.sweep_interval = Duration::from_millis(ms);
        }
        if let Some(n) = positive::<usize>(&lookup, ENV_SWEEP_BATCH) {
            cfg.sweep_batch = n;
        }
        if let Some(n) = positive::<usize>(&lookup, ENV_SCAN_COUNT) {
            cfg.scan_count = n;
        }
        cfg
    }
}

fn positive<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T>
where
    T: FromStr + PartialOrd + Default,
{
    let raw = lookup(name)?;
    match raw.trim().parse::<T>() {
        Ok(v) if v > T::default() => Some(v),
        _ => {
            warn!("ignoring {name}={raw:?}: expected a positive integer");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let cfg = Config::from_lookup(lookup(&[]));
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.sweep_interval, Duration::from_millis(100));
        assert_eq!(cfg.sweep_batch, 20);
        assert_eq!(cfg.scan_count, 10);
    }

    #[test]
    fn overrides_and_bad_values() {
        let cfg = Config::from_lookup(lookup(&[
            (ENV_SWEEP_INTERVAL_MS, "250"),
            (ENV_SWEEP_BATCH, "zero"),
            (ENV_SCAN_COUNT, "0"),
        ]));
        assert_eq!(cfg.sweep_interval, Duration::from_millis(250));
        assert_eq!(cfg.sweep_batch, 20);
        assert_eq!(cfg.scan_count, 10);
    }
}
