//! Process configuration read from the environment.
//!
//! | Variable                 | Default |
//! |--------------------------|---------|
//! | `LARDER_WORKER_POLL_MS`  | `250`   |
//! | `LARDER_PURCHASE_PREFIX` | `PO`    |
//! | `LARDER_CHECK_PREFIX`    | `IC`    |
//! | `LARDER_ORDER_PREFIX`    | `SO`    |
//! | `LARDER_LOG_FORMAT`      | `json`  |
//!
//! Log filtering itself is read from `RUST_LOG` by the subscriber.

use std::time::Duration;

use anyhow::{Context, bail};
use larder_observability::LogFormat;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// How long a background worker waits on its subscription before checking for shutdown.
    pub worker_poll: Duration,
    pub purchase_prefix: String,
    pub check_prefix: String,
    pub order_prefix: String,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            worker_poll: Duration::from_millis(250),
            purchase_prefix: "PO".to_string(),
            check_prefix: "IC".to_string(),
            order_prefix: "SO".to_string(),
            log_format: LogFormat::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let worker_poll = match lookup("LARDER_WORKER_POLL_MS") {
            None => defaults.worker_poll,
            Some(raw) => {
                let ms: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("LARDER_WORKER_POLL_MS must be a whole number of milliseconds, got `{raw}`"))?;
                if ms == 0 {
                    bail!("LARDER_WORKER_POLL_MS must be greater than zero");
                }
                Duration::from_millis(ms)
            }
        };

        Ok(Self {
            worker_poll,
            purchase_prefix: prefix(&lookup, "LARDER_PURCHASE_PREFIX", defaults.purchase_prefix)?,
            check_prefix: prefix(&lookup, "LARDER_CHECK_PREFIX", defaults.check_prefix)?,
            order_prefix: prefix(&lookup, "LARDER_ORDER_PREFIX", defaults.order_prefix)?,
            log_format: match lookup("LARDER_LOG_FORMAT") {
                None => defaults.log_format,
                Some(raw) => raw.parse().context("LARDER_LOG_FORMAT")?,
            },
        })
    }
}

fn prefix(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: String) -> anyhow::Result<String> {
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    let value = raw.trim();
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_alphanumeric()) {
        bail!("{key} must be a non-empty alphanumeric prefix, got `{raw}`");
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn unset_keys_use_defaults() {
        assert_eq!(AppConfig::from_lookup(lookup(&[])).unwrap(), AppConfig::default());
    }

    #[test]
    fn values_override_defaults() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("LARDER_WORKER_POLL_MS", "40"),
            ("LARDER_PURCHASE_PREFIX", "PUR"),
            ("LARDER_LOG_FORMAT", "pretty"),
        ]))
        .unwrap();
        assert_eq!(cfg.worker_poll, Duration::from_millis(40));
        assert_eq!(cfg.purchase_prefix, "PUR");
        assert_eq!(cfg.check_prefix, "IC");
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }

    #[test]
    fn malformed_values_are_reported_with_the_key() {
        let err = AppConfig::from_lookup(lookup(&[("LARDER_WORKER_POLL_MS", "soon")])).unwrap_err();
        assert!(err.to_string().contains("LARDER_WORKER_POLL_MS"));

        let err = AppConfig::from_lookup(lookup(&[("LARDER_CHECK_PREFIX", "I C")])).unwrap_err();
        assert!(err.to_string().contains("LARDER_CHECK_PREFIX"));

        let err = AppConfig::from_lookup(lookup(&[("LARDER_LOG_FORMAT", "xml")])).unwrap_err();
        assert!(err.to_string().contains("LARDER_LOG_FORMAT"));
    }
}
