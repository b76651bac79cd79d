// src/config.rs

use serde::Deserialize;

/// Top-level configuration for a `TransportHost` + `ExchangeFoundation`
/// pair, loadable from a `.toml` file or constructed with
/// [`FoundationConfig::default`].
///
/// Mirrors the shape of the teacher's `arb::config::ArbConfig`
/// (`Deserialize`, nested config struct, a strategy enum with a manual
/// `Default` impl).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FoundationConfig {
    pub connect_timeout_secs: u64,
    pub handshake_timeout_secs: u64,
    pub keepalive_interval_secs: u64,
    pub reconnect: ReconnectConfig,
}

impl Default for FoundationConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 60,
            handshake_timeout_secs: 60,
            keepalive_interval_secs: 20,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl FoundationConfig {
    /// Loads a `FoundationConfig` from a TOML file, falling back to field
    /// defaults for anything the file omits.
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// Backoff policy for an adapter's reconnect loop (§9: "Implementations
/// SHOULD add exponential-backoff reconnection and re-subscription of the
/// active symbol set").
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub enabled: bool,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_delay_ms: 250,
            max_delay_ms: 30_000,
            multiplier: 2.0,
        }
    }
}

impl ReconnectConfig {
    /// Returns the delay before the `attempt`-th reconnect attempt
    /// (0-indexed), capped at `max_delay_ms`.
    pub fn delay_for_attempt(&self, attempt: u32) -> std::time::Duration {
        let scaled = self.base_delay_ms as f64 * self.multiplier.powi(attempt as i32);
        let capped = scaled.min(self.max_delay_ms as f64).max(0.0);
        std::time::Duration::from_millis(capped as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec_constants() {
        let cfg = FoundationConfig::default();
        assert_eq!(cfg.connect_timeout_secs, 60);
        assert_eq!(cfg.handshake_timeout_secs, 60);
        assert_eq!(cfg.keepalive_interval_secs, 20);
    }

    #[test]
    fn loads_partial_toml_with_defaults() {
        let cfg = FoundationConfig::from_toml_str("keepalive_interval_secs = 45\n").unwrap();
        assert_eq!(cfg.keepalive_interval_secs, 45);
        assert_eq!(cfg.connect_timeout_secs, 60);
    }

    #[test]
    fn reconnect_backoff_grows_and_caps() {
        let cfg = ReconnectConfig::default();
        assert_eq!(cfg.delay_for_attempt(0).as_millis(), 250);
        assert_eq!(cfg.delay_for_attempt(1).as_millis(), 500);
        assert_eq!(cfg.delay_for_attempt(20).as_millis(), 30_000);
    }
}
