//! Engine configuration

use std::str::FromStr;

use fsring_core::abi::MAX_ENTRIES;

pub const ENV_SQ_ENTRIES: &str = "FSRING_SQ_ENTRIES";
pub const ENV_CQ_ENTRIES: &str = "FSRING_CQ_ENTRIES";
pub const ENV_DISABLE: &str = "FSRING_DISABLE";

/// Configuration for one engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Submission queue entries; also the admission limit
    pub sq_entries: u32,

    /// Completion queue entries (None = kernel default, 2x SQ)
    pub cq_entries: Option<u32>,

    /// Build the engine without a ring; every request falls back
    pub enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sq_entries: 64,
            cq_entries: None,
            enabled: true,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `FSRING_SQ_ENTRIES`, `FSRING_CQ_ENTRIES` and
    /// `FSRING_DISABLE`. Unparseable values are ignored; the SQ size is
    /// clamped the same way as `sq_entries`.
    pub fn from_env() -> Self {
        let d = Self::default();
        let sq_entries = env_get(ENV_SQ_ENTRIES, d.sq_entries);
        Self {
            sq_entries,
            cq_entries: env_get_opt(ENV_CQ_ENTRIES).or(d.cq_entries),
            enabled: !env_get_bool(ENV_DISABLE, !d.enabled),
        }
        .sq_entries(sq_entries)
    }

    pub fn sq_entries(mut self, n: u32) -> Self {
        self.sq_entries = n.min(MAX_ENTRIES);
        self
    }

    pub fn cq_entries(mut self, n: u32) -> Self {
        self.cq_entries = Some(n);
        self
    }

    pub fn enabled(mut self, on: bool) -> Self {
        self.enabled = on;
        self
    }
}

fn env_get<T: FromStr>(key: &str, default: T) -> T {
    env_get_opt(key).unwrap_or(default)
}

fn env_get_opt<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// "1", "true", "yes", "on" (any case) are true; anything else set is false.
fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = EngineConfig::default();
        assert_eq!(c.sq_entries, 64);
        assert_eq!(c.cq_entries, None);
        assert!(c.enabled);
    }

    #[test]
    fn builder_clamps_sq_entries() {
        let c = EngineConfig::new().sq_entries(1 << 20).cq_entries(128).enabled(false);
        assert_eq!(c.sq_entries, MAX_ENTRIES);
        assert_eq!(c.cq_entries, Some(128));
        assert!(!c.enabled);
    }

    // All env manipulation lives in one test; the process environment is
    // shared between test threads.
    #[test]
    fn from_env_overrides() {
        std::env::remove_var(ENV_SQ_ENTRIES);
        std::env::remove_var(ENV_CQ_ENTRIES);
        std::env::remove_var(ENV_DISABLE);
        assert_eq!(EngineConfig::from_env(), EngineConfig::default());

        std::env::set_var(ENV_SQ_ENTRIES, "256");
        std::env::set_var(ENV_CQ_ENTRIES, "1024");
        std::env::set_var(ENV_DISABLE, "YES");
        let c = EngineConfig::from_env();
        assert_eq!(c.sq_entries, 256);
        assert_eq!(c.cq_entries, Some(1024));
        assert!(!c.enabled);

        std::env::set_var(ENV_SQ_ENTRIES, "1000000");
        assert_eq!(EngineConfig::from_env().sq_entries, MAX_ENTRIES);

        std::env::set_var(ENV_SQ_ENTRIES, "lots");
        std::env::set_var(ENV_DISABLE, "0");
        let c = EngineConfig::from_env();
        assert_eq!(c.sq_entries, 64);
        assert!(c.enabled);

        std::env::remove_var(ENV_SQ_ENTRIES);
        std::env::remove_var(ENV_CQ_ENTRIES);
        std::env::remove_var(ENV_DISABLE);
    }
}
