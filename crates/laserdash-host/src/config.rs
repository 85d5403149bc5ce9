use serde::{Deserialize, Serialize};

/// Host loop configuration, loaded from `laserdash.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Authoritative simulation rate.
    pub tick_rate_hz: f32,
    /// Broadcast a snapshot every N ticks.
    pub snapshot_every_ticks: u32,
    /// Period of the roster drift check (seconds).
    pub drift_check_secs: f32,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 60.0,
            snapshot_every_ticks: 1,
            drift_check_secs: 1.0,
        }
    }
}

impl HostConfig {
    /// Load from `LASERDASH_HOST_CONFIG` or `laserdash.toml`, then apply
    /// env var overrides.
    pub fn load() -> Self {
        let path =
            std::env::var("LASERDASH_HOST_CONFIG").unwrap_or_else(|_| "laserdash.toml".to_string());
        let mut config = match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str::<HostConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from {path}");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse {path}: {e}, using defaults");
                    HostConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No {path} found, using defaults");
                HostConfig::default()
            },
        };

        if let Ok(val) = std::env::var("LASERDASH_TICK_RATE")
            && let Ok(hz) = val.parse::<f32>()
        {
            config.tick_rate_hz = hz;
        }
        config
    }

    /// Every problem with this config. Empty means usable.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !(self.tick_rate_hz.is_finite() && self.tick_rate_hz > 0.0) {
            problems.push(format!("tick_rate_hz must be > 0 (got {})", self.tick_rate_hz));
        }
        if self.snapshot_every_ticks == 0 {
            problems.push("snapshot_every_ticks must be > 0".to_string());
        }
        if !(self.drift_check_secs.is_finite() && self.drift_check_secs > 0.0) {
            problems.push(format!(
                "drift_check_secs must be > 0 (got {})",
                self.drift_check_secs
            ));
        }
        problems
    }

    pub fn tick_dt(&self) -> f32 {
        1.0 / self.tick_rate_hz
    }
}
