use serde::{Deserialize, Serialize};

use laserdash_core::roster::{DEFAULT_ROSTER_CAPACITY, DEFAULT_SYNC_HOLD};

/// Movement and ability tuning. Units are world units and seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    /// Base gravity (units/s^2, negative is down).
    pub gravity: f32,
    /// Automatic horizontal run speed.
    pub run_speed: f32,
    /// Vertical speed set by a jump.
    pub jump_speed: f32,
    /// Jumps allowed before touching ground again.
    pub max_jumps: u8,
    /// Extra downward acceleration while descending.
    pub extra_fall_accel: f32,
    /// Upper bound of the slow-ascent band near the apex.
    pub apex_band: f32,
    /// Fraction of `extra_fall_accel` applied inside the apex band.
    pub apex_factor: f32,
    /// Terminal fall speed (positive magnitude).
    pub max_fall_speed: f32,
    /// Horizontal speed while dashing.
    pub dash_speed: f32,
    pub dash_duration: f32,
    /// Cooldown started when a dash ends.
    pub skill_cooldown: f32,
    pub stun_duration: f32,
    /// Horizontal distance between deterministic spawn points.
    pub spawn_spacing: f32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            gravity: -9.81,
            run_speed: 5.0,
            jump_speed: 10.0,
            max_jumps: 2,
            extra_fall_accel: 2.5,
            apex_band: 2.0,
            apex_factor: 0.5,
            max_fall_speed: 15.0,
            dash_speed: 15.0,
            dash_duration: 0.2,
            skill_cooldown: 3.0,
            stun_duration: 0.1,
            spawn_spacing: 2.0,
        }
    }
}

/// Pre-race countdown sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CountdownConfig {
    /// Delay between session start (or restart) and the first step.
    pub lead_in: f32,
    /// Number of numbered steps, counted down to 1.
    pub steps: u8,
    pub step_duration: f32,
    /// How long "GO!" is shown before the race runs.
    pub go_duration: f32,
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self {
            lead_in: 1.0,
            steps: 3,
            step_duration: 1.0,
            go_duration: 0.5,
        }
    }
}

/// Periodic two-phase hazard timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HazardConfig {
    pub lanes: u8,
    pub warning_duration: f32,
    pub active_duration: f32,
    /// Gap between the end of one cycle and the start of the next.
    pub cycle_interval: f32,
    /// Delay after the race starts before the first cycle.
    pub initial_delay: f32,
    /// Seed for lane selection.
    pub seed: u64,
}

impl Default for HazardConfig {
    fn default() -> Self {
        Self {
            lanes: 7,
            warning_duration: 1.3,
            active_duration: 1.3,
            cycle_interval: 5.0,
            initial_delay: 2.0,
            seed: 42,
        }
    }
}

/// Observer-side correction thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Predicted entity: hard snap beyond this distance.
    pub snap_distance: f32,
    /// Predicted entity: smooth correction beyond this distance.
    pub correct_distance: f32,
    /// Minimum time since the last hard snap before smoothing resumes.
    pub correction_cooldown: f32,
    /// Smoothing speed (units/s).
    pub correction_speed: f32,
    /// Remote entity: hard snap beyond this distance.
    pub remote_snap_distance: f32,
    /// Remote entity: no movement within this distance.
    pub remote_deadband: f32,
    /// Remote entity glide speed (units/s).
    pub remote_glide_speed: f32,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            snap_distance: 0.5,
            correct_distance: 0.1,
            correction_cooldown: 0.1,
            correction_speed: 2.0,
            remote_snap_distance: 1.0,
            remote_deadband: 0.1,
            remote_glide_speed: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
    pub capacity: usize,
    /// How long a resync pass blocks duplicate requests (seconds).
    pub sync_hold: f32,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_ROSTER_CAPACITY,
            sync_hold: DEFAULT_SYNC_HOLD,
        }
    }
}

/// Top-level race configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceConfig {
    pub movement: MovementConfig,
    pub countdown: CountdownConfig,
    pub hazard: HazardConfig,
    pub reconcile: ReconcileConfig,
    pub roster: RosterConfig,
}

impl RaceConfig {
    /// Load from `LASERDASH_RACE_CONFIG` or `config/race.toml`, falling back
    /// to defaults when neither is present or parseable.
    pub fn load() -> Self {
        let path = std::env::var("LASERDASH_RACE_CONFIG")
            .unwrap_or_else(|_| "config/race.toml".to_string());
        match std::fs::read_to_string(&path) {
            Ok(content) => Self::from_toml(&content).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse {path}: {e}, using defaults");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}
