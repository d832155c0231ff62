//! Configuration vault – reads/writes `~/.dockbot/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use dockbot_runtime::DockingConfig;
use serde::{Deserialize, Serialize};

/// What the simulated world model remembers about the charger at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ChargerMemory {
    /// Remembered in the robot's current origin.
    Known,
    /// Remembered from before the robot was moved.
    Stale,
    #[default]
    Unknown,
}

/// Scenario for the simulated robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default)]
    pub start_on_charger: bool,

    #[serde(default)]
    pub charger_memory: ChargerMemory,

    /// Whether a look-around will spot the charger.
    #[serde(default = "default_true")]
    pub charger_visible: bool,

    /// Whether reversing after the approach ever seats the robot.
    #[serde(default = "default_true")]
    pub dock_succeeds: bool,

    /// Reverse travel after the approach needed to seat on the contacts.
    #[serde(default = "default_docks_after_mm")]
    pub docks_after_mm: f32,

    /// Multiplier on simulated action durations (0 = instant).
    #[serde(default = "default_time_scale")]
    pub time_scale: f32,
}

fn default_true() -> bool {
    true
}
fn default_docks_after_mm() -> f32 {
    150.0
}
fn default_time_scale() -> f32 {
    1.0
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            start_on_charger: false,
            charger_memory: ChargerMemory::default(),
            charger_visible: true,
            dock_succeeds: true,
            docks_after_mm: default_docks_after_mm(),
            time_scale: default_time_scale(),
        }
    }
}

/// Persisted configuration stored in `~/.dockbot/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub docking: DockingConfig,

    #[serde(default)]
    pub sim: SimConfig,
}

/// Largest accepted `sim.time_scale` from flags or the environment.
pub const MAX_TIME_SCALE: f32 = 1000.0;

pub fn is_valid_time_scale(scale: f32) -> bool {
    (0.0..=MAX_TIME_SCALE).contains(&scale)
}

/// Return the path to `~/.dockbot/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".dockbot").join("config.toml")
}

/// Load the config from `path`.  Returns `None` if the file does not exist.
pub fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config = toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `DOCKBOT_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `DOCKBOT_SEARCH_TIMEOUT_SECS` | `docking.search_timeout_secs` |
/// | `DOCKBOT_DRIVE_SPEED_MMPS` | `docking.drive_speed_mmps` (must be positive) |
/// | `DOCKBOT_STANDOFF_MM` | `docking.standoff_mm` |
/// | `DOCKBOT_TIME_SCALE` | `sim.time_scale` (0 to [`MAX_TIME_SCALE`]) |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("DOCKBOT_SEARCH_TIMEOUT_SECS")
        && let Ok(secs) = v.parse::<u64>()
    {
        cfg.docking.search_timeout_secs = secs;
    }
    if let Ok(v) = std::env::var("DOCKBOT_DRIVE_SPEED_MMPS")
        && let Ok(speed) = v.parse::<f32>()
        && speed > 0.0
        && speed.is_finite()
    {
        cfg.docking.drive_speed_mmps = speed;
    }
    if let Ok(v) = std::env::var("DOCKBOT_STANDOFF_MM")
        && let Ok(mm) = v.parse::<f32>()
    {
        cfg.docking.standoff_mm = mm;
    }
    if let Ok(v) = std::env::var("DOCKBOT_TIME_SCALE")
        && let Ok(scale) = v.parse::<f32>()
        && is_valid_time_scale(scale)
    {
        cfg.sim.time_scale = scale;
    }
}

/// Save the config to `path`, creating the parent directory if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw = toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw).map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}
