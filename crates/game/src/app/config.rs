use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use engine::{FadeTimings, Grid, GridError};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};

use super::gameplay::{GameRules, DEFAULT_LAYOUT};

pub(crate) const CONFIG_ENV_VAR: &str = "RESCUE_CONFIG";
pub(crate) const SEED_ENV_VAR: &str = "RESCUE_SEED";
pub(crate) const DEBUG_ENV_VAR: &str = "RESCUE_DEBUG";
pub(crate) const AUDIO_ENV_VAR: &str = "RESCUE_AUDIO";
pub(crate) const MIDI_DEVICE_ENV_VAR: &str = "RESCUE_MIDI_DEVICE";

const DEFAULT_DEBUG_PASSWORD_SHA256: &str =
    "cf367ea043cf65d7e2a528c6ec689f2ac35ab9a22084a319ed4ee9f3a6734a0d";

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config json at {field_path} in {path}: {source}")]
    Parse {
        path: PathBuf,
        field_path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config value for {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

/// Whether the debug commands are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum DebugAccess {
    #[default]
    Locked,
    Enabled,
}

impl DebugAccess {
    pub(crate) fn is_enabled(self) -> bool {
        self == Self::Enabled
    }

    /// Unlocks debug access when the SHA-256 of `password` matches
    /// `expected_sha256_hex`. Returns whether access is now enabled.
    pub(crate) fn promote(&mut self, password: &str, expected_sha256_hex: &str) -> bool {
        if self.is_enabled() {
            return true;
        }
        if sha256_hex(password.as_bytes()).eq_ignore_ascii_case(expected_sha256_hex.trim()) {
            *self = Self::Enabled;
            info!("debug_access_enabled");
        }
        self.is_enabled()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct GameConfig {
    /// Custom floor plan; `None` uses the built-in layout.
    pub(crate) map: Option<Vec<String>>,
    pub(crate) sight_radius: i32,
    pub(crate) warning_radius: i32,
    pub(crate) clear_zone: i32,
    pub(crate) hostile_count: usize,
    pub(crate) max_move_distance: u32,
    /// `None` retries spawn placement forever.
    pub(crate) spawn_attempt_cap: Option<u64>,
    pub(crate) fade_out_ms: u64,
    pub(crate) transition_ms: u64,
    pub(crate) debug: DebugAccess,
    pub(crate) debug_password_sha256: String,
    pub(crate) audio_enabled: bool,
    /// Raw MIDI device node to play the theme on; `None` tries the usual
    /// ALSA and OSS nodes.
    pub(crate) midi_device: Option<PathBuf>,
    pub(crate) seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            map: None,
            sight_radius: 2,
            warning_radius: 5,
            clear_zone: 3,
            hostile_count: 15,
            max_move_distance: 3,
            spawn_attempt_cap: Some(100_000),
            fade_out_ms: 500,
            transition_ms: 1000,
            debug: DebugAccess::Locked,
            debug_password_sha256: DEFAULT_DEBUG_PASSWORD_SHA256.to_string(),
            audio_enabled: true,
            midi_device: None,
            seed: None,
        }
    }
}

impl GameConfig {
    pub(crate) fn rules(&self) -> GameRules {
        GameRules {
            sight_radius: self.sight_radius,
            warning_radius: self.warning_radius,
            clear_zone: self.clear_zone,
            hostile_count: self.hostile_count,
            max_move_distance: self.max_move_distance,
            spawn_attempt_cap: self.spawn_attempt_cap,
        }
    }

    pub(crate) fn fade_timings(&self) -> FadeTimings {
        FadeTimings {
            fade_out: Duration::from_millis(self.fade_out_ms),
            transition: Duration::from_millis(self.transition_ms),
        }
    }

    pub(crate) fn build_grid(&self) -> Result<Grid, GridError> {
        match &self.map {
            Some(rows) => Grid::from_layout(rows),
            None => Grid::from_layout(&DEFAULT_LAYOUT),
        }
    }

    pub(crate) fn promote_debug(&mut self, password: &str) -> bool {
        let expected = self.debug_password_sha256.clone();
        self.debug.promote(password, &expected)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("sight_radius", self.sight_radius),
            ("warning_radius", self.warning_radius),
            ("clear_zone", self.clear_zone),
        ] {
            if value < 0 {
                return Err(ConfigError::Invalid {
                    field,
                    message: format!("must not be negative (got {value})"),
                });
            }
        }
        if self.max_move_distance == 0 {
            return Err(ConfigError::Invalid {
                field: "max_move_distance",
                message: "must be at least 1".to_string(),
            });
        }
        if self.spawn_attempt_cap == Some(0) {
            return Err(ConfigError::Invalid {
                field: "spawn_attempt_cap",
                message: "must be at least 1 or null".to_string(),
            });
        }
        let digest = self.debug_password_sha256.trim();
        if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ConfigError::Invalid {
                field: "debug_password_sha256",
                message: "expected 64 hex digits".to_string(),
            });
        }
        Ok(())
    }
}

/// Defaults, then the optional JSON file named by `RESCUE_CONFIG`, then the
/// single-value environment overrides.
pub(crate) fn load_config() -> Result<GameConfig, ConfigError> {
    let mut config = match env::var_os(CONFIG_ENV_VAR) {
        Some(path) => load_config_file(Path::new(&path))?,
        None => GameConfig::default(),
    };
    apply_env_overrides(&mut config, |name| env::var(name).ok());
    config.validate()?;
    Ok(config)
}

pub(crate) fn load_config_file(path: &Path) -> Result<GameConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config_json(&raw, path)?;
    info!(path = %path.display(), "config_loaded");
    Ok(config)
}

pub(crate) fn parse_config_json(raw: &str, path: &Path) -> Result<GameConfig, ConfigError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    match serde_path_to_error::deserialize::<_, GameConfig>(&mut deserializer) {
        Ok(config) => Ok(config),
        Err(error) => {
            let field_path = error.path().to_string();
            let field_path = if field_path.is_empty() {
                ".".to_string()
            } else {
                field_path
            };
            Err(ConfigError::Parse {
                path: path.to_path_buf(),
                field_path,
                source: error.into_inner(),
            })
        }
    }
}

pub(crate) fn apply_env_overrides<F>(config: &mut GameConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(SEED_ENV_VAR) {
        match raw.trim().parse::<u64>() {
            Ok(seed) => config.seed = Some(seed),
            Err(_) => warn!(
                env_var = SEED_ENV_VAR,
                value = %raw,
                "invalid seed; using configured seed"
            ),
        }
    }

    if let Some(raw) = lookup(DEBUG_ENV_VAR) {
        match parse_switch(&raw) {
            Some(true) => config.debug = DebugAccess::Enabled,
            Some(false) => {}
            None => warn!(
                env_var = DEBUG_ENV_VAR,
                value = %raw,
                "invalid debug switch; leaving debug access unchanged"
            ),
        }
    }

    if let Some(raw) = lookup(AUDIO_ENV_VAR) {
        match parse_switch(&raw) {
            Some(enabled) => config.audio_enabled = enabled,
            None => warn!(
                env_var = AUDIO_ENV_VAR,
                value = %raw,
                "invalid audio switch; leaving audio setting unchanged"
            ),
        }
    }

    if let Some(raw) = lookup(MIDI_DEVICE_ENV_VAR) {
        let device = raw.trim();
        if !device.is_empty() {
            config.midi_device = Some(PathBuf::from(device));
        }
    }
}

fn parse_switch(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut output = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}
