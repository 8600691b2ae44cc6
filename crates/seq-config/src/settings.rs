//! Sequencer settings
//!
//! Parsed from an optional YAML file; every field has a default, so an empty
//! file (or no file at all) is a valid configuration. Environment variables
//! override the file.

use seq_equipment::sim::{SimCamera, SimFilterWheel, SimSafetyMonitor, SimTelescope};
use seq_equipment::Equipment;
use seq_script::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{SettingsError, SettingsResult};

/// Log filter override, in `tracing-subscriber` `EnvFilter` syntax
pub const ENV_LOG: &str = "SEQUENCER_LOG";

/// Bypass the pre-run validation gate (`true`/`false`, `1`/`0`)
pub const ENV_SKIP_VALIDATION: &str = "SEQUENCER_SKIP_VALIDATION";

/// Top-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineConfig,

    pub equipment: SimulationSettings,

    /// Default log filter, e.g. `info` or `seq_script=debug`
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            equipment: SimulationSettings::default(),
            log_level: "info".to_string(),
        }
    }
}

/// Simulated equipment used when no drivers are attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub camera_connected: bool,
    pub filter_wheel_connected: bool,
    pub telescope_connected: bool,
    pub safety_connected: bool,

    /// Initial safety monitor reading
    pub safe: bool,

    /// Installed filters, in wheel order
    pub filters: Vec<String>,

    /// Fraction of the requested exposure time actually waited
    pub exposure_time_scale: f64,

    pub filter_switch_ms: u64,
    pub slew_ms: u64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            camera_connected: true,
            filter_wheel_connected: true,
            telescope_connected: true,
            safety_connected: true,
            safe: true,
            filters: SimFilterWheel::DEFAULT_FILTERS
                .iter()
                .map(|filter| filter.to_string())
                .collect(),
            exposure_time_scale: 0.0,
            filter_switch_ms: 0,
            slew_ms: 0,
        }
    }
}

impl SimulationSettings {
    /// Build the simulated equipment bundle
    pub fn build(&self) -> Equipment {
        let camera = SimCamera::new().with_time_scale(self.exposure_time_scale);
        camera.set_connected(self.camera_connected);

        let wheel = SimFilterWheel::new(self.filters.as_slice())
            .with_switch_delay(Duration::from_millis(self.filter_switch_ms));
        wheel.set_connected(self.filter_wheel_connected);

        let telescope = SimTelescope::new().with_slew_delay(Duration::from_millis(self.slew_ms));
        telescope.set_connected(self.telescope_connected);

        let safety = SimSafetyMonitor::new();
        safety.set_connected(self.safety_connected);
        safety.set_safe(self.safe);

        Equipment::new(
            Arc::new(camera),
            Arc::new(wheel),
            Arc::new(telescope),
            Arc::new(safety),
        )
    }
}

impl Settings {
    /// Load settings from a YAML file
    pub fn load(path: impl AsRef<Path>) -> SettingsResult<Self> {
        let path = path.as_ref();
        debug!("Loading settings: {:?}", path);

        let content = std::fs::read_to_string(path).map_err(|e| SettingsError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_yaml(&content).map_err(|e| SettingsError::ParseYaml {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        // An empty document parses as null
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> SettingsResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> SettingsResult<()> {
        if let Some(level) = lookup(ENV_LOG).filter(|level| !level.trim().is_empty()) {
            debug!(%level, "Log level overridden from environment");
            self.log_level = level;
        }

        if let Some(value) = lookup(ENV_SKIP_VALIDATION) {
            self.engine.skip_validation = parse_flag(&value).ok_or_else(|| {
                SettingsError::InvalidValue {
                    key: ENV_SKIP_VALIDATION.to_string(),
                    reason: format!("expected true or false, got '{value}'"),
                }
            })?;
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.log_level, "info");
        assert!(!settings.engine.skip_validation);
        assert!(settings.equipment.camera_connected);
        assert_eq!(settings.equipment.filters.len(), 7);
    }

    #[test]
    fn test_parse_partial_yaml() {
        let settings = Settings::from_yaml(
            r#"
engine:
  max_loop_iterations: 50
equipment:
  telescope_connected: false
  filters: [L, Ha]
"#,
        )
        .unwrap();

        assert_eq!(settings.engine.max_loop_iterations, Some(50));
        assert!(!settings.engine.skip_validation);
        assert!(!settings.equipment.telescope_connected);
        assert!(settings.equipment.camera_connected);
        assert_eq!(settings.equipment.filters, vec!["L", "Ha"]);
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(Settings::from_yaml("\n").unwrap(), Settings::default());
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = Settings::default();
        settings
            .apply_overrides(env(&[
                (ENV_LOG, "seq_script=debug"),
                (ENV_SKIP_VALIDATION, "TRUE"),
            ]))
            .unwrap();

        assert_eq!(settings.log_level, "seq_script=debug");
        assert!(settings.engine.skip_validation);
    }

    #[test]
    fn test_invalid_env_flag() {
        let mut settings = Settings::default();
        let err = settings
            .apply_overrides(env(&[(ENV_SKIP_VALIDATION, "maybe")]))
            .unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue { .. }));
    }

    #[test]
    fn test_build_simulated_equipment() {
        let settings = Settings::from_yaml("equipment:\n  camera_connected: false\n  safe: false\n")
            .unwrap();
        let equipment = settings.equipment.build();

        assert!(!equipment.camera.is_connected());
        assert!(equipment.telescope.is_connected());
        assert!(!equipment.safety.is_safe());
    }
}
