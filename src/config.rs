//! Rig configuration using Figment
//!
//! Configuration is loaded from:
//! 1. `config/default.toml` (base configuration)
//! 2. Environment variables prefixed with `MOTION_TEST_`, nested keys
//!    separated by `__`
//!
//! # Example
//! ```no_run
//! use rust_motion_test::config::RigConfig;
//!
//! let config = RigConfig::load()?;
//! println!("Axis: {}", config.axis.id);
//! # Ok::<(), figment::Error>(())
//! ```

use crate::axis::AxisTiming;
use crate::bus::SimulatedAxisConfig;
use crate::campaign::TestSettings;
use crate::logging::LogFormat;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "MOTION_TEST_";

/// Top-level rig configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RigConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Axis under test
    #[serde(default)]
    pub axis: AxisConfig,
    /// Result output
    #[serde(default)]
    pub storage: StorageConfig,
    /// Simulated controller used by the CLI
    #[serde(default)]
    pub simulator: SimulatorConfig,
    /// Measurement instruments
    #[serde(default)]
    pub instruments: Vec<InstrumentDefinition>,
    /// Default campaign settings
    #[serde(default)]
    pub test: TestSettings,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

/// Axis binding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxisConfig {
    /// Axis id on the controller
    #[serde(default = "default_axis_id")]
    pub id: u32,
    /// Polling and command delays
    #[serde(default)]
    pub timing: AxisTiming,
    /// Period of the background position monitor; zero disables it
    #[serde(default = "default_position_poll", with = "humantime_serde")]
    pub position_poll_interval: Duration,
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self {
            id: default_axis_id(),
            timing: AxisTiming::default(),
            position_poll_interval: default_position_poll(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Output directory for settings snapshots and result files
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

/// Simulated controller parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Travel range and start position
    #[serde(default)]
    pub axis: SimulatedAxisConfig,
    /// Round-trip latency of every register access
    #[serde(default, with = "humantime_serde")]
    pub latency: Duration,
}

/// Instrument definition in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentDefinition {
    /// Column name in the result file
    pub name: String,
    /// Whether the instrument is sampled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Constant offset of the reading
    #[serde(default)]
    pub offset: f64,
    /// Peak amplitude of uniform noise
    #[serde(default)]
    pub noise: f64,
}

fn default_name() -> String {
    "Motion Test Rig".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_axis_id() -> u32 {
    1
}

fn default_position_poll() -> Duration {
    Duration::from_millis(250)
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}

fn default_enabled() -> bool {
    true
}

impl RigConfig {
    /// Load configuration from `config/default.toml` and environment variables
    ///
    /// Example override: `MOTION_TEST_APPLICATION__LOG_LEVEL=debug`
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path. A missing file yields
    /// the defaults plus environment overrides.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Self::figment(path).extract()
    }

    /// Provider chain used by [`RigConfig::load_from`].
    pub fn figment<P: AsRef<Path>>(path: P) -> Figment {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            ));
        }

        if self.axis.timing.poll_interval.is_zero() {
            return Err("axis.timing.poll_interval must be non-zero".to_string());
        }

        let sim = &self.simulator.axis;
        if sim.low_limit >= sim.high_limit {
            return Err(format!(
                "simulator low_limit {} must be below high_limit {}",
                sim.low_limit, sim.high_limit
            ));
        }

        if self.storage.output_dir.as_os_str().is_empty() {
            return Err("storage.output_dir must not be empty".to_string());
        }

        let mut names = std::collections::HashSet::new();
        for instrument in &self.instruments {
            if !names.insert(&instrument.name) {
                return Err(format!("Duplicate instrument name: {}", instrument.name));
            }
        }

        Ok(())
    }

    /// Get all enabled instruments
    pub fn enabled_instruments(&self) -> Vec<&InstrumentDefinition> {
        self.instruments
            .iter()
            .filter(|inst| inst.enabled)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn missing_file_yields_defaults() {
        Jail::expect_with(|_jail| {
            let config = RigConfig::load_from("absent.toml")?;
            assert_eq!(config.axis.id, 1);
            assert_eq!(config.application.log_level, "info");
            assert!(config.instruments.is_empty());
            assert!(config.validate().is_ok());
            Ok(())
        });
    }

    #[test]
    fn file_values_are_loaded() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "rig.toml",
                r#"
                [application]
                log_level = "debug"
                log_format = "json"

                [axis]
                id = 3
                position_poll_interval = "1s"

                [axis.timing]
                poll_interval = "5ms"

                [simulator.axis]
                low_limit = -10.0
                high_limit = 10.0

                [[instruments]]
                name = "Gauge A"

                [[instruments]]
                name = "Gauge B"
                enabled = false

                [test]
                cycles = 7
                settle_time = "200ms"
                "#,
            )?;
            let config = RigConfig::load_from("rig.toml")?;
            assert_eq!(config.application.log_format, LogFormat::Json);
            assert_eq!(config.axis.id, 3);
            assert_eq!(config.axis.timing.poll_interval, Duration::from_millis(5));
            assert_eq!(
                config.axis.timing.command_latency,
                AxisTiming::default().command_latency
            );
            assert_eq!(config.simulator.axis.high_limit, 10.0);
            assert_eq!(config.test.cycles, 7);
            assert_eq!(config.test.settle_time, Duration::from_millis(200));
            let enabled: Vec<_> = config
                .enabled_instruments()
                .iter()
                .map(|i| i.name.as_str())
                .collect();
            assert_eq!(enabled, vec!["Gauge A"]);
            Ok(())
        });
    }

    #[test]
    fn environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("rig.toml", "[axis]\nid = 2\n")?;
            jail.set_env("MOTION_TEST_AXIS__ID", "5");
            jail.set_env("MOTION_TEST_APPLICATION__LOG_LEVEL", "warn");
            let config = RigConfig::load_from("rig.toml")?;
            assert_eq!(config.axis.id, 5);
            assert_eq!(config.application.log_level, "warn");
            Ok(())
        });
    }

    #[test]
    fn invalid_log_level_rejected() {
        let mut config = RigConfig::default();
        config.application.log_level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_simulator_limits_rejected() {
        let mut config = RigConfig::default();
        config.simulator.axis.low_limit = 5.0;
        config.simulator.axis.high_limit = -5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn duplicate_instrument_names_rejected() {
        let gauge = InstrumentDefinition {
            name: "Gauge".to_string(),
            enabled: true,
            offset: 0.0,
            noise: 0.0,
        };
        let config = RigConfig {
            instruments: vec![gauge.clone(), gauge],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.contains("Duplicate instrument name"));
    }
}
