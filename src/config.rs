//! Typed application settings.
//!
//! Configuration is loaded from a TOML file plus environment variables
//! prefixed with `FMR_DAQ_` (e.g. `FMR_DAQ_LOCKIN__DURATION_S=60`), then
//! validated for semantic errors that parse cleanly but are logically
//! invalid. Validation failures abort before any instrument contact.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::core::linspace;
use crate::error::{AppResult, DaqError};

/// Top-level application configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
    /// Output artifact settings.
    pub storage: StorageSettings,
    /// Lock-in logging pipeline settings.
    pub lockin: LockinSettings,
    /// VNA field-sweep pipeline settings.
    pub vna: VnaSettings,
}

/// Output artifact settings.
#[derive(Clone, Debug, Deserialize)]
pub struct StorageSettings {
    /// Directory that receives CSV and plot files; created if missing.
    pub output_dir: PathBuf,
}

/// Lock-in logging pipeline settings.
#[derive(Clone, Debug, Deserialize)]
pub struct LockinSettings {
    /// VISA resource string for the lock-in amplifier.
    pub resource: String,
    /// Pause between samples, in seconds.
    pub sampling_interval_s: f64,
    /// Duration ceiling for the session, in seconds.
    pub duration_s: f64,
}

impl LockinSettings {
    /// The sampling interval as a `Duration`.
    pub fn sampling_interval(&self) -> Duration {
        Duration::from_secs_f64(self.sampling_interval_s)
    }
}

/// VNA field-sweep pipeline settings.
#[derive(Clone, Debug, Deserialize)]
pub struct VnaSettings {
    /// VISA resource string for the VNA.
    pub resource: String,
    /// Sweep start frequency in Hz.
    pub start_hz: f64,
    /// Sweep stop frequency in Hz.
    pub stop_hz: f64,
    /// Number of frequency points per sweep.
    pub points: usize,
    /// Source power in dBm.
    pub power_dbm: f64,
    /// IF bandwidth in Hz.
    pub if_bandwidth_hz: f64,
    /// S-parameter to measure.
    #[serde(default = "default_s_parameter")]
    pub s_parameter: String,
    /// Stored correction file to load; omit to run uncalibrated.
    #[serde(default)]
    pub calibration_file: Option<String>,
    /// Ceiling on the wait for sweep completion, in seconds.
    #[serde(default = "default_opc_timeout_s")]
    pub opc_timeout_s: f64,
    /// Field setpoint plan.
    pub field: FieldSettings,
}

impl VnaSettings {
    /// The frequency axis implied by the configured range and point count.
    pub fn frequencies(&self) -> Vec<f64> {
        linspace(self.start_hz, self.stop_hz, self.points)
    }

    /// The sweep-completion timeout as a `Duration`.
    pub fn opc_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.opc_timeout_s)
    }
}

/// Field setpoint plan for the sweep session.
#[derive(Clone, Debug, Deserialize)]
pub struct FieldSettings {
    /// First setpoint in tesla.
    pub start_t: f64,
    /// Last setpoint in tesla.
    pub stop_t: f64,
    /// Number of setpoints.
    pub steps: usize,
}

impl FieldSettings {
    /// The evenly spaced setpoint list.
    pub fn setpoints(&self) -> Vec<f64> {
        linspace(self.start_t, self.stop_t, self.steps)
    }
}

fn default_s_parameter() -> String {
    "S21".to_string()
}

fn default_opc_timeout_s() -> f64 {
    60.0
}

impl Settings {
    /// Load settings from `path`, applying `FMR_DAQ_` environment overrides.
    pub fn load(path: &Path) -> AppResult<Self> {
        let settings = Config::builder()
            .add_source(File::from(path))
            .add_source(Environment::with_prefix("FMR_DAQ").separator("__"))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Reject values that parse but cannot drive a session.
    pub fn validate(&self) -> AppResult<()> {
        if self.lockin.sampling_interval_s <= 0.0 {
            return Err(DaqError::Configuration(
                "lockin.sampling_interval_s must be positive".to_string(),
            ));
        }
        if self.lockin.duration_s <= 0.0 {
            return Err(DaqError::Configuration(
                "lockin.duration_s must be positive".to_string(),
            ));
        }
        if self.vna.points < 2 {
            return Err(DaqError::Configuration(
                "vna.points must be at least 2".to_string(),
            ));
        }
        if self.vna.start_hz >= self.vna.stop_hz {
            return Err(DaqError::Configuration(
                "vna.start_hz must be below vna.stop_hz".to_string(),
            ));
        }
        if self.vna.field.steps < 1 {
            return Err(DaqError::Configuration(
                "vna.field.steps must be at least 1".to_string(),
            ));
        }
        if self.vna.opc_timeout_s <= 0.0 {
            return Err(DaqError::Configuration(
                "vna.opc_timeout_s must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn test_settings() -> Settings {
        Settings {
            storage: StorageSettings {
                output_dir: PathBuf::from("data"),
            },
            lockin: LockinSettings {
                resource: "USB0::0xB506::0x2000::004198::INSTR".to_string(),
                sampling_interval_s: 0.2,
                duration_s: 14000.0,
            },
            vna: VnaSettings {
                resource: "TCPIP0::192.168.0.5::inst0::INSTR".to_string(),
                start_hz: 1.0e9,
                stop_hz: 10.0e9,
                points: 1601,
                power_dbm: -5.0,
                if_bandwidth_hz: 1.0e3,
                s_parameter: "S21".to_string(),
                calibration_file: Some("FMR_calibration.corr".to_string()),
                opc_timeout_s: 60.0,
                field: FieldSettings {
                    start_t: 0.05,
                    stop_t: 0.30,
                    steps: 6,
                },
            },
        }
    }

    #[test]
    fn test_valid_settings_pass_validation() {
        assert!(test_settings().validate().is_ok());
    }

    #[test]
    fn test_non_positive_interval_rejected() {
        let mut settings = test_settings();
        settings.lockin.sampling_interval_s = 0.0;
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, DaqError::Configuration(_)), "got {err:?}");
    }

    #[test]
    fn test_single_point_sweep_rejected() {
        let mut settings = test_settings();
        settings.vna.points = 1;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_inverted_frequency_range_rejected() {
        let mut settings = test_settings();
        settings.vna.start_hz = settings.vna.stop_hz;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_field_setpoints_span_configured_range() {
        let settings = test_settings();
        let setpoints = settings.vna.field.setpoints();
        assert_eq!(setpoints.len(), 6);
        assert!((setpoints[0] - 0.05).abs() < 1e-12);
        assert!((setpoints[5] - 0.30).abs() < 1e-12);
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("failed to create temp config");
        write!(
            file,
            r#"
[storage]
output_dir = "out"

[lockin]
resource = "USB0::0xB506::0x2000::004198::INSTR"
sampling_interval_s = 0.2
duration_s = 1.0

[vna]
resource = "TCPIP0::192.168.0.5::inst0::INSTR"
start_hz = 1.0e9
stop_hz = 10.0e9
points = 201
power_dbm = -5.0
if_bandwidth_hz = 1.0e3

[vna.field]
start_t = 0.05
stop_t = 0.30
steps = 6
"#
        )
        .expect("failed to write temp config");

        let settings = Settings::load(file.path()).expect("load should succeed");
        assert_eq!(settings.vna.points, 201);
        // Defaults fill the omitted keys.
        assert_eq!(settings.vna.s_parameter, "S21");
        assert!((settings.vna.opc_timeout_s - 60.0).abs() < 1e-12);
        assert!(settings.vna.calibration_file.is_none());
        assert!(settings.validate().is_ok());
    }
}
