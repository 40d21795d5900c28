//! Configuration management with layered hierarchy
//!
//! Layers, later wins: built-in defaults, the global user file
//! (`<config_dir>/dimspect/config.yaml`), the project file `./dimspect.yaml`,
//! then `DIMSPECT_*` environment variables. Command-line flags are applied on
//! top by the individual commands.
//!
//! File layers are merged key by key, so a project file that only sets
//! `tolerance.abs_tol_mm` keeps every other default.

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_yml::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::calibration::CalibrationAnchor;
use crate::detect::DetectorParams;
use crate::entities::part::{Dimension, PartType};
use crate::inspect::compare::ToleranceConfig;

/// Project-level config file name, looked up in the working directory
pub const PROJECT_CONFIG_FILE: &str = "dimspect.yaml";

pub const ENV_ABS_TOL: &str = "DIMSPECT_ABS_TOL_MM";
pub const ENV_REL_TOL: &str = "DIMSPECT_REL_TOL_PCT";

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("Failed to read config file {path}")]
    #[diagnostic(code(dimspect::config::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}")]
    #[diagnostic(
        code(dimspect::config::parse),
        help("Run `dimspect config show` to see the expected layout")
    )]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yml::Error,
    },

    #[error("Invalid value '{value}' for {var}")]
    #[diagnostic(code(dimspect::config::env), help("Expected a number"))]
    Env { var: String, value: String },
}

/// Calibration anchor per part family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub bearing: CalibrationAnchor,
    pub washer: CalibrationAnchor,
    pub square_washer: CalibrationAnchor,
    pub hex_nut: CalibrationAnchor,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            bearing: CalibrationAnchor::Reference {
                dimension: Dimension::OuterDiameter,
                mm: 31.0,
            },
            washer: CalibrationAnchor::Focal {
                focal_px: 1000.0,
                standoff_mm: 100.0,
            },
            square_washer: CalibrationAnchor::Reference {
                dimension: Dimension::OuterWidth,
                mm: 40.0,
            },
            hex_nut: CalibrationAnchor::Reference {
                dimension: Dimension::AcrossFlats,
                mm: 25.0,
            },
        }
    }
}

impl CalibrationConfig {
    pub fn anchor_for(&self, part_type: PartType) -> CalibrationAnchor {
        match part_type {
            PartType::Bearing => self.bearing,
            PartType::Washer => self.washer,
            PartType::SquareWasher => self.square_washer,
            PartType::HexNut => self.hex_nut,
        }
    }
}

/// Output file locations; `null` disables the optional ones
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub nominal: PathBuf,
    pub measurements: PathBuf,
    pub raw_measurements: Option<PathBuf>,
    pub report: PathBuf,
    pub live_status: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            nominal: PathBuf::from("dxf_measurements.csv"),
            measurements: PathBuf::from("cleaned_output.csv"),
            raw_measurements: Some(PathBuf::from("measured_output.csv")),
            report: PathBuf::from("component_comparison_report.csv"),
            live_status: Some(PathBuf::from("current_measurement.txt")),
        }
    }
}

/// Effective configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tolerance: ToleranceConfig,
    pub calibration: CalibrationConfig,
    pub detectors: DetectorParams,
    pub outputs: OutputConfig,
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    pub fn load() -> Result<Self, ConfigError> {
        let paths = Self::search_paths();
        let mut config = Self::load_files(paths.iter().map(PathBuf::as_path))?;
        config.apply_env(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    /// Merge the given YAML files (missing ones are skipped) over the defaults
    pub fn load_files<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Result<Self, ConfigError> {
        let mut layers = Vec::new();
        for path in paths {
            if !path.exists() {
                continue;
            }
            let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let layer: Value = serde_yml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
            tracing::debug!(path = %path.display(), "config layer loaded");
            layers.push(layer);
        }
        Self::from_layers(layers)
    }

    /// Merge already-parsed layers over the defaults
    pub fn from_layers(layers: impl IntoIterator<Item = Value>) -> Result<Self, ConfigError> {
        let mut merged = serde_yml::to_value(Config::default()).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<defaults>"),
            source,
        })?;
        for layer in layers {
            if !layer.is_null() {
                merge(&mut merged, layer);
            }
        }
        serde_yml::from_value(merged).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<merged>"),
            source,
        })
    }

    /// Apply `DIMSPECT_*` overrides from an environment lookup
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let number = |var: &str| -> Result<Option<f64>, ConfigError> {
            match lookup(var) {
                Some(value) => value
                    .trim()
                    .parse::<f64>()
                    .map(Some)
                    .map_err(|_| ConfigError::Env {
                        var: var.to_string(),
                        value,
                    }),
                None => Ok(None),
            }
        };

        if let Some(abs) = number(ENV_ABS_TOL)? {
            self.tolerance.abs_tol_mm = abs;
        }
        if let Some(rel) = number(ENV_REL_TOL)? {
            self.tolerance.rel_tol_pct = rel;
        }
        Ok(())
    }

    /// Get the path to the global config file
    pub fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "dimspect")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Files consulted by [`Config::load`], in priority order
    pub fn search_paths() -> Vec<PathBuf> {
        Self::global_config_path()
            .into_iter()
            .chain([PathBuf::from(PROJECT_CONFIG_FILE)])
            .collect()
    }

    pub fn to_yaml(&self) -> Result<String, serde_yml::Error> {
        serde_yml::to_string(self)
    }
}

/// Deep-merge `overlay` into `base`; mappings merge per key, anything else
/// is replaced
fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base), Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
