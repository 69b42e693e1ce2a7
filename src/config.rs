//! Configuration for the typing authentication engine.
//!
//! [`ClassifierConfig`] is an immutable value handed to every capture
//! session and every evaluation run; nothing reads configuration from
//! global state.

use crate::capture::types::SensorType;
use crate::core::features::TouchProperty;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Distance between two samples of one feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceFunction {
    Manhattan,
    /// Squared Euclidean distance (no square root)
    Euclidean,
}

impl DistanceFunction {
    pub const ALL: [DistanceFunction; 2] = [DistanceFunction::Manhattan, DistanceFunction::Euclidean];
}

/// How the live sample is compared to the enrollment set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationFunction {
    /// Nearest enrolled sample
    Min,
    /// Farthest enrolled sample
    Max,
    /// Average over all enrolled samples
    Mean,
    /// The most central enrolled sample only
    Temp,
}

impl ClassificationFunction {
    pub const ALL: [ClassificationFunction; 4] = [
        ClassificationFunction::Min,
        ClassificationFunction::Max,
        ClassificationFunction::Mean,
        ClassificationFunction::Temp,
    ];
}

/// Strategy used to reduce a full acquisition set to its templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateSelectionFunction {
    None,
    MdistMin,
    MdistMax,
    Gmms,
    Dend,
    FuzzyCMeans,
}

impl TemplateSelectionFunction {
    pub const ALL: [TemplateSelectionFunction; 6] = [
        TemplateSelectionFunction::None,
        TemplateSelectionFunction::MdistMin,
        TemplateSelectionFunction::MdistMax,
        TemplateSelectionFunction::Gmms,
        TemplateSelectionFunction::Dend,
        TemplateSelectionFunction::FuzzyCMeans,
    ];
}

macro_rules! display_as_serde_name {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let name = serde_json::to_value(self)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_owned))
                    .unwrap_or_default();
                f.write_str(&name)
            }
        })*
    };
}

display_as_serde_name!(DistanceFunction, ClassificationFunction, TemplateSelectionFunction);

/// Classifier knobs. Changing them between sessions never corrupts an
/// enrollment set: shape differences surface as capturing errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Acquisitions to collect before templates are selected
    pub acquisition_set_size: usize,
    /// Acquisitions kept after selection
    pub template_set_size: usize,
    pub enable_template_selection: bool,
    pub template_selection_function: TemplateSelectionFunction,
    pub distance_function: DistanceFunction,
    pub classification_function: ClassificationFunction,
    pub used_sensors: BTreeSet<SensorType>,
    pub used_touch_properties: BTreeSet<TouchProperty>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            acquisition_set_size: 10,
            template_set_size: 7,
            enable_template_selection: true,
            template_selection_function: TemplateSelectionFunction::None,
            distance_function: DistanceFunction::Manhattan,
            classification_function: ClassificationFunction::Mean,
            used_sensors: SensorType::ALL.into_iter().collect(),
            used_touch_properties: TouchProperty::ALL.into_iter().collect(),
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.template_set_size == 0 {
            return Err(ConfigError::Invalid(
                "template_set_size must be at least 1".to_string(),
            ));
        }
        if self.acquisition_set_size < self.template_set_size {
            return Err(ConfigError::Invalid(format!(
                "acquisition_set_size ({}) must be >= template_set_size ({})",
                self.acquisition_set_size, self.template_set_size
            )));
        }
        Ok(())
    }

    pub fn uses_sensor(&self, sensor: SensorType) -> bool {
        self.used_sensors.contains(&sensor)
    }

    pub fn uses_touch_property(&self, property: TouchProperty) -> bool {
        self.used_touch_properties.contains(&property)
    }
}

/// Settings for offline parameter optimization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Step of the ROC threshold sweep
    pub threshold_increment: f64,
    /// Upper bound of the acquisition set size search
    pub max_acquisition_set_size: usize,
    /// Worker threads for candidate evaluation
    pub workers: usize,
    /// Ignore corpus files of control group participants
    pub skip_control_group: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            threshold_increment: 0.01,
            max_acquisition_set_size: 20,
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            skip_control_group: false,
        }
    }
}

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    /// Root for the enrollment store and audit statistics
    pub data_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("synheart-typing-auth");

        Self {
            classifier: ClassifierConfig::default(),
            optimizer: OptimizerConfig::default(),
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load and validate configuration from an explicit file.
    pub fn load_from_path(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.classifier.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("synheart-typing-auth")
            .join("config.json")
    }

    /// Directory holding one enrollment file per context and orientation.
    pub fn enrollment_path(&self) -> PathBuf {
        self.data_path.join("enrollment")
    }

    pub fn audit_path(&self) -> PathBuf {
        self.data_path.join("audit.json")
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Serialize error: {0}")]
    Serialize(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
