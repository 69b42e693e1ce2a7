//! Feature layout shared by capture, scoring and template selection.
//!
//! Every acquisition is reduced to a [`FeatureSet`]: one [`FeatureMatrix`]
//! per [`Feature`], always in the order returned by [`Feature::layout`].
//! That ordering is the array index contract between all components, so a
//! feature that is disabled or unavailable keeps its slot with zero samples.

use crate::capture::types::SensorType;
use serde::{Deserialize, Serialize};

/// Touch-derived measurement categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchProperty {
    /// Gap between two consecutive key presses
    DownDown,
    /// Hold time of a single key press
    DownUp,
    Size,
    Orientation,
    Pressure,
    /// Release coordinates (two values per sample)
    Position,
}

impl TouchProperty {
    pub const ALL: [TouchProperty; 6] = [
        TouchProperty::DownDown,
        TouchProperty::DownUp,
        TouchProperty::Size,
        TouchProperty::Orientation,
        TouchProperty::Pressure,
        TouchProperty::Position,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TouchProperty::DownDown => "down_down",
            TouchProperty::DownUp => "down_up",
            TouchProperty::Size => "size",
            TouchProperty::Orientation => "orientation",
            TouchProperty::Pressure => "pressure",
            TouchProperty::Position => "position",
        }
    }
}

/// One slot of the global feature layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Touch(TouchProperty),
    Sensor(SensorType),
}

/// Number of slots in the global layout.
pub const FEATURE_COUNT: usize = TouchProperty::ALL.len() + SensorType::ALL.len();

impl Feature {
    /// The fixed feature ordering: touch properties first, then sensors.
    pub fn layout() -> Vec<Feature> {
        TouchProperty::ALL
            .iter()
            .map(|&p| Feature::Touch(p))
            .chain(SensorType::ALL.iter().map(|&s| Feature::Sensor(s)))
            .collect()
    }

    /// Position of this feature in the layout.
    pub fn index(&self) -> usize {
        match self {
            Feature::Touch(p) => TouchProperty::ALL
                .iter()
                .position(|q| q == p)
                .unwrap_or_default(),
            Feature::Sensor(s) => {
                TouchProperty::ALL.len()
                    + SensorType::ALL
                        .iter()
                        .position(|t| t == s)
                        .unwrap_or_default()
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Feature::Touch(p) => p.name(),
            Feature::Sensor(s) => s.name(),
        }
    }
}

/// Samples of one feature: `samples × values`.
pub type FeatureMatrix = Vec<Vec<f64>>;

/// All features of one acquisition, indexed by [`Feature::index`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    #[serde(with = "crate::core::float::matrices")]
    features: Vec<FeatureMatrix>,
}

impl FeatureSet {
    /// An empty feature set with every slot of the layout present.
    pub fn empty() -> Self {
        Self {
            features: vec![Vec::new(); FEATURE_COUNT],
        }
    }

    /// Wrap raw matrices. The caller is responsible for the layout ordering.
    pub fn from_matrices(features: Vec<FeatureMatrix>) -> Self {
        Self { features }
    }

    pub fn push(&mut self, feature: Feature, sample: Vec<f64>) {
        let index = feature.index();
        if let Some(matrix) = self.features.get_mut(index) {
            matrix.push(sample);
        }
    }

    pub fn get(&self, index: usize) -> Option<&FeatureMatrix> {
        self.features.get(index)
    }

    pub fn feature(&self, feature: Feature) -> Option<&FeatureMatrix> {
        self.get(feature.index())
    }

    /// Number of feature slots.
    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    /// Per-feature sample counts, used to compare shapes.
    pub fn shape(&self) -> Vec<usize> {
        self.features.iter().map(|m| m.len()).collect()
    }

    pub fn matrices(&self) -> &[FeatureMatrix] {
        &self.features
    }

    /// True if no feature holds any sample.
    pub fn is_empty(&self) -> bool {
        self.features.iter().all(|m| m.is_empty())
    }

    pub fn clear(&mut self) {
        for matrix in &mut self.features {
            matrix.clear();
        }
    }

    /// Concatenate every value of every sample into one point.
    ///
    /// Features listed in `skip` are left out.
    pub fn flatten(&self, skip: &[bool]) -> Vec<f64> {
        self.features
            .iter()
            .enumerate()
            .filter(|(i, _)| !skip.get(*i).copied().unwrap_or(false))
            .flat_map(|(_, m)| m.iter().flat_map(|s| s.iter().copied()))
            .collect()
    }
}

impl Default for FeatureSet {
    fn default() -> Self {
        Self::empty()
    }
}
