//! Classifier core.
//!
//! This module contains:
//! - The global feature layout and feature matrices
//! - Distance and variability functions
//! - Authentication scoring
//! - Template selection (MDIST, GMMS, dendrogram cut, fuzzy C-means)

pub mod dendrogram;
pub mod distance;
pub mod features;
pub mod float;
pub mod fuzzy;
pub mod scorer;
pub mod selection;
pub mod variability;

// Re-export commonly used types
pub use distance::{distance, feature_distance};
pub use features::{Feature, FeatureMatrix, FeatureSet, TouchProperty, FEATURE_COUNT};
pub use scorer::{AuthenticationScorer, Score};
pub use selection::{distance_matrix, TemplateSelector};
pub use variability::variability;
