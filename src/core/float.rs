//! JSON encoding for stored values that may be non-finite.
//!
//! JSON numbers cannot hold NaN or the infinities: serde_json writes them as
//! `null` and then refuses to read `null` back as `f64`. Stored values keep
//! finite numbers as plain JSON numbers and write the others as the strings
//! `"NaN"`, `"inf"` and `"-inf"`. A `null` left by an older writer reads back
//! as NaN.

use super::features::FeatureMatrix;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// An `f64` that survives a JSON round trip.
#[derive(Debug, Clone, Copy)]
pub struct StoredFloat(pub f64);

impl From<f64> for StoredFloat {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

impl From<StoredFloat> for f64 {
    fn from(value: StoredFloat) -> Self {
        value.0
    }
}

impl Serialize for StoredFloat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let value = self.0;
        if value.is_finite() {
            serializer.serialize_f64(value)
        } else if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value > 0.0 {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }
}

struct StoredFloatVisitor;

impl<'de> Visitor<'de> for StoredFloatVisitor {
    type Value = StoredFloat;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a number, null, or one of \"NaN\", \"inf\", \"-inf\"")
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<StoredFloat, E> {
        Ok(StoredFloat(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<StoredFloat, E> {
        Ok(StoredFloat(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<StoredFloat, E> {
        Ok(StoredFloat(v as f64))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<StoredFloat, E> {
        match v {
            "NaN" => Ok(StoredFloat(f64::NAN)),
            "inf" => Ok(StoredFloat(f64::INFINITY)),
            "-inf" => Ok(StoredFloat(f64::NEG_INFINITY)),
            other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
        }
    }

    fn visit_unit<E: de::Error>(self) -> Result<StoredFloat, E> {
        Ok(StoredFloat(f64::NAN))
    }

    fn visit_none<E: de::Error>(self) -> Result<StoredFloat, E> {
        Ok(StoredFloat(f64::NAN))
    }
}

impl<'de> Deserialize<'de> for StoredFloat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(StoredFloatVisitor)
    }
}

/// `#[serde(with)]` adapter for a list of feature matrices.
pub mod matrices {
    use super::*;

    pub fn serialize<S: Serializer>(
        features: &[FeatureMatrix],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(features.iter().map(|matrix| {
            matrix
                .iter()
                .map(|sample| sample.iter().copied().map(StoredFloat).collect::<Vec<_>>())
                .collect::<Vec<_>>()
        }))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<FeatureMatrix>, D::Error> {
        let stored = Vec::<Vec<Vec<StoredFloat>>>::deserialize(deserializer)?;
        Ok(stored
            .into_iter()
            .map(|matrix| {
                matrix
                    .into_iter()
                    .map(|sample| sample.into_iter().map(f64::from).collect())
                    .collect()
            })
            .collect())
    }
}
