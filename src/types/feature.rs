//! Feature values and scoring requests

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single scalar supplied for a feature.
///
/// Deserializes straight from a JSON scalar, so a request body like
/// `{"ext_source_2": 0.61, "name_contract_type": "Cash loans"}` needs no schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FeatureValue {
    /// Categorical placeholder used for unknown labels
    pub const UNKNOWN: &'static str = "Unknown";

    pub fn unknown() -> Self {
        FeatureValue::Text(Self::UNKNOWN.to_string())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            FeatureValue::Null => "null",
            FeatureValue::Bool(_) => "bool",
            FeatureValue::Number(_) => "number",
            FeatureValue::Text(_) => "string",
        }
    }
}

impl From<f64> for FeatureValue {
    fn from(v: f64) -> Self {
        FeatureValue::Number(v)
    }
}

impl From<i64> for FeatureValue {
    fn from(v: i64) -> Self {
        FeatureValue::Number(v as f64)
    }
}

impl From<bool> for FeatureValue {
    fn from(v: bool) -> Self {
        FeatureValue::Bool(v)
    }
}

impl From<&str> for FeatureValue {
    fn from(v: &str) -> Self {
        FeatureValue::Text(v.to_string())
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Null => write!(f, "null"),
            FeatureValue::Bool(b) => write!(f, "{}", b),
            FeatureValue::Number(n) => write!(f, "{}", n),
            FeatureValue::Text(s) => write!(f, "{:?}", s),
        }
    }
}

/// Feature name to value. Ordered so logs and replies are stable.
pub type FeatureMap = BTreeMap<String, FeatureValue>;

/// Scoring request as received from the API layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRequest {
    /// Applicant features; any subset of the model schema, unknown keys allowed
    pub features: FeatureMap,
}

impl ScoreRequest {
    pub fn new(features: FeatureMap) -> Self {
        Self { features }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_deserializes_mixed_scalars() {
        let json = r#"{"features": {
            "ext_source_2": 0.61,
            "cnt_children": 2,
            "name_contract_type": "Cash loans",
            "flag_own_car": true,
            "days_employed": null
        }}"#;

        let req: ScoreRequest = serde_json::from_str(json).unwrap();

        assert_eq!(req.features["ext_source_2"], FeatureValue::Number(0.61));
        assert_eq!(req.features["cnt_children"], FeatureValue::Number(2.0));
        assert_eq!(
            req.features["name_contract_type"],
            FeatureValue::Text("Cash loans".to_string())
        );
        assert_eq!(req.features["flag_own_car"], FeatureValue::Bool(true));
        assert_eq!(req.features["days_employed"], FeatureValue::Null);
    }

    #[test]
    fn test_missing_features_key_is_rejected() {
        let result: Result<ScoreRequest, _> = serde_json::from_str(r#"{"ext_source_2": 0.5}"#);
        assert!(result.is_err());
    }
}
