//! Risk assessment returned to the API layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Risk band for a default probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskBand {
    Low,
    Medium,
    High,
}

/// Credit decision attached to each band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    Approve,
    Review,
    Reject,
}

/// How much of the request was real data rather than defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataQuality {
    High,
    Medium,
    Low,
}

impl RiskBand {
    /// Map a probability to its band. Cut points are exclusive upper bounds.
    pub fn from_probability(probability: f64, thresholds: &PolicyThresholds) -> Self {
        if probability < thresholds.low_risk_below {
            RiskBand::Low
        } else if probability < thresholds.medium_risk_below {
            RiskBand::Medium
        } else {
            RiskBand::High
        }
    }

    pub fn recommendation(self) -> Recommendation {
        match self {
            RiskBand::Low => Recommendation::Approve,
            RiskBand::Medium => Recommendation::Review,
            RiskBand::High => Recommendation::Reject,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskBand::Low => "low",
            RiskBand::Medium => "medium",
            RiskBand::High => "high",
        }
    }
}

impl DataQuality {
    /// Grade a request by the share of schema fields that had to be synthesized.
    pub fn from_missing(missing: usize, expected: usize, thresholds: &PolicyThresholds) -> Self {
        if expected == 0 {
            return DataQuality::High;
        }

        let ratio = missing as f64 / expected as f64;
        if ratio <= thresholds.high_quality_max_missing {
            DataQuality::High
        } else if ratio <= thresholds.medium_quality_max_missing {
            DataQuality::Medium
        } else {
            DataQuality::Low
        }
    }
}

/// Cut points for the caller-side decision policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyThresholds {
    #[serde(default = "default_low_risk_below")]
    pub low_risk_below: f64,
    #[serde(default = "default_medium_risk_below")]
    pub medium_risk_below: f64,
    #[serde(default = "default_high_quality_max_missing")]
    pub high_quality_max_missing: f64,
    #[serde(default = "default_medium_quality_max_missing")]
    pub medium_quality_max_missing: f64,
    /// Denominator for the missing ratio. Schema length when unset.
    #[serde(default)]
    pub expected_feature_count: Option<usize>,
}

fn default_low_risk_below() -> f64 {
    0.08
}

fn default_medium_risk_below() -> f64 {
    0.15
}

fn default_high_quality_max_missing() -> f64 {
    0.20
}

fn default_medium_quality_max_missing() -> f64 {
    0.50
}

impl Default for PolicyThresholds {
    fn default() -> Self {
        Self {
            low_risk_below: default_low_risk_below(),
            medium_risk_below: default_medium_risk_below(),
            high_quality_max_missing: default_high_quality_max_missing(),
            medium_quality_max_missing: default_medium_quality_max_missing(),
            expected_feature_count: None,
        }
    }
}

/// Scoring reply for one applicant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub assessment_id: String,
    pub default_probability: f64,
    pub default_probability_pct: f64,
    pub risk_band: RiskBand,
    pub recommendation: Recommendation,
    pub data_quality: DataQuality,
    pub missing_features: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl RiskAssessment {
    /// Apply the decision policy to a model probability.
    pub fn new(
        probability: f64,
        missing_features: Vec<String>,
        schema_len: usize,
        thresholds: &PolicyThresholds,
    ) -> Self {
        let expected = thresholds.expected_feature_count.unwrap_or(schema_len);
        let risk_band = RiskBand::from_probability(probability, thresholds);

        Self {
            assessment_id: uuid::Uuid::new_v4().to_string(),
            default_probability: probability,
            default_probability_pct: (probability * 100.0 * 100.0).round() / 100.0,
            risk_band,
            recommendation: risk_band.recommendation(),
            data_quality: DataQuality::from_missing(missing_features.len(), expected, thresholds),
            missing_features,
            timestamp: Utc::now(),
        }
    }
}
