//! Type definitions shared by the scoring service and its callers

pub mod assessment;
pub mod feature;

pub use assessment::{DataQuality, PolicyThresholds, Recommendation, RiskAssessment, RiskBand};
pub use feature::{FeatureMap, FeatureValue, ScoreRequest};
