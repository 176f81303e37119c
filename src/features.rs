//! Feature alignment against the model schema.
//!
//! Callers send whatever subset of applicant features they have. Alignment
//! fills every schema field the caller left out and reports which ones were
//! synthesized, so the caller can grade data quality.

use crate::schema::{FeatureSchema, FieldKind};
use crate::types::{FeatureMap, FeatureValue};

fn is_categorical_name(lower: &str) -> bool {
    lower.starts_with("name_") || lower.ends_with("_type")
}

fn is_indicator_name(lower: &str) -> bool {
    lower.starts_with("flag_") || lower.starts_with("is_")
}

/// Default value and rationale for a field known only by name.
///
/// Case-insensitive, first match wins.
pub fn default_for(name: &str) -> (FeatureValue, &'static str) {
    let lower = name.to_lowercase();

    if is_categorical_name(&lower) {
        (FeatureValue::unknown(), "categorical placeholder")
    } else if is_indicator_name(&lower) {
        (FeatureValue::Number(0.0), "indicator defaults to false")
    } else {
        (FeatureValue::Number(0.0), "numeric placeholder")
    }
}

/// Column kind implied by naming conventions
pub fn infer_kind(name: &str) -> FieldKind {
    if is_categorical_name(&name.to_lowercase()) {
        FieldKind::Categorical
    } else {
        FieldKind::Numeric
    }
}

/// Complete `features` against `schema`.
///
/// Present values pass through untouched, extra keys are kept. Returns the
/// filled map and the schema fields that were synthesized, in schema order.
pub fn align(features: &FeatureMap, schema: &FeatureSchema) -> (FeatureMap, Vec<String>) {
    let mut filled = features.clone();
    let mut missing = Vec::new();

    for field in schema.fields() {
        if filled.contains_key(&field.name) {
            continue;
        }
        missing.push(field.name.clone());
        filled.insert(field.name.clone(), field.default.clone());
    }

    (filled, missing)
}
