//! Feature schema recovered from the model's schema artifact.
//!
//! The artifact is a versioned JSON manifest shipped next to the ONNX model.
//! It mirrors the fitted pipeline: a list of named steps, where the
//! `preprocess` step is a column transformer whose entries name the raw
//! columns they consume. Field descriptors optionally pin each column's kind
//! and default so imputation does not depend on naming conventions alone.

use crate::error::{Result, RiskError};
use crate::features::{default_for, infer_kind};
use crate::types::FeatureValue;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info};

/// Name of the pipeline step holding the column transformer
pub const PREPROCESS_STEP: &str = "preprocess";

/// Highest manifest version this build understands
pub const SUPPORTED_VERSION: u32 = 1;

/// Parsed `schema.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaArtifact {
    pub version: u32,
    pub steps: Vec<PipelineStep>,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

/// One named step of the fitted pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStep {
    pub name: String,
    #[serde(flatten)]
    pub spec: StepSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepSpec {
    ColumnTransformer { transformers: Vec<TransformerEntry> },
    Estimator {
        #[serde(default = "default_positive_class")]
        positive_class: i64,
    },
}

fn default_positive_class() -> i64 {
    1
}

/// A transform entry and the columns it was fitted on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformerEntry {
    pub name: String,
    #[serde(default)]
    pub columns: Option<ColumnSpec>,
}

/// Column specification of a transform entry.
///
/// Only explicit name lists can be recovered; selectors were resolved against
/// the training frame and are not reproducible here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnSpec {
    Names(Vec<String>),
    Selector { selector: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Numeric,
    Categorical,
}

/// Optional per-field typing and default shipped with the artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(default)]
    pub kind: Option<FieldKind>,
    #[serde(default)]
    pub default: Option<FeatureValue>,
    #[serde(default)]
    pub rationale: Option<String>,
}

impl SchemaArtifact {
    /// Load and parse a schema artifact from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(RiskError::ArtifactNotFound {
                path: path.to_path_buf(),
            });
        }

        let raw = std::fs::read_to_string(path)?;
        let artifact: SchemaArtifact = serde_json::from_str(&raw)?;

        if artifact.version == 0 || artifact.version > SUPPORTED_VERSION {
            return Err(RiskError::InvalidArtifact(format!(
                "unsupported schema version {} (max {})",
                artifact.version, SUPPORTED_VERSION
            )));
        }

        info!(path = %path.display(), version = artifact.version, "Schema artifact loaded");
        Ok(artifact)
    }

    fn step(&self, name: &str) -> Result<&PipelineStep> {
        self.steps
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| RiskError::StageNotFound(name.to_string()))
    }

    /// Positive class label declared by the estimator step, 1 if absent
    pub fn positive_class(&self) -> i64 {
        self.steps
            .iter()
            .find_map(|s| match s.spec {
                StepSpec::Estimator { positive_class } => Some(positive_class),
                _ => None,
            })
            .unwrap_or(1)
    }
}

/// Ordered, deduplicated raw column names consumed by the preprocess step.
pub fn extract_raw_features(artifact: &SchemaArtifact) -> Result<Vec<String>> {
    let step = artifact.step(PREPROCESS_STEP)?;
    let transformers = match &step.spec {
        StepSpec::ColumnTransformer { transformers } => transformers,
        StepSpec::Estimator { .. } => {
            return Err(RiskError::InvalidArtifact(format!(
                "step '{}' is not a column transformer",
                PREPROCESS_STEP
            )))
        }
    };

    let mut seen = HashSet::new();
    let mut ordered = Vec::new();

    for entry in transformers {
        match &entry.columns {
            Some(ColumnSpec::Names(names)) => {
                for name in names {
                    if seen.insert(name.clone()) {
                        ordered.push(name.clone());
                    }
                }
            }
            Some(ColumnSpec::Selector { selector }) => {
                debug!(transformer = %entry.name, selector = %selector, "Skipping derived column selector");
            }
            None => {
                debug!(transformer = %entry.name, "Skipping transformer without columns");
            }
        }
    }

    Ok(ordered)
}

/// A resolved schema field
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaField {
    pub name: String,
    pub kind: FieldKind,
    /// Value synthesized when the caller omits this field
    pub default: FeatureValue,
    pub rationale: String,
}

impl SchemaField {
    /// Resolve a field from its name alone using naming conventions
    pub fn inferred(name: &str) -> Self {
        let (default, rationale) = default_for(name);
        Self {
            name: name.to_string(),
            kind: infer_kind(name),
            default,
            rationale: rationale.to_string(),
        }
    }
}

/// Ordered feature schema the model expects
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSchema {
    fields: Vec<SchemaField>,
    positive_class: i64,
}

impl FeatureSchema {
    /// Build the schema from an artifact, resolving the default table.
    ///
    /// An explicit descriptor default wins; a declared kind that differs from
    /// the inferred one falls back to that kind's sentinel; otherwise naming
    /// conventions apply.
    pub fn from_artifact(artifact: &SchemaArtifact) -> Result<Self> {
        let names = extract_raw_features(artifact)?;
        let descriptors: HashMap<&str, &FieldDescriptor> = artifact
            .fields
            .iter()
            .map(|d| (d.name.as_str(), d))
            .collect();

        let fields = names
            .iter()
            .map(|name| {
                let mut field = SchemaField::inferred(name);
                if let Some(desc) = descriptors.get(name.as_str()) {
                    if let Some(kind) = desc.kind.filter(|k| *k != field.kind) {
                        let (default, rationale) = match kind {
                            FieldKind::Categorical => (FeatureValue::unknown(), "declared categorical"),
                            FieldKind::Numeric => (FeatureValue::Number(0.0), "declared numeric"),
                        };
                        field.kind = kind;
                        field.default = default;
                        field.rationale = rationale.to_string();
                    }
                    if let Some(default) = &desc.default {
                        field.default = default.clone();
                        field.rationale = desc
                            .rationale
                            .clone()
                            .unwrap_or_else(|| "declared in schema artifact".to_string());
                    }
                }
                field
            })
            .collect();

        Ok(Self {
            fields,
            positive_class: artifact.positive_class(),
        })
    }

    /// Load `schema.json` and resolve it
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let artifact = SchemaArtifact::load(path)?;
        Self::from_artifact(&artifact)
    }

    /// Build a schema from bare names, duplicates dropped
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        let mut seen = HashSet::new();
        let fields = names
            .iter()
            .map(|n| n.as_ref())
            .filter(|n| seen.insert(n.to_string()))
            .map(SchemaField::inferred)
            .collect();
        Self {
            fields,
            positive_class: 1,
        }
    }

    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn positive_class(&self) -> i64 {
        self.positive_class
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTIFACT: &str = r#"{
        "version": 1,
        "steps": [
            {"name": "preprocess", "kind": "column_transformer", "transformers": [
                {"name": "num", "columns": ["ext_source_2", "amt_credit", "days_birth"]},
                {"name": "cat", "columns": ["name_contract_type", "flag_own_car", "amt_credit"]},
                {"name": "derived", "columns": {"selector": "dtype_include_object"}},
                {"name": "remainder"}
            ]},
            {"name": "model", "kind": "estimator"}
        ],
        "fields": [
            {"name": "flag_own_car", "kind": "categorical", "default": "N", "rationale": "most frequent"}
        ]
    }"#;

    fn artifact() -> SchemaArtifact {
        serde_json::from_str(ARTIFACT).unwrap()
    }

    #[test]
    fn test_extract_keeps_order_and_dedups() {
        let names = extract_raw_features(&artifact()).unwrap();
        assert_eq!(
            names,
            vec![
                "ext_source_2",
                "amt_credit",
                "days_birth",
                "name_contract_type",
                "flag_own_car"
            ]
        );
    }

    #[test]
    fn test_extract_is_idempotent() {
        let a = artifact();
        assert_eq!(extract_raw_features(&a).unwrap(), extract_raw_features(&a).unwrap());
    }

    #[test]
    fn test_missing_preprocess_step() {
        let mut a = artifact();
        a.steps.retain(|s| s.name != PREPROCESS_STEP);

        match extract_raw_features(&a) {
            Err(RiskError::StageNotFound(name)) => assert_eq!(name, "preprocess"),
            other => panic!("expected StageNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_preprocess_must_be_column_transformer() {
        let mut a = artifact();
        a.steps[0].spec = StepSpec::Estimator { positive_class: 1 };
        assert!(matches!(
            extract_raw_features(&a),
            Err(RiskError::InvalidArtifact(_))
        ));
    }

    #[test]
    fn test_descriptor_overrides_heuristics() {
        let schema = FeatureSchema::from_artifact(&artifact()).unwrap();

        let flag = schema.get("flag_own_car").unwrap();
        assert_eq!(flag.kind, FieldKind::Categorical);
        assert_eq!(flag.default, FeatureValue::Text("N".to_string()));
        assert_eq!(flag.rationale, "most frequent");

        let contract = schema.get("name_contract_type").unwrap();
        assert_eq!(contract.kind, FieldKind::Categorical);
        assert_eq!(contract.default, FeatureValue::unknown());

        let credit = schema.get("amt_credit").unwrap();
        assert_eq!(credit.kind, FieldKind::Numeric);
        assert_eq!(credit.default, FeatureValue::Number(0.0));
        assert_eq!(schema.positive_class(), 1);
    }

    #[test]
    fn test_declared_numeric_overrides_categorical_name() {
        let mut a = artifact();
        a.steps[0] = serde_json::from_str(
            r#"{"name": "preprocess", "kind": "column_transformer", "transformers": [
                {"name": "num", "columns": ["credit_type", "name_score"]}
            ]}"#,
        )
        .unwrap();
        a.fields = serde_json::from_str(
            r#"[{"name": "credit_type", "kind": "numeric"},
                {"name": "name_score", "kind": "numeric", "default": 5}]"#,
        )
        .unwrap();

        let schema = FeatureSchema::from_artifact(&a).unwrap();

        let credit = schema.get("credit_type").unwrap();
        assert_eq!(credit.kind, FieldKind::Numeric);
        assert_eq!(credit.default, FeatureValue::Number(0.0));
        assert_eq!(schema.get("name_score").unwrap().default, FeatureValue::Number(5.0));

        let (aligned, missing) = crate::features::align(&Default::default(), &schema);
        assert_eq!(missing, vec!["credit_type", "name_score"]);
        assert!(crate::models::ModelRow::from_aligned(&aligned, &schema).is_ok());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");

        assert!(matches!(
            FeatureSchema::load(&path),
            Err(RiskError::ArtifactNotFound { .. })
        ));
    }

    #[test]
    fn test_load_rejects_unknown_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        std::fs::write(&path, ARTIFACT.replace("\"version\": 1", "\"version\": 7")).unwrap();

        assert!(matches!(
            SchemaArtifact::load(&path),
            Err(RiskError::InvalidArtifact(_))
        ));
    }

    #[test]
    fn test_shipped_artifact() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("models/schema.json");
        let schema = FeatureSchema::load(path).unwrap();

        assert_eq!(schema.len(), 15);
        assert_eq!(schema.names()[0], "amt_income_total");
        assert_eq!(
            schema.get("bureau_loan_count").unwrap().default,
            FeatureValue::Number(0.0)
        );
        assert_eq!(schema.get("name_income_type").unwrap().default, FeatureValue::unknown());
    }

    #[test]
    fn test_from_names_dedups() {
        let schema = FeatureSchema::from_names(&["a", "b", "a"]);
        assert_eq!(schema.names(), vec!["a", "b"]);
    }
}
