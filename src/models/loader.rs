//! Model artifact loader

use crate::config::ModelsConfig;
use crate::error::{Result, RiskError};
use crate::models::inference::{ModelBundle, OnnxModel};
use crate::schema::SchemaArtifact;
use crate::schema::FeatureSchema;
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::{Path, PathBuf};
use tracing::info;

/// Source of model bundles for the scoring service
pub trait BundleLoader: Send + Sync {
    fn load(&self) -> Result<ModelBundle>;
}

/// Loads `model.onnx` and its `schema.json` from a models directory
pub struct ModelLoader {
    model_path: PathBuf,
    schema_path: PathBuf,
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    pub fn new<P: AsRef<Path>>(models_dir: P, model_file: &str, schema_file: &str) -> Self {
        let dir = models_dir.as_ref();
        Self {
            model_path: dir.join(model_file),
            schema_path: dir.join(schema_file),
            onnx_threads: 1,
        }
    }

    pub fn from_config(config: &ModelsConfig) -> Self {
        Self::new(&config.models_dir, &config.model_file, &config.schema_file)
            .with_threads(config.onnx_threads)
    }

    pub fn with_threads(mut self, onnx_threads: usize) -> Self {
        self.onnx_threads = onnx_threads.max(1);
        self
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn schema_path(&self) -> &Path {
        &self.schema_path
    }

    fn load_session(&self) -> Result<(Session, String)> {
        let path = &self.model_path;
        if !path.exists() {
            return Err(RiskError::ArtifactNotFound { path: path.clone() });
        }

        ort::init().commit()?;
        info!(path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)?;

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .or_else(|| session.outputs.last())
            .map(|o| o.name.clone())
            .unwrap_or_else(|| "probabilities".to_string());

        info!(
            inputs = session.inputs.len(),
            output = %output_name,
            "Model loaded successfully"
        );

        Ok((session, output_name))
    }
}

impl BundleLoader for ModelLoader {
    fn load(&self) -> Result<ModelBundle> {
        let artifact = SchemaArtifact::load(&self.schema_path)?;
        let schema = FeatureSchema::from_artifact(&artifact)?;
        let (session, output_name) = self.load_session()?;

        let missing_inputs: Vec<&str> = schema
            .names()
            .into_iter()
            .filter(|name| !session.inputs.iter().any(|i| i.name == *name))
            .collect();
        if !missing_inputs.is_empty() {
            return Err(RiskError::InvalidArtifact(format!(
                "model has no inputs for schema fields {:?}",
                missing_inputs
            )));
        }

        info!(features = schema.len(), "Schema resolved");

        let name = self
            .model_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("model")
            .to_string();
        let model = OnnxModel::new(&name, session, output_name, schema.positive_class());

        Ok(ModelBundle::new(schema, Box::new(model)))
    }
}
