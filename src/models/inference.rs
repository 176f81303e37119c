//! Default-probability inference

use crate::error::{Result, RiskError};
use crate::features::align;
use crate::models::row::{Cell, ModelRow};
use crate::schema::FeatureSchema;
use crate::types::FeatureMap;
use ort::memory::Allocator;
use ort::session::{Session, SessionInputValue};
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, Tensor};
use std::sync::RwLock;
use tracing::debug;

/// Anything that can turn a model row into a positive-class probability
pub trait ProbabilityModel: Send + Sync {
    fn name(&self) -> &str;

    /// Probability of default for one row, in [0, 1]
    fn predict_proba(&self, row: &ModelRow) -> Result<f64>;
}

/// Probability plus the fields that had to be synthesized
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreOutcome {
    pub probability: f64,
    pub missing: Vec<String>,
}

/// Schema and model loaded from the same artifact directory
pub struct ModelBundle {
    pub schema: FeatureSchema,
    pub model: Box<dyn ProbabilityModel>,
}

impl ModelBundle {
    pub fn new(schema: FeatureSchema, model: Box<dyn ProbabilityModel>) -> Self {
        Self { schema, model }
    }

    /// Align, coerce and score one applicant
    pub fn score(&self, features: &FeatureMap) -> Result<ScoreOutcome> {
        let (aligned, missing) = align(features, &self.schema);
        let row = ModelRow::from_aligned(&aligned, &self.schema)?;
        let probability = self.model.predict_proba(&row)?.clamp(0.0, 1.0);

        debug!(
            model = %self.model.name(),
            probability = probability,
            missing = missing.len(),
            "Scored applicant"
        );

        Ok(ScoreOutcome {
            probability,
            missing,
        })
    }
}

/// ONNX classifier exported with one `[1, 1]` input per raw column
pub struct OnnxModel {
    name: String,
    /// `run` needs `&mut Session`
    session: RwLock<Session>,
    output_name: String,
    positive_class: i64,
}

impl OnnxModel {
    pub fn new(name: &str, session: Session, output_name: String, positive_class: i64) -> Self {
        Self {
            name: name.to_string(),
            session: RwLock::new(session),
            output_name,
            positive_class,
        }
    }

    fn build_inputs(row: &ModelRow) -> Result<Vec<(String, SessionInputValue<'static>)>> {
        let mut inputs = Vec::with_capacity(row.len());
        for (name, cell) in row.cells() {
            let value: SessionInputValue<'static> = match cell {
                Cell::Float(v) => Tensor::from_array((vec![1_i64, 1], vec![*v]))?
                    .into_dyn()
                    .into(),
                Cell::Text(s) => Tensor::from_string_array((vec![1_i64, 1], &[s.clone()][..]))?
                    .into_dyn()
                    .into(),
            };
            inputs.push((name.clone(), value));
        }
        Ok(inputs)
    }

    /// Pull the positive-class probability from the named output, falling
    /// back to any non-label output. Handles plain `[batch, classes]` tensors
    /// and `seq(map(int64, float))` from zipmap exports.
    fn extract_probability(&self, outputs: &ort::session::SessionOutputs) -> Result<f64> {
        if let Some(output) = outputs.get(self.output_name.as_str()) {
            if let Some(prob) = self.probability_from_value(&output) {
                return Ok(prob);
            }
        }

        for (name, output) in outputs.iter() {
            if name.contains("label") {
                continue;
            }
            if let Some(prob) = self.probability_from_value(&output) {
                debug!(model = %self.name, output = %name, prob = prob, "Extracted from fallback output");
                return Ok(prob);
            }
        }

        Err(RiskError::Inference(format!(
            "model '{}' produced no usable probability output",
            self.name
        )))
    }

    fn probability_from_value(&self, output: &ort::value::DynValue) -> Option<f64> {
        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            let dims: Vec<i64> = shape.iter().copied().collect();
            return probability_from_tensor(&dims, data, self.positive_class);
        }

        if DynSequenceValueType::can_downcast(&output.dtype()) {
            return self.probability_from_sequence_map(output).ok();
        }

        None
    }

    fn probability_from_sequence_map(&self, output: &ort::value::DynValue) -> Result<f64> {
        let allocator = Allocator::default();
        let sequence = output
            .downcast_ref::<DynSequenceValueType>()
            .map_err(|e| RiskError::Inference(format!("output is not a sequence: {}", e)))?;

        let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;
        let first = maps
            .first()
            .ok_or_else(|| RiskError::Inference("empty probability sequence".to_string()))?;

        let pairs = first.try_extract_key_values::<i64, f32>()?;
        probability_from_class_map(&pairs, self.positive_class)
    }
}

/// Positive-class probability from a `[batch, classes]` or `[classes]`
/// tensor. A single class column is taken as the positive probability.
pub(crate) fn probability_from_tensor(dims: &[i64], data: &[f32], positive_class: i64) -> Option<f64> {
    let classes = match dims {
        [_, c] => *c,
        [c] => *c,
        _ => return None,
    };

    if classes == 1 {
        return data.first().map(|&v| v as f64);
    }

    let index = usize::try_from(positive_class).ok().filter(|&i| (i as i64) < classes)?;
    data.get(index).map(|&v| v as f64)
}

/// Positive-class probability from one `map(int64, float)` of a zipmap output
pub(crate) fn probability_from_class_map(pairs: &[(i64, f32)], positive_class: i64) -> Result<f64> {
    pairs
        .iter()
        .find(|(class, _)| *class == positive_class)
        .map(|(_, p)| *p as f64)
        .ok_or_else(|| RiskError::Inference(format!("class {} missing from output", positive_class)))
}

impl ProbabilityModel for OnnxModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict_proba(&self, row: &ModelRow) -> Result<f64> {
        let inputs = Self::build_inputs(row)?;

        let mut session = self
            .session
            .write()
            .map_err(|e| RiskError::Inference(format!("lock poisoned: {}", e)))?;
        let outputs = session.run(inputs)?;

        self.extract_probability(&outputs)
    }
}
