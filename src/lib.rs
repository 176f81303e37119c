//! Credit Risk Scoring Library
//!
//! Scores loan applicants against a trained default model, tolerating
//! partial inputs, and prepares the auxiliary tables the model is trained on.

pub mod cleaning;
pub mod config;
pub mod consumer;
pub mod error;
pub mod etl;
pub mod features;
pub mod frame;
pub mod metrics;
pub mod models;
pub mod producer;
pub mod schema;
pub mod service;
pub mod types;

pub use config::AppConfig;
pub use consumer::RequestConsumer;
pub use error::{Result, RiskError};
pub use features::align;
pub use models::{ModelBundle, ModelLoader};
pub use producer::ReplyProducer;
pub use schema::{extract_raw_features, FeatureSchema, SchemaArtifact};
pub use service::ScoringService;
pub use types::{FeatureMap, FeatureValue, RiskAssessment, ScoreRequest};
