//! Configuration management for the scoring service and batch jobs

use crate::cleaning::DAYS_PLACEHOLDER;
use crate::types::PolicyThresholds;
use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub models: ModelsConfig,
    #[serde(default)]
    pub policy: PolicyThresholds,
    #[serde(default)]
    pub etl: EtlConfig,
    #[serde(default)]
    pub cleaning: CleaningConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject scoring requests arrive on; replies go to the message reply subject
    pub request_subject: String,
    /// Queue group shared by worker replicas so each request is scored once.
    /// Unset means a plain subscription.
    #[serde(default = "default_queue_group")]
    pub queue_group: Option<String>,
}

fn default_queue_group() -> Option<String> {
    Some("credit-scoring".to_string())
}

/// Model artifact locations
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Directory holding the model and its schema artifact
    pub models_dir: String,
    #[serde(default = "default_model_file")]
    pub model_file: String,
    #[serde(default = "default_schema_file")]
    pub schema_file: String,
    /// Number of threads for ONNX inference (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_model_file() -> String {
    "model.onnx".to_string()
}

fn default_schema_file() -> String {
    "schema.json".to_string()
}

fn default_onnx_threads() -> usize {
    1
}

/// Batch job locations
#[derive(Debug, Clone, Deserialize)]
pub struct EtlConfig {
    #[serde(default = "default_raw_dir")]
    pub raw_dir: String,
    #[serde(default = "default_processed_dir")]
    pub processed_dir: String,
}

fn default_raw_dir() -> String {
    "data/raw".to_string()
}

fn default_processed_dir() -> String {
    "data/processed".to_string()
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            raw_dir: default_raw_dir(),
            processed_dir: default_processed_dir(),
        }
    }
}

/// Cleaning thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct CleaningConfig {
    #[serde(default = "default_placeholder")]
    pub placeholder: f64,
    #[serde(default = "default_min_age")]
    pub min_age: f64,
    #[serde(default = "default_max_age")]
    pub max_age: f64,
    #[serde(default = "default_lower_quantile")]
    pub lower_quantile: f64,
    #[serde(default = "default_upper_quantile")]
    pub upper_quantile: f64,
}

fn default_placeholder() -> f64 {
    DAYS_PLACEHOLDER
}

fn default_min_age() -> f64 {
    18.0
}

fn default_max_age() -> f64 {
    100.0
}

fn default_lower_quantile() -> f64 {
    0.01
}

fn default_upper_quantile() -> f64 {
    0.99
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            placeholder: default_placeholder(),
            min_age: default_min_age(),
            max_age: default_max_age(),
            lower_quantile: default_lower_quantile(),
            upper_quantile: default_upper_quantile(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl LoggingConfig {
    /// Install the global subscriber for a binary and the library.
    /// `RUST_LOG` overrides the configured level.
    pub fn init(&self, crate_name: &str) -> Result<()> {
        let mut directives = format!("credit_risk_scoring={}", self.level);
        if crate_name != "credit_risk_scoring" {
            directives.push_str(&format!(",{}={}", crate_name, self.level));
        }

        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .or_else(|_| tracing_subscriber::EnvFilter::try_new(directives))?;

        let builder = tracing_subscriber::fmt().with_env_filter(filter);
        if self.format == "json" {
            builder.json().init();
        } else {
            builder.pretty().init();
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                request_subject: "credit.score".to_string(),
                queue_group: default_queue_group(),
            },
            models: ModelsConfig {
                models_dir: "models".to_string(),
                model_file: default_model_file(),
                schema_file: default_schema_file(),
                onnx_threads: 1,
            },
            policy: PolicyThresholds::default(),
            etl: EtlConfig::default(),
            cleaning: CleaningConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
            },
        }
    }
}
