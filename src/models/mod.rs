//! Model loading and inference

pub mod inference;
pub mod loader;
pub mod row;

pub use inference::{ModelBundle, OnnxModel, ProbabilityModel, ScoreOutcome};
pub use loader::{BundleLoader, ModelLoader};
pub use row::{Cell, ModelRow};
