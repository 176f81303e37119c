//! Scoring service owning the loaded model bundle.
//!
//! The bundle is loaded on first use and cached for the life of the service.
//! `reload` swaps in a fresh bundle atomically; requests already holding the
//! old one finish against it.

use crate::error::Result;
use crate::models::{BundleLoader, ModelBundle, ScoreOutcome};
use crate::types::{PolicyThresholds, RiskAssessment, ScoreRequest};
use arc_swap::ArcSwapOption;
use std::sync::{Arc, Mutex};
use tracing::info;

pub struct ScoringService {
    loader: Box<dyn BundleLoader>,
    bundle: ArcSwapOption<ModelBundle>,
    /// Serializes loads so the artifact is read at most once
    load_lock: Mutex<()>,
    thresholds: PolicyThresholds,
}

impl ScoringService {
    pub fn new<L: BundleLoader + 'static>(loader: L, thresholds: PolicyThresholds) -> Self {
        Self {
            loader: Box::new(loader),
            bundle: ArcSwapOption::empty(),
            load_lock: Mutex::new(()),
            thresholds,
        }
    }

    /// Current bundle, loading it on first call
    pub fn bundle(&self) -> Result<Arc<ModelBundle>> {
        if let Some(bundle) = self.bundle.load_full() {
            return Ok(bundle);
        }

        let _guard = self.load_lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(bundle) = self.bundle.load_full() {
            return Ok(bundle);
        }

        let bundle = Arc::new(self.loader.load()?);
        info!(features = bundle.schema.len(), model = %bundle.model.name(), "Model bundle loaded");
        self.bundle.store(Some(bundle.clone()));
        Ok(bundle)
    }

    /// Eagerly load the bundle so artifact errors surface at startup
    pub fn warm_up(&self) -> Result<()> {
        self.bundle().map(|_| ())
    }

    pub fn is_loaded(&self) -> bool {
        self.bundle.load().is_some()
    }

    /// Load a fresh bundle and swap it in. The old bundle stays if loading fails.
    pub fn reload(&self) -> Result<()> {
        let _guard = self.load_lock.lock().unwrap_or_else(|e| e.into_inner());
        let bundle = Arc::new(self.loader.load()?);
        info!(features = bundle.schema.len(), "Model bundle reloaded");
        self.bundle.store(Some(bundle));
        Ok(())
    }

    /// Drop the cached bundle
    pub fn shutdown(&self) {
        self.bundle.store(None);
        info!("Scoring service shut down");
    }

    /// Default probability and synthesized fields for one applicant
    pub fn score(&self, features: &crate::types::FeatureMap) -> Result<ScoreOutcome> {
        self.bundle()?.score(features)
    }

    /// Score and apply the decision policy
    pub fn assess(&self, request: &ScoreRequest) -> Result<RiskAssessment> {
        let bundle = self.bundle()?;
        let outcome = bundle.score(&request.features)?;

        Ok(RiskAssessment::new(
            outcome.probability,
            outcome.missing,
            bundle.schema.len(),
            &self.thresholds,
        ))
    }

    pub fn thresholds(&self) -> &PolicyThresholds {
        &self.thresholds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RiskError;
    use crate::models::{ModelRow, ProbabilityModel};
    use crate::schema::FeatureSchema;
    use crate::types::{FeatureMap, FeatureValue, RiskBand};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Constant(f64);

    impl ProbabilityModel for Constant {
        fn name(&self) -> &str {
            "constant"
        }

        fn predict_proba(&self, _row: &ModelRow) -> Result<f64> {
            Ok(self.0)
        }
    }

    /// Hands out a constant model whose probability grows with each load
    struct CountingLoader {
        loads: Arc<AtomicUsize>,
    }

    impl BundleLoader for CountingLoader {
        fn load(&self) -> Result<ModelBundle> {
            let n = self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(ModelBundle::new(
                FeatureSchema::from_names(&["ext_source_2", "amt_credit", "name_contract_type"]),
                Box::new(Constant(0.05 + 0.1 * n as f64)),
            ))
        }
    }

    struct AbsentLoader;

    impl BundleLoader for AbsentLoader {
        fn load(&self) -> Result<ModelBundle> {
            Err(RiskError::ArtifactNotFound {
                path: PathBuf::from("models/model.onnx"),
            })
        }
    }

    fn service() -> (ScoringService, Arc<AtomicUsize>) {
        let loads = Arc::new(AtomicUsize::new(0));
        let service = ScoringService::new(
            CountingLoader {
                loads: loads.clone(),
            },
            PolicyThresholds::default(),
        );
        (service, loads)
    }

    #[test]
    fn test_bundle_loaded_once() {
        let (service, loads) = service();
        assert!(!service.is_loaded());

        for _ in 0..5 {
            service.score(&FeatureMap::new()).unwrap();
        }

        assert!(service.is_loaded());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reload_swaps_bundle() {
        let (service, loads) = service();

        let before = service.score(&FeatureMap::new()).unwrap();
        service.reload().unwrap();
        let after = service.score(&FeatureMap::new()).unwrap();

        assert_eq!(loads.load(Ordering::SeqCst), 2);
        assert!((before.probability - 0.05).abs() < 1e-9);
        assert!((after.probability - 0.15).abs() < 1e-9);
    }

    #[test]
    fn test_assess_applies_policy() {
        let (service, _) = service();
        let mut features = FeatureMap::new();
        features.insert("ext_source_2".to_string(), FeatureValue::Number(0.7));
        features.insert("amt_credit".to_string(), FeatureValue::Number(250000.0));

        let assessment = service.assess(&ScoreRequest::new(features)).unwrap();

        assert_eq!(assessment.risk_band, RiskBand::Low);
        assert_eq!(assessment.missing_features, vec!["name_contract_type"]);
        // 1 of 3 schema fields missing
        assert_eq!(assessment.data_quality, crate::types::DataQuality::Medium);
    }

    #[test]
    fn test_absent_artifact_fails_each_call() {
        let service = ScoringService::new(AbsentLoader, PolicyThresholds::default());

        assert!(matches!(
            service.score(&FeatureMap::new()),
            Err(RiskError::ArtifactNotFound { .. })
        ));
        assert!(service.warm_up().is_err());
        assert!(!service.is_loaded());
    }

    #[test]
    fn test_shutdown_forces_reload() {
        let (service, loads) = service();
        service.warm_up().unwrap();
        service.shutdown();
        assert!(!service.is_loaded());

        service.score(&FeatureMap::new()).unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }
}
