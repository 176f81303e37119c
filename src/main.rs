//! Credit Risk Scoring - Main Entry Point
//!
//! Answers scoring requests over NATS request/reply. Requests are handled
//! one at a time against the shared model bundle.

use anyhow::{Context, Result};
use credit_risk_scoring::{
    config::AppConfig,
    consumer::RequestConsumer,
    metrics::{MetricsReporter, ScoringMetrics},
    models::ModelLoader,
    producer::ReplyProducer,
    service::ScoringService,
    types::ScoreRequest,
    RiskError,
};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    config.logging.init("credit_risk_scoring")?;

    info!("Starting Credit Risk Scoring worker");
    info!(
        low_risk_below = config.policy.low_risk_below,
        medium_risk_below = config.policy.medium_risk_below,
        "Decision policy loaded"
    );

    let metrics = Arc::new(ScoringMetrics::new());

    let loader = ModelLoader::from_config(&config.models);
    info!(
        model = %loader.model_path().display(),
        schema = %loader.schema_path().display(),
        "Loading model bundle"
    );
    let service = ScoringService::new(loader, config.policy.clone());
    service.warm_up().context("Failed to load model bundle")?;

    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    let consumer = RequestConsumer::new(
        client.clone(),
        &config.nats.request_subject,
        config.nats.queue_group.as_deref(),
    );
    let producer = ReplyProducer::new(client.clone());

    let metrics_clone = metrics.clone();
    tokio::spawn(async move {
        let reporter = MetricsReporter::new(metrics_clone, 30);
        reporter.start().await;
    });

    let mut subscription = consumer.subscribe().await?;
    info!(
        subject = consumer.subject(),
        queue_group = ?consumer.queue_group(),
        "Waiting for scoring requests"
    );

    loop {
        let message = tokio::select! {
            next = subscription.next() => match next {
                Some(message) => message,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received");
                break;
            }
        };

        let start_time = Instant::now();

        let outcome = serde_json::from_slice::<ScoreRequest>(&message.payload)
            .map_err(RiskError::from)
            .and_then(|request| service.assess(&request));

        match &outcome {
            Ok(assessment) => {
                let processing_time = start_time.elapsed();
                metrics.record_assessment(assessment, processing_time);
                debug!(
                    assessment_id = %assessment.assessment_id,
                    probability = assessment.default_probability,
                    risk_band = assessment.risk_band.as_str(),
                    missing = assessment.missing_features.len(),
                    processing_time_us = processing_time.as_micros() as u64,
                    "Request scored"
                );
            }
            Err(e) => {
                metrics.record_failure();
                warn!(error = %e, "Scoring request failed");
            }
        }

        let Some(reply_to) = message.reply else {
            warn!("Request has no reply subject, dropping result");
            continue;
        };

        if let Err(e) = producer.reply(reply_to, &outcome).await {
            error!(error = %e, "Failed to publish reply");
        }
    }

    info!("Worker shutting down...");
    service.shutdown();
    metrics.print_summary();

    Ok(())
}
