//! Test Scoring Request Producer
//!
//! Sends synthetic applicants to the scoring worker and logs its replies.

use clap::Parser;
use credit_risk_scoring::producer::ErrorReply;
use credit_risk_scoring::types::{FeatureMap, FeatureValue, RiskAssessment, ScoreRequest};
use rand::Rng;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "score-producer", about = "Send synthetic scoring requests")]
struct Cli {
    #[arg(long, default_value = "nats://localhost:4222")]
    nats_url: String,

    #[arg(long, default_value = "credit.score")]
    subject: String,

    /// Number of requests
    #[arg(long, default_value_t = 100)]
    count: u64,

    /// Share of applicants drawn from the risky profile
    #[arg(long, default_value_t = 0.1)]
    risky_rate: f64,

    /// Chance that any single feature is left out of a request
    #[arg(long, default_value_t = 0.2)]
    drop_rate: f64,

    #[arg(long, default_value_t = 100)]
    delay_ms: u64,

    /// Print requests instead of sending them
    #[arg(long)]
    dry_run: bool,
}

/// Applicant generator
struct ApplicantGenerator {
    rng: rand::rngs::ThreadRng,
    drop_rate: f64,
}

impl ApplicantGenerator {
    fn new(drop_rate: f64) -> Self {
        Self {
            rng: rand::thread_rng(),
            drop_rate: drop_rate.clamp(0.0, 1.0),
        }
    }

    fn generate_typical(&mut self) -> FeatureMap {
        let income = self.rng.gen_range(80_000.0_f64..400_000.0);
        let features = [
            ("amt_income_total", FeatureValue::from(income)),
            ("amt_credit", FeatureValue::from(income * self.rng.gen_range(1.0_f64..4.0))),
            ("amt_annuity", FeatureValue::from(income * self.rng.gen_range(0.05_f64..0.15))),
            ("days_birth", FeatureValue::from(-self.rng.gen_range(9_000.0_f64..22_000.0))),
            ("days_employed", FeatureValue::from(-self.rng.gen_range(500.0_f64..8_000.0))),
            ("ext_source_1", FeatureValue::from(self.rng.gen_range(0.4_f64..0.9))),
            ("ext_source_2", FeatureValue::from(self.rng.gen_range(0.4_f64..0.9))),
            ("ext_source_3", FeatureValue::from(self.rng.gen_range(0.4_f64..0.9))),
            ("bureau_loan_count", FeatureValue::from(self.rng.gen_range(0..8_i64))),
            ("bureau_overdue_count", FeatureValue::from(0.0)),
            ("inst_late_rate", FeatureValue::from(self.rng.gen_range(0.0_f64..0.05))),
            ("code_gender", FeatureValue::from(self.random_choice(&["F", "M"]))),
            ("name_contract_type", FeatureValue::from("Cash loans")),
            ("flag_own_car", FeatureValue::from(self.random_choice(&["Y", "N"]))),
        ];
        self.thin(features)
    }

    fn generate_risky(&mut self) -> FeatureMap {
        let income = self.rng.gen_range(30_000.0_f64..90_000.0);
        let features = [
            ("amt_income_total", FeatureValue::from(income)),
            ("amt_credit", FeatureValue::from(income * self.rng.gen_range(5.0_f64..12.0))),
            ("amt_annuity", FeatureValue::from(income * self.rng.gen_range(0.2_f64..0.4))),
            ("days_birth", FeatureValue::from(-self.rng.gen_range(7_000.0_f64..9_500.0))),
            ("days_employed", FeatureValue::from(-self.rng.gen_range(0.0_f64..400.0))),
            ("ext_source_1", FeatureValue::from(self.rng.gen_range(0.0_f64..0.3))),
            ("ext_source_2", FeatureValue::from(self.rng.gen_range(0.0_f64..0.3))),
            ("ext_source_3", FeatureValue::from(self.rng.gen_range(0.0_f64..0.3))),
            ("bureau_loan_count", FeatureValue::from(self.rng.gen_range(5..20_i64))),
            ("bureau_overdue_count", FeatureValue::from(self.rng.gen_range(1..6_i64))),
            ("inst_late_rate", FeatureValue::from(self.rng.gen_range(0.2_f64..0.8))),
            ("code_gender", FeatureValue::from(self.random_choice(&["F", "M"]))),
            ("name_contract_type", FeatureValue::from("Revolving loans")),
            ("flag_own_car", FeatureValue::from("N")),
        ];
        self.thin(features)
    }

    /// Randomly leave features out so the worker has to fill them in
    fn thin<const N: usize>(&mut self, features: [(&str, FeatureValue); N]) -> FeatureMap {
        features
            .into_iter()
            .filter(|_| !self.rng.gen_bool(self.drop_rate))
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

fn next_request(generator: &mut ApplicantGenerator, risky_rate: f64) -> (ScoreRequest, bool) {
    let risky = rand::thread_rng().gen_bool(risky_rate.clamp(0.0, 1.0));
    let features = if risky {
        generator.generate_risky()
    } else {
        generator.generate_typical()
    };
    (ScoreRequest::new(features), risky)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("score_producer=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    info!(
        nats_url = %cli.nats_url,
        subject = %cli.subject,
        count = cli.count,
        risky_rate = cli.risky_rate,
        drop_rate = cli.drop_rate,
        "Starting Test Scoring Producer"
    );

    if cli.dry_run {
        return run_dry_mode(&cli).await;
    }

    let client = match async_nats::connect(&cli.nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(&cli).await;
        }
    };

    let mut generator = ApplicantGenerator::new(cli.drop_rate);
    let mut bands: HashMap<&'static str, u64> = HashMap::new();
    let mut failures = 0u64;

    for i in 0..cli.count {
        let (request, risky) = next_request(&mut generator, cli.risky_rate);
        let payload = serde_json::to_vec(&request)?;

        let reply = client.request(cli.subject.clone(), payload.into()).await?;

        match serde_json::from_slice::<RiskAssessment>(&reply.payload) {
            Ok(assessment) => {
                *bands.entry(assessment.risk_band.as_str()).or_insert(0) += 1;
                info!(
                    request = i + 1,
                    risky,
                    probability = assessment.default_probability,
                    risk_band = assessment.risk_band.as_str(),
                    data_quality = ?assessment.data_quality,
                    missing = assessment.missing_features.len(),
                    "Scored"
                );
            }
            Err(_) => {
                failures += 1;
                match serde_json::from_slice::<ErrorReply>(&reply.payload) {
                    Ok(reply) => warn!(request = i + 1, error = %reply.error, "Worker rejected request"),
                    Err(e) => warn!(request = i + 1, error = %e, "Unreadable reply"),
                }
            }
        }

        tokio::time::sleep(Duration::from_millis(cli.delay_ms)).await;
    }

    info!(
        sent = cli.count,
        failures,
        bands = ?bands,
        "Completed"
    );

    Ok(())
}

async fn run_dry_mode(cli: &Cli) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = ApplicantGenerator::new(cli.drop_rate);

    for i in 0..cli.count {
        let (request, risky) = next_request(&mut generator, cli.risky_rate);

        if (i + 1) % 10 == 0 || i == 0 {
            let json = serde_json::to_string_pretty(&request)?;
            info!("Sample request {} (risky: {}):\n{}", i + 1, risky, json);
        }

        tokio::time::sleep(Duration::from_millis(cli.delay_ms)).await;
    }

    Ok(())
}
