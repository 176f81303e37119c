//! Installment payment history rolled up to one row per applicant

use crate::error::Result;
use crate::etl::io::{present, read_records};
use crate::etl::join::{fill_universe, read_applicant_ids, ApplicantRow};
use crate::frame::write_table;
use polars::prelude::*;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

pub const REQUIRED_COLUMNS: [&str; 6] = [
    "sk_id_curr",
    "sk_id_prev",
    "amt_instalment",
    "amt_payment",
    "days_instalment",
    "days_entry_payment",
];

/// One scheduled installment of a previous loan
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstallmentRecord {
    pub sk_id_curr: Option<i64>,
    pub sk_id_prev: Option<i64>,
    pub amt_instalment: Option<f64>,
    pub amt_payment: Option<f64>,
    pub days_instalment: Option<f64>,
    pub days_entry_payment: Option<f64>,
}

/// Per-installment lateness and payment coverage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstallmentSignals {
    /// Days paid after the due day; negative when paid early
    pub late_days: Option<f64>,
    pub late_flag: u8,
    /// Paid over scheduled; undefined for a zero schedule
    pub payment_ratio: Option<f64>,
}

impl InstallmentRecord {
    pub fn signals(&self) -> InstallmentSignals {
        let late_days = match (present(self.days_entry_payment), present(self.days_instalment)) {
            (Some(paid), Some(due)) => Some(paid - due),
            _ => None,
        };

        let payment_ratio = match (present(self.amt_payment), present(self.amt_instalment)) {
            (Some(paid), Some(due)) if due != 0.0 => Some(paid / due),
            _ => None,
        };

        InstallmentSignals {
            late_days,
            late_flag: matches!(late_days, Some(d) if d > 0.0) as u8,
            payment_ratio,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstallmentSummary {
    pub sk_id_curr: i64,
    pub inst_pay_cnt: u64,
    pub inst_late_cnt: u64,
    pub inst_late_rate: f64,
    pub inst_days_late_mean: f64,
    pub inst_days_late_max: f64,
    pub inst_amt_payment_sum: f64,
    pub inst_amt_instalment_sum: f64,
    pub inst_payment_ratio_mean: f64,
}

impl ApplicantRow for InstallmentSummary {
    fn applicant_id(&self) -> i64 {
        self.sk_id_curr
    }

    fn empty(sk_id_curr: i64) -> Self {
        Self {
            sk_id_curr,
            inst_pay_cnt: 0,
            inst_late_cnt: 0,
            inst_late_rate: 0.0,
            inst_days_late_mean: 0.0,
            inst_days_late_max: 0.0,
            inst_amt_payment_sum: 0.0,
            inst_amt_instalment_sum: 0.0,
            inst_payment_ratio_mean: 0.0,
        }
    }

    fn to_frame(rows: &[Self]) -> Result<DataFrame> {
        let df = df!(
            "sk_id_curr" => rows.iter().map(|r| r.sk_id_curr).collect::<Vec<_>>(),
            "inst_pay_cnt" => rows.iter().map(|r| r.inst_pay_cnt).collect::<Vec<_>>(),
            "inst_late_cnt" => rows.iter().map(|r| r.inst_late_cnt).collect::<Vec<_>>(),
            "inst_late_rate" => rows.iter().map(|r| r.inst_late_rate).collect::<Vec<_>>(),
            "inst_days_late_mean" => rows.iter().map(|r| r.inst_days_late_mean).collect::<Vec<_>>(),
            "inst_days_late_max" => rows.iter().map(|r| r.inst_days_late_max).collect::<Vec<_>>(),
            "inst_amt_payment_sum" => rows.iter().map(|r| r.inst_amt_payment_sum).collect::<Vec<_>>(),
            "inst_amt_instalment_sum" => rows.iter().map(|r| r.inst_amt_instalment_sum).collect::<Vec<_>>(),
            "inst_payment_ratio_mean" => rows.iter().map(|r| r.inst_payment_ratio_mean).collect::<Vec<_>>()
        )?;
        Ok(df)
    }
}

#[derive(Default)]
struct Acc {
    rows: u64,
    payments: u64,
    late: u64,
    late_days_sum: f64,
    late_days_max: f64,
    paid: f64,
    scheduled: f64,
    ratio_sum: f64,
    ratios: u64,
}

fn mean(sum: f64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Aggregate installments per applicant, ordered by applicant id.
///
/// Lateness mean and max only look at late installments. Means over an
/// empty subset are 0.
pub fn aggregate_installments(records: &[InstallmentRecord]) -> Vec<InstallmentSummary> {
    let mut groups: BTreeMap<i64, Acc> = BTreeMap::new();

    for rec in records {
        let Some(id) = rec.sk_id_curr else { continue };
        let acc = groups.entry(id).or_default();
        let signals = rec.signals();

        acc.rows += 1;
        if rec.sk_id_prev.is_some() {
            acc.payments += 1;
        }
        if let Some(days) = signals.late_days.filter(|&d| d > 0.0) {
            acc.late += 1;
            acc.late_days_sum += days;
            acc.late_days_max = acc.late_days_max.max(days);
        }
        acc.paid += present(rec.amt_payment).unwrap_or(0.0);
        acc.scheduled += present(rec.amt_instalment).unwrap_or(0.0);
        if let Some(ratio) = signals.payment_ratio {
            acc.ratio_sum += ratio;
            acc.ratios += 1;
        }
    }

    groups
        .into_iter()
        .map(|(id, acc)| InstallmentSummary {
            sk_id_curr: id,
            inst_pay_cnt: acc.payments,
            inst_late_cnt: acc.late,
            inst_late_rate: mean(acc.late as f64, acc.rows),
            inst_days_late_mean: mean(acc.late_days_sum, acc.late),
            inst_days_late_max: acc.late_days_max,
            inst_amt_payment_sum: acc.paid,
            inst_amt_instalment_sum: acc.scheduled,
            inst_payment_ratio_mean: mean(acc.ratio_sum, acc.ratios),
        })
        .collect()
}

/// Read `installments_payments.csv`, aggregate, optionally fill the universe, write.
/// The output is parquet unless its path ends in `.csv`.
pub fn run(input: &Path, output: &Path, applicants: Option<&Path>) -> Result<usize> {
    let records: Vec<InstallmentRecord> =
        read_records(input, "installments_payments", &REQUIRED_COLUMNS)?;
    let mut summary = aggregate_installments(&records);

    if let Some(path) = applicants {
        summary = fill_universe(summary, &read_applicant_ids(path)?);
    }

    write_table(&mut InstallmentSummary::to_frame(&summary)?, output)?;
    info!(applicants = summary.len(), output = %output.display(), "Installments aggregation saved");
    Ok(summary.len())
}
