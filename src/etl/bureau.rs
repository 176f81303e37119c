//! Credit bureau history rolled up to one row per applicant

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
    "sk_id_bureau",
    "credit_active",
    "amt_credit_sum_debt",
    "amt_credit_sum_overdue",
    "amt_credit_max_overdue",
];

/// One bureau credit of an applicant
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BureauRecord {
    pub sk_id_curr: Option<i64>,
    pub sk_id_bureau: Option<i64>,
    pub credit_active: Option<String>,
    pub amt_credit_sum_debt: Option<f64>,
    pub amt_credit_sum_overdue: Option<f64>,
    pub amt_credit_max_overdue: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BureauSummary {
    pub sk_id_curr: i64,
    pub bureau_credit_cnt: u64,
    pub bureau_active_cnt: u64,
    pub bureau_closed_cnt: u64,
    pub bureau_sum_debt: f64,
    pub bureau_sum_overdue: f64,
    pub bureau_max_overdue: f64,
}

impl ApplicantRow for BureauSummary {
    fn applicant_id(&self) -> i64 {
        self.sk_id_curr
    }

    fn empty(sk_id_curr: i64) -> Self {
        Self {
            sk_id_curr,
            bureau_credit_cnt: 0,
            bureau_active_cnt: 0,
            bureau_closed_cnt: 0,
            bureau_sum_debt: 0.0,
            bureau_sum_overdue: 0.0,
            bureau_max_overdue: 0.0,
        }
    }

    fn to_frame(rows: &[Self]) -> Result<DataFrame> {
        let df = df!(
            "sk_id_curr" => rows.iter().map(|r| r.sk_id_curr).collect::<Vec<_>>(),
            "bureau_credit_cnt" => rows.iter().map(|r| r.bureau_credit_cnt).collect::<Vec<_>>(),
            "bureau_active_cnt" => rows.iter().map(|r| r.bureau_active_cnt).collect::<Vec<_>>(),
            "bureau_closed_cnt" => rows.iter().map(|r| r.bureau_closed_cnt).collect::<Vec<_>>(),
            "bureau_sum_debt" => rows.iter().map(|r| r.bureau_sum_debt).collect::<Vec<_>>(),
            "bureau_sum_overdue" => rows.iter().map(|r| r.bureau_sum_overdue).collect::<Vec<_>>(),
            "bureau_max_overdue" => rows.iter().map(|r| r.bureau_max_overdue).collect::<Vec<_>>()
        )?;
        Ok(df)
    }
}

/// Running totals for one applicant
#[derive(Default)]
struct Acc {
    credits: u64,
    active: u64,
    closed: u64,
    debt: f64,
    overdue: f64,
    max_overdue: Option<f64>,
}

/// Aggregate bureau records per applicant, ordered by applicant id.
///
/// Rows without an applicant id are dropped. Sums and the max skip missing
/// values and fall back to 0.
pub fn aggregate_bureau(records: &[BureauRecord]) -> Vec<BureauSummary> {
    let mut groups: BTreeMap<i64, Acc> = BTreeMap::new();

    for rec in records {
        let Some(id) = rec.sk_id_curr else { continue };
        let acc = groups.entry(id).or_default();

        if rec.sk_id_bureau.is_some() {
            acc.credits += 1;
        }
        match rec.credit_active.as_deref() {
            Some("Active") => acc.active += 1,
            Some("Closed") => acc.closed += 1,
            _ => {}
        }
        acc.debt += present(rec.amt_credit_sum_debt).unwrap_or(0.0);
        acc.overdue += present(rec.amt_credit_sum_overdue).unwrap_or(0.0);
        if let Some(v) = present(rec.amt_credit_max_overdue) {
            acc.max_overdue = Some(acc.max_overdue.map_or(v, |m| m.max(v)));
        }
    }

    groups
        .into_iter()
        .map(|(id, acc)| BureauSummary {
            sk_id_curr: id,
            bureau_credit_cnt: acc.credits,
            bureau_active_cnt: acc.active,
            bureau_closed_cnt: acc.closed,
            bureau_sum_debt: acc.debt,
            bureau_sum_overdue: acc.overdue,
            bureau_max_overdue: acc.max_overdue.unwrap_or(0.0),
        })
        .collect()
}

/// Read `bureau.csv`, aggregate, optionally fill the applicant universe, write.
/// The output is parquet unless its path ends in `.csv`.
pub fn run(input: &Path, output: &Path, applicants: Option<&Path>) -> Result<usize> {
    let records: Vec<BureauRecord> = read_records(input, "bureau", &REQUIRED_COLUMNS)?;
    let mut summary = aggregate_bureau(&records);

    if let Some(path) = applicants {
        summary = fill_universe(summary, &read_applicant_ids(path)?);
    }

    write_table(&mut BureauSummary::to_frame(&summary)?, output)?;
    info!(applicants = summary.len(), output = %output.display(), "Bureau aggregation saved");
    Ok(summary.len())
}
