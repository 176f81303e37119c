//! Left join of per-applicant aggregates against the applicant universe.
//!
//! Grouping only yields applicants that have detail records. Model tables
//! need a row for everyone, with zero counts and sums for the rest.

use crate::error::Result;
use crate::frame::{read_csv, require};
use polars::prelude::*;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::debug;

/// Aggregate row keyed by applicant id
pub trait ApplicantRow: Sized {
    fn applicant_id(&self) -> i64;

    /// Row for an applicant with no detail records
    fn empty(sk_id_curr: i64) -> Self;

    /// Columnar form of a set of rows, for writing
    fn to_frame(rows: &[Self]) -> Result<DataFrame>;
}

/// One row per universe id, in universe order.
///
/// Duplicate universe ids collapse to one row; aggregate rows for ids
/// outside the universe are dropped.
pub fn fill_universe<T: ApplicantRow>(rows: Vec<T>, universe: &[i64]) -> Vec<T> {
    let mut by_id: HashMap<i64, T> = rows.into_iter().map(|r| (r.applicant_id(), r)).collect();
    let mut seen = HashSet::new();
    let mut filled = 0usize;

    let out: Vec<T> = universe
        .iter()
        .filter(|id| seen.insert(**id))
        .map(|&id| {
            by_id.remove(&id).unwrap_or_else(|| {
                filled += 1;
                T::empty(id)
            })
        })
        .collect();

    debug!(rows = out.len(), filled, dropped = by_id.len(), "Joined against applicant universe");
    out
}

/// Applicant ids from the `sk_id_curr` column of an application table
pub fn read_applicant_ids<P: AsRef<Path>>(path: P) -> Result<Vec<i64>> {
    let df = read_csv(path, "application")?;
    require(&df, "application", &["sk_id_curr"])?;

    let ids = df
        .column("sk_id_curr")?
        .as_materialized_series()
        .cast(&DataType::Int64)?
        .i64()?
        .into_iter()
        .flatten()
        .collect();
    Ok(ids)
}
