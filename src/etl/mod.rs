//! Offline aggregation jobs over auxiliary credit tables

pub mod bureau;
pub mod installments;
pub mod io;
pub mod join;

pub use bureau::{aggregate_bureau, BureauRecord, BureauSummary};
pub use installments::{aggregate_installments, InstallmentRecord, InstallmentSummary};
pub use join::{fill_universe, read_applicant_ids, ApplicantRow};
