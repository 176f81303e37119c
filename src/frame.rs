//! Polars table I/O for the batch jobs.
//!
//! CSV inputs are read with lowercased headers. Outputs are parquet unless
//! the path ends in `.csv`.

use crate::error::{Result, RiskError};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::info;

/// Cell values read as missing, on top of empty cells
pub const NULL_TOKENS: [&str; 3] = ["NA", "NaN", "nan"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Parquet,
    Csv,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => TableFormat::Csv,
            _ => TableFormat::Parquet,
        }
    }
}

/// Read a CSV table, lowercasing its column names
pub fn read_csv<P: AsRef<Path>>(path: P, table: &str) -> Result<DataFrame> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(RiskError::ArtifactNotFound {
            path: path.to_path_buf(),
        });
    }

    let null_values = NullValues::AllColumns(NULL_TOKENS.iter().map(|t| (*t).into()).collect());
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(10_000))
        .map_parse_options(|opts| opts.with_null_values(Some(null_values.clone())))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    lowercase_columns(&mut df)?;
    info!(table, path = %path.display(), rows = df.height(), columns = df.width(), "Loaded table");
    Ok(df)
}

pub fn read_parquet<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
    let df = ParquetReader::new(File::open(path.as_ref())?).finish()?;
    Ok(df)
}

pub fn lowercase_columns(df: &mut DataFrame) -> Result<()> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.trim().to_lowercase())
        .collect();
    df.set_column_names(names)?;
    Ok(())
}

/// Write a table, creating parent directories. Format follows the extension.
pub fn write_table<P: AsRef<Path>>(df: &mut DataFrame, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(path)?;
    let format = TableFormat::from_path(path);
    match format {
        TableFormat::Parquet => {
            ParquetWriter::new(file).finish(df)?;
        }
        TableFormat::Csv => {
            CsvWriter::new(file).include_header(true).finish(df)?;
        }
    }

    info!(path = %path.display(), rows = df.height(), format = ?format, "Saved table");
    Ok(())
}

/// Fail with every listed column the table lacks
pub fn require<S: AsRef<str>>(df: &DataFrame, table: &str, names: &[S]) -> Result<()> {
    let missing: Vec<String> = names
        .iter()
        .map(|n| n.as_ref())
        .filter(|n| df.get_column_index(n).is_none())
        .map(str::to_string)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(RiskError::MissingColumns {
            table: table.to_string(),
            columns: missing,
        })
    }
}

/// A column as `Float64`. Text that does not parse becomes missing.
pub fn float_series(df: &DataFrame, table: &str, name: &str) -> Result<Series> {
    require(df, table, &[name])?;
    let series = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    Ok(series)
}

/// A column's values as `Option<f64>`, NaN included as missing
pub fn floats(df: &DataFrame, table: &str, name: &str) -> Result<Vec<Option<f64>>> {
    let series = float_series(df, table, name)?;
    let values = series
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect();
    Ok(values)
}
