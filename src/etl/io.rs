//! Typed CSV input for the aggregation jobs

use crate::error::{Result, RiskError};
use csv::StringRecord;
use serde::de::DeserializeOwned;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// Read typed rows from a CSV file.
///
/// Headers are lowercased before matching, and every column in `required`
/// must be present; extra columns are ignored.
pub fn read_records<T, P>(path: P, table: &str, required: &[&str]) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if !path.exists() {
        return Err(RiskError::ArtifactNotFound {
            path: path.to_path_buf(),
        });
    }

    let rows = records_from_reader(std::fs::File::open(path)?, table, required)?;
    info!(table, path = %path.display(), rows = rows.len(), "Loaded table");
    Ok(rows)
}

pub fn records_from_reader<T, R>(reader: R, table: &str, required: &[&str]) -> Result<Vec<T>>
where
    T: DeserializeOwned,
    R: Read,
{
    let mut reader = csv::Reader::from_reader(reader);
    let headers: StringRecord = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    let missing: Vec<String> = required
        .iter()
        .filter(|c| !headers.iter().any(|h| h == **c))
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(RiskError::MissingColumns {
            table: table.to_string(),
            columns: missing,
        });
    }

    reader.set_headers(headers);
    let rows = reader.deserialize().collect::<std::result::Result<Vec<T>, _>>()?;
    Ok(rows)
}

/// Treat NaN read from a CSV cell as missing
pub(crate) fn present(value: Option<f64>) -> Option<f64> {
    value.filter(|v| !v.is_nan())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Row {
        sk_id_curr: i64,
        amt: Option<f64>,
    }

    #[test]
    fn test_headers_are_case_normalized() {
        let data = "SK_ID_CURR,AMT,Other\n1,2.5,x\n2,,y\n";
        let rows: Vec<Row> = records_from_reader(data.as_bytes(), "t", &["sk_id_curr", "amt"]).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].sk_id_curr, 1);
        assert_eq!(rows[0].amt, Some(2.5));
        assert_eq!(rows[1].amt, None);
    }

    #[test]
    fn test_missing_required_columns_are_listed() {
        let data = "SK_ID_CURR\n1\n";
        let result: Result<Vec<Row>> =
            records_from_reader(data.as_bytes(), "bureau", &["sk_id_curr", "amt", "credit_active"]);

        match result {
            Err(RiskError::MissingColumns { table, columns }) => {
                assert_eq!(table, "bureau");
                assert_eq!(columns, vec!["amt", "credit_active"]);
            }
            other => panic!("expected MissingColumns, got {:?}", other),
        }
    }
}
