//! Applicant-level cleaning transforms over polars frames.
//!
//! Every transform borrows its input and returns a new frame.

use crate::config::CleaningConfig;
use crate::error::{Result, RiskError};
use crate::frame::{float_series, floats, require};
use polars::prelude::*;
use tracing::debug;

/// Home Credit marker for "not applicable" day offsets
pub const DAYS_PLACEHOLDER: f64 = 365243.0;

/// Suffix of the indicator emitted per placeholder column
pub const PLACEHOLDER_SUFFIX: &str = "_is_placeholder";

/// Day-offset columns of `previous_application` that carry the placeholder
pub const PREVIOUS_APPLICATION_DAY_COLUMNS: [&str; 5] = [
    "days_first_drawing",
    "days_first_due",
    "days_last_due_1st_version",
    "days_last_due",
    "days_termination",
];

pub const ENGINEERED_FLAGS: [&str; 3] = ["age_outlier", "income_outlier", "credit_outlier"];

const APPLICATION: &str = "application";
const PREVIOUS_APPLICATION: &str = "previous_application";

/// Replace the placeholder with missing and add `<col>_is_placeholder`.
pub fn replace_placeholder_with_missing<S: AsRef<str>>(
    df: &DataFrame,
    columns: &[S],
    placeholder: f64,
) -> Result<DataFrame> {
    require(df, PREVIOUS_APPLICATION, columns)?;
    let mut out = df.clone();

    for col in columns {
        let col = col.as_ref();
        let values = floats(df, PREVIOUS_APPLICATION, col)?;

        let indicator: Vec<i8> = values
            .iter()
            .map(|v| (*v == Some(placeholder)) as i8)
            .collect();
        let cleaned: Vec<Option<f64>> = values
            .into_iter()
            .map(|v| v.filter(|&x| x != placeholder))
            .collect();

        debug!(
            column = col,
            replaced = indicator.iter().filter(|&&f| f == 1).count(),
            "Replaced placeholder"
        );
        out.with_column(Series::new(format!("{}{}", col, PLACEHOLDER_SUFFIX).into(), indicator))?;
        out.with_column(Series::new(col.into(), cleaned))?;
    }

    Ok(out)
}

/// Placeholder handling for `previous_application`, on the day columns present
pub fn clean_previous_application(df: &DataFrame, config: &CleaningConfig) -> Result<DataFrame> {
    let columns: Vec<&str> = PREVIOUS_APPLICATION_DAY_COLUMNS
        .iter()
        .copied()
        .filter(|c| df.get_column_index(c).is_some())
        .collect();

    replace_placeholder_with_missing(df, &columns, config.placeholder)
}

/// Add `age_years` from `days_birth` and flag ages outside the allowed range.
///
/// Out-of-range ages are nulled; the flag stays.
pub fn add_age_features(df: &DataFrame, config: &CleaningConfig) -> Result<DataFrame> {
    let days = floats(df, APPLICATION, "days_birth")?;

    let mut ages = Vec::with_capacity(days.len());
    let mut flags = Vec::with_capacity(days.len());
    for d in days {
        let age = d.map(|d| (-d / 365.25 * 10.0).round() / 10.0);
        let outlier = matches!(age, Some(a) if a < config.min_age || a > config.max_age);
        flags.push(outlier as i8);
        ages.push(if outlier { None } else { age });
    }

    let mut out = df.clone();
    out.with_column(Series::new("age_years".into(), ages))?;
    out.with_column(Series::new("age_outlier".into(), flags))?;
    Ok(out)
}

/// Quantile clip bounds for one column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantileBounds {
    pub lower: f64,
    pub upper: f64,
}

impl QuantileBounds {
    /// Fit linear-interpolated quantile bounds on the non-missing values.
    /// `None` when there are none.
    pub fn fit(values: &Float64Chunked, lower_q: f64, upper_q: f64) -> Result<Option<Self>> {
        if !(0.0..=1.0).contains(&lower_q) || !(0.0..=1.0).contains(&upper_q) || lower_q > upper_q {
            return Err(RiskError::QuantileRange {
                lower: lower_q,
                upper: upper_q,
            });
        }

        let lower = values.quantile(lower_q, QuantileMethod::Linear)?;
        let upper = values.quantile(upper_q, QuantileMethod::Linear)?;
        Ok(lower.zip(upper).map(|(lower, upper)| Self { lower, upper }))
    }

    /// Clip into the bounds. NaN passes through.
    pub fn clip(&self, value: f64) -> f64 {
        if value.is_nan() {
            value
        } else {
            value.max(self.lower).min(self.upper)
        }
    }
}

/// Clip a numeric column to fixed bounds. Idempotent.
pub fn clip_to_bounds(df: &DataFrame, column: &str, bounds: QuantileBounds) -> Result<DataFrame> {
    let series = float_series(df, APPLICATION, column)?;
    let clipped = series.f64()?.apply_values(move |v| bounds.clip(v));

    let mut out = df.clone();
    out.with_column(clipped.into_series())?;
    Ok(out)
}

/// Winsorize a numeric column to its `[lower_q, upper_q]` quantiles.
///
/// Returns the frame and the fitted bounds; an all-missing column is left as is.
pub fn winsorize(
    df: &DataFrame,
    column: &str,
    lower_q: f64,
    upper_q: f64,
) -> Result<(DataFrame, Option<QuantileBounds>)> {
    let series = float_series(df, APPLICATION, column)?;
    match QuantileBounds::fit(series.f64()?, lower_q, upper_q)? {
        Some(bounds) => {
            debug!(column, lower = bounds.lower, upper = bounds.upper, "Winsorizing");
            Ok((clip_to_bounds(df, column, bounds)?, Some(bounds)))
        }
        None => Ok((df.clone(), None)),
    }
}

/// Flag and null non-positive values, then winsorize
fn clean_positive_amount(
    df: &DataFrame,
    column: &str,
    flag_column: &str,
    config: &CleaningConfig,
) -> Result<DataFrame> {
    let values = floats(df, APPLICATION, column)?;

    let flags: Vec<i8> = values
        .iter()
        .map(|v| matches!(v, Some(x) if *x <= 0.0) as i8)
        .collect();
    let kept: Vec<Option<f64>> = values.into_iter().map(|v| v.filter(|&x| x > 0.0)).collect();

    let mut out = df.clone();
    out.with_column(Series::new(flag_column.into(), flags))?;
    out.with_column(Series::new(column.into(), kept))?;

    let (out, _) = winsorize(&out, column, config.lower_quantile, config.upper_quantile)?;
    Ok(out)
}

pub fn clean_income(df: &DataFrame, config: &CleaningConfig) -> Result<DataFrame> {
    clean_positive_amount(df, "amt_income_total", "income_outlier", config)
}

pub fn clean_credit_amount(df: &DataFrame, config: &CleaningConfig) -> Result<DataFrame> {
    clean_positive_amount(df, "amt_credit", "credit_outlier", config)
}

/// Nullable integer identifier; unparsable text becomes missing
fn cast_identifier(series: &Series) -> Result<Series> {
    if series.dtype().is_float() {
        let as_f64 = series.cast(&DataType::Float64)?;
        let fractional = as_f64.f64()?.into_iter().flatten().find(|v| v.fract() != 0.0);
        if let Some(v) = fractional {
            return Err(RiskError::Cast {
                column: series.name().to_string(),
                reason: format!("non-integral identifier {}", v),
            });
        }
    }
    Ok(series.cast(&DataType::Int64)?)
}

/// Compact integer cast; fails on missing or out-of-range values
fn cast_int8(series: &Series) -> Result<Series> {
    let column = series.name().to_string();
    if is_text(series.dtype()) {
        return Err(RiskError::Cast {
            column,
            reason: "column is not numeric".to_string(),
        });
    }

    let as_f64 = series.cast(&DataType::Float64)?;
    let values = as_f64
        .f64()?
        .into_iter()
        .map(|v| match v {
            Some(x) if x.fract() == 0.0 && x >= i8::MIN as f64 && x <= i8::MAX as f64 => {
                Ok(x as i8)
            }
            Some(x) => Err(RiskError::Cast {
                column: column.clone(),
                reason: format!("value {} does not fit int8", x),
            }),
            None => Err(RiskError::Cast {
                column: column.clone(),
                reason: "missing value".to_string(),
            }),
        })
        .collect::<Result<Vec<i8>>>()?;

    Ok(Series::new(series.name().clone(), values))
}

fn is_text(dtype: &DataType) -> bool {
    matches!(dtype, DataType::String | DataType::Categorical(..))
}

fn is_binary(series: &Series) -> bool {
    if is_text(series.dtype()) {
        return false;
    }
    series
        .cast(&DataType::Float64)
        .ok()
        .and_then(|s| {
            s.f64()
                .ok()
                .map(|ca| ca.into_iter().all(|x| matches!(x, Some(f) if f == 0.0 || f == 1.0)))
        })
        .unwrap_or(false)
}

/// Normalize column types.
///
/// `sk_id_curr` becomes a nullable Int64, `target`, the engineered flags and
/// binary `flag_*` columns become Int8, text becomes a lexically ordered
/// categorical.
pub fn cast_dtypes_application(df: &DataFrame) -> Result<DataFrame> {
    let mut out = df.clone();

    for column in df.get_columns() {
        let name = column.name().as_str();
        let series = column.as_materialized_series();

        let cast = if name == "sk_id_curr" {
            Some(cast_identifier(series)?)
        } else if name == "target" || ENGINEERED_FLAGS.contains(&name) {
            Some(cast_int8(series)?)
        } else if name.starts_with("flag_") && series.dtype() != &DataType::Int8 && is_binary(series) {
            Some(cast_int8(series)?)
        } else if matches!(series.dtype(), DataType::String) {
            Some(series.cast(&DataType::Categorical(None, CategoricalOrdering::Lexical))?)
        } else {
            None
        };

        if let Some(cast) = cast {
            out.with_column(cast)?;
        }
    }

    Ok(out)
}

/// Application cleaning: age, income, credit, then type normalization
pub fn clean_application(df: &DataFrame, config: &CleaningConfig) -> Result<DataFrame> {
    let out = add_age_features(df, config)?;
    let out = clean_income(&out, config)?;
    let out = clean_credit_amount(&out, config)?;
    cast_dtypes_application(&out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CleaningConfig {
        CleaningConfig::default()
    }

    fn f64s(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
        df.column(name)
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_iter()
            .collect()
    }

    fn i8s(df: &DataFrame, name: &str) -> Vec<Option<i8>> {
        df.column(name)
            .unwrap()
            .as_materialized_series()
            .i8()
            .unwrap()
            .into_iter()
            .collect()
    }

    fn dtype(df: &DataFrame, name: &str) -> DataType {
        df.column(name).unwrap().dtype().clone()
    }

    #[test]
    fn test_placeholder_replacement() {
        let df = df!(
            "days_first_due" => &[Some(-100.0), Some(365243.0), Some(-5.0)],
            "days_termination" => &[Some(365243.0), None, Some(-1.0)]
        )
        .unwrap();

        let out = clean_previous_application(&df, &config()).unwrap();

        assert_eq!(f64s(&out, "days_first_due"), vec![Some(-100.0), None, Some(-5.0)]);
        assert_eq!(i8s(&out, "days_first_due_is_placeholder"), vec![Some(0), Some(1), Some(0)]);
        assert_eq!(i8s(&out, "days_termination_is_placeholder"), vec![Some(1), Some(0), Some(0)]);
        assert!(out.get_column_index("days_last_due_is_placeholder").is_none());
        // input untouched
        assert_eq!(df.width(), 2);
    }

    #[test]
    fn test_placeholder_requires_columns() {
        let df = df!("sk_id_prev" => &[1i64]).unwrap();
        assert!(matches!(
            replace_placeholder_with_missing(&df, &["days_first_due"], DAYS_PLACEHOLDER),
            Err(RiskError::MissingColumns { .. })
        ));
    }

    #[test]
    fn test_age_features() {
        let df = df!("days_birth" => &[Some(-7305.0), Some(-40000.0), None]).unwrap();

        let out = add_age_features(&df, &config()).unwrap();

        assert_eq!(f64s(&out, "age_years"), vec![Some(20.0), None, None]);
        assert_eq!(i8s(&out, "age_outlier"), vec![Some(0), Some(1), Some(0)]);
    }

    #[test]
    fn test_age_requires_days_birth() {
        let df = df!("sk_id_curr" => &[1i64]).unwrap();
        match add_age_features(&df, &config()) {
            Err(RiskError::MissingColumns { columns, .. }) => assert_eq!(columns, vec!["days_birth"]),
            other => panic!("expected MissingColumns, got {:?}", other),
        }
    }

    #[test]
    fn test_quantile_matches_linear_interpolation() {
        let values = Float64Chunked::from_slice("x".into(), &[5.0, 1.0, 3.0, 2.0, 4.0]);

        let bounds = QuantileBounds::fit(&values, 0.1, 0.5).unwrap().unwrap();

        assert!((bounds.lower - 1.4).abs() < 1e-12);
        assert_eq!(bounds.upper, 3.0);
    }

    #[test]
    fn test_winsorize_clips_tails_only() {
        let mut values: Vec<f64> = (1..=99).map(|v| v as f64).collect();
        values.push(10_000.0);
        let df = df!("x" => &values).unwrap();

        let (out, bounds) = winsorize(&df, "x", 0.01, 0.99).unwrap();
        let bounds = bounds.unwrap();
        let clipped = f64s(&out, "x");

        assert!(bounds.upper < 10_000.0);
        assert_eq!(clipped[99], Some(bounds.upper));
        for (before, after) in values.iter().zip(&clipped) {
            if *before >= bounds.lower && *before <= bounds.upper {
                assert_eq!(Some(*before), *after);
            }
        }
    }

    #[test]
    fn test_inverted_quantiles_are_rejected() {
        let df = df!("x" => &[1.0, 5.0, 9.0]).unwrap();

        assert!(matches!(
            winsorize(&df, "x", 0.99, 0.01),
            Err(RiskError::QuantileRange { .. })
        ));
        assert!(matches!(
            winsorize(&df, "x", -0.1, 0.5),
            Err(RiskError::QuantileRange { .. })
        ));

        let cfg = CleaningConfig {
            lower_quantile: 0.99,
            upper_quantile: 0.01,
            ..config()
        };
        let app = df!("amt_income_total" => &[1.0, 5.0, 9.0]).unwrap();
        assert!(clean_income(&app, &cfg).is_err());
    }

    #[test]
    fn test_clip_with_inverted_bounds_does_not_panic() {
        let bounds = QuantileBounds {
            lower: 10.0,
            upper: 1.0,
        };
        assert_eq!(bounds.clip(5.0), 1.0);
        assert!(bounds.clip(f64::NAN).is_nan());
    }

    #[test]
    fn test_clip_to_bounds_is_idempotent() {
        let df = df!("x" => &[Some(-50.0), Some(3.0), None, Some(900.0)]).unwrap();
        let bounds = QuantileBounds {
            lower: 0.0,
            upper: 100.0,
        };

        let once = clip_to_bounds(&df, "x", bounds).unwrap();
        let twice = clip_to_bounds(&once, "x", bounds).unwrap();

        assert!(once.equals_missing(&twice));
        assert_eq!(f64s(&once, "x"), vec![Some(0.0), Some(3.0), None, Some(100.0)]);
    }

    #[test]
    fn test_winsorize_all_missing_is_noop() {
        let df = df!("x" => &[None::<f64>, None]).unwrap();
        let (out, bounds) = winsorize(&df, "x", 0.01, 0.99).unwrap();
        assert!(bounds.is_none());
        assert!(out.equals_missing(&df));
    }

    #[test]
    fn test_clean_income_flags_non_positive() {
        let df = df!("amt_income_total" => &[0.0, -10.0, 100.0, 200.0]).unwrap();
        let cfg = CleaningConfig {
            lower_quantile: 0.0,
            upper_quantile: 1.0,
            ..config()
        };

        let out = clean_income(&df, &cfg).unwrap();

        assert_eq!(i8s(&out, "income_outlier"), vec![Some(1), Some(1), Some(0), Some(0)]);
        assert_eq!(f64s(&out, "amt_income_total"), vec![None, None, Some(100.0), Some(200.0)]);
    }

    #[test]
    fn test_cast_dtypes() {
        let df = df!(
            "sk_id_curr" => &[Some(100002.0), None],
            "target" => &[1.0, 0.0],
            "flag_mobil" => &[1.0, 0.0],
            "flag_document_2" => &[2.0, 0.0],
            "flag_own_car" => &["Y", "N"]
        )
        .unwrap();

        let out = cast_dtypes_application(&df).unwrap();

        let ids: Vec<Option<i64>> = out
            .column("sk_id_curr")
            .unwrap()
            .as_materialized_series()
            .i64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(ids, vec![Some(100002), None]);
        assert_eq!(i8s(&out, "target"), vec![Some(1), Some(0)]);
        assert_eq!(i8s(&out, "flag_mobil"), vec![Some(1), Some(0)]);
        assert_eq!(dtype(&out, "flag_document_2"), DataType::Float64);
        assert!(matches!(dtype(&out, "flag_own_car"), DataType::Categorical(..)));
    }

    #[test]
    fn test_fractional_identifier_fails_cast() {
        let df = df!("sk_id_curr" => &[1.5, 2.0]).unwrap();
        assert!(matches!(
            cast_dtypes_application(&df),
            Err(RiskError::Cast { .. })
        ));
    }

    #[test]
    fn test_missing_target_fails_cast() {
        let df = df!("target" => &[Some(1.0), None]).unwrap();
        assert!(matches!(
            cast_dtypes_application(&df),
            Err(RiskError::Cast { .. })
        ));
    }

    #[test]
    fn test_clean_application_pipeline() {
        let df = df!(
            "sk_id_curr" => &[1.0, 2.0, 3.0],
            "days_birth" => &[-7305.0, -40000.0, -12000.0],
            "amt_income_total" => &[100000.0, 0.0, 250000.0],
            "amt_credit" => &[500000.0, 300000.0, -1.0]
        )
        .unwrap();

        let out = clean_application(&df, &config()).unwrap();

        assert_eq!(i8s(&out, "age_outlier"), vec![Some(0), Some(1), Some(0)]);
        assert_eq!(i8s(&out, "income_outlier"), vec![Some(0), Some(1), Some(0)]);
        assert_eq!(i8s(&out, "credit_outlier"), vec![Some(0), Some(0), Some(1)]);
        assert_eq!(dtype(&out, "sk_id_curr"), DataType::Int64);
        let names: Vec<&str> = out.get_column_names().iter().map(|n| n.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "sk_id_curr",
                "days_birth",
                "amt_income_total",
                "amt_credit",
                "age_years",
                "age_outlier",
                "income_outlier",
                "credit_outlier"
            ]
        );
    }
}
