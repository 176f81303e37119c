//! Single-row model input assembled from an aligned feature map

use crate::error::{Result, RiskError};
use crate::schema::{FeatureSchema, FieldKind};
use crate::types::{FeatureMap, FeatureValue};

/// A cell coerced to the type the model input expects
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Float(f32),
    Text(String),
}

/// One applicant row in schema order. Extra caller fields are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRow {
    cells: Vec<(String, Cell)>,
}

impl ModelRow {
    /// Coerce an aligned map into schema order.
    ///
    /// Fails on the first field whose value cannot be cast to its kind.
    pub fn from_aligned(features: &FeatureMap, schema: &FeatureSchema) -> Result<Self> {
        let mut cells = Vec::with_capacity(schema.len());

        for field in schema.fields() {
            let value = features.get(&field.name).unwrap_or(&FeatureValue::Null);
            let cell = coerce(&field.name, value, field.kind)?;
            cells.push((field.name.clone(), cell));
        }

        Ok(Self { cells })
    }

    pub fn cells(&self) -> &[(String, Cell)] {
        &self.cells
    }

    pub fn get(&self, name: &str) -> Option<&Cell> {
        self.cells.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

fn coerce(field: &str, value: &FeatureValue, kind: FieldKind) -> Result<Cell> {
    let fail = |reason: String| RiskError::Coercion {
        field: field.to_string(),
        reason,
    };

    match kind {
        FieldKind::Numeric => match value {
            FeatureValue::Number(n) => Ok(Cell::Float(*n as f32)),
            FeatureValue::Bool(b) => Ok(Cell::Float(if *b { 1.0 } else { 0.0 })),
            // missing numerics are imputed inside the model graph
            FeatureValue::Null => Ok(Cell::Float(f32::NAN)),
            FeatureValue::Text(s) => s
                .trim()
                .parse::<f64>()
                .map(|n| Cell::Float(n as f32))
                .map_err(|_| fail(format!("expected a number, got {:?}", s))),
        },
        FieldKind::Categorical => match value {
            FeatureValue::Text(s) => Ok(Cell::Text(s.clone())),
            FeatureValue::Null => Ok(Cell::Text(FeatureValue::UNKNOWN.to_string())),
            other => Err(fail(format!(
                "expected a string category, got {}",
                other.type_name()
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::align;

    fn schema() -> FeatureSchema {
        FeatureSchema::from_names(&["amt_credit", "name_contract_type", "flag_own_car"])
    }

    #[test]
    fn test_row_follows_schema_order() {
        let mut input = FeatureMap::new();
        input.insert("flag_own_car".to_string(), FeatureValue::Bool(true));
        input.insert("amt_credit".to_string(), FeatureValue::Text(" 250000 ".to_string()));
        input.insert("unused".to_string(), FeatureValue::Number(3.0));

        let (aligned, _) = align(&input, &schema());
        let row = ModelRow::from_aligned(&aligned, &schema()).unwrap();

        let names: Vec<&str> = row.cells().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["amt_credit", "name_contract_type", "flag_own_car"]);
        assert_eq!(row.get("amt_credit"), Some(&Cell::Float(250000.0)));
        assert_eq!(row.get("name_contract_type"), Some(&Cell::Text("Unknown".to_string())));
        assert_eq!(row.get("flag_own_car"), Some(&Cell::Float(1.0)));
        assert!(row.get("unused").is_none());
    }

    #[test]
    fn test_null_numeric_becomes_nan() {
        let mut input = FeatureMap::new();
        input.insert("amt_credit".to_string(), FeatureValue::Null);

        let (aligned, _) = align(&input, &schema());
        let row = ModelRow::from_aligned(&aligned, &schema()).unwrap();

        match row.get("amt_credit") {
            Some(Cell::Float(v)) => assert!(v.is_nan()),
            other => panic!("unexpected cell {:?}", other),
        }
    }

    #[test]
    fn test_null_category_becomes_unknown() {
        let mut input = FeatureMap::new();
        input.insert("name_contract_type".to_string(), FeatureValue::Null);

        let (aligned, missing) = align(&input, &schema());
        let row = ModelRow::from_aligned(&aligned, &schema()).unwrap();

        assert!(!missing.contains(&"name_contract_type".to_string()));
        assert_eq!(row.get("name_contract_type"), Some(&Cell::Text("Unknown".to_string())));
    }

    #[test]
    fn test_coercion_errors_name_the_field() {
        let mut input = FeatureMap::new();
        input.insert("name_contract_type".to_string(), FeatureValue::Number(4.0));

        let (aligned, _) = align(&input, &schema());
        match ModelRow::from_aligned(&aligned, &schema()) {
            Err(RiskError::Coercion { field, .. }) => assert_eq!(field, "name_contract_type"),
            other => panic!("expected coercion error, got {:?}", other),
        }

        let mut input = FeatureMap::new();
        input.insert("amt_credit".to_string(), FeatureValue::Text("a lot".to_string()));
        let (aligned, _) = align(&input, &schema());
        assert!(matches!(
            ModelRow::from_aligned(&aligned, &schema()),
            Err(RiskError::Coercion { .. })
        ));
    }
}
