//! Result normalisation: project one root property of an extraction result
//! into a flat table.
//!
//! Columns come from the group's declared fields in order, followed by the
//! fields of nested groups flattened as `Parent.child`. A value missing from
//! the source record becomes an absent cell (`None`); it is never coerced to
//! zero or an empty string. JSON `null` is treated as missing.

use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanBuilder, Date32Builder, Float64Builder, StringBuilder};
use arrow::datatypes::Date32Type;
use arrow::error::ArrowError;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::blueprint::{Cardinality, FieldSpec, GroupSpec, ROOT_GROUP, Schema, ValueType};
use crate::error::{Expected, NormalizeError};
use crate::result::ExtractionResult;
use crate::schema::arrow_types;
use crate::sort_key::compare_cells;

/// Date layouts accepted for `date` fields.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d-%b-%Y", "%B %d, %Y"];

/// A present, typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    Number(f64),
    Boolean(bool),
    Date(NaiveDate),
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Date(d) => write!(f, "{d}"),
        }
    }
}

/// A table cell; `None` marks a value the source did not contain.
pub type Cell = Option<Scalar>;

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub value_type: ValueType,
}

impl Column {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
        }
    }
}

/// Rows of one group, each with exactly one cell per column.
#[derive(Debug, Clone, PartialEq)]
pub struct TabularView {
    group: String,
    columns: Vec<Column>,
    rows: Vec<Vec<Cell>>,
}

impl TabularView {
    /// Root property the table was built from.
    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Cell at `row` in the named column; `None` if either is out of range.
    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Stable sort by one column, absent values last.
    pub fn sort_by_column(&mut self, column: &str) -> Result<(), NormalizeError> {
        let idx = self
            .column_index(column)
            .ok_or_else(|| NormalizeError::UnknownColumn {
                group: self.group.clone(),
                column: column.to_string(),
            })?;
        self.rows.sort_by(|a, b| compare_cells(&a[idx], &b[idx]));
        Ok(())
    }

    /// Convert to an Arrow batch. Absent cells become nulls.
    pub fn to_record_batch(&self) -> Result<RecordBatch, ArrowError> {
        let schema = Arc::new(arrow_types::table_schema(&self.columns));
        let arrays: Vec<ArrayRef> = self
            .columns
            .iter()
            .enumerate()
            .map(|(idx, col)| self.column_array(idx, col.value_type))
            .collect();
        let options = RecordBatchOptions::new().with_row_count(Some(self.rows.len()));
        RecordBatch::try_new_with_options(schema, arrays, &options)
    }

    fn column_array(&self, idx: usize, value_type: ValueType) -> ArrayRef {
        let cells = self.rows.iter().map(|r| r[idx].as_ref());
        match value_type {
            ValueType::String => {
                let mut b = StringBuilder::new();
                for cell in cells {
                    b.append_option(match cell {
                        Some(Scalar::String(s)) => Some(s.as_str()),
                        _ => None,
                    });
                }
                Arc::new(b.finish())
            }
            ValueType::Number => {
                let mut b = Float64Builder::new();
                for cell in cells {
                    b.append_option(match cell {
                        Some(Scalar::Number(n)) => Some(*n),
                        _ => None,
                    });
                }
                Arc::new(b.finish())
            }
            ValueType::Boolean => {
                let mut b = BooleanBuilder::new();
                for cell in cells {
                    b.append_option(match cell {
                        Some(Scalar::Boolean(v)) => Some(*v),
                        _ => None,
                    });
                }
                Arc::new(b.finish())
            }
            ValueType::Date => {
                let mut b = Date32Builder::new();
                for cell in cells {
                    b.append_option(match cell {
                        Some(Scalar::Date(d)) => Some(Date32Type::from_naive_date(*d)),
                        _ => None,
                    });
                }
                Arc::new(b.finish())
            }
        }
    }
}

/// Project root property `group` of `result` into a table.
///
/// A `single` property becomes a one-row table, a `repeated` property one row
/// per item. With `sort_key`, rows are stably sorted by that column. The
/// result is only read, never modified.
pub fn to_table(
    schema: &Schema,
    result: &ExtractionResult,
    group: &str,
    sort_key: Option<&str>,
) -> Result<TabularView, NormalizeError> {
    let unknown = || NormalizeError::UnknownGroup {
        group: group.to_string(),
        schema: schema.name().to_string(),
    };
    let prop = schema.root_property(group).ok_or_else(unknown)?;
    let spec = schema.group(&prop.group).ok_or_else(unknown)?;
    let value = result.values.get(group).ok_or_else(unknown)?;

    let mut columns = Vec::new();
    flatten_columns(schema, spec, "", &mut columns);

    let mut rows = Vec::new();
    match (prop.cardinality, value) {
        (Cardinality::Single, Value::Object(record)) => {
            rows.push(record_row(schema, spec, group, 0, record, columns.len())?);
        }
        (Cardinality::Single, Value::Null) => rows.push(vec![None; columns.len()]),
        (Cardinality::Single, other) => {
            return Err(mismatch(group, 0, group, Expected::Record, other));
        }
        (Cardinality::Repeated, Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                let Value::Object(record) = item else {
                    return Err(mismatch(group, i, group, Expected::Record, item));
                };
                rows.push(record_row(schema, spec, group, i, record, columns.len())?);
            }
        }
        (Cardinality::Repeated, Value::Null) => {}
        (Cardinality::Repeated, other) => {
            return Err(mismatch(group, 0, group, Expected::Records, other));
        }
    }

    let mut table = TabularView {
        group: group.to_string(),
        columns,
        rows,
    };
    if let Some(key) = sort_key {
        table.sort_by_column(key)?;
    }
    Ok(table)
}

/// The document-level scalar fields as a single-row table.
pub fn to_form(schema: &Schema, result: &ExtractionResult) -> Result<TabularView, NormalizeError> {
    let columns: Vec<Column> = schema
        .fields()
        .iter()
        .map(|f| Column::new(&f.name, f.value_type))
        .collect();
    let mut row = Vec::with_capacity(columns.len());
    for field in schema.fields() {
        row.push(scalar_cell(ROOT_GROUP, 0, field, &field.name, result.values.get(&field.name))?);
    }
    Ok(TabularView {
        group: ROOT_GROUP.to_string(),
        columns,
        rows: vec![row],
    })
}

fn flatten_columns(schema: &Schema, spec: &GroupSpec, prefix: &str, out: &mut Vec<Column>) {
    for field in &spec.fields {
        out.push(Column::new(format!("{prefix}{}", field.name), field.value_type));
    }
    for nested in &spec.nested {
        if let Some(inner) = schema.group(&nested.group) {
            flatten_columns(schema, inner, &format!("{prefix}{}.", nested.name), out);
        }
    }
}

fn record_row(
    schema: &Schema,
    spec: &GroupSpec,
    group: &str,
    row: usize,
    record: &Map<String, Value>,
    width: usize,
) -> Result<Vec<Cell>, NormalizeError> {
    let mut cells = Vec::with_capacity(width);
    push_record(schema, spec, group, row, "", Some(record), &mut cells)?;
    Ok(cells)
}

fn push_record(
    schema: &Schema,
    spec: &GroupSpec,
    group: &str,
    row: usize,
    prefix: &str,
    record: Option<&Map<String, Value>>,
    out: &mut Vec<Cell>,
) -> Result<(), NormalizeError> {
    for field in &spec.fields {
        let path = format!("{prefix}{}", field.name);
        let value = record.and_then(|r| r.get(&field.name));
        out.push(scalar_cell(group, row, field, &path, value)?);
    }
    for nested in &spec.nested {
        let Some(inner) = schema.group(&nested.group) else {
            continue;
        };
        let path = format!("{prefix}{}", nested.name);
        let inner_record = match record.and_then(|r| r.get(&nested.name)) {
            None | Some(Value::Null) => None,
            Some(Value::Object(obj)) => Some(obj),
            Some(other) => return Err(mismatch(group, row, &path, Expected::Record, other)),
        };
        push_record(schema, inner, group, row, &format!("{path}."), inner_record, out)?;
    }
    Ok(())
}

fn scalar_cell(
    group: &str,
    row: usize,
    field: &FieldSpec,
    path: &str,
    value: Option<&Value>,
) -> Result<Cell, NormalizeError> {
    let value = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(v) => v,
    };
    let expected = Expected::Scalar(field.value_type);
    let scalar = match (field.value_type, value) {
        (ValueType::String, Value::String(s)) => Scalar::String(s.clone()),
        (ValueType::Number, Value::Number(n)) => match n.as_f64() {
            Some(v) => Scalar::Number(v),
            None => return Err(mismatch(group, row, path, expected, value)),
        },
        (ValueType::Boolean, Value::Bool(b)) => Scalar::Boolean(*b),
        (ValueType::Date, Value::String(s)) => match parse_date(s) {
            Some(d) => Scalar::Date(d),
            None => return Err(mismatch(group, row, path, expected, value)),
        },
        _ => return Err(mismatch(group, row, path, expected, value)),
    };
    Ok(Some(scalar))
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

fn mismatch(group: &str, row: usize, field: &str, expected: Expected, found: &Value) -> NormalizeError {
    NormalizeError::TypeMismatch {
        group: group.to_string(),
        row,
        field: field.to_string(),
        expected,
        found: describe(found),
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".into(),
        Value::Bool(b) => format!("boolean {b}"),
        Value::Number(n) => format!("number {n}"),
        Value::String(s) => format!("string {s:?}"),
        Value::Array(a) => format!("array of {}", a.len()),
        Value::Object(_) => "object".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Float64Array, StringArray};
    use serde_json::json;

    const BLUEPRINT: &str = include_str!("../testdata/well_completion_report.json");
    const RESULT: &str = include_str!("../testdata/well_completion_report_result.json");

    fn sample() -> (Schema, ExtractionResult) {
        (
            Schema::from_json("well_completion_report", BLUEPRINT).unwrap(),
            ExtractionResult::from_json(RESULT).unwrap(),
        )
    }

    fn casing_only() -> Schema {
        let blueprint = json!({
            "class": "Engineering Report",
            "definitions": {
                "Casing_Summary": {
                    "type": "object",
                    "properties": {
                        "Size": { "type": "string", "instruction": "Casing OD" },
                        "Weight": { "type": "number", "instruction": "lb/ft" },
                        "Depth": { "type": "number", "instruction": "Set depth" }
                    }
                }
            },
            "properties": {
                "Casing_Summary": { "type": "array", "items": { "$ref": "#/definitions/Casing_Summary" } }
            }
        });
        Schema::from_json("casing", &blueprint.to_string()).unwrap()
    }

    fn result_with(values: Value) -> ExtractionResult {
        let Value::Object(map) = values else {
            panic!("values must be an object")
        };
        ExtractionResult::new("casing", map)
    }

    fn num(v: f64) -> Cell {
        Some(Scalar::Number(v))
    }

    #[test]
    fn missing_value_is_absent_not_zero() {
        let result = result_with(json!({
            "Casing_Summary": [
                { "Size": "5 1/2", "Weight": 17, "Depth": 12000 },
                { "Size": "7", "Weight": 23 }
            ]
        }));
        let table = to_table(&casing_only(), &result, "Casing_Summary", None).unwrap();
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.column_names(), ["Size", "Weight", "Depth"]);
        assert_eq!(table.cell(0, "Depth"), Some(&num(12000.0)));
        assert_eq!(table.cell(1, "Depth"), Some(&None));
        assert!(table.rows().iter().all(|r| r.len() == 3));
    }

    #[test]
    fn empty_string_is_kept_distinct_from_absent() {
        let result = result_with(json!({
            "Casing_Summary": [{ "Size": "", "Weight": 17 }]
        }));
        let table = to_table(&casing_only(), &result, "Casing_Summary", None).unwrap();
        assert_eq!(table.cell(0, "Size"), Some(&Some(Scalar::String(String::new()))));
        assert_eq!(table.cell(0, "Depth"), Some(&None));
    }

    #[test]
    fn unknown_group_leaves_result_untouched() {
        let (schema, result) = sample();
        let before = result.clone();
        let err = to_table(&schema, &result, "NoSuchGroup", None).unwrap_err();
        assert!(matches!(err, NormalizeError::UnknownGroup { ref group, .. } if group == "NoSuchGroup"));
        assert_eq!(result, before);
    }

    #[test]
    fn declared_group_missing_from_result_is_unknown() {
        let result = result_with(json!({}));
        let err = to_table(&casing_only(), &result, "Casing_Summary", None).unwrap_err();
        assert!(matches!(err, NormalizeError::UnknownGroup { .. }));
    }

    #[test]
    fn single_group_is_one_row_with_flattened_nested_columns() {
        let (schema, result) = sample();
        let table = to_table(&schema, &result, "Well_Identification", None).unwrap();
        assert_eq!(table.num_rows(), 1);
        assert_eq!(
            table.column_names(),
            [
                "API_Number",
                "Well_Name",
                "County",
                "Horizontal",
                "Location.Latitude",
                "Location.Longitude"
            ]
        );
        assert_eq!(table.cell(0, "Horizontal"), Some(&Some(Scalar::Boolean(true))));
        assert_eq!(table.cell(0, "Location.Latitude"), Some(&num(32.1043)));
    }

    #[test]
    fn missing_nested_record_fills_absent() {
        let (schema, mut result) = sample();
        result.values["Well_Identification"]
            .as_object_mut()
            .unwrap()
            .remove("Location");
        let table = to_table(&schema, &result, "Well_Identification", None).unwrap();
        assert_eq!(table.cell(0, "Location.Longitude"), Some(&None));
        assert_eq!(table.rows()[0].len(), table.columns().len());
    }

    #[test]
    fn sorts_numeric_with_absent_last() {
        let (schema, result) = sample();
        let table = to_table(&schema, &result, "Casing_Summary", Some("Depth")).unwrap();
        let depths: Vec<Cell> = (0..table.num_rows())
            .map(|i| table.cell(i, "Depth").unwrap().clone())
            .collect();
        assert_eq!(depths, vec![num(450.0), num(4800.0), num(12000.0), None]);
    }

    #[test]
    fn sorts_dates_chronologically() {
        let (schema, result) = sample();
        let table = to_table(&schema, &result, "Perforations", Some("Date")).unwrap();
        let tops: Vec<Cell> = (0..3).map(|i| table.cell(i, "Top").unwrap().clone()).collect();
        assert_eq!(tops, vec![num(10420.0), num(11850.0), num(11010.0)]);
    }

    #[test]
    fn sort_is_stable_for_ties() {
        let result = result_with(json!({
            "Casing_Summary": [
                { "Size": "a", "Weight": 1 },
                { "Size": "b", "Weight": 0 },
                { "Size": "c", "Weight": 1 },
                { "Size": "d", "Weight": 0 }
            ]
        }));
        let table = to_table(&casing_only(), &result, "Casing_Summary", Some("Weight")).unwrap();
        let sizes: Vec<String> = table
            .rows()
            .iter()
            .map(|r| r[0].as_ref().unwrap().to_string())
            .collect();
        assert_eq!(sizes, ["b", "d", "a", "c"]);
    }

    #[test]
    fn unknown_sort_column() {
        let (schema, result) = sample();
        let err = to_table(&schema, &result, "Casing_Summary", Some("Grade")).unwrap_err();
        assert!(matches!(err, NormalizeError::UnknownColumn { ref column, .. } if column == "Grade"));
    }

    #[test]
    fn type_mismatch_is_reported_not_coerced() {
        let result = result_with(json!({
            "Casing_Summary": [{ "Size": "7", "Weight": "23 lb/ft" }]
        }));
        let err = to_table(&casing_only(), &result, "Casing_Summary", None).unwrap_err();
        assert!(matches!(
            err,
            NormalizeError::TypeMismatch { ref field, row: 0, expected: Expected::Scalar(ValueType::Number), .. }
                if field == "Weight"
        ));
    }

    #[test]
    fn unparseable_date_is_a_mismatch() {
        let (schema, mut result) = sample();
        result.values["Perforations"][0]["Date"] = json!("sometime in March");
        let err = to_table(&schema, &result, "Perforations", None).unwrap_err();
        assert!(matches!(err, NormalizeError::TypeMismatch { row: 0, .. }));
    }

    #[test]
    fn repeated_group_given_an_object_is_a_mismatch() {
        let result = result_with(json!({ "Casing_Summary": { "Size": "7" } }));
        let err = to_table(&casing_only(), &result, "Casing_Summary", None).unwrap_err();
        assert!(matches!(err, NormalizeError::TypeMismatch { expected: Expected::Records, .. }));
    }

    #[test]
    fn null_repeated_group_is_empty() {
        let result = result_with(json!({ "Casing_Summary": null }));
        let table = to_table(&casing_only(), &result, "Casing_Summary", None).unwrap();
        assert_eq!(table.num_rows(), 0);
        assert_eq!(table.columns().len(), 3);
    }

    #[test]
    fn idempotent() {
        let (schema, result) = sample();
        let before = result.clone();
        let a = to_table(&schema, &result, "Perforations", Some("Top")).unwrap();
        let b = to_table(&schema, &result, "Perforations", Some("Top")).unwrap();
        assert_eq!(a, b);
        assert_eq!(result, before);
    }

    #[test]
    fn date_formats() {
        let expected = NaiveDate::from_ymd_opt(2023, 4, 17);
        assert_eq!(parse_date("2023-04-17"), expected);
        assert_eq!(parse_date("04/17/2023"), expected);
        assert_eq!(parse_date("17-Apr-2023"), expected);
        assert_eq!(parse_date("April 17, 2023"), expected);
        assert_eq!(parse_date("Q2 2023"), None);
    }

    #[test]
    fn form_holds_document_fields() {
        let (schema, result) = sample();
        let form = to_form(&schema, &result).unwrap();
        assert_eq!(form.num_rows(), 1);
        assert_eq!(form.column_names(), ["Operator", "Report_Date"]);
        assert_eq!(
            form.cell(0, "Report_Date"),
            Some(&Some(Scalar::Date(NaiveDate::from_ymd_opt(2023, 4, 17).unwrap())))
        );
    }

    #[test]
    fn record_batch_keeps_nulls_and_empty_strings() {
        let result = result_with(json!({
            "Casing_Summary": [
                { "Size": "", "Weight": 17, "Depth": 12000 },
                { "Weight": 23 }
            ]
        }));
        let table = to_table(&casing_only(), &result, "Casing_Summary", None).unwrap();
        let batch = table.to_record_batch().unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 3);

        let sizes = batch.column(0).as_any().downcast_ref::<StringArray>().unwrap();
        assert!(!sizes.is_null(0));
        assert_eq!(sizes.value(0), "");
        assert!(sizes.is_null(1));

        let depths = batch.column(2).as_any().downcast_ref::<Float64Array>().unwrap();
        assert_eq!(depths.value(0), 12000.0);
        assert!(depths.is_null(1));
    }

    #[test]
    fn record_batch_for_empty_table() {
        let result = result_with(json!({ "Casing_Summary": [] }));
        let table = to_table(&casing_only(), &result, "Casing_Summary", None).unwrap();
        let batch = table.to_record_batch().unwrap();
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(batch.schema().fields().len(), 3);
    }
}
