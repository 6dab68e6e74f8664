// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Tabular projection of record batches with per-column types

use crate::errors::{PvLiveError, PvLiveResult};
use crate::types::{Batch, TIMESTAMP_COLUMN};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value;
use std::io::Write;

/// Typed values of one column; `None` is the null sentinel
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Integer(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    DateTime(Vec<Option<DateTime<Utc>>>),
    Boolean(Vec<Option<bool>>),
    Text(Vec<Option<String>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            Self::Integer(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::DateTime(v) => v.len(),
            Self::Boolean(v) => v.len(),
            Self::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn null_count(&self) -> usize {
        match self {
            Self::Integer(v) => v.iter().filter(|x| x.is_none()).count(),
            Self::Float(v) => v.iter().filter(|x| x.is_none()).count(),
            Self::DateTime(v) => v.iter().filter(|x| x.is_none()).count(),
            Self::Boolean(v) => v.iter().filter(|x| x.is_none()).count(),
            Self::Text(v) => v.iter().filter(|x| x.is_none()).count(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::DateTime(_) => "datetime",
            Self::Boolean(_) => "boolean",
            Self::Text(_) => "text",
        }
    }

    /// Render one cell; nulls render as an empty string
    pub fn format_cell(&self, row: usize, float_precision: Option<usize>) -> String {
        match self {
            Self::Integer(v) => v.get(row).copied().flatten().map(|x| x.to_string()),
            Self::Float(v) => v.get(row).copied().flatten().map(|x| match float_precision {
                Some(precision) => format!("{x:.precision$}"),
                None => x.to_string(),
            }),
            Self::DateTime(v) => v
                .get(row)
                .copied()
                .flatten()
                .map(|x| x.to_rfc3339_opts(SecondsFormat::Secs, true)),
            Self::Boolean(v) => v.get(row).copied().flatten().map(|x| x.to_string()),
            Self::Text(v) => v.get(row).cloned().flatten(),
        }
        .unwrap_or_default()
    }

    fn repeat_text(value: &str, len: usize) -> Self {
        Self::Text(vec![Some(value.to_string()); len])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

/// Named, typed columns built from a [`Batch`] using its meta as headers
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
    rows: usize,
}

impl Table {
    /// Build a table, parsing the canonical timestamp column as datetimes
    pub fn from_batch(batch: &Batch) -> PvLiveResult<Self> {
        Self::from_batch_with(batch, &[TIMESTAMP_COLUMN])
    }

    pub fn from_batch_with(batch: &Batch, datetime_columns: &[&str]) -> PvLiveResult<Self> {
        let columns = batch
            .meta
            .names()
            .iter()
            .enumerate()
            .map(|(index, name)| {
                let values: Vec<&Value> = batch
                    .records
                    .iter()
                    .map(|r| r.get(index).unwrap_or(&Value::Null))
                    .collect();
                let data = if datetime_columns.contains(&name.as_str()) {
                    parse_datetime_column(name, &values)?
                } else {
                    infer_column(name, &values)
                };
                Ok(Column {
                    name: name.clone(),
                    data,
                })
            })
            .collect::<PvLiveResult<Vec<_>>>()?;

        Ok(Self {
            columns,
            rows: batch.len(),
        })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn num_rows(&self) -> usize {
        self.rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Insert a column filled with one text value
    pub fn insert_constant_column(&mut self, index: usize, name: &str, value: &str) {
        let index = index.min(self.columns.len());
        self.columns.insert(
            index,
            Column {
                name: name.to_string(),
                data: ColumnData::repeat_text(value, self.rows),
            },
        );
    }

    /// Rename a column in place. Returns false if `from` is absent.
    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        match self.columns.iter_mut().find(|c| c.name == from) {
            Some(column) => {
                column.name = to.to_string();
                true
            }
            None => false,
        }
    }

    /// Formatted cells of one row
    pub fn row(&self, index: usize, float_precision: Option<usize>) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| c.data.format_cell(index, float_precision))
            .collect()
    }

    /// Write as CSV with a header row
    pub fn write_csv<W: Write>(
        &self,
        writer: W,
        float_precision: Option<usize>,
    ) -> PvLiveResult<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(self.column_names())?;
        for index in 0..self.rows {
            wtr.write_record(self.row(index, float_precision))?;
        }
        wtr.flush()?;
        Ok(())
    }
}

fn is_integer_column(name: &str) -> bool {
    name.ends_with("_id") || name.ends_with("_count") || name == "id"
}

fn integral(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
            .map(|f| f as i64)
    })
}

fn infer_column(name: &str, values: &[&Value]) -> ColumnData {
    let present: Vec<&Value> = values.iter().copied().filter(|v| !v.is_null()).collect();

    if present.is_empty() {
        // All-null columns stay nullable instead of guessing a type
        return if is_integer_column(name) {
            ColumnData::Integer(vec![None; values.len()])
        } else {
            ColumnData::Float(vec![None; values.len()])
        };
    }

    if present.iter().all(|v| v.is_boolean()) {
        return ColumnData::Boolean(values.iter().map(|v| v.as_bool()).collect());
    }

    if present.iter().all(|v| v.is_number()) {
        if is_integer_column(name) && present.iter().all(|v| integral(v).is_some()) {
            return ColumnData::Integer(values.iter().map(|v| integral(v)).collect());
        }
        return ColumnData::Float(values.iter().map(|v| v.as_f64()).collect());
    }

    ColumnData::Text(
        values
            .iter()
            .map(|v| match v {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            })
            .collect(),
    )
}

fn parse_datetime_column(name: &str, values: &[&Value]) -> PvLiveResult<ColumnData> {
    values
        .iter()
        .map(|v| match v {
            Value::Null => Ok(None),
            Value::String(s) if s.is_empty() => Ok(None),
            Value::String(s) => parse_datetime(s).map(Some).ok_or_else(|| {
                PvLiveError::Communication(format!("unparseable {name} value '{s}'"))
            }),
            other => Err(PvLiveError::Communication(format!(
                "unexpected {name} value {other}"
            ))),
        })
        .collect::<PvLiveResult<Vec<_>>>()
        .map(ColumnData::DateTime)
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn batch() -> Batch {
        serde_json::from_value(json!({
            "data": [
                [12, "2023-12-01T12:00:00Z", 1500.25, null, "a"],
                [12, "2023-12-01T12:30:00Z", null, null, "b"]
            ],
            "meta": ["gsp_id", "datetime_gmt", "generation_mw", "ucl_mw", "label"]
        }))
        .unwrap()
    }

    #[test]
    fn test_column_types() {
        let table = Table::from_batch(&batch()).unwrap();

        assert_eq!(table.num_rows(), 2);
        assert_eq!(
            table.column_names(),
            vec!["gsp_id", "datetime_gmt", "generation_mw", "ucl_mw", "label"]
        );
        assert_eq!(
            table.column("gsp_id").unwrap().data,
            ColumnData::Integer(vec![Some(12), Some(12)])
        );
        assert_eq!(
            table.column("datetime_gmt").unwrap().data,
            ColumnData::DateTime(vec![
                Some(Utc.with_ymd_and_hms(2023, 12, 1, 12, 0, 0).unwrap()),
                Some(Utc.with_ymd_and_hms(2023, 12, 1, 12, 30, 0).unwrap()),
            ])
        );
        assert_eq!(
            table.column("generation_mw").unwrap().data,
            ColumnData::Float(vec![Some(1500.25), None])
        );
        assert_eq!(table.column("label").unwrap().data.type_name(), "text");
    }

    #[test]
    fn test_all_null_column_stays_nullable() {
        let table = Table::from_batch(&batch()).unwrap();
        let ucl = &table.column("ucl_mw").unwrap().data;
        assert_eq!(ucl.null_count(), 2);
        assert_eq!(ucl.type_name(), "float");
    }

    #[test]
    fn test_empty_batch_keeps_headers() {
        let batch = Batch::empty(["pes_id", "datetime_gmt", "generation_mw"].into_iter().collect());
        let table = Table::from_batch(&batch).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.num_columns(), 3);
    }

    #[test]
    fn test_bad_timestamp_is_an_error() {
        let batch: Batch = serde_json::from_value(json!({
            "data": [[0, "yesterday", 1.0]],
            "meta": ["pes_id", "datetime_gmt", "generation_mw"]
        }))
        .unwrap();
        assert!(Table::from_batch(&batch).is_err());
    }

    #[test]
    fn test_write_csv_with_precision() {
        let table = Table::from_batch(&batch()).unwrap();
        let mut out = Vec::new();
        table.write_csv(&mut out, Some(3)).unwrap();
        let text = String::from_utf8(out).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "gsp_id,datetime_gmt,generation_mw,ucl_mw,label");
        assert_eq!(lines[1], "12,2023-12-01T12:00:00Z,1500.250,,a");
        assert_eq!(lines[2], "12,2023-12-01T12:30:00Z,,,b");
    }

    #[test]
    fn test_insert_and_rename_columns() {
        let mut table = Table::from_batch(&batch()).unwrap();
        table.insert_constant_column(0, "release", "20240101");
        assert!(table.rename_column("ucl_mw", "upper_mw"));
        assert!(!table.rename_column("missing", "x"));

        assert_eq!(table.column_names()[0], "release");
        assert_eq!(table.row(1, None)[0], "20240101");
        assert!(table.column("upper_mw").is_some());
    }

    #[test]
    fn test_date_only_values_parse_as_midnight() {
        assert_eq!(
            parse_datetime("2015-06-01"),
            Some(Utc.with_ymd_and_hms(2015, 6, 1, 0, 0, 0).unwrap())
        );
    }
}
