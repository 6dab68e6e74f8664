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

//! Domain types shared by every stage of a query: entities, reporting periods,
//! time ranges and the positional records returned by the API.

use crate::errors::{PvLiveError, PvLiveResult};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Canonical timestamp column, labelled with the END of each reporting interval.
pub const TIMESTAMP_COLUMN: &str = "datetime_gmt";

/// Column holding the generation estimate (MW).
pub const GENERATION_COLUMN: &str = "generation_mw";

/// Aggregation entity types understood by the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// Grid Supply Point. The GSP list itself contains id 0 (national).
    Gsp,
    /// Public Electricity Supplier region. Id 0 is the national aggregate and is
    /// not listed in the PES catalog.
    Pes,
}

impl EntityKind {
    pub const ALL: [EntityKind; 2] = [EntityKind::Gsp, EntityKind::Pes];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gsp => "gsp",
            Self::Pes => "pes",
        }
    }

    /// Name of the identifier column in both data rows and catalog lists
    pub fn id_column(&self) -> &'static str {
        match self {
            Self::Gsp => "gsp_id",
            Self::Pes => "pes_id",
        }
    }

    /// API path of the catalog listing for this kind
    pub fn list_path(&self) -> &'static str {
        match self {
            Self::Gsp => "gsp_list",
            Self::Pes => "pes_list",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = PvLiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gsp" => Ok(Self::Gsp),
            "pes" => Ok(Self::Pes),
            other => Err(PvLiveError::InvalidEntity(format!(
                "the entity_type must be either 'pes' or 'gsp' (got '{other}')"
            ))),
        }
    }
}

/// A region or aggregate the API reports generation for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: u32,
}

impl EntityRef {
    pub const NATIONAL_ID: u32 = 0;

    pub fn new(kind: EntityKind, id: u32) -> Self {
        Self { kind, id }
    }

    pub fn gsp(id: u32) -> Self {
        Self::new(EntityKind::Gsp, id)
    }

    pub fn pes(id: u32) -> Self {
        Self::new(EntityKind::Pes, id)
    }

    pub fn national() -> Self {
        Self::gsp(Self::NATIONAL_ID)
    }

    pub fn is_national(&self) -> bool {
        self.id == Self::NATIONAL_ID
    }

    /// Column layout the API uses for this entity when it omits `meta`
    pub fn default_meta(&self, extra_fields: &[String]) -> Meta {
        let mut names = vec![
            self.kind.id_column().to_string(),
            TIMESTAMP_COLUMN.to_string(),
            GENERATION_COLUMN.to_string(),
        ];
        names.extend(extra_fields.iter().cloned());
        Meta::new(names)
    }
}

impl Default for EntityRef {
    fn default() -> Self {
        Self::national()
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// Reporting granularity of the generation estimates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Period {
    FiveMinutes,
    #[default]
    ThirtyMinutes,
}

impl Period {
    pub const SUPPORTED_MINUTES: [u32; 2] = [5, 30];

    pub fn minutes(&self) -> u32 {
        match self {
            Self::FiveMinutes => 5,
            Self::ThirtyMinutes => 30,
        }
    }

    pub fn duration(&self) -> TimeDelta {
        TimeDelta::minutes(i64::from(self.minutes()))
    }

    /// Length of one period in hours, used to turn MW into MWh
    pub fn hours(&self) -> f64 {
        f64::from(self.minutes()) / 60.0
    }
}

impl TryFrom<u32> for Period {
    type Error = PvLiveError;

    fn try_from(minutes: u32) -> Result<Self, Self::Error> {
        match minutes {
            5 => Ok(Self::FiveMinutes),
            30 => Ok(Self::ThirtyMinutes),
            other => Err(PvLiveError::InvalidPeriod(other)),
        }
    }
}

impl From<Period> for u32 {
    fn from(period: Period) -> Self {
        period.minutes()
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.minutes())
    }
}

/// Inclusive UTC interval with `start <= end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> PvLiveResult<Self> {
        if end < start {
            return Err(PvLiveError::InvalidInput(format!(
                "start ({start}) must not be later than end ({end})"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn instant(at: DateTime<Utc>) -> Self {
        Self { start: at, end: at }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn span(&self) -> TimeDelta {
        self.end - self.start
    }
}

/// Ordered field names describing the positions of a [`Record`]
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Meta(Vec<String>);

impl Meta {
    pub fn new(names: Vec<String>) -> Self {
        Self(names)
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|n| n == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn remove(&mut self, index: usize) -> String {
        self.0.remove(index)
    }
}

impl<S: Into<String>> FromIterator<S> for Meta {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// One positional row: entity id, timestamp, generation, then extra fields.
///
/// Missing values are JSON `null`; a row is never dropped for missing values.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Vec<Value>);

impl Record {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// Placeholder returned when the API had no data
    pub fn null(len: usize) -> Self {
        Self(vec![Value::Null; len])
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn into_values(self) -> Vec<Value> {
        self.0
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_all_null(&self) -> bool {
        self.0.iter().all(Value::is_null)
    }

    /// Entity id (first field)
    pub fn entity_id(&self) -> Option<i64> {
        self.get(0).and_then(Value::as_i64)
    }

    /// Interval-end timestamp (second field)
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.get(1)
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Generation estimate in MW (third field)
    pub fn generation_mw(&self) -> Option<f64> {
        self.get(2).and_then(Value::as_f64)
    }

    fn remove(&mut self, index: usize) {
        if index < self.0.len() {
            self.0.remove(index);
        }
    }
}

impl From<Vec<Value>> for Record {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

/// Records plus the meta describing them, as returned by one API call.
///
/// Deserializes directly from the `{"data": [...], "meta": [...]}` payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Batch {
    #[serde(default)]
    pub meta: Meta,
    #[serde(rename = "data")]
    pub records: Vec<Record>,
}

impl Batch {
    pub fn new(meta: Meta, records: Vec<Record>) -> Self {
        Self { meta, records }
    }

    pub fn empty(meta: Meta) -> Self {
        Self::new(meta, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Check every record has exactly one value per meta field
    pub fn check_shape(&self) -> PvLiveResult<()> {
        if self.meta.is_empty() {
            return Ok(());
        }
        match self
            .records
            .iter()
            .position(|r| r.len() != self.meta.len())
        {
            Some(row) => Err(PvLiveError::Communication(format!(
                "record {row} has {} fields but meta lists {}",
                self.records[row].len(),
                self.meta.len()
            ))),
            None => Ok(()),
        }
    }

    /// Remove a field from meta and every record. Returns false if absent.
    pub fn strip_field(&mut self, name: &str) -> bool {
        let Some(index) = self.meta.position(name) else {
            return false;
        };
        self.meta.remove(index);
        for record in &mut self.records {
            record.remove(index);
        }
        true
    }

    /// Values of one named column, in record order
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let index = self.meta.position(name)?;
        Some(
            self.records
                .iter()
                .map(|r| r.get(index).unwrap_or(&Value::Null))
                .collect(),
        )
    }

    /// Reorder (or project) columns by name
    pub fn select(&self, fields: &[&str]) -> PvLiveResult<Batch> {
        let indices = fields
            .iter()
            .map(|name| {
                self.meta.position(name).ok_or_else(|| {
                    PvLiveError::InvalidInput(format!("field '{name}' is not present in meta"))
                })
            })
            .collect::<PvLiveResult<Vec<_>>>()?;

        let records = self
            .records
            .iter()
            .map(|record| {
                Record::new(
                    indices
                        .iter()
                        .map(|&i| record.get(i).cloned().unwrap_or(Value::Null))
                        .collect(),
                )
            })
            .collect();

        Ok(Batch::new(fields.iter().copied().collect(), records))
    }

    /// Append the records of a later batch; both must share one meta
    pub fn append(&mut self, other: Batch) -> PvLiveResult<()> {
        if self.meta.is_empty() {
            self.meta = other.meta;
        } else if !other.meta.is_empty() && other.meta != self.meta {
            return Err(PvLiveError::Communication(format!(
                "inconsistent meta between responses: {:?} vs {:?}",
                self.meta.names(),
                other.meta.names()
            )));
        }
        self.records.extend(other.records);
        Ok(())
    }
}
