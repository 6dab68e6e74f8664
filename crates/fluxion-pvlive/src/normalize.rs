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

//! Response normalisation: strip internal fields and reshape records

use crate::errors::PvLiveResult;
use crate::table::Table;
use crate::types::{Batch, Meta, Record};
use serde::{Deserialize, Serialize};

/// Record-count column the service adds for its own bookkeeping
pub const INTERNAL_COUNT_FIELD: &str = "n_records";

/// Remove internal-only fields from meta and every record. Idempotent.
pub fn strip_internal_fields(batch: &mut Batch) {
    batch.strip_field(INTERNAL_COUNT_FIELD);
}

/// Output-shape flag accepted by every query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputShape {
    /// Positional records described by a meta
    #[default]
    Records,
    Table,
}

/// Whether a query answers with one record or an ordered series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Single,
    Many,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    Record { meta: Meta, record: Record },
    Records(Batch),
    Table(Table),
}

impl QueryOutput {
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record { record, .. } => Some(record),
            Self::Records(_) | Self::Table(_) => None,
        }
    }

    pub fn into_record(self) -> Option<Record> {
        match self {
            Self::Record { record, .. } => Some(record),
            Self::Records(_) | Self::Table(_) => None,
        }
    }

    pub fn into_batch(self) -> Option<Batch> {
        match self {
            Self::Records(batch) => Some(batch),
            Self::Record { .. } | Self::Table(_) => None,
        }
    }

    pub fn into_table(self) -> Option<Table> {
        match self {
            Self::Table(table) => Some(table),
            Self::Record { .. } | Self::Records(_) => None,
        }
    }

    /// Column names, whatever the shape
    pub fn field_names(&self) -> Vec<&str> {
        match self {
            Self::Record { meta, .. } | Self::Records(Batch { meta, .. }) => {
                meta.names().iter().map(String::as_str).collect()
            }
            Self::Table(table) => table.column_names(),
        }
    }
}

/// Reshape an ordered batch for the caller.
///
/// A single-record context with no data yields an all-null record laid out
/// by `meta`.
pub fn normalize(
    mut batch: Batch,
    shape: OutputShape,
    cardinality: Cardinality,
) -> PvLiveResult<QueryOutput> {
    strip_internal_fields(&mut batch);

    if cardinality == Cardinality::Single {
        let Batch { meta, records } = batch;
        let record = records
            .into_iter()
            .next()
            .unwrap_or_else(|| Record::null(meta.len()));
        return match shape {
            OutputShape::Records => Ok(QueryOutput::Record { meta, record }),
            OutputShape::Table => Ok(QueryOutput::Table(Table::from_batch(&Batch::new(
                meta,
                vec![record],
            ))?)),
        };
    }

    match shape {
        OutputShape::Records => Ok(QueryOutput::Records(batch)),
        OutputShape::Table => Ok(QueryOutput::Table(Table::from_batch(&batch)?)),
    }
}
