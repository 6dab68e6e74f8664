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

//! Catalog of valid entity ids, loaded once per client.

use crate::client::{ApiRequest, RequestExecutor};
use crate::errors::{PvLiveError, PvLiveResult};
use crate::types::{Batch, EntityKind};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Read-only lookup of the GSP and PES ids known to the API
#[derive(Debug, Clone, Default)]
pub struct EntityCatalog {
    gsp_ids: BTreeSet<u32>,
    pes_ids: BTreeSet<u32>,
    gsp_list: Batch,
    pes_list: Batch,
}

impl EntityCatalog {
    /// Build a catalog from bare id lists (no descriptive columns)
    pub fn from_ids(
        gsp_ids: impl IntoIterator<Item = u32>,
        pes_ids: impl IntoIterator<Item = u32>,
    ) -> Self {
        Self {
            gsp_ids: gsp_ids.into_iter().collect(),
            pes_ids: pes_ids.into_iter().collect(),
            gsp_list: Batch::default(),
            pes_list: Batch::default(),
        }
    }

    /// Build a catalog from the `gsp_list` / `pes_list` responses
    pub fn from_lists(gsp_list: Batch, pes_list: Batch) -> PvLiveResult<Self> {
        let gsp_ids = extract_ids(&gsp_list, EntityKind::Gsp)?;
        let pes_ids = extract_ids(&pes_list, EntityKind::Pes)?;
        Ok(Self {
            gsp_ids,
            pes_ids,
            gsp_list,
            pes_list,
        })
    }

    pub fn ids(&self, kind: EntityKind) -> &BTreeSet<u32> {
        match kind {
            EntityKind::Gsp => &self.gsp_ids,
            EntityKind::Pes => &self.pes_ids,
        }
    }

    pub fn contains(&self, kind: EntityKind, id: u32) -> bool {
        self.ids(kind).contains(&id)
    }

    /// Full GSP listing as returned by the API (names, regions, ...)
    pub fn gsp_list(&self) -> &Batch {
        &self.gsp_list
    }

    pub fn pes_list(&self) -> &Batch {
        &self.pes_list
    }
}

/// Fetch both entity lists through `executor` and build the catalog
pub fn load_catalog<E: RequestExecutor + ?Sized>(executor: &E) -> PvLiveResult<EntityCatalog> {
    let gsp_list = executor.execute(&ApiRequest::catalog(EntityKind::Gsp))?;
    let pes_list = executor.execute(&ApiRequest::catalog(EntityKind::Pes))?;
    let catalog = EntityCatalog::from_lists(gsp_list, pes_list)?;
    info!(
        "Loaded entity catalog: {} GSPs, {} PES regions",
        catalog.gsp_ids.len(),
        catalog.pes_ids.len()
    );
    Ok(catalog)
}

fn extract_ids(list: &Batch, kind: EntityKind) -> PvLiveResult<BTreeSet<u32>> {
    let column = list.column(kind.id_column()).ok_or_else(|| {
        PvLiveError::Communication(format!(
            "{} response has no '{}' column",
            kind.list_path(),
            kind.id_column()
        ))
    })?;

    let ids: BTreeSet<u32> = column.into_iter().filter_map(id_value).collect();
    debug!("{}: {} distinct ids", kind.list_path(), ids.len());
    Ok(ids)
}

fn id_value(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= f64::from(u32::MAX))
                    .map(|f| f as u32)
            }),
        Value::String(s) => s.trim().parse().ok(),
        Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
    }
}
