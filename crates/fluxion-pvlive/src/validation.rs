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

//! Input checks run before any request is issued.

use crate::catalog::EntityCatalog;
use crate::errors::{PvLiveError, PvLiveResult};
use crate::types::{EntityKind, EntityRef, Period};

/// Check the entity exists in the catalog.
///
/// PES id 0 (national) is accepted without a catalog entry; GSP ids, including
/// 0, must be listed.
pub fn validate_entity(catalog: &EntityCatalog, entity: &EntityRef) -> PvLiveResult<()> {
    let known = match entity.kind {
        EntityKind::Pes => entity.is_national() || catalog.contains(entity.kind, entity.id),
        EntityKind::Gsp => catalog.contains(entity.kind, entity.id),
    };
    if known {
        Ok(())
    } else {
        Err(PvLiveError::InvalidEntity(format!(
            "the {} {} was not found",
            entity.kind.id_column(),
            entity.id
        )))
    }
}

pub fn validate_period(minutes: u32) -> PvLiveResult<Period> {
    Period::try_from(minutes)
}

/// Field names are sent comma-joined, so they cannot contain commas or spaces
pub fn validate_extra_fields(fields: &[String]) -> PvLiveResult<()> {
    for field in fields {
        if field.is_empty() {
            return Err(PvLiveError::InvalidInput(
                "extra_fields contains an empty field name".to_string(),
            ));
        }
        if field.contains(',') || field.chars().any(char::is_whitespace) {
            return Err(PvLiveError::InvalidInput(format!(
                "extra field '{field}' must not contain commas or whitespace"
            )));
        }
    }
    Ok(())
}

/// Split a comma-separated field list as accepted on the command line
pub fn parse_extra_fields(list: &str) -> PvLiveResult<Vec<String>> {
    if list.trim().is_empty() {
        return Ok(Vec::new());
    }
    let fields: Vec<String> = list.split(',').map(|f| f.trim().to_string()).collect();
    validate_extra_fields(&fields)?;
    Ok(fields)
}

/// Validate raw, untyped inputs (kind name, id, period minutes)
pub fn validate(
    catalog: &EntityCatalog,
    kind: &str,
    id: u32,
    period_minutes: u32,
) -> PvLiveResult<(EntityRef, Period)> {
    let entity = EntityRef::new(kind.parse()?, id);
    validate_entity(catalog, &entity)?;
    let period = validate_period(period_minutes)?;
    Ok((entity, period))
}
