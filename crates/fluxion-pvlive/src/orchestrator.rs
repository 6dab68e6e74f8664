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

//! Query façade: latest, at, between, day peak and day energy

use crate::align::{align_to_period, reporting_day};
use crate::catalog::{EntityCatalog, load_catalog};
use crate::chunker::{SpanLimits, chunk_range};
use crate::client::{ApiRequest, HttpExecutor, RequestExecutor};
use crate::config::PvLiveConfig;
use crate::errors::{PvLiveError, PvLiveResult};
use crate::normalize::{Cardinality, OutputShape, QueryOutput, normalize};
use crate::types::{Batch, EntityRef, GENERATION_COLUMN, Period, TimeRange};
use crate::validation::{validate_entity, validate_extra_fields};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;
use tracing::{debug, info};

/// What to ask for: entity, extra fields, period and output shape
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Query {
    pub entity: EntityRef,
    pub extra_fields: Vec<String>,
    pub period: Period,
    pub shape: OutputShape,
}

impl Query {
    pub fn new(entity: EntityRef) -> Self {
        Self {
            entity,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_extra_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_period(mut self, period: Period) -> Self {
        self.period = period;
        self
    }

    #[must_use]
    pub fn with_shape(mut self, shape: OutputShape) -> Self {
        self.shape = shape;
        self
    }

    #[must_use]
    pub fn as_table(self) -> Self {
        self.with_shape(OutputShape::Table)
    }
}

/// PV_Live client.
///
/// Holds the request executor and the entity catalog loaded at construction.
/// Long intervals are split into chunks that respect the API's maximum span
/// and fetched one after another; callers see a single ordered result.
#[derive(Debug)]
pub struct PvLive<E = HttpExecutor> {
    executor: E,
    catalog: EntityCatalog,
    limits: SpanLimits,
}

impl PvLive {
    /// Build the HTTP executor from `config` and load the entity catalog
    pub fn connect(config: &PvLiveConfig) -> PvLiveResult<Self> {
        info!("🔌 Connecting to PV_Live API at {}", config.api_base_url());
        let executor = HttpExecutor::from_config(config)?;
        let limits = config.span_limits()?;
        let catalog = load_catalog(&executor)?;
        Ok(Self::new(executor, catalog, limits))
    }
}

impl<E: RequestExecutor> PvLive<E> {
    pub fn new(executor: E, catalog: EntityCatalog, limits: SpanLimits) -> Self {
        Self {
            executor,
            catalog,
            limits,
        }
    }

    pub fn catalog(&self) -> &EntityCatalog {
        &self.catalog
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn span_limits(&self) -> SpanLimits {
        self.limits
    }

    /// Most recent estimate; an all-null record if there is none yet
    pub fn latest(&self, query: &Query) -> PvLiveResult<QueryOutput> {
        self.check(query)?;
        let request = ApiRequest::entity(&query.entity, None, query.period, &query.extra_fields);
        let mut batch = self.executor.execute(&request)?;
        self.fill_meta(&mut batch, query);
        normalize(batch, query.shape, Cardinality::Single)
    }

    /// Estimate for the interval ending at or after `instant`
    pub fn at<Tz: TimeZone>(
        &self,
        instant: DateTime<Tz>,
        query: &Query,
    ) -> PvLiveResult<QueryOutput> {
        let batch = self.fetch_between(instant.clone(), instant, query)?;
        normalize(batch, query.shape, Cardinality::Single)
    }

    /// Every estimate from `start` to `end`, both rounded up to the period grid
    pub fn between<Tz: TimeZone>(
        &self,
        start: DateTime<Tz>,
        end: DateTime<Tz>,
        query: &Query,
    ) -> PvLiveResult<QueryOutput> {
        let batch = self.fetch_between(start, end, query)?;
        normalize(batch, query.shape, Cardinality::Many)
    }

    /// Highest-generation record of a day, or `None` if every measure is null
    pub fn day_peak(&self, date: NaiveDate, query: &Query) -> PvLiveResult<Option<QueryOutput>> {
        let mut batch = self.fetch_range(reporting_day(date, query.period), query)?;
        let Some(index) = peak_index(&batch)? else {
            debug!("[PVLIVE] No peak for {} on {}", query.entity, date);
            return Ok(None);
        };

        let peak = batch.records.swap_remove(index);
        let batch = Batch::new(batch.meta, vec![peak]);
        normalize(batch, query.shape, Cardinality::Single).map(Some)
    }

    /// Generation over a day in MWh at the 30-minute resolution
    pub fn day_energy(&self, date: NaiveDate, entity: EntityRef) -> PvLiveResult<Option<f64>> {
        self.day_energy_with_period(date, entity, Period::ThirtyMinutes)
    }

    /// Generation over a day in MWh; null measures count as zero
    pub fn day_energy_with_period(
        &self,
        date: NaiveDate,
        entity: EntityRef,
        period: Period,
    ) -> PvLiveResult<Option<f64>> {
        let query = Query::new(entity).with_period(period);
        let batch = self.fetch_range(reporting_day(date, period), &query)?;
        if batch.is_empty() {
            return Ok(None);
        }

        let column = generation_index(&batch)?;
        let total_mw: f64 = batch
            .records
            .iter()
            .filter_map(|r| r.get(column).and_then(Value::as_f64))
            .sum();
        Ok(Some(total_mw * period.hours()))
    }

    fn check(&self, query: &Query) -> PvLiveResult<()> {
        validate_entity(&self.catalog, &query.entity)?;
        validate_extra_fields(&query.extra_fields)
    }

    fn fetch_between<Tz: TimeZone>(
        &self,
        start: DateTime<Tz>,
        end: DateTime<Tz>,
        query: &Query,
    ) -> PvLiveResult<Batch> {
        let requested = TimeRange::new(start.with_timezone(&Utc), end.with_timezone(&Utc))?;
        let range = TimeRange::new(
            align_to_period(requested.start(), query.period),
            align_to_period(requested.end(), query.period),
        )?;
        self.fetch_range(range, query)
    }

    /// Fetch an aligned range chunk by chunk. Any failure discards the
    /// records gathered so far.
    fn fetch_range(&self, range: TimeRange, query: &Query) -> PvLiveResult<Batch> {
        self.check(query)?;
        let chunks = chunk_range(
            range.start(),
            range.end(),
            &query.entity,
            query.period,
            &self.limits,
        )?;
        debug!(
            "[PVLIVE] {} from {} to {} in {} chunk(s)",
            query.entity,
            range.start(),
            range.end(),
            chunks.len()
        );

        let mut batch = Batch::default();
        for (i, chunk) in chunks.iter().enumerate() {
            let request =
                ApiRequest::entity(&query.entity, Some(*chunk), query.period, &query.extra_fields);
            let part = self.executor.execute(&request)?;
            debug!(
                "[PVLIVE] Chunk {}/{}: {} records",
                i + 1,
                chunks.len(),
                part.len()
            );
            batch.append(part)?;
        }

        self.fill_meta(&mut batch, query);
        Ok(batch)
    }

    fn fill_meta(&self, batch: &mut Batch, query: &Query) {
        if batch.meta.is_empty() {
            batch.meta = query.entity.default_meta(&query.extra_fields);
        }
    }
}

fn generation_index(batch: &Batch) -> PvLiveResult<usize> {
    batch.meta.position(GENERATION_COLUMN).ok_or_else(|| {
        PvLiveError::Communication(format!("response has no '{GENERATION_COLUMN}' field"))
    })
}

/// First record holding the largest non-null measure
fn peak_index(batch: &Batch) -> PvLiveResult<Option<usize>> {
    if batch.is_empty() {
        return Ok(None);
    }
    let column = generation_index(batch)?;

    let mut best: Option<(usize, f64)> = None;
    for (i, record) in batch.records.iter().enumerate() {
        let Some(value) = record.get(column).and_then(Value::as_f64) else {
            continue;
        };
        if best.is_none_or(|(_, max)| value > max) {
            best = Some((i, value));
        }
    }
    Ok(best.map(|(i, _)| i))
}
