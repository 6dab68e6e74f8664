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

//! FluxION PV_Live - client for the Sheffield Solar PV_Live generation API
//!
//! Turns arbitrarily long intervals into a sequence of API-compliant requests,
//! retries transient failures with exponential backoff, and hands back one
//! ordered result as records or as a typed table.

pub mod align;
pub mod catalog;
pub mod chunker;
pub mod client;
pub mod config;
pub mod deployment;
pub mod errors;
pub mod normalize;
pub mod orchestrator;
pub mod table;
pub mod types;
pub mod validation;

pub use align::{align_to_period, parse_instant, reporting_day};
pub use catalog::{EntityCatalog, load_catalog};
pub use chunker::{SpanLimits, chunk_range};
pub use client::{ApiRequest, HttpExecutor, RequestExecutor, RetryPolicy};
pub use config::PvLiveConfig;
pub use deployment::{DeploymentQuery, DeploymentRegion, ReleaseSelector};
pub use errors::{ErrorKind, PvLiveError, PvLiveResult};
pub use normalize::{OutputShape, QueryOutput};
pub use orchestrator::{PvLive, Query};
pub use table::{Column, ColumnData, Table};
pub use types::{Batch, EntityKind, EntityRef, Meta, Period, Record, TimeRange};
