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

//! Installed-capacity (deployment) downloads from the `/capacity` listing

use crate::client::{HttpExecutor, HttpFetch, Sleeper};
use crate::errors::{PvLiveError, PvLiveResult};
use crate::orchestrator::PvLive;
use crate::table::Table;
use crate::types::{Batch, Meta, Record};
use flate2::read::GzDecoder;
use regex::Regex;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use tracing::{debug, info};

pub const RELEASE_COLUMN: &str = "release";
const INSTALL_MONTH_COLUMN: &str = "install_month";

/// Aggregation level of deployment data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentRegion {
    #[default]
    Gsp,
    Llsoa,
}

impl DeploymentRegion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gsp => "gsp",
            Self::Llsoa => "llsoa",
        }
    }

    fn file_token(&self) -> &'static str {
        match self {
            Self::Gsp => "20220314_GSP",
            Self::Llsoa => "llsoa",
        }
    }
}

impl fmt::Display for DeploymentRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentRegion {
    type Err = PvLiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gsp" => Ok(Self::Gsp),
            "llsoa" => Ok(Self::Llsoa),
            other => Err(PvLiveError::InvalidInput(format!(
                "the region must be one of gsp, llsoa (got '{other}')"
            ))),
        }
    }
}

/// Which capacity release to download
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseSelector {
    /// Position in the newest-first release list; 0 is the latest
    Index(usize),
    /// Release datestamp, `YYYYMMDD`
    Datestamp(String),
}

impl Default for ReleaseSelector {
    fn default() -> Self {
        Self::Index(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeploymentQuery {
    pub region: DeploymentRegion,
    /// Include the month-by-month installation history
    pub include_history: bool,
    /// Break capacity down by system size (GSP with history only)
    pub by_system_size: bool,
    pub release: ReleaseSelector,
}

impl DeploymentQuery {
    pub fn validate(&self) -> PvLiveResult<()> {
        if self.by_system_size && self.region != DeploymentRegion::Gsp {
            return Err(PvLiveError::InvalidInput(
                "by_system_size can only be used with region gsp".to_string(),
            ));
        }
        if self.by_system_size && !self.include_history {
            return Err(PvLiveError::InvalidInput(
                "by_system_size requires include_history".to_string(),
            ));
        }
        Ok(())
    }

    /// Trailing part of the file name holding this combination of options
    pub fn filename_suffix(&self) -> String {
        format!(
            "_capacity_by_{}{}{}.csv.gz",
            self.region.file_token(),
            if self.include_history { "_and_month" } else { "" },
            if self.by_system_size { "_and_system_size" } else { "" }
        )
    }
}

static HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href=["']([^"']+)["']"#).expect("valid href pattern"));
static RELEASE_DIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]{8})/").expect("valid release pattern"));
static CSV_GZ: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r".+\.csv\.gz$").expect("valid file pattern"));

/// `href` targets of every anchor in an HTML directory listing
pub fn extract_links(html: &str) -> Vec<String> {
    HREF.captures_iter(html)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Release datestamps in a `/capacity/` listing, newest first
pub fn parse_releases(html: &str) -> Vec<String> {
    let mut releases: Vec<String> = extract_links(html)
        .iter()
        .filter_map(|href| RELEASE_DIR.captures(href).map(|caps| caps[1].to_string()))
        .collect();
    releases.sort_unstable_by(|a, b| b.cmp(a));
    releases.dedup();
    releases
}

/// Gzipped CSV files in a release listing
pub fn parse_release_files(html: &str) -> Vec<String> {
    extract_links(html)
        .into_iter()
        .filter(|href| CSV_GZ.is_match(href))
        .collect()
}

pub fn resolve_release(releases: &[String], selector: &ReleaseSelector) -> PvLiveResult<String> {
    match selector {
        ReleaseSelector::Index(index) => releases.get(*index).cloned().ok_or_else(|| {
            PvLiveError::InvalidInput(format!(
                "the requested release index ({index}) was not found on the API; \
                 {} releases are available",
                releases.len()
            ))
        }),
        ReleaseSelector::Datestamp(stamp) => releases
            .iter()
            .find(|r| *r == stamp)
            .cloned()
            .ok_or_else(|| {
                PvLiveError::InvalidInput(format!(
                    "the requested release ({stamp}) was not found on the API"
                ))
            }),
    }
}

/// Decode a gzipped capacity CSV into a table tagged with its release
pub fn decode_deployment_csv(
    bytes: &[u8],
    release: &str,
    include_history: bool,
) -> PvLiveResult<Table> {
    let mut reader = csv::Reader::from_reader(GzDecoder::new(bytes));
    let meta: Meta = reader.headers()?.iter().collect();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        records.push(Record::new(row.iter().map(csv_value).collect()));
    }
    let batch = Batch::new(meta, records);
    batch.check_shape()?;

    let datetime_columns: &[&str] = if include_history {
        &[INSTALL_MONTH_COLUMN]
    } else {
        &[]
    };
    let mut table = Table::from_batch_with(&batch, datetime_columns)?;
    table.insert_constant_column(0, RELEASE_COLUMN, release);
    table.rename_column("dc_capacity_MWp", "dc_capacity_mwp");
    Ok(table)
}

fn csv_value(field: &str) -> Value {
    let field = field.trim();
    if field.is_empty() {
        return Value::Null;
    }
    if let Ok(int) = field.parse::<i64>() {
        return Value::from(int);
    }
    if let Ok(float) = field.parse::<f64>()
        && float.is_finite()
    {
        return Value::from(float);
    }
    Value::String(field.to_string())
}

impl<F: HttpFetch, S: Sleeper> PvLive<HttpExecutor<F, S>> {
    /// Available capacity releases, newest first
    pub fn deployment_releases(&self) -> PvLiveResult<Vec<String>> {
        let url = self.capacity_url("")?;
        let html = self.executor().fetch_bytes(&url)?;
        let releases = parse_releases(&String::from_utf8_lossy(&html));
        debug!("[PVLIVE] {} capacity releases listed", releases.len());
        Ok(releases)
    }

    /// Download installed-capacity data for one release
    pub fn deployment(&self, query: &DeploymentQuery) -> PvLiveResult<Table> {
        query.validate()?;
        let release = resolve_release(&self.deployment_releases()?, &query.release)?;

        let listing_url = self.capacity_url(&format!("{release}/"))?;
        let listing = self.executor().fetch_bytes(&listing_url)?;
        let suffix = query.filename_suffix();
        let filename = parse_release_files(&String::from_utf8_lossy(&listing))
            .into_iter()
            .find(|f| f.ends_with(&suffix))
            .ok_or_else(|| {
                PvLiveError::Communication(format!(
                    "release {release} has no file ending in {suffix}"
                ))
            })?;

        let file_url = listing_url.join(&filename).map_err(|e| {
            PvLiveError::Communication(format!("invalid file link '{filename}': {e}"))
        })?;
        info!("📥 Downloading capacity data {}", file_url);
        let bytes = self.executor().fetch_bytes(&file_url)?;

        let table = decode_deployment_csv(&bytes, &release, query.include_history)?;
        debug!(
            "[PVLIVE] Capacity table {}: {} rows x {} columns",
            filename,
            table.num_rows(),
            table.num_columns()
        );
        Ok(table)
    }

    fn capacity_url(&self, path: &str) -> PvLiveResult<Url> {
        let domain = self.executor().domain_url().trim_end_matches('/');
        let url = format!("{domain}/capacity/{path}");
        Url::parse(&url)
            .map_err(|e| PvLiveError::Config(format!("invalid capacity URL '{url}': {e}")))
    }
}
