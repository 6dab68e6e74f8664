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

//! CLI argument definitions using clap.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use clap::Parser;
use fluxion_pvlive::{EntityKind, Period, PvLiveConfig, PvLiveResult};
use std::path::PathBuf;

const CLI_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Parser, Debug)]
#[command(name = "pvlive")]
#[command(author, version, about = "Command line interface for the PV_Live API")]
#[command(
    long_about = "Download PV_Live solar generation estimates for Great Britain.\n\
    \nWithout --start or --end the latest estimate is printed. With either one, every\n\
    estimate in the interval is fetched (long intervals are split automatically).\n\
    \nExamples:\n  \
    pvlive                                              # Latest national estimate\n  \
    pvlive -s \"2023-12-01 00:00:00\" -e \"2023-12-02 00:00:00\"\n  \
    pvlive --entity-type pes --entity-id 23 -o out.csv -q"
)]
pub struct Cli {
    /// UTC start, inclusive
    #[arg(
        short = 's',
        long,
        value_name = "YYYY-MM-DD HH:MM:SS",
        value_parser = parse_cli_datetime,
        help = "UTC start datetime (inclusive); default is to retrieve the latest outturn"
    )]
    pub start: Option<DateTime<Utc>>,

    /// UTC end, inclusive
    #[arg(
        short = 'e',
        long,
        value_name = "YYYY-MM-DD HH:MM:SS",
        value_parser = parse_cli_datetime,
        help = "UTC end datetime (inclusive); default is to retrieve the latest outturn"
    )]
    pub end: Option<DateTime<Utc>>,

    #[arg(long, default_value = "gsp", help = "Entity type, either 'gsp' or 'pes'")]
    pub entity_type: EntityKind,

    #[arg(long, default_value_t = 0, help = "Entity ID; 0 is national")]
    pub entity_id: u32,

    #[arg(
        long,
        value_name = "FIELD1[,FIELD2,...]",
        default_value = "installedcapacity_mwp",
        help = "Comma-separated extra fields to request"
    )]
    pub extra_fields: String,

    #[arg(
        long,
        value_name = "5|30",
        default_value = "30",
        value_parser = parse_period,
        help = "Temporal resolution in minutes (5 or 30)"
    )]
    pub period: Period,

    #[arg(short = 'q', long, help = "Do not print anything to stdout")]
    pub quiet: bool,

    #[arg(short = 'o', long, value_name = "PATH", help = "CSV file to write results to")]
    pub outfile: Option<PathBuf>,

    #[arg(long, value_name = "URL", help = "HTTP proxy address")]
    pub http_proxy: Option<String>,

    #[arg(long, value_name = "URL", help = "HTTPS proxy address")]
    pub https_proxy: Option<String>,

    #[arg(long, value_name = "PATH", help = "Client configuration file (TOML or JSON)")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Retries per request after the first attempt")]
    pub retries: Option<u32>,
}

impl Cli {
    /// Interval to fetch, or `None` for the latest estimate. A missing start
    /// falls back to the beginning of the PV_Live record and a missing end
    /// to `now`.
    pub fn interval(&self, now: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        if self.start.is_none() && self.end.is_none() {
            return None;
        }
        Some((self.start.unwrap_or_else(record_start), self.end.unwrap_or(now)))
    }

    /// Configuration file (or defaults), then environment, then flags
    pub fn to_config(&self) -> PvLiveResult<PvLiveConfig> {
        let config = match &self.config {
            Some(path) => PvLiveConfig::load(path)?,
            None => PvLiveConfig::default(),
        };
        let mut config = config.with_env_overrides();

        if let Some(proxy) = &self.http_proxy {
            config.proxies.http = Some(proxy.clone());
        }
        if let Some(proxy) = &self.https_proxy {
            config.proxies.https = Some(proxy.clone());
        }
        if let Some(retries) = self.retries {
            config.retries = retries;
        }

        config.validate()?;
        Ok(config)
    }
}

/// First interval of the PV_Live record
pub fn record_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2014, 1, 1, 0, 30, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

pub fn parse_cli_datetime(s: &str) -> Result<DateTime<Utc>, String> {
    NaiveDateTime::parse_from_str(s.trim(), CLI_DATETIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| {
            format!("failed to parse '{s}', make sure you use 'yyyy-mm-dd HH:MM:SS' format")
        })
}

pub fn parse_period(s: &str) -> Result<Period, String> {
    let minutes: u32 = s
        .trim()
        .parse()
        .map_err(|_| format!("'{s}' is not a number of minutes"))?;
    Period::try_from(minutes).map_err(|e| e.to_string())
}
