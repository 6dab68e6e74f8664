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

//! Client configuration

use crate::chunker::SpanLimits;
use crate::client::RetryPolicy;
use crate::errors::{PvLiveError, PvLiveResult};
use chrono::TimeDelta;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_DOMAIN_URL: &str = "https://api.solar.sheffield.ac.uk";
const API_PATH: &str = "pvlive/api/v4";
/// Upper bound on configured request spans, about a century
pub const MAX_SPAN_DAYS: i64 = 36_525;

fn default_domain_url() -> String {
    DEFAULT_DOMAIN_URL.to_string()
}

fn default_true() -> bool {
    true
}

fn default_3() -> u32 {
    3
}

fn default_1000() -> u64 {
    1000
}

fn default_30() -> u64 {
    30
}

fn default_365() -> i64 {
    365
}

fn default_30_days() -> i64 {
    30
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PvLiveConfig {
    /// Host serving both the API and the capacity downloads
    #[serde(default = "default_domain_url")]
    pub domain_url: String,

    /// API root; derived from `domain_url` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Extra attempts after the first one
    #[serde(default = "default_3")]
    pub retries: u32,

    /// First backoff delay (ms); doubles on every retry
    #[serde(default = "default_1000")]
    pub retry_delay_ms: u64,

    /// Per-attempt timeout (seconds)
    #[serde(default = "default_30")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub proxies: ProxyConfig,

    #[serde(default = "default_true")]
    pub ssl_verify: bool,

    #[serde(default = "default_365")]
    pub national_max_span_days: i64,

    #[serde(default = "default_30_days")]
    pub regional_max_span_days: i64,
}

impl Default for PvLiveConfig {
    fn default() -> Self {
        Self {
            domain_url: default_domain_url(),
            base_url: None,
            retries: 3,
            retry_delay_ms: 1000,
            timeout_secs: 30,
            proxies: ProxyConfig::default(),
            ssl_verify: true,
            national_max_span_days: 365,
            regional_max_span_days: 30,
        }
    }
}

impl PvLiveConfig {
    /// Load from a TOML (`.toml`) or JSON file
    pub fn load(path: impl AsRef<Path>) -> PvLiveResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let config: Self = if is_toml {
            toml::from_str(&content).map_err(|e| parse_error(path, &e))?
        } else {
            serde_json::from_str(&content).map_err(|e| parse_error(path, &e))?
        };

        info!("✅ Loaded PV_Live configuration from {}", path.display());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    #[must_use]
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup("PVLIVE_DOMAIN_URL") {
            self.domain_url = url;
        }
        if let Some(url) = lookup("PVLIVE_BASE_URL") {
            self.base_url = Some(url);
        }
        if let Some(retries) = lookup("PVLIVE_RETRIES")
            && let Ok(retries) = retries.parse::<u32>()
        {
            self.retries = retries;
        }
        if let Some(timeout) = lookup("PVLIVE_TIMEOUT_SECS")
            && let Ok(secs) = timeout.parse::<u64>()
        {
            self.timeout_secs = secs;
        }
        if let Some(proxy) = lookup("HTTP_PROXY") {
            self.proxies.http = Some(proxy);
        }
        if let Some(proxy) = lookup("HTTPS_PROXY") {
            self.proxies.https = Some(proxy);
        }
        debug!("Configuration after overrides: {:?}", self);
        self
    }

    pub fn validate(&self) -> PvLiveResult<()> {
        if self.timeout_secs == 0 {
            return Err(PvLiveError::Config(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        for days in [self.national_max_span_days, self.regional_max_span_days] {
            if !(1..=MAX_SPAN_DAYS).contains(&days) {
                return Err(PvLiveError::Config(format!(
                    "maximum request spans must be between 1 and {MAX_SPAN_DAYS} days (got {days})"
                )));
            }
        }
        for url in [self.domain_url.clone(), self.api_base_url()] {
            Url::parse(&url)
                .map_err(|e| PvLiveError::Config(format!("invalid URL '{url}': {e}")))?;
        }
        Ok(())
    }

    pub fn api_base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("{}/{API_PATH}", self.domain_url.trim_end_matches('/')),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.retries,
            initial_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    pub fn span_limits(&self) -> PvLiveResult<SpanLimits> {
        let span = |days: i64| {
            TimeDelta::try_days(days).ok_or_else(|| {
                PvLiveError::Config(format!("request span of {days} days is out of range"))
            })
        };
        Ok(SpanLimits {
            national: span(self.national_max_span_days)?,
            regional: span(self.regional_max_span_days)?,
        })
    }
}

fn parse_error(path: &Path, e: &impl std::fmt::Display) -> PvLiveError {
    PvLiveError::Config(format!("Failed to parse {}: {e}", path.display()))
}
