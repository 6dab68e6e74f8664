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

//! HTTP request executor with retry and backoff

use crate::config::PvLiveConfig;
use crate::errors::{PvLiveError, PvLiveResult, TransportError};
use crate::types::{Batch, EntityKind, EntityRef, Period, TimeRange};
use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use reqwest::Url;
use reqwest::blocking::Client;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, error, trace, warn};

/// Format an instant the way the API expects: ISO-8601 with a literal `Z`
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// One GET against the PV_Live API: a path below the base URL plus query params
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    path: String,
    params: Vec<(String, String)>,
    range: Option<TimeRange>,
}

impl ApiRequest {
    /// Generation query for one entity. Without a range the API returns the
    /// latest estimate.
    pub fn entity(
        entity: &EntityRef,
        range: Option<TimeRange>,
        period: Period,
        extra_fields: &[String],
    ) -> Self {
        let mut params = Vec::new();
        if let Some(range) = range {
            params.push(("start".to_string(), format_timestamp(range.start())));
            params.push(("end".to_string(), format_timestamp(range.end())));
        }
        params.push(("period".to_string(), period.to_string()));
        if !extra_fields.is_empty() {
            params.push(("extra_fields".to_string(), extra_fields.join(",")));
        }

        Self {
            path: format!("{}/{}", entity.kind, entity.id),
            params,
            range,
        }
    }

    /// Listing of all known entities of one kind
    pub fn catalog(kind: EntityKind) -> Self {
        Self {
            path: kind.list_path().to_string(),
            params: Vec::new(),
            range: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn range(&self) -> Option<TimeRange> {
        self.range
    }

    pub fn url(&self, base_url: &str) -> PvLiveResult<Url> {
        let endpoint = format!("{}/{}", base_url.trim_end_matches('/'), self.path);
        let url = if self.params.is_empty() {
            Url::parse(&endpoint)
        } else {
            Url::parse_with_params(&endpoint, &self.params)
        };
        url.map_err(|e| PvLiveError::Config(format!("invalid API URL '{endpoint}': {e}")))
    }
}

/// Status and raw body of one HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// How the executor treats a response status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    Success,
    /// Malformed parameters; retrying cannot help
    BadRequest,
    Retryable,
}

pub fn classify_status(status: u16) -> ResponseClass {
    match status {
        200..=299 => ResponseClass::Success,
        400 => ResponseClass::BadRequest,
        _ => ResponseClass::Retryable,
    }
}

/// A single blocking GET
pub trait HttpFetch {
    fn get(&self, url: &Url) -> Result<HttpResponse, TransportError>;
}

/// Pause between attempts
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// reqwest-backed fetcher honouring timeout, proxy and TLS settings
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    pub fn from_config(config: &PvLiveConfig) -> PvLiveResult<Self> {
        let mut builder = Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("fluxion-pvlive/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(!config.ssl_verify);

        if let Some(proxy) = &config.proxies.http {
            builder = builder.proxy(
                reqwest::Proxy::http(proxy)
                    .map_err(|e| PvLiveError::Config(format!("invalid HTTP proxy: {e}")))?,
            );
        }
        if let Some(proxy) = &config.proxies.https {
            builder = builder.proxy(
                reqwest::Proxy::https(proxy)
                    .map_err(|e| PvLiveError::Config(format!("invalid HTTPS proxy: {e}")))?,
            );
        }

        let client = builder
            .build()
            .map_err(|e| PvLiveError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl HttpFetch for ReqwestFetcher {
    fn get(&self, url: &Url) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|e| TransportError(format!("request failed: {e}")))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .map_err(|e| TransportError(format!("failed to read response body: {e}")))?;
        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}

/// Bounded retries with exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one
    pub retries: u32,
    /// Delay before the first retry; doubles for each later retry
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            initial_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn total_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Delay before retry number `retry` (1-based)
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32
            .checked_pow(retry.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor)
    }
}

/// Executes API requests and returns the decoded `{data, meta}` payload
pub trait RequestExecutor {
    fn execute(&self, request: &ApiRequest) -> PvLiveResult<Batch>;
}

/// PV_Live HTTP client with retry and exponential backoff
#[derive(Debug, Clone)]
pub struct HttpExecutor<F = ReqwestFetcher, S = ThreadSleeper> {
    base_url: String,
    domain_url: String,
    fetcher: F,
    sleeper: S,
    policy: RetryPolicy,
}

impl HttpExecutor {
    pub fn from_config(config: &PvLiveConfig) -> PvLiveResult<Self> {
        config.validate()?;
        Ok(Self::with_parts(
            config.api_base_url(),
            config.domain_url.clone(),
            ReqwestFetcher::from_config(config)?,
            ThreadSleeper,
            config.retry_policy(),
        ))
    }
}

impl<F: HttpFetch, S: Sleeper> HttpExecutor<F, S> {
    pub fn with_parts(
        base_url: impl Into<String>,
        domain_url: impl Into<String>,
        fetcher: F,
        sleeper: S,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            domain_url: domain_url.into(),
            fetcher,
            sleeper,
            policy,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn domain_url(&self) -> &str {
        &self.domain_url
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    /// GET `url`, retrying transient failures, and return the raw body
    pub fn fetch_bytes(&self, url: &Url) -> PvLiveResult<Vec<u8>> {
        let attempts = self.policy.total_attempts();

        for attempt in 1..=attempts {
            match self.fetcher.get(url) {
                Ok(response) => match classify_status(response.status) {
                    ResponseClass::Success => {
                        trace!(
                            "[PVLIVE] {} -> {} ({} bytes)",
                            url,
                            response.status,
                            response.body.len()
                        );
                        return Ok(response.body);
                    }
                    ResponseClass::BadRequest => {
                        let detail = bad_request_detail(&response.body);
                        error!("[PVLIVE] Bad Request (400) for {}: {}", url, detail);
                        return Err(PvLiveError::Communication(format!(
                            "PV_Live API received Bad Request (400)... {detail}"
                        )));
                    }
                    ResponseClass::Retryable => {
                        warn!(
                            "[PVLIVE] Status {} from {} (attempt {}/{})",
                            response.status, url, attempt, attempts
                        );
                    }
                },
                Err(e) => {
                    warn!(
                        "[PVLIVE] Request to {} failed (attempt {}/{}): {}",
                        url, attempt, attempts, e
                    );
                }
            }

            if attempt < attempts {
                let delay = self.policy.backoff(attempt);
                debug!("Retrying in {:?}", delay);
                self.sleeper.sleep(delay);
            }
        }

        error!("[PVLIVE] Giving up on {} after {} attempts", url, attempts);
        Err(PvLiveError::Communication(format!(
            "no successful response after {attempts} attempts"
        )))
    }
}

impl<F: HttpFetch, S: Sleeper> RequestExecutor for HttpExecutor<F, S> {
    fn execute(&self, request: &ApiRequest) -> PvLiveResult<Batch> {
        let url = request.url(&self.base_url)?;
        debug!("[PVLIVE] GET {}", url);

        let body = self.fetch_bytes(&url)?;
        let batch: Batch = serde_json::from_slice(&body).map_err(|e| {
            error!("[PVLIVE] Unparseable payload from {}: {}", url, e);
            PvLiveError::Communication(format!("failed to parse response: {e}"))
        })?;
        batch.check_shape()?;

        debug!("[PVLIVE] {} records from {}", batch.len(), request.path());
        Ok(batch)
    }
}

static PARAGRAPH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<p>(.*?)</p>").expect("valid paragraph pattern"));

/// Text of the first `<p>` element of an error page, or the start of the body
fn bad_request_detail(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    match PARAGRAPH.captures(&text) {
        Some(caps) => caps[1].trim().to_string(),
        None => text.trim().chars().take(200).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    struct ScriptedFetch {
        script: RefCell<VecDeque<Result<HttpResponse, TransportError>>>,
        calls: RefCell<Vec<String>>,
    }

    impl ScriptedFetch {
        fn new(script: Vec<Result<HttpResponse, TransportError>>) -> Self {
            Self {
                script: RefCell::new(script.into()),
                calls: RefCell::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.borrow().len()
        }
    }

    impl HttpFetch for ScriptedFetch {
        fn get(&self, url: &Url) -> Result<HttpResponse, TransportError> {
            self.calls.borrow_mut().push(url.to_string());
            self.script
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError("script exhausted".to_string())))
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        slept: RefCell<Vec<Duration>>,
    }

    impl RecordingSleeper {
        fn total(&self) -> Duration {
            self.slept.borrow().iter().sum()
        }
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.slept.borrow_mut().push(duration);
        }
    }

    fn status(code: u16) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse {
            status: code,
            body: Vec::new(),
        })
    }

    fn ok_payload() -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse {
            status: 200,
            body: json!({
                "data": [[0, "2023-12-01T13:00:00Z", 4321.0]],
                "meta": ["pes_id", "datetime_gmt", "generation_mw"]
            })
            .to_string()
            .into_bytes(),
        })
    }

    fn executor(
        script: Vec<Result<HttpResponse, TransportError>>,
    ) -> HttpExecutor<ScriptedFetch, RecordingSleeper> {
        HttpExecutor::with_parts(
            "https://example.test/pvlive/api/v4",
            "https://example.test",
            ScriptedFetch::new(script),
            RecordingSleeper::default(),
            RetryPolicy::default(),
        )
    }

    fn latest_request() -> ApiRequest {
        ApiRequest::entity(&EntityRef::pes(0), None, Period::ThirtyMinutes, &[])
    }

    #[test]
    fn test_request_params_and_url() {
        let start = Utc.with_ymd_and_hms(2023, 12, 1, 12, 30, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2023, 12, 1, 14, 0, 0).unwrap();
        let request = ApiRequest::entity(
            &EntityRef::gsp(103),
            Some(TimeRange::new(start, end).unwrap()),
            Period::FiveMinutes,
            &["ucl_mw".to_string(), "lcl_mw".to_string()],
        );

        assert_eq!(request.path(), "gsp/103");
        assert_eq!(request.param("start"), Some("2023-12-01T12:30:00Z"));
        assert_eq!(request.param("end"), Some("2023-12-01T14:00:00Z"));
        assert_eq!(request.param("period"), Some("5"));
        assert_eq!(request.param("extra_fields"), Some("ucl_mw,lcl_mw"));

        let url = request.url("https://example.test/pvlive/api/v4/").unwrap();
        assert_eq!(url.path(), "/pvlive/api/v4/gsp/103");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(pairs.len(), 4);
        assert_eq!(pairs[0], ("start".to_string(), "2023-12-01T12:30:00Z".to_string()));
        assert!(!url.as_str().contains("+00:00"));
    }

    #[test]
    fn test_latest_request_has_no_range() {
        let request = latest_request();
        assert_eq!(request.param("start"), None);
        assert_eq!(request.param("end"), None);
        assert_eq!(request.param("extra_fields"), None);
        assert_eq!(request.param("period"), Some("30"));
    }

    #[test]
    fn test_catalog_request_url() {
        let url = ApiRequest::catalog(EntityKind::Pes)
            .url("https://example.test/api")
            .unwrap();
        assert_eq!(url.as_str(), "https://example.test/api/pes_list");
    }

    #[test]
    fn test_format_timestamp() {
        let dt = Utc.with_ymd_and_hms(2023, 12, 1, 0, 30, 0).unwrap();
        assert_eq!(format_timestamp(dt), "2023-12-01T00:30:00Z");
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(200), ResponseClass::Success);
        assert_eq!(classify_status(204), ResponseClass::Success);
        assert_eq!(classify_status(400), ResponseClass::BadRequest);
        assert_eq!(classify_status(404), ResponseClass::Retryable);
        assert_eq!(classify_status(429), ResponseClass::Retryable);
        assert_eq!(classify_status(503), ResponseClass::Retryable);
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.total_attempts(), 4);
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
    }

    #[test]
    fn test_success_after_three_server_errors() {
        let executor = executor(vec![status(500), status(502), status(503), ok_payload()]);
        let batch = executor.execute(&latest_request()).unwrap();

        assert_eq!(batch.len(), 1);
        assert_eq!(executor.fetcher().call_count(), 4);
        assert_eq!(
            *executor.sleeper().slept.borrow(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
        assert_eq!(executor.sleeper().total(), Duration::from_secs(7));
    }

    #[test]
    fn test_bad_request_is_not_retried() {
        let executor = executor(vec![Ok(HttpResponse {
            status: 400,
            body: b"<html><body><h1>Bad Request</h1><p>Invalid extra_fields: foo</p></body></html>"
                .to_vec(),
        })]);
        let err = executor.execute(&latest_request()).unwrap_err();

        assert!(matches!(err, PvLiveError::Communication(_)));
        assert!(err.to_string().contains("Invalid extra_fields: foo"));
        assert_eq!(executor.fetcher().call_count(), 1);
        assert!(executor.sleeper().slept.borrow().is_empty());
    }

    #[test]
    fn test_exhausted_retries() {
        let executor = executor(vec![status(500), status(500), status(500), status(500)]);
        let err = executor.execute(&latest_request()).unwrap_err();

        assert!(matches!(err, PvLiveError::Communication(_)));
        assert_eq!(executor.fetcher().call_count(), 4);
        assert_eq!(executor.sleeper().total(), Duration::from_secs(7));
    }

    #[test]
    fn test_transport_errors_are_retried() {
        let executor = executor(vec![
            Err(TransportError("connection reset".to_string())),
            Err(TransportError("timed out".to_string())),
            ok_payload(),
        ]);
        assert!(executor.execute(&latest_request()).is_ok());
        assert_eq!(executor.fetcher().call_count(), 3);
        assert_eq!(executor.sleeper().total(), Duration::from_secs(3));
    }

    #[test]
    fn test_unparseable_payload_is_fatal() {
        let executor = executor(vec![
            Ok(HttpResponse {
                status: 200,
                body: b"<html>maintenance</html>".to_vec(),
            }),
            ok_payload(),
        ]);
        let err = executor.execute(&latest_request()).unwrap_err();
        assert!(matches!(err, PvLiveError::Communication(_)));
        assert_eq!(executor.fetcher().call_count(), 1);
    }

    #[test]
    fn test_ragged_payload_is_rejected() {
        let executor = executor(vec![Ok(HttpResponse {
            status: 200,
            body: json!({
                "data": [[0, "2023-12-01T13:00:00Z"]],
                "meta": ["pes_id", "datetime_gmt", "generation_mw"]
            })
            .to_string()
            .into_bytes(),
        })]);
        assert!(executor.execute(&latest_request()).is_err());
    }

    #[test]
    fn test_zero_retries_means_single_attempt() {
        let mut executor = executor(vec![status(500), ok_payload()]);
        executor.policy.retries = 0;
        assert!(executor.execute(&latest_request()).is_err());
        assert_eq!(executor.fetcher().call_count(), 1);
        assert!(executor.sleeper().slept.borrow().is_empty());
    }

    #[test]
    fn test_bad_request_detail_fallback() {
        assert_eq!(bad_request_detail(b"<p> missing start </p>"), "missing start");
        assert_eq!(bad_request_detail(b"  plain text  "), "plain text");
    }

    #[test]
    fn test_bad_request_detail_first_paragraph() {
        let body =
            b"<html><h1>Bad Request</h1><p>\nend must be after start\n</p><p>second</p></html>";
        assert_eq!(bad_request_detail(body), "end must be after start");
        assert_eq!(bad_request_detail(b"<p>unterminated"), "<p>unterminated");
    }

    fn mock_config(server: &Server, retries: u32) -> PvLiveConfig {
        PvLiveConfig {
            base_url: Some(server.url()),
            domain_url: server.url(),
            retries,
            retry_delay_ms: 0,
            ..Default::default()
        }
    }

    #[test]
    fn test_http_executor_against_mock_server() {
        let mut server = Server::new();
        let mock = server
            .mock("GET", "/pes/0")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("start".into(), "2023-12-01T12:30:00Z".into()),
                Matcher::UrlEncoded("end".into(), "2023-12-01T13:00:00Z".into()),
                Matcher::UrlEncoded("period".into(), "30".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "data": [
                        [0, "2023-12-01T12:30:00Z", 5012.1],
                        [0, "2023-12-01T13:00:00Z", 4890.0]
                    ],
                    "meta": ["pes_id", "datetime_gmt", "generation_mw"]
                })
                .to_string(),
            )
            .create();

        let executor = HttpExecutor::from_config(&mock_config(&server, 0)).unwrap();
        let start = Utc.with_ymd_and_hms(2023, 12, 1, 12, 30, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2023, 12, 1, 13, 0, 0).unwrap();
        let request = ApiRequest::entity(
            &EntityRef::pes(0),
            Some(TimeRange::new(start, end).unwrap()),
            Period::ThirtyMinutes,
            &[],
        );
        let batch = executor.execute(&request).unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.records[1].generation_mw(), Some(4890.0));
        mock.assert();
    }

    #[test]
    fn test_http_executor_bad_request_against_mock_server() {
        let mut server = Server::new();
        let mock = server
            .mock("GET", "/gsp/103")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body("<p>Unknown field: bogus</p>")
            .expect(1)
            .create();

        let executor = HttpExecutor::from_config(&mock_config(&server, 3)).unwrap();
        let request = ApiRequest::entity(
            &EntityRef::gsp(103),
            None,
            Period::ThirtyMinutes,
            &["bogus".to_string()],
        );
        let err = executor.execute(&request).unwrap_err();

        assert!(err.to_string().contains("Unknown field: bogus"));
        mock.assert();
    }

    #[test]
    fn test_http_executor_retries_server_errors() {
        let mut server = Server::new();
        let mock = server
            .mock("GET", "/pes/0")
            .match_query(Matcher::Any)
            .with_status(503)
            .expect(3)
            .create();

        let executor = HttpExecutor::from_config(&mock_config(&server, 2)).unwrap();
        let err = executor.execute(&latest_request()).unwrap_err();

        assert!(matches!(err, PvLiveError::Communication(_)));
        mock.assert();
    }
}
