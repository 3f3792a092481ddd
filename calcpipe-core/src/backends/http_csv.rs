//! HTTP scraper for named CSV endpoints.
//!
//! Each configured source is a `name -> url` pair. A scrape fetches the URL,
//! parses the body as CSV and saves the frame under the source name. Requests
//! retry with exponential backoff and share one circuit breaker, so a banned
//! or throttled host stops being hit for the cooldown period.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use polars::prelude::*;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::circuit_breaker::CircuitBreaker;
use crate::components::{ArgsError, ComponentArgs, DataSaver, HealthCheck, Outcome, Scraper};

/// Upper bound on configured retries.
pub const MAX_RETRIES: u32 = 10;

/// Longest single backoff sleep.
const MAX_BACKOFF: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("unknown source '{0}'")]
    UnknownSource(String),

    #[error("circuit breaker open ({remaining_secs}s cooldown remaining)")]
    BreakerOpen { remaining_secs: u64 },

    #[error("rate limited (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("could not parse CSV body: {0}")]
    Parse(#[from] PolarsError),

    #[error("source returned no rows")]
    Empty,
}

pub struct HttpCsvScraper {
    client: reqwest::blocking::Client,
    sources: BTreeMap<String, String>,
    circuit_breaker: Arc<CircuitBreaker>,
    max_retries: u32,
    base_delay: Duration,
}

impl HttpCsvScraper {
    pub fn new(
        sources: BTreeMap<String, String>,
        circuit_breaker: Arc<CircuitBreaker>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("calcpipe/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            sources,
            circuit_breaker,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    /// `sources` (table of name to URL), `max_retries` (default 3),
    /// `timeout_secs` (default 30), `base_delay_ms` (default 500).
    pub fn from_args(args: &ComponentArgs) -> Result<Self, ArgsError> {
        let sources = args.string_map_param("sources")?;
        let timeout = Duration::from_secs(args.usize_param("timeout_secs", 30)? as u64);
        let max_retries = u32::try_from(args.usize_param("max_retries", 3)?).unwrap_or(MAX_RETRIES);
        let base_delay = Duration::from_millis(args.usize_param("base_delay_ms", 500)? as u64);

        let scraper = Self::new(sources, Arc::new(CircuitBreaker::default()), timeout)
            .map_err(|e| ArgsError::Invalid(format!("failed to build HTTP client: {e}")))?;
        Ok(scraper.with_retries(max_retries, base_delay))
    }

    /// `max_retries` is clamped to `MAX_RETRIES`.
    pub fn with_retries(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries.min(MAX_RETRIES);
        self.base_delay = base_delay;
        self
    }

    pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.circuit_breaker
    }

    /// Sleep before retry `attempt` (1-based): `base_delay * 2^(attempt-1)`,
    /// capped at `MAX_BACKOFF`.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt.saturating_sub(1))
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(MAX_BACKOFF, |delay| delay.min(MAX_BACKOFF))
    }

    fn breaker_open(&self) -> ScrapeError {
        ScrapeError::BreakerOpen {
            remaining_secs: self.circuit_breaker.remaining_cooldown().as_secs(),
        }
    }

    /// GET `url` with retry and circuit breaker logic.
    fn fetch_with_retry(&self, url: &str) -> Result<Vec<u8>, ScrapeError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(self.breaker_open());
        }

        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.backoff_delay(attempt);
                debug!(url, attempt, ?delay, "retrying");
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(self.breaker_open());
            }

            match self.client.get(url).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::FORBIDDEN {
                        self.circuit_breaker.trip();
                        return Err(self.breaker_open());
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        self.circuit_breaker.record_failure();
                        let retry_after_secs = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        last_error = Some(ScrapeError::RateLimited { retry_after_secs });
                        continue;
                    }

                    if !status.is_success() {
                        self.circuit_breaker.record_failure();
                        let err = ScrapeError::Status {
                            status: status.as_u16(),
                            url: url.to_string(),
                        };
                        if status.is_client_error() {
                            return Err(err);
                        }
                        last_error = Some(err);
                        continue;
                    }

                    let body = resp
                        .bytes()
                        .map_err(|e| ScrapeError::Network(e.to_string()))?;
                    self.circuit_breaker.record_success();
                    return Ok(body.to_vec());
                }
                Err(e) => {
                    self.circuit_breaker.record_failure();
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(ScrapeError::Network(e.to_string()));
                        continue;
                    }
                    return Err(ScrapeError::Network(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ScrapeError::Network("max retries exceeded".into())))
    }

    fn scrape_one(&self, name: &str, saver: &dyn DataSaver) -> Result<Outcome, ScrapeError> {
        let url = self
            .sources
            .get(name)
            .ok_or_else(|| ScrapeError::UnknownSource(name.to_string()))?;

        let body = self.fetch_with_retry(url)?;
        let frame = parse_csv(body)?;
        if frame.height() == 0 {
            return Err(ScrapeError::Empty);
        }

        info!(source = name, rows = frame.height(), saver = saver.name(), "scraped");
        Ok(match saver.save_data(&frame, name) {
            Ok(outcome) => outcome,
            Err(e) => Outcome::failure(e.to_string()),
        })
    }
}

/// Parse a CSV body (header row required).
pub fn parse_csv(body: Vec<u8>) -> Result<DataFrame, PolarsError> {
    CsvReadOptions::default()
        .with_has_header(true)
        .into_reader_with_file_handle(Cursor::new(body))
        .finish()
}

impl HealthCheck for HttpCsvScraper {
    fn health_check(&self) -> bool {
        !self.sources.is_empty() && !self.circuit_breaker.is_open()
    }
}

impl Scraper for HttpCsvScraper {
    fn name(&self) -> &str {
        "http_csv"
    }

    fn scrape_data(&self, saver: &dyn DataSaver) -> Outcome {
        let mut failed = Vec::new();
        for name in self.sources.keys() {
            let outcome = self.scrape_single_source(name, saver);
            if let Some(reason) = outcome.reason() {
                failed.push(format!("{name}: {reason}"));
            }
        }

        if failed.is_empty() {
            Outcome::Success
        } else {
            Outcome::failure(failed.join("; "))
        }
    }

    fn scrape_single_source(&self, name: &str, saver: &dyn DataSaver) -> Outcome {
        match self.scrape_one(name, saver) {
            Ok(Outcome::Success) => Outcome::Success,
            Ok(failure) => {
                warn!(source = name, reason = failure.reason().unwrap_or_default(), "scraped data rejected by saver");
                failure
            }
            Err(e) => {
                error!(source = name, error = %e, "scrape failed");
                Outcome::failure(e.to_string())
            }
        }
    }

    fn get_available_sources(&self) -> Vec<String> {
        self.sources.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::MemoryStore;
    use crate::components::source::DataSource;

    fn scraper(sources: &[(&str, &str)]) -> HttpCsvScraper {
        let sources = sources
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        HttpCsvScraper::new(
            sources,
            Arc::new(CircuitBreaker::default()),
            Duration::from_secs(1),
        )
        .unwrap()
        .with_retries(0, Duration::from_millis(1))
    }

    /// Serve one canned HTTP response on a loopback port; returns its URL.
    fn serve_once(status_line: &'static str, body: &'static str) -> String {
        use std::io::{Read, Write};
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let Ok((mut stream, _)) = listener.accept() else {
                return;
            };
            let mut request = Vec::new();
            let mut buf = [0u8; 512];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: text/csv\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes());
        });
        format!("http://{addr}/data.csv")
    }

    #[test]
    fn fetched_csv_is_saved_under_source_name() {
        let url = serve_once("200 OK", "ticker,roe\nAAPL,1.5\nMSFT,0.4\n");
        let s = scraper(&[("prices", url.as_str())]);
        let store = MemoryStore::new("memory");

        let outcome = s.scrape_single_source("prices", &store);

        assert_eq!(outcome, Outcome::Success);
        let saved = store.get_data("prices").unwrap();
        assert_eq!(saved.height(), 2);
        assert_eq!(saved.get_column_names_str(), vec!["ticker", "roe"]);
        assert!(s.health_check());
    }

    #[test]
    fn client_error_status_is_a_failure_without_retry() {
        let url = serve_once("404 Not Found", "");
        let s = scraper(&[("prices", url.as_str())]).with_retries(3, Duration::from_millis(1));
        let store = MemoryStore::new("memory");

        let outcome = s.scrape_single_source("prices", &store);

        assert!(outcome.reason().unwrap().contains("HTTP 404"));
        assert!(store.is_empty());
    }

    #[test]
    fn backoff_doubles_and_is_capped() {
        let s = scraper(&[]).with_retries(3, Duration::from_millis(100));
        assert_eq!(s.backoff_delay(1), Duration::from_millis(100));
        assert_eq!(s.backoff_delay(3), Duration::from_millis(400));
        assert_eq!(s.backoff_delay(40), MAX_BACKOFF);
        assert_eq!(s.backoff_delay(u32::MAX), MAX_BACKOFF);
    }

    #[test]
    fn retries_are_clamped() {
        let s = scraper(&[]).with_retries(1_000, Duration::from_millis(1));
        assert_eq!(s.max_retries, MAX_RETRIES);

        let args = ComponentArgs::new()
            .with("sources", serde_json::json!({ "a": "http://a" }))
            .with("max_retries", 5_000_000_000u64);
        assert_eq!(HttpCsvScraper::from_args(&args).unwrap().max_retries, MAX_RETRIES);
    }

    #[test]
    fn health_follows_breaker_cooldown() {
        let sources = BTreeMap::from([("a".to_string(), "http://a".to_string())]);
        let expired = HttpCsvScraper::new(
            sources.clone(),
            Arc::new(CircuitBreaker::new(Duration::ZERO, 1)),
            Duration::from_secs(1),
        )
        .unwrap();
        expired.circuit_breaker().trip();
        assert!(expired.health_check());

        let held = HttpCsvScraper::new(
            sources,
            Arc::new(CircuitBreaker::new(Duration::from_secs(60), 1)),
            Duration::from_secs(1),
        )
        .unwrap();
        held.circuit_breaker().record_failure();
        assert!(!held.health_check());
        assert!(held.circuit_breaker().remaining_cooldown() > Duration::ZERO);
    }

    #[test]
    fn parses_csv_body() {
        let df = parse_csv(b"ticker,roe\nAAPL,1.5\nMSFT,0.4\n".to_vec()).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.get_column_names_str(), vec!["ticker", "roe"]);
    }

    #[test]
    fn lists_configured_sources_sorted() {
        let s = scraper(&[("prices", "http://a"), ("fundamentals", "http://b")]);
        assert_eq!(s.get_available_sources(), vec!["fundamentals", "prices"]);
    }

    #[test]
    fn unknown_source_fails() {
        let s = scraper(&[("prices", "http://a")]);
        let outcome = s.scrape_single_source("nope", &MemoryStore::new("memory"));
        assert!(outcome.reason().unwrap().contains("unknown source"));
    }

    #[test]
    fn open_breaker_refuses_without_request() {
        let s = scraper(&[("prices", "http://127.0.0.1:9/prices.csv")]);
        s.circuit_breaker().trip();

        let store = MemoryStore::new("memory");
        let outcome = s.scrape_data(&store);

        assert!(outcome.reason().unwrap().contains("circuit breaker open"));
        assert!(store.is_empty());
        assert!(!s.health_check());
    }

    #[test]
    fn unhealthy_without_sources() {
        assert!(!scraper(&[]).health_check());
        assert!(scraper(&[("a", "http://a")]).health_check());
    }

    #[test]
    fn from_args_reads_source_table() {
        let args = ComponentArgs::new().with(
            "sources",
            serde_json::json!({ "prices": "https://example.com/prices.csv" }),
        );
        let s = HttpCsvScraper::from_args(&args).unwrap();
        assert_eq!(s.get_available_sources(), vec!["prices"]);
        assert_eq!(s.max_retries, 3);

        let bad = ComponentArgs::new().with("sources", "not a table");
        assert!(matches!(
            HttpCsvScraper::from_args(&bad),
            Err(ArgsError::WrongType { .. })
        ));
    }
}
