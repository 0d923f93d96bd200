//! HTTP fetching with URL variants, retry/backoff, and an existence-check
//! disk cache.
//!
//! The network and the clock sit behind [`Transport`] and [`Sleeper`] so the
//! retry schedule can be exercised without either.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::{error::EtlError, io_utils};

pub const USER_AGENT: &str = "ETL-Class/1.0 (contact: student@example.com)";
pub const TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub retry_after: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One GET request. An `Err` stands for a network-level failure.
pub trait Transport {
    fn get(&self, url: &str) -> Result<HttpResponse>;
}

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .context("Building HTTP client")?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn get(&self, url: &str) -> Result<HttpResponse> {
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("GET {url}"))?;
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .with_context(|| format!("Reading body of {url}"))?;
        Ok(HttpResponse {
            status,
            retry_after,
            body,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Multiplied by the attempt number when `Retry-After` is not an integer.
    pub throttle_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            throttle_base: Duration::from_millis(1500),
        }
    }
}

/// Distinct variants tried in order: as given, without a trailing slash,
/// downgraded to plain HTTP.
pub fn url_variants(url: &str) -> Vec<String> {
    let mut variants: Vec<String> = Vec::with_capacity(3);
    for candidate in [
        url.to_string(),
        url.trim_end_matches('/').to_string(),
        url.replace("https://", "http://"),
    ] {
        if !variants.contains(&candidate) {
            variants.push(candidate);
        }
    }
    variants
}

pub struct Fetcher<T: Transport, S: Sleeper> {
    transport: T,
    sleeper: S,
    policy: RetryPolicy,
}

impl Fetcher<ReqwestTransport, ThreadSleeper> {
    pub fn http() -> Result<Self> {
        Ok(Self::new(ReqwestTransport::new()?, ThreadSleeper))
    }
}

impl<T: Transport, S: Sleeper> Fetcher<T, S> {
    pub fn new(transport: T, sleeper: S) -> Self {
        Self {
            transport,
            sleeper,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the first successful body, or `None` once every variant and
    /// attempt is exhausted.
    pub fn fetch(&self, url: &str) -> Option<String> {
        for variant in url_variants(url) {
            for attempt in 1..=self.policy.max_attempts {
                match self.transport.get(&variant) {
                    Ok(response) => {
                        debug!("GET {variant} -> {}", response.status);
                        if response.is_success() {
                            return Some(response.body);
                        }
                        if matches!(response.status, 429 | 503)
                            && let Some(raw) = response.retry_after.as_deref()
                        {
                            let wait = raw
                                .trim()
                                .parse::<u64>()
                                .map(Duration::from_secs)
                                .unwrap_or(self.policy.throttle_base * attempt);
                            warn!("Throttled by {variant}; waiting {wait:?} (Retry-After)");
                            self.sleeper.sleep(wait);
                            continue;
                        }
                        if response.status == 404 {
                            debug!("{variant} not found; trying next variant");
                            break;
                        }
                    }
                    Err(err) => warn!("Network error on {variant} (attempt {attempt}): {err:#}"),
                }
                if attempt < self.policy.max_attempts {
                    self.sleeper.sleep(backoff(attempt));
                }
            }
        }
        None
    }

    /// Reads `path` when it exists; otherwise fetches `url` and stores the
    /// body there.
    pub fn fetch_cached(&self, url: &str, path: &Path) -> Result<String> {
        if path.exists() {
            info!("[cache] {path:?}");
            return fs::read_to_string(path).with_context(|| format!("Reading cached {path:?}"));
        }
        let body = self.fetch(url).ok_or_else(|| EtlError::Fetch {
            url: url.to_string(),
        })?;
        io_utils::write_text(path, &body)?;
        info!("Saved {url} to {path:?}");
        Ok(body)
    }
}

/// `uniform(1, 3) * 2^(attempt - 1)` seconds.
fn backoff(attempt: u32) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(1.0..3.0);
    Duration::from_secs_f64(factor * 2f64.powi(attempt as i32 - 1))
}

/// Cache location for pages addressed only by URL.
pub fn cache_path_for(dir: &Path, url: &str) -> PathBuf {
    dir.join(format!("{:x}.html", Sha256::digest(url.as_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_skip_duplicates() {
        assert_eq!(
            url_variants("https://example.org/a/"),
            vec![
                "https://example.org/a/",
                "https://example.org/a",
                "http://example.org/a/"
            ]
        );
        assert_eq!(url_variants("http://example.org/a"), vec!["http://example.org/a"]);
    }

    #[test]
    fn backoff_grows_exponentially_within_bounds() {
        for attempt in 1..=5 {
            let secs = backoff(attempt).as_secs_f64();
            let scale = 2f64.powi(attempt as i32 - 1);
            assert!(secs >= scale && secs < 3.0 * scale, "attempt {attempt}: {secs}");
        }
    }

    #[test]
    fn cache_path_is_stable_hex_digest() {
        let path = cache_path_for(Path::new("cache"), "https://example.org");
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert_eq!(name.len(), 64 + ".html".len());
        assert_eq!(path, cache_path_for(Path::new("cache"), "https://example.org"));
    }
}
