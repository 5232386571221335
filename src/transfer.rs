// Copyright 2026 Fels Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Blocking HTTP downloads with a bounded retry loop.

use std::fs;
use std::io::Read;
use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::blocking::Response;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;
use tracing::warn;

use crate::error::FelsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero is treated as one.
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    pub fn immediate(attempts: u32) -> Self {
        Self::new(attempts, Duration::ZERO)
    }
}

/// Outcome of a single attempt.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("{url} not found")]
    NotFound { url: String },

    #[error("transient failure fetching {url}: {reason}")]
    Transient { url: String, reason: String },

    #[error("fetching {url} failed: {reason}")]
    Failed { url: String, reason: String },
}

/// True when `err` is a missing remote resource rather than a real failure.
pub fn is_not_found(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<FetchError>(),
        Some(FetchError::NotFound { .. })
    )
}

/// Runs `attempt` until it succeeds, fails for good, or the policy runs
/// out. Only [`FetchError::Transient`] is retried.
pub fn with_retry<T, F>(policy: &RetryPolicy, url: &str, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Result<T, FetchError>,
{
    let attempts = policy.attempts.max(1);
    let mut last_reason = String::new();
    for n in 1..=attempts {
        match attempt() {
            Ok(value) => return Ok(value),
            Err(FetchError::Transient { reason, .. }) => {
                warn!(url, attempt = n, attempts, %reason, "transient failure");
                last_reason = reason;
                if n < attempts && !policy.delay.is_zero() {
                    thread::sleep(policy.delay);
                }
            }
            Err(other) => return Err(other.into()),
        }
    }
    Err(FelsError::RetriesExhausted {
        url: url.to_string(),
        attempts,
        reason: last_reason,
    }
    .into())
}

#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    policy: RetryPolicy,
}

impl Fetcher {
    pub fn new(policy: RetryPolicy, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("build http client")?;
        Ok(Self { client, policy })
    }

    /// Client that ignores proxy settings, for the loopback test server.
    #[cfg(test)]
    pub(crate) fn direct(policy: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .context("build http client")?;
        Ok(Self { client, policy })
    }

    /// Downloads `url` to `dest`, returning the byte count. The file only
    /// appears once the body has been read completely.
    pub fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).with_context(|| format!("create dir {}", parent.display()))?;

        let (tmp, bytes) = with_retry(&self.policy, url, || {
            let mut response = self.get(url)?;
            let mut tmp = NamedTempFile::new_in(parent).map_err(|err| FetchError::Failed {
                url: url.to_string(),
                reason: format!("create temp file in {}: {err}", parent.display()),
            })?;
            let bytes = response
                .copy_to(tmp.as_file_mut())
                .map_err(|err| FetchError::Transient {
                    url: url.to_string(),
                    reason: err.to_string(),
                })?;
            Ok((tmp, bytes))
        })?;
        tmp.persist(dest)
            .with_context(|| format!("write {}", dest.display()))?;
        debug!(url, path = %dest.display(), bytes, "downloaded");
        Ok(bytes)
    }

    /// Fetches a small body into memory.
    pub fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        with_retry(&self.policy, url, || {
            let mut response = self.get(url)?;
            let mut body = Vec::new();
            response
                .read_to_end(&mut body)
                .map_err(|err| FetchError::Transient {
                    url: url.to_string(),
                    reason: err.to_string(),
                })?;
            Ok(body)
        })
    }

    fn get(&self, url: &str) -> Result<Response, FetchError> {
        let response = self.client.get(url).send().map_err(|err| {
            if err.is_timeout() || err.is_connect() || err.is_request() {
                FetchError::Transient {
                    url: url.to_string(),
                    reason: err.to_string(),
                }
            } else {
                FetchError::Failed {
                    url: url.to_string(),
                    reason: err.to_string(),
                }
            }
        })?;
        classify_status(url, response.status())?;
        Ok(response)
    }
}

fn classify_status(url: &str, status: StatusCode) -> Result<(), FetchError> {
    if status.is_success() {
        return Ok(());
    }
    let reason = format!("HTTP {status}");
    if status == StatusCode::NOT_FOUND {
        Err(FetchError::NotFound {
            url: url.to_string(),
        })
    } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Err(FetchError::Transient {
            url: url.to_string(),
            reason,
        })
    } else {
        Err(FetchError::Failed {
            url: url.to_string(),
            reason,
        })
    }
}
