// Copyright 2025 Chris Custine
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

//! Server reachability probe.
//!
//! A probe is a single bounded-timeout `GET` against the server's health-check
//! endpoint. Any 2xx response counts as reachable; every other outcome
//! (non-2xx, connect failure, timeout) counts as unreachable. The distinction
//! is kept in [`ProbeOutcome`] for logging only.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use thiserror::Error;

/// Connect and read timeouts applied to each probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeTimeouts {
    pub connect: Duration,
    pub read: Duration,
}

impl Default for ProbeTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(3),
            read: Duration::from_secs(3),
        }
    }
}

/// Why a probe could not produce an HTTP response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("probe timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to build probe client: {0}")]
    Client(String),
}

/// Result of a single probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Server answered with a 2xx status.
    Success,
    /// Server answered with a non-2xx status.
    Failure(u16),
    /// No usable response.
    Error(ProbeError),
}

impl ProbeOutcome {
    /// Only a 2xx answer counts as reachable.
    #[must_use]
    pub fn is_reachable(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Classify an HTTP status code.
    #[must_use]
    pub fn from_status(status: u16) -> Self {
        if (200..300).contains(&status) {
            Self::Success
        } else {
            Self::Failure(status)
        }
    }
}

/// Sends a health-check probe to a URL.
#[async_trait]
pub trait ProbeClient: Send + Sync {
    async fn ping(&self, url: &str) -> ProbeOutcome;
}

/// HTTP probe client backed by a shared `reqwest` connection pool.
#[derive(Debug, Clone)]
pub struct HttpProbeClient {
    client: reqwest::Client,
    timeouts: ProbeTimeouts,
}

impl HttpProbeClient {
    /// Build a client with the given connect and read timeouts.
    pub fn new(timeouts: ProbeTimeouts) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeouts.connect)
            .read_timeout(timeouts.read)
            .build()
            .map_err(|e| ProbeError::Client(e.to_string()))?;

        Ok(Self { client, timeouts })
    }

    /// Timeouts this client was built with.
    #[must_use]
    pub fn timeouts(&self) -> ProbeTimeouts {
        self.timeouts
    }
}

#[async_trait]
impl ProbeClient for HttpProbeClient {
    async fn ping(&self, url: &str) -> ProbeOutcome {
        // Overall bound in case the server trickles bytes under the read timeout
        let deadline = self.timeouts.connect + self.timeouts.read;

        match self.client.get(url).timeout(deadline).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                debug!("Probe {} answered {}", url, status);
                ProbeOutcome::from_status(status)
            }
            Err(e) => {
                debug!("Probe {} failed: {}", url, e);
                ProbeOutcome::Error(classify(&e))
            }
        }
    }
}

fn classify(err: &reqwest::Error) -> ProbeError {
    if err.is_timeout() {
        ProbeError::Timeout
    } else if err.is_connect() {
        ProbeError::Connect(err.to_string())
    } else {
        ProbeError::Request(err.to_string())
    }
}
