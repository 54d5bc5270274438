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

//! Remote metadata sync unit of work.
//!
//! The job lists the account's repositories and then the root directory of
//! every unencrypted one. It is driven by an external scheduler that reacts
//! to the three [`SyncOutcome`] variants. A failure on one repository is
//! logged and skipped; it never aborts the whole unit.

mod seafile;

pub use seafile::SeafileApi;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::account::Account;

/// Errors from the remote listing API.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("account has no API token")]
    MissingToken,

    #[error("server returned HTTP {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response body: {0}")]
    Decode(String),
}

/// Repository as returned by the listing API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub encrypted: bool,
    #[serde(rename = "type", default)]
    pub repo_type: String,
}

/// Directory entry as returned by the directory listing API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dirent {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub mtime: Option<i64>,
}

/// Remote listing calls used by the sync job.
#[async_trait]
pub trait RepoApi: Send + Sync {
    async fn list_repos(&self, account: &Account) -> Result<Vec<Repo>, ApiError>;

    async fn list_dirents(
        &self,
        account: &Account,
        repo_id: &str,
        repo_name: &str,
        path: &str,
    ) -> Result<Vec<Dirent>, ApiError>;
}

/// Counters for one completed sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub repos_listed: usize,
    pub dirs_synced: usize,
    pub skipped_encrypted: usize,
    /// Names of repositories whose directory listing failed.
    pub failed: Vec<String>,
}

/// What the scheduler should do after a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Success(SyncReport),
    /// Transient failure; run again later.
    Retry(String),
    /// Cannot succeed without outside intervention.
    PermanentFailure(String),
}

impl SyncOutcome {
    /// True for [`SyncOutcome::Success`], even with per-repo failures.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Unit-of-work contract invoked by a scheduler.
#[async_trait]
pub trait MetadataSyncPort: Send + Sync {
    async fn run(&self, account: Option<&Account>) -> SyncOutcome;
}

/// Root directory path synced for each repository.
pub const ROOT_PATH: &str = "/";

/// Repository and root-directory sync over a [`RepoApi`].
#[derive(Debug)]
pub struct MetadataSyncJob<A> {
    api: A,
}

impl<A: RepoApi> MetadataSyncJob<A> {
    /// Wrap a listing API.
    pub fn new(api: A) -> Self {
        Self { api }
    }

    /// The listing API in use.
    pub fn api(&self) -> &A {
        &self.api
    }
}

#[async_trait]
impl<A: RepoApi> MetadataSyncPort for MetadataSyncJob<A> {
    async fn run(&self, account: Option<&Account>) -> SyncOutcome {
        let Some(account) = account else {
            warn!("Metadata sync skipped: no account configured");
            return SyncOutcome::PermanentFailure("no account configured".to_string());
        };

        let repos = match self.api.list_repos(account).await {
            Ok(repos) => repos,
            Err(e) => {
                warn!("Metadata sync failed for {}: {}", account.email, e);
                return SyncOutcome::Retry(e.to_string());
            }
        };
        debug!("Synced {} repos for {}", repos.len(), account.email);

        let mut report = SyncReport {
            repos_listed: repos.len(),
            ..SyncReport::default()
        };

        for repo in &repos {
            if repo.encrypted {
                report.skipped_encrypted += 1;
                continue;
            }

            match self
                .api
                .list_dirents(account, &repo.id, &repo.name, ROOT_PATH)
                .await
            {
                Ok(dirents) => {
                    debug!("Repo '{}': {} root entries", repo.name, dirents.len());
                    report.dirs_synced += 1;
                }
                Err(e) => {
                    warn!("Failed to sync dirents for repo '{}': {}", repo.name, e);
                    report.failed.push(repo.name.clone());
                }
            }
        }

        info!(
            "Metadata sync done: {} repos, {} dirs, {} encrypted skipped, {} failed",
            report.repos_listed,
            report.dirs_synced,
            report.skipped_encrypted,
            report.failed.len()
        );

        SyncOutcome::Success(report)
    }
}
