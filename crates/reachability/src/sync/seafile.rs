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

//! HTTP implementation of [`RepoApi`] for the Seafile web API.
//!
//! - `GET <server>/api2/repos/`
//! - `GET <server>/api2/repos/<id>/dir/?p=<path>`
//!
//! Both authenticate with `Authorization: Token <token>`.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::{ApiError, Dirent, Repo, RepoApi};
use crate::account::Account;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Seafile listing client. Clones share the connection pool.
#[derive(Debug, Clone)]
pub struct SeafileApi {
    client: reqwest::Client,
}

impl SeafileApi {
    /// Client with a 30s overall request timeout.
    pub fn new() -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(Self { client })
    }

    /// Reuse an existing client, e.g. the one behind the probe.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        account: &Account,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let token = account.token.as_deref().ok_or(ApiError::MissingToken)?;

        let response = self
            .client
            .get(url)
            .header(reqwest::header::AUTHORIZATION, format!("Token {token}"))
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl RepoApi for SeafileApi {
    async fn list_repos(&self, account: &Account) -> Result<Vec<Repo>, ApiError> {
        self.get_json(account, &account.api_url("api2/repos/"), &[])
            .await
    }

    async fn list_dirents(
        &self,
        account: &Account,
        repo_id: &str,
        _repo_name: &str,
        path: &str,
    ) -> Result<Vec<Dirent>, ApiError> {
        let url = account.api_url(&format!("api2/repos/{repo_id}/dir/"));
        self.get_json(account, &url, &[("p", path)]).await
    }
}
