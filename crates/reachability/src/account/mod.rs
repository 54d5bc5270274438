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

//! Account context: which server (if any) reachability is measured against.

use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// Health-check path appended to the server base URL.
pub const PING_PATH: &str = "api2/ping/";

/// A configured server account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Server base URL, e.g. `https://cloud.example.com`.
    pub server: String,

    /// Account login, used only for display and logging.
    #[serde(default)]
    pub email: String,

    /// API token sent as `Authorization: Token <token>`.
    #[serde(default)]
    pub token: Option<String>,
}

impl Account {
    /// Account without an API token.
    pub fn new(server: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            email: email.into(),
            token: None,
        }
    }

    /// Attach an API token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Server base URL with exactly one trailing slash.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("{}/", self.server.trim_end_matches('/'))
    }

    /// Build an API URL relative to the server base.
    #[must_use]
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path.trim_start_matches('/'))
    }

    /// `<server>/api2/ping/`
    #[must_use]
    pub fn ping_url(&self) -> String {
        self.api_url(PING_PATH)
    }
}

/// Lookup of the currently active account.
///
/// `None` means a reachability check is meaningless and the server is assumed
/// reachable.
pub trait AccountContext: Send + Sync {
    fn current_account(&self) -> Option<Account>;
}

/// In-memory account holder that can be swapped at runtime.
#[derive(Debug, Default)]
pub struct StaticAccountContext {
    account: RwLock<Option<Account>>,
}

impl StaticAccountContext {
    /// Start with `account` active.
    #[must_use]
    pub fn new(account: Option<Account>) -> Self {
        Self {
            account: RwLock::new(account),
        }
    }

    /// Replace the active account. Returns the previous one.
    ///
    /// Callers must follow up with `ReachabilityTracker::on_account_changed`.
    /// A probe result for the previous server is dropped without publishing,
    /// so observers see no update for the new server until the tracker
    /// reconciles against it.
    pub fn set_account(&self, account: Option<Account>) -> Option<Account> {
        match self.account.write() {
            Ok(mut slot) => std::mem::replace(&mut *slot, account),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), account),
        }
    }
}

impl AccountContext for StaticAccountContext {
    fn current_account(&self) -> Option<Account> {
        self.account
            .read()
            .map(|a| a.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}
