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

//! Application configuration management.
//!
//! Persistent TOML configuration via confy. Holds the active account, probe
//! timeouts and the polling/sync intervals. `SEAFILE_SERVER`, `SEAFILE_EMAIL`
//! and `SEAFILE_TOKEN` override the stored account.

use std::time::Duration;

use reachability::{Account, ProbeTimeouts, TrackerConfig};
use serde::{Deserialize, Serialize};

const APP_NAME: &str = "seafile-netmon";
const CONFIG_NAME: &str = "config";

/// Address used to decide whether the OS has any route out
pub const DEFAULT_LINK_CHECK_ADDRESS: &str = "1.1.1.1:53";

/// Application configuration stored in TOML format
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    /// Configuration schema version
    #[serde(default = "default_config_version")]
    pub config_version: u32,

    /// Active server account; none means "assume reachable"
    #[serde(default)]
    pub account: Option<Account>,

    /// Probe connect timeout in milliseconds
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_connect_timeout_ms: u64,

    /// Probe read timeout in milliseconds
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_read_timeout_ms: u64,

    /// Upper bound on concurrently running probes
    #[serde(default = "default_max_concurrent_probes")]
    pub max_concurrent_probes: usize,

    /// How often the link watcher polls the OS for route changes
    #[serde(default = "default_link_poll_interval_secs")]
    pub link_poll_interval_secs: u64,

    /// UDP address used for the route check (no packets are sent)
    #[serde(default = "default_link_check_address")]
    pub link_check_address: String,

    /// Run the metadata sync job while online
    #[serde(default = "default_true")]
    pub sync_enabled: bool,

    /// Interval between metadata syncs while online
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
}

// Default value functions for serde
fn default_config_version() -> u32 {
    1
}

fn default_probe_timeout_ms() -> u64 {
    3_000
}

fn default_max_concurrent_probes() -> usize {
    2
}

fn default_link_poll_interval_secs() -> u64 {
    5
}

fn default_link_check_address() -> String {
    DEFAULT_LINK_CHECK_ADDRESS.to_string()
}

fn default_true() -> bool {
    true
}

fn default_sync_interval_secs() -> u64 {
    900
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            account: None,
            probe_connect_timeout_ms: default_probe_timeout_ms(),
            probe_read_timeout_ms: default_probe_timeout_ms(),
            max_concurrent_probes: default_max_concurrent_probes(),
            link_poll_interval_secs: default_link_poll_interval_secs(),
            link_check_address: default_link_check_address(),
            sync_enabled: true,
            sync_interval_secs: default_sync_interval_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from disk, creating the default file if missing
    pub fn load() -> Result<Self, confy::ConfyError> {
        confy::load(APP_NAME, CONFIG_NAME)
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<(), confy::ConfyError> {
        confy::store(APP_NAME, CONFIG_NAME, self)
    }

    /// Get the config file path for display to user
    pub fn get_config_path() -> Result<std::path::PathBuf, confy::ConfyError> {
        confy::get_configuration_file_path(APP_NAME, CONFIG_NAME)
    }

    pub fn probe_timeouts(&self) -> ProbeTimeouts {
        ProbeTimeouts {
            connect: Duration::from_millis(self.probe_connect_timeout_ms),
            read: Duration::from_millis(self.probe_read_timeout_ms),
        }
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            max_concurrent_probes: self.max_concurrent_probes,
        }
    }

    pub fn link_poll_interval(&self) -> Duration {
        Duration::from_secs(self.link_poll_interval_secs.max(1))
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs.max(1))
    }

    /// Resolve the active account from environment variables and config
    pub fn resolve_account(&self) -> Option<Account> {
        self.resolve_account_with(|key| std::env::var(key).ok())
    }

    /// Environment values take precedence over the stored account; empty
    /// values are ignored.
    pub fn resolve_account_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Option<Account> {
        let env = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let mut account = match (env("SEAFILE_SERVER"), self.account.clone()) {
            (Some(server), Some(stored)) => Account { server, ..stored },
            (Some(server), None) => Account::new(server, ""),
            (None, stored) => stored?,
        };

        if let Some(email) = env("SEAFILE_EMAIL") {
            account.email = email;
        }
        if let Some(token) = env("SEAFILE_TOKEN") {
            account.token = Some(token);
        }

        Some(account)
    }
}
