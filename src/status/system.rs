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

use chrono::{DateTime, Utc};
use reachability::SyncOutcome;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

const MAX_DIAGNOSTICS: usize = 50;

/// Diagnostic message with timestamp
#[derive(Debug, Clone)]
pub struct DiagnosticMessage {
    pub timestamp: DateTime<Utc>,
    pub level: DiagnosticLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Info,
    Warning,
    Error,
}

/// Connectivity history and sync results for display and shutdown summaries
#[derive(Debug)]
pub struct ConnectivityStatus {
    /// Last online value received from the tracker
    pub online: bool,

    /// When the current online stretch started
    pub online_since: Option<DateTime<Utc>>,

    /// Number of online/offline flips observed
    pub transitions: u64,

    /// Time and summary of the last metadata sync
    pub last_sync: Option<(DateTime<Utc>, String)>,

    // Diagnostic messages (keep last 50)
    pub diagnostics: VecDeque<DiagnosticMessage>,
}

impl Default for ConnectivityStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectivityStatus {
    pub fn new() -> Self {
        Self {
            online: true,
            online_since: None,
            transitions: 0,
            last_sync: None,
            diagnostics: VecDeque::with_capacity(MAX_DIAGNOSTICS),
        }
    }

    /// Record a delivered online value. Returns true if it flipped.
    pub fn record_online(&mut self, online: bool) -> bool {
        let now = Utc::now();

        if online && self.online_since.is_none() {
            self.online_since = Some(now);
        }

        if online == self.online {
            return false;
        }

        self.online = online;
        self.transitions += 1;

        if online {
            self.online_since = Some(now);
            self.add_diagnostic(DiagnosticLevel::Info, "Server reachable".to_string());
        } else {
            self.online_since = None;
            self.add_diagnostic(DiagnosticLevel::Warning, "Connectivity lost".to_string());
        }

        true
    }

    /// Record the result of a metadata sync run
    pub fn record_sync(&mut self, outcome: &SyncOutcome) {
        let (level, message) = match outcome {
            SyncOutcome::Success(report) => (
                if report.failed.is_empty() {
                    DiagnosticLevel::Info
                } else {
                    DiagnosticLevel::Warning
                },
                format!(
                    "Metadata sync: {} repos, {} dirs, {} failed",
                    report.repos_listed,
                    report.dirs_synced,
                    report.failed.len()
                ),
            ),
            SyncOutcome::Retry(reason) => (
                DiagnosticLevel::Warning,
                format!("Metadata sync will retry: {reason}"),
            ),
            SyncOutcome::PermanentFailure(reason) => (
                DiagnosticLevel::Error,
                format!("Metadata sync failed: {reason}"),
            ),
        };

        self.last_sync = Some((Utc::now(), message.clone()));
        self.add_diagnostic(level, message);
    }

    /// Add a diagnostic message
    pub fn add_diagnostic(&mut self, level: DiagnosticLevel, message: String) {
        self.diagnostics.push_back(DiagnosticMessage {
            timestamp: Utc::now(),
            level,
            message,
        });

        // Keep only the last N messages
        while self.diagnostics.len() > MAX_DIAGNOSTICS {
            self.diagnostics.pop_front();
        }
    }

    /// Seconds spent online in the current stretch
    pub fn uptime_seconds(&self) -> u64 {
        match (self.online, self.online_since) {
            (true, Some(since)) => u64::try_from((Utc::now() - since).num_seconds()).unwrap_or(0),
            _ => 0,
        }
    }

    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{} ({} transitions, up {}s)",
            if self.online { "online" } else { "offline" },
            self.transitions,
            self.uptime_seconds()
        );
        if let Some((at, message)) = &self.last_sync {
            summary.push_str(&format!("; last sync {}: {}", at.format("%H:%M:%S"), message));
        }
        summary
    }

    /// Most recent diagnostics, newest first
    pub fn recent_diagnostics(&self, count: usize) -> impl Iterator<Item = &DiagnosticMessage> {
        self.diagnostics.iter().rev().take(count)
    }
}

/// Thread-safe wrapper for ConnectivityStatus
pub type SharedConnectivityStatus = Arc<Mutex<ConnectivityStatus>>;
