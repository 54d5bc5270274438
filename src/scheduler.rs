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

//! Metadata sync scheduling.
//!
//! Runs the sync unit of work on a fixed interval while online, and once
//! right away whenever connectivity comes back. A `Retry` outcome is simply
//! picked up again on the next tick.
//!
//! The first delivery of a fresh subscription is the replayed current value.
//! Taken before the tracker's first reconcile it is only the optimistic
//! initial `true`, so it is skipped and the first sync waits for a published
//! result.

use log::{error, info, warn};
use std::sync::Arc;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use reachability::{AccountContext, MetadataSyncPort, Subscription, SyncOutcome};

use crate::status::SharedConnectivityStatus;

/// Drives a [`MetadataSyncPort`] from connectivity changes and a timer
pub struct SyncScheduler {
    job: Arc<dyn MetadataSyncPort>,
    accounts: Arc<dyn AccountContext>,
    status: SharedConnectivityStatus,
    period: Duration,
}

impl std::fmt::Debug for SyncScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncScheduler")
            .field("period", &self.period)
            .finish_non_exhaustive()
    }
}

impl SyncScheduler {
    pub fn new(
        job: Arc<dyn MetadataSyncPort>,
        accounts: Arc<dyn AccountContext>,
        status: SharedConnectivityStatus,
        period: Duration,
    ) -> Self {
        Self {
            job,
            accounts,
            status,
            period,
        }
    }

    /// Run one unit of work against the current account
    pub async fn run_once(&self) -> SyncOutcome {
        let account = self.accounts.current_account();
        let outcome = self.job.run(account.as_ref()).await;

        match &outcome {
            SyncOutcome::Success(_) => {}
            SyncOutcome::Retry(reason) => {
                warn!("Metadata sync will retry in {}s: {}", self.period.as_secs(), reason);
            }
            SyncOutcome::PermanentFailure(reason) => error!("Metadata sync failed: {}", reason),
        }

        if let Ok(mut status) = self.status.lock() {
            status.record_sync(&outcome);
        }

        outcome
    }

    /// Run once unless cancelled first. Returns false when cancelled.
    async fn run_unless_cancelled(&self, cancel_token: &CancellationToken) -> bool {
        tokio::select! {
            _ = self.run_once() => true,
            () = cancel_token.cancelled() => false,
        }
    }

    /// Loop until cancelled or the subscription closes.
    ///
    /// Subscribe before the tracker's first trigger so the skipped replay is
    /// the initial value rather than a probe result.
    pub async fn run(self, mut subscription: Subscription<bool>, cancel_token: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut online = false;
        info!("Metadata sync scheduled every {}s", self.period.as_secs());

        tokio::select! {
            replay = subscription.recv() => {
                if replay.is_none() {
                    return;
                }
            }
            () = cancel_token.cancelled() => return,
        }

        loop {
            tokio::select! {
                value = subscription.recv() => {
                    let Some(now_online) = value else {
                        return;
                    };
                    let came_online = now_online && !online;
                    online = now_online;
                    if came_online && !self.run_unless_cancelled(&cancel_token).await {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if online && !self.run_unless_cancelled(&cancel_token).await {
                        break;
                    }
                }
                () = cancel_token.cancelled() => break,
            }
        }

        info!("Metadata sync scheduler stopped");
    }
}
