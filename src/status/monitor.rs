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

use log::{info, warn};
use reachability::Subscription;
use tokio_util::sync::CancellationToken;

use super::SharedConnectivityStatus;

/// Record every delivered online value until cancelled or unsubscribed
pub async fn monitor_connectivity(
    mut subscription: Subscription<bool>,
    status: SharedConnectivityStatus,
    cancel_token: CancellationToken,
) {
    loop {
        let online = tokio::select! {
            value = subscription.recv() => match value {
                Some(online) => online,
                None => return,
            },
            () = cancel_token.cancelled() => return,
        };

        let changed = match status.lock() {
            Ok(mut status) => status.record_online(online),
            Err(_) => continue,
        };

        if changed {
            if online {
                info!("Connectivity: online");
            } else {
                warn!("Connectivity: offline");
            }
        }
    }
}
