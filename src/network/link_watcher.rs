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

//! Desktop link-state detection.
//!
//! There is no portable OS callback for network attachment changes, so the
//! watcher polls a [`LinkStateSource`] and turns transitions into
//! `on_available` / `on_lost` notifications.

use log::{debug, info};
use std::net::{SocketAddr, UdpSocket};
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

use reachability::{LinkChangeSource, LinkListener, LinkState, LinkStateSource};

/// Link is up when the OS has a route to `target`.
///
/// Connecting a UDP socket only performs a route lookup; nothing is sent.
#[derive(Debug, Clone)]
pub struct RouteLinkSource {
    target: SocketAddr,
}

impl RouteLinkSource {
    pub fn new(target: SocketAddr) -> Self {
        Self { target }
    }
}

impl LinkStateSource for RouteLinkSource {
    fn is_link_up(&self) -> bool {
        let bind_addr = if self.target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };

        UdpSocket::bind(bind_addr)
            .and_then(|socket| socket.connect(self.target))
            .is_ok()
    }
}

type Listeners = Arc<Mutex<Vec<Box<dyn LinkListener>>>>;

/// Polls a link source and notifies registered listeners on transitions
pub struct PollingLinkWatcher {
    listeners: Listeners,
    cancel_token: CancellationToken,
}

impl std::fmt::Debug for PollingLinkWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingLinkWatcher")
            .field("cancel_token", &self.cancel_token)
            .finish_non_exhaustive()
    }
}

impl PollingLinkWatcher {
    /// Start polling `source` every `interval` in a background task
    pub fn spawn(source: Arc<dyn LinkStateSource>, interval: Duration) -> Self {
        let listeners: Listeners = Arc::new(Mutex::new(Vec::new()));
        let cancel_token = CancellationToken::new();

        let task_listeners = Arc::clone(&listeners);
        let task_cancel = cancel_token.clone();

        tokio::spawn(async move {
            watch_loop(source, interval, task_listeners, task_cancel).await;
        });

        Self {
            listeners,
            cancel_token,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().map(|l| l.len()).unwrap_or(0)
    }

    /// Stop polling
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

impl Drop for PollingLinkWatcher {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

impl LinkChangeSource for PollingLinkWatcher {
    fn register(&self, listener: Box<dyn LinkListener>) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push(listener);
        }
    }
}

async fn watch_loop(
    source: Arc<dyn LinkStateSource>,
    interval: Duration,
    listeners: Listeners,
    cancel_token: CancellationToken,
) {
    let mut last = source.link_state();
    debug!("Link watcher started, link is {}", last);

    loop {
        tokio::select! {
            () = sleep(interval) => {}
            () = cancel_token.cancelled() => {
                debug!("Link watcher cancelled");
                return;
            }
        }

        let current = source.link_state();
        if current == last {
            continue;
        }

        info!("Link {} -> {}", last, current);
        last = current;

        let Ok(guard) = listeners.lock() else {
            continue;
        };
        for listener in guard.iter() {
            match current {
                LinkState::Up => listener.on_available(),
                LinkState::Down => listener.on_lost(),
            }
        }
    }
}
