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

//! Reachability tracker: reconciles link state with server probes.
//!
//! The tracker keeps two facts, the last known [`LinkState`] and whether the
//! last probe reached the server, and derives the online flag from them:
//! `online = link == Up && reachable`. Every trigger (link change, manual
//! refresh, account change) runs a reconciliation:
//!
//! 1. Link down: reset `reachable` to `true`, publish `false`, no probe.
//! 2. Link up, no account: `reachable = true`, publish `true`, no probe.
//! 3. Link up with an account: dispatch one probe; its completion sets
//!    `reachable` and publishes the recomputed online flag.
//!
//! The reset to `true` on link loss only works because every link-up trigger
//! re-probes before the bit matters again. Anything that reads `reachable`
//! while the link is up without having re-probed first will see stale
//! optimism.
//!
//! All mutations and their publish happen under one mutex together with a
//! generation counter. Each trigger bumps the generation; a probe completion
//! is applied only if its generation is still current and its target URL is
//! still the active account's, otherwise it is dropped.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::account::AccountContext;
use crate::link::{LinkChangeSource, LinkListener, LinkState, LinkStateSource};
use crate::observable::ConnectivityObservable;
use crate::probe::{ProbeClient, ProbeOutcome};

/// Tracker tuning.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Upper bound on probes running at once.
    pub max_concurrent_probes: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_probes: 2,
        }
    }
}

/// Collaborators the tracker consults on every reconciliation.
pub struct TrackerPorts {
    pub link_source: Arc<dyn LinkStateSource>,
    pub accounts: Arc<dyn AccountContext>,
    pub probe: Arc<dyn ProbeClient>,
}

impl std::fmt::Debug for TrackerPorts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerPorts").finish_non_exhaustive()
    }
}

/// Point-in-time copy of the tracker state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectivitySnapshot {
    pub link: LinkState,
    pub reachable: bool,
    pub online: bool,
    pub generation: u64,
    pub last_probe_at: Option<DateTime<Utc>>,
    pub last_probe_reachable: Option<bool>,
    pub stale_discarded: u64,
}

#[derive(Debug)]
struct ReconcileState {
    link: LinkState,
    reachable: bool,
    generation: u64,
    last_probe_at: Option<DateTime<Utc>>,
    last_probe_reachable: Option<bool>,
    stale_discarded: u64,
}

impl ReconcileState {
    fn online(&self) -> bool {
        self.link.is_up() && self.reachable
    }

    fn advance(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }
}

struct Shared {
    state: Mutex<ReconcileState>,
    observable: ConnectivityObservable<bool>,
    ports: TrackerPorts,
    permits: Arc<Semaphore>,
    runtime: Handle,
    cancel: CancellationToken,
}

/// Process-wide connectivity state. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ReachabilityTracker {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ReachabilityTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReachabilityTracker")
            .field("state", &*self.shared.lock())
            .field("subscribers", &self.shared.observable.subscriber_count())
            .finish_non_exhaustive()
    }
}

impl ReachabilityTracker {
    /// Create a tracker that spawns probes on `runtime`.
    ///
    /// Starts optimistic: link up, reachable, online. Nothing is probed until
    /// the first trigger.
    #[must_use]
    pub fn new(ports: TrackerPorts, config: &TrackerConfig, runtime: Handle) -> Self {
        let permits = config.max_concurrent_probes.max(1);

        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(ReconcileState {
                    link: LinkState::Up,
                    reachable: true,
                    generation: 0,
                    last_probe_at: None,
                    last_probe_reachable: None,
                    stale_discarded: 0,
                }),
                observable: ConnectivityObservable::new(true),
                ports,
                permits: Arc::new(Semaphore::new(permits)),
                runtime,
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Create a tracker on the runtime of the calling task.
    ///
    /// Panics when called outside a tokio runtime.
    #[must_use]
    pub fn spawn(ports: TrackerPorts, config: &TrackerConfig) -> Self {
        Self::new(ports, config, Handle::current())
    }

    /// Subscribe to link transitions from `source` and reconcile right away.
    ///
    /// Registering the same source twice produces duplicate triggers.
    pub fn register(&self, source: &dyn LinkChangeSource) {
        source.register(Box::new(TrackerListener {
            shared: Arc::downgrade(&self.shared),
        }));
        self.shared.reconcile("register");
    }

    /// Force a reconciliation, e.g. after resuming from background.
    pub fn refresh(&self) {
        self.shared.reconcile("refresh");
    }

    /// Reconcile against the newly active account. Any probe still running
    /// against the previous server is superseded.
    ///
    /// Must be called after every account swap. A result for the old server
    /// is discarded without publishing, so until this runs observers keep the
    /// last value published for the old account.
    pub fn on_account_changed(&self) {
        self.shared.reconcile("account changed");
    }

    /// Combined online state from the stored link state and reachability.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.shared.lock().online()
    }

    /// Publish channel for online state changes.
    #[must_use]
    pub fn observable(&self) -> ConnectivityObservable<bool> {
        self.shared.observable.clone()
    }

    /// Copy of the current link, reachability and probe bookkeeping.
    #[must_use]
    pub fn snapshot(&self) -> ConnectivitySnapshot {
        let state = self.shared.lock();
        ConnectivitySnapshot {
            link: state.link,
            reachable: state.reachable,
            online: state.online(),
            generation: state.generation,
            last_probe_at: state.last_probe_at,
            last_probe_reachable: state.last_probe_reachable,
            stale_discarded: state.stale_discarded,
        }
    }

    /// Stop accepting triggers and abort in-flight probes.
    pub fn shutdown(&self) {
        if !self.shared.cancel.is_cancelled() {
            info!("Shutting down reachability tracker");
            self.shared.cancel.cancel();
        }
    }

    /// True once [`ReachabilityTracker::shutdown`] has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ReconcileState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Publish while the state lock is held so observers never see a value
    /// computed from a torn link/reachability pair.
    fn publish(&self, state: &ReconcileState) {
        self.observable.publish(state.online());
    }

    fn reconcile(self: &Arc<Self>, trigger: &str) {
        if self.cancel.is_cancelled() {
            debug!("Ignoring {} trigger after shutdown", trigger);
            return;
        }

        // Both queries happen under the lock so that generation order matches
        // the order in which the link/account facts were observed.
        let mut state = self.lock();
        let link = self.ports.link_source.link_state();

        if !link.is_up() {
            let generation = state.advance();
            debug!("[{}] link down (generation {})", trigger, generation);
            self.apply_link_down(&mut state);
            return;
        }

        let generation = state.advance();
        state.link = LinkState::Up;

        let Some(account) = self.ports.accounts.current_account() else {
            debug!("[{}] no account configured, assuming reachable", trigger);
            state.reachable = true;
            self.publish(&state);
            return;
        };

        let url = account.ping_url();
        drop(state);

        debug!("[{}] probing {} (generation {})", trigger, url, generation);
        self.dispatch_probe(generation, url);
    }

    fn link_lost(&self) {
        if self.cancel.is_cancelled() {
            return;
        }

        let mut state = self.lock();
        let generation = state.advance();
        debug!("Link lost (generation {})", generation);
        self.apply_link_down(&mut state);
    }

    fn apply_link_down(&self, state: &mut ReconcileState) {
        if state.online() {
            info!("Link down, connectivity lost");
        }
        state.link = LinkState::Down;
        state.reachable = true;
        self.publish(state);
    }

    fn dispatch_probe(self: &Arc<Self>, generation: u64, url: String) {
        let shared = Arc::clone(self);

        self.runtime.spawn(async move {
            let permit = tokio::select! {
                permit = Arc::clone(&shared.permits).acquire_owned() => permit,
                () = shared.cancel.cancelled() => return,
            };
            let Ok(_permit) = permit else {
                return;
            };

            let superseded = shared.lock().generation != generation;
            if superseded {
                debug!("Skipping superseded probe (generation {})", generation);
                return;
            }

            let outcome = tokio::select! {
                outcome = shared.ports.probe.ping(&url) => outcome,
                () = shared.cancel.cancelled() => return,
            };

            shared.apply_probe_result(generation, &url, &outcome);
        });
    }

    fn apply_probe_result(&self, generation: u64, url: &str, outcome: &ProbeOutcome) {
        let current_url = self.ports.accounts.current_account().map(|a| a.ping_url());
        let mut state = self.lock();

        if state.generation != generation || current_url.as_deref() != Some(url) {
            state.stale_discarded += 1;
            debug!(
                "Discarding stale probe result for {} (generation {}, current {})",
                url, generation, state.generation
            );
            return;
        }

        let reachable = outcome.is_reachable();
        let was_online = state.online();

        state.reachable = reachable;
        state.last_probe_at = Some(Utc::now());
        state.last_probe_reachable = Some(reachable);

        match outcome {
            ProbeOutcome::Success => debug!("Probe {} succeeded", url),
            ProbeOutcome::Failure(status) => debug!("Probe {} returned HTTP {}", url, status),
            ProbeOutcome::Error(e) => debug!("Probe {} failed: {}", url, e),
        }

        let online = state.online();
        if online != was_online {
            info!("Server {} is now {}", url, if online { "reachable" } else { "unreachable" });
        }

        self.publish(&state);
    }
}

/// Forwards link notifications to a tracker without keeping it alive.
struct TrackerListener {
    shared: Weak<Shared>,
}

impl LinkListener for TrackerListener {
    fn on_available(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.reconcile("link available");
        }
    }

    fn on_lost(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.link_lost();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{Account, StaticAccountContext};
    use crate::probe::ProbeError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot;

    struct FakeLink {
        up: AtomicBool,
    }

    impl FakeLink {
        fn new(up: bool) -> Arc<Self> {
            Arc::new(Self {
                up: AtomicBool::new(up),
            })
        }

        fn set(&self, up: bool) {
            self.up.store(up, Ordering::SeqCst);
        }
    }

    impl LinkStateSource for FakeLink {
        fn is_link_up(&self) -> bool {
            self.up.load(Ordering::SeqCst)
        }
    }

    /// Probe whose results are released by the test through oneshot gates.
    /// Calls without a queued gate return `fallback` immediately.
    struct ScriptedProbe {
        calls: Mutex<Vec<String>>,
        gates: Mutex<VecDeque<oneshot::Receiver<ProbeOutcome>>>,
        fallback: ProbeOutcome,
    }

    impl ScriptedProbe {
        fn new(fallback: ProbeOutcome) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                gates: Mutex::new(VecDeque::new()),
                fallback,
            })
        }

        fn gate(&self) -> oneshot::Sender<ProbeOutcome> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().unwrap().push_back(rx);
            tx
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ProbeClient for ScriptedProbe {
        async fn ping(&self, url: &str) -> ProbeOutcome {
            self.calls.lock().unwrap().push(url.to_string());
            let gate = self.gates.lock().unwrap().pop_front();
            match gate {
                Some(rx) => rx.await.unwrap_or(ProbeOutcome::Error(ProbeError::Timeout)),
                None => self.fallback.clone(),
            }
        }
    }

    #[derive(Default)]
    struct FakeLinkChanges {
        listeners: Mutex<Vec<Box<dyn LinkListener>>>,
    }

    impl FakeLinkChanges {
        fn fire_available(&self) {
            for l in self.listeners.lock().unwrap().iter() {
                l.on_available();
            }
        }

        fn fire_lost(&self) {
            for l in self.listeners.lock().unwrap().iter() {
                l.on_lost();
            }
        }
    }

    impl LinkChangeSource for FakeLinkChanges {
        fn register(&self, listener: Box<dyn LinkListener>) {
            self.listeners.lock().unwrap().push(listener);
        }
    }

    struct Harness {
        tracker: ReachabilityTracker,
        link: Arc<FakeLink>,
        accounts: Arc<StaticAccountContext>,
        probe: Arc<ScriptedProbe>,
    }

    fn account() -> Account {
        Account::new("https://cloud.example.com", "user@example.com")
    }

    fn harness(link_up: bool, account: Option<Account>, fallback: ProbeOutcome) -> Harness {
        harness_with(link_up, account, fallback, &TrackerConfig::default())
    }

    fn harness_with(
        link_up: bool,
        account: Option<Account>,
        fallback: ProbeOutcome,
        config: &TrackerConfig,
    ) -> Harness {
        let link = FakeLink::new(link_up);
        let accounts = Arc::new(StaticAccountContext::new(account));
        let probe = ScriptedProbe::new(fallback);

        let tracker = ReachabilityTracker::spawn(
            TrackerPorts {
                link_source: link.clone(),
                accounts: accounts.clone(),
                probe: probe.clone(),
            },
            config,
        );

        Harness {
            tracker,
            link,
            accounts,
            probe,
        }
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !cond() {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_initial_state_is_optimistic() {
        let h = harness(true, Some(account()), ProbeOutcome::Success);
        assert!(h.tracker.is_online());

        // Subscriber attaching before any trigger gets `true`
        let mut sub = h.tracker.observable().subscribe();
        assert_eq!(sub.try_recv(), Some(true));
        assert_eq!(h.probe.call_count(), 0);
    }

    #[tokio::test]
    async fn test_probe_success_goes_online() {
        let h = harness(true, Some(account()), ProbeOutcome::Failure(500));
        let gate = h.probe.gate();
        let mut sub = h.tracker.observable().subscribe();
        assert_eq!(sub.recv().await, Some(true));

        h.tracker.refresh();
        wait_until(|| h.probe.call_count() == 1).await;
        gate.send(ProbeOutcome::Success).unwrap();

        assert_eq!(sub.recv().await, Some(true));
        assert!(h.tracker.is_online());
        assert_eq!(
            h.probe.calls.lock().unwrap()[0],
            "https://cloud.example.com/api2/ping/"
        );
        assert_eq!(h.tracker.snapshot().last_probe_reachable, Some(true));
    }

    #[tokio::test]
    async fn test_probe_timeout_goes_offline() {
        let h = harness(true, Some(account()), ProbeOutcome::Error(ProbeError::Timeout));
        let mut sub = h.tracker.observable().subscribe();
        assert_eq!(sub.recv().await, Some(true));

        h.tracker.refresh();
        assert_eq!(sub.recv().await, Some(false));
        assert!(!h.tracker.is_online());

        let snapshot = h.tracker.snapshot();
        assert_eq!(snapshot.link, LinkState::Up);
        assert!(!snapshot.reachable);
        assert!(snapshot.last_probe_at.is_some());
    }

    #[tokio::test]
    async fn test_http_error_status_goes_offline() {
        let h = harness(true, Some(account()), ProbeOutcome::Failure(502));
        h.tracker.refresh();
        wait_until(|| !h.tracker.is_online()).await;
        assert_eq!(h.probe.call_count(), 1);
    }

    #[tokio::test]
    async fn test_link_down_overrides_without_probe() {
        let h = harness(true, Some(account()), ProbeOutcome::Failure(500));
        h.tracker.refresh();
        wait_until(|| !h.tracker.is_online()).await;
        assert_eq!(h.probe.call_count(), 1);

        h.link.set(false);
        h.tracker.refresh();

        assert!(!h.tracker.is_online());
        let snapshot = h.tracker.snapshot();
        assert_eq!(snapshot.link, LinkState::Down);
        // Optimistic reset so the next link-up is decided by a fresh probe
        assert!(snapshot.reachable);

        tokio::task::yield_now().await;
        assert_eq!(h.probe.call_count(), 1);
    }

    #[tokio::test]
    async fn test_no_account_assumes_reachable() {
        let h = harness(true, None, ProbeOutcome::Failure(500));
        let mut sub = h.tracker.observable().subscribe();
        assert_eq!(sub.try_recv(), Some(true));

        h.tracker.refresh();
        assert_eq!(sub.try_recv(), Some(true));
        assert!(h.tracker.is_online());

        tokio::task::yield_now().await;
        assert_eq!(h.probe.call_count(), 0);
    }

    #[tokio::test]
    async fn test_derivation_covers_reachable_states() {
        let h = harness(true, Some(account()), ProbeOutcome::Success);

        // (Up, reachable)
        h.tracker.refresh();
        wait_until(|| h.tracker.snapshot().last_probe_reachable == Some(true)).await;
        let s = h.tracker.snapshot();
        assert_eq!(s.online, s.link.is_up() && s.reachable);
        assert!(h.tracker.is_online());

        // (Up, unreachable)
        let gate = h.probe.gate();
        h.tracker.refresh();
        wait_until(|| h.probe.call_count() == 2).await;
        gate.send(ProbeOutcome::Failure(503)).unwrap();
        wait_until(|| h.tracker.snapshot().last_probe_reachable == Some(false)).await;
        let s = h.tracker.snapshot();
        assert_eq!(s.online, s.link.is_up() && s.reachable);
        assert!(!h.tracker.is_online());

        // (Down, reset to reachable)
        h.link.set(false);
        h.tracker.refresh();
        let s = h.tracker.snapshot();
        assert_eq!(s.online, s.link.is_up() && s.reachable);
        assert!(!h.tracker.is_online());
    }

    #[tokio::test]
    async fn test_link_lost_mid_probe_discards_late_success() {
        let h = harness(true, Some(account()), ProbeOutcome::Success);
        let gate = h.probe.gate();
        let mut sub = h.tracker.observable().subscribe();
        assert_eq!(sub.recv().await, Some(true));

        h.tracker.refresh();
        wait_until(|| h.probe.call_count() == 1).await;

        h.link.set(false);
        h.tracker.refresh();
        assert_eq!(sub.recv().await, Some(false));

        gate.send(ProbeOutcome::Success).unwrap();
        wait_until(|| h.tracker.snapshot().stale_discarded == 1).await;

        assert!(!h.tracker.is_online());
        assert_eq!(sub.try_recv(), None);
        assert_eq!(h.tracker.snapshot().last_probe_at, None);
    }

    #[tokio::test]
    async fn test_older_probe_cannot_overwrite_newer() {
        let h = harness(true, Some(account()), ProbeOutcome::Success);
        let first = h.probe.gate();
        let second = h.probe.gate();

        h.tracker.refresh();
        wait_until(|| h.probe.call_count() == 1).await;
        h.tracker.refresh();
        wait_until(|| h.probe.call_count() == 2).await;

        // Newer probe finishes first and says unreachable
        second.send(ProbeOutcome::Failure(503)).unwrap();
        wait_until(|| !h.tracker.is_online()).await;

        // Older success arrives late and must be ignored
        first.send(ProbeOutcome::Success).unwrap();
        wait_until(|| h.tracker.snapshot().stale_discarded == 1).await;
        assert!(!h.tracker.is_online());
    }

    #[tokio::test]
    async fn test_account_swap_publishes_only_after_notification() {
        let h = harness(true, Some(account()), ProbeOutcome::Success);
        let old_server = h.probe.gate();
        let new_server = h.probe.gate();
        let mut sub = h.tracker.observable().subscribe();
        assert_eq!(sub.recv().await, Some(true));

        h.tracker.refresh();
        wait_until(|| h.probe.call_count() == 1).await;

        // Swap without notifying: the old server's answer is dropped silently
        h.accounts
            .set_account(Some(Account::new("https://other.example.com", "user@example.com")));
        old_server.send(ProbeOutcome::Failure(500)).unwrap();
        wait_until(|| h.tracker.snapshot().stale_discarded == 1).await;
        assert_eq!(sub.try_recv(), None);

        h.tracker.on_account_changed();
        wait_until(|| h.probe.call_count() == 2).await;
        new_server.send(ProbeOutcome::Failure(503)).unwrap();

        assert_eq!(sub.recv().await, Some(false));
        assert!(!h.tracker.is_online());
    }

    #[tokio::test]
    async fn test_account_switch_discards_probe_for_old_server() {
        let h = harness(true, Some(account()), ProbeOutcome::Success);
        let gate = h.probe.gate();

        h.tracker.refresh();
        wait_until(|| h.probe.call_count() == 1).await;

        h.accounts
            .set_account(Some(Account::new("https://other.example.com", "user@example.com")));
        gate.send(ProbeOutcome::Failure(500)).unwrap();
        wait_until(|| h.tracker.snapshot().stale_discarded == 1).await;
        assert!(h.tracker.is_online());

        h.tracker.on_account_changed();
        wait_until(|| h.probe.call_count() == 2).await;
        assert_eq!(
            h.probe.calls.lock().unwrap()[1],
            "https://other.example.com/api2/ping/"
        );
    }

    #[tokio::test]
    async fn test_register_reconciles_and_follows_link_events() {
        let h = harness(true, Some(account()), ProbeOutcome::Failure(500));
        let changes = FakeLinkChanges::default();

        h.tracker.register(&changes);
        wait_until(|| h.probe.call_count() == 1).await;
        wait_until(|| !h.tracker.is_online()).await;

        changes.fire_lost();
        let s = h.tracker.snapshot();
        assert_eq!(s.link, LinkState::Down);
        assert!(s.reachable);
        assert!(!s.online);

        changes.fire_available();
        wait_until(|| h.probe.call_count() == 2).await;
    }

    #[tokio::test]
    async fn test_register_twice_duplicates_triggers() {
        let h = harness(true, Some(account()), ProbeOutcome::Success);
        let changes = FakeLinkChanges::default();

        h.tracker.register(&changes);
        h.tracker.register(&changes);
        wait_until(|| h.tracker.snapshot().generation == 2).await;

        changes.fire_available();
        assert_eq!(h.tracker.snapshot().generation, 4);
    }

    #[tokio::test]
    async fn test_probe_concurrency_is_bounded() {
        let config = TrackerConfig {
            max_concurrent_probes: 1,
        };
        let h = harness_with(true, Some(account()), ProbeOutcome::Success, &config);
        let gate = h.probe.gate();

        h.tracker.refresh();
        wait_until(|| h.probe.call_count() == 1).await;

        h.tracker.refresh();
        h.tracker.refresh();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(h.probe.call_count(), 1);

        gate.send(ProbeOutcome::Failure(500)).unwrap();
        wait_until(|| h.tracker.snapshot().last_probe_reachable == Some(true)).await;

        // The middle probe was superseded before it got a permit
        assert_eq!(h.probe.call_count(), 2);
        assert!(h.tracker.is_online());
    }

    #[tokio::test]
    async fn test_shutdown_ignores_triggers() {
        let h = harness(true, Some(account()), ProbeOutcome::Failure(500));
        h.tracker.shutdown();
        assert!(h.tracker.is_shut_down());

        h.tracker.refresh();
        h.link.set(false);
        h.tracker.refresh();
        tokio::task::yield_now().await;

        assert_eq!(h.probe.call_count(), 0);
        assert!(h.tracker.is_online());
        assert_eq!(h.tracker.snapshot().generation, 0);
    }

    #[tokio::test]
    async fn test_listener_does_not_keep_tracker_alive() {
        let changes = FakeLinkChanges::default();
        {
            let h = harness(false, None, ProbeOutcome::Success);
            h.tracker.register(&changes);
        }
        // Tracker dropped, notifications are silently ignored
        changes.fire_available();
        changes.fire_lost();
    }
}
