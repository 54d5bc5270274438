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

//! Connectivity-state reconciliation for a client talking to one server.
//!
//! The library combines a cheap local signal (is there any network link?)
//! with an authoritative but expensive one (does the server answer its
//! health-check?) into a single online flag, and broadcasts that flag to any
//! number of subscribers:
//!
//! - **Link layer**: [`LinkStateSource`] and [`LinkChangeSource`] ports
//! - **Probe layer**: [`ProbeClient`] with an HTTP implementation
//! - **Observable**: [`ConnectivityObservable`], a broadcast cell that replays
//!   the current value to late subscribers
//! - **Tracker**: [`ReachabilityTracker`], the reconciliation core
//! - **Sync**: [`MetadataSyncPort`], the unit of work an external scheduler
//!   runs once the client is online
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use reachability::{
//!     Account, HttpProbeClient, LinkStateSource, ProbeTimeouts, ReachabilityTracker,
//!     StaticAccountContext, TrackerConfig, TrackerPorts,
//! };
//!
//! struct AlwaysUp;
//!
//! impl LinkStateSource for AlwaysUp {
//!     fn is_link_up(&self) -> bool {
//!         true
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let account = Account::new("https://cloud.example.com", "me@example.com");
//!     let tracker = ReachabilityTracker::spawn(
//!         TrackerPorts {
//!             link_source: Arc::new(AlwaysUp),
//!             accounts: Arc::new(StaticAccountContext::new(Some(account))),
//!             probe: Arc::new(HttpProbeClient::new(ProbeTimeouts::default()).unwrap()),
//!         },
//!         &TrackerConfig::default(),
//!     );
//!
//!     let mut online = tracker.observable().subscribe();
//!     tracker.refresh();
//!
//!     while let Some(value) = online.recv().await {
//!         println!("online: {value}");
//!     }
//! }
//! ```

pub mod account;
pub mod link;
pub mod observable;
pub mod probe;
pub mod sync;
pub mod tracker;

#[cfg(test)]
mod testing;

pub use account::{Account, AccountContext, StaticAccountContext};
pub use link::{LinkChangeSource, LinkListener, LinkState, LinkStateSource};
pub use observable::{ConnectivityObservable, Subscription, SubscriptionId};
pub use probe::{HttpProbeClient, ProbeClient, ProbeError, ProbeOutcome, ProbeTimeouts};
pub use sync::{
    ApiError, Dirent, MetadataSyncJob, MetadataSyncPort, Repo, RepoApi, SeafileApi, SyncOutcome,
    SyncReport,
};
pub use tracker::{ConnectivitySnapshot, ReachabilityTracker, TrackerConfig, TrackerPorts};
