//! Network link detection.
//!
//! Polls the OS route table for attachment changes and feeds them to the
//! reachability tracker.

pub mod link_watcher;

pub use link_watcher::{PollingLinkWatcher, RouteLinkSource};
