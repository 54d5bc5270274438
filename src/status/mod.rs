//! Connectivity status and diagnostics.
//!
//! This module keeps a history of connectivity transitions and sync results,
//! fed by a task subscribed to the tracker's observable.

pub mod monitor;
pub mod system;

pub use monitor::monitor_connectivity;
pub use system::{ConnectivityStatus, SharedConnectivityStatus};
