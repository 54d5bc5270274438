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

//! Device link-state ports.
//!
//! Link state only says whether the device has any network attachment at all.
//! It says nothing about whether a particular server can be reached; that is
//! the job of the probe layer.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Device-level network attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    /// At least one network is attached.
    #[default]
    Up,
    /// No network attachment.
    Down,
}

impl LinkState {
    /// Convert a plain "has network" flag.
    #[must_use]
    pub fn from_connected(connected: bool) -> Self {
        if connected {
            Self::Up
        } else {
            Self::Down
        }
    }

    /// True for [`LinkState::Up`].
    #[must_use]
    pub fn is_up(self) -> bool {
        self == Self::Up
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => f.write_str("up"),
            Self::Down => f.write_str("down"),
        }
    }
}

/// Synchronous query of the current link state.
///
/// Implementations must be cheap and free of side effects; the tracker calls
/// this on every reconciliation.
pub trait LinkStateSource: Send + Sync {
    fn is_link_up(&self) -> bool;

    fn link_state(&self) -> LinkState {
        LinkState::from_connected(self.is_link_up())
    }
}

/// Callback target for link transitions.
pub trait LinkListener: Send + Sync {
    /// A network attachment appeared.
    fn on_available(&self);

    /// A network attachment disappeared. Treated as link down even if other
    /// networks remain partially available.
    fn on_lost(&self);
}

/// Registration API for link transition notifications.
///
/// Every call to [`LinkChangeSource::register`] adds another listener; sources
/// do not deduplicate.
pub trait LinkChangeSource {
    fn register(&self, listener: Box<dyn LinkListener>);
}
