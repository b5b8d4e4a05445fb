// Copyright (C) 2026-present The minibgp Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Routing Information Base keyed by announced prefix.

use bytes::Bytes;
use chrono::prelude::*;
use ipnet::Ipv4Net;
use minibgp_pkt::update::BgpUpdateMessage;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;

/// Rib handle shared between the session and its embedder.
pub type SharedRib = Arc<Mutex<Rib>>;

/// A route installed in the [`Rib`]: the opaque path attributes it was
/// announced with and when it was last (re-)announced.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RibEntry {
    attributes: Bytes,
    installed_at: DateTime<Utc>,
}

impl RibEntry {
    pub fn new(attributes: Bytes) -> RibEntry {
        RibEntry {
            attributes,
            installed_at: Utc::now(),
        }
    }

    pub const fn attributes(&self) -> &Bytes {
        &self.attributes
    }

    pub const fn installed_at(&self) -> DateTime<Utc> {
        self.installed_at
    }
}

/// Effect of applying one UPDATE, for logging and stats.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct RibUpdateOutcome {
    pub announced: usize,
    pub withdrawn: usize,
    /// Withdrawals for prefixes that were not installed. Ignored, not an
    /// error.
    pub missing_withdrawals: usize,
}

/// Per-peer routing table. A re-announcement of an installed prefix
/// replaces the stored attributes (last write wins); withdrawing an absent
/// prefix is a no-op.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct Rib {
    routes: HashMap<Ipv4Net, RibEntry>,
}

impl Rib {
    pub fn new() -> Rib {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn get(&self, prefix: &Ipv4Net) -> Option<&RibEntry> {
        self.routes.get(prefix)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Ipv4Net, &RibEntry)> {
        self.routes.iter()
    }

    /// Stable copy of the installed routes, sorted by prefix and detached
    /// from later mutations.
    pub fn snapshot(&self) -> Vec<(Ipv4Net, RibEntry)> {
        let mut routes: Vec<_> = self
            .routes
            .iter()
            .map(|(prefix, entry)| (*prefix, entry.clone()))
            .collect();
        routes.sort_unstable_by_key(|(prefix, _)| *prefix);
        routes
    }

    pub fn announce(&mut self, prefix: Ipv4Net, attributes: Bytes) {
        self.routes.insert(prefix, RibEntry::new(attributes));
    }

    /// Returns `false` when the prefix wasn't installed.
    pub fn withdraw(&mut self, prefix: &Ipv4Net) -> bool {
        self.routes.remove(prefix).is_some()
    }

    /// Apply an UPDATE: withdrawals first, then announcements, so a prefix
    /// carried in both sections ends up installed.
    pub fn apply_update(&mut self, update: &BgpUpdateMessage) -> RibUpdateOutcome {
        let mut outcome = RibUpdateOutcome::default();
        for prefix in update.withdrawn_routes() {
            if self.withdraw(prefix) {
                outcome.withdrawn += 1;
            } else {
                outcome.missing_withdrawals += 1;
            }
        }
        for prefix in update.nlri() {
            self.announce(*prefix, update.path_attributes().clone());
            outcome.announced += 1;
        }
        outcome
    }
}
