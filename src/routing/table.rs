//! Per-router distance-vector table.
//!
//! # Responsibilities
//! - Store the best known `(cost, next hop)` per destination name
//! - Apply the distance-vector update rule to advertised records
//! - Render the table for per-tick log dumps
//!
//! # Design Decisions
//! - Ordered map so dumps and advertisements iterate deterministically
//! - Merging only ever lowers a cost; entries are never removed or aged out
//! - Equal-cost candidates are ignored (first route heard wins)

use std::collections::btree_map::{self, BTreeMap};
use std::fmt;
use std::net::IpAddr;

use serde::Serialize;

/// Cost added to every route learned from a neighbor.
pub const HOP_COST: u32 = 1;

/// Best known way to reach one destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RouteEntry {
    /// Accumulated cost to the destination.
    pub cost: u32,
    /// Next-hop address to send traffic toward.
    pub via: IpAddr,
}

impl RouteEntry {
    pub fn new(cost: u32, via: IpAddr) -> Self {
        Self { cost, via }
    }
}

/// A single `(name, via, cost)` route carried in an advertisement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRecord {
    pub name: String,
    pub via: IpAddr,
    pub cost: u32,
}

impl RouteRecord {
    pub fn new(name: impl Into<String>, via: IpAddr, cost: u32) -> Self {
        Self {
            name: name.into(),
            via,
            cost,
        }
    }

    /// Cost of reaching the destination through whoever advertised this record.
    pub fn candidate_cost(&self) -> u32 {
        self.cost.saturating_add(HOP_COST)
    }
}

/// Mapping from destination name to its best known route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RouteTable {
    routes: BTreeMap<String, RouteEntry>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry unconditionally. Used for configuration-time seeding.
    pub fn insert(&mut self, name: impl Into<String>, entry: RouteEntry) {
        self.routes.insert(name.into(), entry);
    }

    /// Merge one advertised record.
    ///
    /// The destination is (re)written with `cost + 1` when it is unknown or
    /// the candidate is strictly cheaper than the current entry. Returns true
    /// if the table changed.
    pub fn merge(&mut self, record: &RouteRecord) -> bool {
        let candidate = RouteEntry::new(record.candidate_cost(), record.via);

        match self.routes.entry(record.name.clone()) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(candidate);
                true
            }
            btree_map::Entry::Occupied(mut slot) => {
                if candidate.cost < slot.get().cost {
                    slot.insert(candidate);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Merge a batch of records, returning how many changed the table.
    pub fn merge_all<'a>(&mut self, records: impl IntoIterator<Item = &'a RouteRecord>) -> usize {
        records
            .into_iter()
            .filter(|record| self.merge(record))
            .count()
    }

    pub fn get(&self, name: &str) -> Option<&RouteEntry> {
        self.routes.get(name)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RouteEntry)> {
        self.routes.iter().map(|(name, entry)| (name.as_str(), entry))
    }
}

impl fmt::Display for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.routes.iter().try_for_each(|(name, entry)| {
            writeln!(f, "{}\t{}\t{}", name, entry.via, entry.cost)
        })
    }
}
