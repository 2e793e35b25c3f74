//! Process-wide resolution table fed by the exporting router.
//!
//! # Responsibilities
//! - Hold `name → address` overrides consulted by the proxy
//! - Accept whole-table publications from the exporter
//!
//! # Design Decisions
//! - Cloneable handle injected where needed, never a global
//! - A publication holds the write lock for the whole copy so readers never
//!   observe a half-applied table
//! - Keys missing from a publication are kept (no withdrawal)

use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use std::sync::{Arc, PoisonError, RwLock};

use crate::routing::table::RouteTable;

#[derive(Debug, Clone, Default)]
pub struct SharedResolutionTable {
    inner: Arc<RwLock<HashMap<String, IpAddr>>>,
}

impl SharedResolutionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy every route of `table` in, replacing existing values key by key.
    pub fn publish(&self, table: &RouteTable) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        for (name, entry) in table.iter() {
            inner.insert(name.to_string(), entry.via);
        }
    }

    /// Look up one destination under a shared lock.
    pub fn lookup(&self, name: &str) -> Option<IpAddr> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
    }

    /// Set a single override.
    pub fn insert(&self, name: impl Into<String>, address: IpAddr) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), address);
    }

    /// Ordered copy of the current contents.
    pub fn snapshot(&self) -> BTreeMap<String, IpAddr> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, address)| (name.clone(), *address))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
