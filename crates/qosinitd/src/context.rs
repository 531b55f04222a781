//! Name-to-id lookup tables for one provisioning run.

use std::collections::HashMap;

use crate::error::{LookupKind, QosInitError, QosInitResult};

/// State owned by a provisioning run and threaded through every phase that
/// resolves a map or profile name.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    maps: HashMap<String, u64>,
    profiles: HashMap<String, u64>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_map(&mut self, tag: impl Into<String>, id: u64) {
        self.maps.insert(tag.into(), id);
    }

    pub fn insert_profile(&mut self, tag: impl Into<String>, id: u64) {
        self.profiles.insert(tag.into(), id);
    }

    pub fn map_id(&self, tag: &str) -> QosInitResult<u64> {
        self.maps
            .get(tag)
            .copied()
            .ok_or_else(|| QosInitError::lookup_miss(LookupKind::Map, tag))
    }

    pub fn profile_id(&self, tag: &str) -> QosInitResult<u64> {
        self.profiles
            .get(tag)
            .copied()
            .ok_or_else(|| QosInitError::lookup_miss(LookupKind::SchedulerProfile, tag))
    }

    pub fn map_count(&self) -> usize {
        self.maps.len()
    }

    pub fn profile_count(&self) -> usize {
        self.profiles.len()
    }
}
