//! Latest-value sample store shared between the poller and the HTTP server.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// The latest decoded observation for one register.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Decoded value after gain.
    pub value: f64,
    /// Capture time (UTC).
    pub timestamp: DateTime<Utc>,

    // Identity
    pub device: String,
    pub slave_id: u8,
    pub register: u16,
    pub name: String,
    pub unit: String,
    pub ip_address: String,
}

impl Sample {
    /// The store key identifying this sample's register.
    pub fn key(&self) -> SampleKey {
        SampleKey {
            device: self.device.clone(),
            slave_id: self.slave_id,
            register: self.register,
        }
    }
}

/// Identity of one register: (device, slave unit id, nominal address).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SampleKey {
    pub device: String,
    pub slave_id: u8,
    pub register: u16,
}

/// Thread-safe store of the latest sample per register.
///
/// A single coarse lock is enough here: writes arrive at poll cadence times
/// register count, reads one per scrape. Entries are only ever replaced,
/// never expired; a register whose reads keep failing retains its last
/// successful sample, and staleness shows up through the timestamp.
#[derive(Debug, Default)]
pub struct SampleStore {
    samples: RwLock<HashMap<SampleKey, Sample>>,
}

impl SampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the sample for its register.
    pub fn insert(&self, sample: Sample) {
        let key = sample.key();
        self.samples.write().insert(key, sample);
    }

    /// Copy out all current samples at one consistent instant.
    ///
    /// Order is unspecified.
    pub fn snapshot(&self) -> Vec<Sample> {
        self.samples.read().values().cloned().collect()
    }

    /// Number of registers with at least one successful sample.
    pub fn len(&self) -> usize {
        self.samples.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.read().is_empty()
    }
}

/// Shareable store handle.
pub type SharedStore = Arc<SampleStore>;
