//! Device enumeration with child expansion
//!
//! Sources:
//! - [`DeviceEnumerator::enumerate`] - flat top-level listing
//! - [`PropertyFetcher::properties`] - per-device property bag
//! - [`DeviceEnumerator::lookup`] - follow-up query per child device ID
//!
//! Expansion is a work queue with a visited set, so cyclic or repeated
//! child references are processed once.

use std::collections::{HashSet, VecDeque};

use tracing::{debug, warn};

use super::properties::{children_field, DevicePropertySet};
use crate::error::Result;

/// One plug-and-play entry as listed by the platform
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeripheralEntry {
    pub device_id: String,
}

impl PeripheralEntry {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
        }
    }
}

pub trait DeviceEnumerator {
    /// All entries whose device ID starts with `prefix`
    fn enumerate(&self, prefix: &str) -> Result<Vec<PeripheralEntry>>;

    /// Entries matching exactly `device_id` (used for child expansion)
    fn lookup(&self, device_id: &str) -> Result<Vec<PeripheralEntry>>;
}

pub trait PropertyFetcher {
    fn properties(&self, entry: &PeripheralEntry) -> Result<super::properties::PropertyBag>;
}

/// Knobs for one collection pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectOptions {
    pub prefix: String,
    pub expand_children: bool,
    /// Per-device property queries are available on this platform
    pub fetch_properties: bool,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            prefix: "USB".to_string(),
            expand_children: true,
            fetch_properties: true,
        }
    }
}

/// Enumerate, expand children and extract property sets, in discovery order.
///
/// Only a failure of the top-level enumeration is returned as an error;
/// per-device failures are logged and the device is skipped.
pub fn collect_property_sets(
    enumerator: &dyn DeviceEnumerator,
    fetcher: &dyn PropertyFetcher,
    options: &CollectOptions,
) -> Result<Vec<DevicePropertySet>> {
    let mut queue: VecDeque<PeripheralEntry> = enumerator.enumerate(&options.prefix)?.into();
    let mut seen: HashSet<String> = HashSet::new();
    // IDs already looked up or waiting in the queue
    let mut queued: HashSet<String> = queue.iter().map(|e| e.device_id.clone()).collect();
    let mut sets = Vec::new();

    while let Some(entry) = queue.pop_front() {
        if !entry.device_id.starts_with(&options.prefix) {
            continue;
        }
        if !seen.insert(entry.device_id.clone()) {
            continue;
        }
        if !options.fetch_properties {
            continue;
        }

        let bag = match fetcher.properties(&entry) {
            Ok(bag) => bag,
            Err(e) => {
                warn!("Property query failed for {}: {}", entry.device_id, e);
                continue;
            }
        };

        if options.expand_children {
            for child in children_field(&bag) {
                if !child.starts_with(&options.prefix)
                    || seen.contains(&child)
                    || !queued.insert(child.clone())
                {
                    continue;
                }
                match enumerator.lookup(&child) {
                    Ok(found) => {
                        queued.extend(found.iter().map(|e| e.device_id.clone()));
                        queue.extend(found);
                    }
                    Err(e) => warn!("Child lookup failed for {}: {}", child, e),
                }
            }
        }

        match DevicePropertySet::extract(&entry.device_id, &bag) {
            Some(set) => sets.push(set),
            None => debug!("Excluding {}: missing bus or driver description", entry.device_id),
        }
    }

    debug!(
        "Collected {} property sets from {} device IDs",
        sets.len(),
        seen.len()
    );
    Ok(sets)
}
