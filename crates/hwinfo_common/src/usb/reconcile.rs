//! USB Device Reconciliation
//!
//! Several device instances (a composite parent, its input/audio
//! interfaces, a storage child) usually report the same bus description.
//! They are grouped by that description and a fixed precedence policy picks
//! the most informative instance per group.
//!
//! Policy, evaluated in order, first match wins:
//! - a/b/c: a composite driver beats a bare input, output or audio driver
//! - d: a named driver provider beats the OS default provider
//! - e: a named manufacturer beats a missing or OS default one
//! - f: any specific driver description beats the generic ones

use std::collections::HashMap;

use tracing::debug;

use super::device_id::VendorProductKey;
use super::properties::DevicePropertySet;
use super::vendors::NameResolver;
use crate::machine::UsbDevice;

pub const COMPOSITE_DEVICE: &str = "USB Composite Device";
pub const INPUT_DEVICE: &str = "USB Input Device";
pub const OUTPUT_DEVICE: &str = "USB Output Device";
pub const AUDIO_DEVICE: &str = "USB Audio Device";
pub const OS_DEFAULT_VENDOR: &str = "Microsoft";

/// Driver descriptions Windows binds when nothing more specific is installed
pub const GENERIC_DRIVER_NAMES: &[&str] = &[
    INPUT_DEVICE,
    COMPOSITE_DEVICE,
    OUTPUT_DEVICE,
    AUDIO_DEVICE,
    "USB Mass Storage Device",
    "Disk Drive",
    "USB Attached SCSI (UAS) Mass Storage Device",
];

const GENERIC_DRIVER_PREFIX: &str = "Generic";

/// Which precedence rule let a candidate replace the stored record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrecedenceRule {
    CompositeOverInput,
    CompositeOverOutput,
    CompositeOverAudio,
    NamedDriverProvider,
    NamedManufacturer,
    SpecificDriverName,
}

impl PrecedenceRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrecedenceRule::CompositeOverInput => "composite_over_input",
            PrecedenceRule::CompositeOverOutput => "composite_over_output",
            PrecedenceRule::CompositeOverAudio => "composite_over_audio",
            PrecedenceRule::NamedDriverProvider => "named_driver_provider",
            PrecedenceRule::NamedManufacturer => "named_manufacturer",
            PrecedenceRule::SpecificDriverName => "specific_driver_name",
        }
    }
}

pub fn is_generic_driver_name(name: &str) -> bool {
    GENERIC_DRIVER_NAMES.contains(&name) || name.starts_with(GENERIC_DRIVER_PREFIX)
}

fn is_named(value: Option<&str>) -> bool {
    value.is_some_and(|v| v != OS_DEFAULT_VENDOR)
}

/// The rule under which `candidate` should replace `existing`, if any
pub fn replacement_rule(
    existing: &UsbDevice,
    candidate: &DevicePropertySet,
) -> Option<PrecedenceRule> {
    let existing_driver = existing.driver_name.as_str();
    let candidate_driver = candidate.driver_description.as_str();
    let candidate_composite = candidate_driver == COMPOSITE_DEVICE;

    if existing_driver == INPUT_DEVICE && candidate_composite {
        Some(PrecedenceRule::CompositeOverInput)
    } else if existing_driver == OUTPUT_DEVICE && candidate_composite {
        Some(PrecedenceRule::CompositeOverOutput)
    } else if existing_driver == AUDIO_DEVICE && candidate_composite {
        Some(PrecedenceRule::CompositeOverAudio)
    } else if existing.driver_provider.as_deref() == Some(OS_DEFAULT_VENDOR)
        && is_named(candidate.driver_provider.as_deref())
    {
        Some(PrecedenceRule::NamedDriverProvider)
    } else if !is_named(existing.manufacturer.as_deref())
        && is_named(candidate.manufacturer.as_deref())
    {
        Some(PrecedenceRule::NamedManufacturer)
    } else if !is_generic_driver_name(candidate_driver) {
        Some(PrecedenceRule::SpecificDriverName)
    } else {
        None
    }
}

/// Result of offering a candidate instance to an existing record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Keep,
    Replace {
        rule: PrecedenceRule,
        device: UsbDevice,
    },
}

/// Build the record for the first sighting of a bus description
pub fn new_record(set: &DevicePropertySet, resolver: &dyn NameResolver) -> UsbDevice {
    let key = VendorProductKey::from_device_id(&set.device_id);
    let (vendor_name, product_name) =
        resolver.resolve(key.vendor_id.as_deref(), key.product_id.as_deref());

    let mut device = UsbDevice {
        device_id: set.device_id.clone(),
        vendor_id: key.vendor_id,
        product_id: key.product_id,
        vendor_name,
        product_name,
        ..Default::default()
    };
    overwrite_descriptive_fields(&mut device, set);
    device
}

/// Decide whether `candidate` supersedes `existing` and, if so, produce the
/// merged record. Identification fields are only ever backfilled.
pub fn propose_merge(
    existing: &UsbDevice,
    candidate: &DevicePropertySet,
    resolver: &dyn NameResolver,
) -> MergeOutcome {
    let Some(rule) = replacement_rule(existing, candidate) else {
        return MergeOutcome::Keep;
    };

    let mut device = existing.clone();
    overwrite_descriptive_fields(&mut device, candidate);

    if candidate.device_id != existing.device_id {
        backfill_ids(&mut device, &candidate.device_id, resolver);
    }

    MergeOutcome::Replace { rule, device }
}

fn overwrite_descriptive_fields(device: &mut UsbDevice, set: &DevicePropertySet) {
    device.name = set.friendly_name.clone();
    device.bus_reported_name = set.bus_reported_description.clone();
    device.driver_name = set.driver_description.clone();
    device.driver_version = set.driver_version.clone();
    device.driver_date = set.driver_date;
    device.class = set.class.clone();
    device.driver_provider = set.driver_provider.clone();
    device.manufacturer = set.manufacturer.clone();
}

fn backfill_ids(device: &mut UsbDevice, device_id: &str, resolver: &dyn NameResolver) {
    let key = VendorProductKey::from_device_id(device_id);
    if key.is_empty()
        || key.is_redundant_with(device.vendor_id.as_deref(), device.product_id.as_deref())
    {
        return;
    }

    let (vendor_name, product_name) =
        resolver.resolve(key.vendor_id.as_deref(), key.product_id.as_deref());
    device.vendor_id = device.vendor_id.take().or(key.vendor_id);
    device.product_id = device.product_id.take().or(key.product_id);
    device.vendor_name = device.vendor_name.take().or(vendor_name);
    device.product_name = device.product_name.take().or(product_name);
}

/// Collapse property sets into one record per bus-reported description,
/// ordered by first sighting
pub fn reconcile(sets: &[DevicePropertySet], resolver: &dyn NameResolver) -> Vec<UsbDevice> {
    let mut devices: Vec<UsbDevice> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for set in sets {
        let key = set.bus_reported_description.as_str();
        let slot = match index.get(key).copied() {
            Some(slot) => slot,
            None => {
                index.insert(key, devices.len());
                devices.push(new_record(set, resolver));
                continue;
            }
        };

        if let MergeOutcome::Replace { rule, device } =
            propose_merge(&devices[slot], set, resolver)
        {
            debug!(
                "{} replaces {} for '{}' ({})",
                set.device_id,
                devices[slot].device_id,
                key,
                rule.as_str()
            );
            devices[slot] = device;
        }
    }

    devices
}
