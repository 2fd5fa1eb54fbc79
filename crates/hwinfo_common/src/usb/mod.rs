//! USB peripheral inventory
//!
//! Enumerate -> fetch properties (expanding children) -> reconcile by bus
//! description -> attach vendor/product names.

pub mod device_id;
pub mod enumerate;
pub mod properties;
pub mod reconcile;
pub mod vendors;

pub use device_id::*;
pub use enumerate::*;
pub use properties::*;
pub use reconcile::*;
pub use vendors::*;

use tracing::info;

use crate::error::Result;
use crate::machine::UsbDevice;

/// Run one full USB inventory pass
pub fn gather_usb_devices(
    enumerator: &dyn DeviceEnumerator,
    fetcher: &dyn PropertyFetcher,
    resolver: &dyn NameResolver,
    options: &CollectOptions,
) -> Result<Vec<UsbDevice>> {
    let sets = collect_property_sets(enumerator, fetcher, options)?;
    let devices = reconcile(&sets, resolver);
    info!(
        "USB: {} device instances reconciled into {} devices",
        sets.len(),
        devices.len()
    );
    Ok(devices)
}
