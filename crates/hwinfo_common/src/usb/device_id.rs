//! Vendor/product ID extraction from hierarchical device IDs.

use serde::{Deserialize, Serialize};

const VENDOR_MARKER: &str = "VID_";
const PRODUCT_MARKER: &str = "PID_";

/// USB vendor/product identifier pair, either half may be unknown
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VendorProductKey {
    pub vendor_id: Option<String>,
    pub product_id: Option<String>,
}

impl VendorProductKey {
    /// Parse `USB\VID_046D&PID_C52B\...`.
    ///
    /// Anything that does not carry a vendor marker in the second path
    /// segment (root hubs, `USB\ROOT_HUB30\...`, truncated IDs) yields an
    /// empty key.
    pub fn from_device_id(device_id: &str) -> Self {
        let Some(segment) = device_id.split('\\').nth(1) else {
            return Self::default();
        };

        if !segment.starts_with(VENDOR_MARKER) {
            return Self::default();
        }

        let mut parts = segment.split('&');
        let (Some(vendor), Some(product)) = (parts.next(), parts.next()) else {
            return Self::default();
        };

        Self {
            vendor_id: Some(vendor.trim_start_matches(VENDOR_MARKER).to_string()),
            product_id: Some(product.trim_start_matches(PRODUCT_MARKER).to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vendor_id.is_none() && self.product_id.is_none()
    }

    /// Adds nothing over `(vendor_id, product_id)`: each half is either
    /// unknown here or identical to what is already recorded.
    pub fn is_redundant_with(&self, vendor_id: Option<&str>, product_id: Option<&str>) -> bool {
        let vendor_known = self
            .vendor_id
            .as_deref()
            .map_or(true, |vid| Some(vid) == vendor_id);
        let product_known = self
            .product_id
            .as_deref()
            .map_or(true, |pid| Some(pid) == product_id);
        vendor_known && product_known
    }
}
