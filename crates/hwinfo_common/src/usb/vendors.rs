//! USB vendor/product name database
//!
//! Reads the `usb.ids` format maintained at linux-usb.org:
//!
//! ```text
//! 046d  Logitech, Inc.
//! 	c52b  Unifying Receiver
//! ```
//!
//! A small built-in table is always present; a system copy, when found, is
//! layered on top of it.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::Result;

/// Well-known locations of the system `usb.ids`
pub const SYSTEM_USB_IDS_PATHS: &[&str] = &[
    "/usr/share/hwdata/usb.ids",
    "/usr/share/misc/usb.ids",
    "/usr/share/usb.ids",
    "/var/lib/usbutils/usb.ids",
];

const BUILTIN_USB_IDS: &str = "\
# Built-in subset of usb.ids
0424  Microchip Technology, Inc. (formerly SMSC)
\t2514  USB 2.0 Hub
045e  Microsoft Corp.
\t028e  Xbox360 Controller
\t0745  Nano Transceiver v1.0 for Bluetooth
\t07a5  Wireless Receiver 1461C
046d  Logitech, Inc.
\t0825  Webcam C270
\t082d  HD Pro Webcam C920
\tc077  M105 Optical Mouse
\tc31c  Keyboard K120
\tc52b  Unifying Receiver
\tc534  Unifying Receiver
04f2  Chicony Electronics Co., Ltd
054c  Sony Corp.
\t0ce6  DualSense wireless controller (PS5)
05ac  Apple, Inc.
\t12a8  iPhone 5/5C/5S/6/SE/7/8/X/XR
05e3  Genesys Logic, Inc.
\t0608  Hub
\t0610  Hub
0781  SanDisk Corp.
\t5567  Cruzer Blade
\t5581  Ultra
0951  Kingston Technology
\t1666  DataTraveler 100 G3/G4/SE9 G2/50 Kyson
0b05  ASUSTek Computer, Inc.
0bda  Realtek Semiconductor Corp.
\t5411  RTS5411 Hub
\t8153  RTL8153 Gigabit Ethernet Adapter
1050  Yubico.com
\t0407  Yubikey 4/5 OTP+U2F+CCID
1532  Razer USA, Ltd
1b1c  Corsair
1d6b  Linux Foundation
\t0001  1.1 root hub
\t0002  2.0 root hub
\t0003  3.0 root hub
2109  VIA Labs, Inc.
\t0813  VL813 Hub
\t2813  VL813 Hub
8087  Intel Corp.
\t0024  Integrated Rate Matching Hub
\t0026  AX201 Bluetooth
\t0aaa  Bluetooth 9460/9560 Jefferson Peak (JfP)
#
# List of known device classes, subclasses and protocols
C 00  (Defined at Interface level)
C 03  Human Interface Device
";

/// Maps a vendor/product ID pair to human-readable names
pub trait NameResolver {
    fn resolve(
        &self,
        vendor_id: Option<&str>,
        product_id: Option<&str>,
    ) -> (Option<String>, Option<String>);
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct VendorEntry {
    name: String,
    products: HashMap<String, String>,
}

/// In-memory `usb.ids` table keyed by lowercase 4-digit hex
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsbIdDatabase {
    vendors: HashMap<String, VendorEntry>,
}

impl UsbIdDatabase {
    /// The embedded table only
    pub fn builtin() -> Self {
        Self::parse(BUILTIN_USB_IDS)
    }

    /// Built-in table overlaid with `explicit` or the first system copy found.
    ///
    /// Unreadable files are logged and ignored.
    pub fn with_system_ids(explicit: Option<&Path>) -> Self {
        let mut db = Self::builtin();

        let candidates: Vec<PathBuf> = match explicit {
            Some(path) => vec![path.to_path_buf()],
            None => SYSTEM_USB_IDS_PATHS.iter().map(PathBuf::from).collect(),
        };

        for path in candidates {
            if !path.exists() {
                continue;
            }
            match Self::load(&path) {
                Ok(system) => {
                    debug!(
                        "Loaded {} USB vendors from {}",
                        system.vendor_count(),
                        path.display()
                    );
                    db.merge(system);
                    break;
                }
                Err(e) => warn!("Ignoring USB ID database {}: {}", path.display(), e),
            }
        }

        db
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        Ok(Self::parse(&String::from_utf8_lossy(&bytes)))
    }

    /// Parse `usb.ids` text; everything after the vendor section is ignored
    pub fn parse(contents: &str) -> Self {
        let mut vendors: HashMap<String, VendorEntry> = HashMap::new();
        let mut current: Option<String> = None;

        for line in contents.lines() {
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(rest) = line.strip_prefix('\t') {
                // Two tabs: interface line, not tracked
                if rest.starts_with('\t') {
                    continue;
                }
                let (Some(vendor), Some((id, name))) = (current.as_ref(), split_id_line(rest))
                else {
                    continue;
                };
                if let Some(entry) = vendors.get_mut(vendor) {
                    entry.products.insert(id, name);
                }
                continue;
            }

            match split_id_line(line) {
                Some((id, name)) => {
                    vendors.entry(id.clone()).or_default().name = name;
                    current = Some(id);
                }
                // Class, language, HID usage sections
                None => current = None,
            }
        }

        Self { vendors }
    }

    /// Entries from `other` win on conflict
    pub fn merge(&mut self, other: UsbIdDatabase) {
        for (id, entry) in other.vendors {
            let target = self.vendors.entry(id).or_default();
            target.name = entry.name;
            target.products.extend(entry.products);
        }
    }

    pub fn vendor_count(&self) -> usize {
        self.vendors.len()
    }

    pub fn vendor_name(&self, vendor_id: &str) -> Option<&str> {
        self.vendors
            .get(&vendor_id.to_ascii_lowercase())
            .map(|entry| entry.name.as_str())
    }

    pub fn product_name(&self, vendor_id: &str, product_id: &str) -> Option<&str> {
        self.vendors
            .get(&vendor_id.to_ascii_lowercase())?
            .products
            .get(&product_id.to_ascii_lowercase())
            .map(String::as_str)
    }
}

impl NameResolver for UsbIdDatabase {
    fn resolve(
        &self,
        vendor_id: Option<&str>,
        product_id: Option<&str>,
    ) -> (Option<String>, Option<String>) {
        let Some(vendor_id) = vendor_id else {
            return (None, None);
        };
        let vendor = self.vendor_name(vendor_id).map(str::to_string);
        let product = product_id
            .and_then(|pid| self.product_name(vendor_id, pid))
            .map(str::to_string);
        (vendor, product)
    }
}

/// `"046d  Logitech, Inc."` -> `("046d", "Logitech, Inc.")`
fn split_id_line(line: &str) -> Option<(String, String)> {
    let id = line.get(..4)?;
    if !id.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let name = line[4..].trim();
    if name.is_empty() || !line[4..].starts_with(char::is_whitespace) {
        return None;
    }
    Some((id.to_ascii_lowercase(), name.to_string()))
}
