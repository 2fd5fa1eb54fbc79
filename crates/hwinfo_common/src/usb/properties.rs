//! Device property extraction
//!
//! Turns the unordered key/value bag a platform returns for one device
//! instance into a typed [`DevicePropertySet`]. Every field is extracted by
//! its own function so a caller can tell "absent" from "malformed".

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{trace, warn};

use crate::error::FieldError;

/// Raw value as reported by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Text(String),
    List(Vec<String>),
}

impl PropertyValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(text) => Some(text),
            PropertyValue::List(_) => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(value: Vec<String>) -> Self {
        PropertyValue::List(value)
    }
}

/// Unordered property bag for one device instance
pub type PropertyBag = HashMap<String, PropertyValue>;

/// Device properties of interest, named after their DEVPKEY
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceProperty {
    BusReportedDescription,
    DriverDescription,
    DriverVersion,
    DriverDate,
    Class,
    DriverProvider,
    FriendlyName,
    Manufacturer,
    Children,
}

impl DeviceProperty {
    pub fn key(&self) -> &'static str {
        match self {
            DeviceProperty::BusReportedDescription => "DEVPKEY_Device_BusReportedDeviceDesc",
            DeviceProperty::DriverDescription => "DEVPKEY_Device_DriverDesc",
            DeviceProperty::DriverVersion => "DEVPKEY_Device_DriverVersion",
            DeviceProperty::DriverDate => "DEVPKEY_Device_DriverDate",
            DeviceProperty::Class => "DEVPKEY_Device_Class",
            DeviceProperty::DriverProvider => "DEVPKEY_Device_DriverProvider",
            DeviceProperty::FriendlyName => "DEVPKEY_NAME",
            DeviceProperty::Manufacturer => "DEVPKEY_Device_Manufacturer",
            DeviceProperty::Children => "DEVPKEY_Device_Children",
        }
    }
}

/// The eight properties kept per device instance.
///
/// Only built when both discriminators (bus-reported description and driver
/// description) are present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevicePropertySet {
    pub device_id: String,
    pub bus_reported_description: String,
    pub driver_description: String,
    pub driver_version: Option<String>,
    pub driver_date: Option<NaiveDateTime>,
    pub class: Option<String>,
    pub driver_provider: Option<String>,
    pub friendly_name: Option<String>,
    pub manufacturer: Option<String>,
}

impl DevicePropertySet {
    /// Extract the property set for `device_id`.
    ///
    /// Returns `None` when either discriminator is missing. Malformed
    /// optional fields are logged and left unset.
    pub fn extract(device_id: &str, bag: &PropertyBag) -> Option<Self> {
        let bus_reported_description =
            text_field(bag, DeviceProperty::BusReportedDescription).ok()?;
        let driver_description = text_field(bag, DeviceProperty::DriverDescription).ok()?;

        Some(Self {
            device_id: device_id.to_string(),
            bus_reported_description,
            driver_description,
            driver_version: optional(device_id, text_field(bag, DeviceProperty::DriverVersion)),
            driver_date: optional(device_id, driver_date_field(bag)),
            class: optional(device_id, text_field(bag, DeviceProperty::Class)),
            driver_provider: optional(device_id, text_field(bag, DeviceProperty::DriverProvider)),
            friendly_name: optional(device_id, text_field(bag, DeviceProperty::FriendlyName)),
            manufacturer: optional(device_id, text_field(bag, DeviceProperty::Manufacturer)),
        })
    }
}

fn optional<T>(device_id: &str, field: Result<T, FieldError>) -> Option<T> {
    match field {
        Ok(value) => Some(value),
        Err(err) if err.is_absent() => None,
        Err(err) => {
            warn!("Skipping property for {}: {}", device_id, err);
            None
        }
    }
}

/// Non-blank text value of `property`
pub fn text_field(bag: &PropertyBag, property: DeviceProperty) -> Result<String, FieldError> {
    let key = property.key();
    match bag.get(key) {
        None => Err(FieldError::Absent),
        Some(PropertyValue::Text(text)) if text.trim().is_empty() => {
            trace!("Property {} is blank", key);
            Err(FieldError::Absent)
        }
        Some(PropertyValue::Text(text)) => Ok(text.clone()),
        Some(PropertyValue::List(_)) => Err(FieldError::malformed(key, "expected text, got list")),
    }
}

/// Driver date parsed from its `YYYYMMDDHHmmss...` encoding
pub fn driver_date_field(bag: &PropertyBag) -> Result<NaiveDateTime, FieldError> {
    let raw = text_field(bag, DeviceProperty::DriverDate)?;
    parse_driver_date(&raw)
}

/// Child device IDs; a bare string counts as a single child
pub fn children_field(bag: &PropertyBag) -> Vec<String> {
    match bag.get(DeviceProperty::Children.key()) {
        Some(PropertyValue::List(children)) => children
            .iter()
            .filter(|child| !child.trim().is_empty())
            .cloned()
            .collect(),
        Some(PropertyValue::Text(child)) if !child.trim().is_empty() => vec![child.clone()],
        _ => Vec::new(),
    }
}

/// Parse a CIM datetime (`20230615000000.000000-000`) down to the second
pub fn parse_driver_date(raw: &str) -> Result<NaiveDateTime, FieldError> {
    let key = DeviceProperty::DriverDate.key();
    let raw = raw.trim();

    let digits = raw
        .get(..14)
        .ok_or_else(|| FieldError::malformed(key, format!("'{}' is shorter than 14 digits", raw)))?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FieldError::malformed(key, format!("'{}' is not numeric", digits)));
    }

    let component = |range: std::ops::Range<usize>| -> u32 {
        digits[range].parse().unwrap_or_default()
    };
    let year = component(0..4) as i32;
    let (month, day) = (component(4..6), component(6..8));
    let (hour, minute, second) = (component(8..10), component(10..12), component(12..14));

    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, second))
        .ok_or_else(|| FieldError::malformed(key, format!("'{}' is not a valid date", digits)))
}
