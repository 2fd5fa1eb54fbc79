//! Machine Information Snapshot
//!
//! The unified in-memory model every provider writes into. One snapshot is
//! produced per inventory pass and handed to the caller as-is.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::platform::PlatformCapabilities;

/// Complete point-in-time hardware inventory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineInformation {
    pub platform: PlatformCapabilities,
    pub operating_system: OperatingSystem,
    pub cpu: Cpu,
    pub ram_sticks: Vec<RamStick>,
    pub disks: Vec<Disk>,
    pub gpus: Vec<Gpu>,
    pub displays: Vec<Display>,
    pub smbios: SmBios,
    pub usb_devices: Vec<UsbDevice>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingSystem {
    pub name: Option<String>,
    pub version: Option<String>,
    pub kernel_version: Option<String>,
    pub hostname: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cpu {
    pub name: Option<String>,
    pub caption: Option<String>,
    pub vendor: Option<String>,
    pub socket: Option<String>,
    pub physical_cores: u32,
    pub logical_cores: u32,
    /// Base clock in MHz
    pub normal_clock_speed_mhz: u32,
}

/// SMBIOS memory device form factor (type 17, offset 0Eh)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RamFormFactor {
    #[default]
    Unknown,
    Other,
    Sip,
    Dip,
    Zip,
    Soj,
    Proprietary,
    Simm,
    Dimm,
    Tsop,
    Pga,
    Rim,
    Sodimm,
    Srimm,
    Smd,
    Ssmp,
    Qfp,
    Tqfp,
    Soic,
    Lcc,
    Plcc,
    Bga,
    Fpbga,
    Lga,
}

impl RamFormFactor {
    const ALL: [RamFormFactor; 24] = [
        RamFormFactor::Unknown,
        RamFormFactor::Other,
        RamFormFactor::Sip,
        RamFormFactor::Dip,
        RamFormFactor::Zip,
        RamFormFactor::Soj,
        RamFormFactor::Proprietary,
        RamFormFactor::Simm,
        RamFormFactor::Dimm,
        RamFormFactor::Tsop,
        RamFormFactor::Pga,
        RamFormFactor::Rim,
        RamFormFactor::Sodimm,
        RamFormFactor::Srimm,
        RamFormFactor::Smd,
        RamFormFactor::Ssmp,
        RamFormFactor::Qfp,
        RamFormFactor::Tqfp,
        RamFormFactor::Soic,
        RamFormFactor::Lcc,
        RamFormFactor::Plcc,
        RamFormFactor::Bga,
        RamFormFactor::Fpbga,
        RamFormFactor::Lga,
    ];

    /// Map the numeric CIM/SMBIOS code; out-of-range codes are `None`
    pub fn from_code(code: u64) -> Option<Self> {
        Self::ALL.get(usize::try_from(code).ok()?).copied()
    }

    /// Map the name `dmidecode` prints ("DIMM", "SODIMM", "Row Of Chips", ...)
    pub fn from_dmi_name(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "OTHER" => RamFormFactor::Other,
            "SIP" => RamFormFactor::Sip,
            "DIP" => RamFormFactor::Dip,
            "ZIP" => RamFormFactor::Zip,
            "SOJ" => RamFormFactor::Soj,
            "PROPRIETARY" | "PROPRIETARY CARD" => RamFormFactor::Proprietary,
            "SIMM" => RamFormFactor::Simm,
            "DIMM" => RamFormFactor::Dimm,
            "TSOP" => RamFormFactor::Tsop,
            "PGA" => RamFormFactor::Pga,
            "RIMM" | "RIM" => RamFormFactor::Rim,
            "SODIMM" => RamFormFactor::Sodimm,
            "SRIMM" => RamFormFactor::Srimm,
            "SMD" => RamFormFactor::Smd,
            "SSMP" => RamFormFactor::Ssmp,
            "QFP" => RamFormFactor::Qfp,
            "TQFP" => RamFormFactor::Tqfp,
            "SOIC" => RamFormFactor::Soic,
            "LCC" => RamFormFactor::Lcc,
            "PLCC" => RamFormFactor::Plcc,
            "BGA" => RamFormFactor::Bga,
            "FPBGA" => RamFormFactor::Fpbga,
            "LGA" => RamFormFactor::Lga,
            _ => RamFormFactor::Unknown,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RamStick {
    /// Part number
    pub name: Option<String>,
    pub manufacturer: Option<String>,
    pub capacity: u64,
    pub capacity_hrf: String,
    pub speed_mhz: u32,
    pub device_locator: Option<String>,
    pub bank_label: Option<String>,
    pub tag: Option<String>,
    pub form_factor: RamFormFactor,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disk {
    pub vendor: Option<String>,
    pub model: Option<String>,
    pub caption: Option<String>,
    pub capacity: u64,
    pub capacity_hrf: String,
    pub device_id: Option<String>,
    pub drive_index: u32,
    pub interface_type: Option<String>,
    pub serial_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gpu {
    pub vendor: Option<String>,
    pub name: Option<String>,
    pub caption: Option<String>,
    pub description: Option<String>,
    pub driver_date: Option<String>,
    pub driver_version: Option<String>,
    pub status: Option<String>,
    pub device_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Display {
    pub manufacturer: Option<String>,
    pub name: Option<String>,
    pub serial_number: Option<String>,
}

/// Mainboard and firmware identification
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmBios {
    pub board_name: Option<String>,
    pub board_vendor: Option<String>,
    pub board_version: Option<String>,
    pub bios_codename: Option<String>,
    pub bios_vendor: Option<String>,
    pub bios_version: Option<String>,
}

/// One logical USB device after reconciliation, keyed by `bus_reported_name`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsbDevice {
    pub name: Option<String>,
    pub bus_reported_name: String,
    pub driver_name: String,
    pub driver_version: Option<String>,
    pub driver_date: Option<NaiveDateTime>,
    pub class: Option<String>,
    pub driver_provider: Option<String>,
    pub manufacturer: Option<String>,
    pub device_id: String,
    pub vendor_id: Option<String>,
    pub product_id: Option<String>,
    pub vendor_name: Option<String>,
    pub product_name: Option<String>,
}
