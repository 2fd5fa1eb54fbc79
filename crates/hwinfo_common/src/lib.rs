//! hwinfo Common - hardware inventory engine
//!
//! Gathers a point-in-time snapshot of OS, CPU, memory, disks, GPUs,
//! monitors, mainboard and USB peripherals. USB device instances are
//! reconciled into one record per physical device.

pub mod config;
pub mod error;
pub mod format;
pub mod machine;
pub mod platform;
pub mod providers;
pub mod usb;

pub use config::*;
pub use error::*;
pub use format::format_bytes;
pub use machine::*;
pub use platform::*;
pub use providers::{
    Category, GatherContext, InformationProvider, LinuxProvider, MachineInformationGatherer,
    WindowsProvider,
};
