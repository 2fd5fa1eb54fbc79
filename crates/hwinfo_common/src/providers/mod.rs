//! Information Providers
//!
//! A provider knows how to ask one platform about each hardware category.
//! The [`MachineInformationGatherer`] detects capabilities once, then asks
//! every available provider for every enabled category. A failing category
//! is logged and left empty; the rest of the pass continues.

pub mod command;
pub mod linux;
pub mod windows;

use tracing::{debug, info, warn};

use crate::config::HwInfoConfig;
use crate::error::Result;
use crate::machine::{Gpu, MachineInformation};
use crate::platform::PlatformCapabilities;
use crate::usb::{NameResolver, UsbIdDatabase};

pub use command::{CommandRunner, SystemRunner};
pub use linux::LinuxProvider;
pub use windows::WindowsProvider;

/// Hardware category gathered as one unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    OperatingSystem,
    Cpu,
    Ram,
    Disks,
    Gpus,
    Displays,
    Mainboard,
    Usb,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::OperatingSystem,
        Category::Cpu,
        Category::Ram,
        Category::Disks,
        Category::Gpus,
        Category::Displays,
        Category::Mainboard,
        Category::Usb,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::OperatingSystem => "os",
            Category::Cpu => "cpu",
            Category::Ram => "ram",
            Category::Disks => "disks",
            Category::Gpus => "gpus",
            Category::Displays => "displays",
            Category::Mainboard => "mainboard",
            Category::Usb => "usb",
        }
    }

    fn enabled(&self, config: &HwInfoConfig) -> bool {
        let gather = &config.gather;
        match self {
            Category::OperatingSystem => true,
            Category::Cpu => gather.cpu,
            Category::Ram => gather.ram,
            Category::Disks => gather.disks,
            Category::Gpus => gather.gpus,
            Category::Displays => gather.displays,
            Category::Mainboard => gather.mainboard,
            Category::Usb => gather.usb,
        }
    }

    /// Reset this category to its empty value
    fn clear(&self, info: &mut MachineInformation) {
        match self {
            Category::OperatingSystem => info.operating_system = Default::default(),
            Category::Cpu => info.cpu = Default::default(),
            Category::Ram => info.ram_sticks.clear(),
            Category::Disks => info.disks.clear(),
            Category::Gpus => info.gpus.clear(),
            Category::Displays => info.displays.clear(),
            Category::Mainboard => info.smbios = Default::default(),
            Category::Usb => info.usb_devices.clear(),
        }
    }
}

/// Everything a provider needs besides the snapshot itself
pub struct GatherContext<'a> {
    pub capabilities: PlatformCapabilities,
    pub config: &'a HwInfoConfig,
    pub resolver: &'a dyn NameResolver,
}

pub trait InformationProvider {
    fn name(&self) -> &'static str;

    /// Whether this provider can run on the current host
    fn available(&self) -> bool;

    /// One-time initialization step, run before any category
    fn detect_capabilities(&self) -> PlatformCapabilities;

    /// Fill `category` in `info`
    fn gather(
        &self,
        category: Category,
        ctx: &GatherContext<'_>,
        info: &mut MachineInformation,
    ) -> Result<()>;
}

/// Merge GPUs found by a later provider.
///
/// With nothing known yet the new list is taken as-is; otherwise only the
/// fields earlier sources cannot supply are copied over, matched by name.
pub fn merge_gpus(known: &mut Vec<Gpu>, found: Vec<Gpu>) {
    if known.is_empty() {
        *known = found;
        return;
    }

    for gpu in known.iter_mut() {
        if let Some(other) = found.iter().find(|g| g.name.is_some() && g.name == gpu.name) {
            gpu.driver_date = other.driver_date.clone();
            gpu.status = other.status.clone();
            gpu.description = other.description.clone();
        }
    }
}

/// Runs providers over categories and assembles the snapshot
pub struct MachineInformationGatherer {
    config: HwInfoConfig,
    providers: Vec<Box<dyn InformationProvider>>,
    resolver: Box<dyn NameResolver>,
}

impl MachineInformationGatherer {
    /// Platform providers plus the vendor database named by `config`
    pub fn new(config: HwInfoConfig) -> Self {
        let resolver = UsbIdDatabase::with_system_ids(config.usb.vendor_db_path.as_deref());
        let providers: Vec<Box<dyn InformationProvider>> = vec![
            Box::new(WindowsProvider::new(SystemRunner)),
            Box::new(LinuxProvider::new(SystemRunner)),
        ];
        Self::with_providers(config, providers, Box::new(resolver))
    }

    pub fn with_providers(
        config: HwInfoConfig,
        providers: Vec<Box<dyn InformationProvider>>,
        resolver: Box<dyn NameResolver>,
    ) -> Self {
        Self {
            config,
            providers,
            resolver,
        }
    }

    pub fn gather(&self) -> MachineInformation {
        let mut info = MachineInformation::default();

        let available: Vec<&dyn InformationProvider> = self
            .providers
            .iter()
            .map(|p| p.as_ref())
            .filter(|p| p.available())
            .collect();

        if available.is_empty() {
            warn!("No information provider available for this platform");
            return info;
        }

        for provider in &available {
            info.platform = provider.detect_capabilities();
            debug!("{} capabilities: {:?}", provider.name(), info.platform);

            let ctx = GatherContext {
                capabilities: info.platform,
                config: &self.config,
                resolver: self.resolver.as_ref(),
            };

            for category in Category::ALL {
                if !category.enabled(&self.config) {
                    continue;
                }
                if let Err(e) = provider.gather(category, &ctx, &mut info) {
                    warn!(
                        "{}: gathering {} failed: {}",
                        provider.name(),
                        category.as_str(),
                        e
                    );
                    category.clear(&mut info);
                }
            }
        }

        info!(
            "Inventory complete: {} RAM sticks, {} disks, {} GPUs, {} displays, {} USB devices",
            info.ram_sticks.len(),
            info.disks.len(),
            info.gpus.len(),
            info.displays.len(),
            info.usb_devices.len()
        );
        info
    }
}
