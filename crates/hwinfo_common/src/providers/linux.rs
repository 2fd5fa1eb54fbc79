//! Linux Provider
//!
//! Sources:
//! - sysinfo - OS names, kernel version, CPU brand and core counts
//! - /sys/devices/system/cpu/cpu0/cpufreq - base clock
//! - dmidecode -t 4 / -t 17 - CPU socket, memory devices (needs root)
//! - /sys/block - disks
//! - lspci -vmm -nn -D - display controllers
//! - /sys/class/drm/*/edid - monitors
//! - /sys/class/dmi/id - mainboard and BIOS
//! - /sys/bus/usb/devices - USB devices, mapped onto the device property keys

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use sysinfo::System;
use tracing::{debug, trace, warn};

use super::command::CommandRunner;
use super::{merge_gpus, Category, GatherContext, InformationProvider};
use crate::error::Result;
use crate::format::format_bytes;
use crate::machine::{
    Cpu, Disk, Display, Gpu, MachineInformation, OperatingSystem, RamFormFactor, RamStick, SmBios,
};
use crate::platform::{parse_major_version, PlatformCapabilities};
use crate::usb::{
    gather_usb_devices, DeviceEnumerator, DeviceProperty, PeripheralEntry, PropertyBag,
    PropertyFetcher, PropertyValue, AUDIO_DEVICE, COMPOSITE_DEVICE, INPUT_DEVICE,
};

/// Provider name reported as driver provider for kernel-bound drivers
pub const KERNEL_DRIVER_PROVIDER: &str = "Linux";

/// Block devices that never back a physical disk
const VIRTUAL_BLOCK_PREFIXES: &[&str] = &["loop", "ram", "zram", "dm-", "md", "sr", "fd"];

pub struct LinuxProvider<R: CommandRunner> {
    runner: R,
    root: PathBuf,
}

impl<R: CommandRunner> LinuxProvider<R> {
    pub fn new(runner: R) -> Self {
        Self::with_root(runner, "/")
    }

    /// Read sysfs/procfs below `root` instead of `/`
    pub fn with_root(runner: R, root: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            root: root.into(),
        }
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    fn gather_operating_system(&self, info: &mut MachineInformation) {
        info.operating_system = OperatingSystem {
            name: System::long_os_version().or_else(System::name),
            version: System::os_version(),
            kernel_version: System::kernel_version(),
            hostname: System::host_name(),
        };
    }

    fn gather_cpu(&self, cpu: &mut Cpu) {
        let mut sys = System::new();
        sys.refresh_cpu();

        if let Some(first) = sys.cpus().first() {
            let brand = first.brand().trim();
            if !brand.is_empty() {
                cpu.name = Some(brand.to_string());
            }
            let vendor = first.vendor_id().trim();
            if !vendor.is_empty() {
                cpu.vendor = Some(vendor.to_string());
            }
        }
        cpu.logical_cores = u32::try_from(sys.cpus().len()).unwrap_or(0);
        cpu.physical_cores = sys
            .physical_core_count()
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(cpu.logical_cores);

        let max_freq = self.path("sys/devices/system/cpu/cpu0/cpufreq/cpuinfo_max_freq");
        if let Some(khz) = read_trimmed(&max_freq).and_then(|v| v.parse::<u32>().ok()) {
            cpu.normal_clock_speed_mhz = khz / 1000;
        }

        match self.runner.run("dmidecode", &["-t", "4"]) {
            Ok(out) => {
                cpu.socket = parse_dmidecode(&out)
                    .iter()
                    .find_map(|section| dmi_value(section, "Socket Designation"));
            }
            Err(e) => debug!("CPU socket unavailable: {}", e),
        }
    }

    fn gather_ram(&self) -> Result<Vec<RamStick>> {
        let out = self.runner.run("dmidecode", &["-t", "17"])?;
        Ok(parse_dmidecode(&out)
            .iter()
            .filter_map(memory_device_to_stick)
            .collect())
    }

    fn gather_disks(&self) -> Result<Vec<Disk>> {
        let block = self.path("sys/block");
        let mut names: Vec<String> = fs::read_dir(&block)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| !VIRTUAL_BLOCK_PREFIXES.iter().any(|p| name.starts_with(p)))
            .collect();
        names.sort();

        let mut disks = Vec::new();
        for name in names {
            let dir = block.join(&name);
            if !dir.join("device").exists() {
                trace!("Skipping virtual block device {}", name);
                continue;
            }

            // Always counted in 512-byte sectors
            let sectors = read_trimmed(&dir.join("size"))
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0);
            let capacity = sectors.saturating_mul(512);
            let model = read_trimmed(&dir.join("device/model"));

            disks.push(Disk {
                vendor: read_trimmed(&dir.join("device/vendor")),
                caption: model.clone(),
                model,
                capacity,
                capacity_hrf: format_bytes(capacity),
                device_id: Some(format!("/dev/{}", name)),
                drive_index: u32::try_from(disks.len()).unwrap_or(u32::MAX),
                interface_type: block_interface(&name).map(str::to_string),
                serial_number: read_trimmed(&dir.join("device/serial")),
            });
        }
        Ok(disks)
    }

    fn gather_gpus(&self) -> Result<Vec<Gpu>> {
        let out = self.runner.run("lspci", &["-vmm", "-nn", "-D"])?;
        let mut gpus = parse_lspci_display_controllers(&out);

        for gpu in &mut gpus {
            let Some(slot) = gpu.device_id.as_deref() else {
                continue;
            };
            let driver_link = self.path(&format!("sys/bus/pci/devices/{}/driver", slot));
            if let Some(driver) = link_name(&driver_link) {
                let version = self.path(&format!("sys/module/{}/version", driver));
                gpu.driver_version = read_trimmed(&version).or(Some(driver));
                gpu.status = Some("OK".to_string());
            }
        }
        Ok(gpus)
    }

    fn gather_displays(&self) -> Result<Vec<Display>> {
        let drm = self.path("sys/class/drm");
        if !drm.exists() {
            return Ok(Vec::new());
        }

        let mut connectors: Vec<PathBuf> = fs::read_dir(&drm)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.join("edid").exists())
            .collect();
        connectors.sort();

        let mut displays = Vec::new();
        for connector in connectors {
            if read_trimmed(&connector.join("status")).as_deref() == Some("disconnected") {
                continue;
            }
            let edid = match fs::read(connector.join("edid")) {
                Ok(edid) => edid,
                Err(e) => {
                    debug!("Cannot read EDID of {}: {}", connector.display(), e);
                    continue;
                }
            };
            if let Some(display) = parse_edid(&edid) {
                displays.push(display);
            }
        }
        Ok(displays)
    }

    fn gather_mainboard(&self) -> SmBios {
        let dmi = self.path("sys/class/dmi/id");
        let field = |name: &str| read_trimmed(&dmi.join(name)).filter(|v| !is_dmi_placeholder(v));
        SmBios {
            board_name: field("board_name"),
            board_vendor: field("board_vendor"),
            board_version: field("board_version"),
            bios_codename: field("bios_date"),
            bios_vendor: field("bios_vendor"),
            bios_version: field("bios_version"),
        }
    }
}

impl<R: CommandRunner> InformationProvider for LinuxProvider<R> {
    fn name(&self) -> &'static str {
        "linux"
    }

    fn available(&self) -> bool {
        cfg!(target_os = "linux")
    }

    fn detect_capabilities(&self) -> PlatformCapabilities {
        let major = System::kernel_version().and_then(|v| parse_major_version(&v));
        PlatformCapabilities::linux(major)
    }

    fn gather(
        &self,
        category: Category,
        ctx: &GatherContext<'_>,
        info: &mut MachineInformation,
    ) -> Result<()> {
        match category {
            Category::OperatingSystem => self.gather_operating_system(info),
            Category::Cpu => self.gather_cpu(&mut info.cpu),
            Category::Ram => info.ram_sticks = self.gather_ram()?,
            Category::Disks => info.disks = self.gather_disks()?,
            Category::Gpus => {
                let found = self.gather_gpus()?;
                merge_gpus(&mut info.gpus, found);
            }
            Category::Displays => info.displays = self.gather_displays()?,
            Category::Mainboard => info.smbios = self.gather_mainboard(),
            Category::Usb => {
                let bus = SysfsUsbBus::new(self.path("sys/bus/usb/devices"));
                let options = ctx
                    .config
                    .usb
                    .collect_options(ctx.capabilities.supports_device_properties);
                info.usb_devices = gather_usb_devices(&bus, &bus, ctx.resolver, &options)?;
            }
        }
        Ok(())
    }
}

/// Trimmed, non-empty file contents
fn read_trimmed(path: &Path) -> Option<String> {
    let contents = fs::read_to_string(path).ok()?;
    let trimmed = contents.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Final component of a symlink target (`.../drivers/usbhid` -> `usbhid`)
fn link_name(path: &Path) -> Option<String> {
    let target = fs::read_link(path).ok()?;
    Some(target.file_name()?.to_string_lossy().into_owned())
}

fn is_dmi_placeholder(value: &str) -> bool {
    matches!(
        value,
        "Unknown" | "Not Specified" | "Not Provided" | "To Be Filled By O.E.M." | "Default string"
    )
}

fn block_interface(name: &str) -> Option<&'static str> {
    if name.starts_with("nvme") {
        Some("NVMe")
    } else if name.starts_with("sd") {
        Some("SCSI")
    } else if name.starts_with("mmcblk") {
        Some("SD")
    } else if name.starts_with("vd") {
        Some("VirtIO")
    } else if name.starts_with("hd") {
        Some("IDE")
    } else {
        None
    }
}

/// One `dmidecode` record: the handle line plus its `Key: Value` lines
pub type DmiSection = HashMap<String, String>;

/// Split `dmidecode` output into records. The handle is stored under
/// `"Handle"`; nested list lines are ignored.
pub fn parse_dmidecode(output: &str) -> Vec<DmiSection> {
    let mut sections = Vec::new();
    let mut current: Option<DmiSection> = None;

    for line in output.lines() {
        if let Some(rest) = line.strip_prefix("Handle ") {
            if let Some(done) = current.take() {
                sections.push(done);
            }
            let handle = rest.split(',').next().unwrap_or(rest).trim();
            let mut section = DmiSection::new();
            section.insert("Handle".to_string(), handle.to_string());
            current = Some(section);
            continue;
        }

        let Some(section) = current.as_mut() else {
            continue;
        };
        // Key lines are indented by exactly one tab
        let Some(body) = line.strip_prefix('\t') else {
            continue;
        };
        if body.starts_with('\t') {
            continue;
        }
        if let Some((key, value)) = body.split_once(':') {
            section.insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    if let Some(done) = current {
        sections.push(done);
    }
    sections
}

fn dmi_value(section: &DmiSection, key: &str) -> Option<String> {
    section
        .get(key)
        .filter(|v| !v.is_empty() && !is_dmi_placeholder(v))
        .cloned()
}

/// `"16 GB"` / `"8192 MB"` -> bytes (dmidecode units are binary)
pub fn parse_dmi_size(value: &str) -> Option<u64> {
    let mut parts = value.split_whitespace();
    let amount: u64 = parts.next()?.parse().ok()?;
    let multiplier: u64 = match parts.next()? {
        "bytes" | "B" => 1,
        "kB" | "KB" => 1 << 10,
        "MB" => 1 << 20,
        "GB" => 1 << 30,
        "TB" => 1 << 40,
        _ => return None,
    };
    amount.checked_mul(multiplier)
}

/// `"3200 MT/s"` / `"2400 MHz"` -> 3200 / 2400
fn parse_dmi_speed(value: &str) -> Option<u32> {
    value.split_whitespace().next()?.parse().ok()
}

/// A populated "Memory Device" record as a stick; empty slots are `None`
pub fn memory_device_to_stick(section: &DmiSection) -> Option<RamStick> {
    let capacity = section.get("Size").and_then(|v| parse_dmi_size(v))?;
    let speed = dmi_value(section, "Configured Memory Speed")
        .or_else(|| dmi_value(section, "Configured Clock Speed"))
        .or_else(|| dmi_value(section, "Speed"))
        .and_then(|v| parse_dmi_speed(&v))
        .unwrap_or(0);

    Some(RamStick {
        name: dmi_value(section, "Part Number"),
        manufacturer: dmi_value(section, "Manufacturer"),
        capacity,
        capacity_hrf: format_bytes(capacity),
        speed_mhz: speed,
        device_locator: dmi_value(section, "Locator"),
        bank_label: dmi_value(section, "Bank Locator"),
        tag: section.get("Handle").cloned(),
        form_factor: section
            .get("Form Factor")
            .map(|v| RamFormFactor::from_dmi_name(v))
            .unwrap_or_default(),
    })
}

/// Strip a trailing ` [xxxx]` numeric code added by `lspci -nn`
fn strip_pci_code(value: &str) -> (&str, Option<&str>) {
    let value = value.trim();
    if let Some(open) = value.rfind(" [") {
        if value.ends_with(']') {
            let code = &value[open + 2..value.len() - 1];
            if !code.is_empty() && code.bytes().all(|b| b.is_ascii_hexdigit()) {
                return (value[..open].trim(), Some(code));
            }
        }
    }
    (value, None)
}

/// Display controllers (class 03xx) from `lspci -vmm -nn -D`
pub fn parse_lspci_display_controllers(output: &str) -> Vec<Gpu> {
    let mut gpus = Vec::new();

    for record in output.split("\n\n") {
        let fields: HashMap<&str, &str> = record
            .lines()
            .filter_map(|line| line.split_once(':'))
            .map(|(k, v)| (k.trim(), v.trim()))
            .collect();

        let Some(class) = fields.get("Class") else {
            continue;
        };
        let (class_name, class_code) = strip_pci_code(class);
        if !class_code.is_some_and(|code| code.starts_with("03")) {
            continue;
        }

        let vendor = fields.get("Vendor").map(|v| strip_pci_code(v).0.to_string());
        let name = fields.get("Device").map(|v| strip_pci_code(v).0.to_string());
        gpus.push(Gpu {
            vendor,
            caption: name.clone(),
            name,
            description: Some(class_name.to_string()),
            device_id: fields.get("Slot").map(|v| v.to_string()),
            ..Default::default()
        });
    }
    gpus
}

const EDID_HEADER: [u8; 8] = [0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00];
const EDID_DESCRIPTOR_OFFSETS: [usize; 4] = [54, 72, 90, 108];
const EDID_TAG_SERIAL: u8 = 0xFF;
const EDID_TAG_NAME: u8 = 0xFC;

/// Manufacturer, product name and serial from an EDID base block
pub fn parse_edid(edid: &[u8]) -> Option<Display> {
    if edid.len() < 128 || edid[..8] != EDID_HEADER {
        return None;
    }

    // Three 5-bit letters, 'A' == 1
    let packed = u16::from_be_bytes([edid[8], edid[9]]);
    let manufacturer: String = [10u16, 5, 0]
        .iter()
        .map(|shift| char::from(b'A' - 1 + ((packed >> shift) & 0x1F) as u8))
        .collect();

    let mut name = None;
    let mut serial = None;
    for offset in EDID_DESCRIPTOR_OFFSETS {
        let descriptor = &edid[offset..offset + 18];
        if descriptor[..3] != [0, 0, 0] {
            continue;
        }
        let text = descriptor_text(&descriptor[5..]);
        match descriptor[3] {
            EDID_TAG_NAME => name = text,
            EDID_TAG_SERIAL => serial = text,
            _ => {}
        }
    }

    if serial.is_none() {
        let numeric = u32::from_le_bytes([edid[12], edid[13], edid[14], edid[15]]);
        if numeric != 0 {
            serial = Some(numeric.to_string());
        }
    }

    Some(Display {
        manufacturer: Some(manufacturer),
        name,
        serial_number: serial,
    })
}

fn descriptor_text(bytes: &[u8]) -> Option<String> {
    let end = bytes.iter().position(|b| *b == 0x0A).unwrap_or(bytes.len());
    let text = String::from_utf8_lossy(&bytes[..end]).trim().to_string();
    (!text.is_empty()).then_some(text)
}

/// `/sys/bus/usb/devices` presented as a plug-and-play tree.
///
/// Device IDs take the form `USB\VID_xxxx&PID_xxxx\<sysfs name>`. The driver
/// description is derived from the interface drivers so the reconciliation
/// policy sees the same generic names it would see elsewhere.
pub struct SysfsUsbBus {
    devices: PathBuf,
}

impl SysfsUsbBus {
    pub fn new(devices: impl Into<PathBuf>) -> Self {
        Self {
            devices: devices.into(),
        }
    }

    fn device_id(&self, dir: &Path, name: &str) -> Option<String> {
        let vendor = read_trimmed(&dir.join("idVendor"))?;
        let product = read_trimmed(&dir.join("idProduct"))?;
        Some(format!(
            "USB\\VID_{}&PID_{}\\{}",
            vendor.to_ascii_uppercase(),
            product.to_ascii_uppercase(),
            name
        ))
    }

    /// Interface directories (`1-2:1.0`) with their bound driver, if any
    fn interfaces(&self, dir: &Path, name: &str) -> Vec<(PathBuf, Option<String>)> {
        // Root hub `usbN` names its interfaces `N-0:C.I`
        let prefix = match name.strip_prefix("usb") {
            Some(bus) => format!("{}-0:", bus),
            None => format!("{}:", name),
        };
        let mut interfaces: Vec<(PathBuf, Option<String>)> = match fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_name().to_string_lossy().starts_with(&prefix))
                .map(|entry| {
                    let path = entry.path();
                    let driver = link_name(&path.join("driver"));
                    (path, driver)
                })
                .collect(),
            Err(_) => Vec::new(),
        };
        interfaces.sort();
        interfaces
    }

    /// Nested device directories (anything carrying an `idVendor`)
    fn children(&self, dir: &Path) -> Vec<String> {
        let Ok(entries) = fs::read_dir(dir) else {
            return Vec::new();
        };
        let mut children: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.contains(':') {
                    return None;
                }
                self.device_id(&entry.path(), &name)
            })
            .collect();
        children.sort();
        children
    }
}

/// sysfs device name from the last segment of a device ID
fn sysfs_name(device_id: &str) -> Option<&str> {
    device_id
        .rsplit('\\')
        .next()
        .filter(|name| !name.is_empty() && !name.contains('/') && !name.starts_with('.'))
}

fn is_root_hub(name: &str) -> bool {
    name.starts_with("usb")
}

/// Driver description for a device, from the drivers bound to its interfaces
pub fn usb_driver_description(
    name: &str,
    interface_count: usize,
    drivers: &[String],
) -> Option<String> {
    if interface_count > 1 {
        return Some(COMPOSITE_DEVICE.to_string());
    }
    let driver = drivers.first()?;
    let description = match driver.as_str() {
        "usbhid" => INPUT_DEVICE.to_string(),
        "usb-storage" => "USB Mass Storage Device".to_string(),
        "uas" => "USB Attached SCSI (UAS) Mass Storage Device".to_string(),
        "snd-usb-audio" => AUDIO_DEVICE.to_string(),
        "hub" if is_root_hub(name) => "USB Root Hub".to_string(),
        "hub" => "Generic USB Hub".to_string(),
        other => other.to_string(),
    };
    Some(description)
}

/// Device class name for a USB base class code
pub fn usb_class_name(code: &str) -> Option<&'static str> {
    let class = match u8::from_str_radix(code.trim(), 16).ok()? {
        0x00 => return None,
        0x01 => "MEDIA",
        0x02 | 0x0A => "Ports",
        0x03 => "HIDClass",
        0x06 => "Image",
        0x07 => "Printer",
        0x08 => "DiskDrive",
        0x09 => "USB",
        0x0B => "SmartCardReader",
        0x0E => "Camera",
        0xE0 => "Bluetooth",
        _ => "USBDevice",
    };
    Some(class)
}

impl DeviceEnumerator for SysfsUsbBus {
    fn enumerate(&self, prefix: &str) -> Result<Vec<PeripheralEntry>> {
        if !self.devices.exists() {
            debug!("{} does not exist, no USB devices", self.devices.display());
            return Ok(Vec::new());
        }

        let mut entries: Vec<PeripheralEntry> = fs::read_dir(&self.devices)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.contains(':') {
                    return None;
                }
                self.device_id(&entry.path(), &name)
            })
            .filter(|id| id.starts_with(prefix))
            .map(PeripheralEntry::new)
            .collect();
        entries.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        Ok(entries)
    }

    fn lookup(&self, device_id: &str) -> Result<Vec<PeripheralEntry>> {
        let Some(name) = sysfs_name(device_id) else {
            return Ok(Vec::new());
        };
        let dir = self.devices.join(name);
        Ok(self
            .device_id(&dir, name)
            .map(PeripheralEntry::new)
            .into_iter()
            .collect())
    }
}

impl PropertyFetcher for SysfsUsbBus {
    fn properties(&self, entry: &PeripheralEntry) -> Result<PropertyBag> {
        let mut bag = PropertyBag::new();
        let Some(name) = sysfs_name(&entry.device_id) else {
            return Ok(bag);
        };
        let dir = self.devices.join(name);
        let mut put = |property: DeviceProperty, value: Option<String>| {
            if let Some(value) = value {
                bag.insert(property.key().to_string(), PropertyValue::Text(value));
            }
        };

        let product = read_trimmed(&dir.join("product"));
        put(DeviceProperty::BusReportedDescription, product.clone());
        put(DeviceProperty::FriendlyName, product);
        put(DeviceProperty::Manufacturer, read_trimmed(&dir.join("manufacturer")));

        let interfaces = self.interfaces(&dir, name);
        let interface_count = read_trimmed(&dir.join("bNumInterfaces"))
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(interfaces.len());
        let drivers: Vec<String> = interfaces.iter().filter_map(|(_, d)| d.clone()).collect();

        if !drivers.is_empty() {
            put(
                DeviceProperty::DriverDescription,
                usb_driver_description(name, interface_count, &drivers),
            );
            put(
                DeviceProperty::DriverProvider,
                Some(KERNEL_DRIVER_PROVIDER.to_string()),
            );
        }

        let class = read_trimmed(&dir.join("bDeviceClass"))
            .and_then(|code| usb_class_name(&code))
            .or_else(|| {
                interfaces
                    .first()
                    .and_then(|(path, _)| read_trimmed(&path.join("bInterfaceClass")))
                    .and_then(|code| usb_class_name(&code))
            });
        put(DeviceProperty::Class, class.map(str::to_string));

        let children = self.children(&dir);
        if !children.is_empty() {
            bag.insert(
                DeviceProperty::Children.key().to_string(),
                PropertyValue::List(children),
            );
        }

        if bag.is_empty() {
            warn!("No readable attributes under {}", dir.display());
        }
        Ok(bag)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::HwInfoConfig;
    use crate::providers::command::testing::CannedRunner;
    use crate::usb::{collect_property_sets, CollectOptions, UsbIdDatabase};
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn usb_device(root: &Path, name: &str, vid: &str, pid: &str, product: Option<&str>) -> PathBuf {
        let dir = root.join("sys/bus/usb/devices").join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("idVendor"), format!("{}\n", vid)).unwrap();
        fs::write(dir.join("idProduct"), format!("{}\n", pid)).unwrap();
        if let Some(product) = product {
            fs::write(dir.join("product"), format!("{}\n", product)).unwrap();
        }
        dir
    }

    fn interface(dir: &Path, name: &str, driver: Option<&str>, class: &str) {
        let iface = dir.join(name);
        fs::create_dir_all(&iface).unwrap();
        fs::write(iface.join("bInterfaceClass"), format!("{}\n", class)).unwrap();
        if let Some(driver) = driver {
            symlink(format!("../../../../bus/usb/drivers/{}", driver), iface.join("driver"))
                .unwrap();
        }
    }

    const DMIDECODE_17: &str = "\
# dmidecode 3.5
Getting SMBIOS data from sysfs.
SMBIOS 3.3.0 present.

Handle 0x0040, DMI type 17, 92 bytes
Memory Device
\tTotal Width: 64 bits
\tSize: 16 GB
\tForm Factor: DIMM
\tLocator: DIMM_A2
\tBank Locator: BANK 1
\tType: DDR4
\tSpeed: 3600 MT/s
\tManufacturer: G Skill Intl
\tPart Number: F4-3600C16-16GVKC
\tConfigured Memory Speed: 3200 MT/s

Handle 0x0041, DMI type 17, 92 bytes
Memory Device
\tSize: No Module Installed
\tForm Factor: Unknown
\tLocator: DIMM_B1
\tManufacturer: Unknown

Handle 0x0042, DMI type 17, 40 bytes
Memory Device
\tSize: 8192 MB
\tForm Factor: SODIMM
\tLocator: ChannelA-DIMM0
\tBank Locator: BANK 0
\tSpeed: 2400 MHz
\tManufacturer: Samsung
\tPart Number: Not Specified
";

    #[test]
    fn test_dmidecode_memory_devices() {
        let sticks: Vec<RamStick> = parse_dmidecode(DMIDECODE_17)
            .iter()
            .filter_map(memory_device_to_stick)
            .collect();
        assert_eq!(sticks.len(), 2);

        assert_eq!(sticks[0].capacity, 16 << 30);
        assert_eq!(sticks[0].capacity_hrf, "16 GiB");
        assert_eq!(sticks[0].speed_mhz, 3200);
        assert_eq!(sticks[0].form_factor, RamFormFactor::Dimm);
        assert_eq!(sticks[0].name.as_deref(), Some("F4-3600C16-16GVKC"));
        assert_eq!(sticks[0].bank_label.as_deref(), Some("BANK 1"));
        assert_eq!(sticks[0].tag.as_deref(), Some("0x0040"));

        assert_eq!(sticks[1].capacity_hrf, "8 GiB");
        assert_eq!(sticks[1].speed_mhz, 2400);
        assert_eq!(sticks[1].form_factor, RamFormFactor::Sodimm);
        assert_eq!(sticks[1].name, None);
    }

    #[test]
    fn test_dmi_size_units() {
        assert_eq!(parse_dmi_size("512 MB"), Some(512 << 20));
        assert_eq!(parse_dmi_size("2 TB"), Some(2 << 40));
        assert_eq!(parse_dmi_size("No Module Installed"), None);
        assert_eq!(parse_dmi_size("16"), None);
    }

    #[test]
    fn test_ram_category_uses_dmidecode() {
        let runner = CannedRunner::default().on("dmidecode -t 17", DMIDECODE_17);
        let provider = LinuxProvider::new(runner);
        assert_eq!(provider.gather_ram().unwrap().len(), 2);

        let provider = LinuxProvider::new(CannedRunner::default().fail("dmidecode"));
        assert!(provider.gather_ram().is_err());
    }

    const LSPCI: &str = "\
Slot:\t0000:00:02.0
Class:\tVGA compatible controller [0300]
Vendor:\tIntel Corporation [8086]
Device:\tAlder Lake-P GT2 [Iris Xe Graphics] [46a6]
Rev:\t0c

Slot:\t0000:00:14.0
Class:\tUSB controller [0c03]
Vendor:\tIntel Corporation [8086]
Device:\tAlder Lake PCH USB 3.2 xHCI Host Controller [51ed]

Slot:\t0000:01:00.0
Class:\t3D controller [0302]
Vendor:\tNVIDIA Corporation [10de]
Device:\tGA107M [GeForce RTX 3050 Mobile] [25a2]
";

    #[test]
    fn test_lspci_display_controllers() {
        let gpus = parse_lspci_display_controllers(LSPCI);
        assert_eq!(gpus.len(), 2);
        assert_eq!(gpus[0].vendor.as_deref(), Some("Intel Corporation"));
        assert_eq!(gpus[0].name.as_deref(), Some("Alder Lake-P GT2 [Iris Xe Graphics]"));
        assert_eq!(gpus[0].description.as_deref(), Some("VGA compatible controller"));
        assert_eq!(gpus[0].device_id.as_deref(), Some("0000:00:02.0"));
        assert_eq!(gpus[1].name.as_deref(), Some("GA107M [GeForce RTX 3050 Mobile]"));
    }

    #[test]
    fn test_gpu_driver_from_sysfs() {
        let tmp = TempDir::new().unwrap();
        let dev = tmp.path().join("sys/bus/pci/devices/0000:00:02.0");
        fs::create_dir_all(&dev).unwrap();
        symlink("../../../bus/pci/drivers/i915", dev.join("driver")).unwrap();

        let runner = CannedRunner::default().on("lspci", LSPCI);
        let provider = LinuxProvider::with_root(runner, tmp.path());
        let gpus = provider.gather_gpus().unwrap();
        assert_eq!(gpus[0].driver_version.as_deref(), Some("i915"));
        assert_eq!(gpus[0].status.as_deref(), Some("OK"));
        assert_eq!(gpus[1].status, None);
    }

    fn edid_block() -> Vec<u8> {
        let mut edid = vec![0u8; 128];
        edid[..8].copy_from_slice(&EDID_HEADER);
        // "DEL": D=4, E=5, L=12
        let packed: u16 = (4 << 10) | (5 << 5) | 12;
        edid[8..10].copy_from_slice(&packed.to_be_bytes());
        let mut name = [0u8; 18];
        name[3] = EDID_TAG_NAME;
        name[5..18].copy_from_slice(b"DELL U2720Q\n ");
        edid[72..90].copy_from_slice(&name);
        let mut serial = [0u8; 18];
        serial[3] = EDID_TAG_SERIAL;
        serial[5..18].copy_from_slice(b"F8KXXL3\n     ");
        edid[90..108].copy_from_slice(&serial);
        edid
    }

    #[test]
    fn test_parse_edid() {
        let display = parse_edid(&edid_block()).unwrap();
        assert_eq!(display.manufacturer.as_deref(), Some("DEL"));
        assert_eq!(display.name.as_deref(), Some("DELL U2720Q"));
        assert_eq!(display.serial_number.as_deref(), Some("F8KXXL3"));

        assert!(parse_edid(&[0u8; 128]).is_none());
        assert!(parse_edid(&edid_block()[..100]).is_none());
    }

    #[test]
    fn test_displays_skip_disconnected() {
        let tmp = TempDir::new().unwrap();
        let drm = tmp.path().join("sys/class/drm");
        fs::create_dir_all(drm.join("card0-DP-1")).unwrap();
        fs::write(drm.join("card0-DP-1/edid"), edid_block()).unwrap();
        fs::write(drm.join("card0-DP-1/status"), "connected\n").unwrap();
        fs::create_dir_all(drm.join("card0-HDMI-A-1")).unwrap();
        fs::write(drm.join("card0-HDMI-A-1/edid"), edid_block()).unwrap();
        fs::write(drm.join("card0-HDMI-A-1/status"), "disconnected\n").unwrap();

        let provider = LinuxProvider::with_root(CannedRunner::default(), tmp.path());
        assert_eq!(provider.gather_displays().unwrap().len(), 1);
    }

    #[test]
    fn test_disks_from_sys_block() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "sys/block/nvme0n1/size", "1953525168\n");
        write(root, "sys/block/nvme0n1/device/model", "Samsung SSD 970 EVO Plus 1TB  \n");
        write(root, "sys/block/nvme0n1/device/serial", "  S4EWNX0R123456  \n");
        write(root, "sys/block/sda/size", "500118192\n");
        write(root, "sys/block/sda/device/model", "CT250MX500SSD1\n");
        write(root, "sys/block/sda/device/vendor", "ATA     \n");
        write(root, "sys/block/loop0/size", "100\n");
        write(root, "sys/block/zram0/size", "100\n");

        let provider = LinuxProvider::with_root(CannedRunner::default(), root);
        let disks = provider.gather_disks().unwrap();
        assert_eq!(disks.len(), 2);
        assert_eq!(disks[0].device_id.as_deref(), Some("/dev/nvme0n1"));
        assert_eq!(disks[0].drive_index, 0);
        assert_eq!(disks[0].capacity, 1_000_204_886_016);
        assert_eq!(disks[0].capacity_hrf, "931.51 GiB");
        assert_eq!(disks[0].interface_type.as_deref(), Some("NVMe"));
        assert_eq!(disks[0].serial_number.as_deref(), Some("S4EWNX0R123456"));
        assert_eq!(disks[1].vendor.as_deref(), Some("ATA"));
        assert_eq!(disks[1].drive_index, 1);
    }

    #[test]
    fn test_mainboard_from_dmi_id() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "sys/class/dmi/id/board_name", "ROG STRIX B550-F GAMING\n");
        write(root, "sys/class/dmi/id/board_vendor", "ASUSTeK COMPUTER INC.\n");
        write(root, "sys/class/dmi/id/board_version", "Rev X.0x\n");
        write(root, "sys/class/dmi/id/bios_vendor", "American Megatrends Inc.\n");
        write(root, "sys/class/dmi/id/bios_version", "2803\n");
        write(root, "sys/class/dmi/id/bios_date", "Default string\n");

        let provider = LinuxProvider::with_root(CannedRunner::default(), root);
        let smbios = provider.gather_mainboard();
        assert_eq!(smbios.board_name.as_deref(), Some("ROG STRIX B550-F GAMING"));
        assert_eq!(smbios.bios_version.as_deref(), Some("2803"));
        assert_eq!(smbios.bios_codename, None);
    }

    #[test]
    fn test_usb_driver_description() {
        let drivers = |names: &[&str]| names.iter().map(|n| n.to_string()).collect::<Vec<_>>();
        assert_eq!(
            usb_driver_description("1-2", 2, &drivers(&["usbhid", "usbhid"])).as_deref(),
            Some(COMPOSITE_DEVICE)
        );
        assert_eq!(
            usb_driver_description("1-2", 1, &drivers(&["usbhid"])).as_deref(),
            Some(INPUT_DEVICE)
        );
        assert_eq!(
            usb_driver_description("1-1", 1, &drivers(&["hub"])).as_deref(),
            Some("Generic USB Hub")
        );
        assert_eq!(
            usb_driver_description("usb1", 1, &drivers(&["hub"])).as_deref(),
            Some("USB Root Hub")
        );
        assert_eq!(
            usb_driver_description("1-3", 1, &drivers(&["btusb"])).as_deref(),
            Some("btusb")
        );
        assert_eq!(usb_driver_description("1-4", 1, &[]), None);
    }

    #[test]
    fn test_usb_class_names() {
        assert_eq!(usb_class_name("00"), None);
        assert_eq!(usb_class_name("03"), Some("HIDClass"));
        assert_eq!(usb_class_name("e0"), Some("Bluetooth"));
        assert_eq!(usb_class_name("ff"), Some("USBDevice"));
        assert_eq!(usb_class_name("zz"), None);
    }

    #[test]
    fn test_sysfs_bus_properties_and_children() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();

        let hub = usb_device(root, "1-1", "05e3", "0610", Some("USB2.1 Hub"));
        fs::write(hub.join("bDeviceClass"), "09\n").unwrap();
        fs::write(hub.join("bNumInterfaces"), " 1\n").unwrap();
        interface(&hub, "1-1:1.0", Some("hub"), "09");
        // Nested copy of the child, as sysfs shows it below its parent
        let nested = hub.join("1-1.2");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("idVendor"), "046d\n").unwrap();
        fs::write(nested.join("idProduct"), "c52b\n").unwrap();

        let receiver = usb_device(root, "1-1.2", "046d", "c52b", Some("USB Receiver"));
        fs::write(receiver.join("manufacturer"), "Logitech\n").unwrap();
        fs::write(receiver.join("bDeviceClass"), "00\n").unwrap();
        fs::write(receiver.join("bNumInterfaces"), " 3\n").unwrap();
        interface(&receiver, "1-1.2:1.0", Some("usbhid"), "03");
        interface(&receiver, "1-1.2:1.1", Some("usbhid"), "03");
        interface(&receiver, "1-1.2:1.2", Some("usbhid"), "03");

        let bus = SysfsUsbBus::new(root.join("sys/bus/usb/devices"));
        let entries = bus.enumerate("USB").unwrap();
        assert_eq!(
            entries.iter().map(|e| e.device_id.as_str()).collect::<Vec<_>>(),
            vec![r"USB\VID_046D&PID_C52B\1-1.2", r"USB\VID_05E3&PID_0610\1-1"]
        );

        let hub_bag = bus
            .properties(&PeripheralEntry::new(r"USB\VID_05E3&PID_0610\1-1"))
            .unwrap();
        assert_eq!(
            hub_bag.get(DeviceProperty::DriverDescription.key()),
            Some(&PropertyValue::from("Generic USB Hub"))
        );
        assert_eq!(
            hub_bag.get(DeviceProperty::Class.key()),
            Some(&PropertyValue::from("USB"))
        );
        assert_eq!(
            hub_bag.get(DeviceProperty::Children.key()),
            Some(&PropertyValue::List(vec![r"USB\VID_046D&PID_C52B\1-1.2".to_string()]))
        );

        let receiver_bag = bus
            .properties(&PeripheralEntry::new(r"USB\VID_046D&PID_C52B\1-1.2"))
            .unwrap();
        assert_eq!(
            receiver_bag.get(DeviceProperty::DriverDescription.key()),
            Some(&PropertyValue::from(COMPOSITE_DEVICE))
        );
        assert_eq!(
            receiver_bag.get(DeviceProperty::Class.key()),
            Some(&PropertyValue::from("HIDClass"))
        );
        assert_eq!(
            receiver_bag.get(DeviceProperty::DriverProvider.key()),
            Some(&PropertyValue::from(KERNEL_DRIVER_PROVIDER))
        );

        let sets = collect_property_sets(&bus, &bus, &CollectOptions::default()).unwrap();
        assert_eq!(sets.len(), 2);
    }

    #[test]
    fn test_sysfs_root_hub_interface_naming() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        let hub = usb_device(root, "usb1", "1d6b", "0002", Some("xHCI Host Controller"));
        fs::write(hub.join("manufacturer"), "Linux 6.8.0 xhci-hcd\n").unwrap();
        fs::write(hub.join("bDeviceClass"), "09\n").unwrap();
        fs::write(hub.join("bNumInterfaces"), " 1\n").unwrap();
        interface(&hub, "1-0:1.0", Some("hub"), "09");

        let bus = SysfsUsbBus::new(root.join("sys/bus/usb/devices"));
        let bag = bus
            .properties(&PeripheralEntry::new(r"USB\VID_1D6B&PID_0002\usb1"))
            .unwrap();
        assert_eq!(
            bag.get(DeviceProperty::DriverDescription.key()),
            Some(&PropertyValue::from("USB Root Hub"))
        );
        // The interface directory is not a child device
        assert!(bag.get(DeviceProperty::Children.key()).is_none());

        let sets = collect_property_sets(&bus, &bus, &CollectOptions::default()).unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].device_id, r"USB\VID_1D6B&PID_0002\usb1");
        assert_eq!(sets[0].driver_description, "USB Root Hub");
    }

    #[test]
    fn test_sysfs_bus_excludes_driverless_devices() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        let dir = usb_device(root, "2-1", "1234", "5678", Some("Mystery Gadget"));
        interface(&dir, "2-1:1.0", None, "ff");

        let bus = SysfsUsbBus::new(root.join("sys/bus/usb/devices"));
        let sets = collect_property_sets(&bus, &bus, &CollectOptions::default()).unwrap();
        assert!(sets.is_empty());
    }

    #[test]
    fn test_sysfs_lookup() {
        let tmp = TempDir::new().unwrap();
        usb_device(tmp.path(), "3-1", "abcd", "ef01", None);

        let bus = SysfsUsbBus::new(tmp.path().join("sys/bus/usb/devices"));
        assert_eq!(bus.lookup(r"USB\VID_ABCD&PID_EF01\3-1").unwrap().len(), 1);
        assert!(bus.lookup(r"USB\VID_ABCD&PID_EF01\9-9").unwrap().is_empty());
        assert!(bus.lookup(r"USB\VID_ABCD&PID_EF01\..").unwrap().is_empty());
    }

    #[test]
    fn test_usb_category_end_to_end() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        let receiver = usb_device(root, "1-2", "046d", "c52b", Some("USB Receiver"));
        fs::write(receiver.join("bNumInterfaces"), " 2\n").unwrap();
        interface(&receiver, "1-2:1.0", Some("usbhid"), "03");
        interface(&receiver, "1-2:1.1", Some("usbhid"), "03");

        let provider = LinuxProvider::with_root(CannedRunner::default(), root);
        let config = HwInfoConfig::default();
        let db = UsbIdDatabase::builtin();
        let ctx = GatherContext {
            capabilities: PlatformCapabilities::linux(Some(6)),
            config: &config,
            resolver: &db,
        };
        let mut info = MachineInformation::default();
        provider.gather(Category::Usb, &ctx, &mut info).unwrap();

        assert_eq!(info.usb_devices.len(), 1);
        let device = &info.usb_devices[0];
        assert_eq!(device.driver_name, COMPOSITE_DEVICE);
        assert_eq!(device.vendor_id.as_deref(), Some("046D"));
        assert_eq!(device.vendor_name.as_deref(), Some("Logitech, Inc."));
        assert_eq!(device.product_name.as_deref(), Some("Unifying Receiver"));
    }

    #[test]
    fn test_missing_usb_tree_is_empty() {
        let tmp = TempDir::new().unwrap();
        let bus = SysfsUsbBus::new(tmp.path().join("sys/bus/usb/devices"));
        assert!(bus.enumerate("USB").unwrap().is_empty());
    }
}
