//! Text rendering of a machine snapshot.

use owo_colors::OwoColorize;

use hwinfo_common::{MachineInformation, UsbDevice};

use crate::cli::Section;

const KEY_WIDTH: usize = 16;
const HR: &str = "------------------------------------------------------------";

fn heading(title: &str) {
    println!();
    println!("{}", title.bold().cyan());
    println!("{}", HR.dimmed());
}

fn print_kv(key: &str, value: &str) {
    println!("  {:width$} {}", key.dimmed(), value, width = KEY_WIDTH);
}

fn print_opt(key: &str, value: Option<&str>) {
    if let Some(value) = value {
        print_kv(key, value);
    }
}

fn shows(section: Section, wanted: Section) -> bool {
    section == Section::All || section == wanted
}

pub fn print_snapshot(info: &MachineInformation, section: Section) {
    if shows(section, Section::Os) {
        heading("Operating system");
        let os = &info.operating_system;
        print_kv("platform", info.platform.os.as_str());
        print_opt("name", os.name.as_deref());
        print_opt("version", os.version.as_deref());
        print_opt("kernel", os.kernel_version.as_deref());
        print_opt("hostname", os.hostname.as_deref());
        print_kv(
            "device props",
            if info.platform.supports_device_properties {
                "supported"
            } else {
                "unsupported"
            },
        );
    }

    if shows(section, Section::Cpu) {
        heading("CPU");
        let cpu = &info.cpu;
        print_opt("name", cpu.name.as_deref());
        print_opt("vendor", cpu.vendor.as_deref());
        print_opt("socket", cpu.socket.as_deref());
        print_kv(
            "cores",
            &format!("{} physical, {} logical", cpu.physical_cores, cpu.logical_cores),
        );
        if cpu.normal_clock_speed_mhz > 0 {
            print_kv("base clock", &format!("{} MHz", cpu.normal_clock_speed_mhz));
        }
    }

    if shows(section, Section::Ram) {
        heading("Memory");
        if info.ram_sticks.is_empty() {
            println!("  {}", "no memory devices reported".dimmed());
        }
        for stick in &info.ram_sticks {
            let slot = stick.device_locator.as_deref().unwrap_or("?");
            let speed = if stick.speed_mhz > 0 {
                format!(" @ {} MHz", stick.speed_mhz)
            } else {
                String::new()
            };
            print_kv(
                slot,
                &format!(
                    "{}{} {:?} {} {}",
                    stick.capacity_hrf,
                    speed,
                    stick.form_factor,
                    stick.manufacturer.as_deref().unwrap_or(""),
                    stick.name.as_deref().unwrap_or("")
                )
                .trim_end(),
            );
        }
    }

    if shows(section, Section::Disks) {
        heading("Disks");
        for disk in &info.disks {
            let id = disk.device_id.as_deref().unwrap_or("?");
            print_kv(
                id,
                &format!(
                    "{} {} [{}]",
                    disk.model.as_deref().unwrap_or("unknown model"),
                    disk.capacity_hrf,
                    disk.interface_type.as_deref().unwrap_or("?")
                ),
            );
        }
    }

    if shows(section, Section::Gpus) {
        heading("GPUs");
        for gpu in &info.gpus {
            print_kv(
                gpu.vendor.as_deref().unwrap_or("?"),
                gpu.name.as_deref().unwrap_or("unknown"),
            );
            print_opt("  driver", gpu.driver_version.as_deref());
            print_opt("  status", gpu.status.as_deref());
        }
    }

    if shows(section, Section::Displays) {
        heading("Displays");
        for display in &info.displays {
            print_kv(
                display.manufacturer.as_deref().unwrap_or("?"),
                &format!(
                    "{} (serial {})",
                    display.name.as_deref().unwrap_or("unknown"),
                    display.serial_number.as_deref().unwrap_or("?")
                ),
            );
        }
    }

    if shows(section, Section::Mainboard) {
        heading("Mainboard");
        let smbios = &info.smbios;
        print_opt("board", smbios.board_name.as_deref());
        print_opt("board vendor", smbios.board_vendor.as_deref());
        print_opt("board version", smbios.board_version.as_deref());
        print_opt("bios vendor", smbios.bios_vendor.as_deref());
        print_opt("bios version", smbios.bios_version.as_deref());
        print_opt("bios name", smbios.bios_codename.as_deref());
    }

    if shows(section, Section::Usb) {
        heading("USB devices");
        if info.usb_devices.is_empty() {
            println!("  {}", "no USB devices reported".dimmed());
        }
        for device in &info.usb_devices {
            print_usb_device(device);
        }
    }
}

/// "Logitech, Inc. Unifying Receiver [046D:C52B]"
pub fn usb_identity(device: &UsbDevice) -> String {
    let names: Vec<&str> = [device.vendor_name.as_deref(), device.product_name.as_deref()]
        .into_iter()
        .flatten()
        .collect();
    let ids = match (device.vendor_id.as_deref(), device.product_id.as_deref()) {
        (Some(vid), Some(pid)) => format!("[{}:{}]", vid, pid),
        _ => String::new(),
    };
    format!("{} {}", names.join(" "), ids).trim().to_string()
}

fn print_usb_device(device: &UsbDevice) {
    println!("  {}", device.bus_reported_name.bold());
    let identity = usb_identity(device);
    if !identity.is_empty() {
        print_kv("  identity", &identity);
    }
    print_kv("  driver", &device.driver_name);
    print_opt("  provider", device.driver_provider.as_deref());
    print_opt("  version", device.driver_version.as_deref());
    if let Some(date) = device.driver_date {
        print_kv("  date", &date.format("%Y-%m-%d").to_string());
    }
    print_opt("  class", device.class.as_deref());
    print_opt("  manufacturer", device.manufacturer.as_deref());
    print_kv("  device id", &device.device_id);
}
