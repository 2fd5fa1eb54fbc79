//! Windows Provider
//!
//! Hardware inventory via CIM/WMI, queried through PowerShell and returned
//! as JSON.
//!
//! Sources:
//! - Win32_OperatingSystem - version (capability detection)
//! - Win32_Processor, Win32_PhysicalMemory, Win32_DiskDrive
//! - Win32_VideoController, root\wmi WmiMonitorID
//! - Win32_BaseBoard, Win32_BIOS
//! - Win32_PnPEntity + GetDeviceProperties - USB devices

use std::cell::RefCell;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

use super::command::{ps_quote, run_powershell, wql_escape, CommandRunner};
use super::{merge_gpus, Category, GatherContext, InformationProvider};
use crate::error::{HwInfoError, Result};
use crate::format::format_bytes;
use crate::machine::{
    Cpu, Disk, Display, Gpu, MachineInformation, OperatingSystem, RamFormFactor, RamStick, SmBios,
};
use crate::platform::{parse_major_version, PlatformCapabilities};
use crate::usb::{
    gather_usb_devices, DeviceEnumerator, PeripheralEntry, PropertyBag, PropertyFetcher,
    PropertyValue,
};

type Row = Map<String, Value>;

pub struct WindowsProvider<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> WindowsProvider<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    fn query(&self, script: &str) -> Result<Vec<Row>> {
        let raw = run_powershell(&self.runner, script)?;
        json_rows(&raw)
    }

    fn cim_select(&self, class: &str, properties: &str) -> Result<Vec<Row>> {
        self.query(&format!(
            "Get-CimInstance -ClassName {class} | Select-Object {properties} | ConvertTo-Json -Compress"
        ))
    }

    fn gather_operating_system(&self, info: &mut MachineInformation) -> Result<()> {
        let rows = self.cim_select("Win32_OperatingSystem", "Caption,Version,CSName")?;
        if let Some(row) = rows.first() {
            info.operating_system = OperatingSystem {
                name: str_field(row, "Caption"),
                version: str_field(row, "Version"),
                kernel_version: str_field(row, "Version"),
                hostname: str_field(row, "CSName"),
            };
        }
        Ok(())
    }

    fn gather_cpu(&self, ctx: &GatherContext<'_>, cpu: &mut Cpu) -> Result<()> {
        let properties = if ctx.capabilities.supports_device_properties {
            "Name,NumberOfEnabledCore,NumberOfLogicalProcessors,SocketDesignation,MaxClockSpeed,Manufacturer,Caption"
        } else {
            "Name,NumberOfLogicalProcessors,SocketDesignation,MaxClockSpeed,Manufacturer,Caption"
        };
        for row in self.cim_select("Win32_Processor", properties)? {
            apply_processor_row(cpu, &row);
        }
        Ok(())
    }

    fn gather_ram(&self, ctx: &GatherContext<'_>) -> Result<Vec<RamStick>> {
        let properties = if ctx.capabilities.supports_device_properties {
            "ConfiguredClockSpeed,Manufacturer,Capacity,DeviceLocator,PartNumber,FormFactor,BankLabel,Tag"
        } else {
            "Manufacturer,Capacity,DeviceLocator,PartNumber,FormFactor"
        };
        Ok(self
            .cim_select("Win32_PhysicalMemory", properties)?
            .iter()
            .map(parse_memory_row)
            .collect())
    }

    fn gather_disks(&self) -> Result<Vec<Disk>> {
        Ok(self
            .cim_select(
                "Win32_DiskDrive",
                "Model,Size,Caption,DeviceID,Index,InterfaceType,SerialNumber",
            )?
            .iter()
            .map(parse_disk_row)
            .collect())
    }

    fn gather_gpus(&self) -> Result<Vec<Gpu>> {
        Ok(self
            .cim_select(
                "Win32_VideoController",
                "AdapterCompatibility,Caption,Description,@{Name='DriverDate';Expression={ if ($_.DriverDate) { [Management.ManagementDateTimeConverter]::ToDmtfDateTime($_.DriverDate) } }},DriverVersion,Name,Status,DeviceID",
            )?
            .iter()
            .map(parse_video_controller_row)
            .collect())
    }

    fn gather_displays(&self) -> Result<Vec<Display>> {
        let rows = self.query(
            "Get-CimInstance -Namespace root\\wmi -ClassName WmiMonitorID | Select-Object ManufacturerName,UserFriendlyName,SerialNumberID | ConvertTo-Json -Compress",
        )?;
        Ok(rows.iter().filter_map(parse_monitor_row).collect())
    }

    fn gather_mainboard(&self, smbios: &mut SmBios) -> Result<()> {
        for row in self.cim_select("Win32_BaseBoard", "Product,Manufacturer,Version")? {
            smbios.board_name = str_field(&row, "Product");
            smbios.board_vendor = str_field(&row, "Manufacturer");
            smbios.board_version = str_field(&row, "Version");
        }
        for row in self.cim_select("Win32_BIOS", "Name,Manufacturer,Version")? {
            smbios.bios_codename = str_field(&row, "Name");
            smbios.bios_vendor = str_field(&row, "Manufacturer");
            smbios.bios_version = str_field(&row, "Version");
        }
        Ok(())
    }
}

impl<R: CommandRunner> InformationProvider for WindowsProvider<R> {
    fn name(&self) -> &'static str {
        "windows"
    }

    fn available(&self) -> bool {
        cfg!(target_os = "windows")
    }

    fn detect_capabilities(&self) -> PlatformCapabilities {
        let major = match run_powershell(
            &self.runner,
            "(Get-CimInstance -ClassName Win32_OperatingSystem).Version",
        ) {
            Ok(version) => parse_major_version(&version),
            Err(e) => {
                warn!("Could not determine Windows version: {}", e);
                None
            }
        };
        PlatformCapabilities::windows(major)
    }

    fn gather(
        &self,
        category: Category,
        ctx: &GatherContext<'_>,
        info: &mut MachineInformation,
    ) -> Result<()> {
        match category {
            Category::OperatingSystem => self.gather_operating_system(info),
            Category::Cpu => self.gather_cpu(ctx, &mut info.cpu),
            Category::Ram => {
                info.ram_sticks = self.gather_ram(ctx)?;
                Ok(())
            }
            Category::Disks => {
                info.disks = self.gather_disks()?;
                Ok(())
            }
            Category::Gpus => {
                let found = self.gather_gpus()?;
                merge_gpus(&mut info.gpus, found);
                Ok(())
            }
            Category::Displays => {
                info.displays = self.gather_displays()?;
                Ok(())
            }
            Category::Mainboard => self.gather_mainboard(&mut info.smbios),
            Category::Usb => {
                let options = ctx
                    .config
                    .usb
                    .collect_options(ctx.capabilities.supports_device_properties);
                if !options.fetch_properties {
                    debug!("Device properties need Windows 10; USB list will be empty");
                }
                let bus = WindowsPnpBus::new(&self.runner, options.fetch_properties);
                info.usb_devices = gather_usb_devices(&bus, &bus, ctx.resolver, &options)?;
                Ok(())
            }
        }
    }
}

/// Win32_PnPEntity enumeration and device property queries.
///
/// With `prefetch` set, `enumerate` reads the properties of every matching
/// device in the same PowerShell session and `properties` answers from that
/// cache. Devices outside the batch (children reached through lookup) are
/// queried one by one.
pub struct WindowsPnpBus<'a, R: CommandRunner> {
    runner: &'a R,
    prefetch: bool,
    cache: RefCell<HashMap<String, PropertyBag>>,
}

/// `$r.deviceProperties` as KeyName/Data rows, dates in DMTF form
const DEVICE_PROPERTY_ROWS: &str = "@($r.deviceProperties | ForEach-Object { [pscustomobject]@{ KeyName = $_.KeyName; Data = if ($_.Data -is [datetime]) { [Management.ManagementDateTimeConverter]::ToDmtfDateTime($_.Data) } else { $_.Data } } })";

impl<'a, R: CommandRunner> WindowsPnpBus<'a, R> {
    pub fn new(runner: &'a R, prefetch: bool) -> Self {
        Self {
            runner,
            prefetch,
            cache: RefCell::new(HashMap::new()),
        }
    }

    fn device_ids(&self, script: &str) -> Result<Vec<PeripheralEntry>> {
        let raw = run_powershell(self.runner, script)?;
        Ok(json_strings(&raw)?
            .into_iter()
            .map(PeripheralEntry::new)
            .collect())
    }
}

fn device_filter(device_id: &str) -> String {
    ps_quote(&format!("DeviceID='{}'", wql_escape(device_id)))
}

impl<R: CommandRunner> DeviceEnumerator for WindowsPnpBus<'_, R> {
    fn enumerate(&self, prefix: &str) -> Result<Vec<PeripheralEntry>> {
        let pattern = ps_quote(&format!("{prefix}*"));
        if !self.prefetch {
            return self.device_ids(&format!(
                "Get-CimInstance -ClassName Win32_PnPEntity -Property DeviceID | Where-Object {{ $_.DeviceID -like {pattern} }} | Select-Object -ExpandProperty DeviceID | ConvertTo-Json -Compress"
            ));
        }

        let raw = run_powershell(
            self.runner,
            &format!(
                "@(Get-CimInstance -ClassName Win32_PnPEntity | Where-Object {{ $_.DeviceID -like {pattern} }} | ForEach-Object {{ $r = Invoke-CimMethod -InputObject $_ -MethodName GetDeviceProperties; [pscustomobject]@{{ DeviceID = $_.DeviceID; DeviceProperties = {DEVICE_PROPERTY_ROWS} }} }}) | ConvertTo-Json -Compress -Depth 4"
            ),
        )?;
        let batch = parse_device_batch(&raw)?;
        debug!("Read properties of {} PnP devices in one query", batch.len());

        let mut cache = self.cache.borrow_mut();
        let entries = batch
            .into_iter()
            .map(|(device_id, bag)| {
                cache.insert(device_id.clone(), bag);
                PeripheralEntry::new(device_id)
            })
            .collect();
        Ok(entries)
    }

    fn lookup(&self, device_id: &str) -> Result<Vec<PeripheralEntry>> {
        if self.cache.borrow().contains_key(device_id) {
            return Ok(vec![PeripheralEntry::new(device_id)]);
        }
        self.device_ids(&format!(
            "Get-CimInstance -ClassName Win32_PnPEntity -Filter {} | Select-Object -ExpandProperty DeviceID | ConvertTo-Json -Compress",
            device_filter(device_id)
        ))
    }
}

impl<R: CommandRunner> PropertyFetcher for WindowsPnpBus<'_, R> {
    fn properties(&self, entry: &PeripheralEntry) -> Result<PropertyBag> {
        let cached = self.cache.borrow_mut().remove(&entry.device_id);
        if let Some(bag) = cached {
            return Ok(bag);
        }

        trace!("Querying properties of {} on its own", entry.device_id);
        let script = format!(
            "$d = Get-CimInstance -ClassName Win32_PnPEntity -Filter {}; if ($d) {{ $r = Invoke-CimMethod -InputObject $d -MethodName GetDeviceProperties; {DEVICE_PROPERTY_ROWS} | ConvertTo-Json -Compress -Depth 3 }}",
            device_filter(&entry.device_id)
        );
        let raw = run_powershell(self.runner, &script)?;
        parse_device_properties(&entry.device_id, &raw)
    }
}

/// `ConvertTo-Json` emits nothing, one object or an array of objects
pub fn json_rows(raw: &str) -> Result<Vec<Row>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<Value>(raw)? {
        value @ (Value::Object(_) | Value::Array(_)) => Ok(object_rows(value)),
        Value::Null => Ok(Vec::new()),
        other => Err(HwInfoError::Parse(format!(
            "expected JSON object or array, got {}",
            other
        ))),
    }
}

fn object_rows(value: Value) -> Vec<Row> {
    match value {
        Value::Object(row) => vec![row],
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(row) => Some(row),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// A single string or an array of strings
fn json_strings(raw: &str) -> Result<Vec<String>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<Value>(raw)? {
        Value::String(s) => Ok(vec![s]),
        Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect()),
        Value::Null => Ok(Vec::new()),
        other => Err(HwInfoError::Parse(format!("expected device IDs, got {}", other))),
    }
}

/// `[{"KeyName": "...", "Data": ...}, ...]` into a property bag
pub fn parse_device_properties(device_id: &str, raw: &str) -> Result<PropertyBag> {
    Ok(property_bag(device_id, json_rows(raw)?))
}

/// `[{"DeviceID": "...", "DeviceProperties": [...]}, ...]` into one bag per
/// device, in enumeration order
pub fn parse_device_batch(raw: &str) -> Result<Vec<(String, PropertyBag)>> {
    Ok(json_rows(raw)?
        .into_iter()
        .filter_map(|mut row| {
            let device_id = str_field(&row, "DeviceID")?;
            let properties = row
                .remove("DeviceProperties")
                .map(object_rows)
                .unwrap_or_default();
            let bag = property_bag(&device_id, properties);
            Some((device_id, bag))
        })
        .collect())
}

fn property_bag(device_id: &str, rows: Vec<Row>) -> PropertyBag {
    let mut bag = PropertyBag::new();
    for row in rows {
        let Some(key) = str_field(&row, "KeyName") else {
            continue;
        };
        match row.get("Data").and_then(property_value) {
            Some(value) => {
                bag.insert(key, value);
            }
            None => trace!("KeyName {} has no data for device ID {}", key, device_id),
        }
    }
    bag
}

fn property_value(data: &Value) -> Option<PropertyValue> {
    match data {
        Value::String(s) if !s.trim().is_empty() => Some(PropertyValue::Text(s.clone())),
        Value::Number(n) => Some(PropertyValue::Text(n.to_string())),
        Value::Bool(b) => Some(PropertyValue::Text(b.to_string())),
        Value::Array(items) => Some(PropertyValue::List(
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
        )),
        _ => None,
    }
}

/// Trimmed non-empty string; numbers are stringified
fn str_field(row: &Row, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Unsigned value that may arrive as a number or a numeric string
fn u64_field(row: &Row, key: &str) -> Option<u64> {
    match row.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => match s.trim().parse() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring non-numeric {} value '{}'", key, s);
                None
            }
        },
        _ => None,
    }
}

fn u32_field(row: &Row, key: &str) -> Option<u32> {
    u64_field(row, key).and_then(|v| u32::try_from(v).ok())
}

/// Fill CPU fields, only replacing values that are unset or inconsistent
pub fn apply_processor_row(cpu: &mut Cpu, row: &Row) {
    if let Some(name) = str_field(row, "Name") {
        if cpu.name.is_none() || cpu.name == cpu.caption {
            cpu.name = Some(name);
        }
    }
    if cpu.caption.is_none() {
        cpu.caption = str_field(row, "Caption");
    }
    if cpu.vendor.is_none() {
        cpu.vendor = str_field(row, "Manufacturer");
    }

    if let Some(cores) = u32_field(row, "NumberOfEnabledCore") {
        if cpu.physical_cores == 0
            || cpu.physical_cores == cpu.logical_cores
            || (cores != 0 && cores != cpu.physical_cores)
        {
            cpu.physical_cores = cores;
        }
    }

    if let Some(threads) = u32_field(row, "NumberOfLogicalProcessors") {
        if cpu.logical_cores == 0 || (threads != 0 && threads != cpu.logical_cores) {
            cpu.logical_cores = threads;
        }
    }

    if cpu.socket.is_none() {
        cpu.socket = str_field(row, "SocketDesignation");
    }

    if cpu.normal_clock_speed_mhz == 0 {
        cpu.normal_clock_speed_mhz = u32_field(row, "MaxClockSpeed").unwrap_or(0);
    }
}

pub fn parse_memory_row(row: &Row) -> RamStick {
    let capacity = u64_field(row, "Capacity").unwrap_or(0);
    let form_factor = match u64_field(row, "FormFactor") {
        Some(code) => RamFormFactor::from_code(code).unwrap_or_else(|| {
            warn!("Unknown memory form factor code {}", code);
            RamFormFactor::Unknown
        }),
        None => RamFormFactor::Unknown,
    };

    RamStick {
        name: str_field(row, "PartNumber"),
        manufacturer: str_field(row, "Manufacturer"),
        capacity,
        capacity_hrf: format_bytes(capacity),
        speed_mhz: u32_field(row, "ConfiguredClockSpeed").unwrap_or(0),
        device_locator: str_field(row, "DeviceLocator"),
        bank_label: str_field(row, "BankLabel"),
        tag: str_field(row, "Tag"),
        form_factor,
    }
}

pub fn parse_disk_row(row: &Row) -> Disk {
    let capacity = u64_field(row, "Size").unwrap_or(0);
    Disk {
        vendor: None,
        model: str_field(row, "Model"),
        caption: str_field(row, "Caption"),
        capacity,
        capacity_hrf: format_bytes(capacity),
        device_id: str_field(row, "DeviceID"),
        drive_index: u32_field(row, "Index").unwrap_or(0),
        interface_type: str_field(row, "InterfaceType"),
        serial_number: str_field(row, "SerialNumber"),
    }
}

pub fn parse_video_controller_row(row: &Row) -> Gpu {
    Gpu {
        vendor: str_field(row, "AdapterCompatibility"),
        name: str_field(row, "Name"),
        caption: str_field(row, "Caption"),
        description: str_field(row, "Description"),
        driver_date: str_field(row, "DriverDate").map(dmtf_from_json_date),
        driver_version: str_field(row, "DriverVersion"),
        status: str_field(row, "Status"),
        device_id: str_field(row, "DeviceID"),
    }
}

/// `ConvertTo-Json` renders a `[datetime]` as `/Date(1622505600000)/`;
/// anything else passes through untouched
fn dmtf_from_json_date(raw: String) -> String {
    let millis = raw
        .strip_prefix("/Date(")
        .and_then(|rest| rest.strip_suffix(")/"))
        .and_then(|inner| inner.split(|c: char| c == '+' || c == '-').next())
        .and_then(|ms| ms.parse::<i64>().ok());
    match millis.and_then(DateTime::<Utc>::from_timestamp_millis) {
        Some(at) => at.format("%Y%m%d%H%M%S%.6f+000").to_string(),
        None => raw,
    }
}

/// WmiMonitorID strings are arrays of UTF-16 code units padded with NULs.
/// Entries with missing or malformed arrays are skipped.
pub fn parse_monitor_row(row: &Row) -> Option<Display> {
    Some(Display {
        manufacturer: Some(decode_code_units(row.get("ManufacturerName")?)?),
        name: Some(decode_code_units(row.get("UserFriendlyName")?)?),
        serial_number: Some(decode_code_units(row.get("SerialNumberID")?)?),
    })
}

fn decode_code_units(value: &Value) -> Option<String> {
    let units = value
        .as_array()?
        .iter()
        .map(|unit| unit.as_u64().and_then(|u| u16::try_from(u).ok()))
        .collect::<Option<Vec<u16>>>()?;
    let text = String::from_utf16(&units).ok()?;
    Some(text.chars().filter(|c| *c != '\0').collect())
}
