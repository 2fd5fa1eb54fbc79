//! hwinfo Configuration
//!
//! Config file: ~/.config/hwinfo/config.toml or /etc/hwinfo/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::usb::CollectOptions;

/// USB enumeration settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsbConfig {
    /// Device ID prefix selecting USB entries
    #[serde(default = "default_device_prefix")]
    pub device_prefix: String,

    /// Explicit usb.ids file (default: first system copy found)
    #[serde(default)]
    pub vendor_db_path: Option<PathBuf>,

    /// Follow child device references
    #[serde(default = "default_true")]
    pub expand_children: bool,
}

fn default_device_prefix() -> String {
    "USB".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for UsbConfig {
    fn default() -> Self {
        Self {
            device_prefix: default_device_prefix(),
            vendor_db_path: None,
            expand_children: true,
        }
    }
}

impl UsbConfig {
    pub fn collect_options(&self, fetch_properties: bool) -> CollectOptions {
        CollectOptions {
            prefix: self.device_prefix.clone(),
            expand_children: self.expand_children,
            fetch_properties,
        }
    }
}

/// Which categories an inventory pass gathers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatherConfig {
    #[serde(default = "default_true")]
    pub cpu: bool,
    #[serde(default = "default_true")]
    pub ram: bool,
    #[serde(default = "default_true")]
    pub disks: bool,
    #[serde(default = "default_true")]
    pub gpus: bool,
    #[serde(default = "default_true")]
    pub displays: bool,
    #[serde(default = "default_true")]
    pub mainboard: bool,
    #[serde(default = "default_true")]
    pub usb: bool,
}

impl Default for GatherConfig {
    fn default() -> Self {
        Self {
            cpu: true,
            ram: true,
            disks: true,
            gpus: true,
            displays: true,
            mainboard: true,
            usb: true,
        }
    }
}

impl GatherConfig {
    /// Nothing but `category`
    pub fn only(category: &str) -> Result<Self> {
        let mut gather = Self {
            cpu: false,
            ram: false,
            disks: false,
            gpus: false,
            displays: false,
            mainboard: false,
            usb: false,
        };
        match category {
            "cpu" => gather.cpu = true,
            "ram" => gather.ram = true,
            "disks" => gather.disks = true,
            "gpus" => gather.gpus = true,
            "displays" => gather.displays = true,
            "mainboard" => gather.mainboard = true,
            "usb" => gather.usb = true,
            "os" => {}
            _ => anyhow::bail!("Unknown category: '{}'", category),
        }
        Ok(gather)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// tracing filter level used when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Main hwinfo configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HwInfoConfig {
    #[serde(default)]
    pub usb: UsbConfig,

    #[serde(default)]
    pub gather: GatherConfig,

    #[serde(default)]
    pub log: LogConfig,
}

impl HwInfoConfig {
    /// Get default user config path: ~/.config/hwinfo/config.toml
    pub fn user_config_path() -> Result<PathBuf> {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            return Ok(PathBuf::from(xdg).join("hwinfo").join("config.toml"));
        }

        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .context("Cannot determine home directory")?;

        Ok(Path::new(&home)
            .join(".config")
            .join("hwinfo")
            .join("config.toml"))
    }

    /// Get system config path: /etc/hwinfo/config.toml
    pub fn system_config_path() -> PathBuf {
        PathBuf::from("/etc/hwinfo/config.toml")
    }

    /// Load configuration
    ///
    /// Priority:
    /// 1. Explicit path (must exist)
    /// 2. User config (~/.config/hwinfo/config.toml)
    /// 3. System config (/etc/hwinfo/config.toml)
    /// 4. Defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_path(path);
        }

        if let Ok(user_path) = Self::user_config_path() {
            if user_path.exists() {
                return Self::load_from_path(&user_path);
            }
        }

        let system_path = Self::system_config_path();
        if system_path.exists() {
            return Self::load_from_path(&system_path);
        }

        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: HwInfoConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = HwInfoConfig::default();
        assert_eq!(config.usb.device_prefix, "USB");
        assert!(config.usb.expand_children);
        assert!(config.usb.vendor_db_path.is_none());
        assert!(config.gather.usb && config.gather.cpu && config.gather.displays);
        assert_eq!(config.log.level, "warn");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[usb]").unwrap();
        writeln!(file, "vendor_db_path = \"/opt/usb.ids\"").unwrap();
        writeln!(file, "[gather]").unwrap();
        writeln!(file, "displays = false").unwrap();

        let config = HwInfoConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.usb.device_prefix, "USB");
        assert_eq!(
            config.usb.vendor_db_path.as_deref(),
            Some(Path::new("/opt/usb.ids"))
        );
        assert!(!config.gather.displays);
        assert!(config.gather.usb);
        assert_eq!(config.log.level, "warn");
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[usb").unwrap();
        assert!(HwInfoConfig::load(Some(file.path())).is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        assert!(HwInfoConfig::load(Some(Path::new("/nonexistent/hwinfo.toml"))).is_err());
    }

    #[test]
    fn test_gather_only() {
        let gather = GatherConfig::only("usb").unwrap();
        assert!(gather.usb);
        assert!(!gather.cpu && !gather.ram && !gather.disks);

        let os_only = GatherConfig::only("os").unwrap();
        assert!(!os_only.usb && !os_only.mainboard);

        assert!(GatherConfig::only("floppy").is_err());
    }

    #[test]
    fn test_collect_options() {
        let usb = UsbConfig {
            device_prefix: "USB".to_string(),
            vendor_db_path: None,
            expand_children: false,
        };
        let options = usb.collect_options(true);
        assert_eq!(options.prefix, "USB");
        assert!(!options.expand_children);
        assert!(options.fetch_properties);
    }
}
