//! Platform capabilities
//!
//! Determined once per inventory pass and threaded into every gatherer.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    Windows,
    Linux,
    #[default]
    Other,
}

impl PlatformKind {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            PlatformKind::Windows
        } else if cfg!(target_os = "linux") {
            PlatformKind::Linux
        } else {
            PlatformKind::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformKind::Windows => "windows",
            PlatformKind::Linux => "linux",
            PlatformKind::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformCapabilities {
    pub os: PlatformKind,
    pub os_major_version: Option<u32>,
    /// Per-device property queries (and the extended CPU/RAM field sets)
    /// are available
    pub supports_device_properties: bool,
}

impl PlatformCapabilities {
    /// Windows gains `Win32_PnPEntity.GetDeviceProperties` with major version 10
    pub fn windows(os_major_version: Option<u32>) -> Self {
        Self {
            os: PlatformKind::Windows,
            os_major_version,
            supports_device_properties: os_major_version.is_some_and(|major| major >= 10),
        }
    }

    pub fn linux(kernel_major_version: Option<u32>) -> Self {
        Self {
            os: PlatformKind::Linux,
            os_major_version: kernel_major_version,
            supports_device_properties: true,
        }
    }
}

/// Leading numeric component of a dotted version ("10.0.19045" -> 10)
pub fn parse_major_version(version: &str) -> Option<u32> {
    version
        .trim()
        .split(['.', '-', ' '])
        .next()
        .and_then(|major| major.parse().ok())
}
