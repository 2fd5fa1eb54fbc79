//! Command line definition

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "hwinfoctl")]
#[command(about = "Hardware inventory - OS, CPU, memory, disks, GPUs, monitors, mainboard, USB", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (default: ~/.config/hwinfo/config.toml, then /etc/hwinfo/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// usb.ids file used to name USB vendors and products
    #[arg(long, value_name = "PATH")]
    pub vendor_db: Option<PathBuf>,

    /// Do not follow USB child devices
    #[arg(long)]
    pub no_children: bool,

    /// Emit the snapshot as JSON
    #[arg(long)]
    pub json: bool,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// What to gather
    #[arg(value_enum, default_value_t = Section::All)]
    pub section: Section,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Section {
    All,
    Os,
    Cpu,
    Ram,
    Disks,
    Gpus,
    Displays,
    Mainboard,
    Usb,
}

impl Section {
    /// Category name understood by `GatherConfig::only`, `None` for everything
    pub fn category(&self) -> Option<&'static str> {
        match self {
            Section::All => None,
            Section::Os => Some("os"),
            Section::Cpu => Some("cpu"),
            Section::Ram => Some("ram"),
            Section::Disks => Some("disks"),
            Section::Gpus => Some("gpus"),
            Section::Displays => Some("displays"),
            Section::Mainboard => Some("mainboard"),
            Section::Usb => Some("usb"),
        }
    }
}
