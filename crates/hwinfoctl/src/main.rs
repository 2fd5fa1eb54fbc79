//! hwinfoctl - print a hardware inventory of this machine
//!
//! Logs go to stderr; stdout carries only the report (text or --json).

mod cli;
mod display;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};

use hwinfo_common::{GatherConfig, HwInfoConfig, MachineInformationGatherer};

use cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = HwInfoConfig::load(cli.config.as_deref())?;
    logging::init(&config.log.level, cli.verbose);

    if let Some(path) = &cli.vendor_db {
        config.usb.vendor_db_path = Some(path.clone());
    }
    if cli.no_children {
        config.usb.expand_children = false;
    }
    if let Some(category) = cli.section.category() {
        config.gather = GatherConfig::only(category)?;
    }
    debug!("Effective config: {:?}", config);

    info!("hwinfoctl v{} starting", env!("CARGO_PKG_VERSION"));
    let info = MachineInformationGatherer::new(config).gather();

    if cli.json {
        let json = serde_json::to_string_pretty(&info).context("Failed to serialize snapshot")?;
        println!("{}", json);
    } else {
        display::print_snapshot(&info, cli.section);
    }

    Ok(())
}
