// CLI subcommand dispatch.

use std::path::Path;

use anyhow::Context as _;
use clap::Subcommand;
use gateboot_reconciler::settings::BootSettings;

use crate::output::OutputFormat;

pub mod backup;
pub mod doctor;
pub mod overlay;
pub mod run;

#[derive(Subcommand)]
pub enum Command {
    /// Reconcile storage and config, then exec the gateway
    Run(run::RunArgs),
    /// Print the config document with the environment overlay applied
    Overlay(overlay::OverlayArgs),
    /// Check storage, config and gateway health without changing anything
    Doctor(doctor::DoctorArgs),
    /// Copy the local config directory to durable storage
    Backup(backup::BackupArgs),
}

pub fn run(cmd: Command, settings_path: Option<&Path>, format: OutputFormat) -> anyhow::Result<()> {
    let settings = BootSettings::load(settings_path).context("failed to load boot settings")?;
    match cmd {
        Command::Run(args) => run::run(args, &settings, format),
        Command::Overlay(args) => overlay::run(args, &settings),
        Command::Doctor(args) => doctor::run(args, &settings, format),
        Command::Backup(args) => backup::run(args, &settings, format),
    }
}
