// `gateboot backup`: push the local config directory to durable storage.

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use gateboot_reconciler::config::{backup_config, BackupReport};
use gateboot_reconciler::layout::Layout;
use gateboot_reconciler::settings::BootSettings;

use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct BackupArgs {}

pub fn run(_args: BackupArgs, settings: &BootSettings, format: OutputFormat) -> Result<()> {
    let layout = Layout::resolve(&settings.paths);
    let report = backup_config(&layout, Utc::now())?;
    output::print_output(format, &report, |r: &BackupReport| {
        format!(
            "Backed up {} entries to {} at {}",
            r.copied,
            layout.backup_dir().display(),
            r.synced_at.to_rfc3339()
        )
    })?;
    Ok(())
}
