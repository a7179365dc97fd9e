// Gateway config document on disk: restore from durable backup, initialize, load, save, back up.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use gateboot_common::document::ConfigDocument;
use serde::Serialize;
use tracing::{info, warn};

use crate::best_effort::BestEffort;
use crate::fsutil::{copy_tree, write_atomic, Collision, CopyReport};
use crate::layout::Layout;
use crate::sync_marker::{durable_is_newer, read_marker, write_marker};

/// Where the config document in effect for this boot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    RestoredFromDurable,
    KeptLocal,
    InitializedFromTemplate,
    InitializedFromDefault,
}

/// Restore-or-initialize the local config document.
pub fn reconcile_config(layout: &Layout) -> Result<ConfigSource> {
    let local_exists = layout.config_path.is_file();
    let backup_exists = layout.is_durable() && layout.backup_config_path().is_file();

    let should_restore = match (local_exists, backup_exists) {
        (_, false) => false,
        (false, true) => true,
        (true, true) => {
            let local = read_marker(&layout.local_marker());
            let durable = read_marker(&layout.durable_marker());
            let newer = durable_is_newer(local, durable);
            info!(?local, ?durable, restore = newer, "compared sync markers");
            newer
        }
    };

    if should_restore {
        let restored = BestEffort::run("config-restore", || restore_from_backup(layout));
        if restored.is_done() && layout.config_path.is_file() {
            info!(from = %layout.backup_dir().display(), "restored config from durable backup");
            return Ok(ConfigSource::RestoredFromDurable);
        }
    }

    if layout.config_path.is_file() {
        return Ok(ConfigSource::KeptLocal);
    }

    if layout.template_path.is_file() {
        let template = fs::read(&layout.template_path).with_context(|| {
            format!("failed to read template `{}`", layout.template_path.display())
        })?;
        write_atomic(&layout.config_path, &template)?;
        info!(template = %layout.template_path.display(), "initialized config from template");
        return Ok(ConfigSource::InitializedFromTemplate);
    }

    let workspace = layout.local_workspace.to_string_lossy();
    save_document(&layout.config_path, &ConfigDocument::initial(&workspace))?;
    info!(path = %layout.config_path.display(), "initialized config with defaults");
    Ok(ConfigSource::InitializedFromDefault)
}

fn restore_from_backup(layout: &Layout) -> Result<CopyReport> {
    let report = copy_tree(&layout.backup_dir(), &layout.config_dir, Collision::Overwrite)
        .with_context(|| format!("failed to copy `{}`", layout.backup_dir().display()))?;
    for (path, error) in &report.failed {
        warn!(path = %path.display(), error = %error, "could not restore entry");
    }
    let durable_marker = layout.durable_marker();
    if durable_marker.is_file() {
        fs::copy(&durable_marker, layout.local_marker()).context("failed to copy sync marker")?;
    }
    Ok(report)
}

/// Load the document, treating a parse failure as an empty document.
/// Returns `None` when the file does not exist.
pub fn load_document(path: &Path) -> Result<Option<ConfigDocument>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(error) => {
            return Err(error).with_context(|| format!("failed to read `{}`", path.display()));
        }
    };
    let (doc, error) = ConfigDocument::parse_lenient(&text);
    if let Some(error) = error {
        warn!(
            path = %path.display(),
            error = %error,
            "config unreadable, starting from empty document"
        );
    }
    Ok(Some(doc))
}

pub fn save_document(path: &Path, doc: &ConfigDocument) -> Result<()> {
    write_atomic(path, doc.to_pretty_string().as_bytes())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupReport {
    pub copied: usize,
    pub synced_at: DateTime<Utc>,
}

/// Copy the local config directory to durable storage and stamp both markers.
pub fn backup_config(layout: &Layout, now: DateTime<Utc>) -> Result<BackupReport> {
    if !layout.is_durable() {
        bail!("durable storage is not mounted; refusing to back up config");
    }
    if !layout.config_path.is_file() {
        bail!("no local config at `{}` to back up", layout.config_path.display());
    }

    let report = copy_tree(&layout.config_dir, &layout.backup_dir(), Collision::Overwrite)
        .with_context(|| format!("failed to copy `{}`", layout.config_dir.display()))?;
    if let Some((path, error)) = report.failed.first() {
        bail!(
            "backup incomplete: {} entries failed, first `{}`: {error}",
            report.failed.len(),
            path.display()
        );
    }

    write_marker(&layout.durable_marker(), now)?;
    write_marker(&layout.local_marker(), now)?;
    info!(copied = report.copied, at = %now, "backed up config to durable storage");
    Ok(BackupReport { copied: report.copied, synced_at: now })
}
