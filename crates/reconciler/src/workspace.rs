// Workspace reconciliation: make the local workspace path a symlink into durable storage.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::best_effort::BestEffort;
use crate::fsutil::{copy_tree, Collision, CopyReport};
use crate::layout::{Layout, StorageMode};

/// What reconciliation did to the local workspace path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WorkspaceAction {
    /// The link already pointed at the durable workspace.
    AlreadyLinked,
    /// Nothing existed at the local path; a link was created.
    Linked,
    /// A link to another target was replaced.
    Relinked { previous: PathBuf },
    /// A stale non-directory entry was removed before linking.
    ReplacedStale,
    /// A real directory was merged into durable storage and replaced by a link.
    Migrated { copied: usize, skipped: usize, set_aside: Option<PathBuf> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceReport {
    pub mode: StorageMode,
    pub target: PathBuf,
    #[serde(flatten)]
    pub action: WorkspaceAction,
}

/// Bring the local workspace path into agreement with durable storage.
///
/// Idempotent: with the link already in place this only checks it.
pub fn reconcile_workspace(layout: &Layout) -> Result<WorkspaceReport> {
    let local = &layout.local_workspace;
    let durable = layout.durable_workspace();

    fs::create_dir_all(&durable).with_context(|| {
        format!("failed to create durable workspace `{}`", durable.display())
    })?;

    let action = match fs::symlink_metadata(local) {
        Ok(meta) if meta.file_type().is_symlink() => {
            let current = fs::read_link(local)
                .with_context(|| format!("failed to read link `{}`", local.display()))?;
            if current == durable {
                WorkspaceAction::AlreadyLinked
            } else {
                fs::remove_file(local)
                    .with_context(|| format!("failed to remove link `{}`", local.display()))?;
                info!(previous = %current.display(), "replacing workspace link with wrong target");
                link(local, &durable)?;
                WorkspaceAction::Relinked { previous: current }
            }
        }
        Ok(meta) if meta.is_dir() => {
            let action = migrate_directory(local, &durable)?;
            link(local, &durable)?;
            action
        }
        Ok(_) => {
            fs::remove_file(local)
                .with_context(|| format!("failed to remove stale entry `{}`", local.display()))?;
            link(local, &durable)?;
            WorkspaceAction::ReplacedStale
        }
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            link(local, &durable)?;
            WorkspaceAction::Linked
        }
        Err(error) => {
            return Err(error).with_context(|| format!("failed to inspect `{}`", local.display()));
        }
    };

    info!(
        local = %local.display(),
        target = %durable.display(),
        mode = ?layout.mode,
        action = ?action,
        "workspace reconciled"
    );
    Ok(WorkspaceReport { mode: layout.mode, target: durable, action })
}

/// Merge a pre-existing local directory into durable storage (existing
/// durable files win), then clear the local path.
///
/// When some entries could not be copied the directory is moved aside
/// instead of deleted.
fn migrate_directory(local: &Path, durable: &Path) -> Result<WorkspaceAction> {
    let copy = BestEffort::run("workspace-migrate", || {
        copy_tree(local, durable, Collision::KeepExisting)
    });
    let report = match copy {
        BestEffort::Done(report) => report,
        BestEffort::Failed { reason, .. } => CopyReport {
            failed: vec![(local.to_path_buf(), reason)],
            ..CopyReport::default()
        },
    };

    let set_aside = if report.is_complete() {
        fs::remove_dir_all(local).with_context(|| {
            format!("failed to remove migrated workspace `{}`", local.display())
        })?;
        None
    } else {
        let aside = set_aside_path(local);
        warn!(
            failed = report.failed.len(),
            kept_at = %aside.display(),
            "workspace migration incomplete, keeping local copy"
        );
        fs::rename(local, &aside).with_context(|| {
            format!("failed to move `{}` to `{}`", local.display(), aside.display())
        })?;
        Some(aside)
    };

    info!(copied = report.copied, skipped = report.skipped, "migrated local workspace");
    Ok(WorkspaceAction::Migrated { copied: report.copied, skipped: report.skipped, set_aside })
}

fn set_aside_path(local: &Path) -> PathBuf {
    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%SZ");
    let mut name = local.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".unmigrated-{stamp}"));
    local.with_file_name(name)
}

fn link(local: &Path, durable: &Path) -> Result<()> {
    if let Some(parent) = local.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create `{}`", parent.display()))?;
    }
    symlink_dir(durable, local).with_context(|| {
        format!("failed to link `{}` -> `{}`", local.display(), durable.display())
    })
}

#[cfg(unix)]
fn symlink_dir(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn symlink_dir(target: &Path, link: &Path) -> io::Result<()> {
    let _ = (target, link);
    Err(io::Error::new(io::ErrorKind::Unsupported, "symlinks require a unix host"))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::settings::PathSettings;
    use tempfile::TempDir;

    fn layout_in(tmp: &TempDir) -> Layout {
        let paths = PathSettings {
            config_dir: tmp.path().join("home/.clawdbot"),
            local_workspace: tmp.path().join("home/clawd"),
            durable_root: tmp.path().join("durable"),
            ephemeral_root: tmp.path().join("ephemeral"),
            ..PathSettings::default()
        };
        Layout::with_mode(&paths, StorageMode::Durable)
    }

    #[test]
    fn creates_link_when_nothing_exists() {
        let tmp = TempDir::new().unwrap();
        let layout = layout_in(&tmp);

        let report = reconcile_workspace(&layout).unwrap();

        assert_eq!(report.action, WorkspaceAction::Linked);
        assert_eq!(fs::read_link(&layout.local_workspace).unwrap(), layout.durable_workspace());
    }

    #[test]
    fn second_run_is_a_no_op() {
        let tmp = TempDir::new().unwrap();
        let layout = layout_in(&tmp);

        reconcile_workspace(&layout).unwrap();
        let report = reconcile_workspace(&layout).unwrap();

        assert_eq!(report.action, WorkspaceAction::AlreadyLinked);
    }

    #[test]
    fn wrong_target_is_relinked() {
        let tmp = TempDir::new().unwrap();
        let layout = layout_in(&tmp);
        let elsewhere = tmp.path().join("elsewhere");
        fs::create_dir_all(&elsewhere).unwrap();
        fs::create_dir_all(layout.local_workspace.parent().unwrap()).unwrap();
        std::os::unix::fs::symlink(&elsewhere, &layout.local_workspace).unwrap();

        let report = reconcile_workspace(&layout).unwrap();

        assert_eq!(report.action, WorkspaceAction::Relinked { previous: elsewhere.clone() });
        assert_eq!(fs::read_link(&layout.local_workspace).unwrap(), layout.durable_workspace());
        assert!(elsewhere.exists());
    }

    #[test]
    fn stale_file_is_replaced() {
        let tmp = TempDir::new().unwrap();
        let layout = layout_in(&tmp);
        fs::create_dir_all(layout.local_workspace.parent().unwrap()).unwrap();
        fs::write(&layout.local_workspace, "junk").unwrap();

        let report = reconcile_workspace(&layout).unwrap();

        assert_eq!(report.action, WorkspaceAction::ReplacedStale);
        assert!(fs::symlink_metadata(&layout.local_workspace).unwrap().file_type().is_symlink());
    }

    #[test]
    fn broken_link_to_durable_path_is_kept() {
        let tmp = TempDir::new().unwrap();
        let layout = layout_in(&tmp);
        fs::create_dir_all(layout.local_workspace.parent().unwrap()).unwrap();
        std::os::unix::fs::symlink(layout.durable_workspace(), &layout.local_workspace).unwrap();

        let report = reconcile_workspace(&layout).unwrap();

        assert_eq!(report.action, WorkspaceAction::AlreadyLinked);
        assert!(layout.durable_workspace().is_dir());
    }

    #[test]
    fn set_aside_name_keeps_original_prefix() {
        let aside = set_aside_path(Path::new("/root/clawd"));
        let name = aside.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("clawd.unmigrated-"), "{name}");
        assert_eq!(aside.parent(), Some(Path::new("/root")));
    }
}
