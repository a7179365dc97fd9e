// Resolved storage layout: durable mount or ephemeral fallback.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::warn;

use crate::settings::PathSettings;

const WORKSPACE_DIR: &str = "workspace";
const CONFIG_BACKUP_DIR: &str = "clawdbot";
const HOOKS_DIR: &str = "hooks";
const HOOK_FILE: &str = "pre-start.sh";
pub const SYNC_MARKER: &str = ".last-sync";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    Durable,
    /// Durable mount missing; state lives in a local directory and is lost
    /// when the container goes away.
    Ephemeral,
}

/// Every path the boot sequence touches, after mount detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub mode: StorageMode,
    /// Durable mount, or the ephemeral root in fallback mode.
    pub storage_root: PathBuf,
    pub config_dir: PathBuf,
    pub config_path: PathBuf,
    pub template_path: PathBuf,
    pub local_workspace: PathBuf,
}

impl Layout {
    /// Detect whether the durable mount is usable and resolve paths accordingly.
    pub fn resolve(paths: &PathSettings) -> Self {
        let mode = if durable_mount_present(paths) {
            StorageMode::Durable
        } else {
            warn!(
                durable_root = %paths.durable_root.display(),
                ephemeral_root = %paths.ephemeral_root.display(),
                "durable storage not mounted, state will not survive a restart"
            );
            StorageMode::Ephemeral
        };
        Self::with_mode(paths, mode)
    }

    pub fn with_mode(paths: &PathSettings, mode: StorageMode) -> Self {
        let storage_root = match mode {
            StorageMode::Durable => paths.durable_root.clone(),
            StorageMode::Ephemeral => paths.ephemeral_root.clone(),
        };
        Self {
            mode,
            storage_root,
            config_dir: paths.config_dir.clone(),
            config_path: paths.config_path(),
            template_path: paths.template.clone(),
            local_workspace: paths.local_workspace.clone(),
        }
    }

    pub fn durable_workspace(&self) -> PathBuf {
        self.storage_root.join(WORKSPACE_DIR)
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.storage_root.join(CONFIG_BACKUP_DIR)
    }

    /// Backed-up config document, mirroring the local file name.
    pub fn backup_config_path(&self) -> PathBuf {
        match self.config_path.file_name() {
            Some(name) => self.backup_dir().join(name),
            None => self.backup_dir(),
        }
    }

    pub fn local_marker(&self) -> PathBuf {
        self.config_dir.join(SYNC_MARKER)
    }

    pub fn durable_marker(&self) -> PathBuf {
        self.storage_root.join(SYNC_MARKER)
    }

    pub fn hook_path(&self) -> PathBuf {
        self.storage_root.join(HOOKS_DIR).join(HOOK_FILE)
    }

    pub fn is_durable(&self) -> bool {
        self.mode == StorageMode::Durable
    }
}

fn durable_mount_present(paths: &PathSettings) -> bool {
    if !paths.durable_root.is_dir() {
        return false;
    }
    if !paths.require_mountpoint {
        return true;
    }
    match fs::read_to_string(&paths.mounts_table) {
        Ok(table) => is_listed_mount(&table, &paths.durable_root),
        Err(error) => {
            warn!(
                mounts_table = %paths.mounts_table.display(),
                error = %error,
                "could not read mount table"
            );
            false
        }
    }
}

/// Whether `mount_point` appears as the target column of a mount table
/// in `/proc/mounts` format.
pub fn is_listed_mount(table: &str, mount_point: &Path) -> bool {
    let wanted = mount_point.to_string_lossy();
    let wanted = wanted.trim_end_matches('/');
    table
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .map(unescape_mount_field)
        .any(|target| target.trim_end_matches('/') == wanted)
}

/// Decode the octal escapes (`\040` for space, ...) used in mount tables.
fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\'
            && i + 4 <= bytes.len()
            && bytes[i + 1..i + 4].iter().all(u8::is_ascii_digit)
        {
            let digits = std::str::from_utf8(&bytes[i + 1..i + 4]).unwrap_or("0");
            if let Ok(byte) = u8::from_str_radix(digits, 8) {
                out.push(byte);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
