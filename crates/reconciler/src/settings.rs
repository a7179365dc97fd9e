// Boot settings: where things live on disk and which gateway to hand off to.
//
// Settings file: `/etc/gateboot/boot.toml`, overridable with `GATEBOOT_SETTINGS`.
// Every field has a default, so a missing file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming an alternate settings file.
pub const SETTINGS_ENV: &str = "GATEBOOT_SETTINGS";
/// Settings file consulted when neither a flag nor `GATEBOOT_SETTINGS` is given.
pub const DEFAULT_SETTINGS_PATH: &str = "/etc/gateboot/boot.toml";

fn home() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("/root"))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
#[derive(Default)]
pub struct BootSettings {
    pub paths: PathSettings,
    pub gateway: GatewaySettings,
    pub hook: HookSettings,
}

impl BootSettings {
    /// Load from an explicit path, else `GATEBOOT_SETTINGS`, else the default
    /// location. A missing file yields defaults; a malformed one is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self, SettingsError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => std::env::var_os(SETTINGS_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_PATH)),
        };
        match Self::load_from(&path) {
            Err(SettingsError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no settings file, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path).map_err(SettingsError::Io)?;
        toml::from_str(&contents).map_err(SettingsError::Parse)
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(SettingsError::Io)?;
        }
        let contents = toml::to_string_pretty(self).map_err(SettingsError::Serialize)?;
        std::fs::write(path, contents).map_err(SettingsError::Io)
    }
}

/// Local and durable filesystem locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathSettings {
    /// Gateway config directory (defaults to `~/.clawdbot`).
    pub config_dir: PathBuf,
    /// File name of the config document inside `config_dir`.
    pub config_file: String,
    /// Template used when neither local config nor backup exist.
    pub template: PathBuf,
    /// Workspace path the gateway writes to (defaults to `~/clawd`).
    pub local_workspace: PathBuf,
    /// Durable storage mount point.
    pub durable_root: PathBuf,
    /// Used in place of `durable_root` when the mount is absent.
    pub ephemeral_root: PathBuf,
    /// Only accept `durable_root` when it appears in `mounts_table`.
    pub require_mountpoint: bool,
    pub mounts_table: PathBuf,
    /// Lock held for the duration of a boot.
    pub boot_lock: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        let home = home();
        Self {
            config_dir: home.join(".clawdbot"),
            config_file: "clawdbot.json".into(),
            template: home.join(".clawdbot-templates").join("moltbot.json.template"),
            local_workspace: home.join("clawd"),
            durable_root: PathBuf::from("/data/moltbot"),
            ephemeral_root: PathBuf::from("/tmp/gateboot-ephemeral"),
            require_mountpoint: true,
            mounts_table: PathBuf::from("/proc/self/mounts"),
            boot_lock: PathBuf::from("/tmp/gateboot.lock"),
        }
    }
}

impl PathSettings {
    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(&self.config_file)
    }
}

/// The gateway process this boot hands off to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GatewaySettings {
    /// Program to exec (looked up on `PATH` when not absolute).
    pub binary: PathBuf,
    /// `--bind` value passed to the gateway.
    pub bind: String,
    /// Lock files left behind by a gateway that did not shut down cleanly.
    /// Relative paths are resolved against the config directory.
    pub stale_locks: Vec<PathBuf>,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("clawdbot"),
            bind: "lan".into(),
            stale_locks: vec![
                PathBuf::from("/tmp/clawdbot-gateway.lock"),
                PathBuf::from("gateway.lock"),
            ],
        }
    }
}

impl GatewaySettings {
    /// Command-line fragment identifying a running gateway, e.g. `clawdbot gateway`.
    pub fn process_pattern(&self) -> String {
        let name = self
            .binary
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.binary.display().to_string());
        format!("{name} gateway")
    }
}

/// How the durable pre-start hook is run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HookSettings {
    /// Interpreter the hook file is passed to.
    pub shell: PathBuf,
}

impl Default for HookSettings {
    fn default() -> Self {
        Self { shell: PathBuf::from("/bin/sh") }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings I/O error: {0}")]
    Io(std::io::Error),
    #[error("settings parse error: {0}")]
    Parse(toml::de::Error),
    #[error("settings serialize error: {0}")]
    Serialize(toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_point_at_home_and_data_mount() {
        let settings = BootSettings::default();
        assert!(settings.paths.config_dir.ends_with(".clawdbot"));
        assert!(settings.paths.local_workspace.ends_with("clawd"));
        assert_eq!(settings.paths.durable_root, PathBuf::from("/data/moltbot"));
        assert!(settings.paths.config_path().ends_with(".clawdbot/clawdbot.json"));
        assert_eq!(settings.gateway.bind, "lan");
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let settings: BootSettings = toml::from_str(
            r#"
[paths]
durable_root = "/mnt/r2"
require_mountpoint = false

[gateway]
binary = "/usr/local/bin/clawdbot"
"#,
        )
        .unwrap();
        assert_eq!(settings.paths.durable_root, PathBuf::from("/mnt/r2"));
        assert!(!settings.paths.require_mountpoint);
        assert_eq!(settings.paths.config_file, "clawdbot.json");
        assert_eq!(settings.gateway.process_pattern(), "clawdbot gateway");
        assert_eq!(settings.gateway.stale_locks.len(), 2);
    }

    #[test]
    fn roundtrip_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("boot.toml");
        let mut settings = BootSettings::default();
        settings.paths.ephemeral_root = dir.path().join("eph");
        settings.save_to(&path).unwrap();
        assert_eq!(BootSettings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn missing_explicit_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let loaded = BootSettings::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(loaded, BootSettings::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("boot.toml");
        std::fs::write(&path, "[paths\nbroken").unwrap();
        assert!(matches!(BootSettings::load(Some(&path)), Err(SettingsError::Parse(_))));
    }
}
