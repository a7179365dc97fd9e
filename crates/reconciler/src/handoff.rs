// Final handoff: clear stale gateway locks and replace this process with the gateway.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use gateboot_common::document::GATEWAY_PORT;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::settings::GatewaySettings;

#[derive(Debug, Error)]
pub enum HandoffError {
    #[error("failed to exec gateway `{program}`: {source}")]
    Exec {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// The gateway command line this boot ends in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandoffPlan {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Whether `--token` was passed; the token itself is never logged.
    pub token_auth: bool,
}

impl HandoffPlan {
    /// `<binary> gateway --port 18789 --verbose --allow-unconfigured --bind <bind> [--token <t>]`.
    ///
    /// Without a token the gateway falls back to device pairing.
    pub fn new(gateway: &GatewaySettings, token: Option<&str>) -> Self {
        let mut args = vec![
            "gateway".to_string(),
            "--port".to_string(),
            GATEWAY_PORT.to_string(),
            "--verbose".to_string(),
            "--allow-unconfigured".to_string(),
            "--bind".to_string(),
            gateway.bind.clone(),
        ];
        if let Some(token) = token {
            args.push("--token".to_string());
            args.push(token.to_string());
        }
        Self { program: gateway.binary.clone(), args, token_auth: token.is_some() }
    }

    /// Arguments with the token value masked, for logs and dry runs.
    pub fn redacted_args(&self) -> Vec<String> {
        let mut redacted = self.args.clone();
        if let Some(pos) = redacted.iter().position(|a| a == "--token") {
            if let Some(value) = redacted.get_mut(pos + 1) {
                *value = "<redacted>".to_string();
            }
        }
        redacted
    }

    /// Replace the current process image. Only returns on failure.
    #[cfg(unix)]
    pub fn exec(&self) -> HandoffError {
        use std::os::unix::process::CommandExt;

        info!(
            program = %self.program.display(),
            args = ?self.redacted_args(),
            auth = if self.token_auth { "token" } else { "device-pairing" },
            "handing off to gateway"
        );
        let source = Command::new(&self.program).args(&self.args).exec();
        HandoffError::Exec { program: self.program.display().to_string(), source }
    }

    #[cfg(not(unix))]
    pub fn exec(&self) -> HandoffError {
        HandoffError::Exec {
            program: self.program.display().to_string(),
            source: io::Error::new(io::ErrorKind::Unsupported, "exec requires a unix host"),
        }
    }

    pub fn command_line(&self) -> Vec<OsString> {
        std::iter::once(self.program.clone().into_os_string())
            .chain(self.redacted_args().into_iter().map(OsString::from))
            .collect()
    }
}

/// Remove lock files a previous gateway left behind. Relative entries are
/// resolved against `config_dir`. Returns the paths actually removed.
pub fn clear_stale_locks(locks: &[PathBuf], config_dir: &Path) -> Vec<PathBuf> {
    let mut removed = Vec::new();
    for lock in locks {
        let path = if lock.is_absolute() { lock.clone() } else { config_dir.join(lock) };
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(path = %path.display(), "removed stale gateway lock");
                removed.push(path);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove stale lock"),
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn plan_without_token_uses_fixed_args() {
        let plan = HandoffPlan::new(&GatewaySettings::default(), None);
        assert_eq!(plan.program, PathBuf::from("clawdbot"));
        assert_eq!(
            plan.args,
            ["gateway", "--port", "18789", "--verbose", "--allow-unconfigured", "--bind", "lan"]
        );
        assert!(!plan.token_auth);
    }

    #[test]
    fn plan_with_token_appends_flag_and_redacts_it() {
        let plan = HandoffPlan::new(&GatewaySettings::default(), Some("s3cret"));
        assert_eq!(plan.args[plan.args.len() - 2..], ["--token", "s3cret"]);
        assert!(plan.token_auth);
        assert!(!plan.redacted_args().iter().any(|a| a == "s3cret"));
        assert_eq!(plan.command_line()[0], OsString::from("clawdbot"));
    }

    #[test]
    fn clears_absolute_and_relative_locks() {
        let tmp = TempDir::new().unwrap();
        let config_dir = tmp.path().join("cfg");
        fs::create_dir_all(&config_dir).unwrap();
        let absolute = tmp.path().join("gateway-abs.lock");
        fs::write(&absolute, "").unwrap();
        fs::write(config_dir.join("gateway.lock"), "").unwrap();

        let locks =
            vec![absolute.clone(), PathBuf::from("gateway.lock"), PathBuf::from("missing.lock")];
        let removed = clear_stale_locks(&locks, &config_dir);

        assert_eq!(removed, vec![absolute.clone(), config_dir.join("gateway.lock")]);
        assert!(!absolute.exists());
    }

    #[cfg(unix)]
    #[test]
    fn exec_of_missing_binary_reports_error() {
        let mut gateway = GatewaySettings::default();
        gateway.binary = PathBuf::from("/nonexistent/gateboot-test-binary");
        let error = HandoffPlan::new(&gateway, None).exec();
        assert!(error.to_string().contains("/nonexistent/gateboot-test-binary"));
    }
}
