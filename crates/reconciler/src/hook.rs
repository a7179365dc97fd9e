// Operator pre-start hook kept on durable storage.
//
// The hook runs as a `sh` subprocess with the boot's environment and stdin.
// Its stdout is sent to our stderr so command output on stdout stays parseable.
// Durable storage is operator-controlled, so the script is trusted as-is: no
// sandboxing, no arguments, no output contract. It cannot change the
// reconciler's own environment; it can change files the gateway will read.

use std::io;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::info;

use crate::best_effort::BestEffort;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HookOutcome {
    Absent,
    Succeeded,
    Failed { reason: String },
}

/// Run the hook at `path` if present. Never fails the boot.
pub fn run_hook(path: &Path, shell: &Path) -> HookOutcome {
    if !path.is_file() {
        return HookOutcome::Absent;
    }
    info!(hook = %path.display(), "running pre-start hook");
    match BestEffort::run("pre-start-hook", || invoke(path, shell)) {
        BestEffort::Done(_) => HookOutcome::Succeeded,
        BestEffort::Failed { reason, .. } => HookOutcome::Failed { reason },
    }
}

fn invoke(path: &Path, shell: &Path) -> Result<ExitStatus> {
    let status = Command::new(shell)
        .arg(path)
        .stdout(Stdio::from(io::stderr()))
        .status()
        .with_context(|| format!("failed to spawn `{}`", shell.display()))?;
    if !status.success() {
        bail!("hook `{}` exited with {status}", path.display());
    }
    Ok(status)
}
