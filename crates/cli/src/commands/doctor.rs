// `gateboot doctor`: storage, config and gateway diagnostics. Read-only.

use std::fs;
use std::io::{self, IsTerminal};
use std::path::Path;

use clap::Args;
use gateboot_common::document::ConfigDocument;
use gateboot_reconciler::instance::{find_running_gateway, ProcFs, ProcessTable};
use gateboot_reconciler::layout::{Layout, StorageMode};
use gateboot_reconciler::settings::BootSettings;
use gateboot_reconciler::sync_marker::{durable_is_newer, read_marker};
use serde::Serialize;

use crate::output::{self, OutputFormat};

const ANSI_GREEN: &str = "\x1b[32m";
const ANSI_YELLOW: &str = "\x1b[33m";
const ANSI_RED: &str = "\x1b[31m";
const ANSI_RESET: &str = "\x1b[0m";

#[derive(Debug, Args)]
pub struct DoctorArgs {}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum DoctorStatus {
    Pass,
    Warning,
    Fail,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorCheck {
    name: String,
    status: DoctorStatus,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

impl DoctorCheck {
    fn pass(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: DoctorStatus::Pass,
            detail: detail.into(),
            hint: None,
        }
    }

    fn warning(name: &str, detail: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: DoctorStatus::Warning,
            detail: detail.into(),
            hint: Some(hint.into()),
        }
    }

    fn fail(name: &str, detail: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: DoctorStatus::Fail,
            detail: detail.into(),
            hint: Some(hint.into()),
        }
    }
}

pub fn run(_args: DoctorArgs, settings: &BootSettings, format: OutputFormat) -> anyhow::Result<()> {
    let checks = collect_checks(settings, &ProcFs::default(), std::process::id());
    output::print_output(format, &checks, |items| format_human(items))?;
    if checks.iter().any(|check| check.status == DoctorStatus::Fail) {
        anyhow::bail!("doctor checks failed");
    }
    Ok(())
}

fn collect_checks(
    settings: &BootSettings,
    processes: &dyn ProcessTable,
    own_pid: u32,
) -> Vec<DoctorCheck> {
    let layout = Layout::resolve(&settings.paths);
    vec![
        check_storage(&layout),
        check_workspace(&layout),
        check_config(&layout.config_path),
        check_markers(&layout),
        check_hook(&layout),
        check_gateway(processes, &settings.gateway.process_pattern(), own_pid),
    ]
}

fn check_storage(layout: &Layout) -> DoctorCheck {
    match layout.mode {
        StorageMode::Durable => DoctorCheck::pass(
            "storage",
            format!("durable storage at `{}`", layout.storage_root.display()),
        ),
        StorageMode::Ephemeral => DoctorCheck::warning(
            "storage",
            format!("ephemeral fallback at `{}`", layout.storage_root.display()),
            "mount a persistent volume at the durable root",
        ),
    }
}

fn check_workspace(layout: &Layout) -> DoctorCheck {
    let local = &layout.local_workspace;
    let durable = layout.durable_workspace();
    let metadata = match fs::symlink_metadata(local) {
        Ok(metadata) => metadata,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            return DoctorCheck::warning(
                "workspace",
                format!("`{}` does not exist", local.display()),
                "run `gateboot run` to link it",
            );
        }
        Err(error) => {
            return DoctorCheck::fail(
                "workspace",
                format!("cannot inspect `{}`: {error}", local.display()),
                "check permissions on the home directory",
            );
        }
    };

    if !metadata.file_type().is_symlink() {
        return DoctorCheck::warning(
            "workspace",
            format!("`{}` is not a link to durable storage", local.display()),
            "the next boot migrates it",
        );
    }
    match fs::read_link(local) {
        Ok(target) if target == durable => DoctorCheck::pass(
            "workspace",
            format!("`{}` -> `{}`", local.display(), durable.display()),
        ),
        Ok(target) => DoctorCheck::warning(
            "workspace",
            format!("`{}` points at `{}`", local.display(), target.display()),
            "the next boot relinks it",
        ),
        Err(error) => DoctorCheck::fail(
            "workspace",
            format!("cannot read link `{}`: {error}", local.display()),
            "remove the entry and rerun `gateboot run`",
        ),
    }
}

fn check_config(path: &Path) -> DoctorCheck {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            return DoctorCheck::warning(
                "config",
                format!("`{}` does not exist", path.display()),
                "the next boot restores or initializes it",
            );
        }
        Err(error) => {
            return DoctorCheck::fail(
                "config",
                format!("cannot read `{}`: {error}", path.display()),
                "check file permissions",
            );
        }
    };
    match ConfigDocument::parse(&text) {
        Ok(_) => DoctorCheck::pass("config", format!("`{}` is valid", path.display())),
        Err(error) => DoctorCheck::fail(
            "config",
            format!("`{}`: {error}", path.display()),
            "fix the JSON or delete it; the next boot starts from an empty document",
        ),
    }
}

fn check_markers(layout: &Layout) -> DoctorCheck {
    if !layout.is_durable() {
        return DoctorCheck::pass("sync_markers", "not applicable in ephemeral mode");
    }
    let local = read_marker(&layout.local_marker());
    let durable = read_marker(&layout.durable_marker());
    let describe = |marker: Option<chrono::DateTime<chrono::Utc>>| {
        marker.map_or_else(|| "none".to_string(), |at| at.to_rfc3339())
    };
    let detail = format!("local {}, durable {}", describe(local), describe(durable));
    if durable_is_newer(local, durable) {
        DoctorCheck::warning(
            "sync_markers",
            detail,
            "durable backup is newer; the next boot restores it over local config",
        )
    } else {
        DoctorCheck::pass("sync_markers", detail)
    }
}

fn check_hook(layout: &Layout) -> DoctorCheck {
    let hook = layout.hook_path();
    if hook.is_file() {
        DoctorCheck::pass("hook", format!("`{}` runs before the gateway", hook.display()))
    } else {
        DoctorCheck::pass("hook", "no pre-start hook")
    }
}

fn check_gateway(processes: &dyn ProcessTable, pattern: &str, own_pid: u32) -> DoctorCheck {
    match find_running_gateway(processes, pattern, own_pid) {
        Ok(Some(pid)) => DoctorCheck::pass("gateway", format!("running as pid {pid}")),
        Ok(None) => DoctorCheck::warning("gateway", "not running", "start it with `gateboot run`"),
        Err(error) => DoctorCheck::warning(
            "gateway",
            format!("process table unavailable: {error:#}"),
            "is /proc mounted?",
        ),
    }
}

fn format_human(checks: &[DoctorCheck]) -> String {
    let use_color = io::stdout().is_terminal();
    let mut lines = Vec::new();

    for check in checks {
        let (symbol, color) = match check.status {
            DoctorStatus::Pass => ("✓", ANSI_GREEN),
            DoctorStatus::Warning => ("⚠", ANSI_YELLOW),
            DoctorStatus::Fail => ("✗", ANSI_RED),
        };
        let rendered_symbol =
            if use_color { format!("{color}{symbol}{ANSI_RESET}") } else { symbol.to_string() };
        lines.push(format!("{rendered_symbol} {}: {}", check.name, check.detail));
        if let Some(hint) = &check.hint {
            lines.push(format!("  hint: {hint}"));
        }
    }

    let passed = checks.iter().filter(|check| check.status == DoctorStatus::Pass).count();
    let warnings = checks.iter().filter(|check| check.status == DoctorStatus::Warning).count();
    let failed = checks.iter().filter(|check| check.status == DoctorStatus::Fail).count();
    lines.push(String::new());
    lines.push(format!("Summary: {passed} passed, {warnings} warning(s), {failed} failed"));
    lines.join("\n")
}
