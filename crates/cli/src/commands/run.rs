// `gateboot run`: the container entrypoint.

use anyhow::Result;
use clap::Args;
use gateboot_common::env::EnvSnapshot;
use gateboot_reconciler::boot::{BootOutcome, BootSequence, BootSummary};
use gateboot_reconciler::instance::ProcFs;
use gateboot_reconciler::settings::BootSettings;
use gateboot_reconciler::workspace::WorkspaceAction;
use tracing::info;

use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct RunArgs {
    /// Reconcile everything but print the gateway command instead of exec'ing it
    #[arg(long)]
    pub no_exec: bool,
}

pub fn run(args: RunArgs, settings: &BootSettings, format: OutputFormat) -> Result<()> {
    let env = EnvSnapshot::capture();
    let processes = ProcFs::default();

    match BootSequence::new(settings, &env, &processes).prepare()? {
        BootOutcome::AlreadyRunning { pid } => {
            info!(pid, "gateway already running, nothing to do");
            Ok(())
        }
        BootOutcome::BootInProgress => Ok(()),
        BootOutcome::Ready { summary, lock } => {
            if args.no_exec {
                output::print_output(format, &summary, format_human)?;
                return Ok(());
            }
            info!(lock = %lock.path().display(), "boot reconciled");
            let error = summary.handoff.exec();
            drop(lock);
            Err(error.into())
        }
    }
}

fn format_human(summary: &BootSummary) -> String {
    let workspace = match &summary.workspace.action {
        WorkspaceAction::AlreadyLinked => "already linked".to_string(),
        WorkspaceAction::Linked => "linked".to_string(),
        WorkspaceAction::Relinked { previous } => format!("relinked (was {})", previous.display()),
        WorkspaceAction::ReplacedStale => "replaced stale entry".to_string(),
        WorkspaceAction::Migrated { copied, skipped, set_aside } => {
            let mut line = format!("migrated {copied} entries, {skipped} kept from durable");
            if let Some(path) = set_aside {
                line.push_str(&format!(", leftovers at {}", path.display()));
            }
            line
        }
    };

    let mut lines = vec![
        format!(
            "Workspace: {} -> {} ({:?})",
            workspace,
            summary.workspace.target.display(),
            summary.workspace.mode
        ),
        format!("Config:    {:?}", summary.config),
        format!("Hook:      {:?}", summary.hook),
    ];
    for lock in &summary.removed_locks {
        lines.push(format!("Removed:   {}", lock.display()));
    }
    let argv: Vec<String> = summary
        .handoff
        .command_line()
        .into_iter()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();
    lines.push(format!("Gateway:   {}", argv.join(" ")));
    lines.join("\n")
}
