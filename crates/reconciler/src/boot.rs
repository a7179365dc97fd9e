// Boot sequence: lock, single-instance check, reconcile, overlay, hook, prepare handoff.

use std::path::PathBuf;

use anyhow::Result;
use gateboot_common::env::{EnvSnapshot, Overrides};
use gateboot_common::overlay::apply_overlay;
use serde::Serialize;
use tracing::info;

use crate::best_effort::BestEffort;
use crate::config::{load_document, reconcile_config, save_document, ConfigSource};
use crate::handoff::{clear_stale_locks, HandoffPlan};
use crate::hook::{run_hook, HookOutcome};
use crate::instance::{find_running_gateway, BootLock, ProcessTable};
use crate::layout::Layout;
use crate::settings::BootSettings;
use crate::workspace::{reconcile_workspace, WorkspaceReport};

/// Everything the sequence did before the handoff.
#[derive(Debug, Clone, Serialize)]
pub struct BootSummary {
    pub workspace: WorkspaceReport,
    pub config: ConfigSource,
    pub hook: HookOutcome,
    pub removed_locks: Vec<PathBuf>,
    pub handoff: HandoffPlan,
}

#[derive(Debug)]
pub enum BootOutcome {
    /// A gateway process is already up; nothing was touched.
    AlreadyRunning { pid: u32 },
    /// Another boot holds the boot lock; nothing was touched.
    BootInProgress,
    /// State is reconciled. The lock must stay alive until the handoff.
    Ready { summary: BootSummary, lock: BootLock },
}

pub struct BootSequence<'a> {
    settings: &'a BootSettings,
    env: &'a EnvSnapshot,
    processes: &'a dyn ProcessTable,
    own_pid: u32,
}

impl<'a> BootSequence<'a> {
    pub fn new(
        settings: &'a BootSettings,
        env: &'a EnvSnapshot,
        processes: &'a dyn ProcessTable,
    ) -> Self {
        Self { settings, env, processes, own_pid: std::process::id() }
    }

    /// Run every stage up to, but not including, the exec.
    pub fn prepare(&self) -> Result<BootOutcome> {
        let Some(lock) = BootLock::try_acquire(&self.settings.paths.boot_lock)? else {
            info!("another boot holds the boot lock, exiting");
            return Ok(BootOutcome::BootInProgress);
        };

        let pattern = self.settings.gateway.process_pattern();
        let running = BestEffort::run("process-scan", || {
            find_running_gateway(self.processes, &pattern, self.own_pid)
        });
        if let Some(Some(pid)) = running.ok() {
            return Ok(BootOutcome::AlreadyRunning { pid });
        }

        let layout = Layout::resolve(&self.settings.paths);
        let workspace = reconcile_workspace(&layout)?;
        let config = reconcile_config(&layout)?;

        let overrides = Overrides::from_env(self.env);
        let mut doc = load_document(&layout.config_path)?.unwrap_or_default();
        apply_overlay(&mut doc, &overrides);
        save_document(&layout.config_path, &doc)?;
        info!(path = %layout.config_path.display(), "applied environment overlay");

        let hook = run_hook(&layout.hook_path(), &self.settings.hook.shell);
        let gateway = &self.settings.gateway;
        let removed_locks = clear_stale_locks(&gateway.stale_locks, &layout.config_dir);
        let handoff = HandoffPlan::new(gateway, overrides.gateway_token.as_deref());

        let summary = BootSummary { workspace, config, hook, removed_locks, handoff };
        Ok(BootOutcome::Ready { summary, lock })
    }
}
