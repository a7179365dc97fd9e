// Consistent exit codes for the gateboot CLI.
//
//   0 = success (including "gateway already running")
//   1 = general error
//   2 = usage/settings error
//   3 = handoff to the gateway failed

use std::process;

use gateboot_reconciler::handoff::HandoffError;
use gateboot_reconciler::settings::SettingsError;

/// Named exit codes for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    Error = 1,
    Usage = 2,
    Handoff = 3,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Map an anyhow error to an exit code by inspecting the error chain.
    pub fn from_error(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if cause.downcast_ref::<HandoffError>().is_some() {
                return Self::Handoff;
            }
            if cause.downcast_ref::<SettingsError>().is_some() {
                return Self::Usage;
            }
        }
        Self::Error
    }

    /// Short machine-readable name used in JSON error output.
    pub fn label(self) -> &'static str {
        match self {
            Self::Success => "OK",
            Self::Error => "BOOT_ERROR",
            Self::Usage => "SETTINGS_INVALID",
            Self::Handoff => "HANDOFF_FAILED",
        }
    }
}

impl From<ExitCode> for process::ExitCode {
    fn from(code: ExitCode) -> Self {
        process::ExitCode::from(code.code() as u8)
    }
}
