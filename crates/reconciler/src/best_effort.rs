// Typed outcome for steps whose failure is logged but never halts the boot.

use std::fmt;

use tracing::warn;

/// Result of a best-effort step.
///
/// Halting steps return `anyhow::Result`; steps that must not stop the boot
/// return this instead, so the distinction is visible in signatures.
#[derive(Debug)]
#[must_use]
pub enum BestEffort<T> {
    Done(T),
    Failed { step: &'static str, reason: String },
}

impl<T> BestEffort<T> {
    /// Run `f`, logging a warning tagged with `step` if it fails.
    pub fn run<E, F>(step: &'static str, f: F) -> Self
    where
        E: fmt::Display,
        F: FnOnce() -> Result<T, E>,
    {
        match f() {
            Ok(value) => Self::Done(value),
            Err(error) => {
                let reason = error.to_string();
                warn!(step, error = %reason, "best-effort step failed, continuing");
                Self::Failed { step, reason }
            }
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Self::Done(value) => Some(value),
            Self::Failed { .. } => None,
        }
    }
}
