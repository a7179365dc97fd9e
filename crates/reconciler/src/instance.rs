// Single-instance guard: boot lock plus a process-table check for a running gateway.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

/// Source of running processes' command lines.
pub trait ProcessTable {
    /// `(pid, command line)` for every visible process. Arguments are joined
    /// with single spaces.
    fn command_lines(&self) -> io::Result<Vec<(u32, String)>>;
}

/// Reads `/proc/<pid>/cmdline`.
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl Default for ProcFs {
    fn default() -> Self {
        Self { root: PathBuf::from("/proc") }
    }
}

impl ProcFs {
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ProcessTable for ProcFs {
    fn command_lines(&self) -> io::Result<Vec<(u32, String)>> {
        let mut lines = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let Ok(entry) = entry else { continue };
            let Some(pid) = entry.file_name().to_str().and_then(|n| n.parse::<u32>().ok()) else {
                continue;
            };
            // Processes can exit between listing and reading.
            let Ok(raw) = fs::read(entry.path().join("cmdline")) else { continue };
            let args: Vec<String> = raw
                .split(|b| *b == 0)
                .filter(|arg| !arg.is_empty())
                .map(|arg| String::from_utf8_lossy(arg).into_owned())
                .collect();
            if !args.is_empty() {
                lines.push((pid, args.join(" ")));
            }
        }
        lines.sort_by_key(|(pid, _)| *pid);
        Ok(lines)
    }
}

/// Find a process other than `own_pid` whose command line contains `pattern`.
pub fn find_running_gateway(
    table: &dyn ProcessTable,
    pattern: &str,
    own_pid: u32,
) -> Result<Option<u32>> {
    let lines = table.command_lines().context("failed to list processes")?;
    let found = lines
        .into_iter()
        .find(|(pid, cmdline)| *pid != own_pid && cmdline.contains(pattern))
        .map(|(pid, _)| pid);
    if let Some(pid) = found {
        info!(pid, pattern, "gateway already running");
    } else {
        debug!(pattern, "no running gateway found");
    }
    Ok(found)
}

/// Exclusive lock held for the duration of one boot.
///
/// The descriptor is close-on-exec, so the lock is released when the process
/// image is replaced by the gateway.
#[derive(Debug)]
pub struct BootLock {
    _file: File,
    path: PathBuf,
}

impl BootLock {
    /// Try to take the lock without blocking. `Ok(None)` means another boot holds it.
    pub fn try_acquire(path: &Path) -> Result<Option<Self>> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create `{}`", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .with_context(|| format!("failed to open boot lock `{}`", path.display()))?;
        if try_flock_exclusive(&file)
            .with_context(|| format!("failed to lock `{}`", path.display()))?
        {
            Ok(Some(Self { _file: file, path: path.to_path_buf() }))
        } else {
            Ok(None)
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Returns `Ok(false)` when the file is already locked elsewhere.
fn try_flock_exclusive(file: &File) -> io::Result<bool> {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        // SAFETY: the descriptor is owned by `file` and valid for this call.
        let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if result == 0 {
            return Ok(true);
        }
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::WouldBlock || err.raw_os_error() == Some(libc::EWOULDBLOCK)
        {
            return Ok(false);
        }
        Err(err)
    }
    #[cfg(not(unix))]
    {
        let _ = file;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct FixedTable(Vec<(u32, &'static str)>);

    impl ProcessTable for FixedTable {
        fn command_lines(&self) -> io::Result<Vec<(u32, String)>> {
            Ok(self.0.iter().map(|(pid, line)| (*pid, line.to_string())).collect())
        }
    }

    #[test]
    fn finds_gateway_and_ignores_self() {
        let table = FixedTable(vec![
            (1, "/sbin/init"),
            (42, "gateboot run clawdbot gateway"),
            (77, "node /usr/bin/clawdbot gateway --port 18789"),
        ]);
        assert_eq!(find_running_gateway(&table, "clawdbot gateway", 42).unwrap(), Some(77));
        assert_eq!(find_running_gateway(&table, "clawdbot gateway", 77).unwrap(), Some(42));
    }

    #[test]
    fn none_when_absent() {
        let table = FixedTable(vec![(1, "/sbin/init"), (9, "clawdbot doctor")]);
        assert_eq!(find_running_gateway(&table, "clawdbot gateway", 2).unwrap(), None);
    }

    #[test]
    fn procfs_reads_nul_separated_cmdlines() {
        let tmp = TempDir::new().unwrap();
        let entries = [("12", &b"clawdbot\0gateway\0--verbose\0"[..]), ("13", &b"sh\0"[..])];
        for (pid, cmdline) in entries {
            fs::create_dir_all(tmp.path().join(pid)).unwrap();
            fs::write(tmp.path().join(pid).join("cmdline"), cmdline).unwrap();
        }
        fs::create_dir_all(tmp.path().join("self")).unwrap();

        let lines = ProcFs::at(tmp.path()).command_lines().unwrap();
        assert_eq!(
            lines,
            vec![(12, "clawdbot gateway --verbose".to_string()), (13, "sh".to_string())]
        );
    }

    #[cfg(unix)]
    #[test]
    fn second_lock_attempt_fails_while_held() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("boot.lock");

        let first = BootLock::try_acquire(&path).unwrap();
        assert!(first.is_some());
        assert!(BootLock::try_acquire(&path).unwrap().is_none());

        drop(first);
        assert!(BootLock::try_acquire(&path).unwrap().is_some());
    }
}
