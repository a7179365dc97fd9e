// Filesystem helpers: recursive tree copies and atomic file writes.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// What happens when the destination entry already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collision {
    /// Leave the existing destination entry alone.
    KeepExisting,
    /// Replace the destination entry.
    Overwrite,
}

/// Per-entry tally of a tree copy. Copies never stop at the first error.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CopyReport {
    pub copied: usize,
    pub skipped: usize,
    pub failed: Vec<(PathBuf, String)>,
}

impl CopyReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn fail(&mut self, path: &Path, error: impl ToString) {
        self.failed.push((path.to_path_buf(), error.to_string()));
    }
}

/// Recursively copy the contents of `src` into `dst`, preserving symlinks.
pub fn copy_tree(src: &Path, dst: &Path, collision: Collision) -> io::Result<CopyReport> {
    let mut report = CopyReport::default();
    fs::create_dir_all(dst)?;
    copy_entries(src, dst, collision, &mut report)?;
    Ok(report)
}

fn copy_entries(
    src: &Path,
    dst: &Path,
    collision: Collision,
    report: &mut CopyReport,
) -> io::Result<()> {
    let mut entries = fs::read_dir(src)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let metadata = match fs::symlink_metadata(&from) {
            Ok(metadata) => metadata,
            Err(error) => {
                report.fail(&from, error);
                continue;
            }
        };
        let existing = fs::symlink_metadata(&to).ok();

        if metadata.is_dir() {
            match existing {
                Some(meta) if meta.is_dir() => {}
                // Skipping would drop everything below `from`.
                Some(_) if collision == Collision::KeepExisting => {
                    report.fail(&from, "destination exists and is not a directory");
                    continue;
                }
                Some(_) => {
                    if let Err(error) = fs::remove_file(&to) {
                        report.fail(&to, error);
                        continue;
                    }
                    if let Err(error) = fs::create_dir(&to) {
                        report.fail(&to, error);
                        continue;
                    }
                }
                None => {
                    if let Err(error) = fs::create_dir(&to) {
                        report.fail(&to, error);
                        continue;
                    }
                }
            }
            if let Err(error) = copy_entries(&from, &to, collision, report) {
                report.fail(&from, error);
            }
            continue;
        }

        if let Some(meta) = existing {
            if collision == Collision::KeepExisting {
                if meta.is_dir() {
                    report.fail(&from, "destination exists and is a directory");
                } else {
                    report.skipped += 1;
                }
                continue;
            }
            let removed =
                if meta.is_dir() { fs::remove_dir_all(&to) } else { fs::remove_file(&to) };
            if let Err(error) = removed {
                report.fail(&to, error);
                continue;
            }
        }

        let result = if metadata.file_type().is_symlink() {
            copy_symlink(&from, &to)
        } else {
            fs::copy(&from, &to).map(|_| ())
        };
        match result {
            Ok(()) => report.copied += 1,
            Err(error) => report.fail(&from, error),
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    let target = fs::read_link(from)?;
    std::os::unix::fs::symlink(target, to)
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> io::Result<()> {
    fs::copy(from, to).map(|_| ())
}

/// Write `contents` to `path` through a sibling temp file and a rename.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create `{}`", parent.display()))?;
    }
    let file_name = path
        .file_name()
        .with_context(|| format!("`{}` has no file name", path.display()))?;
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let mut file = fs::File::create(&tmp_path)
        .with_context(|| format!("failed to open temp file `{}`", tmp_path.display()))?;
    file.write_all(contents).context("failed to write temp file")?;
    file.sync_data().context("failed to fsync temp file")?;
    drop(file);

    fs::rename(&tmp_path, path).with_context(|| {
        format!("failed to move `{}` to `{}`", tmp_path.display(), path.display())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn keep_existing_does_not_clobber() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        write(&src.join("a.txt"), "local");
        write(&src.join("nested/b.txt"), "b");
        write(&dst.join("a.txt"), "durable");

        let report = copy_tree(&src, &dst, Collision::KeepExisting).unwrap();

        assert_eq!(fs::read_to_string(dst.join("a.txt")).unwrap(), "durable");
        assert_eq!(fs::read_to_string(dst.join("nested/b.txt")).unwrap(), "b");
        assert_eq!(report.copied, 1);
        assert_eq!(report.skipped, 1);
        assert!(report.is_complete());
    }

    #[test]
    fn keep_existing_reports_directory_over_file_as_failed() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        write(&src.join("notes/only-local.md"), "local");
        write(&dst.join("notes"), "durable file");

        let report = copy_tree(&src, &dst, Collision::KeepExisting).unwrap();

        assert_eq!(report.skipped, 0);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, src.join("notes"));
        assert!(!report.is_complete());
        assert_eq!(fs::read_to_string(dst.join("notes")).unwrap(), "durable file");
    }

    #[test]
    fn keep_existing_reports_file_over_directory_as_failed() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        write(&src.join("notes"), "local file");
        write(&dst.join("notes/durable.md"), "durable");

        let report = copy_tree(&src, &dst, Collision::KeepExisting).unwrap();

        assert!(!report.is_complete());
        assert!(dst.join("notes/durable.md").is_file());
    }

    #[test]
    fn overwrite_replaces_files() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        write(&src.join("a.txt"), "new");
        write(&dst.join("a.txt"), "old");
        write(&dst.join("other.txt"), "kept");

        copy_tree(&src, &dst, Collision::Overwrite).unwrap();

        assert_eq!(fs::read_to_string(dst.join("a.txt")).unwrap(), "new");
        assert_eq!(fs::read_to_string(dst.join("other.txt")).unwrap(), "kept");
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_recreated_not_followed() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        fs::create_dir_all(&src).unwrap();
        std::os::unix::fs::symlink("/nonexistent/target", src.join("link")).unwrap();

        let report = copy_tree(&src, &dst, Collision::KeepExisting).unwrap();

        assert_eq!(report.copied, 1);
        assert_eq!(fs::read_link(dst.join("link")).unwrap(), PathBuf::from("/nonexistent/target"));
    }

    #[test]
    fn missing_source_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(copy_tree(&tmp.path().join("absent"), &tmp.path().join("dst"), Collision::Overwrite)
            .is_err());
    }

    #[test]
    fn write_atomic_creates_parents_and_leaves_no_temp() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cfg").join("doc.json");
        write_atomic(&path, b"{}\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}\n");
        assert!(!tmp.path().join("cfg").join("doc.json.tmp").exists());
    }
}
