//! Directory traversal.
//!
//! Trees are walked depth-first with an explicit stack. Siblings are visited
//! in whatever order the filesystem enumerates them, which is not stable
//! across platforms or runs. Symbolic links are never followed and special
//! files are never opened; both are recorded as skipped, as are temporary
//! files left behind by an interrupted write.

use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use crate::cipher::Mode;
use crate::crypto::TokenKey;
use crate::error::{CryptError, FailureKind};
use crate::storage::is_tmp_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    File,
    Directory,
    Symlink,
    Other,
}

/// A path discovered during traversal, with its kind as seen without
/// following links.
#[derive(Debug, Clone)]
struct FileEntry {
    path: PathBuf,
    kind: EntryKind,
}

impl FileEntry {
    fn from_dir_entry(entry: &fs::DirEntry) -> std::io::Result<Self> {
        let file_type = entry.file_type()?;
        let kind = if file_type.is_symlink() {
            EntryKind::Symlink
        } else if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        };
        Ok(Self {
            path: entry.path(),
            kind,
        })
    }
}

/// Tuning for a tree operation.
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    /// Worker threads; `None` or `1` processes files sequentially.
    pub jobs: Option<usize>,
    /// Set to stop starting new files. Files already being written finish.
    pub cancel: Option<Arc<AtomicBool>>,
    /// Files that must never be transformed (the salt file).
    exclude: Vec<PathBuf>,
}

impl WalkOptions {
    /// Adds a file that traversal must leave alone. Paths that do not exist
    /// yet are ignored.
    pub fn exclude(mut self, path: &Path) -> Self {
        if let Ok(canonical) = path.canonicalize() {
            self.exclude.push(canonical);
        }
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn is_excluded(&self, path: &Path) -> bool {
        let name = path.file_name();
        if !self.exclude.iter().any(|p| p.file_name() == name) {
            return false;
        }
        path.canonicalize()
            .is_ok_and(|canonical| self.exclude.contains(&canonical))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Symlink,
    SpecialFile,
    SaltFile,
    /// `<name>.tmp.<hex>` left by a write that never completed.
    TempFile,
}

#[derive(Debug, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SkippedEntry {
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// Outcome of a file or tree operation.
#[derive(Debug, Serialize)]
pub struct TreeReport {
    pub mode: Mode,
    pub succeeded: usize,
    pub failures: Vec<FileFailure>,
    pub skipped: Vec<SkippedEntry>,
    pub cancelled: bool,
}

impl TreeReport {
    fn new(mode: Mode) -> Self {
        Self {
            mode,
            succeeded: 0,
            failures: Vec::new(),
            skipped: Vec::new(),
            cancelled: false,
        }
    }

    /// `true` when every file succeeded and the run was not cancelled.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    fn record_failure(&mut self, path: PathBuf, err: &CryptError) {
        self.failures.push(FileFailure {
            path,
            kind: err.kind(),
            message: err.to_string(),
        });
    }

    fn record_skip(&mut self, path: PathBuf, reason: SkipReason) {
        warn!(path = %path.display(), ?reason, "skipped");
        self.skipped.push(SkippedEntry { path, reason });
    }
}

/// Encrypts every regular file under `root`.
pub fn encrypt_tree(root: &Path, key: &TokenKey, options: &WalkOptions) -> TreeReport {
    walk_tree(root, Mode::Encrypt, key, options)
}

/// Decrypts every regular file under `root`.
pub fn decrypt_tree(root: &Path, key: &TokenKey, options: &WalkOptions) -> TreeReport {
    walk_tree(root, Mode::Decrypt, key, options)
}

/// Applies `mode` to every regular file under `root`.
///
/// Per-file failures are recorded in the report and never stop the walk.
pub fn walk_tree(root: &Path, mode: Mode, key: &TokenKey, options: &WalkOptions) -> TreeReport {
    let mut report = TreeReport::new(mode);
    let files = collect_files(root, options, &mut report);
    debug!(root = %root.display(), files = files.len(), "collected files");

    let outcomes = match options.jobs {
        Some(jobs) if jobs > 1 => run_parallel(&files, jobs, mode, key, options),
        _ => run_sequential(&files, mode, key, options),
    };

    for (path, outcome) in files.into_iter().zip(outcomes) {
        match outcome {
            Outcome::Done => report.succeeded += 1,
            Outcome::Failed(err) => report.record_failure(path, &err),
            Outcome::NotStarted => report.cancelled = true,
        }
    }

    if report.cancelled {
        warn!(succeeded = report.succeeded, "cancelled before all files were processed");
    }
    report
}

/// Applies `mode` to `path`, which may be a single file or a directory.
///
/// The key is checked before anything is touched. A `path` given here is
/// resolved through symlinks, so a linked file is transformed in place and
/// the link kept; entries found below it are not followed.
pub fn process_path(
    path: &Path,
    mode: Mode,
    key: Option<&TokenKey>,
    options: &WalkOptions,
) -> Result<TreeReport, CryptError> {
    let Some(key) = key else {
        return Err(CryptError::KeyUnavailable);
    };

    let metadata = fs::metadata(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => CryptError::FileNotFound(path.to_path_buf()),
        _ => CryptError::Io(e),
    })?;

    if metadata.is_dir() {
        return Ok(walk_tree(path, mode, key, options));
    }

    let mut report = TreeReport::new(mode);
    if !metadata.is_file() {
        report.record_skip(path.to_path_buf(), SkipReason::SpecialFile);
    } else if options.is_excluded(path) {
        report.record_skip(path.to_path_buf(), SkipReason::SaltFile);
    } else {
        info!(path = %path.display(), ?mode, "processing file");
        match mode.apply(path, Some(key)) {
            Ok(()) => report.succeeded += 1,
            Err(err) => report.record_failure(path.to_path_buf(), &err),
        }
    }
    Ok(report)
}

/// Lists every directory below `root`, recursively, without following
/// symlinks. The result is sorted so that positions are stable for display.
///
/// Subdirectories that cannot be read are logged and left out of the
/// descent; an unreadable `root` is an error.
pub fn scan_folders(root: &Path) -> Result<Vec<PathBuf>, CryptError> {
    let mut folders = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    let mut is_root = true;

    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if is_root => return Err(e.into()),
            Err(e) => {
                warn!(path = %dir.display(), "cannot read directory: {e}");
                continue;
            }
        };
        is_root = false;

        for entry in entries.flatten() {
            if entry.file_type().is_ok_and(|t| t.is_dir()) {
                let path = entry.path();
                folders.push(path.clone());
                stack.push(path);
            }
        }
    }

    folders.sort();
    Ok(folders)
}

enum Outcome {
    Done,
    Failed(CryptError),
    NotStarted,
}

fn run_one(path: &Path, mode: Mode, key: &TokenKey, options: &WalkOptions) -> Outcome {
    if options.is_cancelled() {
        return Outcome::NotStarted;
    }
    info!(path = %path.display(), ?mode, "processing file");
    match mode.apply(path, Some(key)) {
        Ok(()) => Outcome::Done,
        Err(err) => Outcome::Failed(err),
    }
}

fn run_sequential(
    files: &[PathBuf],
    mode: Mode,
    key: &TokenKey,
    options: &WalkOptions,
) -> Vec<Outcome> {
    files
        .iter()
        .map(|path| run_one(path, mode, key, options))
        .collect()
}

fn run_parallel(
    files: &[PathBuf],
    jobs: usize,
    mode: Mode,
    key: &TokenKey,
    options: &WalkOptions,
) -> Vec<Outcome> {
    match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
        Ok(pool) => pool.install(|| {
            files
                .par_iter()
                .map(|path| run_one(path, mode, key, options))
                .collect()
        }),
        Err(e) => {
            warn!("cannot start worker pool, processing sequentially: {e}");
            run_sequential(files, mode, key, options)
        }
    }
}

/// Depth-first pre-order listing of the regular files below `root`.
///
/// Unreadable directories become failures; symlinks, special files,
/// leftover temporary files and excluded files become skips.
fn collect_files(root: &Path, options: &WalkOptions, report: &mut TreeReport) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![FileEntry {
        path: root.to_path_buf(),
        kind: EntryKind::Directory,
    }];

    while let Some(entry) = stack.pop() {
        match entry.kind {
            EntryKind::File if options.is_excluded(&entry.path) => {
                report.record_skip(entry.path, SkipReason::SaltFile)
            }
            EntryKind::File if is_tmp_path(&entry.path) => {
                report.record_skip(entry.path, SkipReason::TempFile)
            }
            EntryKind::File => files.push(entry.path),
            EntryKind::Symlink => report.record_skip(entry.path, SkipReason::Symlink),
            EntryKind::Other => report.record_skip(entry.path, SkipReason::SpecialFile),
            EntryKind::Directory => match read_children(&entry.path) {
                Ok(mut children) => {
                    // reversed so the first child is popped first
                    children.reverse();
                    stack.extend(children);
                }
                Err(err) => {
                    warn!(path = %entry.path.display(), "cannot read directory: {err}");
                    report.record_failure(entry.path, &err);
                }
            },
        }
    }

    files
}

fn read_children(dir: &Path) -> Result<Vec<FileEntry>, CryptError> {
    let mut children = Vec::new();
    for entry in fs::read_dir(dir)? {
        children.push(FileEntry::from_dir_entry(&entry?)?);
    }
    Ok(children)
}
