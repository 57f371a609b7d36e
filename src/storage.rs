//! Crash-safe file access for salt files and in-place encryption.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::crypto::secure_random;
use crate::error::CryptError;

/// A single file on disk that is read whole and replaced atomically.
#[derive(Clone, Debug)]
pub struct Storage {
    path: PathBuf,
}

impl Storage {
    /// Creates a new Storage instance with the given path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns `true` if the file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Loads the entire file into memory.
    ///
    /// # Errors
    ///
    /// Returns [`CryptError::FileNotFound`] if the file does not exist and
    /// [`CryptError::Io`] for any other read failure.
    pub fn load(&self) -> Result<Vec<u8>, CryptError> {
        fs::read(&self.path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => CryptError::FileNotFound(self.path.clone()),
            _ => CryptError::Io(e),
        })
    }

    /// Replaces the file's contents using an atomic write.
    ///
    /// This method ensures crash-safety by:
    /// 1. Writing data to a temporary file with random name in the same directory
    /// 2. Syncing the temporary file to disk
    /// 3. Atomically replacing the old file with the new one
    /// 4. Syncing the parent directory to ensure the rename is persisted
    ///
    /// If a crash occurs during save, either the old or new file will be present,
    /// never a corrupted partial write. When the file already exists its
    /// permissions are carried over to the replacement.
    ///
    /// A symlink at the path is written through: the file it points to is
    /// replaced and the link itself stays in place.
    ///
    /// Creates parent directories if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, data: &[u8]) -> Result<(), CryptError> {
        let target = self.resolved_path()?;

        if let Some(parent) = parent_dir(&target) {
            fs::create_dir_all(parent)?;
        }

        let permissions = fs::metadata(&target).ok().map(|m| m.permissions());
        let tmp_path = random_tmp_path(&target)?;

        // securely create temp file (fail if exists)
        let mut tmp_file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)?;

        let written = tmp_file
            .write_all(data)
            .and_then(|_| tmp_file.sync_all())
            .and_then(|_| match permissions {
                Some(perms) => tmp_file.set_permissions(perms),
                None => Ok(()),
            });
        drop(tmp_file);

        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        //atomic replace
        if let Err(e) = atomic_replace(&tmp_path, &target) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        // fsync directory
        #[cfg(not(target_os = "windows"))]
        if let Some(parent) = parent_dir(&target) {
            let dir = fs::File::open(parent)?;
            dir.sync_all()?;
        }

        Ok(())
    }

    /// Returns the path to the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The file a write must replace: the link target when the path is a
    /// symlink, the path itself otherwise.
    fn resolved_path(&self) -> Result<PathBuf, CryptError> {
        match fs::symlink_metadata(&self.path) {
            Ok(meta) if meta.file_type().is_symlink() => Ok(fs::canonicalize(&self.path)?),
            _ => Ok(self.path.clone()),
        }
    }
}

/// Marker between the original file name and the random suffix of a
/// temporary file.
const TMP_MARKER: &str = ".tmp.";

/// Hex digits in the random suffix of a temporary file name.
const TMP_SUFFIX_LEN: usize = 16;

/// Returns `true` if `path` is named like a temporary file left by
/// [`Storage::save`].
pub(crate) fn is_tmp_path(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let Some((stem, suffix)) = name.rsplit_once(TMP_MARKER) else {
        return false;
    };
    !stem.is_empty()
        && suffix.len() == TMP_SUFFIX_LEN
        && suffix.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Parent directory, treating a bare file name as the current directory.
fn parent_dir(path: &Path) -> Option<&Path> {
    match path.parent() {
        Some(p) if p.as_os_str().is_empty() => Some(Path::new(".")),
        other => other,
    }
}

/// Generates a unique temporary file path in the same directory.
///
/// Format: `filename.tmp.<randomhex>`
fn random_tmp_path(path: &Path) -> Result<PathBuf, CryptError> {
    let mut buf = [0u8; TMP_SUFFIX_LEN / 2]; // 64 bit entropy
    secure_random(&mut buf)?;

    let rand_string = buf.iter().map(|b| format!("{:02x}", b)).collect::<String>();

    let file_name = path
        .file_name()
        .ok_or_else(|| CryptError::FileNotFound(path.to_path_buf()))?
        .to_string_lossy();

    let tmp_name = format!("{}{}{}", file_name, TMP_MARKER, rand_string);

    Ok(path.with_file_name(tmp_name))
}

/// Atomically replaces the target file with the temporary file.
///
/// Uses Windows `ReplaceFileW` API with `REPLACEFILE_WRITE_THROUGH` flag
/// when the target exists; a plain rename otherwise.
#[cfg(target_os = "windows")]
fn atomic_replace(tmp_path: &Path, target: &Path) -> Result<(), CryptError> {
    use std::ffi::OsStr;
    use std::os::windows::ffi::OsStrExt;
    use windows_sys::Win32::Storage::FileSystem::{REPLACEFILE_WRITE_THROUGH, ReplaceFileW};

    if !target.exists() {
        fs::rename(tmp_path, target)?;
        return Ok(());
    }

    fn to_wide(s: &OsStr) -> Vec<u16> {
        s.encode_wide().chain(std::iter::once(0)).collect()
    }

    let target_w = to_wide(target.as_os_str());
    let tmp_w = to_wide(tmp_path.as_os_str());

    // SAFETY:
    // - Strings are valid UTF-16 and null-terminated
    // - Pointers remain valid during the call
    // - Windows does not retain the pointers after return
    let result = unsafe {
        ReplaceFileW(
            target_w.as_ptr(),
            tmp_w.as_ptr(),
            std::ptr::null(),
            REPLACEFILE_WRITE_THROUGH,
            std::ptr::null(),
            std::ptr::null(),
        )
    };

    if result == 0 {
        return Err(io::Error::last_os_error().into());
    }

    Ok(())
}

/// Atomically replaces the target file with the temporary file.
///
/// On Unix, `rename()` is atomic when both paths are on the same filesystem.
#[cfg(not(target_os = "windows"))]
fn atomic_replace(tmp_path: &Path, target: &Path) -> Result<(), CryptError> {
    fs::rename(tmp_path, target)?;
    Ok(())
}
