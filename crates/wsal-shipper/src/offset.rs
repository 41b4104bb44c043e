//! Delta-export cursor persisted in a plain-text marker file
//!
//! The marker holds the highest event id already shipped, as decimal text with
//! no trailing newline. Reads never fail and never write: a missing file means
//! "start from the beginning" and a corrupt one is reported so the caller can
//! decide whether to reset it.

use crate::error::{Result, ShipperError};
use fs4::fs_std::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Offset read from the marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedOffset {
    pub offset: i64,
    /// The marker exists but does not hold a non-negative id
    pub malformed: bool,
}

/// Reads and writes the marker file for one configuration
#[derive(Debug, Clone)]
pub struct OffsetStore {
    path: PathBuf,
}

impl OffsetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last exported id, or 0 when the marker is missing, unreadable or malformed.
    ///
    /// The file is left as it is; see [`OffsetStore::reset`].
    pub fn load(&self) -> LoadedOffset {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No offset marker yet, starting from 0");
                return LoadedOffset { offset: 0, malformed: false };
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read offset marker, using 0");
                return LoadedOffset { offset: 0, malformed: false };
            }
        };

        match parse_offset(&content) {
            Some(offset) => LoadedOffset { offset, malformed: false },
            None => {
                warn!(
                    path = %self.path.display(),
                    content = %content.chars().take(32).collect::<String>(),
                    "Illegal offset in marker file, starting from 0"
                );
                LoadedOffset { offset: 0, malformed: true }
            }
        }
    }

    /// Overwrite the marker with `id`
    pub fn save(&self, id: i64) -> Result<()> {
        fs::write(&self.path, id.to_string())?;
        debug!(path = %self.path.display(), id, "Offset marker written");
        Ok(())
    }

    /// Replace a malformed marker with `0`
    pub fn reset(&self) -> Result<()> {
        self.save(0)?;
        warn!(path = %self.path.display(), "Offset marker reset to 0");
        Ok(())
    }

    /// Take the exclusive run lock that sits next to the marker file.
    ///
    /// Fails with [`ShipperError::Locked`] while another guard for the same
    /// marker is alive, in this process or another one. The lock belongs to the
    /// open file handle, so the OS drops it when the holder exits, however it exits.
    pub fn lock(&self) -> Result<RunLock> {
        let mut lock_path = self.path.clone().into_os_string();
        lock_path.push(".lock");
        RunLock::acquire(PathBuf::from(lock_path))
    }
}

/// First line of the marker, without its line terminator, as a non-negative id
fn parse_offset(content: &str) -> Option<i64> {
    let line = content.lines().next()?;
    if line.is_empty() || !line.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    line.parse().ok()
}

/// Advisory lock on `<marker>.lock`, held until drop.
///
/// The file itself stays on disk; only the lock on the open handle matters.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    _file: File,
}

impl RunLock {
    fn acquire(path: PathBuf) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if let Err(e) = FileExt::try_lock_exclusive(&file) {
            if is_contended(&e) {
                return Err(ShipperError::Locked(path));
            }
            return Err(e.into());
        }

        // Best-effort pid for whoever inspects the file
        if file.set_len(0).is_ok() {
            let _ = write!(file, "{}", std::process::id());
        }
        debug!(path = %path.display(), "Run lock acquired");
        Ok(Self { path, _file: file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn is_contended(e: &std::io::Error) -> bool {
    e.kind() == ErrorKind::WouldBlock
        || e.raw_os_error() == fs4::lock_contended_error().raw_os_error()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, OffsetStore) {
        let dir = TempDir::new().unwrap();
        let store = OffsetStore::new(dir.path().join("log_track_config"));
        (dir, store)
    }

    #[test]
    fn test_missing_marker_reads_zero_without_creating_it() {
        let (_dir, store) = store();
        assert_eq!(store.load(), LoadedOffset { offset: 0, malformed: false });
        assert!(!store.path().exists());
    }

    #[test]
    fn test_saved_values_read_back_exactly() {
        let (_dir, store) = store();
        for n in [0, 1, 12, 987_654_321, i64::MAX] {
            store.save(n).unwrap();
            assert_eq!(store.load().offset, n);
        }
        assert_eq!(fs::read_to_string(store.path()).unwrap(), i64::MAX.to_string());
    }

    #[test]
    fn test_malformed_marker_reads_zero_and_is_left_alone() {
        let (_dir, store) = store();
        for junk in ["abc", "", "-5", "12abc", " 12", "1.5", "99999999999999999999"] {
            fs::write(store.path(), junk).unwrap();
            assert_eq!(
                store.load(),
                LoadedOffset { offset: 0, malformed: true },
                "content {:?}",
                junk
            );
            assert_eq!(fs::read_to_string(store.path()).unwrap(), junk);
        }
    }

    #[test]
    fn test_reset_writes_zero() {
        let (_dir, store) = store();
        fs::write(store.path(), "garbage").unwrap();
        store.reset().unwrap();
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "0");
        assert_eq!(store.load(), LoadedOffset { offset: 0, malformed: false });
    }

    #[test]
    fn test_trailing_newline_is_tolerated() {
        let (_dir, store) = store();
        fs::write(store.path(), "42\n").unwrap();
        assert_eq!(store.load().offset, 42);
        fs::write(store.path(), "43\r\nignored").unwrap();
        assert_eq!(store.load().offset, 43);
    }

    #[test]
    fn test_unwritable_marker_reports_error() {
        let dir = TempDir::new().unwrap();
        let store = OffsetStore::new(dir.path().join("missing-dir").join("log_track_config"));
        assert!(matches!(store.save(5), Err(ShipperError::Io(_))));
        assert_eq!(store.load().offset, 0);
    }

    #[test]
    fn test_lock_is_exclusive_and_released_on_drop() {
        let (_dir, store) = store();

        let guard = store.lock().unwrap();
        assert!(guard.path().exists());
        assert!(guard.path().to_string_lossy().ends_with("log_track_config.lock"));

        match store.lock() {
            Err(ShipperError::Locked(path)) => assert_eq!(path, guard.path()),
            other => panic!("expected Locked, got {:?}", other),
        }

        drop(guard);
        store.lock().unwrap();
    }

    #[test]
    fn test_leftover_lock_file_does_not_block() {
        let (dir, store) = store();
        // A run that was killed leaves its lock file behind, but no lock on it
        let lock_path = dir.path().join("log_track_config.lock");
        fs::write(&lock_path, "4242").unwrap();

        let guard = store.lock().unwrap();
        assert_eq!(guard.path(), lock_path);
        assert_eq!(fs::read_to_string(&lock_path).unwrap(), std::process::id().to_string());
    }
}
