//! The image store: a flat directory of sequentially numbered images.
//!
//! Recognized entries are regular files whose name, up to the first `.`,
//! is a non-negative decimal integer (`0000.jpg`, `0042.jpg`, `17.png`).
//! Everything else in the directory is ignored by listing and allocation.
//!
//! Every call rescans the directory. Nothing is cached, so the result
//! depends only on what is on disk at call time.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};

/// Extension of every image written by the hub.
pub const IMAGE_EXTENSION: &str = "jpg";

/// Width of the zero-padded sequence number.
const NAME_WIDTH: usize = 4;

/// Allocation attempts before `save` gives up on a taken name.
const PUBLISH_ATTEMPTS: usize = 3;

/// Distinguishes temporary files of concurrent saves in this process.
static PARTIAL_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// A sequence number in the image store.
///
/// Renders as the fixed-width file name, e.g. `0007.jpg`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImageName(u64);

impl ImageName {
    /// First name handed out for an empty store (`0000.jpg`).
    pub const FIRST: Self = Self(0);

    /// Creates a name from its sequence number.
    pub fn new(number: u64) -> Self {
        Self(number)
    }

    /// Returns the sequence number.
    pub fn number(&self) -> u64 {
        self.0
    }

    /// Returns the name that follows this one, or `None` at `u64::MAX`.
    #[must_use]
    pub fn next(&self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }

    /// File name without extension, e.g. `0007`.
    pub fn stem(&self) -> String {
        format!("{:0width$}", self.0, width = NAME_WIDTH)
    }

    /// Full file name, e.g. `0007.jpg`.
    pub fn file_name(&self) -> String {
        format!("{}.{IMAGE_EXTENSION}", self.stem())
    }

    /// Parses a directory entry name.
    ///
    /// Returns `None` for anything that is not integer-named, and for
    /// integer names too large to represent.
    pub fn parse(file_name: &str) -> Option<Self> {
        integer_stem(file_name)?.parse().ok().map(Self)
    }
}

impl fmt::Display for ImageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$}.{IMAGE_EXTENSION}", self.0, width = NAME_WIDTH)
    }
}

/// Returns the all-digit stem of `file_name`, if it has one.
fn integer_stem(file_name: &str) -> Option<&str> {
    let stem = file_name.split('.').next()?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(stem)
}

/// What one pass over the directory found.
#[derive(Debug, Default)]
struct Scan {
    names: BTreeSet<ImageName>,
    /// An integer-named file whose number does not fit an [`ImageName`]
    out_of_range: Option<String>,
}

/// Handle to the image directory.
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    /// Creates a handle for the directory at `root`.
    ///
    /// The directory is not touched until the first operation.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the store directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns every recognized image in ascending numeric order.
    ///
    /// Two files sharing a number (`0003.jpg`, `0003.png`) are listed once.
    pub fn list(&self) -> StoreResult<Vec<ImageName>> {
        Ok(self.scan()?.names.into_iter().collect())
    }

    /// Allocates the next file name: one past the highest recognized number,
    /// or [`ImageName::FIRST`] when the store holds no recognized image.
    ///
    /// Fails with [`StoreError::Exhausted`] when no number follows the
    /// highest one on disk, including integer names beyond `u64::MAX`.
    pub fn next_filename(&self) -> StoreResult<ImageName> {
        let scan = self.scan()?;
        if let Some(last) = scan.out_of_range {
            return Err(self.exhausted(last));
        }
        match scan.names.last() {
            None => Ok(ImageName::FIRST),
            Some(last) => last.next().ok_or_else(|| self.exhausted(last.file_name())),
        }
    }

    /// Writes `bytes` as a new image under the next free name.
    ///
    /// The data goes to a hidden temporary file first and is then linked
    /// under its final name. Linking never replaces an existing entry, so
    /// a name taken in the meantime is reallocated instead of overwritten.
    pub fn save(&self, bytes: &[u8]) -> StoreResult<ImageName> {
        // Unreadable or exhausted stores fail before anything is written.
        self.next_filename()?;

        let partial = self.root.join(format!(
            ".incoming-{}-{}.partial",
            process::id(),
            PARTIAL_SEQUENCE.fetch_add(1, Ordering::Relaxed)
        ));
        let saved = fs::write(&partial, bytes)
            .map_err(|source| StoreError::WriteFailed {
                path: partial.clone(),
                source,
            })
            .and_then(|()| self.publish(&partial));

        if let Err(e) = fs::remove_file(&partial) {
            debug!(path = %partial.display(), error = %e, "No partial file to clean up");
        }

        let name = saved?;
        debug!(name = %name, bytes = bytes.len(), "Stored image");
        Ok(name)
    }

    /// Links the finished temporary file under the next free name.
    fn publish(&self, partial: &Path) -> StoreResult<ImageName> {
        let mut target = self.root.clone();
        for _ in 0..PUBLISH_ATTEMPTS {
            let name = self.next_filename()?;
            target = self.root.join(name.file_name());
            match fs::hard_link(partial, &target) {
                Ok(()) => return Ok(name),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!(path = %target.display(), "Name already taken, reallocating");
                }
                Err(source) => {
                    return Err(StoreError::WriteFailed {
                        path: target,
                        source,
                    })
                }
            }
        }
        Err(StoreError::NameTaken { path: target })
    }

    fn exhausted(&self, last: String) -> StoreError {
        StoreError::Exhausted {
            root: self.root.clone(),
            last,
        }
    }

    /// Collects the recognized names currently in the directory.
    fn scan(&self) -> StoreResult<Scan> {
        let unreadable = |source: std::io::Error| StoreError::Unreadable {
            path: self.root.clone(),
            source,
        };

        let mut scan = Scan::default();
        for entry in fs::read_dir(&self.root).map_err(unreadable)? {
            let entry = entry.map_err(unreadable)?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(file_name) = entry.file_name().to_str().map(str::to_owned) else {
                warn!(path = %path.display(), "Skipping non UTF-8 file name");
                continue;
            };
            if integer_stem(&file_name).is_none() {
                continue;
            }
            match ImageName::parse(&file_name) {
                Some(name) => {
                    scan.names.insert(name);
                }
                None => {
                    warn!(path = %path.display(), "Image number out of range, skipping");
                    scan.out_of_range = Some(file_name);
                }
            }
        }
        Ok(scan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_with(files: &[&str]) -> (TempDir, ImageStore) {
        let dir = tempfile::tempdir().unwrap();
        for file in files {
            fs::write(dir.path().join(file), b"x").unwrap();
        }
        let store = ImageStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_image_name_formatting() {
        let name = ImageName::new(7);
        assert_eq!(name.to_string(), "0007.jpg");
        assert_eq!(name.file_name(), "0007.jpg");
        assert_eq!(name.stem(), "0007");
        assert_eq!(ImageName::new(12345).to_string(), "12345.jpg");
    }

    #[test]
    fn test_image_name_parse() {
        assert_eq!(ImageName::parse("0003.jpg"), Some(ImageName::new(3)));
        assert_eq!(ImageName::parse("12.png"), Some(ImageName::new(12)));
        assert_eq!(ImageName::parse("0001"), Some(ImageName::new(1)));
        assert_eq!(ImageName::parse("notes.txt"), None);
        assert_eq!(ImageName::parse("-1.jpg"), None);
        assert_eq!(ImageName::parse("+1.jpg"), None);
        assert_eq!(ImageName::parse(".0001.jpg.partial"), None);
        assert_eq!(ImageName::parse(""), None);
    }

    #[test]
    fn test_next_filename_empty_store() {
        let (_dir, store) = store_with(&[]);
        assert_eq!(store.next_filename().unwrap().to_string(), "0000.jpg");
    }

    #[test]
    fn test_next_filename_skips_gaps_and_junk() {
        let (_dir, store) = store_with(&["0000.jpg", "0003.jpg", "0007.jpg", "readme.txt"]);
        assert_eq!(store.next_filename().unwrap().to_string(), "0008.jpg");
    }

    #[test]
    fn test_next_filename_only_junk() {
        let (_dir, store) = store_with(&["thumbs.db", "cover.jpg"]);
        assert_eq!(store.next_filename().unwrap(), ImageName::FIRST);
    }

    #[test]
    fn test_list_sorted_and_filtered() {
        let (_dir, store) = store_with(&["0002.jpg", "0000.jpg", "0005.jpg", "holiday.jpg"]);
        let names: Vec<String> = store.list().unwrap().iter().map(ToString::to_string).collect();
        assert_eq!(names, vec!["0000.jpg", "0002.jpg", "0005.jpg"]);
    }

    #[test]
    fn test_list_ignores_directories() {
        let (dir, store) = store_with(&["0001.jpg"]);
        fs::create_dir(dir.path().join("0009")).unwrap();
        assert_eq!(store.list().unwrap(), vec![ImageName::new(1)]);
        assert_eq!(store.next_filename().unwrap(), ImageName::new(2));
    }

    #[test]
    fn test_list_is_stable() {
        let (_dir, store) = store_with(&["0004.jpg", "0001.jpg"]);
        assert_eq!(store.list().unwrap(), store.list().unwrap());
    }

    #[test]
    fn test_save_allocates_sequentially() {
        let (dir, store) = store_with(&["0004.jpg"]);
        let first = store.save(b"one").unwrap();
        let second = store.save(b"two").unwrap();
        assert_eq!(first.to_string(), "0005.jpg");
        assert_eq!(second.to_string(), "0006.jpg");
        assert_eq!(fs::read(dir.path().join("0006.jpg")).unwrap(), b"two");
        // No temp files left behind
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 3);
    }

    #[test]
    fn test_missing_store_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path().join("missing"));
        assert!(matches!(store.list(), Err(StoreError::Unreadable { .. })));
        assert!(matches!(
            store.save(b"x"),
            Err(StoreError::Unreadable { .. })
        ));
    }

    #[test]
    fn test_next_filename_past_u32_range() {
        let (_dir, store) = store_with(&["4294967295.jpg"]);
        assert_eq!(
            store.next_filename().unwrap().to_string(),
            "4294967296.jpg"
        );
    }

    #[test]
    fn test_save_at_last_number_keeps_existing_image() {
        let (dir, store) = store_with(&["18446744073709551615.jpg"]);
        let existing = dir.path().join("18446744073709551615.jpg");

        assert!(matches!(
            store.next_filename(),
            Err(StoreError::Exhausted { .. })
        ));
        assert!(matches!(
            store.save(b"new"),
            Err(StoreError::Exhausted { .. })
        ));
        assert_eq!(fs::read(&existing).unwrap(), b"x");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_out_of_range_number_exhausts_store() {
        let (_dir, store) = store_with(&["0002.jpg", "123456789012345678901234567890.jpg"]);
        assert_eq!(store.list().unwrap(), vec![ImageName::new(2)]);
        let err = store.next_filename().unwrap_err();
        assert!(err
            .to_string()
            .contains("123456789012345678901234567890.jpg"));
    }

    #[test]
    fn test_save_never_replaces_taken_name() {
        // A directory is not counted as an image but still holds the name.
        let (dir, store) = store_with(&["0001.jpg"]);
        fs::create_dir(dir.path().join("0002.jpg")).unwrap();

        assert!(matches!(
            store.save(b"new"),
            Err(StoreError::NameTaken { .. })
        ));
        assert!(dir.path().join("0002.jpg").is_dir());
        assert_eq!(fs::read(dir.path().join("0001.jpg")).unwrap(), b"x");
        // Only the two original entries remain
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_image_name_next_at_max() {
        assert_eq!(ImageName::new(41).next(), Some(ImageName::new(42)));
        assert_eq!(ImageName::new(u64::MAX).next(), None);
    }
}
