//! Values persisted as files in a scratch directory.
//!
//! The platform may purge the directory after a few days of inactivity, so
//! every read falls back to the caller's default. Writes replace the file
//! atomically and never report failure to the caller.

use std::{
    convert::Infallible,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use durable_core::{
    codec::{self, CodecError},
    slot::DurableSlot,
};
use serde::{de::DeserializeOwned, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, instrument, warn};

#[derive(Debug, Error)]
enum ScratchError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("scratch io failure: {0}")]
    Io(#[from] io::Error),
}

/// Root of the scratch area. Defaults to the process temp directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchDirectory {
    root: PathBuf,
}

impl ScratchDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a raw filename maps to after sanitization.
    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.root.join(sanitize_filename(filename))
    }

    /// Load and decode `filename`, or return `default` on any failure.
    #[instrument(skip_all, fields(filename = %filename))]
    pub fn read<T: DeserializeOwned>(&self, filename: &str, default: T) -> T {
        let path = self.path_for(filename);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) => {
                debug!(?path, "scratch file unavailable, using default: {err}");
                return default;
            }
        };
        match codec::decode(&bytes) {
            Ok(value) => value,
            Err(err) => {
                warn!(?path, "scratch file undecodable, using default: {err}");
                default
            }
        }
    }

    /// Encode and atomically replace `filename`. Failures are logged only.
    #[instrument(skip_all, fields(filename = %filename))]
    pub fn write<T: Serialize + ?Sized>(&self, filename: &str, value: &T) {
        let path = self.path_for(filename);
        match self.try_write(&path, value) {
            Ok(()) => debug!(?path, "scratch file written"),
            Err(err) => warn!(?path, "failed persisting scratch file: {err}"),
        }
    }

    /// Delete `filename`. Missing files are ignored; other failures are logged.
    #[instrument(skip_all, fields(filename = %filename))]
    pub fn remove(&self, filename: &str) {
        let path = self.path_for(filename);
        match fs::remove_file(&path) {
            Ok(()) => debug!(?path, "scratch file removed"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!(?path, "failed removing scratch file: {err}"),
        }
    }

    fn try_write<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<(), ScratchError> {
        let bytes = codec::encode(value)?;
        fs::create_dir_all(&self.root)?;

        // Temp file lives next to the target so the rename stays on one filesystem.
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(&bytes)?;
        tmp.flush()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl Default for ScratchDirectory {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

/// Map a raw filename onto a single path component: `/` becomes `_`, `=` is
/// dropped, `+` becomes `-`.
///
/// Distinct names can collide (`"a/b"` and `"a_b"` share a file). Callers
/// depend on this mapping staying as is.
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .replace('/', "_")
        .replace('=', "")
        .replace('+', "-")
}

/// Typed handle binding a filename and default to a scratch directory.
#[derive(Debug, Clone)]
pub struct TemporaryDiskItem<T> {
    filename: String,
    default: T,
    directory: ScratchDirectory,
}

impl<T> TemporaryDiskItem<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    /// Bind to the default scratch directory.
    pub fn new(filename: impl Into<String>, default: T) -> Self {
        Self::in_directory(filename, default, ScratchDirectory::default())
    }

    pub fn in_directory(filename: impl Into<String>, default: T, directory: ScratchDirectory) -> Self {
        Self {
            filename: filename.into(),
            default,
            directory,
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn get(&self) -> T {
        self.directory.read(&self.filename, self.default.clone())
    }

    pub fn set(&self, value: &T) {
        self.directory.write(&self.filename, value)
    }

    /// Drop the persisted file; later reads yield the default.
    pub fn remove(&self) {
        self.directory.remove(&self.filename)
    }
}

impl<T> DurableSlot for TemporaryDiskItem<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    type Value = T;
    type Error = Infallible;

    fn read(&self) -> Result<T, Infallible> {
        Ok(self.get())
    }

    fn write(&self, value: T) -> Result<(), Infallible> {
        self.set(&value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct CodableStruct {
        str: String,
        int: i64,
    }

    const SPECIAL_NAME: &str = "https://erlang-is+an<>awesome=language!right? =/&\n\n\
        %€#\"'*_,;.:@£$∞§|[]≈±´´``` \\//\n\n|()";

    fn struct1() -> CodableStruct {
        CodableStruct {
            str: "str".into(),
            int: 123,
        }
    }

    fn struct2() -> CodableStruct {
        CodableStruct {
            str: "rts".into(),
            int: 321,
        }
    }

    #[test]
    fn sanitize_replaces_reserved_characters() {
        assert_eq!(sanitize_filename("a/b=c+d"), "a_bc-d");
        assert_eq!(sanitize_filename("plain"), "plain");
        assert_eq!(sanitize_filename("=="), "");
    }

    #[test]
    fn missing_files_yield_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scratch = ScratchDirectory::new(dir.path());
        let username = TemporaryDiskItem::in_directory("username", "defaultName".to_string(), scratch.clone());
        let record = TemporaryDiskItem::in_directory("struct", struct1(), scratch);

        assert_eq!(username.get(), "defaultName");
        assert_eq!(record.get(), struct1());
    }

    #[test]
    fn written_values_are_seen_by_fresh_handles() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scratch = ScratchDirectory::new(dir.path());
        let username = TemporaryDiskItem::in_directory("username", "defaultName".to_string(), scratch.clone());
        let record = TemporaryDiskItem::in_directory("struct", struct1(), scratch.clone());

        username.set(&"new name".to_string());
        record.set(&struct2());

        assert_eq!(scratch.read("username", String::new()), "new name");
        assert_eq!(scratch.read("struct", struct1()), struct2());
    }

    #[test]
    fn special_character_filenames_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scratch = ScratchDirectory::new(dir.path());
        let item = TemporaryDiskItem::in_directory(SPECIAL_NAME, "defaultName".to_string(), scratch.clone());

        item.set(&"new name".to_string());
        assert_eq!(item.get(), "new name");

        // The value itself may contain anything.
        scratch.write("username", SPECIAL_NAME);
        assert_eq!(scratch.read("username", String::new()), SPECIAL_NAME);
    }

    #[test]
    fn colliding_filenames_share_storage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scratch = ScratchDirectory::new(dir.path());
        assert_eq!(scratch.path_for("a/b"), scratch.path_for("a_b"));

        scratch.write("a/b", "first");
        scratch.write("a_b", "second");
        assert_eq!(scratch.read("a/b", String::new()), "second");
        assert_eq!(scratch.read("a_b", String::new()), "second");

        scratch.write("a/b", "third");
        assert_eq!(scratch.read("a_b", String::new()), "third");
    }

    #[test]
    fn atomic_write_leaves_only_target_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scratch = ScratchDirectory::new(dir.path().join("nested"));

        scratch.write("value", &struct1());
        scratch.write("value", &struct2());

        let entries: Vec<_> = fs::read_dir(scratch.root())
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("value")]);
        assert_eq!(scratch.read("value", struct1()), struct2());
    }

    #[test]
    fn undecodable_file_yields_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scratch = ScratchDirectory::new(dir.path());
        fs::write(scratch.path_for("broken"), b"{not json").expect("write");

        assert_eq!(scratch.read("broken", struct1()), struct1());
        // Valid JSON of the wrong shape is also rejected.
        scratch.write("wrong", &42);
        assert_eq!(scratch.read("wrong", struct1()), struct1());
    }

    #[test]
    fn write_failures_are_absorbed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"x").expect("write blocker");
        let scratch = ScratchDirectory::new(&blocker);

        scratch.write("value", "lost");
        assert_eq!(scratch.read("value", "default".to_string()), "default");
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scratch = ScratchDirectory::new(dir.path());
        let item = TemporaryDiskItem::in_directory("k", 1u32, scratch.clone());

        item.set(&7);
        assert_eq!(item.get(), 7);
        item.remove();
        item.remove();
        assert_eq!(item.get(), 1);
        assert!(!scratch.path_for("k").exists());
    }

    #[test]
    fn durable_slot_reads_back_writes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let item = TemporaryDiskItem::in_directory("slot", struct1(), ScratchDirectory::new(dir.path()));
        item.write(struct2()).expect("infallible");
        assert_eq!(item.read().expect("infallible"), struct2());
    }
}
