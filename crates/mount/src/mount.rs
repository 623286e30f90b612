//! Scoped mounts for the files stage.
//!
//! A [`MountScope`] is acquired once per configured filesystem and yields the
//! destination root that the rest of the stage materializes entries under. It
//! is released on every exit path: normal completion calls [`MountScope::close`]
//! explicitly so an unmount failure can still fail the stage, while the `Drop`
//! impl of the underlying [`TempMount`] is the backstop for early returns and
//! unwinding.

mod tempmount;

pub use tempmount::TempMount;

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};

/// Prefix for the temporary directories this crate allocates when it owns a mount.
pub const TEMPDIR_PREFIX: &str = "ignition-files";

/// The destination root for a single configured filesystem, for the duration
/// of one materialization pass.
#[derive(Debug)]
pub enum MountScope {
    /// The filesystem already had a mounted path in its configuration; nothing
    /// to mount or unmount.
    Preexisting(Utf8PathBuf),
    /// We own the mount and the temporary directory backing it.
    Owned(TempMount),
}

impl MountScope {
    /// Reuse an already-mounted path; closing this scope is a no-op.
    pub fn preexisting(path: impl Into<Utf8PathBuf>) -> Self {
        Self::Preexisting(path.into())
    }

    /// Mount `device` (of type `format`, with mount `options`) onto a fresh
    /// temporary directory.
    pub fn mount_device(device: &str, format: &str, options: &str) -> Result<Self> {
        Ok(Self::Owned(TempMount::mount(device, format, options)?))
    }

    /// The directory entries should be realized under.
    pub fn root(&self) -> &Utf8Path {
        match self {
            Self::Preexisting(p) => p.as_path(),
            Self::Owned(t) => t.path(),
        }
    }

    /// Release the scope. For an owned mount this unmounts and surfaces any
    /// failure; callers on the success path should propagate this error, since
    /// an unmount failure there becomes the stage's own failure.
    pub fn close(self) -> Result<()> {
        match self {
            Self::Preexisting(_) => Ok(()),
            Self::Owned(t) => t.close(),
        }
    }
}
