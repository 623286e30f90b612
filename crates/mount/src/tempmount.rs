use std::cell::Cell;
use std::process::Command;

use anyhow::{bail, Context, Result};
use camino::Utf8Path;
use fn_error_context::context;
use rustix::mount::{mount, unmount, MountFlags, UnmountFlags};

/// A live mount of a device onto a uniquely-named temporary directory.
///
/// The mount is torn down exactly once: either explicitly via [`TempMount::close`]
/// (which surfaces the unmount error to the caller) or, failing that, on drop
/// (which only logs). `format == "ntfs"` is special-cased to shell out to
/// `mount`/`umount`, since NTFS is handled by a FUSE-style helper rather than
/// the native mount syscall.
#[derive(Debug)]
pub struct TempMount {
    dir: tempfile::TempDir,
    device: String,
    format: String,
    released: Cell<bool>,
}

impl TempMount {
    /// Mount `device` (of type `format`) with `options`, onto a fresh temporary
    /// directory prefixed with [`crate::TEMPDIR_PREFIX`].
    #[context("Mounting {device} ({format})")]
    pub(crate) fn mount(device: &str, format: &str, options: &str) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(crate::TEMPDIR_PREFIX)
            .tempdir()
            .context("creating temporary mount directory")?;
        let target = Utf8Path::from_path(dir.path())
            .ok_or_else(|| anyhow::anyhow!("temporary directory path is not UTF-8"))?;

        tracing::info!(device, format, %target, "mounting");
        if format == "ntfs" {
            mount_ntfs(device, target)?;
        } else {
            mount(device, target, format, MountFlags::empty(), options)
                .with_context(|| format!("mounting {device} at {target}"))?;
        }

        Ok(Self {
            dir,
            device: device.to_owned(),
            format: format.to_owned(),
            released: Cell::new(false),
        })
    }

    /// The destination root of the live mount.
    pub fn path(&self) -> &Utf8Path {
        Utf8Path::from_path(self.dir.path()).expect("validated UTF-8 at construction")
    }

    /// Unmount now, surfacing any failure. Idempotent: a second call (or the
    /// eventual drop) is a no-op once this has run.
    pub fn close(&self) -> Result<()> {
        if self.released.replace(true) {
            return Ok(());
        }
        self.do_unmount()
    }

    fn do_unmount(&self) -> Result<()> {
        let target = self.path();
        tracing::info!(device = %self.device, %target, "unmounting");
        if self.format == "ntfs" {
            unmount_ntfs(target)
        } else {
            unmount(target, UnmountFlags::empty()).context("unmount")
        }
    }
}

fn mount_ntfs(device: &str, target: &Utf8Path) -> Result<()> {
    let status = Command::new("mount")
        .args(["-t", "ntfs", device, target.as_str()])
        .status()
        .context("spawning mount(8)")?;
    if !status.success() {
        bail!("mount -t ntfs {device} {target} exited with {status}");
    }
    Ok(())
}

fn unmount_ntfs(target: &Utf8Path) -> Result<()> {
    let status = Command::new("umount")
        .arg(target.as_str())
        .status()
        .context("spawning umount(8)")?;
    if !status.success() {
        bail!("umount {target} exited with {status}");
    }
    Ok(())
}

impl Drop for TempMount {
    fn drop(&mut self) {
        if self.released.get() {
            return;
        }
        if let Err(e) = self.do_unmount() {
            tracing::warn!("failed to unmount {}: {e:#}", self.device);
        }
    }
}
