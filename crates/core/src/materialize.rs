//! Per-filesystem materialization: obtain a [`MountScope`], apply any image,
//! realize the filesystem's plan entries, run the boot-installer hook if
//! applicable, then release the mount (§4.5 "Materializer").

use anyhow::Context;
use camino::Utf8PathBuf;
use cap_std_ext::cap_std::{ambient_authority, fs::Dir};
use filesstage_config::{Config, Filesystem, Image};
use filesstage_mount::MountScope;

use crate::entry::Fetcher;
use crate::error::StageError;
use crate::passwd::AccountManager;
use crate::plan::EntryPlan;

/// Applies a disk image onto a mounted destination root (§6 "Image
/// applier"). The core never unpacks images itself.
pub trait ImageApplier {
    fn apply(&self, image: &Image, root: &camino::Utf8Path) -> anyhow::Result<()>;
}

/// Installs bootloader artifacts on the filesystem marked `boot_filesystem`
/// (§4.5, §9 "Boot-filesystem hook"). The default is a no-op.
pub trait BootInstaller {
    fn install(&self, root: &camino::Utf8Path, device: &str) -> anyhow::Result<()> {
        let _ = (root, device);
        Ok(())
    }
}

/// The reserved no-op [`BootInstaller`].
#[derive(Debug, Default)]
pub struct NoopBootInstaller;

impl BootInstaller for NoopBootInstaller {}

/// Materialize every configured filesystem, in declaration order (§9
/// "Filesystem iteration order" — never scheduled off the plan map).
pub fn materialize(
    config: &Config,
    plan: &EntryPlan,
    fetcher: &dyn Fetcher,
    accounts: &dyn AccountManager,
    images: &dyn ImageApplier,
    boot: &dyn BootInstaller,
) -> Result<(), StageError> {
    for fs in &config.storage.filesystems {
        materialize_one(fs, plan, fetcher, accounts, images, boot)?;
    }
    Ok(())
}

fn materialize_one(
    fs: &Filesystem,
    plan: &EntryPlan,
    fetcher: &dyn Fetcher,
    accounts: &dyn AccountManager,
    images: &dyn ImageApplier,
    boot: &dyn BootInstaller,
) -> Result<(), StageError> {
    let _span = tracing::info_span!("filesystem", name = %fs.name).entered();

    let scope = open_scope(fs)?;
    let result = materialize_inner(fs, &scope, plan, fetcher, accounts, images, boot);

    match result {
        Ok(()) => scope.close().map_err(|source| StageError::Unmount {
            name: fs.name.clone(),
            source,
        }),
        Err(e) => {
            if let Err(unmount_err) = scope.close() {
                tracing::warn!(error = %unmount_err, "unmount after failure also failed");
            }
            Err(e)
        }
    }
}

fn open_scope(fs: &Filesystem) -> Result<MountScope, StageError> {
    if let Some(path) = &fs.path {
        return Ok(MountScope::preexisting(Utf8PathBuf::from(path.as_str())));
    }
    let mount = fs.mount.as_ref().ok_or_else(|| StageError::Mount {
        name: fs.name.clone(),
        source: anyhow::anyhow!("filesystem has neither a preexisting path nor a mount descriptor"),
    })?;
    let options = mount.options.join(",");
    MountScope::mount_device(&mount.device, &mount.format, &options).map_err(|source| {
        StageError::Mount {
            name: fs.name.clone(),
            source,
        }
    })
}

fn materialize_inner(
    fs: &Filesystem,
    scope: &MountScope,
    plan: &EntryPlan,
    fetcher: &dyn Fetcher,
    accounts: &dyn AccountManager,
    images: &dyn ImageApplier,
    boot: &dyn BootInstaller,
) -> Result<(), StageError> {
    let root_path = scope.root();

    for image in fs.images.iter().flatten() {
        images.apply(image, root_path).map_err(|source| StageError::Image {
            name: fs.name.clone(),
            source,
        })?;
    }

    let root = Dir::open_ambient_dir(root_path.as_std_path(), ambient_authority())
        .with_context(|| format!("opening destination root {root_path}"))
        .map_err(|source| StageError::Mount {
            name: fs.name.clone(),
            source,
        })?;

    for entry in plan.get(fs.name.as_str()).into_iter().flatten() {
        entry.realize(&root, fetcher, accounts)?;
    }

    if fs.mount.as_ref().is_some_and(|m| m.boot_filesystem) {
        let device = fs.mount.as_ref().map(|m| m.device.as_str()).unwrap_or_default();
        boot.install(root_path, device).map_err(|source| StageError::Image {
            name: fs.name.clone(),
            source,
        })?;
    }

    Ok(())
}
