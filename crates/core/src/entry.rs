//! The tagged union of the three creatable filesystem objects, and their
//! realization contracts against a destination root (§4.2 "Entry Variants").

use std::io;
use std::os::fd::AsFd;

use anyhow::Context;
use camino::Utf8Path;
use cap_std_ext::cap_std::fs::Dir;
use cap_std_ext::dirext::CapStdExtDirExt;
use fn_error_context::context;

use filesstage_config::{Directory, File, Link, NodeUser};

use crate::error::StageError;
use crate::passwd::AccountManager;

/// Resolves a [`filesstage_config::FileContents`]'s sources into bytes and
/// writes them under `root` (§6 "Fetcher"). Honors `file.append`.
pub trait Fetcher {
    fn fetch(&self, root: &Dir, file: &File) -> anyhow::Result<()>;
}

/// One realizable filesystem object, already resolved to a single filesystem
/// by the Planner.
#[derive(Debug, Clone)]
pub enum Entry {
    Directory(Directory),
    File(File),
    Link(Link),
}

impl Entry {
    pub fn path(&self) -> &str {
        match self {
            Entry::Directory(d) => &d.node.path,
            Entry::File(f) => &f.node.path,
            Entry::Link(l) => &l.node.path,
        }
    }

    /// Realize this entry under `root` (§4.2).
    pub fn realize(
        &self,
        root: &Dir,
        fetcher: &dyn Fetcher,
        accounts: &dyn AccountManager,
    ) -> Result<(), StageError> {
        let result = match self {
            Entry::Directory(d) => realize_directory(root, d, accounts),
            Entry::File(f) => realize_file(root, f, fetcher),
            Entry::Link(l) => realize_link(root, l),
        };
        result.map_err(|source| StageError::EntryCreation {
            path: self.path().to_owned(),
            source,
        })
    }
}

fn resolve_id(user: &Option<NodeUser>, lookup: impl FnOnce(&str) -> anyhow::Result<u32>) -> anyhow::Result<u32> {
    match user {
        None => Ok(0),
        Some(NodeUser { id: Some(id), .. }) => Ok(*id),
        Some(NodeUser { name: Some(name), .. }) => lookup(name),
        Some(NodeUser { id: None, name: None }) => Ok(0),
    }
}

#[context("resolving owner")]
fn resolve_uid_gid(
    node: &filesstage_config::Node,
    accounts: &dyn AccountManager,
) -> anyhow::Result<(u32, u32)> {
    let uid = resolve_id(&node.user, |name| accounts.uid_for_name(name))?;
    let gid = resolve_id(&node.group, |name| accounts.gid_for_name(name))?;
    Ok((uid, gid))
}

fn chown_chmod(root: &Dir, path: &Utf8Path, mode: u32, uid: u32, gid: u32) -> anyhow::Result<()> {
    let dirfd = root.as_fd();
    rustix::fs::chmodat(dirfd, path.as_str(), rustix::fs::Mode::from_raw_mode(mode))
        .with_context(|| format!("chmod {path}"))?;
    rustix::fs::chownat(
        dirfd,
        path.as_str(),
        Some(rustix::fs::Uid::from_raw(uid)),
        Some(rustix::fs::Gid::from_raw(gid)),
        rustix::fs::AtFlags::empty(),
    )
    .with_context(|| format!("chown {path}"))?;
    Ok(())
}

/// Remove whatever is at `path`, unless it's already a directory (directory
/// creation is idempotent and must not blow away existing contents).
fn clear_non_directory(root: &Dir, path: &str) -> anyhow::Result<()> {
    match root.symlink_metadata(path) {
        Ok(meta) if !meta.is_dir() => root
            .remove_file(path)
            .with_context(|| format!("removing {path}")),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("stat {path}")),
    }
}

/// Unconditionally remove whatever is at `path`, of any type.
fn delete_path_on_overwrite(root: &Dir, path: &str) -> anyhow::Result<()> {
    match root.symlink_metadata(path) {
        Ok(meta) => {
            if meta.is_dir() {
                root.remove_dir_all(path)
            } else {
                root.remove_file(path)
            }
            .with_context(|| format!("removing {path}"))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("stat {path}")),
    }
}

#[context("creating directory {}", d.node.path)]
fn realize_directory(root: &Dir, d: &Directory, accounts: &dyn AccountManager) -> anyhow::Result<()> {
    let path = d.node.relative_path();
    if path.is_empty() {
        anyhow::bail!("empty directory path");
    }

    if d.node.should_overwrite() {
        clear_non_directory(root, path)?;
    }

    let (uid, gid) = resolve_uid_gid(&d.node, accounts)?;
    let mode = d.node.mode.unwrap_or(0);

    // Walk from the immediate parent upward, recording ancestors that don't
    // yet exist. Stop at the first one that does: everything above it is
    // presumed to exist too, and must not have its ownership touched.
    let mut new_ancestors = Vec::new();
    let mut cursor = Utf8Path::new(path);
    while let Some(parent) = cursor.parent() {
        if parent.as_str().is_empty() {
            break;
        }
        if root.try_exists(parent.as_str())? {
            break;
        }
        new_ancestors.push(parent.to_owned());
        cursor = parent;
    }

    root.create_dir_all(path)
        .with_context(|| format!("mkdir -p {path}"))?;

    for p in new_ancestors.iter().rev() {
        chown_chmod(root, p, mode, uid, gid)?;
    }
    chown_chmod(root, Utf8Path::new(path), mode, uid, gid)?;

    Ok(())
}

#[context("creating file {}", f.node.path)]
fn realize_file(root: &Dir, f: &File, fetcher: &dyn Fetcher) -> anyhow::Result<()> {
    if !f.append && f.node.should_overwrite() {
        delete_path_on_overwrite(root, f.node.relative_path())?;
    }
    fetcher.fetch(root, f)
}

#[context("creating link {} -> {}", l.node.path, l.target)]
fn realize_link(root: &Dir, l: &Link) -> anyhow::Result<()> {
    let path = l.node.relative_path();
    if l.node.should_overwrite() {
        delete_path_on_overwrite(root, path)?;
    }
    if l.hard {
        root.hard_link(l.target.trim_start_matches('/'), root, path)
            .with_context(|| format!("hard linking {path} -> {}", l.target))
    } else {
        root.symlink_contents(&l.target, path)
            .with_context(|| format!("symlinking {path} -> {}", l.target))
    }
}
