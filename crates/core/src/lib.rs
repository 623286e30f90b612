//! The files stage: validates nothing (that's upstream), and realizes an
//! already-validated [`filesstage_config::Config`] against a live system.
//!
//! Execution order (§4.1, §10.6): accounts first (directory/file ownership
//! can reference them by name), then every configured filesystem mounted,
//! populated, and released in turn, then systemd/networkd units written and
//! their enable/disable/mask lifecycle applied.

pub mod dataurl;
mod depth;
mod entry;
mod error;
mod materialize;
mod passwd;
mod plan;
mod units;

pub use entry::{Entry, Fetcher};
pub use error::StageError;
pub use materialize::{BootInstaller, ImageApplier, NoopBootInstaller};
pub use passwd::AccountManager;
pub use plan::{plan as build_plan, EntryPlan};
pub use units::UnitWriter;

use camino::Utf8Path;
use cap_std_ext::cap_std::{ambient_authority, fs::Dir};
use filesstage_config::Config;

/// Every collaborator the stage needs injected, since each is either
/// genuinely out of scope (account manager, fetcher, unit writer, image
/// applier) or a reserved extension point (boot installer).
pub struct Collaborators<'a> {
    pub fetcher: &'a dyn Fetcher,
    pub accounts: &'a dyn AccountManager,
    pub images: &'a dyn ImageApplier,
    pub boot: &'a dyn BootInstaller,
    pub units: &'a dyn UnitWriter,
}

/// Run the files stage: accounts, then filesystems, then units.
///
/// `stage_root` is the already-mounted top-level destination the Passwd and
/// Units orchestrators write against; it is distinct from any per-filesystem
/// mount scope the Materializer opens for `config.storage.filesystems`.
pub fn run(config: &Config, stage_root: &Utf8Path, collab: &Collaborators<'_>) -> Result<(), StageError> {
    let _span = tracing::info_span!("files").entered();

    passwd::run(config, collab.accounts)?;

    let entry_plan = plan::plan(config)?;
    materialize::materialize(
        config,
        &entry_plan,
        collab.fetcher,
        collab.accounts,
        collab.images,
        collab.boot,
    )?;

    let root = Dir::open_ambient_dir(stage_root.as_std_path(), ambient_authority())
        .map_err(|e| StageError::StageRoot(anyhow::Error::from(e)))?;
    units::run(&config.systemd, &config.networkd, collab.units, collab.fetcher, &root)?;

    Ok(())
}
