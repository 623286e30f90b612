//! Entrypoint for the files-stage binary: parses arguments, loads the
//! config, wires up the concrete collaborators, and runs the stage.

mod accounts;
mod config;
mod fetcher;
mod images;
mod units_writer;

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use cap_std_ext::cap_std::{ambient_authority, fs::Dir};
use clap::Parser;

use accounts::ShellAccountManager;
use fetcher::LocalFetcher;
use filesstage_core::{Collaborators, NoopBootInstaller};
use images::UnimplementedImageApplier;
use units_writer::SystemdUnitWriter;

/// Realizes a first-boot provisioning config's files, accounts, and units
/// against an already-mounted system root.
#[derive(Debug, Parser)]
#[command(name = filesstage_utils::NAME, version)]
struct Args {
    /// Path to the JSON config. Falls back to FILES_STAGE_CONFIG if unset.
    #[arg(long)]
    config: Option<Utf8PathBuf>,

    /// The already-mounted destination the Passwd and Units orchestrators
    /// operate against.
    #[arg(long, default_value = "/")]
    stage_root: Utf8PathBuf,

    /// Build and print the entry plan without touching the system.
    #[arg(long)]
    dry_run: bool,

    /// Increase log verbosity (stackable).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let args = Args::parse();
    filesstage_utils::initialize_tracing(args.verbose);
    filesstage_utils::run_main(|| run(args));
}

fn run(args: Args) -> Result<()> {
    let config = config::load(args.config.as_deref())?;

    if args.dry_run {
        let plan = filesstage_core::build_plan(&config).context("building entry plan")?;
        for (fs, entries) in &plan {
            println!("{fs}:");
            for entry in entries {
                println!("  {entry:?}");
            }
        }
        return Ok(());
    }

    let stage_root_dir = Dir::open_ambient_dir(args.stage_root.as_std_path(), ambient_authority())
        .with_context(|| format!("opening stage root {}", args.stage_root))?;

    let fetcher = LocalFetcher;
    let accounts = ShellAccountManager::new(args.stage_root.clone());
    let images = UnimplementedImageApplier;
    let boot = NoopBootInstaller;
    let units = SystemdUnitWriter::new(stage_root_dir);

    let collab = Collaborators {
        fetcher: &fetcher,
        accounts: &accounts,
        images: &images,
        boot: &boot,
        units: &units,
    };

    filesstage_core::run(&config, &args.stage_root, &collab).context("running files stage")
}
