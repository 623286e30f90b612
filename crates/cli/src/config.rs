//! Loads a [`filesstage_config::Config`] from a JSON file, either named on
//! the command line or via the `FILES_STAGE_CONFIG` environment variable.

use std::fs::File;
use std::io::BufReader;

use anyhow::{Context, Result};
use camino::Utf8Path;
use fn_error_context::context;
use filesstage_config::Config;

/// Overrides the `--config` argument when set.
pub const CONFIG_VAR: &str = "FILES_STAGE_CONFIG";

#[context("loading config")]
pub fn load(path: Option<&Utf8Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_owned(),
        None => camino::Utf8PathBuf::from(
            std::env::var(CONFIG_VAR)
                .with_context(|| format!("no --config given and {CONFIG_VAR} is unset"))?,
        ),
    };
    let f = File::open(&path)
        .with_context(|| format!("opening {path}"))
        .map(BufReader::new)?;
    serde_json::from_reader(f).with_context(|| format!("parsing config from {path}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_minimal_config() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"storage":{{}},"passwd":{{}},"systemd":{{}},"networkd":{{}}}}"#).unwrap();
        let path = Utf8Path::from_path(f.path()).unwrap();
        let config = load(Some(path)).unwrap();
        assert!(config.storage.filesystems.is_empty());
    }

    #[test]
    fn rejects_unknown_top_level_field() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"storage":{{}},"bogus":true}}"#).unwrap();
        let path = Utf8Path::from_path(f.path()).unwrap();
        assert!(load(Some(path)).is_err());
    }
}
