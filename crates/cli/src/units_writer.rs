//! Enables, disables, and masks systemd units by symlinking them into the
//! target `.wants` directories named by their own `[Unit]` `WantedBy=`
//! lines, the same pattern the bootloader generator in this crate's teacher
//! repo uses for its own units.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use cap_std_ext::cap_std::fs::Dir;
use cap_std_ext::dirext::CapStdExtDirExt;
use filesstage_config::Unit;
use filesstage_core::UnitWriter;

const DEFAULT_TARGET: &str = "multi-user.target";
const SYSTEM_UNIT_DIR: &str = "etc/systemd/system";

#[derive(Debug)]
pub struct SystemdUnitWriter {
    root: Dir,
}

impl SystemdUnitWriter {
    pub fn new(root: Dir) -> Self {
        Self { root }
    }

    fn unit_dir(&self) -> Result<Dir> {
        self.root
            .create_dir_all(SYSTEM_UNIT_DIR)
            .with_context(|| format!("creating {SYSTEM_UNIT_DIR}"))?;
        self.root
            .open_dir(SYSTEM_UNIT_DIR)
            .with_context(|| format!("opening {SYSTEM_UNIT_DIR}"))
    }

    fn wanted_by(&self, unit: &Unit) -> Vec<String> {
        let targets: Vec<String> = unit
            .contents
            .lines()
            .filter_map(|l| l.strip_prefix("WantedBy="))
            .flat_map(|v| v.split_whitespace())
            .map(str::to_owned)
            .collect();
        if targets.is_empty() {
            vec![DEFAULT_TARGET.to_owned()]
        } else {
            targets
        }
    }
}

impl UnitWriter for SystemdUnitWriter {
    fn enable_unit(&self, unit: &Unit) -> Result<()> {
        let unit_dir = self.unit_dir()?;
        for target in self.wanted_by(unit) {
            let wants = Utf8PathBuf::from(format!("{target}.wants"));
            unit_dir
                .create_dir_all(&wants)
                .with_context(|| format!("creating {wants}"))?;
            let source = format!("../{}", unit.name);
            let link = wants.join(&unit.name);
            unit_dir.remove_file_optional(&link)?;
            unit_dir
                .symlink_contents(&source, &link)
                .with_context(|| format!("enabling {} under {target}", unit.name))?;
        }
        Ok(())
    }

    fn disable_unit(&self, unit: &Unit) -> Result<()> {
        let unit_dir = self.unit_dir()?;
        for target in self.wanted_by(unit) {
            let link = Utf8Path::new(&format!("{target}.wants")).join(&unit.name);
            unit_dir
                .remove_file_optional(&link)
                .with_context(|| format!("disabling {} under {target}", unit.name))?;
        }
        Ok(())
    }

    fn mask_unit(&self, unit: &Unit) -> Result<()> {
        let unit_dir = self.unit_dir()?;
        unit_dir.remove_file_optional(&unit.name)?;
        unit_dir
            .symlink_contents("/dev/null", &unit.name)
            .with_context(|| format!("masking {}", unit.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cap_std_ext::cap_std::ambient_authority;

    fn writer() -> (tempfile::TempDir, SystemdUnitWriter) {
        let tmp = tempfile::tempdir().unwrap();
        let root = Dir::open_ambient_dir(tmp.path(), ambient_authority()).unwrap();
        (tmp, SystemdUnitWriter::new(root))
    }

    fn unit(name: &str, contents: &str) -> Unit {
        Unit {
            name: name.into(),
            enabled: None,
            enable: false,
            mask: false,
            contents: contents.into(),
            dropins: vec![],
        }
    }

    #[test]
    fn enable_uses_declared_wanted_by_target() {
        let (_tmp, writer) = writer();
        let u = unit("foo.service", "[Unit]\n[Install]\nWantedBy=graphical.target\n");
        writer.enable_unit(&u).unwrap();

        let unit_dir = writer.unit_dir().unwrap();
        assert!(unit_dir
            .try_exists("graphical.target.wants/foo.service")
            .unwrap());
    }

    #[test]
    fn enable_defaults_to_multi_user_target() {
        let (_tmp, writer) = writer();
        let u = unit("foo.service", "[Unit]\n");
        writer.enable_unit(&u).unwrap();

        let unit_dir = writer.unit_dir().unwrap();
        assert!(unit_dir
            .try_exists("multi-user.target.wants/foo.service")
            .unwrap());
    }

    #[test]
    fn mask_symlinks_to_dev_null() {
        let (_tmp, writer) = writer();
        let u = unit("foo.service", "");
        writer.mask_unit(&u).unwrap();

        let unit_dir = writer.unit_dir().unwrap();
        let target = unit_dir.read_link_contents("foo.service").unwrap();
        assert_eq!(target, Utf8PathBuf::from("/dev/null"));
    }
}
