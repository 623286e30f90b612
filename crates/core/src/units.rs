//! Writes systemd and networkd unit files and drop-ins, then applies a
//! systemd unit's enable/disable/mask side effects (§4.7 "Units
//! Orchestrator"). Runs after filesystem materialization, against the
//! stage's top-level destination root rather than a per-[`filesstage_config::Filesystem`]
//! mount scope.

use cap_std_ext::cap_std::fs::Dir;
use filesstage_config::{Dropin, File, FileContents, Networkd, NetworkdUnit, Node, Systemd, Unit};

use crate::dataurl;
use crate::entry::Fetcher;
use crate::error::StageError;

/// Translates unit/drop-in descriptors into [`File`]s, and applies a systemd
/// unit's enable/disable/mask side effects (§6 "Unit writer helpers").
///
/// The translation methods have a default implementation, since turning a
/// unit descriptor into a `File` is a pure data transform; enabling, disabling,
/// and masking genuinely touch the host (symlinks under `.wants`, `/dev/null`
/// masks) and are left to the implementor.
pub trait UnitWriter {
    fn unit_file(&self, unit: &Unit) -> File {
        literal_file(format!("etc/systemd/system/{}", unit.name), &unit.contents)
    }

    fn unit_dropin_file(&self, unit: &Unit, dropin: &Dropin) -> File {
        literal_file(
            format!("etc/systemd/system/{}.d/{}", unit.name, dropin.name),
            &dropin.contents,
        )
    }

    fn networkd_unit_file(&self, unit: &NetworkdUnit) -> File {
        literal_file(format!("etc/systemd/network/{}", unit.name), &unit.contents)
    }

    fn networkd_unit_dropin_file(&self, unit: &NetworkdUnit, dropin: &Dropin) -> File {
        literal_file(
            format!("etc/systemd/network/{}.d/{}", unit.name, dropin.name),
            &dropin.contents,
        )
    }

    /// Symlink `unit` into the `.wants` directory of whatever it's wanted by.
    fn enable_unit(&self, unit: &Unit) -> anyhow::Result<()>;
    /// Remove `unit` from every `.wants` directory that references it.
    fn disable_unit(&self, unit: &Unit) -> anyhow::Result<()>;
    /// Symlink `unit` to `/dev/null`.
    fn mask_unit(&self, unit: &Unit) -> anyhow::Result<()>;
}

fn literal_file(path: String, contents: &str) -> File {
    File {
        node: Node::new("root", path),
        contents: FileContents {
            sources: vec![dataurl::encode(contents)],
            verification: None,
        },
        append: false,
    }
}

/// Write every unit and drop-in, then apply systemd's enable/disable/mask
/// lifecycle (§4.7). `root` is the stage's top-level destination, already
/// mounted by an earlier out-of-scope stage.
pub fn run(
    systemd: &Systemd,
    networkd: &Networkd,
    writer: &dyn UnitWriter,
    fetcher: &dyn Fetcher,
    root: &Dir,
) -> Result<(), StageError> {
    for unit in &systemd.units {
        write_systemd_unit(unit, writer, fetcher, root)?;

        if unit.enable {
            tracing::warn!(unit = %unit.name, "`enable` is deprecated in favor of `enabled`");
            writer
                .enable_unit(unit)
                .map_err(|source| unit_err(&unit.name, source))?;
        }

        match unit.enabled {
            Some(true) => writer
                .enable_unit(unit)
                .map_err(|source| unit_err(&unit.name, source))?,
            Some(false) => writer
                .disable_unit(unit)
                .map_err(|source| unit_err(&unit.name, source))?,
            None => {}
        }

        if unit.mask {
            writer
                .mask_unit(unit)
                .map_err(|source| unit_err(&unit.name, source))?;
        }
    }

    for unit in &networkd.units {
        write_networkd_unit(unit, writer, fetcher, root)?;
    }

    Ok(())
}

fn unit_err(unit: &str, source: anyhow::Error) -> StageError {
    StageError::Unit {
        unit: unit.to_owned(),
        source,
    }
}

fn write_systemd_unit(
    unit: &Unit,
    writer: &dyn UnitWriter,
    fetcher: &dyn Fetcher,
    root: &Dir,
) -> Result<(), StageError> {
    for dropin in &unit.dropins {
        if dropin.contents.is_empty() {
            continue;
        }
        let f = writer.unit_dropin_file(unit, dropin);
        fetcher
            .fetch(root, &f)
            .map_err(|source| unit_err(&unit.name, source))?;
    }
    if !unit.contents.is_empty() {
        let f = writer.unit_file(unit);
        fetcher
            .fetch(root, &f)
            .map_err(|source| unit_err(&unit.name, source))?;
    }
    Ok(())
}

fn write_networkd_unit(
    unit: &NetworkdUnit,
    writer: &dyn UnitWriter,
    fetcher: &dyn Fetcher,
    root: &Dir,
) -> Result<(), StageError> {
    for dropin in &unit.dropins {
        if dropin.contents.is_empty() {
            continue;
        }
        let f = writer.networkd_unit_dropin_file(unit, dropin);
        fetcher
            .fetch(root, &f)
            .map_err(|source| unit_err(&unit.name, source))?;
    }
    if !unit.contents.is_empty() {
        let f = writer.networkd_unit_file(unit);
        fetcher
            .fetch(root, &f)
            .map_err(|source| unit_err(&unit.name, source))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cap_std_ext::cap_std::ambient_authority;
    use cap_std_ext::dirext::CapStdExtDirExt;
    use std::cell::RefCell;

    struct RecordingWriter {
        calls: RefCell<Vec<String>>,
    }

    impl UnitWriter for RecordingWriter {
        fn enable_unit(&self, unit: &Unit) -> anyhow::Result<()> {
            self.calls.borrow_mut().push(format!("enable:{}", unit.name));
            Ok(())
        }
        fn disable_unit(&self, unit: &Unit) -> anyhow::Result<()> {
            self.calls.borrow_mut().push(format!("disable:{}", unit.name));
            Ok(())
        }
        fn mask_unit(&self, unit: &Unit) -> anyhow::Result<()> {
            self.calls.borrow_mut().push(format!("mask:{}", unit.name));
            Ok(())
        }
    }

    struct RecordingFetcher;
    impl Fetcher for RecordingFetcher {
        fn fetch(&self, root: &Dir, file: &File) -> anyhow::Result<()> {
            let bytes = dataurl::decode(&file.contents.sources[0]).unwrap();
            root.create_dir_all(
                camino::Utf8Path::new(file.node.relative_path())
                    .parent()
                    .unwrap()
                    .as_str(),
            )?;
            root.atomic_write(file.node.relative_path(), bytes)?;
            Ok(())
        }
    }

    fn unit(name: &str, enabled: Option<bool>, enable: bool, mask: bool) -> Unit {
        Unit {
            name: name.into(),
            enabled,
            enable,
            mask,
            contents: "[Service]\nExecStart=/bin/true\n".into(),
            dropins: vec![],
        }
    }

    #[test]
    fn enabled_true_enables_and_writes_unit_file() {
        let tmp = tempfile::tempdir().unwrap();
        let root = Dir::open_ambient_dir(tmp.path(), ambient_authority()).unwrap();
        let writer = RecordingWriter {
            calls: RefCell::new(vec![]),
        };
        let systemd = Systemd {
            units: vec![unit("foo.service", Some(true), false, false)],
        };

        run(&systemd, &Networkd::default(), &writer, &RecordingFetcher, &root).unwrap();

        assert_eq!(*writer.calls.borrow(), vec!["enable:foo.service"]);
        assert!(root.try_exists("etc/systemd/system/foo.service").unwrap());
    }

    #[test]
    fn deprecated_enable_flag_also_enables() {
        let tmp = tempfile::tempdir().unwrap();
        let root = Dir::open_ambient_dir(tmp.path(), ambient_authority()).unwrap();
        let writer = RecordingWriter {
            calls: RefCell::new(vec![]),
        };
        let systemd = Systemd {
            units: vec![unit("foo.service", None, true, false)],
        };

        run(&systemd, &Networkd::default(), &writer, &RecordingFetcher, &root).unwrap();

        assert_eq!(*writer.calls.borrow(), vec!["enable:foo.service"]);
    }

    #[test]
    fn mask_runs_independently_of_enabled_state() {
        let tmp = tempfile::tempdir().unwrap();
        let root = Dir::open_ambient_dir(tmp.path(), ambient_authority()).unwrap();
        let writer = RecordingWriter {
            calls: RefCell::new(vec![]),
        };
        let systemd = Systemd {
            units: vec![unit("foo.service", Some(false), false, true)],
        };

        run(&systemd, &Networkd::default(), &writer, &RecordingFetcher, &root).unwrap();

        assert_eq!(
            *writer.calls.borrow(),
            vec!["disable:foo.service", "mask:foo.service"]
        );
    }
}
