//! Groups every configured entry by the filesystem it targets, in the order
//! each filesystem's materialization should realize them (§4.3 "Planner").

use std::collections::BTreeMap;

use filesstage_config::{Config, Directory, File, FileContents, Filesystem, Node};

use crate::dataurl;
use crate::depth::depth;
use crate::entry::Entry;
use crate::error::StageError;

/// filesystem-name -> ordered entries to realize there.
pub type EntryPlan = BTreeMap<String, Vec<Entry>>;

/// Build the [`EntryPlan`] for `config` (§4.3).
///
/// Ordering within a filesystem's entries is: directories sorted by depth,
/// then synthesized mount-point directories, then files, then links, then
/// (on the root filesystem only) the synthesized `/etc/fstab` file last —
/// the order the original source actually appends in, not the order its
/// own prose summary suggests.
pub fn plan(config: &Config) -> Result<EntryPlan, StageError> {
    // Index filesystems by name; last declaration wins on duplicates.
    let mut filesystems: BTreeMap<&str, &Filesystem> = BTreeMap::new();
    for fs in &config.storage.filesystems {
        filesystems.insert(fs.name.as_str(), fs);
    }

    // Deduplicated: a redeclared filesystem (§9, "earlier stages may
    // redeclare a filesystem after reformat") must only contribute one
    // mount point, one synthesized directory, and one fstab line.
    let mount_points: Vec<(&str, &str)> = filesystems
        .values()
        .filter_map(|fs| Some((fs.name.as_str(), fs.mount_point()?)))
        .collect();
    let root_fs = config.storage.filesystems.iter().filter(|fs| fs.is_root()).last();

    let mut entry_plan: EntryPlan = BTreeMap::new();

    let mut directories: Vec<&Directory> = config.storage.directories.iter().collect();
    directories.sort_by_key(|d| depth(&d.node.path));

    for d in directories {
        let fs = lookup(&filesystems, &d.node.filesystem)?;
        push(&mut entry_plan, fs, Entry::Directory(d.clone()));
    }

    if let Some(root) = root_fs {
        // §3 "Entry Plan": a synthesized mount-point directory is only
        // needed for *other* filesystems — the root's own mount point is
        // "/" itself, which always exists and needs no directory creation.
        for (name, mount_point) in &mount_points {
            if *name == root.name {
                continue;
            }
            push(
                &mut entry_plan,
                root,
                Entry::Directory(Directory {
                    node: Node::new(root.name.clone(), mount_point.to_owned()),
                }),
            );
        }
    }

    for f in &config.storage.files {
        let fs = lookup(&filesystems, &f.node.filesystem)?;
        push(&mut entry_plan, fs, Entry::File(f.clone()));
    }

    for l in &config.storage.links {
        let fs = lookup(&filesystems, &l.node.filesystem)?;
        push(&mut entry_plan, fs, Entry::Link(l.clone()));
    }

    if let Some(root) = root_fs {
        if !mount_points.is_empty() {
            let mut records = filesstage_config::pseudo_filesystem_records();
            for (name, _) in &mount_points {
                if let Some(fs) = filesystems.get(name) {
                    if let Some(rec) = filesstage_config::record_for_filesystem(fs) {
                        records.push(rec);
                    }
                }
            }
            let body = filesstage_config::render(&records);
            push(
                &mut entry_plan,
                root,
                Entry::File(File {
                    node: Node::new(root.name.clone(), "/etc/fstab"),
                    contents: FileContents {
                        sources: vec![dataurl::encode(&body)],
                        verification: None,
                    },
                    append: false,
                }),
            );
        }
    }

    Ok(entry_plan)
}

fn lookup<'a>(
    filesystems: &BTreeMap<&str, &'a Filesystem>,
    name: &str,
) -> Result<&'a Filesystem, StageError> {
    filesystems
        .get(name)
        .copied()
        .ok_or_else(|| StageError::FilesystemUndefined(name.to_owned()))
}

fn push(plan: &mut EntryPlan, fs: &Filesystem, entry: Entry) {
    plan.entry(fs.name.clone()).or_default().push(entry);
}

#[cfg(test)]
mod tests {
    use super::*;
    use filesstage_config::{Link, Mount};

    fn root_filesystem(point: &str) -> Filesystem {
        Filesystem {
            name: "root".into(),
            path: None,
            mount: Some(Mount {
                device: "/dev/sda1".into(),
                format: "ext4".into(),
                label: Some("root".into()),
                point: Some(point.into()),
                options: vec![],
                boot_filesystem: false,
            }),
            images: None,
        }
    }

    #[test]
    fn unknown_filesystem_reference_errors() {
        let config = Config {
            storage: filesstage_config::Storage {
                directories: vec![Directory {
                    node: Node::new("nope", "/a"),
                }],
                ..Default::default()
            },
            ..Default::default()
        };
        let err = plan(&config).unwrap_err();
        assert!(matches!(err, StageError::FilesystemUndefined(name) if name == "nope"));
    }

    #[test]
    fn directories_sorted_by_depth_and_fstab_lands_after_links() {
        let root = root_filesystem("/");
        let config = Config {
            storage: filesstage_config::Storage {
                filesystems: vec![root.clone()],
                directories: vec![
                    Directory {
                        node: Node::new("root", "/a/b/c"),
                    },
                    Directory {
                        node: Node::new("root", "/a"),
                    },
                ],
                files: vec![File {
                    node: Node::new("root", "/etc/hostname"),
                    contents: FileContents {
                        sources: vec!["data:,x".into()],
                        verification: None,
                    },
                    append: false,
                }],
                links: vec![Link {
                    node: Node::new("root", "/etc/mtab"),
                    target: "/proc/mounts".into(),
                    hard: false,
                }],
                ..Default::default()
            },
            ..Default::default()
        };

        let entry_plan = plan(&config).unwrap();
        let entries = &entry_plan["root"];
        let paths: Vec<&str> = entries.iter().map(Entry::path).collect();

        assert_eq!(
            paths,
            vec!["/a", "/a/b/c", "/etc/hostname", "/etc/mtab", "/etc/fstab"]
        );
    }

    #[test]
    fn empty_config_has_no_root_entries_when_no_mount_point() {
        let config = Config::default();
        let entry_plan = plan(&config).unwrap();
        assert!(entry_plan.is_empty());
    }

    #[test]
    fn duplicate_filesystem_name_last_one_wins() {
        let mut first = root_filesystem("/");
        first.mount.as_mut().unwrap().device = "/dev/sda1".into();
        let mut second = root_filesystem("/");
        second.mount.as_mut().unwrap().device = "/dev/sdb1".into();

        let config = Config {
            storage: filesstage_config::Storage {
                filesystems: vec![first, second],
                directories: vec![Directory {
                    node: Node::new("root", "/a"),
                }],
                ..Default::default()
            },
            ..Default::default()
        };

        let entry_plan = plan(&config).unwrap();
        // Both filesystems share the name "root"; the planner should not
        // error, and the redeclaration must not double anything: exactly
        // the "/a" directory plus one fstab file (no synthesized directory
        // for root's own mount point, and no duplicate `LABEL=root` line).
        assert_eq!(entry_plan["root"].len(), 2);
        let fstab = entry_plan["root"].last().unwrap();
        assert_eq!(fstab.path(), "/etc/fstab");
    }

    #[test]
    fn scenario_s4_no_spurious_root_mountpoint_directory() {
        let root = root_filesystem("/");
        let mut data = root_filesystem("/var/data");
        data.name = "data".into();
        data.mount.as_mut().unwrap().label = Some("data".into());
        data.mount.as_mut().unwrap().device = "/dev/sda2".into();
        data.mount.as_mut().unwrap().format = "xfs".into();

        let config = Config {
            storage: filesstage_config::Storage {
                filesystems: vec![root, data],
                ..Default::default()
            },
            ..Default::default()
        };

        let entry_plan = plan(&config).unwrap();
        let root_entries = &entry_plan["root"];
        let paths: Vec<&str> = root_entries.iter().map(Entry::path).collect();

        // Exactly one synthesized directory (for "data", not for root's own
        // "/") plus the fstab file -- never a spurious Directory("/").
        assert_eq!(paths, vec!["/var/data", "/etc/fstab"]);
    }
}
