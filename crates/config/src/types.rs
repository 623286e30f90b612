use serde::{Deserialize, Serialize};

use crate::partition::images_equal;

/// Shared header carried by every creatable filesystem entry (§3 "Node").
///
/// Invariant: `path` is non-empty; a leading `/` is stripped before joining
/// with the destination root (entries address the root filesystem, not the
/// host's own `/`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub path: String,
    pub filesystem: String,
    #[serde(default)]
    pub mode: Option<u32>,
    #[serde(default)]
    pub user: Option<NodeUser>,
    #[serde(default)]
    pub group: Option<NodeUser>,
    /// `None` and `Some(true)` both mean "overwrite"; only `Some(false)` opts out.
    #[serde(default)]
    pub overwrite: Option<bool>,
}

impl Node {
    /// A node addressing `path` on `filesystem`, with no mode/ownership/overwrite override.
    pub fn new(filesystem: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            filesystem: filesystem.into(),
            mode: None,
            user: None,
            group: None,
            overwrite: None,
        }
    }

    /// The path with any leading `/` stripped, ready to join onto a destination root.
    pub fn relative_path(&self) -> &str {
        self.path.trim_start_matches('/')
    }

    /// Whether a preexisting node at this path should be unlinked first (§4.2).
    pub fn should_overwrite(&self) -> bool {
        self.overwrite.unwrap_or(true)
    }
}

/// A user or group reference by name or numeric id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeUser {
    #[serde(default)]
    pub id: Option<u32>,
    #[serde(default)]
    pub name: Option<String>,
}

/// A directory to create (§3 "Directory").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directory {
    #[serde(flatten)]
    pub node: Node,
}

/// Where a file's content comes from, and how to check it (§3 "File").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContents {
    /// Non-empty; the fetcher picks one source and resolves it into bytes.
    pub sources: Vec<String>,
    #[serde(default)]
    pub verification: Option<Verification>,
}

/// A content-verification descriptor, interpreted by the out-of-scope fetcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub hash: Option<String>,
}

/// A regular file to create or append to (§3 "File").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    #[serde(flatten)]
    pub node: Node,
    pub contents: FileContents,
    #[serde(default)]
    pub append: bool,
}

/// A symbolic or hard link (§3 "Link"). Symlink targets are stored verbatim,
/// never resolved against the destination root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    #[serde(flatten)]
    pub node: Node,
    pub target: String,
    #[serde(default)]
    pub hard: bool,
}

/// A raw disk image to unpack onto a mounted filesystem, applied by the
/// out-of-scope image applier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub source: String,
    #[serde(default)]
    pub verification: Option<Verification>,
}

/// How to mount a [`Filesystem`] that isn't already mounted (§3 "mount descriptor").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mount {
    pub device: String,
    pub format: String,
    #[serde(default)]
    pub label: Option<String>,
    /// Mandatory on the root filesystem and on any filesystem that must
    /// appear in `/etc/fstab`.
    #[serde(default)]
    pub point: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub boot_filesystem: bool,
}

/// An abstract mount target addressed by name from Directories/Files/Links (§3 "Filesystem").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filesystem {
    pub name: String,
    /// Already-mounted path; when set, [`Mount`] is ignored and no mount/unmount happens.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub mount: Option<Mount>,
    #[serde(default)]
    pub images: Option<Vec<Image>>,
}

impl Filesystem {
    /// The mount label, if this filesystem has a [`Mount`] descriptor.
    pub fn mount_label(&self) -> Option<&str> {
        self.mount.as_ref()?.label.as_deref()
    }

    /// True iff this is *the* root filesystem (mount label `root`).
    pub fn is_root(&self) -> bool {
        self.mount_label() == Some("root")
    }

    /// The configured mount point, if any.
    pub fn mount_point(&self) -> Option<&str> {
        self.mount.as_ref()?.point.as_deref()
    }
}

/// Structural equality, except an absent image list is equal to an empty one
/// (§9, §10.6) — mirrors the upstream config collaborator's `Equal` semantics
/// for change-detection by earlier, out-of-scope stages.
impl PartialEq for Filesystem {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.path == other.path
            && self.mount == other.mount
            && images_equal(&self.images, &other.images)
    }
}

/// A local account to ensure exists, with a password hash and SSH keys (§3 "User").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    #[serde(default)]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub ssh_authorized_keys: Vec<String>,
    #[serde(default)]
    pub uid: Option<u32>,
    #[serde(default)]
    pub gecos: Option<String>,
    #[serde(default)]
    pub home_dir: Option<String>,
    #[serde(default)]
    pub no_create_home: bool,
    #[serde(default)]
    pub primary_group: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub no_user_group: bool,
    #[serde(default)]
    pub system: bool,
    #[serde(default)]
    pub no_log_init: bool,
    #[serde(default)]
    pub shell: Option<String>,
}

/// A local group to create (§3 "Group").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    #[serde(default)]
    pub gid: Option<u32>,
    #[serde(default)]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub system: bool,
}

/// An auxiliary unit-configuration fragment composed with a parent unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dropin {
    pub name: String,
    #[serde(default)]
    pub contents: String,
}

/// A systemd unit descriptor (§3 "Unit").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub name: String,
    /// Tri-state: absent = no change, `Some(true)` = enable, `Some(false)` = disable.
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Deprecated in favor of `enabled`; still honored with a warning (§4.7, §9).
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub mask: bool,
    #[serde(default)]
    pub contents: String,
    #[serde(default)]
    pub dropins: Vec<Dropin>,
}

/// A networkd unit descriptor; no enable/disable/mask lifecycle (§3 "Networkd Unit").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkdUnit {
    pub name: String,
    #[serde(default)]
    pub contents: String,
    #[serde(default)]
    pub dropins: Vec<Dropin>,
}

/// The unordered bag of filesystem objects, keyed to filesystems by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Storage {
    #[serde(default)]
    pub filesystems: Vec<Filesystem>,
    #[serde(default)]
    pub directories: Vec<Directory>,
    #[serde(default)]
    pub files: Vec<File>,
    #[serde(default)]
    pub links: Vec<Link>,
}

/// Local accounts section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Passwd {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub groups: Vec<Group>,
}

/// systemd unit section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Systemd {
    #[serde(default)]
    pub units: Vec<Unit>,
}

/// networkd unit section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Networkd {
    #[serde(default)]
    pub units: Vec<NetworkdUnit>,
}

/// The validated configuration tree the files stage consumes (§3 "Config").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub passwd: Passwd,
    #[serde(default)]
    pub systemd: Systemd,
    #[serde(default)]
    pub networkd: Networkd,
}
