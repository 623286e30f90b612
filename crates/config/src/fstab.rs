//! `/etc/fstab` record model and renderer (§3 "fstab record", §6 wire format).

use crate::Filesystem;

/// One line of `/etc/fstab`: `<spec> <mount-point> <type> <options> <dump> <pass>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FstabRecord {
    pub spec: String,
    pub mount_point: String,
    pub fstype: String,
    pub options: String,
    pub dump: u8,
    pub pass: u8,
}

impl FstabRecord {
    fn defaulted(spec: impl Into<String>, mount_point: impl Into<String>, fstype: impl Into<String>) -> Self {
        Self {
            spec: spec.into(),
            mount_point: mount_point.into(),
            fstype: fstype.into(),
            options: "defaults".to_owned(),
            dump: 0,
            pass: 0,
        }
    }

    fn render(&self) -> String {
        format!(
            "{} {} {} {} {} {}",
            self.spec, self.mount_point, self.fstype, self.options, self.dump, self.pass
        )
    }
}

/// The four always-present pseudo-filesystem records, in fixed order.
pub fn pseudo_filesystem_records() -> Vec<FstabRecord> {
    let mut devpts = FstabRecord::defaulted("devpts", "/dev/pts", "devpts");
    devpts.options = "gid=5,mode=620".to_owned();
    vec![
        devpts,
        FstabRecord::defaulted("tmpfs", "/dev/shm", "tmpfs"),
        FstabRecord::defaulted("proc", "/proc", "proc"),
        FstabRecord::defaulted("sysfs", "/sys", "sysfs"),
    ]
}

/// The record for a configured filesystem, if it has a mount point.
/// `spec` is `LABEL=<label>` (empty label if unset); `type` is the configured format.
pub fn record_for_filesystem(fs: &Filesystem) -> Option<FstabRecord> {
    let mount = fs.mount.as_ref()?;
    let point = mount.point.as_ref()?;
    let label = mount.label.as_deref().unwrap_or_default();
    Some(FstabRecord::defaulted(
        format!("LABEL={label}"),
        point.clone(),
        mount.format.clone(),
    ))
}

/// Render a sequence of records as a newline-terminated `/etc/fstab` body.
pub fn render(records: &[FstabRecord]) -> String {
    let mut out = String::new();
    for r in records {
        out.push_str(&r.render());
        out.push('\n');
    }
    out
}
