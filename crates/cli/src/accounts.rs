//! Shells out to the standard account-management tools, rooted at a
//! destination directory via `--root`/`--prefix`, matching how a first-boot
//! provisioner actually has to create accounts on a not-yet-booted system.

use std::process::Command;

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use filesstage_config::{Group, User};
use filesstage_core::AccountManager;
use filesstage_utils::CommandRunExt;

#[derive(Debug)]
pub struct ShellAccountManager {
    root: Utf8PathBuf,
}

impl ShellAccountManager {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }
}

impl AccountManager for ShellAccountManager {
    fn create_group(&self, group: &Group) -> Result<()> {
        let mut cmd = Command::new("groupadd");
        cmd.arg("--root").arg(&self.root).arg("--force");
        if let Some(gid) = group.gid {
            cmd.arg("--gid").arg(gid.to_string());
        }
        if group.system {
            cmd.arg("--system");
        }
        cmd.arg(&group.name);
        cmd.log_debug()
            .run_inherited_with_cmd_context()
            .with_context(|| format!("creating group {}", group.name))?;

        if let Some(hash) = &group.password_hash {
            set_group_password(&self.root, &group.name, hash)?;
        }
        Ok(())
    }

    fn ensure_user(&self, user: &User) -> Result<()> {
        let mut cmd = Command::new("useradd");
        cmd.arg("--root").arg(&self.root);
        if let Some(uid) = user.uid {
            cmd.arg("--uid").arg(uid.to_string());
        }
        if let Some(gecos) = &user.gecos {
            cmd.arg("--comment").arg(gecos);
        }
        if let Some(home) = &user.home_dir {
            cmd.arg("--home-dir").arg(home);
        }
        if user.no_create_home {
            cmd.arg("--no-create-home");
        } else {
            cmd.arg("--create-home");
        }
        if let Some(group) = &user.primary_group {
            cmd.arg("--gid").arg(group);
        }
        if !user.groups.is_empty() {
            cmd.arg("--groups").arg(user.groups.join(","));
        }
        if user.no_user_group {
            cmd.arg("--no-user-group");
        }
        if user.system {
            cmd.arg("--system");
        }
        if user.no_log_init {
            cmd.arg("--no-log-init");
        }
        if let Some(shell) = &user.shell {
            cmd.arg("--shell").arg(shell);
        }
        cmd.arg(&user.name);

        cmd.log_debug()
            .run_inherited_with_cmd_context()
            .with_context(|| format!("creating user {}", user.name))
    }

    fn set_password_hash(&self, user: &User) -> Result<()> {
        let Some(hash) = &user.password_hash else {
            return Ok(());
        };
        Command::new("usermod")
            .arg("--root")
            .arg(&self.root)
            .arg("--password")
            .arg(hash)
            .arg(&user.name)
            .log_debug()
            .run_inherited_with_cmd_context()
            .with_context(|| format!("setting password hash for {}", user.name))
    }

    fn authorize_ssh_keys(&self, user: &User) -> Result<()> {
        let home = user
            .home_dir
            .clone()
            .unwrap_or_else(|| format!("/home/{}", user.name));
        let ssh_dir = format!("{}{home}/.ssh", self.root);
        let authorized_keys = format!("{ssh_dir}/authorized_keys.d/ignition");

        std::fs::create_dir_all(&ssh_dir).with_context(|| format!("creating {ssh_dir}"))?;
        std::fs::create_dir_all(format!("{ssh_dir}/authorized_keys.d"))?;
        std::fs::write(&authorized_keys, user.ssh_authorized_keys.join("\n") + "\n")
            .with_context(|| format!("writing {authorized_keys}"))?;
        Ok(())
    }

    fn uid_for_name(&self, name: &str) -> Result<u32> {
        uzers::get_user_by_name(name)
            .map(|u| u.uid())
            .ok_or_else(|| anyhow::anyhow!("no such user {name:?}"))
    }

    fn gid_for_name(&self, name: &str) -> Result<u32> {
        uzers::get_group_by_name(name)
            .map(|g| g.gid())
            .ok_or_else(|| anyhow::anyhow!("no such group {name:?}"))
    }
}

fn set_group_password(root: &Utf8PathBuf, name: &str, hash: &str) -> Result<()> {
    Command::new("gpasswd")
        .arg("--root")
        .arg(root)
        .arg("--password")
        .arg(hash)
        .arg(name)
        .log_debug()
        .run_inherited_with_cmd_context()
        .with_context(|| format!("setting password hash for group {name}"))
}
