//! Creates groups, then users, then authorizes their keys (§4.6 "Passwd
//! Orchestrator"). Runs before any filesystem is touched, since directory and
//! file ownership can reference accounts by name.

use filesstage_config::{Config, Group, User};

use crate::error::StageError;

/// The out-of-scope local-account manager (§6 "Account manager").
///
/// Implementations typically shell out to `useradd`/`groupadd`/`usermod`
/// rooted at the stage's destination, or edit `/etc/passwd` and friends
/// directly.
pub trait AccountManager {
    fn create_group(&self, group: &Group) -> anyhow::Result<()>;
    fn ensure_user(&self, user: &User) -> anyhow::Result<()>;
    fn set_password_hash(&self, user: &User) -> anyhow::Result<()>;
    fn authorize_ssh_keys(&self, user: &User) -> anyhow::Result<()>;

    /// Resolve a named user to its numeric id, for ownership of an entry
    /// whose [`filesstage_config::NodeUser`] carries a name rather than an id.
    fn uid_for_name(&self, name: &str) -> anyhow::Result<u32>;
    /// Resolve a named group to its numeric id, same as [`Self::uid_for_name`].
    fn gid_for_name(&self, name: &str) -> anyhow::Result<u32>;
}

/// Create every configured group, then ensure every configured user, set its
/// password hash, and authorize its SSH keys, in declaration order (§4.6).
pub fn run(config: &Config, accounts: &dyn AccountManager) -> Result<(), StageError> {
    for group in &config.passwd.groups {
        accounts
            .create_group(group)
            .map_err(|source| account_err(&group.name, source))?;
    }

    for user in &config.passwd.users {
        accounts
            .ensure_user(user)
            .map_err(|source| account_err(&user.name, source))?;
        accounts
            .set_password_hash(user)
            .map_err(|source| account_err(&user.name, source))?;
        if !user.ssh_authorized_keys.is_empty() {
            accounts
                .authorize_ssh_keys(user)
                .map_err(|source| account_err(&user.name, source))?;
        }
    }

    Ok(())
}

fn account_err(who: &str, source: anyhow::Error) -> StageError {
    StageError::Account {
        who: who.to_owned(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingAccounts {
        calls: RefCell<Vec<String>>,
    }

    impl AccountManager for RecordingAccounts {
        fn create_group(&self, group: &Group) -> anyhow::Result<()> {
            self.calls.borrow_mut().push(format!("group:{}", group.name));
            Ok(())
        }
        fn ensure_user(&self, user: &User) -> anyhow::Result<()> {
            self.calls.borrow_mut().push(format!("ensure:{}", user.name));
            Ok(())
        }
        fn set_password_hash(&self, user: &User) -> anyhow::Result<()> {
            self.calls.borrow_mut().push(format!("passwd:{}", user.name));
            Ok(())
        }
        fn authorize_ssh_keys(&self, user: &User) -> anyhow::Result<()> {
            self.calls.borrow_mut().push(format!("keys:{}", user.name));
            Ok(())
        }
        fn uid_for_name(&self, _name: &str) -> anyhow::Result<u32> {
            Ok(0)
        }
        fn gid_for_name(&self, _name: &str) -> anyhow::Result<u32> {
            Ok(0)
        }
    }

    fn user(name: &str, keys: Vec<&str>) -> User {
        User {
            name: name.into(),
            password_hash: None,
            ssh_authorized_keys: keys.into_iter().map(String::from).collect(),
            uid: None,
            gecos: None,
            home_dir: None,
            no_create_home: false,
            primary_group: None,
            groups: vec![],
            no_user_group: false,
            system: false,
            no_log_init: false,
            shell: None,
        }
    }

    #[test]
    fn groups_precede_users_and_keys_are_skipped_when_empty() {
        let config = Config {
            passwd: filesstage_config::Passwd {
                groups: vec![Group {
                    name: "wheel".into(),
                    gid: None,
                    password_hash: None,
                    system: false,
                }],
                users: vec![user("core", vec![]), user("alice", vec!["ssh-ed25519 AAAA"])],
            },
            ..Default::default()
        };

        let accounts = RecordingAccounts::default();
        run(&config, &accounts).unwrap();

        assert_eq!(
            *accounts.calls.borrow(),
            vec![
                "group:wheel",
                "ensure:core",
                "passwd:core",
                "ensure:alice",
                "passwd:alice",
                "keys:alice",
            ]
        );
    }
}
