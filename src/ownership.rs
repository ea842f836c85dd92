//! ==============================================================================
//! ownership.rs - hand files back to the invoking user
//! ==============================================================================
//!
//! purpose:
//!     the monitor usually runs under sudo (the usb device needs it), so every
//!     file it creates would end up owned by root. after each write we chown
//!     the file to whoever started the process.
//!
//! relationships:
//!     - used by: eventlog.rs, cache.rs, scheduler.rs
//!     - uses: nix (user database lookup, chown)
//!
//! ==============================================================================

use anyhow::{anyhow, Context, Result};
use nix::unistd::{chown, getuid, Uid, User};
use std::os::unix::fs::MetadataExt;
use std::path::Path;

/// make the invoking user the owner of a path
pub trait Ownership: Send + Sync {
    fn hand_over(&self, path: &Path) -> Result<()>;
}

/// the user behind sudo/pkexec, or the current user
#[derive(Debug, Clone)]
pub struct InvokingUser {
    name: String,
    uid: Uid,
}

impl InvokingUser {
    /// resolve from the process environment
    pub fn resolve() -> Result<Self> {
        let user = match invoking_user_name(|key| std::env::var(key).ok()) {
            Some(name) => User::from_name(&name)
                .with_context(|| format!("failed to look up user {name}"))?
                .ok_or_else(|| anyhow!("unknown user {name}"))?,
            None => User::from_uid(getuid())
                .context("failed to look up current user")?
                .ok_or_else(|| anyhow!("current uid {} has no passwd entry", getuid()))?,
        };
        Ok(Self { name: user.name, uid: user.uid })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Ownership for InvokingUser {
    fn hand_over(&self, path: &Path) -> Result<()> {
        let meta = std::fs::metadata(path)
            .with_context(|| format!("failed to stat {}", path.display()))?;
        if meta.uid() == self.uid.as_raw() {
            return Ok(());
        }
        chown(path, Some(self.uid), None)
            .with_context(|| format!("failed to chown {} to {}", path.display(), self.name))
    }
}

/// pick the invoking user's name from environment variables
///
/// sudo keeps USER=root and sets SUDO_USER; pkexec only leaves PKEXEC_UID.
/// `None` means "whoever we are running as".
fn invoking_user_name(env: impl Fn(&str) -> Option<String>) -> Option<String> {
    let user = env("USER")?;
    if user != "root" {
        return Some(user);
    }
    if let Some(sudo_user) = env("SUDO_USER") {
        return Some(sudo_user);
    }
    if let Some(uid) = env("PKEXEC_UID").and_then(|v| v.parse::<u32>().ok()) {
        if let Ok(Some(user)) = User::from_uid(Uid::from_raw(uid)) {
            return Some(user.name);
        }
    }
    Some(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn plain_user() {
        assert_eq!(invoking_user_name(env_of(&[("USER", "alice")])), Some("alice".into()));
    }

    #[test]
    fn sudo_user_wins_over_root() {
        let env = env_of(&[("USER", "root"), ("SUDO_USER", "bob")]);
        assert_eq!(invoking_user_name(env), Some("bob".into()));
    }

    #[test]
    fn root_without_sudo_stays_root() {
        assert_eq!(invoking_user_name(env_of(&[("USER", "root")])), Some("root".into()));
    }

    #[test]
    fn no_user_variable_falls_back_to_uid() {
        assert_eq!(invoking_user_name(env_of(&[])), None);
    }

    #[test]
    fn hand_over_own_file_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, "x").unwrap();

        let me = User::from_uid(getuid()).unwrap().unwrap();
        let owner = InvokingUser { name: me.name, uid: me.uid };
        owner.hand_over(&path).unwrap();
        assert!(owner.hand_over(&dir.path().join("missing")).is_err());
    }
}
