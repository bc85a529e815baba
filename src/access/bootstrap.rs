use std::collections::BTreeSet;
use std::path::Path;
use tracing::{info, warn};

use super::{normalize_username, AccessError, Result};
use crate::platform::Sender;

/// Users pre-authorized at startup. Read once, never written back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapList {
    ids: BTreeSet<i64>,
    usernames: BTreeSet<String>,
}

impl BootstrapList {
    /// One identifier per line: a numeric user id or a username (leading
    /// `@` optional). Blank lines and `#` comments are skipped.
    pub fn parse(content: &str) -> Self {
        let mut list = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Ok(id) = line.parse::<i64>() {
                list.ids.insert(id);
            } else if let Some(name) = normalize_username(line) {
                list.usernames.insert(name);
            }
        }
        list
    }

    /// A missing file yields an empty list.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(
                "Bootstrap list {} not found; no users are pre-authorized",
                path.display()
            );
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| AccessError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let list = Self::parse(&content);
        info!(
            "Loaded {} pre-authorized user(s) from {}",
            list.len(),
            path.display()
        );
        Ok(list)
    }

    pub fn contains(&self, sender: &Sender) -> bool {
        if self.ids.contains(&sender.id) {
            return true;
        }
        sender
            .username
            .as_deref()
            .and_then(normalize_username)
            .is_some_and(|name| self.usernames.contains(&name))
    }

    pub fn len(&self) -> usize {
        self.ids.len() + self.usernames.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
