use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::{normalize_username, AccessError, AllowList, Result};

/// Durable home of the allow-list
pub trait AllowListStore: Send + Sync {
    fn load(&self) -> Result<AllowList>;
    fn save(&self, list: &AllowList) -> Result<()>;
}

/// On-disk shape: `{"users": [...], "groups": [...]}`.
///
/// Entries are written as strings. Numbers are accepted on read so a
/// hand-edited file with bare ids still loads.
#[derive(Debug, Default, Serialize, Deserialize)]
struct AllowListFile {
    #[serde(default)]
    users: Vec<Entry>,
    #[serde(default)]
    groups: Vec<Entry>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum Entry {
    Id(i64),
    Text(String),
}

impl Entry {
    fn as_id(&self) -> Option<i64> {
        match self {
            Entry::Id(id) => Some(*id),
            Entry::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl From<AllowListFile> for AllowList {
    fn from(file: AllowListFile) -> Self {
        let mut list = AllowList::default();
        for entry in file.users {
            if let Some(id) = entry.as_id() {
                list.users.insert(id);
            } else if let Entry::Text(name) = entry {
                if let Some(name) = normalize_username(&name) {
                    list.usernames.insert(name);
                }
            }
        }
        for entry in file.groups {
            match entry.as_id() {
                Some(id) => {
                    list.groups.insert(id);
                }
                None => warn!("Ignoring non-numeric group entry in allow-list: {:?}", entry),
            }
        }
        list
    }
}

impl From<&AllowList> for AllowListFile {
    fn from(list: &AllowList) -> Self {
        let users = list
            .users
            .iter()
            .map(|id| Entry::Text(id.to_string()))
            .chain(list.usernames.iter().map(|n| Entry::Text(n.clone())))
            .collect();
        let groups = list
            .groups
            .iter()
            .map(|id| Entry::Text(id.to_string()))
            .collect();
        Self { users, groups }
    }
}

/// JSON file store. Writes go to a sibling temp file that is then renamed
/// over the target, so readers never see a half-written list.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "allowlist".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> AccessError {
        AccessError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl AllowListStore for JsonFileStore {
    fn load(&self) -> Result<AllowList> {
        if !self.path.exists() {
            info!(
                "No allow-list at {}, starting with an empty one",
                self.path.display()
            );
            return Ok(AllowList::default());
        }

        let content = std::fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        if content.trim().is_empty() {
            return Ok(AllowList::default());
        }
        let file: AllowListFile = serde_json::from_str(&content)?;
        Ok(file.into())
    }

    fn save(&self, list: &AllowList) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }

        let json = serde_json::to_string_pretty(&AllowListFile::from(list))?;
        let tmp = self.temp_path();
        std::fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;
        Ok(())
    }
}
