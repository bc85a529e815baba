//! Who may use the bot.
//!
//! The [`Authority`] owns the runtime allow-list, the startup bootstrap
//! list, and the port that persists grants. It is the only gate in front of
//! command execution.

pub mod bootstrap;
pub mod store;

use std::collections::BTreeSet;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::platform::Sender;

pub use bootstrap::BootstrapList;
pub use store::{AllowListStore, JsonFileStore};

#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("allow-list i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("allow-list json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AccessError>;

/// Lowercased username without a leading `@`, or `None` if nothing is left
pub(crate) fn normalize_username(raw: &str) -> Option<String> {
    let name = raw.trim().trim_start_matches('@').trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_lowercase())
    }
}

/// Runtime grants. Only ever grows while the process runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    pub users: BTreeSet<i64>,
    /// Granted by name and not yet seen; promoted to an id on first contact
    pub usernames: BTreeSet<String>,
    pub groups: BTreeSet<i64>,
}

/// A single allow-list addition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
    User(i64),
    Username(String),
    Group(i64),
}

impl AllowList {
    fn insert(&mut self, grant: &Grant) -> bool {
        match grant {
            Grant::User(id) => self.users.insert(*id),
            Grant::Username(name) => match normalize_username(name) {
                Some(name) => self.usernames.insert(name),
                None => false,
            },
            Grant::Group(id) => self.groups.insert(*id),
        }
    }
}

pub struct Authority {
    list: Mutex<AllowList>,
    bootstrap: BootstrapList,
    store: Box<dyn AllowListStore>,
}

impl Authority {
    /// Load persisted grants and merge in the bootstrap list.
    pub fn new(store: Box<dyn AllowListStore>, bootstrap: BootstrapList) -> Result<Self> {
        let list = store.load()?;
        info!(
            "Allow-list loaded: {} user(s), {} pending username(s), {} group(s), {} bootstrap entr(ies)",
            list.users.len(),
            list.usernames.len(),
            list.groups.len(),
            bootstrap.len()
        );
        Ok(Self {
            list: Mutex::new(list),
            bootstrap,
            store,
        })
    }

    /// Whether `sender` may run commands in `chat_id`.
    ///
    /// A sender matching a pending username is promoted to a user-id grant
    /// and the list is persisted.
    pub async fn is_authorized(&self, sender: &Sender, chat_id: i64) -> bool {
        let mut list = self.list.lock().await;

        if list.users.contains(&sender.id) {
            return true;
        }

        if let Some(name) = sender.username.as_deref().and_then(normalize_username) {
            if list.usernames.remove(&name) {
                list.users.insert(sender.id);
                info!("Promoted username @{} to user id {}", name, sender.id);
                if let Err(e) = self.store.save(&list) {
                    error!("Failed to persist promotion of @{}: {}", name, e);
                }
                return true;
            }
        }

        self.bootstrap.contains(sender) || list.groups.contains(&chat_id)
    }

    /// Admins may grow the allow-list: bootstrap users and users granted by
    /// id. Group membership alone does not make an admin.
    pub async fn is_admin(&self, sender: &Sender) -> bool {
        if self.bootstrap.contains(sender) {
            return true;
        }
        self.list.lock().await.users.contains(&sender.id)
    }

    /// Add a grant. Returns whether the list changed; the file is only
    /// rewritten when it did.
    ///
    /// If the write fails the grant stays in effect for this process and
    /// the error is returned.
    pub async fn authorize(&self, grant: Grant) -> Result<bool> {
        let mut list = self.list.lock().await;
        if !list.insert(&grant) {
            return Ok(false);
        }
        info!("Granted access: {:?}", grant);
        self.store.save(&list)?;
        Ok(true)
    }

    #[cfg(test)]
    pub async fn snapshot(&self) -> AllowList {
        self.list.lock().await.clone()
    }
}
