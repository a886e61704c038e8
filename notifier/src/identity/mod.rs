//! Mapping from normalized email to chat user id.
//!
//! The chat directory is loaded once, on first use. Loading goes through a
//! [`OnceCell`], so callers that find the cache unloaded at the same time all
//! await the same in-flight load instead of fetching the directory again. A
//! failed load leaves the cell empty and the next caller tries again.
//!
//! After the load, entries are only ever added (by the resolver's fallback
//! path), never removed or refreshed.

pub mod resolver;

use crate::email::NormalizedEmail;
use crate::errors::ClientError;
use crate::metrics_defs::{IDENTITY_DIRECTORY_LOADS, IDENTITY_DIRECTORY_SIZE};
use crate::slack::ChatClient;
use parking_lot::RwLock;
use shared::{counter, gauge};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

pub use resolver::IdentityResolver;

pub struct IdentityCache {
    directory: Arc<dyn ChatClient>,
    entries: RwLock<HashMap<NormalizedEmail, String>>,
    loaded: OnceCell<()>,
}

impl IdentityCache {
    pub fn new(directory: Arc<dyn ChatClient>) -> Self {
        IdentityCache {
            directory,
            entries: RwLock::new(HashMap::new()),
            loaded: OnceCell::new(),
        }
    }

    pub fn lookup(&self, email: &NormalizedEmail) -> Option<String> {
        if email.is_empty() {
            return None;
        }
        self.entries.read().get(email).cloned()
    }

    /// Adds a mapping discovered outside the directory load.
    pub fn insert(&self, email: NormalizedEmail, chat_user_id: String) {
        if email.is_empty() {
            return;
        }
        let mut guard = self.entries.write();
        guard.insert(email, chat_user_id);
        gauge!(IDENTITY_DIRECTORY_SIZE).set(guard.len() as f64);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.initialized()
    }

    /// Loads the chat directory unless a previous load already succeeded.
    pub async fn ensure_loaded(&self) -> Result<(), ClientError> {
        self.loaded
            .get_or_try_init(|| self.load_directory())
            .await
            .map(|_| ())
    }

    async fn load_directory(&self) -> Result<(), ClientError> {
        let users = match self.directory.list_users().await {
            Ok(users) => users,
            Err(e) => {
                counter!(IDENTITY_DIRECTORY_LOADS, "status" => "error").increment(1);
                tracing::error!(error = %e, "failed to load chat directory");
                return Err(e);
            }
        };

        let total = users.len();
        let directory: HashMap<NormalizedEmail, String> = users
            .into_iter()
            .filter_map(|user| {
                let email = NormalizedEmail::new(user.profile_email.as_deref()?);
                (!email.is_empty()).then_some((email, user.id))
            })
            .collect();

        let mut guard = self.entries.write();
        for (email, id) in directory {
            guard.entry(email).or_insert(id);
        }

        counter!(IDENTITY_DIRECTORY_LOADS, "status" => "ok").increment(1);
        gauge!(IDENTITY_DIRECTORY_SIZE).set(guard.len() as f64);
        tracing::info!(users = total, entries = guard.len(), "loaded chat directory");

        Ok(())
    }
}
