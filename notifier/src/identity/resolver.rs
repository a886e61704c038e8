use super::IdentityCache;
use crate::authors::AuthorSet;
use crate::email::NormalizedEmail;
use crate::errors::{ClientError, NotifierError};
use crate::jenkins::CiClient;
use crate::jenkins::adapter::CiUserProfile;
use crate::metrics_defs::{IDENTITY_CACHE_HIT, IDENTITY_CACHE_MISS, IDENTITY_FALLBACK};
use shared::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// Result of looking an author up through their CI user profile.
#[derive(Debug, PartialEq)]
enum Fallback {
    Resolved(String),
    /// The profile has no registered email.
    NoEmail,
    /// The profile email is not in the chat directory either.
    Unmatched(NormalizedEmail),
}

impl Fallback {
    fn outcome(&self) -> &'static str {
        match self {
            Fallback::Resolved(_) => "resolved",
            Fallback::NoEmail => "no_email",
            Fallback::Unmatched(_) => "unmatched",
        }
    }
}

/// Attaches chat user ids to build authors.
///
/// Authors are first looked up in the [`IdentityCache`] by email. Misses that
/// carry a CI user id are looked up again, concurrently, by the email on
/// their CI profile. A failed or slow fallback leaves that one author
/// unresolved; it never fails the whole resolution.
pub struct IdentityResolver {
    cache: Arc<IdentityCache>,
    ci: Arc<dyn CiClient>,
    fallback_timeout: Duration,
}

impl IdentityResolver {
    pub fn new(
        cache: Arc<IdentityCache>,
        ci: Arc<dyn CiClient>,
        fallback_timeout: Duration,
    ) -> Self {
        IdentityResolver {
            cache,
            ci,
            fallback_timeout,
        }
    }

    pub fn cache(&self) -> &Arc<IdentityCache> {
        &self.cache
    }

    /// Resolves every author in the set, including a guest starter.
    ///
    /// Only a failure to load the chat directory is an error.
    pub async fn resolve(&self, mut authors: AuthorSet) -> Result<AuthorSet, NotifierError> {
        self.cache
            .ensure_loaded()
            .await
            .map_err(NotifierError::Resolution)?;

        let mut lookups = JoinSet::new();

        for slot in authors.slots() {
            let Some(author) = authors.slot_mut(&slot) else {
                continue;
            };
            if author.chat_user_id.is_some() {
                continue;
            }

            if let Some(id) = self.cache.lookup(&author.email) {
                counter!(IDENTITY_CACHE_HIT).increment(1);
                author.chat_user_id = Some(id);
                continue;
            }
            counter!(IDENTITY_CACHE_MISS).increment(1);

            let Some(ci_user_id) = author.ci_user_id.clone() else {
                tracing::debug!(author = %author.name, "no CI user to fall back on");
                continue;
            };

            let ci = self.ci.clone();
            let cache = self.cache.clone();
            let email = author.email.clone();
            let timeout = self.fallback_timeout;

            lookups.spawn(async move {
                let lookup = fallback_lookup(ci.as_ref(), &cache, &ci_user_id, &email);
                let result = tokio::time::timeout(timeout, lookup)
                    .await
                    .unwrap_or(Err(ClientError::Timeout));
                (slot, ci_user_id, result)
            });
        }

        while let Some(joined) = lookups.join_next().await {
            let (slot, ci_user_id, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    tracing::error!(error = %e, "identity fallback task failed");
                    continue;
                }
            };

            match result {
                Ok(fallback) => {
                    counter!(IDENTITY_FALLBACK, "outcome" => fallback.outcome()).increment(1);
                    match fallback {
                        Fallback::Resolved(id) => {
                            if let Some(author) = authors.slot_mut(&slot) {
                                author.chat_user_id = Some(id);
                            }
                        }
                        Fallback::NoEmail => {
                            tracing::warn!(ci_user = %ci_user_id, "CI profile has no email");
                        }
                        Fallback::Unmatched(email) => {
                            tracing::warn!(
                                ci_user = %ci_user_id,
                                email = %email,
                                "CI profile email is not a chat user"
                            );
                        }
                    }
                }
                Err(e) => {
                    let outcome = match e {
                        ClientError::Timeout => "timeout",
                        _ => "error",
                    };
                    counter!(IDENTITY_FALLBACK, "outcome" => outcome).increment(1);
                    tracing::warn!(ci_user = %ci_user_id, error = %e, "CI profile lookup failed");
                }
            }
        }

        let unresolved = authors
            .slots()
            .iter()
            .filter_map(|slot| authors.slot(slot))
            .filter(|author| author.chat_user_id.is_none())
            .count();
        tracing::debug!(authors = authors.len(), unresolved, "resolved build authors");

        Ok(authors)
    }
}

/// Looks a CI user's profile email up in the cache. On a match the email the
/// author committed with is recorded too, so the next build skips this path.
async fn fallback_lookup(
    ci: &dyn CiClient,
    cache: &IdentityCache,
    ci_user_id: &str,
    original: &NormalizedEmail,
) -> Result<Fallback, ClientError> {
    let profile = CiUserProfile::from_json(&ci.get_user(ci_user_id).await?);

    let Some(email) = profile.email() else {
        return Ok(Fallback::NoEmail);
    };
    let Some(id) = cache.lookup(email) else {
        return Ok(Fallback::Unmatched(email.clone()));
    };

    if !original.is_empty() && original != email {
        tracing::debug!(from = %original, to = %email, "backfilling identity cache");
        cache.insert(original.clone(), id.clone());
    }

    Ok(Fallback::Resolved(id))
}
