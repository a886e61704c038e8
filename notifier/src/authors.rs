use crate::email::NormalizedEmail;
use crate::jenkins::adapter::{CommitEntry, TriggeringUser};
use indexmap::IndexMap;

/// A contributor credited in a build, optionally resolved to a chat user.
#[derive(Clone, Debug, PartialEq)]
pub struct Author {
    pub name: String,
    pub email: NormalizedEmail,
    pub ci_user_id: Option<String>,
    pub commit_count: usize,
    pub chat_user_id: Option<String>,
}

/// Who started the build, relative to the changelog authors.
#[derive(Clone, Debug, PartialEq)]
pub enum Starter {
    /// The triggering user is one of the changelog authors (self-triggered build).
    Member(NormalizedEmail),
    /// The triggering user has no commits in this build. Kept out of the
    /// changelog listing and only used for the "by <user>" header.
    Guest(Author),
}

/// Addresses one author inside an [`AuthorSet`] without borrowing it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthorSlot {
    Member(NormalizedEmail),
    Starter,
}

/// Changelog authors keyed by normalized email, in first-commit order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AuthorSet {
    members: IndexMap<NormalizedEmail, Author>,
    starter: Option<Starter>,
}

impl AuthorSet {
    /// Groups changelog entries by normalized email, counting commits.
    pub fn from_changelog(changelog: &[CommitEntry]) -> Self {
        let mut members: IndexMap<NormalizedEmail, Author> = IndexMap::new();

        for commit in changelog {
            let key = NormalizedEmail::new(&commit.author_email);
            let author = members.entry(key.clone()).or_insert_with(|| Author {
                name: commit.author_name.clone(),
                email: key,
                ci_user_id: commit.ci_user_id.clone(),
                commit_count: 0,
                chat_user_id: None,
            });
            if author.ci_user_id.is_none() {
                author.ci_user_id = commit.ci_user_id.clone();
            }
            author.commit_count += 1;
        }

        AuthorSet {
            members,
            starter: None,
        }
    }

    /// Records the user that started the build.
    ///
    /// A starter matching a member (by CI user id, or by key when the user id
    /// is itself an email) marks the build as self-triggered. Anyone else
    /// becomes a zero-commit guest.
    pub fn set_starter(&mut self, user: &TriggeringUser) {
        let as_email = NormalizedEmail::new(&user.user_id);
        let member = self
            .members
            .iter()
            .find(|(_, author)| author.ci_user_id.as_deref() == Some(user.user_id.as_str()))
            .map(|(key, _)| key.clone())
            .or_else(|| self.members.contains_key(&as_email).then_some(as_email));

        self.starter = Some(match member {
            Some(key) => Starter::Member(key),
            None => Starter::Guest(Author {
                name: user.display_name().to_string(),
                email: NormalizedEmail::default(),
                ci_user_id: Some(user.user_id.clone()),
                commit_count: 0,
                chat_user_id: None,
            }),
        });
    }

    pub fn get(&self, email: &NormalizedEmail) -> Option<&Author> {
        self.members.get(email)
    }

    /// Changelog authors, excluding a guest starter.
    pub fn members(&self) -> impl Iterator<Item = &Author> {
        self.members.values()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn starter(&self) -> Option<&Author> {
        match self.starter.as_ref()? {
            Starter::Member(key) => self.members.get(key),
            Starter::Guest(author) => Some(author),
        }
    }

    pub fn started_by_member(&self) -> bool {
        matches!(self.starter, Some(Starter::Member(_)))
    }

    /// Every author that needs resolving: all members, then a guest starter.
    pub(crate) fn slots(&self) -> Vec<AuthorSlot> {
        let mut slots: Vec<AuthorSlot> = self
            .members
            .keys()
            .cloned()
            .map(AuthorSlot::Member)
            .collect();
        if let Some(Starter::Guest(_)) = self.starter {
            slots.push(AuthorSlot::Starter);
        }
        slots
    }

    pub(crate) fn slot(&self, slot: &AuthorSlot) -> Option<&Author> {
        match slot {
            AuthorSlot::Member(key) => self.members.get(key),
            AuthorSlot::Starter => match self.starter.as_ref()? {
                Starter::Guest(author) => Some(author),
                Starter::Member(_) => None,
            },
        }
    }

    pub(crate) fn slot_mut(&mut self, slot: &AuthorSlot) -> Option<&mut Author> {
        match slot {
            AuthorSlot::Member(key) => self.members.get_mut(key),
            AuthorSlot::Starter => match self.starter.as_mut()? {
                Starter::Guest(author) => Some(author),
                Starter::Member(_) => None,
            },
        }
    }
}
