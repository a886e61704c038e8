use std::borrow::Borrow;
use std::fmt;

/// Canonical form of an email address: trimmed and lower-cased.
///
/// This is the only key used to join CI identities with chat identities, so
/// both sides must go through [`NormalizedEmail::new`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedEmail(String);

impl NormalizedEmail {
    pub fn new(raw: &str) -> Self {
        NormalizedEmail(raw.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for NormalizedEmail {
    fn from(raw: &str) -> Self {
        NormalizedEmail::new(raw)
    }
}

impl Borrow<str> for NormalizedEmail {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedEmail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
