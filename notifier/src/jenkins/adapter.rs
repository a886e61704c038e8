//! Typed views over the JSON returned by the Jenkins remote API.
//!
//! All probing of untyped JSON (action lists filtered by `_class`, user
//! properties, change sets) is confined to this module. Everything outside
//! of it works with [`BuildRecord`], [`JobInfo`] and [`CiUserProfile`].

use crate::authors::AuthorSet;
use crate::email::NormalizedEmail;
use crate::errors::NotifierError;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

const PARAMETERS_ACTION: &str = "hudson.model.ParametersAction";
const CAUSE_ACTION: &str = "hudson.model.CauseAction";
const MAILER_PROPERTY: &str = "hudson.tasks.Mailer$UserProperty";

/// Fields Jenkins always reports for a build.
const REQUIRED_BUILD_FIELDS: &[&str] = &["id", "result", "timestamp"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildResult {
    Success,
    Failure,
    /// Any other outcome (`UNSTABLE`, `ABORTED`, or `IN_PROGRESS` while running).
    Other(String),
}

impl BuildResult {
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("SUCCESS") => BuildResult::Success,
            Some("FAILURE") => BuildResult::Failure,
            Some(other) => BuildResult::Other(other.to_string()),
            None => BuildResult::Other("IN_PROGRESS".to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CommitEntry {
    pub author_name: String,
    pub author_email: String,
    pub ci_user_id: Option<String>,
    pub commit_id: String,
}

/// The user a build's start cause points at.
#[derive(Clone, Debug, PartialEq)]
pub struct TriggeringUser {
    pub user_id: String,
    pub user_name: Option<String>,
}

impl TriggeringUser {
    pub fn display_name(&self) -> &str {
        self.user_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.user_id)
    }
}

/// Normalized view of one CI build.
#[derive(Clone, Debug, PartialEq)]
pub struct BuildRecord {
    pub build_number: String,
    pub result: BuildResult,
    pub duration_ms: u64,
    pub url: String,
    pub changelog: Vec<CommitEntry>,
    pub triggering_user: Option<TriggeringUser>,
    pub parameters: BTreeMap<String, String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBuild {
    id: Value,
    result: Option<String>,
    timestamp: u64,
    #[serde(default)]
    duration: u64,
    #[serde(default)]
    url: String,
    #[serde(default)]
    change_sets: Vec<RawChangeSet>,
    // Freestyle jobs on older Jenkins report a single change set.
    #[serde(default)]
    change_set: Option<RawChangeSet>,
    #[serde(default)]
    actions: Vec<Value>,
}

#[derive(Deserialize)]
struct RawChangeSet {
    #[serde(default)]
    items: Vec<RawChangeItem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawChangeItem {
    #[serde(default)]
    author: Option<RawChangeAuthor>,
    #[serde(default)]
    author_email: Option<String>,
    #[serde(default)]
    commit_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawChangeAuthor {
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    absolute_url: Option<String>,
}

impl BuildRecord {
    /// Adapts a raw build document, estimating the duration of unfinished
    /// builds against the current wall clock.
    pub fn from_json(raw: &Value) -> Result<Self, NotifierError> {
        Self::from_json_at(raw, now_millis())
    }

    pub fn from_json_at(raw: &Value, now_ms: u64) -> Result<Self, NotifierError> {
        let object = raw
            .as_object()
            .ok_or_else(|| NotifierError::MalformedData("build is not a JSON object".into()))?;

        if let Some(missing) = REQUIRED_BUILD_FIELDS
            .iter()
            .find(|field| !object.contains_key(**field))
        {
            return Err(NotifierError::MalformedData(format!(
                "build is missing `{missing}`"
            )));
        }

        let build: RawBuild = serde_json::from_value(raw.clone())
            .map_err(|e| NotifierError::MalformedData(e.to_string()))?;

        let build_number = match &build.id {
            Value::String(id) => id.clone(),
            Value::Number(id) => id.to_string(),
            other => {
                return Err(NotifierError::MalformedData(format!(
                    "unexpected build id {other}"
                )));
            }
        };

        let duration_ms = match build.duration {
            0 => now_ms.saturating_sub(build.timestamp),
            reported => reported,
        };

        let changelog = build
            .change_sets
            .iter()
            .chain(build.change_set.iter())
            .flat_map(|set| set.items.iter())
            .map(CommitEntry::from)
            .collect();

        Ok(BuildRecord {
            build_number,
            result: BuildResult::parse(build.result.as_deref()),
            duration_ms,
            url: build.url,
            changelog,
            triggering_user: triggering_user(&build.actions),
            parameters: parameters(&build.actions),
        })
    }

    /// Looks up a build parameter by name.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    /// Changelog authors with the triggering user attached.
    pub fn author_set(&self) -> AuthorSet {
        let mut authors = AuthorSet::from_changelog(&self.changelog);
        if let Some(user) = &self.triggering_user {
            authors.set_starter(user);
        }
        authors
    }
}

impl From<&RawChangeItem> for CommitEntry {
    fn from(item: &RawChangeItem) -> Self {
        let author = item.author.as_ref();
        CommitEntry {
            author_name: author
                .and_then(|a| a.full_name.clone())
                .unwrap_or_default(),
            author_email: item.author_email.clone().unwrap_or_default(),
            ci_user_id: author
                .and_then(|a| a.absolute_url.as_deref())
                .and_then(user_id_from_url),
            commit_id: item.commit_id.clone().unwrap_or_default(),
        }
    }
}

/// The CI user id is the last path segment of the user's profile URL.
fn user_id_from_url(url: &str) -> Option<String> {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty() && !segment.contains(':'))
        .map(str::to_string)
}

fn actions_of_class<'a>(actions: &'a [Value], class: &'a str) -> impl Iterator<Item = &'a Value> {
    actions
        .iter()
        .filter(move |action| action.get("_class").and_then(Value::as_str) == Some(class))
}

fn parameters(actions: &[Value]) -> BTreeMap<String, String> {
    let mut parameters = BTreeMap::new();

    let entries = actions_of_class(actions, PARAMETERS_ACTION)
        .filter_map(|action| action.get("parameters")?.as_array())
        .flatten();

    for entry in entries {
        let Some(name) = entry.get("name").and_then(Value::as_str) else {
            tracing::debug!(parameter = %entry, "skipping parameter without a name");
            continue;
        };
        let value = match entry.get("value") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Bool(b)) => b.to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => continue,
        };
        parameters.entry(name.to_string()).or_insert(value);
    }

    parameters
}

fn triggering_user(actions: &[Value]) -> Option<TriggeringUser> {
    actions_of_class(actions, CAUSE_ACTION)
        .filter_map(|action| action.get("causes")?.as_array())
        .flatten()
        .find_map(|cause| {
            let user_id = cause.get("userId")?.as_str()?;
            Some(TriggeringUser {
                user_id: user_id.to_string(),
                user_name: cause
                    .get("userName")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            })
        })
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Job metadata used for the message header.
#[derive(Clone, Debug, PartialEq)]
pub struct JobInfo {
    pub name: String,
    pub display_name: String,
}

impl JobInfo {
    /// Job info when no metadata is available: the raw identifier is shown.
    pub fn bare(job: &str) -> Self {
        JobInfo {
            name: job.to_string(),
            display_name: job.to_string(),
        }
    }

    pub fn from_json(job: &str, raw: &Value) -> Self {
        let field = |key: &str| {
            raw.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let name = field("name").unwrap_or_else(|| job.to_string());
        let display_name = field("displayName").unwrap_or_else(|| name.clone());
        JobInfo { name, display_name }
    }
}

/// A CI user profile, reduced to what identity resolution needs.
#[derive(Clone, Debug, PartialEq)]
pub struct CiUserProfile {
    pub id: Option<String>,
    pub full_name: Option<String>,
    email: Option<NormalizedEmail>,
}

impl CiUserProfile {
    pub fn from_json(raw: &Value) -> Self {
        let text = |key: &str| raw.get(key).and_then(Value::as_str).map(str::to_string);

        let email = raw
            .get("property")
            .and_then(Value::as_array)
            .map(|properties| actions_of_class(properties, MAILER_PROPERTY))
            .into_iter()
            .flatten()
            .find_map(|property| property.get("address")?.as_str())
            .map(NormalizedEmail::new)
            .filter(|email| !email.is_empty());

        CiUserProfile {
            id: text("id"),
            full_name: text("fullName"),
            email,
        }
    }

    /// The registered email address, if the profile has one.
    pub fn email(&self) -> Option<&NormalizedEmail> {
        self.email.as_ref()
    }
}
