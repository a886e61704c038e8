use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "https://slack.com/api/";
pub const USERS_LIST: &str = "users.list";
pub const USERS_PAGE_LIMIT: &str = "200";

/// A chat workspace member as far as identity matching is concerned.
#[derive(Clone, Debug, PartialEq)]
pub struct ChatUser {
    pub id: String,
    pub profile_email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ResponseMetadata {
    pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct UsersListResponse {
    pub ok: bool,
    pub members: Option<Vec<Member>>,
    pub response_metadata: Option<ResponseMetadata>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct Member {
    pub id: String,
    #[serde(default)]
    pub profile: Option<MemberProfile>,
}

#[derive(Debug, Deserialize)]
pub(super) struct MemberProfile {
    pub email: Option<String>,
}

impl From<Member> for ChatUser {
    fn from(member: Member) -> Self {
        ChatUser {
            id: member.id,
            profile_email: member
                .profile
                .and_then(|p| p.email)
                .filter(|email| !email.trim().is_empty()),
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct WebhookPayload<'a> {
    pub channel: &'a str,
    pub attachments: [Attachment<'a>; 1],
    pub unfurl_links: bool,
}

#[derive(Debug, Serialize)]
pub(super) struct Attachment<'a> {
    pub text: &'a str,
    pub color: &'a str,
    pub mrkdwn_in: [&'static str; 1],
}
