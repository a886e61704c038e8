mod types;

pub use types::{ChatUser, DEFAULT_API_URL};

use crate::compose::ComposedMessage;
use crate::config::SlackConfig;
use crate::errors::ClientError;
use async_trait::async_trait;
use std::time::Duration;
use types::{Attachment, USERS_LIST, USERS_PAGE_LIMIT, UsersListResponse, WebhookPayload};
use url::Url;

/// The chat system: its user directory and a way to post messages.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn list_users(&self) -> Result<Vec<ChatUser>, ClientError>;

    async fn post_message(
        &self,
        channel: &str,
        message: &ComposedMessage,
    ) -> Result<(), ClientError>;
}

/// Slack Web API client for the directory, incoming webhook for posting.
#[derive(Clone)]
pub struct SlackClient {
    http: reqwest::Client,
    api_url: Url,
    token: String,
    webhook_url: Url,
}

impl SlackClient {
    pub fn new(config: &SlackConfig, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let webhook_url = config
            .webhook_url
            .clone()
            .ok_or_else(|| ClientError::Api("no webhook URL configured".into()))?;

        let api_url = match &config.api_url {
            Some(url) => url.clone(),
            None => Url::parse(DEFAULT_API_URL)
                .map_err(|e| ClientError::Api(format!("invalid API URL: {e}")))?,
        };

        Ok(SlackClient {
            http,
            api_url,
            token: config.token.clone(),
            webhook_url,
        })
    }

    fn method_url(&self, method: &str) -> Result<Url, ClientError> {
        self.api_url
            .join(method)
            .map_err(|e| ClientError::Api(format!("invalid API URL: {e}")))
    }
}

#[async_trait]
impl ChatClient for SlackClient {
    async fn list_users(&self) -> Result<Vec<ChatUser>, ClientError> {
        let url = self.method_url(USERS_LIST)?;
        let mut users = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0;

        loop {
            let mut params = vec![("limit", USERS_PAGE_LIMIT)];
            if let Some(ref c) = cursor {
                params.push(("cursor", c.as_str()));
            }

            let response = self
                .http
                .get(url.clone())
                .bearer_auth(&self.token)
                .query(&params)
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(ClientError::Status {
                    status: response.status().as_u16(),
                    url: url.to_string(),
                });
            }

            let body = response.bytes().await?;
            let page: UsersListResponse = serde_json::from_slice(&body)?;

            if !page.ok {
                let error = page.error.unwrap_or_else(|| "unknown error".to_string());
                return Err(ClientError::Api(format!("{USERS_LIST}: {error}")));
            }

            users.extend(page.members.unwrap_or_default().into_iter().map(ChatUser::from));
            pages += 1;

            cursor = page
                .response_metadata
                .and_then(|m| m.next_cursor)
                .filter(|c| !c.is_empty());
            if cursor.is_none() {
                break;
            }
        }

        tracing::debug!(pages, users = users.len(), "fetched chat directory");
        Ok(users)
    }

    async fn post_message(
        &self,
        channel: &str,
        message: &ComposedMessage,
    ) -> Result<(), ClientError> {
        let payload = WebhookPayload {
            channel,
            attachments: [Attachment {
                text: &message.body,
                color: message.color.as_str(),
                mrkdwn_in: ["text"],
            }],
            unfurl_links: true,
        };

        let response = self
            .http
            .post(self.webhook_url.clone())
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::Status {
                status: response.status().as_u16(),
                url: self.webhook_url.to_string(),
            });
        }

        Ok(())
    }
}
