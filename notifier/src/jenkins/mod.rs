pub mod adapter;

use crate::config::JenkinsConfig;
use crate::errors::ClientError;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Read access to the CI server. Returns raw JSON documents; interpreting
/// them is the job of [`adapter`].
#[async_trait]
pub trait CiClient: Send + Sync {
    async fn get_job(&self, job: &str) -> Result<Value, ClientError>;

    async fn get_build(&self, job: &str, build: &str) -> Result<Value, ClientError>;

    async fn get_user(&self, user_id: &str) -> Result<Value, ClientError>;
}

/// Jenkins remote API client, authenticating with a user API token.
#[derive(Clone)]
pub struct JenkinsClient {
    http: reqwest::Client,
    base_url: Url,
    user: String,
    token: String,
}

impl JenkinsClient {
    pub fn new(config: &JenkinsConfig, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(JenkinsClient {
            http,
            base_url: config.base_url.clone(),
            user: config.user.clone(),
            token: config.token.clone(),
        })
    }

    /// Appends `segments` and `api/json` to the base URL. Each segment is
    /// percent-encoded on its own, so `/`, `?` and `#` never leave it.
    fn api_url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::Api(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments)
            .extend(["api", "json"]);

        Ok(url)
    }

    async fn get_json(&self, segments: &[&str], resource: String) -> Result<Value, ClientError> {
        let url = self.api_url(segments)?;

        let response = self
            .http
            .get(url.clone())
            .basic_auth(&self.user, Some(&self.token))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let body = response.bytes().await?;
                Ok(serde_json::from_slice(&body)?)
            }
            StatusCode::NOT_FOUND => Err(ClientError::NotFound(resource)),
            status => Err(ClientError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            }),
        }
    }
}

#[async_trait]
impl CiClient for JenkinsClient {
    async fn get_job(&self, job: &str) -> Result<Value, ClientError> {
        self.get_json(&["job", job], format!("job {job}")).await
    }

    async fn get_build(&self, job: &str, build: &str) -> Result<Value, ClientError> {
        self.get_json(&["job", job, build], format!("build {job}#{build}"))
            .await
    }

    async fn get_user(&self, user_id: &str) -> Result<Value, ClientError> {
        self.get_json(&["user", user_id], format!("user {user_id}"))
            .await
    }
}
