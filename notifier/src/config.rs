use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const ENV_JENKINS_BASE_URL: &str = "JENKINS_BASE_URL";
pub const ENV_JENKINS_USER: &str = "JENKINS_USER";
pub const ENV_JENKINS_TOKEN: &str = "JENKINS_TOKEN";
pub const ENV_SLACK_TOKEN: &str = "SLACK_TOKEN";
pub const ENV_SLACK_WEBHOOK: &str = "SLACK_WEBHOOK";
pub const ENV_PORT: &str = "PORT";

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Default channel cannot be empty")]
    EmptyDefaultChannel,

    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("Slack webhook URL is not configured")]
    MissingWebhook,

    #[error("Invalid value for {name}: {reason}")]
    InvalidOverride { name: &'static str, reason: String },
}

/// Notifier configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Listener for the notification endpoints
    #[serde(default)]
    pub listener: Listener,
    /// Listener for health and readiness checks. Disabled when absent.
    pub admin_listener: Option<Listener>,
    pub jenkins: JenkinsConfig,
    pub slack: SlackConfig,
    pub channels: ChannelConfig,
    #[serde(default)]
    pub timeouts: Timeouts,
    /// Load the chat directory at startup instead of on the first request.
    #[serde(default)]
    pub warm_identity_cache: bool,
}

impl Config {
    /// Validates the notifier configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        if let Some(admin) = &self.admin_listener {
            admin.validate()?;
        }

        if self.channels.default.trim().is_empty() {
            return Err(ValidationError::EmptyDefaultChannel);
        }

        if self.jenkins.user.is_empty() {
            return Err(ValidationError::MissingCredential("jenkins.user"));
        }
        if self.jenkins.token.is_empty() {
            return Err(ValidationError::MissingCredential("jenkins.token"));
        }
        if self.slack.token.is_empty() {
            return Err(ValidationError::MissingCredential("slack.token"));
        }
        if self.slack.webhook_url.is_none() {
            return Err(ValidationError::MissingWebhook);
        }

        Ok(())
    }

    /// Overrides deployment secrets and the listener port from the
    /// environment. `lookup` is normally `std::env::var(..).ok()`.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ValidationError> {
        if let Some(value) = lookup(ENV_JENKINS_BASE_URL) {
            self.jenkins.base_url = parse_url(ENV_JENKINS_BASE_URL, &value)?;
        }
        if let Some(value) = lookup(ENV_JENKINS_USER) {
            self.jenkins.user = value;
        }
        if let Some(value) = lookup(ENV_JENKINS_TOKEN) {
            self.jenkins.token = value;
        }
        if let Some(value) = lookup(ENV_SLACK_TOKEN) {
            self.slack.token = value;
        }
        if let Some(value) = lookup(ENV_SLACK_WEBHOOK) {
            self.slack.webhook_url = Some(parse_url(ENV_SLACK_WEBHOOK, &value)?);
        }
        if let Some(value) = lookup(ENV_PORT) {
            self.listener.port =
                value
                    .trim()
                    .parse()
                    .map_err(|e: std::num::ParseIntError| ValidationError::InvalidOverride {
                        name: ENV_PORT,
                        reason: e.to_string(),
                    })?;
        }
        Ok(())
    }
}

fn parse_url(name: &'static str, value: &str) -> Result<Url, ValidationError> {
    Url::parse(value.trim()).map_err(|e| ValidationError::InvalidOverride {
        name,
        reason: e.to_string(),
    })
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "0.0.0.0".into(),
            port: 3000,
        }
    }
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct JenkinsConfig {
    pub base_url: Url,
    #[serde(default)]
    pub user: String,
    /// API token of `user`, sent with HTTP basic auth.
    #[serde(default)]
    pub token: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SlackConfig {
    /// Base URL of the Web API, used for the user directory. Defaults to
    /// the public Slack API.
    pub api_url: Option<Url>,
    #[serde(default)]
    pub token: String,
    /// Incoming webhook that messages are posted to.
    pub webhook_url: Option<Url>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ChannelConfig {
    /// Channel used when a request does not name one.
    pub default: String,
    /// When set, every message goes here regardless of the request.
    pub force: Option<String>,
}

impl ChannelConfig {
    /// Picks the target channel: forced, then requested, then default. Bare
    /// names get a `#` prefix; `#channel` and `@user` targets are kept.
    pub fn target(&self, requested: Option<&str>) -> String {
        let channel = self
            .force
            .as_deref()
            .or(requested)
            .map(str::trim)
            .filter(|channel| !channel.is_empty())
            .unwrap_or_else(|| self.default.trim());

        if channel.starts_with('#') || channel.starts_with('@') {
            channel.to_string()
        } else {
            format!("#{channel}")
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Timeouts {
    /// Per-request timeout for CI and chat API calls.
    pub http_timeout_secs: u64,
    /// Upper bound for one CI profile lookup during identity resolution.
    pub fallback_timeout_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            http_timeout_secs: 10,
            fallback_timeout_secs: 15,
        }
    }
}

impl Timeouts {
    pub fn http(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn fallback(&self) -> Duration {
        Duration::from_secs(self.fallback_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const MINIMAL: &str = r#"
jenkins:
    base_url: "https://ci.example.com/"
    user: bot
    token: secret
slack:
    token: xoxb-1
    webhook_url: "https://hooks.example.com/T1/B1"
channels:
    default: builds
"#;

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = serde_yaml::from_str(MINIMAL).unwrap();
        config.validate().unwrap();

        assert_eq!(config.listener, Listener::default());
        assert_eq!(config.admin_listener, None);
        assert_eq!(config.slack.api_url, None);
        assert_eq!(config.timeouts.http(), Duration::from_secs(10));
        assert_eq!(config.timeouts.fallback(), Duration::from_secs(15));
        assert!(!config.warm_identity_cache);
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r##"
listener:
    host: "127.0.0.1"
    port: 8080
admin_listener:
    host: "127.0.0.1"
    port: 8081
jenkins:
    base_url: "https://ci.example.com/"
    user: bot
    token: secret
slack:
    api_url: "http://localhost:9000/api/"
    token: xoxb-1
    webhook_url: "https://hooks.example.com/T1/B1"
channels:
    default: "#builds"
    force: "@jane"
timeouts:
    fallback_timeout_secs: 2
warm_identity_cache: true
"##;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();

        assert_eq!(config.listener.port, 8080);
        assert_eq!(config.admin_listener.unwrap().port, 8081);
        assert_eq!(config.channels.force.as_deref(), Some("@jane"));
        assert_eq!(config.timeouts.http_timeout_secs, 10);
        assert_eq!(config.timeouts.fallback_timeout_secs, 2);
        assert!(config.warm_identity_cache);
    }

    #[test]
    fn test_invalid_url_rejected_on_parse() {
        let yaml = MINIMAL.replace("https://ci.example.com/", "not a url");
        assert!(serde_yaml::from_str::<Config>(&yaml).is_err());
    }

    #[test]
    fn test_validation_errors() {
        let base: Config = serde_yaml::from_str(MINIMAL).unwrap();

        let mut config = base.clone();
        config.listener.port = 0;
        assert!(matches!(config.validate(), Err(ValidationError::InvalidPort)));

        let mut config = base.clone();
        config.admin_listener = Some(Listener {
            host: "127.0.0.1".into(),
            port: 0,
        });
        assert!(matches!(config.validate(), Err(ValidationError::InvalidPort)));

        let mut config = base.clone();
        config.channels.default = "  ".into();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::EmptyDefaultChannel)
        ));

        let mut config = base.clone();
        config.jenkins.token.clear();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::MissingCredential("jenkins.token"))
        ));

        let mut config = base.clone();
        config.slack.token.clear();
        assert!(matches!(
            config.validate(),
            Err(ValidationError::MissingCredential("slack.token"))
        ));

        let mut config = base;
        config.slack.webhook_url = None;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::MissingWebhook)
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut config: Config = serde_yaml::from_str(MINIMAL).unwrap();
        let env = HashMap::from([
            (ENV_JENKINS_TOKEN, "rotated"),
            (ENV_SLACK_WEBHOOK, "https://hooks.example.com/T2/B2"),
            (ENV_PORT, "8000"),
        ]);

        config
            .apply_env_overrides(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.jenkins.token, "rotated");
        assert_eq!(config.jenkins.user, "bot");
        assert_eq!(
            config.slack.webhook_url.unwrap().as_str(),
            "https://hooks.example.com/T2/B2"
        );
        assert_eq!(config.listener.port, 8000);
    }

    #[test]
    fn test_invalid_env_override() {
        let mut config: Config = serde_yaml::from_str(MINIMAL).unwrap();
        let result = config.apply_env_overrides(|name| (name == ENV_PORT).then(|| "http".into()));
        assert!(matches!(
            result,
            Err(ValidationError::InvalidOverride { name: ENV_PORT, .. })
        ));
    }

    #[test]
    fn test_channel_target() {
        let channels = ChannelConfig {
            default: "builds".into(),
            force: None,
        };
        assert_eq!(channels.target(None), "#builds");
        assert_eq!(channels.target(Some("")), "#builds");
        assert_eq!(channels.target(Some("deploys")), "#deploys");
        assert_eq!(channels.target(Some("#deploys")), "#deploys");
        assert_eq!(channels.target(Some("@jane")), "@jane");

        let forced = ChannelConfig {
            default: "builds".into(),
            force: Some("#sandbox".into()),
        };
        assert_eq!(forced.target(Some("deploys")), "#sandbox");
        assert_eq!(forced.target(None), "#sandbox");
    }
}
