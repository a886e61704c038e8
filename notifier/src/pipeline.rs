use crate::compose::{ComposedMessage, compose};
use crate::config::{ChannelConfig, Config};
use crate::errors::NotifierError;
use crate::identity::{IdentityCache, IdentityResolver};
use crate::jenkins::adapter::{BuildRecord, JobInfo};
use crate::jenkins::{CiClient, JenkinsClient};
use crate::metrics_defs::{NOTIFICATIONS_SENT, PIPELINE_DURATION};
use crate::slack::{ChatClient, SlackClient};
use shared::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;

/// Turns a `(job, build)` pair into a chat notification.
pub struct Pipeline {
    ci: Arc<dyn CiClient>,
    chat: Arc<dyn ChatClient>,
    resolver: IdentityResolver,
    channels: ChannelConfig,
}

impl Pipeline {
    pub fn new(
        ci: Arc<dyn CiClient>,
        chat: Arc<dyn ChatClient>,
        resolver: IdentityResolver,
        channels: ChannelConfig,
    ) -> Self {
        Pipeline {
            ci,
            chat,
            resolver,
            channels,
        }
    }

    /// Wires the Jenkins and Slack clients and an empty identity cache.
    pub fn from_config(config: &Config) -> Result<Self, NotifierError> {
        let timeout = config.timeouts.http();
        let ci: Arc<dyn CiClient> = Arc::new(JenkinsClient::new(&config.jenkins, timeout)?);
        let chat: Arc<dyn ChatClient> = Arc::new(SlackClient::new(&config.slack, timeout)?);

        let cache = Arc::new(IdentityCache::new(chat.clone()));
        let resolver = IdentityResolver::new(cache, ci.clone(), config.timeouts.fallback());

        Ok(Self::new(ci, chat, resolver, config.channels.clone()))
    }

    pub fn identity_cache(&self) -> &Arc<IdentityCache> {
        self.resolver.cache()
    }

    /// Fetches, resolves and renders one build. Missing job metadata is
    /// tolerated; a missing or malformed build is not.
    pub async fn build_message(
        &self,
        job: &str,
        build: &str,
    ) -> Result<ComposedMessage, NotifierError> {
        let started = Instant::now();
        let result = self.compose_build(job, build).await;

        let status = if result.is_ok() { "ok" } else { "error" };
        histogram!(PIPELINE_DURATION, "endpoint" => "get", "status" => status)
            .record(started.elapsed().as_secs_f64());

        result
    }

    /// Builds the message and posts it. Returns the channel it went to.
    pub async fn notify(
        &self,
        job: &str,
        build: &str,
        channel: Option<&str>,
    ) -> Result<String, NotifierError> {
        let started = Instant::now();
        let result = self.dispatch(job, build, channel).await;

        let status = if result.is_ok() { "ok" } else { "error" };
        histogram!(PIPELINE_DURATION, "endpoint" => "notify", "status" => status)
            .record(started.elapsed().as_secs_f64());

        result
    }

    async fn dispatch(
        &self,
        job: &str,
        build: &str,
        channel: Option<&str>,
    ) -> Result<String, NotifierError> {
        let message = self.compose_build(job, build).await?;
        let target = self.channels.target(channel);

        match self.chat.post_message(&target, &message).await {
            Ok(()) => {
                counter!(NOTIFICATIONS_SENT, "status" => "ok").increment(1);
                tracing::info!(job, build, channel = %target, "notification sent");
                Ok(target)
            }
            Err(e) => {
                counter!(NOTIFICATIONS_SENT, "status" => "error").increment(1);
                Err(e.into())
            }
        }
    }

    async fn compose_build(
        &self,
        job: &str,
        build: &str,
    ) -> Result<ComposedMessage, NotifierError> {
        let (job_info, raw_build) =
            tokio::join!(self.ci.get_job(job), self.ci.get_build(job, build));

        let job_info = match job_info {
            Ok(raw) => JobInfo::from_json(job, &raw),
            Err(e) => {
                tracing::warn!(job, error = %e, "could not fetch job metadata, using job id");
                JobInfo::bare(job)
            }
        };

        let record = BuildRecord::from_json(&raw_build?)?;
        let authors = self.resolver.resolve(record.author_set()).await?;

        Ok(compose(&job_info.display_name, &record, &authors))
    }
}
