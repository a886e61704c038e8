pub mod authors;
pub mod compose;
pub mod config;
pub mod email;
pub mod errors;
pub mod identity;
pub mod jenkins;
pub mod metrics_defs;
pub mod pipeline;
pub mod router;
pub mod service;
pub mod slack;

#[cfg(test)]
mod testutils;

pub use errors::{ClientError, NotifierError};

use pipeline::Pipeline;
use service::NotifierService;
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::sync::Arc;

/// Serves the notification endpoints, and the admin endpoints when an admin
/// listener is configured, until one of the listeners fails.
pub async fn run(config: config::Config) -> Result<(), NotifierError> {
    config.validate()?;
    shared::metrics_defs::describe_all(metrics_defs::ALL_METRICS);

    let pipeline = Arc::new(Pipeline::from_config(&config)?);
    let cache = pipeline.identity_cache().clone();

    if config.warm_identity_cache {
        // A failed warm-up is retried by the first request.
        match cache.ensure_loaded().await {
            Ok(()) => tracing::info!(entries = cache.len(), "identity cache warmed"),
            Err(e) => tracing::warn!(error = %e, "could not warm identity cache"),
        }
    }

    let warm = config.warm_identity_cache;
    let notifier_task = run_http_service(
        &config.listener.host,
        config.listener.port,
        NotifierService::new(pipeline),
    );

    let admin_task = async {
        match &config.admin_listener {
            Some(admin) => {
                let admin_service = AdminService::new(move || !warm || cache.is_loaded());
                run_http_service(&admin.host, admin.port, admin_service).await
            }
            None => std::future::pending().await,
        }
    };

    tokio::try_join!(notifier_task, admin_task)?;
    Ok(())
}

/// Renders one build without posting it.
pub async fn render(
    config: &config::Config,
    job: &str,
    build: &str,
) -> Result<compose::ComposedMessage, NotifierError> {
    config.validate()?;
    Pipeline::from_config(config)?.build_message(job, build).await
}
