use crate::config::ValidationError;
use thiserror::Error;

/// Failures talking to one of the external systems (CI server or chat API).
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("could not parse response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("API returned an error: {0}")]
    Api(String),

    #[error("request timed out")]
    Timeout,
}

/// Errors that can occur while building or dispatching a notification
#[derive(Error, Debug)]
pub enum NotifierError {
    #[error("upstream request failed: {0}")]
    Client(#[from] ClientError),

    #[error("malformed build data: {0}")]
    MalformedData(String),

    #[error("identity directory could not be loaded: {0}")]
    Resolution(#[source] ClientError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ValidationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
