use std::path::PathBuf;

use serenity::all::WebhookId;
use thiserror::Error;

/// Problems with the environment-supplied configuration. Always fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} not found in environment")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Failures talking to the chat platform or downloading attachments.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("discord request failed: {0}")]
    Discord(#[from] serenity::Error),

    #[error("download failed: {0}")]
    Download(#[from] reqwest::Error),

    #[error("attachment is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },

    #[error("webhook {0} was not created by this run")]
    UnknownWebhook(WebhookId),

    #[error("{0}")]
    Rejected(String),
}

/// Failures reading or writing the local state file.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state document is malformed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures against the remote copy of the state document.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response status {0}")]
    Status(reqwest::StatusCode),

    #[error("content is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("content is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum CloneError {
    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
