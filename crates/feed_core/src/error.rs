use shared::error::ApiException;
use thiserror::Error;

use crate::controller::SubmissionPhase;

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("invalid moderation endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
    #[error("moderation request timed out")]
    Timeout,
    #[error("moderation transport failure: {0}")]
    Transport(String),
    #[error("moderation service returned status {0}")]
    Status(u16),
    #[error("malformed moderation response: {0}")]
    Decode(String),
    #[error("moderation gate is unavailable")]
    Unavailable,
}

impl From<reqwest::Error> for ModerationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status(status.as_u16())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid data store endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
    #[error("data store request timed out")]
    Timeout,
    #[error("data store transport failure: {0}")]
    Transport(String),
    #[error("data store rejected request: {0}")]
    Api(#[from] ApiException),
    #[error("malformed data store response: {0}")]
    Decode(String),
    #[error("data store is unavailable")]
    Unavailable,
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("comment text is empty")]
    EmptyInput,
    #[error("a submission for this post is already {0:?}")]
    Busy(SubmissionPhase),
    #[error("no post with id {0}")]
    UnknownPost(i64),
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to load feed: {0}")]
    Load(#[from] StoreError),
    #[error("failed to configure moderation gate: {0}")]
    Moderation(#[from] ModerationError),
}
