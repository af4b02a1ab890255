use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use shared::{
    domain::ModerationVerdict,
    protocol::{ModerationRequest, ModerationResponse},
};
use tracing::debug;
use url::Url;

use crate::{endpoint, error::ModerationError};

pub const DEFAULT_MODERATION_TIMEOUT: Duration = Duration::from_secs(5);
const PREDICT_PATH: &str = "predict";

/// Toxicity check consulted before a comment is persisted.
///
/// Implementations report failures as errors; the caller decides what an
/// error means for the submission.
#[async_trait]
pub trait ModerationGate: Send + Sync {
    async fn check(&self, text: &str) -> Result<ModerationVerdict, ModerationError>;
}

pub struct MissingModerationGate;

#[async_trait]
impl ModerationGate for MissingModerationGate {
    async fn check(&self, _text: &str) -> Result<ModerationVerdict, ModerationError> {
        Err(ModerationError::Unavailable)
    }
}

/// Calls `POST {base}/predict` with `{ "text": ... }`.
pub struct HttpModerationGate {
    http: Client,
    predict_url: Url,
}

impl HttpModerationGate {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ModerationError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ModerationError::Transport(err.to_string()))?;
        Self::with_client(http, base_url)
    }

    pub fn with_client(http: Client, base_url: &str) -> Result<Self, ModerationError> {
        Ok(Self {
            http,
            predict_url: endpoint(base_url, PREDICT_PATH)?,
        })
    }

    pub fn predict_url(&self) -> &Url {
        &self.predict_url
    }
}

#[async_trait]
impl ModerationGate for HttpModerationGate {
    async fn check(&self, text: &str) -> Result<ModerationVerdict, ModerationError> {
        let res = self
            .http
            .post(self.predict_url.clone())
            .json(&ModerationRequest {
                text: text.to_string(),
            })
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            return Err(ModerationError::Status(status.as_u16()));
        }

        let body: ModerationResponse = res.json().await?;
        let verdict = ModerationVerdict::from(body);
        debug!(toxic = verdict.is_toxic(), "moderation verdict received");
        Ok(verdict)
    }
}

#[cfg(test)]
#[path = "tests/moderation_tests.rs"]
mod tests;
