use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response};
use shared::{
    domain::{Comment, Post},
    error::{ApiError, ApiException},
    protocol::{CommentRow, NewCommentRow, PostRow},
};
use tracing::debug;
use url::Url;

use crate::{endpoint, error::StoreError};

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);
const POSTS_PATH: &str = "rest/v1/posts";
const COMMENTS_PATH: &str = "rest/v1/comments";
const FEED_SELECT: &str = "*,comments(*)";
const FEED_ORDER: &str = "created_at.desc";

#[async_trait]
pub trait DataStore: Send + Sync {
    /// All posts with their nested comments, newest post first.
    async fn fetch_posts(&self) -> Result<Vec<Post>, StoreError>;

    /// Inserts one comment row. Returns the stored row when the store echoes it.
    async fn insert_comment(&self, row: &NewCommentRow) -> Result<Option<Comment>, StoreError>;
}

pub struct MissingDataStore;

#[async_trait]
impl DataStore for MissingDataStore {
    async fn fetch_posts(&self) -> Result<Vec<Post>, StoreError> {
        Err(StoreError::Unavailable)
    }

    async fn insert_comment(&self, _row: &NewCommentRow) -> Result<Option<Comment>, StoreError> {
        Err(StoreError::Unavailable)
    }
}

/// PostgREST-style REST backend (the shape Supabase exposes under `/rest/v1`).
pub struct RestDataStore {
    http: Client,
    posts_url: Url,
    comments_url: Url,
    api_key: String,
}

impl RestDataStore {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| StoreError::Transport(err.to_string()))?;
        Self::with_client(http, base_url, api_key)
    }

    pub fn with_client(
        http: Client,
        base_url: &str,
        api_key: impl Into<String>,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            http,
            posts_url: endpoint(base_url, POSTS_PATH)?,
            comments_url: endpoint(base_url, COMMENTS_PATH)?,
            api_key: api_key.into(),
        })
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        if self.api_key.is_empty() {
            return builder;
        }
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }
}

async fn ensure_success(res: Response) -> Result<Response, StoreError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }

    let raw = res.text().await.unwrap_or_default();
    let body = serde_json::from_str::<ApiError>(&raw).unwrap_or_else(|_| ApiError::new(raw));
    Err(ApiException::new(status.as_u16(), body).into())
}

#[async_trait]
impl DataStore for RestDataStore {
    async fn fetch_posts(&self) -> Result<Vec<Post>, StoreError> {
        let res = self
            .authorized(self.http.get(self.posts_url.clone()))
            .query(&[("select", FEED_SELECT), ("order", FEED_ORDER)])
            .send()
            .await?;
        let rows: Vec<PostRow> = ensure_success(res).await?.json().await?;
        debug!(rows = rows.len(), "fetched post rows");
        Ok(rows.into_iter().map(Post::from).collect())
    }

    async fn insert_comment(&self, row: &NewCommentRow) -> Result<Option<Comment>, StoreError> {
        let res = self
            .authorized(self.http.post(self.comments_url.clone()))
            .header("Prefer", "return=representation")
            .header(header::CONTENT_TYPE, "application/json")
            .json(&[row])
            .send()
            .await?;
        let res = ensure_success(res).await?;

        // A store configured with `return=minimal` answers with an empty body.
        let raw = res.text().await?;
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let rows: Vec<CommentRow> =
            serde_json::from_str(&raw).map_err(|err| StoreError::Decode(err.to_string()))?;
        Ok(rows.into_iter().next().map(Comment::from))
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
