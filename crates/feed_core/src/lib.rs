use std::{sync::Arc, time::Duration};

use shared::domain::{BlockedContentRecord, Comment, CommentId, Post, PostId};
use tokio::sync::{broadcast, RwLock};
use tracing::info;
use url::Url;

pub mod controller;
pub mod error;
pub mod feed;
pub mod moderation;
pub mod store;

pub use controller::{
    CommentThread, PendingPersistence, Reconciliation, SubmissionPhase, SubmissionState,
    SubmitOutcome,
};
pub use error::{FeedError, ModerationError, StoreError, SubmitError};
pub use feed::FeedLoader;
pub use moderation::{
    HttpModerationGate, MissingModerationGate, ModerationGate, DEFAULT_MODERATION_TIMEOUT,
};
pub use store::{DataStore, MissingDataStore, RestDataStore, DEFAULT_STORE_TIMEOUT};

pub const DEFAULT_AUTHOR_NAME: &str = "You";

/// Resolves `path` beneath `base`, keeping any path prefix already on `base`.
pub(crate) fn endpoint(base: &str, path: &str) -> Result<Url, url::ParseError> {
    let mut base = base.trim().to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    Url::parse(&base)?.join(path)
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub store_url: String,
    pub store_api_key: String,
    pub store_timeout: Duration,
    /// `None` leaves the gate permanently unreachable, which fails open.
    pub moderation_url: Option<String>,
    pub moderation_timeout: Duration,
    pub author_name: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            store_url: String::new(),
            store_api_key: String::new(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
            moderation_url: None,
            moderation_timeout: DEFAULT_MODERATION_TIMEOUT,
            author_name: DEFAULT_AUTHOR_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    FeedLoading,
    FeedLoaded {
        post_count: usize,
    },
    FeedLoadFailed(String),
    SubmissionPhaseChanged {
        post_id: PostId,
        phase: SubmissionPhase,
    },
    CommentAppended {
        comment: Comment,
    },
    CommentBlocked {
        post_id: PostId,
        record: BlockedContentRecord,
    },
    CommentConfirmed {
        provisional_id: CommentId,
        comment: Comment,
    },
    CommentSaveFailed {
        post_id: PostId,
        content: String,
        error: String,
    },
}

/// A loaded feed: the post snapshot plus one comment thread per post.
pub struct FeedClient {
    loader: FeedLoader,
    store: Arc<dyn DataStore>,
    gate: Arc<dyn ModerationGate>,
    author_name: String,
    posts: RwLock<Vec<Post>>,
    threads: RwLock<Vec<Arc<CommentThread>>>,
    events: broadcast::Sender<ClientEvent>,
}

impl FeedClient {
    pub fn from_config(config: &ClientConfig) -> Result<Arc<Self>, FeedError> {
        let store: Arc<dyn DataStore> = Arc::new(RestDataStore::new(
            &config.store_url,
            config.store_api_key.clone(),
            config.store_timeout,
        )?);
        let gate: Arc<dyn ModerationGate> = match &config.moderation_url {
            Some(url) => Arc::new(HttpModerationGate::new(url, config.moderation_timeout)?),
            None => Arc::new(MissingModerationGate),
        };
        Ok(Self::new_with_dependencies(
            store,
            gate,
            config.author_name.clone(),
        ))
    }

    pub fn new_with_dependencies(
        store: Arc<dyn DataStore>,
        gate: Arc<dyn ModerationGate>,
        author_name: impl Into<String>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(1024);
        Arc::new(Self {
            loader: FeedLoader::new(Arc::clone(&store)),
            store,
            gate,
            author_name: author_name.into(),
            posts: RwLock::new(Vec::new()),
            threads: RwLock::new(Vec::new()),
            events,
        })
    }

    pub fn author_name(&self) -> &str {
        &self.author_name
    }

    /// Loads the feed once. On failure the feed is left empty.
    pub async fn activate(&self) -> Result<usize, FeedError> {
        let _ = self.events.send(ClientEvent::FeedLoading);
        let posts = match self.loader.load().await {
            Ok(posts) => posts,
            Err(err) => {
                self.posts.write().await.clear();
                self.threads.write().await.clear();
                let _ = self.events.send(ClientEvent::FeedLoadFailed(err.to_string()));
                return Err(err);
            }
        };

        let threads = posts
            .iter()
            .map(|post| {
                Arc::new(CommentThread::new(
                    post.id,
                    post.comments.clone(),
                    self.author_name.clone(),
                    Arc::clone(&self.gate),
                    Arc::clone(&self.store),
                    self.events.clone(),
                ))
            })
            .collect::<Vec<_>>();

        let post_count = posts.len();
        *self.posts.write().await = posts;
        *self.threads.write().await = threads;
        info!(post_count, "feed activated");
        let _ = self.events.send(ClientEvent::FeedLoaded { post_count });
        Ok(post_count)
    }

    /// Posts as loaded. Comment lists here are the load-time snapshot; the
    /// live list is on the post's thread.
    pub async fn posts(&self) -> Vec<Post> {
        self.posts.read().await.clone()
    }

    pub async fn thread(&self, post_id: PostId) -> Option<Arc<CommentThread>> {
        self.threads
            .read()
            .await
            .iter()
            .find(|thread| thread.post_id() == post_id)
            .cloned()
    }

    pub async fn submit_comment(
        &self,
        post_id: PostId,
        text: &str,
    ) -> Result<SubmitOutcome, SubmitError> {
        let thread = self
            .thread(post_id)
            .await
            .ok_or(SubmitError::UnknownPost(post_id.0))?;
        thread.submit_text(text).await
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
