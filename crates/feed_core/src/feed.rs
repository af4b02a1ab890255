use std::sync::Arc;

use shared::domain::Post;
use tracing::{error, info};

use crate::{error::FeedError, store::DataStore};

/// One-shot loader for the feed snapshot. No retry, no cache.
pub struct FeedLoader {
    store: Arc<dyn DataStore>,
}

impl FeedLoader {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    pub async fn load(&self) -> Result<Vec<Post>, FeedError> {
        let mut posts = match self.store.fetch_posts().await {
            Ok(posts) => posts,
            Err(err) => {
                error!(error = %err, "feed load failed");
                return Err(FeedError::Load(err));
            }
        };

        // Posts without a timestamp sink to the bottom; ties keep store order.
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        info!(posts = posts.len(), "feed loaded");
        Ok(posts)
    }
}
