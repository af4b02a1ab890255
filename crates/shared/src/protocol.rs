use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    Comment, CommentId, ModerationVerdict, Post, PostId, Provenance, UNKNOWN_AUTHOR,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationRequest {
    pub text: String,
}

/// Body returned by the moderation service. The service also echoes `text`,
/// which is ignored here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationResponse {
    pub is_toxic: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl From<ModerationResponse> for ModerationVerdict {
    fn from(value: ModerationResponse) -> Self {
        if value.is_toxic {
            ModerationVerdict::block(value.confidence.unwrap_or(0.0))
        } else {
            ModerationVerdict::Allow
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRow {
    pub id: i64,
    pub post_id: PostId,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl CommentRow {
    /// `fallback` stands in for a missing `created_at`.
    pub fn into_comment(self, fallback: DateTime<Utc>) -> Comment {
        Comment {
            id: CommentId::Stored(self.id),
            post_id: self.post_id,
            author_name: author_or_unknown(self.author_name),
            content: self.content.unwrap_or_default(),
            created_at: self.created_at.unwrap_or(fallback),
            provenance: Provenance::Confirmed,
        }
    }
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        row.into_comment(Utc::now())
    }
}

fn author_or_unknown(name: Option<String>) -> String {
    name.filter(|name| !name.is_empty())
        .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string())
}

/// A `posts` row with its `comments(*)` embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRow {
    pub id: PostId,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub comments: Vec<CommentRow>,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        // Undated comments borrow the post's timestamp.
        let fallback = row.created_at.unwrap_or_else(Utc::now);
        Self {
            id: row.id,
            author_name: author_or_unknown(row.author_name),
            content: row.content.unwrap_or_default(),
            created_at: row.created_at,
            comments: row
                .comments
                .into_iter()
                .map(|comment| comment.into_comment(fallback))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewCommentRow {
    pub post_id: PostId,
    pub content: String,
    pub author_name: String,
}
