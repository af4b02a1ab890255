use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(PostId);

/// Shown wherever a row carries no author name.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Comment identity. Server ids and client placeholders live in disjoint
/// variants so a placeholder can never be mistaken for a stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CommentId {
    Stored(i64),
    Provisional(Uuid),
}

impl CommentId {
    pub fn provisional() -> Self {
        Self::Provisional(Uuid::new_v4())
    }

    pub fn is_provisional(&self) -> bool {
        matches!(self, Self::Provisional(_))
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stored(id) => write!(f, "{id}"),
            Self::Provisional(id) => write!(f, "tmp-{id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Appended locally, store write still in flight.
    Pending,
    Confirmed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub author_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub provenance: Provenance,
}

impl Comment {
    pub fn pending(post_id: PostId, author_name: &str, content: &str) -> Self {
        Self {
            id: CommentId::provisional(),
            post_id,
            author_name: author_name.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
            provenance: Provenance::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.provenance == Provenance::Pending
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub author_name: String,
    pub content: String,
    pub created_at: Option<DateTime<Utc>>,
    pub comments: Vec<Comment>,
}

impl Post {
    /// First character of the author name, used as an avatar glyph.
    pub fn author_initial(&self) -> char {
        initial_of(&self.author_name)
    }
}

pub fn initial_of(name: &str) -> char {
    name.chars().next().unwrap_or('U')
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModerationVerdict {
    Allow,
    Block { confidence: f64 },
}

impl ModerationVerdict {
    /// Confidence outside `[0, 1]` is clamped; NaN reads as zero.
    pub fn block(confidence: f64) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self::Block { confidence }
    }

    pub fn is_toxic(&self) -> bool {
        matches!(self, Self::Block { .. })
    }
}

/// Rejected text kept only while the block notice is open.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockedContentRecord {
    pub text: String,
    pub confidence: f64,
}

impl BlockedContentRecord {
    pub fn confidence_percent(&self) -> String {
        format!("{:.1}%", self.confidence * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provisional_ids_never_equal_stored_ids() {
        let provisional = CommentId::provisional();
        assert!(provisional.is_provisional());
        assert_ne!(provisional, CommentId::Stored(1));
        assert_ne!(CommentId::provisional(), provisional);
    }

    #[test]
    fn confidence_percent_uses_one_decimal() {
        let record = BlockedContentRecord {
            text: "you are stupid".to_string(),
            confidence: 0.87,
        };
        assert_eq!(record.confidence_percent(), "87.0%");

        let record = BlockedContentRecord {
            text: String::new(),
            confidence: 0.91234,
        };
        assert_eq!(record.confidence_percent(), "91.2%");
    }

    #[test]
    fn block_verdict_clamps_confidence() {
        assert_eq!(
            ModerationVerdict::block(1.7),
            ModerationVerdict::Block { confidence: 1.0 }
        );
        assert_eq!(
            ModerationVerdict::block(f64::NAN),
            ModerationVerdict::Block { confidence: 0.0 }
        );
        assert!(!ModerationVerdict::Allow.is_toxic());
    }

    #[test]
    fn initial_falls_back_for_empty_names() {
        assert_eq!(initial_of("Linh"), 'L');
        assert_eq!(initial_of(""), 'U');
    }
}
