//! User-facing notifications derived from client events and errors.

use feed_core::{ClientEvent, SubmitError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeCategory {
    Auth,
    Transport,
    Validation,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeContext {
    LoadFeed,
    SaveComment,
    Submit,
}

#[derive(Debug, Clone)]
pub struct Notice {
    category: NoticeCategory,
    context: NoticeContext,
    message: String,
}

impl Notice {
    pub fn from_message(context: NoticeContext, message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_ascii_lowercase();
        let category = if lower.contains("401")
            || lower.contains("403")
            || lower.contains("unauthorized")
            || lower.contains("row-level security")
            || lower.contains("invalid api key")
        {
            NoticeCategory::Auth
        } else if lower.contains("empty")
            || lower.contains("invalid")
            || lower.contains("malformed")
            || lower.contains("no post")
        {
            NoticeCategory::Validation
        } else if lower.contains("timed out")
            || lower.contains("transport")
            || lower.contains("connection")
            || lower.contains("unavailable")
            || lower.contains("network")
        {
            NoticeCategory::Transport
        } else {
            NoticeCategory::Unknown
        };

        Self {
            category,
            context,
            message,
        }
    }

    pub fn headline(&self) -> String {
        match (self.context, self.category) {
            (NoticeContext::LoadFeed, NoticeCategory::Transport) => {
                "Could not reach the feed; showing an empty feed.".to_string()
            }
            (NoticeContext::LoadFeed, NoticeCategory::Auth) => {
                "Feed access was refused; check the store anon key.".to_string()
            }
            (NoticeContext::LoadFeed, _) => format!("Failed to load feed: {}", self.message),
            (NoticeContext::SaveComment, NoticeCategory::Transport) => {
                "Network error! Your comment was not saved.".to_string()
            }
            (NoticeContext::SaveComment, _) => {
                format!("Your comment was not saved: {}", self.message)
            }
            (NoticeContext::Submit, _) => self.message.clone(),
        }
    }
}

pub fn submit_error_notice(err: &SubmitError) -> Notice {
    let message = match err {
        SubmitError::EmptyInput => "Comment is empty; write something first.".to_string(),
        SubmitError::Busy(phase) => format!("This post is busy ({phase:?}); wait a moment."),
        SubmitError::UnknownPost(id) => format!("No post with id {id}."),
    };
    Notice::from_message(NoticeContext::Submit, message)
}

/// Line to print for an asynchronous client event, if the user should see it.
pub fn describe_event(event: &ClientEvent) -> Option<String> {
    match event {
        ClientEvent::FeedLoadFailed(error) => {
            Some(Notice::from_message(NoticeContext::LoadFeed, error.clone()).headline())
        }
        ClientEvent::CommentConfirmed { comment, .. } => {
            Some(format!("Saved comment on post {}.", comment.post_id))
        }
        ClientEvent::CommentSaveFailed {
            post_id,
            content,
            error,
        } => {
            let notice = Notice::from_message(NoticeContext::SaveComment, error.clone());
            Some(format!(
                "{} (post {post_id}: \"{content}\" was removed from the thread)",
                notice.headline()
            ))
        }
        _ => None,
    }
}
