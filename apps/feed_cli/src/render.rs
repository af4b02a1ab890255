//! Plain-text rendering of the feed, comment threads and the block notice.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use shared::domain::{initial_of, BlockedContentRecord, Comment, Post};

pub const APP_TITLE: &str = "Phakebook AI";
const INDENT: &str = "    ";

pub fn loading_line() -> &'static str {
    "Loading feed..."
}

/// Relative age in the style of "about 2 hours ago".
pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    const MINUTE: i64 = 60;
    const HOUR: i64 = 60 * MINUTE;
    const DAY: i64 = 24 * HOUR;
    const MONTH: i64 = 30 * DAY;
    const YEAR: i64 = 365 * DAY;

    let secs = (now - then).num_seconds().max(0);
    let plural = |n: i64, unit: &str| {
        if n == 1 {
            format!("1 {unit}")
        } else {
            format!("{n} {unit}s")
        }
    };

    let phrase = if secs < 45 {
        "less than a minute".to_string()
    } else if secs < 45 * MINUTE {
        plural(((secs + 30) / MINUTE).max(1), "minute")
    } else if secs < DAY {
        format!("about {}", plural(((secs + HOUR / 2) / HOUR).max(1), "hour"))
    } else if secs < MONTH {
        plural(((secs + DAY / 2) / DAY).max(1), "day")
    } else if secs < YEAR {
        let months = ((secs + MONTH / 2) / MONTH).max(1);
        if months == 1 {
            "about 1 month".to_string()
        } else {
            plural(months, "month")
        }
    } else {
        format!("about {}", plural(secs / YEAR, "year"))
    };
    format!("{phrase} ago")
}

pub fn render_feed(posts: &[(Post, Vec<Comment>, String)], now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {APP_TITLE} ==");
    if posts.is_empty() {
        let _ = writeln!(out, "No posts to show.");
        return out;
    }
    for (index, (post, comments, draft)) in posts.iter().enumerate() {
        out.push_str(&render_post(index + 1, post, comments, draft, now));
        out.push('\n');
    }
    out
}

pub fn render_post(
    index: usize,
    post: &Post,
    comments: &[Comment],
    draft: &str,
    now: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    let age = post
        .created_at
        .map(|created_at| format!(" · {}", time_ago(created_at, now)))
        .unwrap_or_default();
    let _ = writeln!(
        out,
        "[{index}] ({}) {}{age}",
        post.author_initial(),
        post.author_name
    );
    let _ = writeln!(out, "{INDENT}{}", post.content);
    let _ = writeln!(out, "{INDENT}-- comments --");
    if comments.is_empty() {
        let _ = writeln!(out, "{INDENT}No comments yet.");
    }
    for comment in comments {
        let _ = writeln!(out, "{INDENT}{}", render_comment(comment));
    }
    if !draft.is_empty() {
        let _ = writeln!(out, "{INDENT}draft: {draft}");
    }
    out
}

pub fn render_comment(comment: &Comment) -> String {
    let marker = if comment.is_pending() { " (sending...)" } else { "" };
    format!(
        "({}) {}: {}{marker}",
        initial_of(&comment.author_name),
        comment.author_name,
        comment.content
    )
}

/// Block notice. The rejected text is shown verbatim.
pub fn render_block_notice(record: &BlockedContentRecord, model_label: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "!! Comment blocked");
    let _ = writeln!(
        out,
        "The moderation model flagged your comment as violating community standards."
    );
    let _ = writeln!(out, "Blocked content:");
    let _ = writeln!(out, "{INDENT}\"{}\"", record.text);
    let _ = writeln!(
        out,
        "Model: {model_label}    Confidence: {}",
        record.confidence_percent()
    );
    out
}
