//! Per-post comment list and submission state machine.
//!
//! `Idle -> Checking -> {Blocked | Publishing} -> Idle`. Each post owns its
//! own lock, and no lock is held while the moderation gate or the data store
//! is awaited, so posts never wait on each other.

use std::sync::Arc;

use shared::{
    domain::{BlockedContentRecord, Comment, CommentId, ModerationVerdict, PostId, Provenance},
    protocol::NewCommentRow,
};
use tokio::{
    sync::{broadcast, Mutex},
    task::{JoinError, JoinHandle},
};
use tracing::{debug, info, warn};

use crate::{
    error::SubmitError, moderation::ModerationGate, store::DataStore, ClientEvent,
};

#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionState {
    Idle,
    Checking,
    Blocked(BlockedContentRecord),
    Publishing,
}

impl SubmissionState {
    pub fn phase(&self) -> SubmissionPhase {
        match self {
            Self::Idle => SubmissionPhase::Idle,
            Self::Checking => SubmissionPhase::Checking,
            Self::Blocked(_) => SubmissionPhase::Blocked,
            Self::Publishing => SubmissionPhase::Publishing,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionPhase {
    Idle,
    Checking,
    Blocked,
    Publishing,
}

#[derive(Debug)]
pub enum SubmitOutcome {
    Blocked(BlockedContentRecord),
    Published(PendingPersistence),
}

/// Handle on the background store write for one optimistic comment.
#[derive(Debug)]
pub struct PendingPersistence {
    pub comment_id: CommentId,
    handle: JoinHandle<Reconciliation>,
}

impl PendingPersistence {
    pub async fn wait(self) -> Result<Reconciliation, JoinError> {
        self.handle.await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    Confirmed(Comment),
    RolledBack { content: String, error: String },
}

struct ThreadState {
    comments: Vec<Comment>,
    input: String,
    state: SubmissionState,
}

pub struct CommentThread {
    post_id: PostId,
    author_name: String,
    gate: Arc<dyn ModerationGate>,
    store: Arc<dyn DataStore>,
    events: broadcast::Sender<ClientEvent>,
    inner: Arc<Mutex<ThreadState>>,
}

impl CommentThread {
    pub fn new(
        post_id: PostId,
        comments: Vec<Comment>,
        author_name: impl Into<String>,
        gate: Arc<dyn ModerationGate>,
        store: Arc<dyn DataStore>,
        events: broadcast::Sender<ClientEvent>,
    ) -> Self {
        Self {
            post_id,
            author_name: author_name.into(),
            gate,
            store,
            events,
            inner: Arc::new(Mutex::new(ThreadState {
                comments,
                input: String::new(),
                state: SubmissionState::Idle,
            })),
        }
    }

    pub fn post_id(&self) -> PostId {
        self.post_id
    }

    pub async fn comments(&self) -> Vec<Comment> {
        self.inner.lock().await.comments.clone()
    }

    pub async fn input(&self) -> String {
        self.inner.lock().await.input.clone()
    }

    pub async fn phase(&self) -> SubmissionPhase {
        self.inner.lock().await.state.phase()
    }

    pub async fn blocked(&self) -> Option<BlockedContentRecord> {
        match &self.inner.lock().await.state {
            SubmissionState::Blocked(record) => Some(record.clone()),
            _ => None,
        }
    }

    /// Input is only editable while idle.
    pub async fn set_input(&self, text: impl Into<String>) -> Result<(), SubmitError> {
        let mut guard = self.inner.lock().await;
        if guard.state != SubmissionState::Idle {
            return Err(SubmitError::Busy(guard.state.phase()));
        }
        guard.input = text.into();
        Ok(())
    }

    pub async fn can_submit(&self) -> bool {
        let guard = self.inner.lock().await;
        guard.state == SubmissionState::Idle && !guard.input.trim().is_empty()
    }

    /// Closes the block notice. Returns the record that was on display.
    pub async fn dismiss_block(&self) -> Option<BlockedContentRecord> {
        let record = {
            let mut guard = self.inner.lock().await;
            match std::mem::replace(&mut guard.state, SubmissionState::Idle) {
                SubmissionState::Blocked(record) => record,
                other => {
                    guard.state = other;
                    return None;
                }
            }
        };
        self.emit_phase(SubmissionPhase::Idle);
        Some(record)
    }

    pub async fn submit(&self) -> Result<SubmitOutcome, SubmitError> {
        let text = {
            let mut guard = self.inner.lock().await;
            Self::begin_check(&mut guard)?;
            guard.input.clone()
        };
        self.check_and_publish(text).await
    }

    /// Replaces the input with `text` and submits it under a single lock, so
    /// a concurrent writer cannot swap the draft between the two steps.
    pub async fn submit_text(&self, text: impl Into<String>) -> Result<SubmitOutcome, SubmitError> {
        let text = text.into();
        {
            let mut guard = self.inner.lock().await;
            if guard.state != SubmissionState::Idle {
                return Err(SubmitError::Busy(guard.state.phase()));
            }
            guard.input = text.clone();
            Self::begin_check(&mut guard)?;
        }
        self.check_and_publish(text).await
    }

    fn begin_check(state: &mut ThreadState) -> Result<(), SubmitError> {
        if state.state != SubmissionState::Idle {
            return Err(SubmitError::Busy(state.state.phase()));
        }
        if state.input.trim().is_empty() {
            return Err(SubmitError::EmptyInput);
        }
        state.state = SubmissionState::Checking;
        Ok(())
    }

    async fn check_and_publish(&self, text: String) -> Result<SubmitOutcome, SubmitError> {
        let checking = CheckingGuard {
            post_id: self.post_id,
            inner: Arc::clone(&self.inner),
            events: self.events.clone(),
            armed: true,
        };
        self.emit_phase(SubmissionPhase::Checking);

        let verdict = match self.gate.check(&text).await {
            Ok(verdict) => verdict,
            Err(err) => {
                warn!(
                    post_id = self.post_id.0,
                    error = %err,
                    "moderation gate unreachable; allowing comment"
                );
                ModerationVerdict::Allow
            }
        };

        if let ModerationVerdict::Block { confidence } = verdict {
            let record = BlockedContentRecord { text, confidence };
            self.inner.lock().await.state = SubmissionState::Blocked(record.clone());
            checking.disarm();
            info!(
                post_id = self.post_id.0,
                confidence, "comment blocked by moderation"
            );
            self.emit_phase(SubmissionPhase::Blocked);
            let _ = self.events.send(ClientEvent::CommentBlocked {
                post_id: self.post_id,
                record: record.clone(),
            });
            return Ok(SubmitOutcome::Blocked(record));
        }

        let pending = Comment::pending(self.post_id, &self.author_name, &text);
        let comment_id = pending.id;
        let row = NewCommentRow {
            post_id: self.post_id,
            content: text,
            author_name: self.author_name.clone(),
        };
        // Append, dispatch and release under one lock: a dropped caller must
        // not strand the thread in `Publishing`.
        let handle = {
            let mut guard = self.inner.lock().await;
            guard.state = SubmissionState::Publishing;
            guard.comments.push(pending.clone());
            guard.input.clear();
            self.emit_phase(SubmissionPhase::Publishing);
            let _ = self
                .events
                .send(ClientEvent::CommentAppended { comment: pending });
            let handle = tokio::spawn(persist(
                self.post_id,
                comment_id,
                row,
                Arc::clone(&self.store),
                Arc::clone(&self.inner),
                self.events.clone(),
            ));
            guard.state = SubmissionState::Idle;
            self.emit_phase(SubmissionPhase::Idle);
            handle
        };
        checking.disarm();

        Ok(SubmitOutcome::Published(PendingPersistence { comment_id, handle }))
    }

    fn emit_phase(&self, phase: SubmissionPhase) {
        emit_phase(&self.events, self.post_id, phase);
    }
}

fn emit_phase(events: &broadcast::Sender<ClientEvent>, post_id: PostId, phase: SubmissionPhase) {
    debug!(post_id = post_id.0, ?phase, "submission phase changed");
    let _ = events.send(ClientEvent::SubmissionPhaseChanged { post_id, phase });
}

/// Returns a thread stuck in `Checking` to `Idle` when the submit future is
/// dropped or the gate panics before a verdict lands.
struct CheckingGuard {
    post_id: PostId,
    inner: Arc<Mutex<ThreadState>>,
    events: broadcast::Sender<ClientEvent>,
    armed: bool,
}

impl CheckingGuard {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CheckingGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        fn release(state: &mut ThreadState) -> bool {
            if state.state == SubmissionState::Checking {
                state.state = SubmissionState::Idle;
                true
            } else {
                false
            }
        }

        let post_id = self.post_id;
        let inner = Arc::clone(&self.inner);
        let events = self.events.clone();
        warn!(post_id = post_id.0, "moderation check abandoned; releasing thread");

        if let Ok(mut guard) = inner.try_lock() {
            if release(&mut guard) {
                drop(guard);
                emit_phase(&events, post_id, SubmissionPhase::Idle);
            }
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if release(&mut *inner.lock().await) {
                        emit_phase(&events, post_id, SubmissionPhase::Idle);
                    }
                });
            }
            Err(_) => warn!(post_id = post_id.0, "no runtime to release abandoned check"),
        }
    }
}

async fn persist(
    post_id: PostId,
    comment_id: CommentId,
    row: NewCommentRow,
    store: Arc<dyn DataStore>,
    inner: Arc<Mutex<ThreadState>>,
    events: broadcast::Sender<ClientEvent>,
) -> Reconciliation {
    match store.insert_comment(&row).await {
        Ok(stored) => {
            let confirmed = {
                let mut guard = inner.lock().await;
                guard
                    .comments
                    .iter_mut()
                    .find(|comment| comment.id == comment_id)
                    .map(|comment| {
                        if let Some(stored) = &stored {
                            comment.id = stored.id;
                            comment.created_at = stored.created_at;
                        }
                        comment.provenance = Provenance::Confirmed;
                        comment.clone()
                    })
            };
            let Some(confirmed) = confirmed else {
                // Entry vanished locally; nothing left to reconcile.
                warn!(post_id = post_id.0, %comment_id, "confirmed comment missing from view");
                return Reconciliation::RolledBack {
                    content: row.content,
                    error: "comment no longer in view".to_string(),
                };
            };
            info!(post_id = post_id.0, id = %confirmed.id, "comment saved");
            let _ = events.send(ClientEvent::CommentConfirmed {
                provisional_id: comment_id,
                comment: confirmed.clone(),
            });
            Reconciliation::Confirmed(confirmed)
        }
        Err(err) => {
            warn!(post_id = post_id.0, error = %err, "comment save failed; rolling back");
            {
                let mut guard = inner.lock().await;
                guard.comments.retain(|comment| comment.id != comment_id);
                let editable = matches!(
                    guard.state,
                    SubmissionState::Idle | SubmissionState::Publishing
                );
                if guard.input.is_empty() && editable {
                    guard.input = row.content.clone();
                }
            }
            let error = err.to_string();
            let _ = events.send(ClientEvent::CommentSaveFailed {
                post_id,
                content: row.content.clone(),
                error: error.clone(),
            });
            Reconciliation::RolledBack {
                content: row.content,
                error,
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
