//! Conversation session management.
//!
//! A [`ConversationSession`] owns the ordered turns of one conversation and
//! drives at most one streamed reply at a time. Every mutation is published
//! as a [`SessionSnapshot`] on a watch channel, which is what presenters
//! consume.
//!
//! The session moves between two states:
//!
//! - **Idle**: `send` is accepted.
//! - **Sending**: a reply is streaming into the pending assistant turn; `send`
//!   and `clear` are rejected without touching the history.
//!
//! A failed reply never escapes the session: the pending turn is replaced
//! with [`FALLBACK_REPLY`] and the session returns to Idle.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};
use std::time::Instant;

use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::client::GenerationBackend;
use crate::credential::Authorizer;
use crate::error::{ErrorKind, Result};
use crate::observability::{
    SESSION_FAILURES, SESSION_REJECTED_SENDS, SESSION_REPLY_DURATION, SESSION_SENDS,
};
use crate::persona::FALLBACK_REPLY;
use crate::types::ConversationTurn;

/// Read-only copy of a session handed to presenters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    /// Every turn, oldest first. The last one may still be growing.
    pub turns: Vec<ConversationTurn>,
    /// True while a reply is in flight.
    pub is_busy: bool,
}

impl SessionSnapshot {
    /// The most recent turn, if any.
    pub fn last_turn(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }
}

/// Counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Number of turns in the history, greeting included.
    pub turn_count: usize,
    /// Number of turns written by the user.
    pub user_turns: usize,
    /// Replies that streamed to completion.
    pub completed_replies: u64,
    /// Replies replaced by the fallback text.
    pub failed_replies: u64,
    /// Calls to `send` that were ignored because a reply was in flight.
    pub rejected_sends: u64,
}

/// How a reply task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// Every fragment was applied and the turn was frozen.
    Completed,
    /// The pending turn was replaced by the fallback text.
    Failed(ErrorKind),
    /// The session was closed, cleared or dropped while the reply was
    /// streaming; nothing further was applied.
    Abandoned,
}

/// Completion handle for one reply.
///
/// Awaiting it is optional: dropping the handle leaves the reply running.
#[derive(Debug)]
pub struct ReplyHandle {
    task: JoinHandle<ReplyOutcome>,
}

impl Future for ReplyHandle {
    type Output = ReplyOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<ReplyOutcome> {
        match Pin::new(&mut self.task).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(err)) => {
                tracing::error!(error = %err, "reply task did not finish");
                Poll::Ready(ReplyOutcome::Abandoned)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

struct SessionState {
    turns: Vec<ConversationTurn>,
    seed: Vec<ConversationTurn>,
    pending: Option<usize>,
    // Bumped whenever in-flight replies must stop applying fragments.
    epoch: u64,
    closed: bool,
    stats: SessionStats,
}

impl SessionState {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            turns: self.turns.clone(),
            is_busy: self.pending.is_some(),
        }
    }
}

struct Shared {
    state: Mutex<SessionState>,
    updates: watch::Sender<SessionSnapshot>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &SessionState) {
        self.updates.send_replace(state.snapshot());
    }
}

/// One conversation with the advisor.
pub struct ConversationSession {
    shared: Arc<Shared>,
    backend: Arc<dyn GenerationBackend>,
    authorizer: Arc<dyn Authorizer>,
}

impl ConversationSession {
    /// Creates an empty session.
    pub fn new(backend: Arc<dyn GenerationBackend>, authorizer: Arc<dyn Authorizer>) -> Self {
        Self::with_turns(backend, authorizer, Vec::new())
    }

    /// Creates a session whose history starts with `seed`. [`clear`] returns
    /// to this history.
    ///
    /// [`clear`]: ConversationSession::clear
    pub fn with_turns(
        backend: Arc<dyn GenerationBackend>,
        authorizer: Arc<dyn Authorizer>,
        seed: Vec<ConversationTurn>,
    ) -> Self {
        let state = SessionState {
            turns: seed.clone(),
            seed,
            pending: None,
            epoch: 0,
            closed: false,
            stats: SessionStats::default(),
        };
        let (updates, _) = watch::channel(state.snapshot());
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                updates,
            }),
            backend,
            authorizer,
        }
    }

    /// Sends a user message and starts streaming the reply.
    ///
    /// Before returning, the user turn and an empty assistant turn are
    /// appended and the session is marked busy. The reply then streams into
    /// that assistant turn on a spawned task.
    ///
    /// Returns `None` without changing anything if `text` is blank, a reply
    /// is already in flight, or the session was closed.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn send(&self, text: &str) -> Option<ReplyHandle> {
        let prompt = text.trim();
        if prompt.is_empty() {
            return None;
        }

        let (history, pending, epoch) = {
            let mut state = self.shared.lock();
            if state.closed {
                return None;
            }
            if state.pending.is_some() {
                state.stats.rejected_sends += 1;
                SESSION_REJECTED_SENDS.click();
                tracing::debug!("send rejected: reply in flight");
                return None;
            }
            let history = state.turns.clone();
            state.turns.push(ConversationTurn::user(prompt));
            state.turns.push(ConversationTurn::assistant(""));
            let pending = state.turns.len() - 1;
            state.pending = Some(pending);
            self.shared.publish(&state);
            (history, pending, state.epoch)
        };
        SESSION_SENDS.click();

        let reply = PendingReply {
            shared: Arc::downgrade(&self.shared),
            index: pending,
            epoch,
        };
        let task = tokio::spawn(run_reply(
            reply,
            prompt.to_string(),
            history,
            Arc::clone(&self.backend),
            Arc::clone(&self.authorizer),
        ));
        Some(ReplyHandle { task })
    }

    /// A copy of the current turns and busy flag.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.lock().snapshot()
    }

    /// Subscribe to snapshots published after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.updates.subscribe()
    }

    /// True while a reply is in flight.
    pub fn is_busy(&self) -> bool {
        self.shared.lock().pending.is_some()
    }

    /// Starts over from the seed history. Rejected (returns false) while a
    /// reply is in flight or after [`close`](ConversationSession::close).
    pub fn clear(&self) -> bool {
        let mut state = self.shared.lock();
        if state.closed || state.pending.is_some() {
            return false;
        }
        state.turns = state.seed.clone();
        state.epoch += 1;
        self.shared.publish(&state);
        true
    }

    /// Discards the session. A reply still streaming stops applying
    /// fragments, and later sends are ignored.
    pub fn close(&self) {
        let mut state = self.shared.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        state.epoch += 1;
        state.pending = None;
        self.shared.publish(&state);
    }

    /// Whether [`close`](ConversationSession::close) was called.
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Counters for this session.
    pub fn stats(&self) -> SessionStats {
        let state = self.shared.lock();
        SessionStats {
            turn_count: state.turns.len(),
            user_turns: state.turns.iter().filter(|turn| turn.is_user()).count(),
            ..state.stats
        }
    }
}

impl Drop for ConversationSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// The pending assistant turn as seen from the reply task.
struct PendingReply {
    shared: Weak<Shared>,
    index: usize,
    epoch: u64,
}

impl PendingReply {
    /// Runs `f` on the session state if this reply still owns the pending
    /// turn, then publishes. Returns false once the session moved on.
    fn update(&self, f: impl FnOnce(&mut SessionState)) -> bool {
        let Some(shared) = self.shared.upgrade() else {
            return false;
        };
        let mut state = shared.lock();
        if state.epoch != self.epoch || state.pending != Some(self.index) {
            return false;
        }
        f(&mut state);
        shared.publish(&state);
        true
    }

    fn append(&self, fragment: &str) -> bool {
        self.update(|state| state.turns[self.index].text.push_str(fragment))
    }

    fn complete(&self) -> bool {
        self.update(|state| {
            state.pending = None;
            state.stats.completed_replies += 1;
        })
    }

    fn fail(&self) -> bool {
        self.update(|state| {
            state.turns[self.index].text = FALLBACK_REPLY.to_string();
            state.pending = None;
            state.stats.failed_replies += 1;
        })
    }
}

enum StreamEnd {
    Finished,
    Abandoned,
}

async fn run_reply(
    reply: PendingReply,
    prompt: String,
    history: Vec<ConversationTurn>,
    backend: Arc<dyn GenerationBackend>,
    authorizer: Arc<dyn Authorizer>,
) -> ReplyOutcome {
    let start = Instant::now();
    let result = stream_reply(&reply, &prompt, &history, &*backend, &*authorizer).await;
    SESSION_REPLY_DURATION.add(start.elapsed().as_secs_f64());

    match result {
        Ok(StreamEnd::Finished) => {
            if reply.complete() {
                ReplyOutcome::Completed
            } else {
                ReplyOutcome::Abandoned
            }
        }
        Ok(StreamEnd::Abandoned) => ReplyOutcome::Abandoned,
        Err(err) => {
            SESSION_FAILURES.click();
            tracing::warn!(error = %err, kind = %err.kind(), "advisor reply failed");
            if err.is_authorization() {
                authorizer.invalidate().await;
            }
            if reply.fail() {
                ReplyOutcome::Failed(err.kind())
            } else {
                ReplyOutcome::Abandoned
            }
        }
    }
}

async fn stream_reply(
    reply: &PendingReply,
    prompt: &str,
    history: &[ConversationTurn],
    backend: &dyn GenerationBackend,
    authorizer: &dyn Authorizer,
) -> Result<StreamEnd> {
    let credential = authorizer.ensure_authorized().await?;
    let mut fragments = backend.stream_text(prompt, history, &credential).await?;
    while let Some(fragment) = fragments.next().await {
        let fragment = fragment?;
        if !reply.append(&fragment) {
            tracing::debug!("session moved on; dropping the rest of the reply");
            return Ok(StreamEnd::Abandoned);
        }
    }
    Ok(StreamEnd::Finished)
}
