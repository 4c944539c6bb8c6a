//! Per-session conversation transcripts, keyed by a client-chosen id.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chatsync_llm::Message;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Non-directive turns kept per transcript (10 user/assistant pairs).
pub const MAX_EXCHANGE_TURNS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Directive,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// An ordered list of turns holding at most one directive turn, always first.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Drop every directive turn, wherever it sits, and put a fresh one first.
    pub fn set_directive(&mut self, content: impl Into<String>) {
        self.turns.retain(|t| t.role != Role::Directive);
        self.turns.insert(0, Turn::new(Role::Directive, content));
    }

    /// Rewrite the directive turn where it is, inserting one if absent.
    pub fn replace_directive(&mut self, content: impl Into<String>) {
        match self.turns.iter_mut().find(|t| t.role == Role::Directive) {
            Some(turn) => turn.content = content.into(),
            None => self.set_directive(content),
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::new(Role::User, content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::new(Role::Assistant, content));
    }

    /// Number of non-directive turns.
    pub fn exchange_len(&self) -> usize {
        self.turns
            .iter()
            .filter(|t| t.role != Role::Directive)
            .count()
    }

    /// Evict the oldest pair of non-directive turns until at most
    /// [`MAX_EXCHANGE_TURNS`] remain.
    pub fn trim(&mut self) {
        while self.exchange_len() > MAX_EXCHANGE_TURNS {
            for _ in 0..2 {
                if let Some(pos) = self.turns.iter().position(|t| t.role != Role::Directive) {
                    self.turns.remove(pos);
                }
            }
        }
    }

    /// The transcript as model messages; the directive becomes the system message.
    pub fn to_messages(&self) -> Vec<Message> {
        self.turns
            .iter()
            .map(|t| match t.role {
                Role::Directive => Message::system(&t.content),
                Role::User => Message::user(&t.content),
                Role::Assistant => Message::assistant(&t.content),
            })
            .collect()
    }
}

/// One chat session. The transcript lock is held for a whole exchange, so
/// concurrent messages on the same session run one after another.
#[derive(Debug)]
pub struct Session {
    id: String,
    transcript: tokio::sync::Mutex<Transcript>,
}

impl Session {
    fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            transcript: tokio::sync::Mutex::new(Transcript::default()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn transcript(&self) -> &tokio::sync::Mutex<Transcript> {
        &self.transcript
    }
}

/// Bounds on the registry. `None` disables a bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// Sessions untouched for this long are dropped on the next lookup.
    pub idle_ttl: Option<Duration>,
    /// Creating a session beyond this count evicts the least recently used one.
    pub max_sessions: Option<usize>,
}

impl SessionLimits {
    pub const fn unbounded() -> Self {
        Self {
            idle_ttl: None,
            max_sessions: None,
        }
    }
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            idle_ttl: Some(Duration::from_secs(6 * 60 * 60)),
            max_sessions: Some(1000),
        }
    }
}

struct Entry {
    session: Arc<Session>,
    last_access: Instant,
}

impl Entry {
    /// An exchange holds the transcript lock for its whole duration.
    fn is_busy(&self) -> bool {
        self.session.transcript.try_lock().is_err()
    }
}

/// Session id → session. Expiry is swept lazily on lookup; there is no timer.
/// Neither expiry nor eviction touches a session with an exchange in flight.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Entry>>,
    limits: SessionLimits,
}

impl SessionRegistry {
    pub fn new(limits: SessionLimits) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            limits,
        }
    }

    pub fn get_or_create(&self, session_id: &str) -> Arc<Session> {
        self.get_or_create_at(session_id, Instant::now())
    }

    pub(crate) fn get_or_create_at(&self, session_id: &str, now: Instant) -> Arc<Session> {
        let mut sessions = self.sessions.lock();

        if let Some(ttl) = self.limits.idle_ttl {
            let before = sessions.len();
            sessions.retain(|_, e| {
                now.saturating_duration_since(e.last_access) < ttl || e.is_busy()
            });
            let expired = before - sessions.len();
            if expired > 0 {
                tracing::debug!(expired, "expired idle sessions");
            }
        }

        if let Some(entry) = sessions.get_mut(session_id) {
            entry.last_access = now;
            return Arc::clone(&entry.session);
        }

        if let Some(max) = self.limits.max_sessions {
            while sessions.len() >= max.max(1) {
                let Some(oldest) = sessions
                    .iter()
                    .filter(|(_, e)| !e.is_busy())
                    .min_by_key(|(_, e)| e.last_access)
                    .map(|(id, _)| id.clone())
                else {
                    break;
                };
                sessions.remove(&oldest);
                tracing::debug!(session = %oldest, "evicted least recently used session");
            }
        }

        let session = Arc::new(Session::new(session_id));
        sessions.insert(
            session_id.to_string(),
            Entry {
                session: Arc::clone(&session),
                last_access: now,
            },
        );
        tracing::debug!(session = session_id, live = sessions.len(), "session created");
        session
    }

    /// Look up without creating or refreshing.
    pub fn get(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions
            .lock()
            .get(session_id)
            .map(|e| Arc::clone(&e.session))
    }

    /// Remove a session. Clearing an unknown id is fine; returns whether
    /// anything was removed.
    pub fn clear(&self, session_id: &str) -> bool {
        self.sessions.lock().remove(session_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(SessionLimits::default())
    }
}
