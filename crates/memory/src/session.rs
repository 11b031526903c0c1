//! Rolling per-session conversation memory.
//!
//! Each session key owns a bounded deque of turns behind its own lock. The
//! outer map lock is held only long enough to look up or create a session,
//! so concurrent sessions never contend with (or see) each other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// One exchange: what the operator asked and what the agent answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub input: String,
    pub output: String,
    pub at: DateTime<Utc>,
}

struct Session {
    turns: Mutex<VecDeque<Turn>>,
    /// Logical clock value of the last append, for eviction.
    touched: AtomicU64,
}

pub struct SessionMemory {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    window: usize,
    max_sessions: usize,
    clock: AtomicU64,
}

impl SessionMemory {
    /// `window` turns are kept per session; at most `max_sessions` sessions
    /// are kept in total.
    pub fn new(window: usize, max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            window: window.max(1),
            max_sessions: max_sessions.max(1),
            clock: AtomicU64::new(0),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Turns recorded for `key`, oldest first. Unknown keys have none.
    pub async fn history(&self, key: &str) -> Vec<Turn> {
        let session = self.sessions.read().await.get(key).cloned();
        match session {
            Some(session) => session.turns.lock().await.iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Record a turn, evicting the oldest beyond the window.
    pub async fn append(&self, key: &str, input: impl Into<String>, output: impl Into<String>) {
        let session = self.session(key).await;
        let turn = Turn {
            input: input.into(),
            output: output.into(),
            at: Utc::now(),
        };

        let mut turns = session.turns.lock().await;
        turns.push_back(turn);
        while turns.len() > self.window {
            turns.pop_front();
        }
        session
            .touched
            .store(self.clock.fetch_add(1, Ordering::Relaxed), Ordering::Relaxed);
    }

    pub async fn clear(&self, key: &str) -> bool {
        self.sessions.write().await.remove(key).is_some()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn session(&self, key: &str) -> Arc<Session> {
        if let Some(session) = self.sessions.read().await.get(key) {
            return session.clone();
        }

        let mut sessions = self.sessions.write().await;
        // Another task may have created it between the locks.
        if let Some(session) = sessions.get(key) {
            return session.clone();
        }

        if sessions.len() >= self.max_sessions {
            let stale = sessions
                .iter()
                .min_by_key(|(_, s)| s.touched.load(Ordering::Relaxed))
                .map(|(k, _)| k.clone());
            if let Some(stale) = stale {
                debug!(session = %stale, "Evicting least recently used session");
                sessions.remove(&stale);
            }
        }

        let session = Arc::new(Session {
            turns: Mutex::new(VecDeque::with_capacity(self.window)),
            touched: AtomicU64::new(self.clock.fetch_add(1, Ordering::Relaxed)),
        });
        sessions.insert(key.to_string(), session.clone());
        session
    }
}

impl Default for SessionMemory {
    fn default() -> Self {
        Self::new(10, 1024)
    }
}
