//! Reconnect sessions with time-based expiry.
//!
//! A session binds an opaque token to a username and the room the user
//! was last in. Tokens are handed out at login; a client that presents
//! a live token as its first line skips authentication and lands back
//! in its room. Sessions not touched within the TTL are evicted —
//! lazily on lookup, and by a periodic sweep owned by the table.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::RngCore;
use tokio::task::JoinHandle;

/// A live reconnect session.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub username: String,
    /// Room the user was last in; `None` while in the lobby.
    pub room: Option<String>,
}

struct Entry {
    session: Session,
    last_access: Instant,
}

pub struct SessionTable {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl SessionTable {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
            sweeper: Mutex::new(None),
        }
    }

    /// Create a session for `username` and return its token: 128 random
    /// bits, hex-encoded, re-drawn on the off chance of a collision with
    /// a live session.
    pub fn create(&self, username: &str) -> String {
        let mut entries = self.entries.lock();
        let token = loop {
            let mut bytes = [0u8; 16];
            rand::thread_rng().fill_bytes(&mut bytes);
            let token = hex::encode(bytes);
            if !entries.contains_key(&token) {
                break token;
            }
        };
        entries.insert(
            token.clone(),
            Entry {
                session: Session {
                    token: token.clone(),
                    username: username.to_string(),
                    room: None,
                },
                last_access: Instant::now(),
            },
        );
        token
    }

    /// Look up a token. A stale match is evicted as a side effect and
    /// reported as not found, indistinguishable from an unknown token.
    pub fn lookup(&self, token: &str) -> Option<Session> {
        let mut entries = self.entries.lock();
        match entries.get(token) {
            Some(entry) if entry.last_access.elapsed() <= self.ttl => {
                Some(entry.session.clone())
            }
            Some(_) => {
                entries.remove(token);
                None
            }
            None => None,
        }
    }

    /// Reset the token's idle clock. Called on every successful reconnect.
    pub fn touch(&self, token: &str) {
        if let Some(entry) = self.entries.lock().get_mut(token) {
            entry.last_access = Instant::now();
        }
    }

    /// Record the room the session is currently in (`None` = lobby).
    pub fn set_room(&self, token: &str, room: Option<String>) {
        if let Some(entry) = self.entries.lock().get_mut(token) {
            entry.session.room = room;
        }
    }

    /// Evict every session idle past the TTL. Returns the eviction count.
    pub fn sweep(&self) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.last_access.elapsed() <= self.ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Start the recurring expiry sweep. The task is owned by the table
    /// and stopped by [`stop_sweeper`](Self::stop_sweeper) or drop.
    pub fn start_sweeper(self: &Arc<Self>, every: Duration) {
        let table = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await; // skip the immediate first tick
            loop {
                interval.tick().await;
                let evicted = table.sweep();
                if evicted > 0 {
                    tracing::info!(evicted, "expired sessions swept");
                }
            }
        });
        if let Some(old) = self.sweeper.lock().replace(handle) {
            old.abort();
        }
    }

    pub fn stop_sweeper(&self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for SessionTable {
    fn drop(&mut self) {
        self.stop_sweeper();
    }
}
