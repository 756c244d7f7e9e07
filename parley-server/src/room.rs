//! Rooms: named broadcast groups with history and a member set.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::text;

/// Reserved name prefix that switches a room into AI mode for its
/// lifetime. The remainder of the name, trimmed, is the system prompt.
pub const AI_PREFIX: &str = "AI ";

/// Prefix marking engine replies in history and on the wire. Broadcasts
/// carrying it must never re-trigger the AI bridge.
pub const BOT_PREFIX: &str = "Bot:";

/// Write half of one member's connection. Lines pushed here are drained
/// by that connection's delivery task; the queue is unbounded, so a
/// broadcast never blocks on a slow reader.
pub type Outbound = mpsc::UnboundedSender<String>;

struct RoomInner {
    history: Vec<String>,
    members: HashMap<String, Outbound>,
}

pub struct Room {
    pub name: String,
    is_ai: bool,
    ai_prompt: Option<String>,
    inner: Mutex<RoomInner>,
}

impl Room {
    fn new(name: &str) -> Self {
        let is_ai = name.starts_with(AI_PREFIX);
        let ai_prompt = is_ai.then(|| name[AI_PREFIX.len()..].trim().to_string());
        Self {
            name: name.to_string(),
            is_ai,
            ai_prompt,
            inner: Mutex::new(RoomInner {
                history: Vec::new(),
                members: HashMap::new(),
            }),
        }
    }

    pub fn is_ai(&self) -> bool {
        self.is_ai
    }

    pub fn ai_prompt(&self) -> Option<&str> {
        self.ai_prompt.as_deref()
    }

    /// Insert a member, replacing any handle already registered under
    /// the same username — a reconnecting client supersedes the handle
    /// of its dead connection.
    pub fn add_member(&self, username: &str, outbound: Outbound) {
        self.inner.lock().members.insert(username.to_string(), outbound);
    }

    /// Remove a member if present; no-op otherwise.
    pub fn remove_member(&self, username: &str) {
        self.inner.lock().members.remove(username);
    }

    pub fn member_count(&self) -> usize {
        self.inner.lock().members.len()
    }

    /// Append `line` to history and push it to every current member, in
    /// one critical section: a member present for the append sees the
    /// line, a member removed before it does not. Delivery order per
    /// room is the order broadcasts acquire this lock.
    pub fn broadcast(&self, line: &str) {
        let mut inner = self.inner.lock();
        inner.history.push(line.to_string());
        let colored = text::colorize(line);
        for outbound in inner.members.values() {
            // A closed receiver is a member mid-teardown; its departure
            // cleanup is the handler's job.
            let _ = outbound.send(colored.clone());
        }
    }

    /// Snapshot of the conversation so far, in broadcast order.
    pub fn history(&self) -> Vec<String> {
        self.inner.lock().history.clone()
    }
}

/// Name → room map, created lazily. Rooms are never removed: a `/join`
/// race can at worst observe an empty room, not a vanished one.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: Mutex<HashMap<String, Arc<Room>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent: the first caller for `name` creates the room, later
    /// callers get the same instance.
    pub fn get_or_create(&self, name: &str) -> Arc<Room> {
        let mut rooms = self.rooms.lock();
        Arc::clone(
            rooms
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Room::new(name))),
        )
    }

    /// Fetch without creating — leave and disconnect paths use this so
    /// they cannot resurrect a room.
    pub fn get(&self, name: &str) -> Option<Arc<Room>> {
        self.rooms.lock().get(name).cloned()
    }

    /// Current room names, sorted, including empty rooms.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.rooms.lock().keys().cloned().collect();
        names.sort();
        names
    }
}
