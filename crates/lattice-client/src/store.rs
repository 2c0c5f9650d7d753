use std::collections::HashSet;

use uuid::Uuid;

use lattice_types::models::Message;

/// Ordered view of the currently open conversation.
///
/// Merges fetched history with live push events and the optimistic
/// copy returned by `send`, deduplicating on message id and keeping
/// ascending `created_at` order (ties keep insertion order). Owned by
/// a single UI context; no internal locking.
#[derive(Debug)]
pub struct ConversationStore {
    counterpart: String,
    messages: Vec<Message>,
    known_ids: HashSet<Uuid>,
}

/// What became of a pushed event.
#[derive(Debug)]
pub enum Received {
    /// Appended to the open conversation
    Appended,
    /// Already present — optimistic copy or replayed push
    Duplicate,
    /// Belongs to another conversation. Surfaced as a notification;
    /// that conversation reloads lazily on next open.
    Notify(Message),
}

impl ConversationStore {
    pub fn open(counterpart: impl Into<String>) -> Self {
        Self {
            counterpart: counterpart.into(),
            messages: Vec::new(),
            known_ids: HashSet::new(),
        }
    }

    pub fn counterpart(&self) -> &str {
        &self.counterpart
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Replace the contents with fetched history, sorted ascending by
    /// creation time.
    pub fn load(&mut self, history: Vec<Message>) {
        self.messages.clear();
        self.known_ids.clear();
        for message in history {
            if self.known_ids.insert(message.id) {
                self.messages.push(message);
            }
        }
        self.messages.sort_by_key(|m| m.created_at);
    }

    /// Insert one message in chronological position. No-op when the id
    /// is already known; returns whether the message was added.
    pub fn append(&mut self, message: Message) -> bool {
        if !self.known_ids.insert(message.id) {
            return false;
        }
        self.messages.push(message);
        self.messages.sort_by_key(|m| m.created_at);
        true
    }

    /// Route a pushed event: appended when the sender matches the open
    /// counterpart, handed back as a notification otherwise.
    pub fn receive(&mut self, message: Message) -> Received {
        if message.from_user_id != self.counterpart {
            return Received::Notify(message);
        }
        if self.append(message) {
            Received::Appended
        } else {
            Received::Duplicate
        }
    }

    /// Drop everything; called when the user navigates away.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.known_ids.clear();
    }
}
