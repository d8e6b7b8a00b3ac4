//! Bounded conversational memory.
//!
//! A capped FIFO of chat turns. Every operation is total: adding to a
//! full buffer evicts the oldest entry, resizing keeps the most recent
//! entries, and reads hand out snapshots so UI readers never alias the
//! live buffer.

use shared::chat::{Message, MessageContent, Role};
use std::collections::VecDeque;

pub const DEFAULT_CAPACITY: usize = 50;

#[derive(Debug)]
pub struct ConversationMemory {
    entries: VecDeque<Message>,
    capacity: usize,
}

impl ConversationMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            capacity,
        }
    }

    /// Rebuild from a persisted snapshot, keeping only the most recent
    /// `capacity` messages.
    pub fn from_messages(messages: Vec<Message>, capacity: usize) -> Self {
        let skip = messages.len().saturating_sub(capacity);
        Self {
            entries: messages.into_iter().skip(skip).collect(),
            capacity,
        }
    }

    pub fn add(&mut self, role: Role, content: MessageContent) {
        self.push(Message { role, content });
    }

    pub fn push(&mut self, message: Message) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(message);
    }

    /// Copy of the buffer in insertion order.
    pub fn snapshot(&self) -> Vec<Message> {
        self.entries.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Re-derive the buffer for a new capacity, preserving only the most
    /// recent entries. Never mutates previously handed-out snapshots.
    pub fn resize(&mut self, new_capacity: usize) {
        let mut kept = self.snapshot();
        let skip = kept.len().saturating_sub(new_capacity);
        self.entries = kept.drain(skip..).collect();
        self.capacity = new_capacity;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
