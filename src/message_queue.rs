//! C1: bounded FIFO of textual requests.
//!
//! Drops silently rather than growing unbounded: capacity is fixed at
//! construction, `push` discards the newest Request on overflow, and
//! `flush` clears the queue before appending.

use std::collections::VecDeque;

use crate::prelude::*;

/// A Request still carrying its queue metadata, before the pipeline splits
/// its text into primary/secondary on poll.
#[derive(Debug, Clone)]
pub struct QueuedRequest {
    pub text: String,
    pub priority: i32,
    pub duration: u32,
}

/// Bounded FIFO, capacity fixed at construction. `push` silently drops the
/// newest Request on overflow; `clear` drops everything without invoking
/// any callback.
#[derive(Debug)]
pub struct MessageQueue {
    capacity: usize,
    items: VecDeque<QueuedRequest>,
}

impl MessageQueue {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, items: VecDeque::with_capacity(capacity) }
    }

    pub fn push(&mut self, text: impl Into<String>, priority: i32, duration: u32, flush: bool) {
        if flush {
            self.items.clear();
        }
        if self.items.len() >= self.capacity {
            return;
        }
        self.items.push_back(QueuedRequest { text: text.into(), priority, duration });
    }

    pub fn pull(&mut self) -> Option<QueuedRequest> {
        self.items.pop_front()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// A parsed `"<primary>|<secondary>"` Request. `secondary` is the symbolic
/// callback name and may be empty.
#[derive(Debug, Clone)]
pub struct Request {
    pub primary: String,
    pub secondary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    BadRequest,
}

impl Request {
    pub fn parse(text: &str) -> Result<Self, RequestError> {
        let mut parts = text.splitn(2, '|');
        let primary = parts.next().unwrap_or("");
        let secondary = parts.next().unwrap_or("");
        if primary.is_empty() {
            return Err(RequestError::BadRequest);
        }
        Ok(Self { primary: primary.to_string(), secondary: secondary.to_string() })
    }

    /// Recombines into the raw `"primary|secondary"` wire form, used when a
    /// pipeline re-pushes a Request onto another queue verbatim (the
    /// NBIO<->image handoff).
    pub fn to_wire(&self) -> String {
        format!("{}|{}", self.primary, self.secondary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_beyond_capacity_drops_newest() {
        let mut q = MessageQueue::new(2);
        q.push("a", 0, 0, false);
        q.push("b", 0, 0, false);
        q.push("c", 0, 0, false);
        assert_eq!(q.len(), 2);
        assert_eq!(q.pull().unwrap().text, "a");
        assert_eq!(q.pull().unwrap().text, "b");
        assert!(q.pull().is_none());
    }

    #[test]
    fn flush_leaves_at_most_one_after_push() {
        let mut q = MessageQueue::new(8);
        for i in 0..5 {
            q.push(format!("req-{i}"), 0, 0, true);
        }
        assert_eq!(q.len(), 1);
        assert_eq!(q.pull().unwrap().text, "req-4");
    }

    #[test]
    fn clear_removes_everything() {
        let mut q = MessageQueue::new(8);
        q.push("a", 0, 0, false);
        q.push("b", 0, 0, false);
        q.clear();
        assert!(q.is_empty());
    }

    #[test]
    fn parse_splits_on_first_pipe() {
        let r = Request::parse("a/b|c|d").unwrap();
        assert_eq!(r.primary, "a/b");
        assert_eq!(r.secondary, "c|d");
    }

    #[test]
    fn parse_rejects_empty_primary() {
        assert_eq!(Request::parse("|tag").unwrap_err(), RequestError::BadRequest);
    }

    #[test]
    fn parse_allows_empty_secondary() {
        let r = Request::parse("/tmp/a.bin").unwrap();
        assert_eq!(r.primary, "/tmp/a.bin");
        assert_eq!(r.secondary, "");
    }
}
