//! Bounded image history for the agent's conversation context.
//!
//! Every navigation shows the model a new page image, and vision requests
//! grow with each image kept in the conversation. [`ImageWindow`] caps that
//! working set: it remembers the last `K` distinct pages visited and nothing
//! else. When the transcript is rendered, only pages still in the window keep
//! their image; older observations get a text placeholder instead.
//!
//! This is a recency window, not a cache. Revisiting a page moves it to the
//! front; there is no frequency or size heuristic.

use std::collections::VecDeque;

/// Last-`K` distinct page visits, most recent at the back.
#[derive(Debug, Clone)]
pub struct ImageWindow {
    capacity: usize,
    recent: VecDeque<usize>,
}

impl ImageWindow {
    /// A window holding at most `capacity` pages (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            recent: VecDeque::with_capacity(capacity + 1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of pages currently retained.
    pub fn len(&self) -> usize {
        self.recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }

    /// Record a visit to `page`. Returns the page evicted to make room, if any.
    pub fn visit(&mut self, page: usize) -> Option<usize> {
        if let Some(pos) = self.recent.iter().position(|&p| p == page) {
            self.recent.remove(pos);
        }
        self.recent.push_back(page);
        if self.recent.len() > self.capacity {
            self.recent.pop_front()
        } else {
            None
        }
    }

    /// Whether `page`'s image is still shown to the model.
    pub fn contains(&self, page: usize) -> bool {
        self.recent.contains(&page)
    }

    /// Retained pages, least recent first.
    pub fn pages(&self) -> impl Iterator<Item = usize> + '_ {
        self.recent.iter().copied()
    }
}
