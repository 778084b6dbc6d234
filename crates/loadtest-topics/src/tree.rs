//! Bounded topic tree and its pre-order enumeration.

use crate::path::TopicPath;
use serde::Serialize;
use std::iter::FusedIterator;

/// Deepest cursor reserved up front; deeper trees grow the cursor on demand.
const MAX_PREALLOCATED_DEPTH: usize = 64;

/// Error type for topic tree construction.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TopicTreeError {
    /// A tree level must offer at least one label.
    #[error("values_per_level must be at least 1")]
    NoValues,
}

/// A complete tree of topics: `max_depth` levels, each node having exactly
/// `values_per_level` children labelled `"0"` to `"values_per_level - 1"`.
///
/// Every node (not only the leaves) is a publishable topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TopicTree {
    max_depth: usize,
    values_per_level: u32,
}

impl TopicTree {
    /// Create a new tree description.
    ///
    /// A `max_depth` of zero describes an empty tree.
    pub fn new(max_depth: usize, values_per_level: u32) -> Result<Self, TopicTreeError> {
        if values_per_level == 0 {
            return Err(TopicTreeError::NoValues);
        }
        Ok(Self {
            max_depth,
            values_per_level,
        })
    }

    /// Maximum number of levels of any topic.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Number of children of every non-leaf node.
    pub fn values_per_level(&self) -> u32 {
        self.values_per_level
    }

    /// Total number of topics in the tree, `sum(v^k for k in 1..=d)`.
    ///
    /// Returns `None` if the count does not fit in a `u64`.
    pub fn topic_count(&self) -> Option<u64> {
        // A single-value tree is a chain with one topic per level.
        if self.values_per_level == 1 {
            return u64::try_from(self.max_depth).ok();
        }

        let v = u64::from(self.values_per_level);
        let mut level_size = 1u64;
        let mut total = 0u64;
        for _ in 0..self.max_depth {
            level_size = level_size.checked_mul(v)?;
            total = total.checked_add(level_size)?;
        }
        Some(total)
    }

    /// Start a fresh enumeration of every topic in the tree.
    ///
    /// Topics are produced depth-first in pre-order: each path is followed
    /// by all of its descendants before its next sibling, and siblings come
    /// in ascending label order.
    pub fn paths(&self) -> TopicPaths {
        TopicPaths {
            max_depth: self.max_depth,
            values_per_level: self.values_per_level,
            cursor: Vec::with_capacity(self.max_depth.min(MAX_PREALLOCATED_DEPTH)),
            started: false,
            finished: self.max_depth == 0,
            remaining: self
                .topic_count()
                .and_then(|count| usize::try_from(count).ok()),
        }
    }
}

/// Iterator over all topics of a [`TopicTree`].
#[derive(Debug, Clone)]
pub struct TopicPaths {
    max_depth: usize,
    values_per_level: u32,
    /// Label indices of the most recently produced path.
    cursor: Vec<u32>,
    started: bool,
    finished: bool,
    /// Topics left to produce, when that count fits in a `usize`.
    remaining: Option<usize>,
}

impl TopicPaths {
    /// Move the cursor to the next node in pre-order.
    ///
    /// Returns `false` once the whole tree has been visited.
    fn advance(&mut self) -> bool {
        if !self.started {
            self.started = true;
            self.cursor.push(0);
            return true;
        }

        if self.cursor.len() < self.max_depth {
            self.cursor.push(0);
            return true;
        }

        while let Some(last) = self.cursor.pop() {
            if last + 1 < self.values_per_level {
                self.cursor.push(last + 1);
                return true;
            }
        }
        false
    }

    fn current(&self) -> TopicPath {
        TopicPath::new(self.cursor.iter().map(|label| label.to_string()).collect())
    }
}

impl Iterator for TopicPaths {
    type Item = TopicPath;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if !self.advance() {
            self.finished = true;
            return None;
        }
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
        }
        Some(self.current())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.finished {
            return (0, Some(0));
        }
        match self.remaining {
            Some(remaining) => (remaining, Some(remaining)),
            None => (usize::MAX, None),
        }
    }
}

impl FusedIterator for TopicPaths {}
