//! A single publishable topic path.

use std::fmt;

/// Separator between topic levels.
pub const TOPIC_SEPARATOR: char = '/';

/// An ordered sequence of topic levels, e.g. `["3", "0", "7"]`.
///
/// Paths are produced by [`crate::TopicTree`] and are owned values: every
/// path handed out by the enumeration has its own backing storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopicPath {
    segments: Vec<String>,
}

impl TopicPath {
    /// Create a path from its segments.
    pub fn new(segments: Vec<String>) -> Self {
        Self { segments }
    }

    /// The levels of this path, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of levels in this path.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Mutable access to the levels of this path.
    pub fn segments_mut(&mut self) -> &mut Vec<String> {
        &mut self.segments
    }

    /// Consume the path and return its levels.
    pub fn into_segments(self) -> Vec<String> {
        self.segments
    }

    /// Build the full topic name by joining `root` and all levels with `/`.
    pub fn topic(&self, root: &str) -> String {
        let capacity = root.len() + self.segments.iter().map(|s| s.len() + 1).sum::<usize>();
        let mut topic = String::with_capacity(capacity);
        topic.push_str(root);
        for segment in &self.segments {
            topic.push(TOPIC_SEPARATOR);
            topic.push_str(segment);
        }
        topic
    }
}

impl fmt::Display for TopicPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.segments.join(","))
    }
}

impl From<Vec<String>> for TopicPath {
    fn from(segments: Vec<String>) -> Self {
        Self::new(segments)
    }
}
