//! Topic tree enumeration for the retained-message load testing framework.
//!
//! This crate provides the `TopicTree` which produces every node of a
//! complete tree of a given depth and branching factor as a `TopicPath`.
//! The enumeration is deterministic, so two runs with the same parameters
//! publish exactly the same topics in exactly the same order.
//!
//! # Architecture
//!
//! ```text
//! TopicTree { max_depth, values_per_level }
//!        │
//!        ▼
//! ┌─────────────────┐
//! │   TopicPaths    │
//! │                 │
//! │  - cursor       │
//! │  - remaining    │
//! └────────┬────────┘
//!          │  pre-order, ascending labels
//!          ▼
//!    TopicPath ["0", "1", ...]  ──►  "root/0/1"
//! ```
//!
//! # Example
//!
//! ```rust
//! use loadtest_topics::TopicTree;
//!
//! let tree = TopicTree::new(2, 2).unwrap();
//! let topics: Vec<String> = tree.paths().map(|p| p.topic("root")).collect();
//! assert_eq!(
//!     topics,
//!     vec!["root/0", "root/0/0", "root/0/1", "root/1", "root/1/0", "root/1/1"]
//! );
//! ```

pub mod path;
pub mod tree;

// Re-exports for convenience
pub use path::TopicPath;
pub use tree::{TopicPaths, TopicTree, TopicTreeError};
