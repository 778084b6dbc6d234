//! Common types and utilities for loadtest populators.
//!
//! This crate provides the argument group shared by every populate-style
//! command: the shape of the topic tree and the pacing knobs. Values left
//! unset on the command line fall back to the configuration file and then to
//! built-in defaults.

pub mod args;

pub use args::CommonPopulateArgs;
