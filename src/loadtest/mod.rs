//! Loadtest command handlers.
//!
//! This module contains handlers for the populate and topics commands.

pub mod populate;
pub mod topics;
