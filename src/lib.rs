//! Guardian: an audited execution membrane for high-risk actions.
//!
//! Wraps file writes, deletions, shell commands, JSON writes, and outbound
//! HTTP requests so that each gated call is bounded by a time budget,
//! validated against its real-world effect, and journaled as one decision
//! record. Audit failures degrade to a last-resort log and never change
//! the wrapped operation's outcome.
//!
//! See `DESIGN.md` for full architecture documentation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod logging;

pub mod budget;
pub mod capability;
pub mod decision;
pub mod guard;

pub mod actions;
pub mod executor;

pub mod ipc;
