//! hubtest CLI library.
//!
//! Exposes the launcher and command handlers for integration testing.
//! In production, `hubtest` is used as a binary (main.rs).

pub mod cli;
pub mod commands;
pub mod error;
pub mod launcher;
pub mod logging;
pub mod output;
pub mod signal;
