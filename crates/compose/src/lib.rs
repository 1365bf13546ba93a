//! Compose harness adapter.
//!
//! Drives the external orchestration tool (`docker-compose` or the
//! `docker compose` plugin) through the [`ComposeClient`] trait, and renders
//! the harness configuration into the child process environment via
//! [`HarnessEnv`].

pub mod client;
pub mod env;
pub mod error;

pub use client::{ComposeClient, DockerComposeClient, ServiceState};
pub use env::HarnessEnv;
pub use error::ComposeError;
