//! GitHub provider for forgeport.
//!
//! This crate provides:
//! - [`GitHubProvider`]: the [`forgeport_core::Provider`] implementation for
//!   GitHub and GitHub Enterprise, reporting status through check runs
//! - [`GitHubApi`]: the REST operations the provider needs
//! - [`OctocrabClient`]: the octocrab-backed [`GitHubApi`]

#![warn(missing_docs)]

pub mod api;
pub mod client;
pub mod provider;

// Re-exports for convenience
pub use api::{GitHubApi, NewCheckRun};
pub use client::OctocrabClient;
pub use provider::GitHubProvider;
