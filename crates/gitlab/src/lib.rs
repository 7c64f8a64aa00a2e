//! GitLab provider for forgeport.
//!
//! This crate provides:
//! - [`GitLabProvider`]: the [`forgeport_core::Provider`] implementation for
//!   GitLab.com and self-managed instances, reporting status through commit
//!   statuses
//! - [`GitLabApi`]: the REST operations the provider needs
//! - [`GitLabHttpClient`]: the reqwest-backed [`GitLabApi`]

#![warn(missing_docs)]

pub mod api;
pub mod client;
pub mod provider;

pub use api::{CommitState, CommitStatus, GitLabApi};
pub use client::GitLabHttpClient;
pub use provider::GitLabProvider;
