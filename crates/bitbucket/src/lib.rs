//! Bitbucket Cloud provider for forgeport.
//!
//! This crate provides:
//! - [`BitbucketProvider`]: the [`forgeport_core::Provider`] implementation
//!   for Bitbucket Cloud, reporting status through commit build statuses
//! - [`BitbucketApi`]: the REST operations the provider needs
//! - [`BitbucketHttpClient`]: the reqwest-backed [`BitbucketApi`]

#![warn(missing_docs)]

pub mod api;
pub mod client;
pub mod provider;

pub use api::{BitbucketApi, BuildState, BuildStatus, status_key};
pub use client::BitbucketHttpClient;
pub use provider::BitbucketProvider;
