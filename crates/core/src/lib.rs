//! Core types for forgeport.
//!
//! This crate holds everything that is shared between provider adapters:
//! - [`Event`]: the canonical unit of work against a repository revision
//! - [`Provider`]: the capability contract each platform implements
//! - [`manifest`]: directory-to-manifest aggregation
//! - [`resolver`]: filling events from pull request and commit metadata
//! - [`status`]: presentation table and check-run lifecycle
//! - [`RunReporter`]: single-writer reporting for one run
//!
//! Provider implementations live in the platform crates
//! (`forgeport-github`, `forgeport-gitlab`, `forgeport-bitbucket`).

#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod manifest;
pub mod provider;
pub mod reporter;
pub mod resolver;
pub mod status;

pub use config::{ProviderConfig, ProviderKind};
pub use context::CallContext;
pub use error::{CancelReason, Error, Result};
pub use event::{CheckRunId, CommitInfo, Event, EventType, PullRequest};
pub use manifest::{DirEntry, EntryKind, Listing, TreeSource};
pub use provider::Provider;
pub use reporter::RunReporter;
pub use status::{
    CheckRunState, Conclusion, Presentation, RunStatus, StatusOpts, StatusSink, StatusUpdate,
};
