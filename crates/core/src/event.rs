//! Canonical event model.
//!
//! An [`Event`] describes one unit of work against a repository at a
//! revision. Triggers produce a partially filled event, the resolver
//! completes it, and the reporter records the status handle on it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of trigger that produced an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A branch was pushed.
    #[default]
    Push,
    /// A pull (merge) request was opened or updated.
    PullRequest,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Push => write!(f, "push"),
            Self::PullRequest => write!(f, "pull_request"),
        }
    }
}

/// Provider-side identifier of a status object (check run, commit status
/// or build status key).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckRunId(String);

impl CheckRunId {
    /// Wrap a provider identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for CheckRunId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for CheckRunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A unit of work against a repository at a revision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Repository owner (user, organisation, group or workspace).
    pub owner: String,
    /// Repository name.
    pub repository: String,
    /// Resolved commit SHA.
    pub sha: String,
    /// Repository or pull request URL.
    pub url: String,
    /// Permalink to the commit.
    pub sha_url: String,
    /// First line of the commit message.
    pub sha_title: String,
    /// Branch the pull request targets. Always taken from the base side.
    pub base_branch: String,
    /// Branch the change comes from.
    pub head_branch: String,
    /// Default branch of the base repository.
    pub default_branch: String,
    /// Login of the actor who caused the event.
    pub sender: String,
    /// Trigger kind.
    pub event_type: EventType,
    /// Pull request number, once resolved.
    pub pull_request_number: Option<u64>,
    /// Status object created for this run; `None` until the first report.
    pub check_run_id: Option<CheckRunId>,
}

impl Event {
    /// Create an event for a commit in `owner/repository`.
    pub fn new(
        owner: impl Into<String>,
        repository: impl Into<String>,
        sha: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repository: repository.into(),
            sha: sha.into(),
            ..Self::default()
        }
    }

    /// Set the base branch.
    #[must_use]
    pub fn with_base_branch(mut self, branch: impl Into<String>) -> Self {
        self.base_branch = branch.into();
        self
    }

    /// Set the head branch.
    #[must_use]
    pub fn with_head_branch(mut self, branch: impl Into<String>) -> Self {
        self.head_branch = branch.into();
        self
    }

    /// Set the sender.
    #[must_use]
    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = sender.into();
        self
    }

    /// `owner/repository`, as used in logs and errors.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repository)
    }

    /// Revision to read from: the commit, or the trusted base branch.
    #[must_use]
    pub fn revision(&self, use_base_branch: bool) -> &str {
        if use_base_branch {
            &self.base_branch
        } else {
            &self.sha
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} {} ({})",
            self.owner,
            self.repository,
            self.event_type,
            self.sha.get(..7).unwrap_or(&self.sha)
        )
    }
}

/// Snapshot of a pull request as reported by the provider.
///
/// Built fresh for every resolution; never cached between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullRequest {
    /// Pull request number (GitHub number, GitLab iid, Bitbucket id).
    pub number: u64,
    /// Default branch of the base (target) repository.
    pub base_repo_default_branch: String,
    /// Web URL of the base repository.
    pub base_repo_url: String,
    /// Branch the pull request targets.
    pub base_ref: String,
    /// Commit the base branch pointed at.
    pub base_sha: String,
    /// Branch the pull request comes from.
    pub head_ref: String,
    /// Head commit.
    pub head_sha: String,
    /// Default branch of the head repository, when the provider reports it.
    /// Informational only.
    pub head_repo_default_branch: Option<String>,
    /// Login of the pull request author.
    pub author: String,
    /// Web URL of the pull request.
    pub html_url: String,
    /// Permalink to the head commit.
    pub head_commit_url: String,
}

/// Commit metadata used for push triggers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitInfo {
    /// Web URL of the commit.
    pub html_url: String,
    /// Full commit message.
    pub message: String,
}
