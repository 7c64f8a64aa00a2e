//! GitLab API operations the provider relies on.
//!
//! Projects are addressed by their full path (`group/subgroup/project`);
//! the client takes care of encoding it.

use async_trait::async_trait;
use forgeport_core::{CommitInfo, Conclusion, Listing, PullRequest, Result, RunStatus, StatusUpdate};
use serde::Serialize;

/// Commit status state as understood by GitLab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitState {
    /// Queued.
    Pending,
    /// Executing.
    Running,
    /// Finished successfully.
    Success,
    /// Finished with a failure.
    Failed,
    /// Finished without a definite outcome.
    Canceled,
    /// Not executed.
    Skipped,
}

impl CommitState {
    /// Map a run status and conclusion onto a GitLab state.
    #[must_use]
    pub const fn from_run(status: RunStatus, conclusion: Option<Conclusion>) -> Self {
        match (status, conclusion) {
            (RunStatus::InProgress, _) => Self::Running,
            (_, Some(Conclusion::Success)) => Self::Success,
            (_, Some(Conclusion::Failure)) => Self::Failed,
            (_, Some(Conclusion::Skipped)) => Self::Skipped,
            (_, Some(Conclusion::Neutral)) => Self::Canceled,
            (_, None) => Self::Pending,
        }
    }
}

/// Body of `POST /projects/:id/statuses/:sha`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitStatus {
    /// State.
    pub state: CommitState,
    /// Status context, shown as the job name.
    pub name: String,
    /// Link to the run logs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
    /// One-line description.
    pub description: String,
}

impl CommitStatus {
    /// Render a status update. `fallback_url` is used when the update
    /// carries no link of its own.
    #[must_use]
    pub fn from_update(update: &StatusUpdate, fallback_url: Option<&str>) -> Self {
        Self {
            state: CommitState::from_run(update.status, update.conclusion),
            name: update.name.clone(),
            target_url: update
                .details_url
                .clone()
                .or_else(|| fallback_url.map(str::to_string)),
            description: update
                .presentation
                .as_ref()
                .map(|p| p.summary.clone())
                .unwrap_or_default(),
        }
    }
}

/// GitLab REST operations.
#[async_trait]
pub trait GitLabApi: Send + Sync {
    /// Resolve `path` in `project` at `reference` through the repository
    /// tree and files APIs. A path that exists in neither is
    /// [`Listing::Missing`].
    async fn get_tree(&self, project: &str, path: &str, reference: &str) -> Result<Listing>;

    /// `GET /projects/:id/repository/blobs/:sha/raw`.
    async fn get_raw_blob(&self, project: &str, sha: &str) -> Result<String>;

    /// `GET /projects/:id/merge_requests/:iid`, completed with the target
    /// project's default branch.
    async fn get_merge_request(&self, project: &str, iid: u64) -> Result<PullRequest>;

    /// `GET /projects/:id/repository/commits/:sha`.
    async fn get_commit(&self, project: &str, sha: &str) -> Result<CommitInfo>;

    /// `POST /projects/:id/statuses/:sha`, returning the status ID.
    ///
    /// Posting again with the same name replaces the previous status.
    async fn set_commit_status(&self, project: &str, sha: &str, status: &CommitStatus)
    -> Result<u64>;
}
