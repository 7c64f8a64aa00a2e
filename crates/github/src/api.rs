//! GitHub API operations the provider relies on.
//!
//! This trait abstracts the GitHub REST calls so the provider can work
//! against [`OctocrabClient`](crate::OctocrabClient) in production and
//! in-memory fakes in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forgeport_core::{CommitInfo, Listing, PullRequest, Result, StatusUpdate};

/// Parameters for creating a check run.
#[derive(Debug, Clone)]
pub struct NewCheckRun {
    /// Commit the check run is attached to.
    pub head_sha: String,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// Logs link.
    pub details_url: Option<String>,
    /// Name, status, output and conclusion.
    pub update: StatusUpdate,
}

/// GitHub REST operations.
#[async_trait]
pub trait GitHubApi: Send + Sync {
    /// `GET /repos/{owner}/{repo}/contents/{path}?ref={reference}`.
    ///
    /// A 404 is reported as [`Listing::Missing`], not as an error.
    async fn get_contents(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        reference: &str,
    ) -> Result<Listing>;

    /// `GET /repos/{owner}/{repo}/git/blobs/{sha}`, decoded.
    async fn get_blob(&self, owner: &str, repo: &str, sha: &str) -> Result<String>;

    /// `GET /repos/{owner}/{repo}/pulls/{number}`.
    async fn get_pull_request(&self, owner: &str, repo: &str, number: u64)
    -> Result<PullRequest>;

    /// `GET /repos/{owner}/{repo}/git/commits/{sha}`.
    async fn get_commit(&self, owner: &str, repo: &str, sha: &str) -> Result<CommitInfo>;

    /// `POST /repos/{owner}/{repo}/check-runs`, returning the new ID.
    async fn create_check_run(&self, owner: &str, repo: &str, run: &NewCheckRun) -> Result<u64>;

    /// `PATCH /repos/{owner}/{repo}/check-runs/{id}`.
    async fn update_check_run(
        &self,
        owner: &str,
        repo: &str,
        check_run_id: u64,
        update: &StatusUpdate,
    ) -> Result<()>;
}
