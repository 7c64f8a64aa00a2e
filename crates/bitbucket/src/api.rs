//! Bitbucket Cloud API operations the provider relies on.
//!
//! Repositories are addressed as `workspace/repo_slug`.

use async_trait::async_trait;
use forgeport_core::{CommitInfo, Conclusion, Listing, PullRequest, Result, RunStatus, StatusUpdate};
use serde::Serialize;

/// Longest build status key Bitbucket accepts.
pub const MAX_KEY_LEN: usize = 40;

/// Build status state as understood by Bitbucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BuildState {
    /// Queued or executing.
    InProgress,
    /// Finished successfully.
    Successful,
    /// Finished with a failure.
    Failed,
    /// Skipped or finished without a definite outcome.
    Stopped,
}

impl BuildState {
    /// Map a run status and conclusion onto a Bitbucket state.
    #[must_use]
    pub const fn from_run(status: RunStatus, conclusion: Option<Conclusion>) -> Self {
        match (status, conclusion) {
            (RunStatus::InProgress, _) | (_, None) => Self::InProgress,
            (_, Some(Conclusion::Success)) => Self::Successful,
            (_, Some(Conclusion::Failure)) => Self::Failed,
            (_, Some(Conclusion::Skipped | Conclusion::Neutral)) => Self::Stopped,
        }
    }
}

/// Derive a build status key from an application name.
///
/// Lowercase ASCII letters and digits are kept, every other run of
/// characters becomes a single `-`, and the result is capped at
/// [`MAX_KEY_LEN`].
#[must_use]
pub fn status_key(application: &str) -> String {
    let mut key = String::with_capacity(application.len());
    for c in application.chars() {
        if c.is_ascii_alphanumeric() {
            key.push(c.to_ascii_lowercase());
        } else if !key.is_empty() && !key.ends_with('-') {
            key.push('-');
        }
    }
    key.truncate(MAX_KEY_LEN);
    let key = key.trim_end_matches('-');
    if key.is_empty() {
        "forgeport".to_string()
    } else {
        key.to_string()
    }
}

/// Body of the commit build status endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildStatus {
    /// Stable identifier of the status on the commit.
    pub key: String,
    /// State.
    pub state: BuildState,
    /// Display name.
    pub name: String,
    /// Link to the run logs; Bitbucket requires one.
    pub url: String,
    /// One-line description.
    pub description: String,
}

impl BuildStatus {
    /// Render a status update. The link is the update's own, else the
    /// first non-empty of `fallback_urls`.
    #[must_use]
    pub fn from_update(update: &StatusUpdate, fallback_urls: &[Option<&str>]) -> Self {
        let url = update
            .details_url
            .as_deref()
            .into_iter()
            .chain(fallback_urls.iter().copied().flatten())
            .find(|url| !url.is_empty())
            .unwrap_or_default()
            .to_string();
        Self {
            key: status_key(&update.name),
            state: BuildState::from_run(update.status, update.conclusion),
            name: update.name.clone(),
            url,
            description: update
                .presentation
                .as_ref()
                .map(|p| p.summary.clone())
                .unwrap_or_default(),
        }
    }
}

/// Bitbucket Cloud REST operations.
#[async_trait]
pub trait BitbucketApi: Send + Sync {
    /// Resolve `path` at `reference` through `src/{reference}/{path}`.
    ///
    /// Entries carry the commit hash they were listed at as their ID.
    async fn get_src(&self, repo: &str, path: &str, reference: &str) -> Result<Listing>;

    /// Raw content of the file at `path` in commit `reference`.
    async fn get_raw(&self, repo: &str, reference: &str, path: &str) -> Result<String>;

    /// `GET /repositories/{repo}/pullrequests/{id}`, completed with the
    /// destination repository's main branch.
    async fn get_pull_request(&self, repo: &str, id: u64) -> Result<PullRequest>;

    /// `GET /repositories/{repo}/commit/{sha}`.
    async fn get_commit(&self, repo: &str, sha: &str) -> Result<CommitInfo>;

    /// `POST /repositories/{repo}/commit/{sha}/statuses/build`, returning
    /// the status key.
    async fn create_build_status(&self, repo: &str, sha: &str, status: &BuildStatus)
    -> Result<String>;

    /// Link of the build status `key` on `sha`, or `None` when no such
    /// status exists.
    async fn get_build_status_url(&self, repo: &str, sha: &str, key: &str)
    -> Result<Option<String>>;

    /// `PUT /repositories/{repo}/commit/{sha}/statuses/build/{key}`.
    async fn update_build_status(
        &self,
        repo: &str,
        sha: &str,
        key: &str,
        status: &BuildStatus,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use forgeport_core::StatusOpts;

    #[test]
    fn test_status_key() {
        assert_eq!(status_key("Pipelines as Code CI"), "pipelines-as-code-ci");
        assert_eq!(status_key("  CI / lint  "), "ci-lint");
        assert_eq!(status_key("***"), "forgeport");
        let long = status_key(&"a".repeat(60));
        assert_eq!(long.len(), MAX_KEY_LEN);
    }

    #[test]
    fn test_state_mapping() {
        assert_eq!(
            BuildState::from_run(RunStatus::Queued, None),
            BuildState::InProgress
        );
        assert_eq!(
            BuildState::from_run(RunStatus::InProgress, Some(Conclusion::Success)),
            BuildState::InProgress
        );
        assert_eq!(
            BuildState::from_run(RunStatus::Completed, Some(Conclusion::Success)),
            BuildState::Successful
        );
        assert_eq!(
            BuildState::from_run(RunStatus::Completed, Some(Conclusion::Failure)),
            BuildState::Failed
        );
        assert_eq!(
            BuildState::from_run(RunStatus::Completed, Some(Conclusion::Skipped)),
            BuildState::Stopped
        );
    }

    #[test]
    fn test_url_fallbacks() {
        let update = StatusUpdate::from_opts(
            "Pipelines as Code CI",
            &StatusOpts::in_progress(),
            Default::default(),
        );
        let status = BuildStatus::from_update(
            &update,
            &[None, Some(""), Some("https://bitbucket.org/ws/repo")],
        );
        assert_eq!(status.url, "https://bitbucket.org/ws/repo");
        assert_eq!(status.key, "pipelines-as-code-ci");
        assert_eq!(status.state, BuildState::InProgress);
        assert_eq!(status.description, "Pipelines as Code CI is running.");
    }

    #[test]
    fn test_state_serializes_uppercase() {
        assert_eq!(
            serde_json::to_value(BuildState::InProgress).unwrap(),
            serde_json::json!("INPROGRESS")
        );
    }
}
