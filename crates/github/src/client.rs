//! [`GitHubApi`] implementation backed by octocrab.

use crate::api::{GitHubApi, NewCheckRun};
use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use forgeport_core::{
    CommitInfo, Conclusion, DirEntry, EntryKind, Error, Listing, ProviderConfig, PullRequest,
    Result, RunStatus, StatusUpdate,
};
use octocrab::Octocrab;
use octocrab::models::repos::Content;
use octocrab::service::middleware::retry::RetryConfig;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::debug;

const PROVIDER: &str = "github";

/// GitHub REST client.
#[derive(Clone)]
pub struct OctocrabClient {
    octocrab: Octocrab,
}

impl OctocrabClient {
    /// Create a client authenticated with the configured token.
    ///
    /// A configured `api_url` selects a GitHub Enterprise endpoint. Failed
    /// requests are not retried; callers own the retry policy.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let token = config.resolve_token()?;

        let mut builder = Octocrab::builder().add_retry_config(RetryConfig::None);
        if config.is_enterprise() {
            let base = config.api_base();
            debug!(api_url = %base, "Using GitHub Enterprise endpoint");
            builder = builder.base_uri(base.as_str()).map_err(|e| {
                Error::configuration(
                    format!("Invalid GitHub API URL '{base}': {e}"),
                    "Set api_url to the enterprise API root, e.g. https://ghe.example.com/api/v3",
                )
            })?;
        }

        let octocrab = builder
            .personal_token(token.expose_secret().to_string())
            .build()
            .map_err(|e| {
                Error::configuration(
                    format!("Failed to create GitHub client: {e}"),
                    "Check the GitHub token and API URL",
                )
            })?;

        Ok(Self { octocrab })
    }

    /// Wrap an existing octocrab instance, keeping its retry configuration.
    #[must_use]
    pub const fn new(octocrab: Octocrab) -> Self {
        Self { octocrab }
    }
}

fn is_not_found(err: &octocrab::Error) -> bool {
    match err {
        octocrab::Error::GitHub { source, .. } => {
            source.status_code.as_u16() == 404 || source.message.contains("Not Found")
        }
        _ => false,
    }
}

fn api_error(owner: &str, repo: &str, action: String, err: octocrab::Error) -> Error {
    Error::transport_with_source(PROVIDER, format!("{owner}/{repo}"), action, err)
}

fn entry_from_content(item: &Content) -> DirEntry {
    let kind = match item.r#type.as_str() {
        "file" => EntryKind::File,
        "dir" => EntryKind::Directory,
        _ => EntryKind::Other,
    };
    DirEntry {
        name: item.name.clone(),
        path: item.path.clone(),
        id: item.sha.clone(),
        kind,
    }
}

/// The contents endpoint answers a non-directory path (file, symlink or
/// submodule) with that single object and a directory path with its
/// entries, whose paths always extend the requested one.
fn classify_listing(path: &str, entries: Vec<DirEntry>) -> Listing {
    let requested = path.trim_matches('/');
    if let [entry] = entries.as_slice()
        && entry.path == requested
    {
        return Listing::File(entry.clone());
    }
    Listing::Directory(entries)
}

#[derive(Debug, Deserialize)]
struct GitBlob {
    content: String,
    #[serde(default)]
    encoding: String,
}

fn decode_blob(blob: &GitBlob) -> std::result::Result<String, String> {
    if blob.encoding != "base64" {
        return Ok(blob.content.clone());
    }
    let compact: String = blob
        .content
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| format!("invalid base64 blob: {e}"))?;
    String::from_utf8(bytes).map_err(|e| format!("blob is not UTF-8: {e}"))
}

#[derive(Debug, Deserialize)]
struct GitCommit {
    html_url: String,
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct RepoRef {
    #[serde(default)]
    default_branch: Option<String>,
    #[serde(default)]
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Branch {
    #[serde(rename = "ref")]
    ref_field: String,
    sha: String,
    #[serde(default)]
    repo: Option<RepoRef>,
}

#[derive(Debug, Deserialize)]
struct User {
    login: String,
}

#[derive(Debug, Deserialize)]
struct PullRequestPayload {
    number: u64,
    html_url: String,
    #[serde(default)]
    user: Option<User>,
    base: Branch,
    head: Branch,
}

impl From<PullRequestPayload> for PullRequest {
    fn from(pr: PullRequestPayload) -> Self {
        let base_repo = pr.base.repo.unwrap_or_default();
        let head_commit_url = format!("{}/commit/{}", pr.html_url, pr.head.sha);
        Self {
            number: pr.number,
            base_repo_default_branch: base_repo.default_branch.unwrap_or_default(),
            base_repo_url: base_repo.html_url.unwrap_or_default(),
            base_ref: pr.base.ref_field,
            base_sha: pr.base.sha,
            head_ref: pr.head.ref_field,
            head_sha: pr.head.sha,
            head_repo_default_branch: pr.head.repo.and_then(|r| r.default_branch),
            author: pr.user.map(|u| u.login).unwrap_or_default(),
            html_url: pr.html_url,
            head_commit_url,
        }
    }
}

#[derive(Debug, Serialize)]
struct CheckRunOutput<'a> {
    title: &'a str,
    summary: &'a str,
    text: &'a str,
}

/// Check run request body. Absent fields are left untouched by GitHub.
#[derive(Debug, Serialize)]
struct CheckRunBody<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    head_sha: Option<&'a str>,
    status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<CheckRunOutput<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    conclusion: Option<Conclusion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    completed_at: Option<DateTime<Utc>>,
}

impl<'a> CheckRunBody<'a> {
    fn update(update: &'a StatusUpdate) -> Self {
        Self {
            name: &update.name,
            head_sha: None,
            status: update.status,
            started_at: None,
            details_url: update.details_url.as_deref(),
            output: update.presentation.as_ref().map(|p| CheckRunOutput {
                title: &p.title,
                summary: &p.summary,
                text: &update.text,
            }),
            conclusion: update.completed_at.and(update.conclusion),
            completed_at: update.conclusion.and(update.completed_at),
        }
    }

    fn create(run: &'a NewCheckRun) -> Self {
        Self {
            head_sha: Some(run.head_sha.as_str()),
            started_at: Some(run.started_at),
            details_url: run.details_url.as_deref(),
            ..Self::update(&run.update)
        }
    }
}

#[derive(Debug, Deserialize)]
struct CheckRunRef {
    id: u64,
}

#[async_trait]
impl GitHubApi for OctocrabClient {
    async fn get_contents(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        reference: &str,
    ) -> Result<Listing> {
        debug!(owner, repo, path, reference, "Listing repository contents");
        let result = self
            .octocrab
            .repos(owner, repo)
            .get_content()
            .path(path)
            .r#ref(reference)
            .send()
            .await;

        match result {
            Ok(contents) => {
                let entries = contents.items.iter().map(entry_from_content).collect();
                Ok(classify_listing(path, entries))
            }
            Err(e) if is_not_found(&e) => Ok(Listing::Missing),
            Err(e) => Err(api_error(
                owner,
                repo,
                format!("failed to get contents of {path} at {reference}"),
                e,
            )),
        }
    }

    async fn get_blob(&self, owner: &str, repo: &str, sha: &str) -> Result<String> {
        let blob: GitBlob = self
            .octocrab
            .get(format!("/repos/{owner}/{repo}/git/blobs/{sha}"), None::<&()>)
            .await
            .map_err(|e| api_error(owner, repo, format!("failed to get blob {sha}"), e))?;

        decode_blob(&blob).map_err(|message| {
            Error::transport(PROVIDER, format!("{owner}/{repo}"), format!("blob {sha}: {message}"))
        })
    }

    async fn get_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<PullRequest> {
        let pr: PullRequestPayload = self
            .octocrab
            .get(format!("/repos/{owner}/{repo}/pulls/{number}"), None::<&()>)
            .await
            .map_err(|e| api_error(owner, repo, format!("failed to get pull request #{number}"), e))?;
        Ok(pr.into())
    }

    async fn get_commit(&self, owner: &str, repo: &str, sha: &str) -> Result<CommitInfo> {
        let commit: GitCommit = self
            .octocrab
            .get(format!("/repos/{owner}/{repo}/git/commits/{sha}"), None::<&()>)
            .await
            .map_err(|e| api_error(owner, repo, format!("failed to get commit {sha}"), e))?;
        Ok(CommitInfo {
            html_url: commit.html_url,
            message: commit.message,
        })
    }

    async fn create_check_run(&self, owner: &str, repo: &str, run: &NewCheckRun) -> Result<u64> {
        let check_run: CheckRunRef = self
            .octocrab
            .post(
                format!("/repos/{owner}/{repo}/check-runs"),
                Some(&CheckRunBody::create(run)),
            )
            .await
            .map_err(|e| api_error(owner, repo, "failed to create check run".to_string(), e))?;

        Ok(check_run.id)
    }

    async fn update_check_run(
        &self,
        owner: &str,
        repo: &str,
        check_run_id: u64,
        update: &StatusUpdate,
    ) -> Result<()> {
        let check_run: CheckRunRef = self
            .octocrab
            .patch(
                format!("/repos/{owner}/{repo}/check-runs/{check_run_id}"),
                Some(&CheckRunBody::update(update)),
            )
            .await
            .map_err(|e| {
                api_error(
                    owner,
                    repo,
                    format!("failed to update check run {check_run_id}"),
                    e,
                )
            })?;

        debug!(owner, repo, check_run_id = check_run.id, "Updated check run");
        Ok(())
    }
}
