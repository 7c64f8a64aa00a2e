//! [`GitLabApi`] implementation over the GitLab REST API v4.

use crate::api::{CommitStatus, GitLabApi};
use async_trait::async_trait;
use forgeport_core::{
    CommitInfo, DirEntry, EntryKind, Error, Listing, ProviderConfig, PullRequest, Result,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

const PROVIDER: &str = "gitlab";
const TOKEN_HEADER: &str = "PRIVATE-TOKEN";
const PAGE_SIZE: &str = "100";

/// GitLab REST client authenticated with a personal or project token.
#[derive(Clone)]
pub struct GitLabHttpClient {
    http: Client,
    base: Url,
    token: SecretString,
}

impl std::fmt::Debug for GitLabHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitLabHttpClient")
            .field("base", &self.base.as_str())
            .finish_non_exhaustive()
    }
}

impl GitLabHttpClient {
    /// Create a client for the configured endpoint and token.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        Self::new(&config.api_base(), config.resolve_token()?)
    }

    /// Create a client for `api_base` (e.g. `https://gitlab.com/api/v4`).
    pub fn new(api_base: &str, token: SecretString) -> Result<Self> {
        let base = Url::parse(api_base).map_err(|e| {
            Error::configuration(
                format!("Invalid GitLab API URL '{api_base}': {e}"),
                "Set api_url to the API root, e.g. https://gitlab.example.com/api/v4",
            )
        })?;
        if base.cannot_be_a_base() {
            return Err(Error::configuration(
                format!("GitLab API URL '{api_base}' cannot carry a path"),
                "Use an http(s) URL for api_url",
            ));
        }

        let http = Client::builder()
            .user_agent(concat!("forgeport/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                Error::configuration(
                    format!("Failed to create HTTP client: {e}"),
                    "Check the TLS configuration of this host",
                )
            })?;

        Ok(Self { http, base, token })
    }

    /// `{base}/projects/{project}/{rest...}` with every segment encoded,
    /// so `group/project` becomes `group%2Fproject`.
    fn project_url(&self, project: &str, rest: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push("projects")
                .push(project)
                .extend(rest);
        }
        url
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(TOKEN_HEADER, self.token.expose_secret())
    }

    /// Send `request`, mapping 404 to `None` and other failures to
    /// transport errors.
    async fn send(
        &self,
        project: &str,
        action: &str,
        request: RequestBuilder,
    ) -> Result<Option<Response>> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| transport(project, format!("failed to {action}"), e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::transport(
                PROVIDER,
                project,
                format!("failed to {action} (HTTP {status}): {}", body.trim()),
            ));
        }
        Ok(Some(response))
    }

    /// Like [`Self::send`] but a 404 is an error.
    async fn expect_found(
        &self,
        project: &str,
        action: &str,
        request: RequestBuilder,
    ) -> Result<Response> {
        self.send(project, action, request).await?.ok_or_else(|| {
            Error::transport(PROVIDER, project, format!("failed to {action}: Not Found"))
        })
    }

    async fn json<T: DeserializeOwned>(project: &str, action: &str, response: Response) -> Result<T> {
        response
            .json()
            .await
            .map_err(|e| transport(project, format!("failed to decode {action} response"), e))
    }

    /// All pages of the tree under `path`, or `None` when GitLab does not
    /// know the path as a tree.
    async fn list_tree(
        &self,
        project: &str,
        path: &str,
        reference: &str,
    ) -> Result<Option<Vec<DirEntry>>> {
        let mut entries = Vec::new();
        let mut page = "1".to_string();

        loop {
            let mut url = self.project_url(project, &["repository", "tree"]);
            url.query_pairs_mut()
                .append_pair("ref", reference)
                .append_pair("per_page", PAGE_SIZE)
                .append_pair("page", &page);
            if !path.is_empty() {
                url.query_pairs_mut().append_pair("path", path);
            }

            let Some(response) = self
                .send(project, "list repository tree", self.http.get(url))
                .await?
            else {
                return Ok(None);
            };

            let next_page = response
                .headers()
                .get("x-next-page")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string);

            let items: Vec<TreeItem> = Self::json(project, "repository tree", response).await?;
            entries.extend(items.into_iter().map(DirEntry::from));

            match next_page {
                Some(next) => page = next,
                None => return Ok(Some(entries)),
            }
        }
    }

    /// The file at `path`, or `None` when there is none.
    async fn file_entry(
        &self,
        project: &str,
        path: &str,
        reference: &str,
    ) -> Result<Option<DirEntry>> {
        let mut url = self.project_url(project, &["repository", "files", path]);
        url.query_pairs_mut().append_pair("ref", reference);

        let Some(response) = self
            .send(project, "get file metadata", self.http.get(url))
            .await?
        else {
            return Ok(None);
        };
        let file: FileMetadata = Self::json(project, "file metadata", response).await?;
        Ok(Some(DirEntry::file(file.file_name, file.file_path, file.blob_id)))
    }

    async fn get_project(&self, project: &str) -> Result<ProjectPayload> {
        let response = self
            .expect_found(project, "get project", self.http.get(self.project_url(project, &[])))
            .await?;
        Self::json(project, "project", response).await
    }
}

fn transport(project: &str, message: String, err: reqwest::Error) -> Error {
    Error::transport_with_source(PROVIDER, project, message, err)
}

#[derive(Debug, Deserialize)]
struct TreeItem {
    id: String,
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

impl From<TreeItem> for DirEntry {
    fn from(item: TreeItem) -> Self {
        let kind = match item.kind.as_str() {
            "blob" => EntryKind::File,
            "tree" => EntryKind::Directory,
            _ => EntryKind::Other,
        };
        Self {
            name: item.name,
            path: item.path,
            id: item.id,
            kind,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FileMetadata {
    file_name: String,
    file_path: String,
    blob_id: String,
}

#[derive(Debug, Deserialize)]
struct Author {
    username: String,
}

#[derive(Debug, Default, Deserialize)]
struct DiffRefs {
    #[serde(default)]
    base_sha: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MergeRequestPayload {
    iid: u64,
    web_url: String,
    source_branch: String,
    target_branch: String,
    sha: String,
    #[serde(default)]
    diff_refs: Option<DiffRefs>,
    #[serde(default)]
    author: Option<Author>,
    source_project_id: u64,
    target_project_id: u64,
}

#[derive(Debug, Deserialize)]
struct ProjectPayload {
    #[serde(default)]
    default_branch: Option<String>,
    web_url: String,
}

#[derive(Debug, Deserialize)]
struct CommitPayload {
    web_url: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct StatusPayload {
    id: u64,
}

fn merge_request(mr: MergeRequestPayload, target: ProjectPayload) -> PullRequest {
    let base_repo_default_branch = target.default_branch.unwrap_or_default();
    let head_repo_default_branch = (mr.source_project_id == mr.target_project_id)
        .then(|| base_repo_default_branch.clone());
    PullRequest {
        number: mr.iid,
        head_commit_url: format!("{}/-/commit/{}", target.web_url, mr.sha),
        base_repo_default_branch,
        base_repo_url: target.web_url,
        base_ref: mr.target_branch,
        base_sha: mr.diff_refs.unwrap_or_default().base_sha.unwrap_or_default(),
        head_ref: mr.source_branch,
        head_sha: mr.sha,
        head_repo_default_branch,
        author: mr.author.map(|a| a.username).unwrap_or_default(),
        html_url: mr.web_url,
    }
}

#[async_trait]
impl GitLabApi for GitLabHttpClient {
    async fn get_tree(&self, project: &str, path: &str, reference: &str) -> Result<Listing> {
        debug!(project, path, reference, "Listing repository tree");
        let path = path.trim_matches('/');
        let tree = self.list_tree(project, path, reference).await?;

        // A file path lists as an empty or unknown tree.
        if let Some(entries) = &tree
            && (!entries.is_empty() || path.is_empty())
        {
            return Ok(Listing::Directory(entries.clone()));
        }
        if !path.is_empty()
            && let Some(entry) = self.file_entry(project, path, reference).await?
        {
            return Ok(Listing::File(entry));
        }
        Ok(tree.map_or(Listing::Missing, Listing::Directory))
    }

    async fn get_raw_blob(&self, project: &str, sha: &str) -> Result<String> {
        let url = self.project_url(project, &["repository", "blobs", sha, "raw"]);
        let response = self
            .expect_found(project, &format!("get blob {sha}"), self.http.get(url))
            .await?;
        response
            .text()
            .await
            .map_err(|e| transport(project, format!("failed to read blob {sha}"), e))
    }

    async fn get_merge_request(&self, project: &str, iid: u64) -> Result<PullRequest> {
        let url = self.project_url(project, &["merge_requests", &iid.to_string()]);
        let response = self
            .expect_found(project, &format!("get merge request !{iid}"), self.http.get(url))
            .await?;
        let mr: MergeRequestPayload = Self::json(project, "merge request", response).await?;

        let target = self.get_project(&mr.target_project_id.to_string()).await?;
        Ok(merge_request(mr, target))
    }

    async fn get_commit(&self, project: &str, sha: &str) -> Result<CommitInfo> {
        let url = self.project_url(project, &["repository", "commits", sha]);
        let response = self
            .expect_found(project, &format!("get commit {sha}"), self.http.get(url))
            .await?;
        let commit: CommitPayload = Self::json(project, "commit", response).await?;
        Ok(CommitInfo {
            html_url: commit.web_url,
            message: commit.message,
        })
    }

    async fn set_commit_status(
        &self,
        project: &str,
        sha: &str,
        status: &CommitStatus,
    ) -> Result<u64> {
        let url = self.project_url(project, &["statuses", sha]);
        let response = self
            .expect_found(
                project,
                &format!("set commit status on {sha}"),
                self.http.post(url).json(status),
            )
            .await?;
        let created: StatusPayload = Self::json(project, "commit status", response).await?;
        Ok(created.id)
    }
}
