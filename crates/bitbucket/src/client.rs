//! [`BitbucketApi`] implementation over the Bitbucket Cloud REST API 2.0.

use crate::api::{BitbucketApi, BuildStatus};
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

const PROVIDER: &str = "bitbucket-cloud";
const PAGE_LEN: &str = "100";

/// How requests are authenticated.
#[derive(Clone)]
enum Auth {
    /// Username and app password.
    Basic {
        username: String,
        password: SecretString,
    },
    /// Repository, project or workspace access token.
    Bearer(SecretString),
}

/// Bitbucket Cloud REST client.
#[derive(Clone)]
pub struct BitbucketHttpClient {
    http: Client,
    base: Url,
    auth: Auth,
}

impl std::fmt::Debug for BitbucketHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitbucketHttpClient")
            .field("base", &self.base.as_str())
            .finish_non_exhaustive()
    }
}

impl BitbucketHttpClient {
    /// Create a client for the configured endpoint.
    ///
    /// With a `username` the token is used as an app password, otherwise
    /// as a bearer access token.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let token = config.resolve_token()?;
        match config.username.as_deref().filter(|u| !u.is_empty()) {
            Some(username) => Self::with_app_password(&config.api_base(), username, token),
            None => Self::with_access_token(&config.api_base(), token),
        }
    }

    /// Authenticate with a username and app password.
    pub fn with_app_password(
        api_base: &str,
        username: impl Into<String>,
        password: SecretString,
    ) -> Result<Self> {
        Self::new(
            api_base,
            Auth::Basic {
                username: username.into(),
                password,
            },
        )
    }

    /// Authenticate with an access token.
    pub fn with_access_token(api_base: &str, token: SecretString) -> Result<Self> {
        Self::new(api_base, Auth::Bearer(token))
    }

    fn new(api_base: &str, auth: Auth) -> Result<Self> {
        let base = Url::parse(api_base)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| {
                Error::configuration(
                    format!("Invalid Bitbucket API URL '{api_base}'"),
                    "Set api_url to the API root, e.g. https://api.bitbucket.org/2.0",
                )
            })?;

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

        Ok(Self { http, base, auth })
    }

    /// `{base}/repositories/{workspace}/{slug}/{rest...}`. Elements of
    /// `rest` are split on `/` so nested paths keep their structure.
    fn repo_url(&self, repo: &str, rest: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push("repositories")
                .extend(repo.split('/').filter(|s| !s.is_empty()))
                .extend(
                    rest.iter()
                        .flat_map(|part| part.split('/'))
                        .filter(|s| !s.is_empty()),
                );
        }
        url
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Auth::Basic { username, password } => {
                request.basic_auth(username, Some(password.expose_secret()))
            }
            Auth::Bearer(token) => request.bearer_auth(token.expose_secret()),
        }
    }

    /// Send `request`, mapping 404 to `None` and other failures to
    /// transport errors.
    async fn send(
        &self,
        repo: &str,
        action: &str,
        request: RequestBuilder,
    ) -> Result<Option<Response>> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| transport(repo, format!("failed to {action}"), e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::transport(
                PROVIDER,
                repo,
                format!("failed to {action} (HTTP {status}): {}", body.trim()),
            ));
        }
        Ok(Some(response))
    }

    async fn expect_found(
        &self,
        repo: &str,
        action: &str,
        request: RequestBuilder,
    ) -> Result<Response> {
        self.send(repo, action, request).await?.ok_or_else(|| {
            Error::transport(PROVIDER, repo, format!("failed to {action}: Not Found"))
        })
    }

    async fn json<T: DeserializeOwned>(repo: &str, action: &str, response: Response) -> Result<T> {
        response
            .json()
            .await
            .map_err(|e| transport(repo, format!("failed to decode {action} response"), e))
    }

    /// Every entry of the directory at `path`, following `next` links.
    async fn list_directory(&self, repo: &str, path: &str, reference: &str) -> Result<Vec<DirEntry>> {
        let mut url = self.repo_url(repo, &["src", reference, path]);
        if let Ok(mut segments) = url.path_segments_mut() {
            // Trailing slash selects the directory listing.
            segments.push("");
        }
        url.query_pairs_mut().append_pair("pagelen", PAGE_LEN);

        let mut entries = Vec::new();
        let mut next = Some(url);
        while let Some(url) = next.take() {
            let response = self
                .expect_found(repo, &format!("list {path}"), self.http.get(url))
                .await?;
            let page: Page<SrcItem> = Self::json(repo, "directory listing", response).await?;
            entries.extend(page.values.into_iter().map(DirEntry::from));
            next = page.next.and_then(|link| Url::parse(&link).ok());
        }
        Ok(entries)
    }

    async fn get_repository(&self, repo: &str) -> Result<RepositoryPayload> {
        let response = self
            .expect_found(repo, "get repository", self.http.get(self.repo_url(repo, &[])))
            .await?;
        Self::json(repo, "repository", response).await
    }
}

fn transport(repo: &str, message: String, err: reqwest::Error) -> Error {
    Error::transport_with_source(PROVIDER, repo, message, err)
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    values: Vec<T>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommitRef {
    hash: String,
}

#[derive(Debug, Deserialize)]
struct SrcItem {
    #[serde(rename = "type")]
    kind: String,
    path: String,
    #[serde(default)]
    commit: Option<CommitRef>,
}

impl From<SrcItem> for DirEntry {
    fn from(item: SrcItem) -> Self {
        let kind = match item.kind.as_str() {
            "commit_file" => EntryKind::File,
            "commit_directory" => EntryKind::Directory,
            _ => EntryKind::Other,
        };
        let name = item
            .path
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        Self {
            name,
            path: item.path,
            id: item.commit.map(|c| c.hash).unwrap_or_default(),
            kind,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct Link {
    #[serde(default)]
    href: String,
}

#[derive(Debug, Default, Deserialize)]
struct Links {
    #[serde(default)]
    html: Link,
}

#[derive(Debug, Deserialize)]
struct BranchRef {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RepositoryRef {
    full_name: String,
}

#[derive(Debug, Deserialize)]
struct Endpoint {
    branch: BranchRef,
    commit: CommitRef,
    #[serde(default)]
    repository: Option<RepositoryRef>,
}

#[derive(Debug, Deserialize)]
struct Account {
    #[serde(default)]
    nickname: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PullRequestPayload {
    id: u64,
    #[serde(default)]
    links: Links,
    #[serde(default)]
    author: Option<Account>,
    source: Endpoint,
    destination: Endpoint,
}

#[derive(Debug, Deserialize)]
struct RepositoryPayload {
    #[serde(default)]
    mainbranch: Option<BranchRef>,
    #[serde(default)]
    links: Links,
}

#[derive(Debug, Deserialize)]
struct CommitPayload {
    message: String,
    #[serde(default)]
    links: Links,
}

#[derive(Debug, Deserialize)]
struct StatusPayload {
    key: String,
    #[serde(default)]
    url: Option<String>,
}

fn pull_request(
    pr: PullRequestPayload,
    destination: RepositoryPayload,
    same_repository: bool,
) -> PullRequest {
    let base_repo_default_branch = destination
        .mainbranch
        .map(|b| b.name)
        .unwrap_or_default();
    let base_repo_url = destination.links.html.href;
    let head_sha = pr.source.commit.hash;
    PullRequest {
        number: pr.id,
        head_commit_url: format!("{base_repo_url}/commits/{head_sha}"),
        head_repo_default_branch: same_repository.then(|| base_repo_default_branch.clone()),
        base_repo_default_branch,
        base_repo_url,
        base_ref: pr.destination.branch.name,
        base_sha: pr.destination.commit.hash,
        head_ref: pr.source.branch.name,
        head_sha,
        author: pr
            .author
            .and_then(|a| a.nickname.or(a.display_name))
            .unwrap_or_default(),
        html_url: pr.links.html.href,
    }
}

#[async_trait]
impl BitbucketApi for BitbucketHttpClient {
    async fn get_src(&self, repo: &str, path: &str, reference: &str) -> Result<Listing> {
        debug!(repo, path, reference, "Reading source metadata");
        let path = path.trim_matches('/');
        let mut url = self.repo_url(repo, &["src", reference, path]);
        url.query_pairs_mut().append_pair("format", "meta");

        let Some(response) = self
            .send(repo, &format!("get metadata of {path}"), self.http.get(url))
            .await?
        else {
            return Ok(Listing::Missing);
        };
        let meta: SrcItem = Self::json(repo, "source metadata", response).await?;

        match meta.kind.as_str() {
            "commit_directory" => Ok(Listing::Directory(
                self.list_directory(repo, path, reference).await?,
            )),
            _ => Ok(Listing::File(DirEntry::from(meta))),
        }
    }

    async fn get_raw(&self, repo: &str, reference: &str, path: &str) -> Result<String> {
        let url = self.repo_url(repo, &["src", reference, path]);
        let response = self
            .expect_found(repo, &format!("read {path} at {reference}"), self.http.get(url))
            .await?;
        response
            .text()
            .await
            .map_err(|e| transport(repo, format!("failed to read {path}"), e))
    }

    async fn get_pull_request(&self, repo: &str, id: u64) -> Result<PullRequest> {
        let url = self.repo_url(repo, &["pullrequests", &id.to_string()]);
        let response = self
            .expect_found(repo, &format!("get pull request #{id}"), self.http.get(url))
            .await?;
        let pr: PullRequestPayload = Self::json(repo, "pull request", response).await?;

        let destination_name = pr
            .destination
            .repository
            .as_ref()
            .map_or_else(|| repo.to_string(), |r| r.full_name.clone());
        let same_repository = pr
            .source
            .repository
            .as_ref()
            .is_some_and(|r| r.full_name == destination_name);
        let destination = self.get_repository(&destination_name).await?;
        Ok(pull_request(pr, destination, same_repository))
    }

    async fn get_commit(&self, repo: &str, sha: &str) -> Result<CommitInfo> {
        let url = self.repo_url(repo, &["commit", sha]);
        let response = self
            .expect_found(repo, &format!("get commit {sha}"), self.http.get(url))
            .await?;
        let commit: CommitPayload = Self::json(repo, "commit", response).await?;
        Ok(CommitInfo {
            html_url: commit.links.html.href,
            message: commit.message,
        })
    }

    async fn create_build_status(
        &self,
        repo: &str,
        sha: &str,
        status: &BuildStatus,
    ) -> Result<String> {
        let url = self.repo_url(repo, &["commit", sha, "statuses", "build"]);
        let response = self
            .expect_found(
                repo,
                &format!("create build status on {sha}"),
                self.http.post(url).json(status),
            )
            .await?;
        let created: StatusPayload = Self::json(repo, "build status", response).await?;
        Ok(created.key)
    }

    async fn get_build_status_url(
        &self,
        repo: &str,
        sha: &str,
        key: &str,
    ) -> Result<Option<String>> {
        let url = self.repo_url(repo, &["commit", sha, "statuses", "build", key]);
        let action = format!("get build status {key} on {sha}");
        let Some(response) = self.send(repo, &action, self.http.get(url)).await? else {
            return Ok(None);
        };
        let status: StatusPayload = Self::json(repo, "build status", response).await?;
        Ok(status.url.filter(|url| !url.is_empty()))
    }

    async fn update_build_status(
        &self,
        repo: &str,
        sha: &str,
        key: &str,
        status: &BuildStatus,
    ) -> Result<()> {
        let url = self.repo_url(repo, &["commit", sha, "statuses", "build", key]);
        self.expect_found(
            repo,
            &format!("update build status {key} on {sha}"),
            self.http.put(url).json(status),
        )
        .await?;
        Ok(())
    }
}
