//! Integration tests for the GitHub provider.
//!
//! These tests drive [`GitHubProvider`] through the public
//! [`forgeport_core::Provider`] trait against an in-memory GitHub API.

use async_trait::async_trait;
use forgeport_core::{
    CallContext, CommitInfo, Conclusion, DirEntry, Error, Event, EventType, Listing, Provider,
    ProviderConfig, ProviderKind, PullRequest, Result, StatusOpts, StatusUpdate,
};
use forgeport_github::{GitHubApi, GitHubProvider, NewCheckRun};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct FakeGitHub {
    contents: HashMap<(String, String), Listing>,
    blobs: HashMap<String, String>,
    pull_requests: HashMap<u64, PullRequest>,
    commits: HashMap<String, CommitInfo>,
    created: Mutex<Vec<NewCheckRun>>,
    updated: Mutex<Vec<(u64, StatusUpdate)>>,
}

impl FakeGitHub {
    fn with_listing(mut self, path: &str, reference: &str, listing: Listing) -> Self {
        self.contents
            .insert((path.to_string(), reference.to_string()), listing);
        self
    }

    fn with_blob(mut self, sha: &str, body: &str) -> Self {
        self.blobs.insert(sha.to_string(), body.to_string());
        self
    }
}

#[async_trait]
impl GitHubApi for FakeGitHub {
    async fn get_contents(
        &self,
        _owner: &str,
        _repo: &str,
        path: &str,
        reference: &str,
    ) -> Result<Listing> {
        Ok(self
            .contents
            .get(&(path.to_string(), reference.to_string()))
            .cloned()
            .unwrap_or(Listing::Missing))
    }

    async fn get_blob(&self, owner: &str, repo: &str, sha: &str) -> Result<String> {
        self.blobs
            .get(sha)
            .cloned()
            .ok_or_else(|| Error::transport("github", format!("{owner}/{repo}"), "blob missing"))
    }

    async fn get_pull_request(&self, owner: &str, repo: &str, number: u64) -> Result<PullRequest> {
        self.pull_requests
            .get(&number)
            .cloned()
            .ok_or_else(|| Error::transport("github", format!("{owner}/{repo}"), "Not Found"))
    }

    async fn get_commit(&self, owner: &str, repo: &str, sha: &str) -> Result<CommitInfo> {
        self.commits
            .get(sha)
            .cloned()
            .ok_or_else(|| Error::transport("github", format!("{owner}/{repo}"), "Not Found"))
    }

    async fn create_check_run(&self, _owner: &str, _repo: &str, run: &NewCheckRun) -> Result<u64> {
        let mut created = self.created.lock().unwrap();
        created.push(run.clone());
        Ok(1000 + created.len() as u64)
    }

    async fn update_check_run(
        &self,
        _owner: &str,
        _repo: &str,
        check_run_id: u64,
        update: &StatusUpdate,
    ) -> Result<()> {
        self.updated
            .lock()
            .unwrap()
            .push((check_run_id, update.clone()));
        Ok(())
    }
}

fn config() -> ProviderConfig {
    ProviderConfig::new(ProviderKind::Github)
        .with_application_name("Pipelines as Code CI")
        .with_log_url("https://console.example.com/runs")
}

fn event() -> Event {
    Event::new("owner", "repo", "sha1").with_base_branch("main")
}

/// Manifest aggregation against the contents API.
mod manifests {
    use super::*;

    /// Both YAML files are joined in listing order and other files skipped.
    #[tokio::test]
    async fn joins_yaml_files_in_listing_order() {
        let api = FakeGitHub::default()
            .with_listing(
                ".tekton",
                "sha1",
                Listing::Directory(vec![
                    DirEntry::file("a.yml", ".tekton/a.yml", "blob-a"),
                    DirEntry::file("b.yaml", ".tekton/b.yaml", "blob-b"),
                    DirEntry::file("readme.md", ".tekton/readme.md", "blob-r"),
                ]),
            )
            .with_blob("blob-a", "foo: 1")
            .with_blob("blob-b", "---\nbar: 2")
            .with_blob("blob-r", "# docs");
        let provider = GitHubProvider::new(api, &config());

        let manifest = provider
            .get_manifest(&CallContext::new(), &event(), ".tekton")
            .await
            .unwrap();

        assert_eq!(manifest, "---\nfoo: 1\n---\nbar: 2");
        assert!(!manifest.contains("docs"));
    }

    /// A repository without the directory has an empty manifest.
    #[tokio::test]
    async fn missing_directory_is_empty() {
        let provider = GitHubProvider::new(FakeGitHub::default(), &config());
        let manifest = provider
            .get_manifest(&CallContext::new(), &event(), ".tekton")
            .await
            .unwrap();
        assert_eq!(manifest, "");
    }

    /// A path naming a file is rejected.
    #[tokio::test]
    async fn file_path_is_not_a_directory() {
        let api = FakeGitHub::default().with_listing(
            ".tekton",
            "sha1",
            Listing::File(DirEntry::file(".tekton", ".tekton", "blob")),
        );
        let provider = GitHubProvider::new(api, &config());

        let err = provider
            .get_manifest(&CallContext::new(), &event(), ".tekton")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotADirectory { .. }));
    }

    /// A failing blob aborts the whole manifest.
    #[tokio::test]
    async fn blob_failure_is_surfaced() {
        let api = FakeGitHub::default().with_listing(
            ".tekton",
            "sha1",
            Listing::Directory(vec![DirEntry::file("a.yaml", ".tekton/a.yaml", "gone")]),
        );
        let provider = GitHubProvider::new(api, &config());

        let err = provider
            .get_manifest(&CallContext::new(), &event(), ".tekton")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
    }
}

/// Single file reads.
mod files {
    use super::*;

    /// The base branch is used when asked, the commit otherwise.
    #[tokio::test]
    async fn reads_from_requested_revision() {
        let api = FakeGitHub::default()
            .with_listing(
                "OWNERS",
                "main",
                Listing::File(DirEntry::file("OWNERS", "OWNERS", "base-blob")),
            )
            .with_listing(
                "OWNERS",
                "sha1",
                Listing::File(DirEntry::file("OWNERS", "OWNERS", "head-blob")),
            )
            .with_blob("base-blob", "approvers: [admin]")
            .with_blob("head-blob", "approvers: [attacker]");
        let provider = GitHubProvider::new(api, &config());
        let ctx = CallContext::new();

        let base = provider.get_file(&ctx, &event(), "OWNERS", true).await.unwrap();
        let head = provider.get_file(&ctx, &event(), "OWNERS", false).await.unwrap();

        assert_eq!(base, "approvers: [admin]");
        assert_eq!(head, "approvers: [attacker]");
    }

    /// Missing files and directories are distinct errors.
    #[tokio::test]
    async fn missing_and_directory_errors() {
        let api = FakeGitHub::default().with_listing(".tekton", "sha1", Listing::Directory(vec![]));
        let provider = GitHubProvider::new(api, &config());
        let ctx = CallContext::new();

        let err = provider
            .get_file(&ctx, &event(), "nope.yaml", false)
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = provider
            .get_file(&ctx, &event(), ".tekton", false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::IsADirectory { .. }));
    }
}

/// Pull request and commit resolution.
mod resolution {
    use super::*;

    /// A fork cannot redirect the default branch.
    #[tokio::test]
    async fn forked_pull_request_uses_base_default_branch() {
        let mut api = FakeGitHub::default();
        api.pull_requests.insert(
            3,
            PullRequest {
                number: 3,
                base_repo_default_branch: "main".to_string(),
                base_repo_url: "https://github.com/owner/repo".to_string(),
                base_ref: "main".to_string(),
                base_sha: "b".to_string(),
                head_ref: "patch-1".to_string(),
                head_sha: "h".to_string(),
                head_repo_default_branch: Some("evil".to_string()),
                author: "forker".to_string(),
                html_url: "https://github.com/owner/repo/pull/3".to_string(),
                head_commit_url: "https://github.com/owner/repo/pull/3/commit/h".to_string(),
            },
        );
        let provider = GitHubProvider::new(api, &config());

        let event = provider
            .resolve_pull_request(&CallContext::new(), Event::new("owner", "repo", ""), 3)
            .await
            .unwrap();

        assert_eq!(event.default_branch, "main");
        assert_eq!(event.base_branch, "main");
        assert_eq!(event.head_branch, "patch-1");
        assert_eq!(event.sha, "h");
        assert_eq!(event.sender, "forker");
        assert_eq!(event.event_type, EventType::PullRequest);
    }

    /// Unknown pull requests fail without touching anything.
    #[tokio::test]
    async fn unknown_pull_request_fails() {
        let provider = GitHubProvider::new(FakeGitHub::default(), &config());
        let err = provider
            .resolve_pull_request(&CallContext::new(), event(), 99)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
    }

    /// Push events get the commit permalink and title.
    #[tokio::test]
    async fn resolves_commit() {
        let mut api = FakeGitHub::default();
        api.commits.insert(
            "sha1".to_string(),
            CommitInfo {
                html_url: "https://github.com/owner/repo/commit/sha1".to_string(),
                message: "Add pipeline\n\nWith details".to_string(),
            },
        );
        let provider = GitHubProvider::new(api, &config());
        let mut event = event();

        provider
            .resolve_commit(&CallContext::new(), &mut event)
            .await
            .unwrap();

        assert_eq!(event.sha_title, "Add pipeline");
        assert_eq!(event.sha_url, "https://github.com/owner/repo/commit/sha1");
    }
}

/// Check run lifecycle.
mod check_runs {
    use super::*;

    /// Start then finish: one creation, one update.
    #[tokio::test]
    async fn creates_once_then_updates() {
        let provider = GitHubProvider::new(FakeGitHub::default(), &config());
        let ctx = CallContext::new();
        let mut event = event();

        provider
            .report_status(&ctx, &mut event, &StatusOpts::in_progress())
            .await
            .unwrap();
        let id = event.check_run_id.clone().unwrap();

        provider
            .report_status(
                &ctx,
                &mut event,
                &StatusOpts::completed(Conclusion::Success).with_text("all green"),
            )
            .await
            .unwrap();

        assert_eq!(event.check_run_id.as_ref(), Some(&id));

        let created = provider.api().created.lock().unwrap();
        let updated = provider.api().updated.lock().unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(updated.len(), 1);

        let run = &created[0];
        assert_eq!(run.head_sha, "sha1");
        assert_eq!(run.update.name, "Pipelines as Code CI");
        assert_eq!(
            run.details_url.as_deref(),
            Some("https://console.example.com/runs")
        );
        assert!(run.update.completed_at.is_none());
        assert_eq!(
            run.update.presentation.as_ref().unwrap().title,
            "CI has Started"
        );

        let (check_run_id, update) = &updated[0];
        assert_eq!(check_run_id.to_string(), id.to_string());
        assert!(update.completed_at.is_some());
        assert_eq!(update.conclusion, Some(Conclusion::Success));
        assert_eq!(update.presentation.as_ref().unwrap().title, "Success");
        assert_eq!(update.text, "all green");
    }

    /// An update without a details link does not clear it.
    #[tokio::test]
    async fn update_without_details_url_keeps_link() {
        let provider = GitHubProvider::new(FakeGitHub::default(), &config());
        let ctx = CallContext::new();
        let mut event = event();

        provider
            .report_status(
                &ctx,
                &mut event,
                &StatusOpts::in_progress().with_details_url("https://logs/1"),
            )
            .await
            .unwrap();
        provider
            .report_status(&ctx, &mut event, &StatusOpts::completed(Conclusion::Failure))
            .await
            .unwrap();

        let created = provider.api().created.lock().unwrap();
        let updated = provider.api().updated.lock().unwrap();
        assert_eq!(created[0].details_url.as_deref(), Some("https://logs/1"));
        assert!(updated[0].1.details_url.is_none());
        assert_eq!(
            updated[0].1.presentation.as_ref().unwrap().summary,
            "Pipelines as Code CI has failed."
        );
    }
}
