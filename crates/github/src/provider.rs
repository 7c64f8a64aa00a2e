//! GitHub provider.
//!
//! Manifests and files are read through the contents and git blob APIs,
//! pull requests are resolved through the pulls API, and run status is
//! reported as one check run per run.

use crate::api::{GitHubApi, NewCheckRun};
use crate::client::OctocrabClient;
use async_trait::async_trait;
use chrono::Utc;
use forgeport_core::manifest::{self, TreeSource};
use forgeport_core::status::{self, StatusSink};
use forgeport_core::{
    CallContext, CheckRunId, DirEntry, Error, Event, Listing, Provider, ProviderConfig, Result,
    StatusOpts, StatusUpdate, resolver,
};
use tracing::info;

/// GitHub provider.
pub struct GitHubProvider<A = OctocrabClient> {
    api: A,
    application_name: String,
    log_url: Option<String>,
}

impl GitHubProvider<OctocrabClient> {
    /// Create a provider talking to the configured GitHub endpoint.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        Ok(Self::new(OctocrabClient::from_config(config)?, config))
    }
}

impl<A: GitHubApi> GitHubProvider<A> {
    /// Create a provider over `api`.
    pub fn new(api: A, config: &ProviderConfig) -> Self {
        Self {
            api,
            application_name: config.application_name.clone(),
            log_url: config.log_url.clone(),
        }
    }

    /// The underlying API client.
    pub const fn api(&self) -> &A {
        &self.api
    }

    fn check_run_id(id: &CheckRunId) -> Result<u64> {
        id.as_str().parse().map_err(|_| Error::InvalidCheckRunId {
            id: id.to_string(),
        })
    }
}

#[async_trait]
impl<A: GitHubApi> TreeSource for GitHubProvider<A> {
    async fn list_path(
        &self,
        ctx: &CallContext,
        event: &Event,
        path: &str,
        revision: &str,
    ) -> Result<Listing> {
        ctx.run(
            "get contents",
            self.api
                .get_contents(&event.owner, &event.repository, path, revision),
        )
        .await
    }

    async fn read_entry(
        &self,
        ctx: &CallContext,
        event: &Event,
        entry: &DirEntry,
    ) -> Result<String> {
        ctx.run(
            "get blob",
            self.api
                .get_blob(&event.owner, &event.repository, &entry.id),
        )
        .await
    }
}

#[async_trait]
impl<A: GitHubApi> StatusSink for GitHubProvider<A> {
    async fn create_status(
        &self,
        ctx: &CallContext,
        event: &Event,
        update: &StatusUpdate,
    ) -> Result<CheckRunId> {
        let run = NewCheckRun {
            head_sha: event.sha.clone(),
            started_at: Utc::now(),
            details_url: update.details_url.clone().or_else(|| self.log_url.clone()),
            update: update.clone(),
        };
        let id = ctx
            .run(
                "create check run",
                self.api
                    .create_check_run(&event.owner, &event.repository, &run),
            )
            .await?;
        Ok(CheckRunId::from(id))
    }

    async fn update_status(
        &self,
        ctx: &CallContext,
        event: &Event,
        id: &CheckRunId,
        update: &StatusUpdate,
    ) -> Result<()> {
        let check_run_id = Self::check_run_id(id)?;
        ctx.run(
            "update check run",
            self.api
                .update_check_run(&event.owner, &event.repository, check_run_id, update),
        )
        .await?;

        if update.is_terminal() {
            info!(
                repo = %event.full_name(),
                check_run_id,
                conclusion = ?update.conclusion,
                "Completed check run"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl<A: GitHubApi> Provider for GitHubProvider<A> {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn get_manifest(&self, ctx: &CallContext, event: &Event, path: &str) -> Result<String> {
        manifest::collect_manifest(self, ctx, event, path).await
    }

    async fn get_file(
        &self,
        ctx: &CallContext,
        event: &Event,
        path: &str,
        use_base_branch: bool,
    ) -> Result<String> {
        manifest::read_file(self, ctx, event, path, use_base_branch).await
    }

    async fn resolve_pull_request(
        &self,
        ctx: &CallContext,
        event: Event,
        number: u64,
    ) -> Result<Event> {
        let pr = ctx
            .run(
                "get pull request",
                self.api
                    .get_pull_request(&event.owner, &event.repository, number),
            )
            .await?;
        Ok(resolver::apply_pull_request(event, pr))
    }

    async fn resolve_commit(&self, ctx: &CallContext, event: &mut Event) -> Result<()> {
        let commit = ctx
            .run(
                "get commit",
                self.api
                    .get_commit(&event.owner, &event.repository, &event.sha),
            )
            .await?;
        resolver::apply_commit(event, commit);
        Ok(())
    }

    async fn report_status(
        &self,
        ctx: &CallContext,
        event: &mut Event,
        opts: &StatusOpts,
    ) -> Result<()> {
        status::report_status(self, ctx, &self.application_name, event, opts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forgeport_core::{CommitInfo, ProviderKind, PullRequest};

    struct PanickingApi;

    #[async_trait]
    impl GitHubApi for PanickingApi {
        async fn get_contents(&self, _: &str, _: &str, _: &str, _: &str) -> Result<Listing> {
            unreachable!("cancelled contexts must not issue requests")
        }
        async fn get_blob(&self, _: &str, _: &str, _: &str) -> Result<String> {
            unreachable!()
        }
        async fn get_pull_request(&self, _: &str, _: &str, _: u64) -> Result<PullRequest> {
            unreachable!()
        }
        async fn get_commit(&self, _: &str, _: &str, _: &str) -> Result<CommitInfo> {
            unreachable!()
        }
        async fn create_check_run(&self, _: &str, _: &str, _: &NewCheckRun) -> Result<u64> {
            unreachable!()
        }
        async fn update_check_run(
            &self,
            _: &str,
            _: &str,
            _: u64,
            _: &StatusUpdate,
        ) -> Result<()> {
            unreachable!()
        }
    }

    fn provider() -> GitHubProvider<PanickingApi> {
        GitHubProvider::new(PanickingApi, &ProviderConfig::new(ProviderKind::Github))
    }

    #[test]
    fn test_check_run_id_parsing() {
        assert_eq!(
            GitHubProvider::<PanickingApi>::check_run_id(&CheckRunId::from(42_u64)).unwrap(),
            42
        );
        assert!(matches!(
            GitHubProvider::<PanickingApi>::check_run_id(&CheckRunId::new("build-key")),
            Err(Error::InvalidCheckRunId { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancelled_context_issues_no_request() {
        let ctx = CallContext::new();
        ctx.cancel();
        let event = Event::new("owner", "repo", "sha");

        let err = provider()
            .get_manifest(&ctx, &event, ".tekton")
            .await
            .unwrap_err();
        assert!(err.is_cancelled());

        let err = provider()
            .resolve_pull_request(&ctx, event, 1)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_update_with_foreign_handle_fails() {
        let mut event = Event::new("owner", "repo", "sha");
        event.check_run_id = Some(CheckRunId::new("not-a-number"));

        let err = provider()
            .report_status(&CallContext::new(), &mut event, &StatusOpts::in_progress())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCheckRunId { .. }));
    }
}
