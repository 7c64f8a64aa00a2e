//! GitLab provider.
//!
//! Run status is reported as a commit status named after the application.
//! GitLab keys commit statuses by name, so every update re-posts the status
//! under the same name instead of patching it by ID. A re-post without a
//! `target_url` keeps the link set earlier.

use crate::api::{CommitStatus, GitLabApi};
use crate::client::GitLabHttpClient;
use async_trait::async_trait;
use forgeport_core::manifest::{self, TreeSource};
use forgeport_core::status::{self, StatusSink};
use forgeport_core::{
    CallContext, CheckRunId, DirEntry, Error, Event, Listing, Provider, ProviderConfig, Result,
    StatusOpts, StatusUpdate, resolver,
};
use tracing::info;

/// GitLab provider.
pub struct GitLabProvider<A = GitLabHttpClient> {
    api: A,
    application_name: String,
    log_url: Option<String>,
}

impl GitLabProvider<GitLabHttpClient> {
    /// Create a provider talking to the configured GitLab instance.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        Ok(Self::new(GitLabHttpClient::from_config(config)?, config))
    }
}

impl<A: GitLabApi> GitLabProvider<A> {
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

    async fn post_status(
        &self,
        ctx: &CallContext,
        event: &Event,
        body: &CommitStatus,
    ) -> Result<u64> {
        ctx.run(
            "set commit status",
            self.api
                .set_commit_status(&event.full_name(), &event.sha, body),
        )
        .await
    }
}

#[async_trait]
impl<A: GitLabApi> TreeSource for GitLabProvider<A> {
    async fn list_path(
        &self,
        ctx: &CallContext,
        event: &Event,
        path: &str,
        revision: &str,
    ) -> Result<Listing> {
        ctx.run(
            "list repository tree",
            self.api.get_tree(&event.full_name(), path, revision),
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
            "get raw blob",
            self.api.get_raw_blob(&event.full_name(), &entry.id),
        )
        .await
    }
}

#[async_trait]
impl<A: GitLabApi> StatusSink for GitLabProvider<A> {
    async fn create_status(
        &self,
        ctx: &CallContext,
        event: &Event,
        update: &StatusUpdate,
    ) -> Result<CheckRunId> {
        let body = CommitStatus::from_update(update, self.log_url.as_deref());
        let id = self.post_status(ctx, event, &body).await?;
        Ok(CheckRunId::from(id))
    }

    async fn update_status(
        &self,
        ctx: &CallContext,
        event: &Event,
        id: &CheckRunId,
        update: &StatusUpdate,
    ) -> Result<()> {
        if id.as_str().parse::<u64>().is_err() {
            return Err(Error::InvalidCheckRunId { id: id.to_string() });
        }
        self.post_status(ctx, event, &CommitStatus::from_update(update, None))
            .await?;

        if update.is_terminal() {
            info!(
                project = %event.full_name(),
                status_id = %id,
                conclusion = ?update.conclusion,
                "Completed commit status"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl<A: GitLabApi> Provider for GitLabProvider<A> {
    fn name(&self) -> &'static str {
        "gitlab"
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
        let mr = ctx
            .run(
                "get merge request",
                self.api.get_merge_request(&event.full_name(), number),
            )
            .await?;
        Ok(resolver::apply_pull_request(event, mr))
    }

    async fn resolve_commit(&self, ctx: &CallContext, event: &mut Event) -> Result<()> {
        let commit = ctx
            .run(
                "get commit",
                self.api.get_commit(&event.full_name(), &event.sha),
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
