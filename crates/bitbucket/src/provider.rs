//! Bitbucket Cloud provider.
//!
//! Run status is reported as a commit build status whose key is derived
//! from the application name. The key doubles as the check-run handle.
//! Every write must carry a link, so an update without one re-sends the
//! link already stored on the status.

use crate::api::{BitbucketApi, BuildStatus};
use crate::client::BitbucketHttpClient;
use async_trait::async_trait;
use forgeport_core::manifest::{self, TreeSource};
use forgeport_core::status::{self, StatusSink};
use forgeport_core::{
    CallContext, CheckRunId, DirEntry, Event, Listing, Provider, ProviderConfig, Result,
    StatusOpts, StatusUpdate, resolver,
};
use tracing::info;

/// Bitbucket Cloud provider.
pub struct BitbucketProvider<A = BitbucketHttpClient> {
    api: A,
    application_name: String,
    log_url: Option<String>,
}

impl BitbucketProvider<BitbucketHttpClient> {
    /// Create a provider talking to the configured Bitbucket endpoint.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        Ok(Self::new(BitbucketHttpClient::from_config(config)?, config))
    }
}

impl<A: BitbucketApi> BitbucketProvider<A> {
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

    fn build_status(
        &self,
        event: &Event,
        update: &StatusUpdate,
        current_url: Option<&str>,
    ) -> BuildStatus {
        BuildStatus::from_update(
            update,
            &[current_url, self.log_url.as_deref(), Some(event.url.as_str())],
        )
    }
}

#[async_trait]
impl<A: BitbucketApi> TreeSource for BitbucketProvider<A> {
    async fn list_path(
        &self,
        ctx: &CallContext,
        event: &Event,
        path: &str,
        revision: &str,
    ) -> Result<Listing> {
        ctx.run(
            "get source",
            self.api.get_src(&event.full_name(), path, revision),
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
            "get raw file",
            self.api.get_raw(&event.full_name(), &entry.id, &entry.path),
        )
        .await
    }
}

#[async_trait]
impl<A: BitbucketApi> StatusSink for BitbucketProvider<A> {
    async fn create_status(
        &self,
        ctx: &CallContext,
        event: &Event,
        update: &StatusUpdate,
    ) -> Result<CheckRunId> {
        let body = self.build_status(event, update, None);
        let key = ctx
            .run(
                "create build status",
                self.api
                    .create_build_status(&event.full_name(), &event.sha, &body),
            )
            .await?;
        Ok(CheckRunId::new(key))
    }

    async fn update_status(
        &self,
        ctx: &CallContext,
        event: &Event,
        id: &CheckRunId,
        update: &StatusUpdate,
    ) -> Result<()> {
        let current_url = if update.details_url.is_some() {
            None
        } else {
            ctx.run(
                "get build status",
                self.api
                    .get_build_status_url(&event.full_name(), &event.sha, id.as_str()),
            )
            .await?
        };
        let mut body = self.build_status(event, update, current_url.as_deref());
        body.key = id.as_str().to_string();
        ctx.run(
            "update build status",
            self.api
                .update_build_status(&event.full_name(), &event.sha, id.as_str(), &body),
        )
        .await?;

        if update.is_terminal() {
            info!(
                repo = %event.full_name(),
                key = %id,
                state = ?body.state,
                "Completed build status"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl<A: BitbucketApi> Provider for BitbucketProvider<A> {
    fn name(&self) -> &'static str {
        "bitbucket-cloud"
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
                self.api.get_pull_request(&event.full_name(), number),
            )
            .await?;
        Ok(resolver::apply_pull_request(event, pr))
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
