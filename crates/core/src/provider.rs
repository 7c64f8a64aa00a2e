//! The provider capability contract.

use crate::context::CallContext;
use crate::error::Result;
use crate::event::Event;
use crate::status::StatusOpts;
use async_trait::async_trait;

/// Capability set every source-control provider exposes.
///
/// One concrete type per platform implements this trait; the orchestrator
/// picks one at startup from configuration and only talks to it through
/// this interface. Implementations perform no retries.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider name, as used in configuration and logs.
    fn name(&self) -> &'static str;

    /// All YAML files directly under `path` at `event.sha`, joined into one
    /// multi-document stream. Empty when `path` does not exist.
    async fn get_manifest(&self, ctx: &CallContext, event: &Event, path: &str) -> Result<String>;

    /// Raw content of `path` at `event.sha`, or at the trusted
    /// `event.base_branch` when `use_base_branch` is set.
    async fn get_file(
        &self,
        ctx: &CallContext,
        event: &Event,
        path: &str,
        use_base_branch: bool,
    ) -> Result<String>;

    /// Complete `event` from pull request `number`.
    async fn resolve_pull_request(
        &self,
        ctx: &CallContext,
        event: Event,
        number: u64,
    ) -> Result<Event>;

    /// Fill in the commit permalink and title for `event.sha`.
    async fn resolve_commit(&self, ctx: &CallContext, event: &mut Event) -> Result<()>;

    /// Create or update the run's status object.
    async fn report_status(
        &self,
        ctx: &CallContext,
        event: &mut Event,
        opts: &StatusOpts,
    ) -> Result<()>;
}
