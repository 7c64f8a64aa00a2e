//! Source-control provider abstraction for CI orchestrators.
//!
//! forgeport reads pipeline manifests from repositories, completes events
//! from pull request and commit metadata, and reports run status back to
//! the hosting platform, behind one [`Provider`] trait:
//!
//! ```no_run
//! use forgeport::{CallContext, Event, Provider, ProviderConfig, StatusOpts};
//!
//! # async fn run() -> forgeport::Result<()> {
//! let config = ProviderConfig::load("forgeport.toml")?;
//! let provider = forgeport::connect(&config)?;
//!
//! let ctx = CallContext::new();
//! let mut event = Event::new("owner", "repo", "0123abcd").with_base_branch("main");
//! let manifest = provider.get_manifest(&ctx, &event, ".tekton").await?;
//! provider.report_status(&ctx, &mut event, &StatusOpts::in_progress()).await?;
//! # let _ = manifest;
//! # Ok(())
//! # }
//! ```
//!
//! The platform is chosen once, at startup, from [`ProviderConfig::kind`].

#![warn(missing_docs)]

pub mod tracing;

pub use forgeport_bitbucket::BitbucketProvider;
pub use forgeport_core::*;
pub use forgeport_github::GitHubProvider;
pub use forgeport_gitlab::GitLabProvider;

use ::tracing::debug;

/// Build the provider selected by `config.kind`.
///
/// Fails with [`Error::Configuration`] when no token can be found or the
/// API URL is unusable.
pub fn connect(config: &ProviderConfig) -> Result<Box<dyn Provider>> {
    debug!(
        provider = %config.kind,
        api_url = %config.api_base(),
        application = %config.application_name,
        "Connecting provider"
    );
    let provider: Box<dyn Provider> = match config.kind {
        ProviderKind::Github => Box::new(GitHubProvider::from_config(config)?),
        ProviderKind::Gitlab => Box::new(GitLabProvider::from_config(config)?),
        ProviderKind::BitbucketCloud => Box::new(BitbucketProvider::from_config(config)?),
    };
    Ok(provider)
}

/// Load a TOML configuration file and build its provider.
pub fn connect_from_file(path: impl AsRef<std::path::Path>) -> Result<Box<dyn Provider>> {
    connect(&ProviderConfig::load(path)?)
}
