//! Provider configuration.
//!
//! Loaded once at startup, usually from a TOML file:
//!
//! ```toml
//! kind = "github"
//! api_url = "github.example.com/api/v3"
//! application_name = "Pipelines as Code CI"
//! log_url = "https://console.example.com/runs"
//! ```
//!
//! The token is read from the environment variable named by `token_env`
//! unless it is given inline.

use crate::error::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Default name for check runs and status contexts.
pub const DEFAULT_APPLICATION_NAME: &str = "Pipelines as Code CI";

/// Supported source-control platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// GitHub and GitHub Enterprise.
    #[serde(alias = "github-enterprise")]
    Github,
    /// GitLab.com and self-managed GitLab.
    Gitlab,
    /// Bitbucket Cloud.
    #[serde(alias = "bitbucket")]
    BitbucketCloud,
}

impl ProviderKind {
    /// Configuration name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Github => "github",
            Self::Gitlab => "gitlab",
            Self::BitbucketCloud => "bitbucket-cloud",
        }
    }

    /// Public API endpoint used when no `api_url` is configured.
    #[must_use]
    pub const fn default_api_url(self) -> &'static str {
        match self {
            Self::Github => "https://api.github.com",
            Self::Gitlab => "https://gitlab.com/api/v4",
            Self::BitbucketCloud => "https://api.bitbucket.org/2.0",
        }
    }

    /// Environment variable holding the token by default.
    #[must_use]
    pub const fn default_token_env(self) -> &'static str {
        match self {
            Self::Github => "GITHUB_TOKEN",
            Self::Gitlab => "GITLAB_TOKEN",
            Self::BitbucketCloud => "BITBUCKET_TOKEN",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "github" | "github-enterprise" => Ok(Self::Github),
            "gitlab" => Ok(Self::Gitlab),
            "bitbucket-cloud" | "bitbucket" => Ok(Self::BitbucketCloud),
            other => Err(Error::configuration(
                format!("Unknown provider kind: {other}"),
                "Use one of: github, gitlab, bitbucket-cloud",
            )),
        }
    }
}

/// Configuration for one provider connection.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Platform.
    pub kind: ProviderKind,
    /// Enterprise or self-hosted API base URL.
    #[serde(default)]
    pub api_url: Option<String>,
    /// Inline token. Prefer `token_env`.
    #[serde(default)]
    pub token: Option<SecretString>,
    /// Environment variable to read the token from.
    #[serde(default)]
    pub token_env: Option<String>,
    /// Account name for Bitbucket Cloud app passwords.
    #[serde(default)]
    pub username: Option<String>,
    /// Name of the check run / status context.
    #[serde(default = "default_application_name")]
    pub application_name: String,
    /// Default logs link attached when a status object is created.
    #[serde(default)]
    pub log_url: Option<String>,
}

fn default_application_name() -> String {
    DEFAULT_APPLICATION_NAME.to_string()
}

impl ProviderConfig {
    /// Configuration for `kind` with every optional field unset.
    #[must_use]
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            api_url: None,
            token: None,
            token_env: None,
            username: None,
            application_name: default_application_name(),
            log_url: None,
        }
    }

    /// Set the API base URL.
    #[must_use]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    /// Set an inline token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(SecretString::from(token.into()));
        self
    }

    /// Set the token environment variable.
    #[must_use]
    pub fn with_token_env(mut self, env_var: impl Into<String>) -> Self {
        self.token_env = Some(env_var.into());
        self
    }

    /// Set the Bitbucket account name.
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the application name.
    #[must_use]
    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    /// Set the default logs link.
    #[must_use]
    pub fn with_log_url(mut self, url: impl Into<String>) -> Self {
        self.log_url = Some(url.into());
        self
    }

    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// API base URL without a trailing slash. A missing scheme is
    /// normalised to `https://`.
    #[must_use]
    pub fn api_base(&self) -> String {
        let url = match self.api_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url,
            _ => self.kind.default_api_url(),
        };
        let url = url.trim_end_matches('/');
        if url.starts_with("https://") || url.starts_with("http://") {
            url.to_string()
        } else {
            format!("https://{url}")
        }
    }

    /// Whether a non-default API endpoint is configured.
    #[must_use]
    pub fn is_enterprise(&self) -> bool {
        self.api_url.as_deref().is_some_and(|url| !url.trim().is_empty())
    }

    /// Name of the environment variable the token is read from.
    #[must_use]
    pub fn token_env_name(&self) -> &str {
        self.token_env
            .as_deref()
            .unwrap_or_else(|| self.kind.default_token_env())
    }

    /// The token, either inline or from the environment.
    pub fn resolve_token(&self) -> Result<SecretString> {
        if let Some(token) = &self.token
            && !token.expose_secret().is_empty()
        {
            return Ok(token.clone());
        }

        let env_var = self.token_env_name();
        match std::env::var(env_var) {
            Ok(token) if !token.is_empty() => Ok(SecretString::from(token)),
            _ => Err(Error::configuration(
                format!("No {} token found: {env_var} is not set or empty", self.kind),
                format!("export {env_var}=<token> or set `token` in the provider configuration"),
            )),
        }
    }
}
