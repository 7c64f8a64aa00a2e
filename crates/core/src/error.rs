//! Error types shared by every provider adapter.

use miette::Diagnostic;
use std::fmt;
use thiserror::Error;

/// Result type alias for provider operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed source error carried by transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a call was abandoned before the provider answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The caller's cancellation token fired.
    Cancelled,
    /// The caller's deadline elapsed.
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "cancelled"),
            Self::DeadlineExceeded => write!(f, "deadline exceeded"),
        }
    }
}

/// Errors that can occur while talking to a source-control provider.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// The requested file or directory does not exist at the revision.
    #[error("{path} not found in {repository} at {revision}")]
    #[diagnostic(
        code(forgeport::not_found),
        help("Check that the path exists on the requested branch or commit")
    )]
    NotFound {
        /// `owner/repo` the lookup ran against
        repository: String,
        /// Path inside the repository
        path: String,
        /// Branch name or commit SHA
        revision: String,
    },

    /// A directory was expected but the path names a file.
    #[error("{path} in {repository} is a file instead of a directory")]
    #[diagnostic(code(forgeport::not_a_directory))]
    NotADirectory {
        /// `owner/repo` the lookup ran against
        repository: String,
        /// Path inside the repository
        path: String,
    },

    /// A file was expected but the path names a directory.
    #[error("{path} in {repository} is a directory")]
    #[diagnostic(code(forgeport::is_a_directory))]
    IsADirectory {
        /// `owner/repo` the lookup ran against
        repository: String,
        /// Path inside the repository
        path: String,
    },

    /// The provider API or the network failed.
    #[error("{provider} API error for {repository}: {message}")]
    #[diagnostic(code(forgeport::transport))]
    Transport {
        /// Provider name (github, gitlab, bitbucket-cloud)
        provider: String,
        /// `owner/repo` the request targeted
        repository: String,
        /// Description of the failed request
        message: String,
        /// The underlying client error
        #[source]
        source: Option<BoxError>,
    },

    /// The caller gave up before the provider answered.
    #[error("{operation} {reason}")]
    #[diagnostic(
        code(forgeport::cancelled),
        help("The request was abandoned by the caller; it may be retried with a longer deadline")
    )]
    Cancelled {
        /// Operation that was interrupted
        operation: String,
        /// Token cancellation or deadline
        reason: CancelReason,
    },

    /// A stored check-run handle cannot be used by this provider.
    #[error("Invalid check run ID: {id}")]
    #[diagnostic(code(forgeport::invalid_check_run_id))]
    InvalidCheckRunId {
        /// The offending handle
        id: String,
    },

    /// A status report arrived after the run reached its terminal state.
    #[error("Check run {check_run_id} is already completed")]
    #[diagnostic(
        code(forgeport::run_completed),
        help("Start a new run with a fresh event to report again")
    )]
    RunCompleted {
        /// Handle of the completed status object
        check_run_id: String,
    },

    /// Provider configuration is missing or invalid.
    #[error("Configuration error: {message}")]
    #[diagnostic(code(forgeport::config), help("{help}"))]
    Configuration {
        /// The error message
        message: String,
        /// Help text for the user
        help: String,
    },

    /// Wrapped I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(forgeport::io))]
    Io(#[from] std::io::Error),

    /// Wrapped TOML parsing error.
    #[error("TOML parse error: {0}")]
    #[diagnostic(code(forgeport::toml_parse))]
    TomlParse(#[from] toml::de::Error),
}

impl Error {
    /// Create a new not-found error.
    #[must_use]
    pub fn not_found(
        repository: impl Into<String>,
        path: impl Into<String>,
        revision: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            repository: repository.into(),
            path: path.into(),
            revision: revision.into(),
        }
    }

    /// Create a new not-a-directory error.
    #[must_use]
    pub fn not_a_directory(repository: impl Into<String>, path: impl Into<String>) -> Self {
        Self::NotADirectory {
            repository: repository.into(),
            path: path.into(),
        }
    }

    /// Create a new is-a-directory error.
    #[must_use]
    pub fn is_a_directory(repository: impl Into<String>, path: impl Into<String>) -> Self {
        Self::IsADirectory {
            repository: repository.into(),
            path: path.into(),
        }
    }

    /// Create a new transport error without an underlying source.
    #[must_use]
    pub fn transport(
        provider: impl Into<String>,
        repository: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Transport {
            provider: provider.into(),
            repository: repository.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a new transport error wrapping the client error.
    #[must_use]
    pub fn transport_with_source(
        provider: impl Into<String>,
        repository: impl Into<String>,
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Transport {
            provider: provider.into(),
            repository: repository.into(),
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a new cancellation error.
    #[must_use]
    pub fn cancelled(operation: impl Into<String>, reason: CancelReason) -> Self {
        Self::Cancelled {
            operation: operation.into(),
            reason,
        }
    }

    /// Create a new configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            help: help.into(),
        }
    }

    /// Whether the error reports an absent resource.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether the caller abandoned the call.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
