//! Status reporting: presentation table and the check-run lifecycle.
//!
//! A run's status object moves `uncreated -> in_progress -> completed`.
//! The first report creates the object on the provider and records its
//! handle on [`Event::check_run_id`]; every later report updates that same
//! object. A report carrying a [`Conclusion`] completes the run.

use crate::context::CallContext;
use crate::error::{Error, Result};
use crate::event::{CheckRunId, Event};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Title shown while a run is executing.
pub const RUNNING_TITLE: &str = "CI has Started";

/// Execution state of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Accepted but not started.
    Queued,
    /// Executing.
    #[default]
    InProgress,
    /// Finished.
    Completed,
}

impl RunStatus {
    /// Wire name, as used by GitHub check runs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conclusion {
    /// Every pipeline succeeded.
    Success,
    /// At least one pipeline failed.
    Failure,
    /// The commit was not processed.
    Skipped,
    /// Outcome unknown. Valid on the wire, no trigger produces it today.
    Neutral,
}

impl Conclusion {
    /// Wire name, as used by GitHub check runs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Skipped => "skipped",
            Self::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Conclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the orchestrator wants to report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusOpts {
    /// Execution state.
    pub status: RunStatus,
    /// Outcome; `None` while the run has not finished.
    pub conclusion: Option<Conclusion>,
    /// Long-form body.
    pub text: String,
    /// Link to logs. An empty value leaves the provider's link untouched.
    pub details_url: Option<String>,
}

impl StatusOpts {
    /// Report a queued run.
    #[must_use]
    pub fn queued() -> Self {
        Self {
            status: RunStatus::Queued,
            ..Self::default()
        }
    }

    /// Report a running run.
    #[must_use]
    pub fn in_progress() -> Self {
        Self::default()
    }

    /// Report a finished run.
    #[must_use]
    pub fn completed(conclusion: Conclusion) -> Self {
        Self {
            status: RunStatus::Completed,
            conclusion: Some(conclusion),
            ..Self::default()
        }
    }

    /// Set the long-form body.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set the logs link.
    #[must_use]
    pub fn with_details_url(mut self, url: impl Into<String>) -> Self {
        self.details_url = Some(url.into());
        self
    }
}

/// Title and summary shown by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presentation {
    /// Short headline.
    pub title: String,
    /// One-sentence summary.
    pub summary: String,
}

impl Presentation {
    fn new(title: &str, summary: String) -> Self {
        Self {
            title: title.to_string(),
            summary,
        }
    }

    /// Presentation for a finished run.
    #[must_use]
    pub fn for_conclusion(application: &str, conclusion: Conclusion) -> Self {
        match conclusion {
            Conclusion::Success => Self::new(
                "Success",
                format!("{application} has successfully validated your commit."),
            ),
            Conclusion::Failure => Self::new("Failed", format!("{application} has failed.")),
            Conclusion::Skipped => {
                Self::new("Skipped", format!("{application} is skipping this commit."))
            }
            Conclusion::Neutral => Self::new(
                "Unknown",
                format!("{application} doesn't know what happened with this commit."),
            ),
        }
    }

    /// Presentation while the run executes.
    #[must_use]
    pub fn running(application: &str) -> Self {
        Self::new(RUNNING_TITLE, format!("{application} is running."))
    }

    /// Presentation for a report. The running message wins over any
    /// conclusion while `status` is `in_progress`.
    #[must_use]
    pub fn for_status(application: &str, opts: &StatusOpts) -> Option<Self> {
        if opts.status == RunStatus::InProgress {
            return Some(Self::running(application));
        }
        opts.conclusion
            .map(|conclusion| Self::for_conclusion(application, conclusion))
    }
}

/// Provider-neutral rendering of one report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    /// Name of the status object (the application name).
    pub name: String,
    /// Execution state.
    pub status: RunStatus,
    /// Outcome, when finished.
    pub conclusion: Option<Conclusion>,
    /// Set exactly when a conclusion is present.
    pub completed_at: Option<DateTime<Utc>>,
    /// Title and summary, when there is something to show.
    pub presentation: Option<Presentation>,
    /// Long-form body.
    pub text: String,
    /// Logs link; `None` keeps whatever the provider already has.
    pub details_url: Option<String>,
}

impl StatusUpdate {
    /// Render `opts` for `application` at time `now`.
    #[must_use]
    pub fn from_opts(application: &str, opts: &StatusOpts, now: DateTime<Utc>) -> Self {
        Self {
            name: application.to_string(),
            status: opts.status,
            conclusion: opts.conclusion,
            completed_at: opts.conclusion.map(|_| now),
            presentation: Presentation::for_status(application, opts),
            text: opts.text.clone(),
            details_url: opts.details_url.clone().filter(|url| !url.is_empty()),
        }
    }

    /// Whether this update finishes the run.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.conclusion.is_some()
    }
}

/// Lifecycle of one run's status object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CheckRunState {
    /// No status object exists yet.
    #[default]
    Uncreated,
    /// The object exists and the run is still going.
    InProgress(CheckRunId),
    /// The run finished. Terminal.
    Completed(CheckRunId),
}

/// Provider operation required by the next report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Create the status object.
    Create,
    /// Update the existing object.
    Update(CheckRunId),
}

impl CheckRunState {
    /// State implied by an event that has not completed.
    #[must_use]
    pub fn of(event: &Event) -> Self {
        event
            .check_run_id
            .clone()
            .map_or(Self::Uncreated, Self::InProgress)
    }

    /// Operation the next report must perform.
    pub fn next(&self) -> Result<Transition> {
        match self {
            Self::Uncreated => Ok(Transition::Create),
            Self::InProgress(id) => Ok(Transition::Update(id.clone())),
            Self::Completed(id) => Err(Error::RunCompleted {
                check_run_id: id.to_string(),
            }),
        }
    }

    /// State after a report with `opts` landed on object `id`.
    #[must_use]
    pub fn advance(self, id: CheckRunId, opts: &StatusOpts) -> Self {
        if opts.conclusion.is_some() {
            Self::Completed(id)
        } else {
            Self::InProgress(id)
        }
    }

    /// Handle of the status object, once created.
    #[must_use]
    pub const fn check_run_id(&self) -> Option<&CheckRunId> {
        match self {
            Self::Uncreated => None,
            Self::InProgress(id) | Self::Completed(id) => Some(id),
        }
    }

    /// Whether the run has finished.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Provider primitives for creating and updating a status object.
#[async_trait]
pub trait StatusSink: Send + Sync {
    /// Create the status object for `event.sha` carrying `update`.
    async fn create_status(
        &self,
        ctx: &CallContext,
        event: &Event,
        update: &StatusUpdate,
    ) -> Result<CheckRunId>;

    /// Apply `update` to the existing object `id`.
    async fn update_status(
        &self,
        ctx: &CallContext,
        event: &Event,
        id: &CheckRunId,
        update: &StatusUpdate,
    ) -> Result<()>;
}

/// Report `opts` for the run described by `event`.
///
/// Creates the status object on the first call and records its handle on
/// the event; later calls update that object. A failed creation fails the
/// whole report and leaves the event untouched.
pub async fn report_status<S>(
    sink: &S,
    ctx: &CallContext,
    application: &str,
    event: &mut Event,
    opts: &StatusOpts,
) -> Result<()>
where
    S: StatusSink + ?Sized,
{
    let update = StatusUpdate::from_opts(application, opts, Utc::now());

    match CheckRunState::of(event).next()? {
        Transition::Create => {
            let id = sink.create_status(ctx, event, &update).await?;
            info!(
                repo = %event.full_name(),
                sha = %event.sha,
                check_run_id = %id,
                status = %update.status,
                "Created status object"
            );
            event.check_run_id = Some(id);
        }
        Transition::Update(id) => {
            debug!(
                repo = %event.full_name(),
                check_run_id = %id,
                status = %update.status,
                conclusion = ?update.conclusion,
                "Updating status object"
            );
            sink.update_status(ctx, event, &id, &update).await?;
        }
    }

    Ok(())
}
