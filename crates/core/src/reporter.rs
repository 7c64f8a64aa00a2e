//! Per-run status reporting.
//!
//! [`RunReporter`] is the single writer for one run's status object: it owns
//! the run's [`Event`], serialises every report behind a lock so the object
//! is created at most once and updated in order, and refuses reports after
//! the run has completed.

use crate::context::CallContext;
use crate::error::Result;
use crate::event::Event;
use crate::provider::Provider;
use crate::status::{CheckRunState, StatusOpts};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

struct RunState {
    event: Event,
    lifecycle: CheckRunState,
}

/// Serialised status reporter for one run.
pub struct RunReporter {
    provider: Arc<dyn Provider>,
    state: Mutex<RunState>,
}

impl RunReporter {
    /// Take ownership of `event` for reporting through `provider`.
    pub fn new(provider: Arc<dyn Provider>, event: Event) -> Self {
        let lifecycle = CheckRunState::of(&event);
        Self {
            provider,
            state: Mutex::new(RunState { event, lifecycle }),
        }
    }

    /// Report `opts`. Concurrent callers are applied one at a time in lock
    /// acquisition order.
    pub async fn report(&self, ctx: &CallContext, opts: &StatusOpts) -> Result<()> {
        let mut state = self.state.lock().await;

        if let Err(e) = state.lifecycle.next() {
            warn!(
                repo = %state.event.full_name(),
                status = %opts.status,
                "Ignoring status report for completed run"
            );
            return Err(e);
        }

        self.provider
            .report_status(ctx, &mut state.event, opts)
            .await?;

        if let Some(id) = state.event.check_run_id.clone() {
            let lifecycle = std::mem::take(&mut state.lifecycle);
            state.lifecycle = lifecycle.advance(id, opts);
        }
        Ok(())
    }

    /// Snapshot of the run's event.
    pub async fn event(&self) -> Event {
        self.state.lock().await.event.clone()
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> CheckRunState {
        self.state.lock().await.lifecycle.clone()
    }

    /// Release the event.
    pub fn into_event(self) -> Event {
        self.state.into_inner().event
    }
}
