//! State machine for one poll session.
//!
//! ```text
//! Idle ──begin──► Polling ──terminal──► Done
//!                   │  ▲
//!                   │  └─ non-terminal / fetch error
//!                   └──cancel──► Cancelled
//! ```
//!
//! `Done` and `Cancelled` are absorbing: anything reported to the session
//! afterwards is dropped without reaching the callback. That is what keeps
//! the terminal callback to exactly one delivery, even when a duplicate
//! terminal observation races in.

use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use vscore_models::{AnalysisJob, JobStatus, SequenceId};

use crate::logging::PollLogger;

/// Lifecycle state of a poll session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollState {
    Idle,
    Polling,
    Done,
    Cancelled,
}

impl PollState {
    pub fn is_absorbing(&self) -> bool {
        matches!(self, PollState::Done | PollState::Cancelled)
    }
}

/// What the caller's callback receives, in observation order.
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    /// A non-terminal status was observed.
    Observed(AnalysisJob),
    /// A fetch failed; polling continues after `next_attempt_in`.
    Retrying {
        error: String,
        error_kind: &'static str,
        consecutive_failures: u32,
        next_attempt_in: Duration,
    },
    /// The job reached `completed` or `failed`. Delivered at most once.
    Terminal(AnalysisJob),
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Completed(AnalysisJob),
    /// The backend reported the analysis as failed. Not a transport error.
    Failed(AnalysisJob),
    Cancelled,
}

impl PollOutcome {
    pub fn job(&self) -> Option<&AnalysisJob> {
        match self {
            PollOutcome::Completed(job) | PollOutcome::Failed(job) => Some(job),
            PollOutcome::Cancelled => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PollOutcome::Completed(_) => "completed",
            PollOutcome::Failed(_) => "failed",
            PollOutcome::Cancelled => "cancelled",
        }
    }
}

/// Whether the driver should keep polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Stop,
}

/// One poll session: owns the state, the terminal guard, and the callback.
pub struct PollSession<F> {
    state: PollState,
    on_event: F,
    cancel_token: CancellationToken,
    last_status: Option<JobStatus>,
    terminal: Option<AnalysisJob>,
    logger: PollLogger,
}

impl<F> PollSession<F>
where
    F: FnMut(PollEvent),
{
    pub fn new(id: &SequenceId, on_event: F) -> Self {
        Self::with_cancel(id, CancellationToken::new(), on_event)
    }

    /// Session whose deliveries are gated on `cancel`.
    ///
    /// The token is read at delivery time, so a cancellation issued while a
    /// fetch was in flight is seen before its result is applied.
    pub fn with_cancel(id: &SequenceId, cancel: CancellationToken, on_event: F) -> Self {
        Self {
            state: PollState::Idle,
            on_event,
            cancel_token: cancel,
            last_status: None,
            terminal: None,
            logger: PollLogger::new(id),
        }
    }

    /// Move to `Cancelled` if the token fired since the last check.
    fn is_open(&mut self) -> bool {
        if self.cancel_token.is_cancelled() {
            self.cancel();
        }
        self.state == PollState::Polling
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn logger(&self) -> &PollLogger {
        &self.logger
    }

    /// `Idle -> Polling` on first fetch initiation.
    pub fn begin(&mut self) -> Step {
        if self.cancel_token.is_cancelled() {
            self.cancel();
        }
        match self.state {
            PollState::Idle => {
                self.state = PollState::Polling;
                self.logger.started();
                Step::Continue
            }
            PollState::Polling => Step::Continue,
            PollState::Done | PollState::Cancelled => Step::Stop,
        }
    }

    /// Apply a successful fetch result.
    pub fn observe(&mut self, job: AnalysisJob) -> Step {
        if !self.is_open() {
            return Step::Stop;
        }

        if let Some(previous) = self.last_status {
            if job.status.is_regression_from(previous) {
                self.logger.regressed(previous, job.status);
            }
        }
        self.last_status = Some(job.status);

        if job.status.is_terminal() {
            self.state = PollState::Done;
            self.logger.terminal(&job);
            self.terminal = Some(job.clone());
            (self.on_event)(PollEvent::Terminal(job));
            return Step::Stop;
        }

        self.logger.observed(job.status, job.progress);
        (self.on_event)(PollEvent::Observed(job));
        Step::Continue
    }

    /// Report a failed fetch. Never terminal.
    pub fn fetch_failed(
        &mut self,
        error: String,
        error_kind: &'static str,
        consecutive_failures: u32,
        next_attempt_in: Duration,
    ) -> Step {
        if !self.is_open() {
            return Step::Stop;
        }

        (self.on_event)(PollEvent::Retrying {
            error,
            error_kind,
            consecutive_failures,
            next_attempt_in,
        });
        Step::Continue
    }

    /// Caller cancellation. No-op once the session has finished.
    pub fn cancel(&mut self) -> bool {
        if self.state.is_absorbing() {
            return false;
        }
        self.state = PollState::Cancelled;
        self.logger.cancelled();
        true
    }

    /// Consume the session into its outcome.
    pub fn finish(self) -> PollOutcome {
        match (self.state, self.terminal) {
            (PollState::Done, Some(job)) if job.status == JobStatus::Completed => {
                PollOutcome::Completed(job)
            }
            (PollState::Done, Some(job)) => PollOutcome::Failed(job),
            _ => PollOutcome::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vscore_models::AnalysisResult;

    fn job(status: JobStatus) -> AnalysisJob {
        AnalysisJob {
            id: None,
            sequence_id: SequenceId::from(1),
            status,
            result: (status == JobStatus::Completed).then(AnalysisResult::default),
            error_message: None,
            progress: None,
            updated_at: None,
        }
    }

    fn collecting() -> (std::sync::Arc<std::sync::Mutex<Vec<PollEvent>>>, impl FnMut(PollEvent)) {
        let events = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = events.clone();
        (events, move |e| sink.lock().unwrap().push(e))
    }

    #[test]
    fn test_happy_path_transitions() {
        let (events, cb) = collecting();
        let mut session = PollSession::new(&SequenceId::from(1), cb);
        assert_eq!(session.state(), PollState::Idle);

        assert_eq!(session.begin(), Step::Continue);
        assert_eq!(session.state(), PollState::Polling);

        assert_eq!(session.observe(job(JobStatus::Queued)), Step::Continue);
        assert_eq!(session.observe(job(JobStatus::Analyzing)), Step::Continue);
        assert_eq!(session.observe(job(JobStatus::Completed)), Step::Stop);
        assert_eq!(session.state(), PollState::Done);

        assert_eq!(events.lock().unwrap().len(), 3);
        assert!(matches!(session.finish(), PollOutcome::Completed(_)));
    }

    #[test]
    fn test_duplicate_terminal_delivered_once() {
        let (events, cb) = collecting();
        let mut session = PollSession::new(&SequenceId::from(1), cb);
        session.begin();

        session.observe(job(JobStatus::Failed));
        assert_eq!(session.observe(job(JobStatus::Failed)), Step::Stop);
        assert_eq!(session.observe(job(JobStatus::Processing)), Step::Stop);

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], PollEvent::Terminal(j) if j.status == JobStatus::Failed));
        drop(events);

        assert!(matches!(session.finish(), PollOutcome::Failed(_)));
    }

    #[test]
    fn test_cancelled_session_swallows_late_results() {
        let (events, cb) = collecting();
        let mut session = PollSession::new(&SequenceId::from(1), cb);
        session.begin();
        session.observe(job(JobStatus::Queued));

        assert!(!session.state().is_absorbing());
        assert!(session.cancel());
        assert!(session.state().is_absorbing());
        assert!(!session.cancel());
        assert_eq!(session.observe(job(JobStatus::Completed)), Step::Stop);
        assert_eq!(
            session.fetch_failed("late".into(), "network", 1, Duration::from_secs(5)),
            Step::Stop
        );
        assert_eq!(session.begin(), Step::Stop);

        assert_eq!(events.lock().unwrap().len(), 1);
        assert_eq!(session.finish(), PollOutcome::Cancelled);
    }

    #[test]
    fn test_token_cancellation_seen_before_delivery() {
        let (events, cb) = collecting();
        let token = CancellationToken::new();
        let mut session = PollSession::with_cancel(&SequenceId::from(1), token.clone(), cb);
        session.begin();
        session.observe(job(JobStatus::Processing));

        // Fetch was in flight when the caller went away
        token.cancel();
        assert_eq!(session.observe(job(JobStatus::Completed)), Step::Stop);
        assert_eq!(session.state(), PollState::Cancelled);
        assert_eq!(events.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_done_is_not_cancellable() {
        let (_events, cb) = collecting();
        let mut session = PollSession::new(&SequenceId::from(1), cb);
        session.begin();
        session.observe(job(JobStatus::Completed));

        assert!(!session.cancel());
        assert_eq!(session.state(), PollState::Done);
        assert!(session.state().is_absorbing());
    }

    #[test]
    fn test_fetch_failure_keeps_polling() {
        let (events, cb) = collecting();
        let mut session = PollSession::new(&SequenceId::from(1), cb);
        session.begin();

        let step = session.fetch_failed("connection reset".into(), "network", 1, Duration::from_secs(5));
        assert_eq!(step, Step::Continue);
        assert_eq!(session.state(), PollState::Polling);
        assert!(matches!(
            &events.lock().unwrap()[0],
            PollEvent::Retrying { consecutive_failures: 1, .. }
        ));
    }
}
