//! Job status poller.
//!
//! Drives a [`PollSession`] against a [`JobStatusSource`]:
//! 1. Fetch immediately, no initial wait.
//! 2. On a non-terminal result, arm one timer and fetch again when it fires.
//! 3. On the first terminal result, deliver it once and stop.
//! 4. On cancellation, stop at once; an in-flight fetch is dropped and its
//!    result never applied.
//!
//! Fetches are strictly sequential: the next timer is armed only after the
//! previous fetch finished, so a slow backend cannot pile up requests.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, Instrument};

use vscore_client::ClientError;
use vscore_models::SequenceId;

use crate::backoff::{Backoff, FailureLog, FailureStreak};
use crate::config::PollerConfig;
use crate::metrics::{record_fetch, record_session};
use crate::session::{PollEvent, PollOutcome, PollSession, Step};
use crate::source::JobStatusSource;

/// Result of a finished poll session.
#[derive(Debug, Clone, PartialEq)]
pub struct PollSummary {
    pub outcome: PollOutcome,
    /// Fetches whose result came back (in-flight fetches dropped by
    /// cancellation are not counted)
    pub fetches: u32,
    /// Timers armed between fetches
    pub timers_armed: u32,
}

/// Polls one job until it is terminal or the caller cancels.
pub struct JobStatusPoller<S> {
    source: Arc<S>,
    config: PollerConfig,
    backoff: Backoff,
}

impl<S> Clone for JobStatusPoller<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            config: self.config.clone(),
            backoff: self.backoff.clone(),
        }
    }
}

impl<S> JobStatusPoller<S>
where
    S: JobStatusSource + 'static,
{
    pub fn new(source: Arc<S>, config: PollerConfig) -> Self {
        let backoff = Backoff::from_config(&config);
        Self {
            source,
            config,
            backoff,
        }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Run one poll session in the current task.
    ///
    /// `on_event` is never called after `cancel` has fired and the session
    /// noticed it; results of a fetch that was in flight at that point are
    /// discarded.
    pub async fn run<F>(&self, id: SequenceId, cancel: CancellationToken, on_event: F) -> PollSummary
    where
        F: FnMut(PollEvent) + Send,
    {
        let session = PollSession::with_cancel(&id, cancel.clone(), on_event);
        let span = session.logger().span(self.config.interval);

        let summary = self.drive(id, cancel, session).instrument(span).await;
        record_session(summary.outcome.label());
        summary
    }

    /// Spawn a poll session on the runtime.
    ///
    /// Dropping the returned handle cancels the session.
    pub fn spawn<F>(&self, id: SequenceId, on_event: F) -> PollHandle
    where
        F: FnMut(PollEvent) + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let poller = self.clone();
        let token = cancel.clone();

        let task = tokio::spawn(async move { poller.run(id, token, on_event).await });

        PollHandle {
            cancel,
            task: Some(task),
        }
    }

    async fn drive<F>(
        &self,
        id: SequenceId,
        cancel: CancellationToken,
        mut session: PollSession<F>,
    ) -> PollSummary
    where
        F: FnMut(PollEvent) + Send,
    {
        let logger = session.logger().clone();
        let mut streak = FailureStreak::new(self.config.max_logged_failures);
        let mut fetches = 0u32;
        let mut timers_armed = 0u32;

        if session.begin() == Step::Stop {
            return PollSummary {
                outcome: session.finish(),
                fetches,
                timers_armed,
            };
        }

        loop {
            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = tokio::time::timeout(self.config.request_timeout, self.source.fetch_once(&id)) => Some(result),
            };

            let Some(fetched) = fetched else {
                session.cancel();
                break;
            };
            fetches += 1;

            if cancel.is_cancelled() {
                record_fetch("discarded");
                session.cancel();
                break;
            }

            let fetched = fetched.unwrap_or_else(|_| {
                Err(ClientError::Timeout(format!(
                    "no status response within {:?}",
                    self.config.request_timeout
                )))
            });

            let delay = match fetched {
                Ok(job) => {
                    if let Some(ended) = streak.record_success() {
                        if ended.was_quiet || ended.failures > 1 {
                            logger.recovered(ended.failures, ended.dominant_kind);
                        }
                    }
                    record_fetch(if job.is_terminal() { "terminal" } else { "non_terminal" });

                    if session.observe(job) == Step::Stop {
                        break;
                    }
                    self.backoff.delay(0, None)
                }
                Err(e) => {
                    record_fetch("error");
                    let log = streak.record_failure(e.kind());
                    let failures = streak.len();
                    let delay = self
                        .backoff
                        .delay(failures, e.retry_after_ms().map(Duration::from_millis));

                    match log {
                        FailureLog::Log => {
                            logger.fetch_failed(failures, e.kind(), e.is_transient(), delay, &e.to_string())
                        }
                        FailureLog::GoQuiet => logger.going_quiet(&streak),
                        FailureLog::Quiet => logger.fetch_failed_quietly(failures, e.kind(), delay),
                    }

                    if session.fetch_failed(e.to_string(), e.kind(), failures, delay) == Step::Stop {
                        break;
                    }
                    delay
                }
            };

            timers_armed += 1;
            let cancelled = tokio::select! {
                biased;
                _ = cancel.cancelled() => true,
                _ = tokio::time::sleep(delay) => false,
            };

            if cancelled {
                session.cancel();
                break;
            }
        }

        PollSummary {
            outcome: session.finish(),
            fetches,
            timers_armed,
        }
    }
}

/// Handle to a spawned poll session.
pub struct PollHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<PollSummary>>,
}

impl PollHandle {
    /// Stop polling. Safe to call repeatedly and after the session ended.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this session, e.g. to wire into a shutdown signal.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the session to end.
    pub async fn join(mut self) -> PollSummary {
        let Some(task) = self.task.take() else {
            return PollSummary {
                outcome: PollOutcome::Cancelled,
                fetches: 0,
                timers_armed: 0,
            };
        };

        match task.await {
            Ok(summary) => summary,
            Err(e) => {
                error!("Poll session task failed: {}", e);
                PollSummary {
                    outcome: PollOutcome::Cancelled,
                    fetches: 0,
                    timers_armed: 0,
                }
            }
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.cancel.cancel();
        }
    }
}
