//! Job status poller for long-running analysis jobs.
//!
//! A poll session repeatedly reads a job's status until the backend reports
//! a terminal state or the caller cancels. Observations are delivered to a
//! callback in order; the terminal observation is delivered exactly once.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vscore_client::ApiClient;
//! use vscore_poller::{JobStatusPoller, PollerConfig, DisplayState};
//!
//! let client = Arc::new(ApiClient::from_env()?);
//! let poller = JobStatusPoller::new(client, PollerConfig::from_env());
//!
//! let handle = poller.spawn(sequence_id, |event| {
//!     println!("{}", DisplayState::from_event(&event));
//! });
//! let summary = handle.join().await;
//! ```

pub mod backoff;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod poller;
pub mod session;
pub mod source;
pub mod view;

pub use backoff::{Backoff, EndedStreak, FailureLog, FailureStreak};
pub use config::PollerConfig;
pub use logging::PollLogger;
pub use poller::{JobStatusPoller, PollHandle, PollSummary};
pub use session::{PollEvent, PollOutcome, PollSession, PollState, Step};
pub use source::JobStatusSource;
pub use view::DisplayState;
