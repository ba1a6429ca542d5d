//! Poller metrics.

use metrics::counter;

pub mod names {
    /// Status fetches by outcome (`non_terminal`, `terminal`, `error`, `discarded`).
    pub const FETCHES_TOTAL: &str = "vscore_poll_fetches_total";

    /// Finished poll sessions by outcome.
    pub const SESSIONS_TOTAL: &str = "vscore_poll_sessions_total";
}

pub fn record_fetch(outcome: &'static str) {
    counter!(names::FETCHES_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_session(outcome: &'static str) {
    counter!(names::SESSIONS_TOTAL, "outcome" => outcome).increment(1);
}
