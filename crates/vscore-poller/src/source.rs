//! Where job status observations come from.

use std::sync::Arc;

use async_trait::async_trait;

use vscore_client::{ApiClient, ClientError};
use vscore_models::{AnalysisJob, SequenceId};

/// A single read of current job state.
#[async_trait]
pub trait JobStatusSource: Send + Sync {
    /// Perform one network read. Errors are not terminal for the poller.
    async fn fetch_once(&self, id: &SequenceId) -> Result<AnalysisJob, ClientError>;
}

#[async_trait]
impl JobStatusSource for ApiClient {
    async fn fetch_once(&self, id: &SequenceId) -> Result<AnalysisJob, ClientError> {
        self.get_job_status(id).await
    }
}

#[async_trait]
impl<T: JobStatusSource + ?Sized> JobStatusSource for Arc<T> {
    async fn fetch_once(&self, id: &SequenceId) -> Result<AnalysisJob, ClientError> {
        (**self).fetch_once(id).await
    }
}
