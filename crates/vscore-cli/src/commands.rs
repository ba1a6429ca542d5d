//! Subcommand implementations.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info};

use vscore_client::{ApiClient, ClientConfig, UrlResolver};
use vscore_models::{AnalysisJob, ImportLinkRequest, SequenceId, SubmitScriptRequest};
use vscore_poller::{DisplayState, JobStatusPoller, PollOutcome, PollerConfig};

/// Exit code when the backend reports the analysis as failed.
const EXIT_ANALYSIS_FAILED: u8 = 2;
/// Conventional exit code for SIGINT.
const EXIT_CANCELLED: u8 = 130;

pub async fn watch(sequence_id: String, interval_secs: Option<u64>, json: bool) -> Result<ExitCode> {
    let client = ApiClient::from_env().context("Failed to create API client")?;
    watch_job(client, SequenceId::from_string(sequence_id), interval_secs, json).await
}

pub async fn submit_script(
    file: Option<PathBuf>,
    text: Option<String>,
    title: Option<String>,
    watch: bool,
) -> Result<ExitCode> {
    let script = match (file, text) {
        (Some(path), _) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read script from {}", path.display()))?,
        (None, Some(text)) => text,
        (None, None) => anyhow::bail!("Provide --file or --text"),
    };

    let mut request = SubmitScriptRequest::new(script);
    if let Some(title) = title {
        request = request.with_title(title);
    }

    let client = ApiClient::from_env().context("Failed to create API client")?;
    let job = client
        .submit_script(&request)
        .await
        .context("Script submission failed")?;

    after_submit(client, job, watch).await
}

pub async fn import_link(url: String, resolve: bool, watch: bool) -> Result<ExitCode> {
    let client = ApiClient::from_env().context("Failed to create API client")?;

    let url = if resolve {
        let resolver = UrlResolver::from_env(client.config().request_timeout)?;
        let resolved = resolver.resolve(&url).await?;
        info!(original = %url, %resolved, "Using resolved link");
        resolved
    } else {
        url
    };

    let job = client
        .import_link(&ImportLinkRequest::new(url))
        .await
        .context("Link import failed")?;

    after_submit(client, job, watch).await
}

pub async fn resolve(url: String) -> Result<ExitCode> {
    let timeout = ClientConfig::from_env()?.request_timeout;
    let resolver = UrlResolver::from_env(timeout)?;
    debug!(providers = ?resolver.provider_names(), "Resolving link");
    println!("{}", resolver.resolve(&url).await?);
    Ok(ExitCode::SUCCESS)
}

async fn after_submit(client: ApiClient, job: AnalysisJob, watch: bool) -> Result<ExitCode> {
    println!("Submitted analysis #{} ({})", job.sequence_id, job.status);

    if !watch {
        return Ok(ExitCode::SUCCESS);
    }
    watch_job(client, job.sequence_id, None, false).await
}

async fn watch_job(
    client: ApiClient,
    sequence_id: SequenceId,
    interval_secs: Option<u64>,
    json: bool,
) -> Result<ExitCode> {
    let mut config = PollerConfig::from_env();
    if let Some(secs) = interval_secs.filter(|&s| s > 0) {
        config = config.with_interval(Duration::from_secs(secs));
    }

    let poller = JobStatusPoller::new(Arc::new(client), config);
    let handle = poller.spawn(sequence_id, move |event| {
        print_state(&DisplayState::from_event(&event), json);
    });

    let on_interrupt = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received interrupt, stopping");
            on_interrupt.cancel();
        }
    });

    let summary = handle.join().await;

    if matches!(summary.outcome, PollOutcome::Cancelled) {
        print_state(&DisplayState::Cancelled, json);
    }

    Ok(match summary.outcome {
        PollOutcome::Completed(_) => ExitCode::SUCCESS,
        PollOutcome::Failed(_) => ExitCode::from(EXIT_ANALYSIS_FAILED),
        PollOutcome::Cancelled => ExitCode::from(EXIT_CANCELLED),
    })
}

fn print_state(state: &DisplayState, json: bool) {
    if json {
        match serde_json::to_string(state) {
            Ok(line) => println!("{}", line),
            Err(e) => eprintln!("error: failed to encode state: {}", e),
        }
    } else {
        println!("{}", state);
    }
}
