use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use refetch::{Cancellation, Downloader, HttpClient, LocalFile, Outcome, Target, retry_delay};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

#[tokio::main]
async fn main() -> Result<()> {
    let app = cli::App::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(app.level().into())
                .from_env_lossy(),
        )
        .try_init()
        .context("failed to install the tracing subscriber")?;

    let url = app.resolve_url()?;
    let client = app
        .client_setting()
        .build()
        .context("failed to build the HTTP client")?;
    let target = LocalFile::with_options(&app.dest, app.local_options());

    if app.restart && target.discard_record().await? {
        info!(dest = %target, "discarded leftover partial download");
    }

    let token = CancellationToken::new();
    let mut cancel = Cancellation::new().token(token.clone());
    if let Some(deadline) = app.deadline {
        cancel = cancel.deadline(Instant::now() + deadline);
    }

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, keeping the partial download for the next run");
            token.cancel();
        }
    });

    let span = info_span!("download", url = %url, dest = %target);
    let downloader = Downloader::new(client, url.as_str(), target)
        .cancellation(cancel.clone())
        .with_span(span);
    let outcome = serve_with_retries(&downloader, &cancel, app.retries, app.retry_backoff())
        .await
        .with_context(|| format!("failed to download {url} to {}", app.dest.display()))?;

    info!(%outcome, "download finished");
    if !app.quiet {
        println!("{}: {outcome}", app.dest.display());
    }

    Ok(())
}

/// Calls `serve` until it succeeds, fails for good, or `retries` further
/// attempts are used up. Every attempt resumes from the transfer record the
/// previous one left behind.
async fn serve_with_retries<C, T>(
    downloader: &Downloader<C, T>,
    cancel: &Cancellation,
    retries: u32,
    backoff: Duration,
) -> refetch::Result<Outcome>
where
    C: HttpClient,
    T: Target,
{
    let mut attempt = 0;
    loop {
        match downloader.serve().await {
            Ok(outcome) => return Ok(outcome),
            Err(e) if attempt < retries && e.is_retryable() && !cancel.is_cancelled() => {
                let delay = retry_delay(attempt, backoff);
                warn!(error = %e, attempt = attempt + 1, ?delay, "download failed, retrying");

                cancel
                    .run(async {
                        tokio::time::sleep(delay).await;
                        Ok::<_, refetch::Error>(())
                    })
                    .await?;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
