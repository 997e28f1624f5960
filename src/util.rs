use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Builds the HTTP client shared by every request of a run
///
/// # Errors
/// Errors when the TLS backend cannot be initialized
pub fn init_http_client(connect_timeout: Duration) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&format!(
            "{}/{}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
        ))
        .context("Building User-Agent header")?,
    );

    reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(connect_timeout)
        .build()
        .context("Unable to build HTTP client")
}

/// Spawn a task that watches for CTRL + C signal and cancels a [`CancellationToken`] when caught
pub fn spawn_ct_watcher(ct: CancellationToken) {
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Caught CTRL+C signal!");
        ct.cancel();
    });
}

/// Pauses between two downloads so the portal isn't hammered
///
/// Returns `false` if the break was cut short by cancellation
pub async fn take_break(duration: Duration, ct: &CancellationToken) -> bool {
    let banner = "#".repeat(50);
    info!("{banner}");
    info!("Taking a break...");

    let completed = tokio::select! {
        () = ct.cancelled() => false,
        () = tokio::time::sleep(duration) => true,
    };

    if completed {
        info!("Break over");
    }
    info!("{banner}");

    completed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn break_runs_to_completion() {
        let ct = CancellationToken::new();
        assert!(take_break(Duration::from_millis(5), &ct).await);
    }

    #[tokio::test]
    async fn break_is_cut_short_when_cancelled() {
        let ct = CancellationToken::new();
        ct.cancel();
        assert!(!take_break(Duration::from_secs(60), &ct).await);
    }

    #[test]
    fn client_builds() {
        assert!(init_http_client(Duration::from_secs(1)).is_ok());
    }
}
