use std::time::Duration;

use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Ends the session on Ctrl-C, or once `limit` elapses when one is given.
pub async fn detect_shutdown(cancelation: CancellationToken, limit: Option<Duration>) {
    let limit = async {
        match limit {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending().await,
        }
    };

    select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received interrupt, stopping session");
            cancelation.cancel();
        },
        _ = limit => {
            info!("Session time limit reached");
            cancelation.cancel();
        },
        // Someone else stopped the session.
        _ = cancelation.cancelled() => (),
    };
}
