//! Periodic hygiene sweep for account tokens.
//!
//! Deletes used and expired reset/verification rows and prunes the session
//! denylist. None of the token state machines depend on it running.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::auth::denylist::SessionDenylist;
use crate::store::AuthStore;

/// Default spacing between sweeps.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Counts from one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub reset_tokens: u64,
    pub verification_tokens: u64,
    pub revoked_sessions: usize,
}

/// Run one sweep. Store failures are logged and counted as zero.
pub async fn sweep_once(store: &dyn AuthStore, denylist: &SessionDenylist) -> SweepReport {
    let reset_tokens = store.cleanup_expired().await.unwrap_or_else(|e| {
        warn!(error = %e, "reset token cleanup failed");
        0
    });
    let verification_tokens = store
        .cleanup_expired_verifications()
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "verification token cleanup failed");
            0
        });
    let revoked_sessions = denylist.cleanup_expired();
    let report = SweepReport {
        reset_tokens,
        verification_tokens,
        revoked_sessions,
    };
    debug!(?report, "token sweep finished");
    report
}

/// Spawn the sweep loop; it stops when `cancel` fires.
pub fn spawn_sweeper(
    store: Arc<dyn AuthStore>,
    denylist: Arc<SessionDenylist>,
    every: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    sweep_once(store.as_ref(), &denylist).await;
                }
            }
        }
    })
}
