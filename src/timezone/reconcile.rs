//! Timezone drift reconciliation
//!
//! Every history row's date depends on the zone that was active when it was
//! written, so a zone change can only be corrected by regenerating the whole
//! read side.

use tokio::sync::watch;

use crate::replay::{ReplayError, ReplayService, ReplaySummary};

/// System metadata key holding the zone the read side was built under
pub const TIMEZONE_KEY: &str = "timezone";

/// What `reconcile_timezone` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Recorded zone matches the configured one
    Unchanged,
    /// Read side cleared and the zone recorded; there was nothing to replay
    Recorded { previous: Option<String> },
    /// Read side cleared and regenerated from the event log
    Rebuilt {
        previous: Option<String>,
        summary: ReplaySummary,
    },
}

/// Compare the replay service's zone with the recorded one and rebuild on
/// drift
///
/// A missing record counts as drift. The new zone is only recorded once the
/// read side reflects it; a cancelled rebuild leaves the old record in place so
/// the next start tries again.
pub async fn reconcile_timezone(
    replay: &ReplayService,
    cancel: &watch::Receiver<bool>,
) -> Result<Reconciliation, ReplayError> {
    let metadata = &replay.read_model().metadata;
    let configured = replay.day_boundary().zone().identifier();
    let previous = metadata.get(TIMEZONE_KEY).await?;

    if previous.as_deref() == Some(configured.as_str()) {
        tracing::debug!(timezone = %configured, "Timezone unchanged");
        return Ok(Reconciliation::Unchanged);
    }

    tracing::warn!(
        previous = previous.as_deref().unwrap_or("<none>"),
        configured = %configured,
        "Timezone drift detected, regenerating read model"
    );

    if !replay.has_events().await? {
        replay.read_model().clear().await?;
        metadata.set(TIMEZONE_KEY, &configured).await?;
        tracing::info!(timezone = %configured, "Event log empty, timezone recorded");
        return Ok(Reconciliation::Recorded { previous });
    }

    let summary = replay.rebuild(cancel).await?;
    if summary.cancelled {
        tracing::warn!(
            timezone = %configured,
            "Rebuild cancelled, timezone left unrecorded"
        );
    } else {
        metadata.set(TIMEZONE_KEY, &configured).await?;
        tracing::info!(
            timezone = %configured,
            published = summary.published,
            skipped = summary.skipped,
            "Read model rebuilt under new timezone"
        );
    }

    Ok(Reconciliation::Rebuilt { previous, summary })
}
