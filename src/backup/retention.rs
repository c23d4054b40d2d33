use chrono::{DateTime, Duration, Utc};
use log::{info, warn};

use crate::errors::Result;
use crate::storage::{Destination, ObjectStore, RemoteObject};

/// Which remote backups survive rotation. The two rules are independent:
/// an object is deleted when either rule marks it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Keep at most this many of the most recent objects.
    pub retain_count: Option<usize>,
    /// Delete objects last modified before `now - max_age`.
    pub max_age: Option<Duration>,
}

impl RetentionPolicy {
    pub fn is_noop(&self) -> bool {
        self.retain_count.is_none() && self.max_age.is_none()
    }
}

/// Counts from one rotation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RotationSummary {
    pub listed: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// Objects `policy` marks for deletion, oldest first.
pub fn plan_deletions(
    objects: &[RemoteObject],
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
) -> Vec<RemoteObject> {
    let mut sorted = objects.to_vec();
    sorted.sort_by(|a, b| {
        a.last_modified
            .cmp(&b.last_modified)
            .then_with(|| a.key.cmp(&b.key))
    });

    let over_count = match policy.retain_count {
        Some(keep) => sorted.len().saturating_sub(keep),
        None => 0,
    };
    let cutoff = policy.max_age.and_then(|age| now.checked_sub_signed(age));

    sorted
        .into_iter()
        .enumerate()
        .filter(|(index, object)| {
            let beyond_count = *index < over_count;
            let expired = cutoff.is_some_and(|cutoff| object.last_modified < cutoff);
            beyond_count || expired
        })
        .map(|(_, object)| object)
        .collect()
}

/// Applies `policy` to everything under `destination`, not only to objects
/// written by this job. Individual delete failures are logged and counted;
/// only a failed listing is returned as an error.
pub async fn rotate(
    store: &dyn ObjectStore,
    destination: &Destination,
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
) -> Result<RotationSummary> {
    if policy.is_noop() {
        info!("No retention policy configured, skipping rotation");
        return Ok(RotationSummary::default());
    }

    info!("🔄 Rotating backups under {destination}");
    let objects = store.list(&destination.bucket, &destination.prefix).await?;
    let mut summary = RotationSummary {
        listed: objects.len(),
        ..RotationSummary::default()
    };
    if objects.is_empty() {
        info!("Nothing to rotate under {destination}");
        return Ok(summary);
    }

    for object in plan_deletions(&objects, policy, now) {
        match store.delete(&destination.bucket, &object.key).await {
            Ok(()) => {
                info!("🗑 Deleted {} (last modified {})", object.key, object.last_modified);
                summary.deleted += 1;
            }
            Err(e) => {
                warn!("⚠️ {e}");
                summary.failed += 1;
            }
        }
    }

    info!(
        "✓ Rotation finished: {} listed, {} deleted, {} failed",
        summary.listed, summary.deleted, summary.failed
    );
    Ok(summary)
}
