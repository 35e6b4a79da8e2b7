use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::db::Store;
use crate::models::{Gig, GigStatus, PublishSchedule};

fn due_at(gig: &Gig) -> Option<DateTime<Utc>> {
    gig.metadata.publish.as_ref().and_then(|p| p.publish_at)
}

/// Promotes one fetched gig if its scheduled publish instant has elapsed.
/// The update is conditional on the row still being draft, so a concurrent
/// promotion leaves exactly one winner; the loser refreshes its copy.
pub fn promote_if_due(store: &Store, gig: &mut Gig, now: DateTime<Utc>) -> Result<bool> {
    if gig.status != GigStatus::Draft {
        return Ok(false);
    }
    let Some(due) = due_at(gig) else {
        return Ok(false);
    };
    if due > now {
        return Ok(false);
    }

    let mut metadata = gig.metadata.clone();
    metadata.publish = Some(PublishSchedule::immediate(now));
    let promoted = store.promote_draft(&gig.id, &metadata, now)?;
    if promoted {
        gig.status = GigStatus::Published;
        gig.metadata = metadata;
        gig.updated_at = now;
    } else if let Some(fresh) = store.get_gig(&gig.id)? {
        // Someone else already flipped it; serve their result.
        *gig = fresh;
    }
    Ok(promoted)
}

/// Full-store catch-up pass over every draft gig, for hosts that run a
/// periodic sweep on top of the read-triggered path. One gig failing never
/// stops the rest; the sweep only errors when nothing could be promoted.
pub fn sweep(store: &Store, now: DateTime<Utc>) -> Result<usize> {
    let mut promoted = 0;
    let mut errors: Vec<(String, anyhow::Error)> = Vec::new();

    for mut gig in store.list_draft_gigs()? {
        match promote_if_due(store, &mut gig, now) {
            Ok(true) => promoted += 1,
            Ok(false) => {}
            Err(err) => {
                tracing::warn!("publish promotion failed for gig {}: {err}", gig.id);
                errors.push((gig.id.clone(), err));
            }
        }
    }

    if promoted == 0 && !errors.is_empty() {
        let joined = errors
            .into_iter()
            .map(|(id, err)| format!("{id}: {err}"))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(anyhow::anyhow!("publish sweep failed: {joined}"));
    }

    Ok(promoted)
}
