pub mod db;
pub mod lifecycle;
pub mod models;
pub mod normalize;
pub mod reconcile;
pub mod scheduler;
mod utils;
pub mod venues;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::lifecycle::{ActionError, BookingAction, Planned};
use crate::models::{
    Booking, BookingCounts, BookingStatus, Gig, GigKind, GigMetadata, GigQuery, GigStatus,
    PublishMode, PublishSchedule,
};
use crate::normalize::{clean_text, ValidationError};
use crate::reconcile::{ArtistTile, PublicDisplay};
use crate::venues::VenueInput;

pub use crate::db::Store;
pub use crate::models::ViewFilter;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("storage failure: {0}")]
    Store(#[from] rusqlite::Error),
}

impl From<ActionError> for EngineError {
    fn from(err: ActionError) -> Self {
        match err {
            ActionError::NotAllowed(message) => EngineError::Unauthorized(message.to_string()),
            ActionError::InvalidState(message) => EngineError::Conflict(message.to_string()),
            ActionError::MissingGig => EngineError::NotFound("gig"),
        }
    }
}

/// Raw gig fields as the host application collects them. Everything is
/// optional so the same shape serves create (required fields checked there)
/// and edit (absent fields left untouched).
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(default)]
pub struct GigDraft {
    pub title: Option<String>,
    pub description: Option<String>,
    pub event_type: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub timezone: Option<String>,
    /// The performing artist; defaults to the caller. A different id means
    /// the caller is inviting that artist, which leaves the booking pending.
    pub artist_id: Option<String>,
    pub venue: Option<VenueInput>,
    pub live_stream_url: Option<String>,
    pub ticket_url: Option<String>,
    pub artwork_url: Option<String>,
    pub ticket_summary: Option<String>,
    pub entry_requirements: Option<String>,
    pub doors_open: Option<String>,
    pub set_start: Option<String>,
    pub set_end: Option<String>,
    pub fee: Option<f64>,
    pub currency: Option<String>,
    pub special_request: Option<String>,
    pub age_mode: Option<String>,
    pub age_selections: Vec<String>,
    pub ticket_mode: Option<String>,
    pub ticket_custom_count: Option<u32>,
    pub publish_mode: Option<String>,
    pub publish_date: Option<String>,
    pub publish_time: Option<String>,
    pub other_performers: Option<Vec<String>>,
}

#[derive(Serialize, Clone, Debug)]
pub struct CreateResult {
    pub gig_id: String,
    pub booking_id: String,
    pub gig_status: GigStatus,
    pub booking_status: BookingStatus,
    pub venue_id: Option<String>,
}

#[derive(Serialize, Clone, Debug)]
pub struct GigCard {
    pub booking: Booking,
    pub gig: Gig,
    pub display: PublicDisplay,
    pub tile: ArtistTile,
}

#[derive(Serialize, Clone, Debug)]
pub struct GigList {
    pub cards: Vec<GigCard>,
    pub counts: BookingCounts,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

/// Lists the caller's bookings with their reconciled gig projections. Due
/// draft gigs on the fetched page are promoted first; a promotion failure is
/// logged and the gig served as-is, to be retried on the next read.
pub fn list_gigs(
    store: &Store,
    caller: &str,
    query: &GigQuery,
    now: DateTime<Utc>,
) -> Result<GigList, EngineError> {
    let rows = store.list_bookings(caller, query)?;
    let mut cards = Vec::with_capacity(rows.len());
    for (booking, mut gig) in rows {
        if let Err(err) = scheduler::promote_if_due(store, &mut gig, now) {
            tracing::warn!("publish promotion failed for gig {}: {err}", gig.id);
        }
        let venue = match &gig.venue_id {
            Some(id) => store.get_venue(id)?,
            None => None,
        };
        let display = reconcile::reconcile(&booking, &gig, venue.as_ref());
        let tile = reconcile::artist_tile(&gig, &display);
        cards.push(GigCard {
            booking,
            gig,
            display,
            tile,
        });
    }

    Ok(GigList {
        cards,
        counts: store.booking_counts(caller)?,
        total: store.count_bookings(caller, query)?,
        limit: query.limit,
        offset: query.offset,
    })
}

/// Creates a gig and its booking in one shot. Self-booked gigs confirm
/// immediately; booking on behalf of another artist leaves the booking
/// pending for them to accept. The gig goes out published unless a future
/// publish instant was scheduled.
pub fn create_gig(
    store: &Store,
    caller: &str,
    draft: &GigDraft,
    now: DateTime<Utc>,
) -> Result<CreateResult, EngineError> {
    let title = required_text(draft.title.as_deref(), "title")?;
    let event_type = normalize::normalize_event_type(
        draft
            .event_type
            .as_deref()
            .ok_or(ValidationError::MissingField("event type"))?,
    )?;
    let starts_at = draft
        .starts_at
        .ok_or(ValidationError::MissingField("start time"))?;
    let tz = normalize::normalize_timezone(
        draft
            .timezone
            .as_deref()
            .ok_or(ValidationError::MissingField("timezone"))?,
    )?;
    normalize::validate_time_range(starts_at, draft.ends_at, tz)?;

    let fee = draft.fee.map(normalize::normalize_fee).transpose()?;
    let currency = draft
        .currency
        .as_deref()
        .map(normalize::normalize_currency)
        .transpose()?;

    let mut metadata = build_metadata(draft, tz, now)?;
    metadata.agreed_date = Some(starts_at.with_timezone(&tz).date_naive());

    let venue_id = match &draft.venue {
        Some(input) if !input.name.trim().is_empty() => {
            Some(venues::resolve_venue(store, caller, input, now)?)
        }
        _ => None,
    };

    let publish = metadata.publish.clone().unwrap_or_else(|| {
        // No schedule supplied means publish right away.
        PublishSchedule::immediate(now)
    });
    let gig_status = match publish.mode {
        PublishMode::Immediate => GigStatus::Published,
        PublishMode::Scheduled => GigStatus::Draft,
    };
    metadata.publish = Some(publish);

    let artist_id = draft.artist_id.as_deref().unwrap_or(caller);
    let booking_status = if artist_id == caller {
        BookingStatus::Confirmed
    } else {
        BookingStatus::Pending
    };

    let gig = Gig {
        id: Uuid::new_v4().to_string(),
        title,
        description: optional_text(&draft.description),
        event_type,
        status: gig_status,
        starts_at,
        ends_at: draft.ends_at,
        timezone: tz.name().to_string(),
        venue_id: venue_id.clone(),
        metadata,
        created_at: now,
        updated_at: now,
    };
    let booking = Booking {
        id: Uuid::new_v4().to_string(),
        gig_id: gig.id.clone(),
        artist_id: artist_id.to_string(),
        venue_id: venue_id.clone(),
        status: booking_status,
        fee,
        currency,
        special_request: optional_text(&draft.special_request),
        booked_by: caller.to_string(),
        booked_at: now,
        confirmed_at: (booking_status == BookingStatus::Confirmed).then_some(now),
        cancelled_at: None,
        cancellation_reason: None,
    };

    store.insert_gig(&gig)?;
    store.insert_booking(&booking)?;
    tracing::debug!("created gig {} with booking {}", gig.id, booking.id);

    Ok(CreateResult {
        gig_id: gig.id,
        booking_id: booking.id,
        gig_status,
        booking_status,
        venue_id,
    })
}

/// Merges the supplied fields into an existing gig. Only the booking's
/// initiator may edit, and not once the booking is cancelled or completed.
pub fn edit_gig(
    store: &Store,
    caller: &str,
    gig_id: &str,
    draft: &GigDraft,
    now: DateTime<Utc>,
) -> Result<Gig, EngineError> {
    let mut gig = store.get_gig(gig_id)?.ok_or(EngineError::NotFound("gig"))?;
    let booking = store
        .get_booking_for_gig(gig_id)?
        .ok_or(EngineError::NotFound("booking"))?;
    if booking.booked_by != caller {
        return Err(EngineError::Unauthorized(
            "only the booking initiator can edit this gig".to_string(),
        ));
    }
    if matches!(
        booking.status,
        BookingStatus::Cancelled | BookingStatus::Completed
    ) {
        return Err(EngineError::Conflict(
            "cancelled and completed bookings can no longer be edited".to_string(),
        ));
    }

    if draft.title.is_some() {
        gig.title = required_text(draft.title.as_deref(), "title")?;
    }
    if draft.description.is_some() {
        gig.description = optional_text(&draft.description);
    }
    if let Some(raw) = draft.event_type.as_deref() {
        gig.event_type = normalize::normalize_event_type(raw)?;
    }
    if let Some(raw) = draft.timezone.as_deref() {
        gig.timezone = normalize::normalize_timezone(raw)?.name().to_string();
    }
    let tz = gig
        .timezone
        .parse::<Tz>()
        .map_err(|_| ValidationError::InvalidTimezone(gig.timezone.clone()))?;
    if let Some(starts_at) = draft.starts_at {
        gig.starts_at = starts_at;
        gig.metadata.agreed_date = Some(starts_at.with_timezone(&tz).date_naive());
    }
    if draft.ends_at.is_some() {
        gig.ends_at = draft.ends_at;
    }
    normalize::validate_time_range(gig.starts_at, gig.ends_at, tz)?;

    merge_metadata(&mut gig.metadata, draft)?;

    if let Some(input) = &draft.venue {
        if !input.name.trim().is_empty() {
            let venue_id = venues::resolve_venue(store, caller, input, now)?;
            gig.venue_id = Some(venue_id);
            gig.metadata.kind = Some(GigKind::InPerson);
        }
    }

    let mut publish_immediately = false;
    if let Some(mode) = draft.publish_mode.as_deref() {
        if gig.status != GigStatus::Draft {
            return Err(EngineError::Conflict(
                "the gig is already published and cannot be rescheduled".to_string(),
            ));
        }
        let publish = normalize::resolve_publish_schedule(
            mode,
            draft.publish_date.as_deref(),
            draft.publish_time.as_deref(),
            tz,
            now,
        )?;
        publish_immediately = publish.mode == PublishMode::Immediate;
        gig.metadata.publish = Some(publish);
    }

    gig.updated_at = now;
    store.update_gig(&gig)?;
    // Status moves only through the conditional draft flip, never the
    // general update.
    if publish_immediately && store.promote_draft(&gig.id, &gig.metadata, now)? {
        gig.status = GigStatus::Published;
    }

    let fee = draft.fee.map(normalize::normalize_fee).transpose()?;
    let currency = draft
        .currency
        .as_deref()
        .map(normalize::normalize_currency)
        .transpose()?;
    if fee.is_some() || currency.is_some() || draft.special_request.is_some() {
        store.update_booking_terms(
            &booking.id,
            fee,
            currency.as_deref(),
            optional_text(&draft.special_request).as_deref(),
        )?;
    }

    Ok(gig)
}

/// Applies one lifecycle action to the caller's booking. The guards run
/// against a snapshot, then the write is conditional on the status that
/// snapshot saw; a lost race surfaces as a conflict for the caller to retry.
pub fn act_on_booking(
    store: &Store,
    caller: &str,
    booking_id: &str,
    action: &str,
    now: DateTime<Utc>,
) -> Result<Booking, EngineError> {
    let action = BookingAction::parse(action.trim())
        .ok_or_else(|| ValidationError::UnknownAction(action.trim().to_string()))?;
    let booking = store
        .get_booking(booking_id)?
        .ok_or(EngineError::NotFound("booking"))?;
    if caller != booking.artist_id && caller != booking.booked_by {
        return Err(EngineError::Unauthorized(
            "this booking belongs to another artist".to_string(),
        ));
    }
    let gig = store.get_gig(&booking.gig_id)?;

    match lifecycle::plan(action, &booking, gig.as_ref(), caller, now)? {
        Planned::Transition(change) => {
            let applied = store.apply_booking_change(&booking.id, booking.status, &change)?;
            if !applied {
                return Err(EngineError::Conflict(
                    "the booking changed before this action was applied".to_string(),
                ));
            }
        }
        Planned::PublishGig => {
            let mut gig = gig.ok_or(EngineError::NotFound("gig"))?;
            gig.metadata.publish = Some(PublishSchedule::immediate(now));
            store.force_publish(&gig.id, &gig.metadata, now)?;
        }
    }

    store
        .get_booking(booking_id)?
        .ok_or(EngineError::NotFound("booking"))
}

fn build_metadata(draft: &GigDraft, tz: Tz, now: DateTime<Utc>) -> Result<GigMetadata, EngineError> {
    let mut metadata = GigMetadata::default();
    merge_metadata(&mut metadata, draft)?;
    if let Some(mode) = draft.publish_mode.as_deref() {
        metadata.publish = Some(normalize::resolve_publish_schedule(
            mode,
            draft.publish_date.as_deref(),
            draft.publish_time.as_deref(),
            tz,
            now,
        )?);
    }
    Ok(metadata)
}

/// The metadata fields shared verbatim between create and edit. Publish
/// scheduling is handled by the callers, which differ on when a change is
/// allowed.
fn merge_metadata(metadata: &mut GigMetadata, draft: &GigDraft) -> Result<(), EngineError> {
    if let Some(raw) = draft.live_stream_url.as_deref() {
        metadata.live_stream_url = Some(normalize::normalize_url(raw)?);
        metadata.kind = Some(GigKind::Streaming);
    }
    if let Some(raw) = draft.ticket_url.as_deref() {
        metadata.ticket_url = Some(normalize::normalize_url(raw)?);
    }
    if let Some(raw) = draft.artwork_url.as_deref() {
        metadata.artwork_url = Some(normalize::normalize_url(raw)?);
    }
    if draft.ticket_summary.is_some() {
        metadata.ticket_summary = optional_text(&draft.ticket_summary);
    }
    if draft.entry_requirements.is_some() {
        metadata.entry_requirements = optional_text(&draft.entry_requirements);
    }
    if draft.doors_open.is_some() {
        metadata.doors_open = optional_text(&draft.doors_open);
    }
    if draft.set_start.is_some() {
        metadata.set_start = optional_text(&draft.set_start);
    }
    if draft.set_end.is_some() {
        metadata.set_end = optional_text(&draft.set_end);
    }
    if let Some(input) = &draft.venue {
        if !input.name.trim().is_empty() {
            metadata.kind = Some(GigKind::InPerson);
            metadata.venue_name = Some(clean_text(&input.name));
            let address: Vec<String> = [&input.address_line1, &input.city, &input.country]
                .into_iter()
                .filter_map(|part| part.as_deref().map(clean_text))
                .filter(|part| !part.is_empty())
                .collect();
            if !address.is_empty() {
                metadata.venue_address = Some(address.join(", "));
            }
        }
    }
    if metadata.kind.is_none() {
        metadata.kind = Some(GigKind::InPerson);
    }
    if let Some(mode) = draft.age_mode.as_deref() {
        metadata.age_restriction = Some(normalize::resolve_age_restriction(
            mode,
            &draft.age_selections,
        )?);
    }
    if let Some(mode) = draft.ticket_mode.as_deref() {
        metadata.tickets = Some(normalize::resolve_ticket_availability(
            mode,
            draft.ticket_custom_count,
        )?);
    }
    if let Some(performers) = &draft.other_performers {
        metadata.other_performers = performers
            .iter()
            .map(|name| clean_text(name))
            .filter(|name| !name.is_empty())
            .collect();
    }
    Ok(())
}

fn required_text(value: Option<&str>, field: &'static str) -> Result<String, ValidationError> {
    let cleaned = value.map(clean_text).unwrap_or_default();
    if cleaned.is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(cleaned)
    }
}

fn optional_text(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(clean_text)
        .filter(|cleaned| !cleaned.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0)
            .single()
            .expect("valid utc")
    }

    fn now() -> DateTime<Utc> {
        utc(2025, 7, 1, 12, 0)
    }

    fn draft(title: &str) -> GigDraft {
        GigDraft {
            title: Some(title.to_string()),
            event_type: Some("concert".to_string()),
            starts_at: Some(utc(2025, 7, 15, 19, 0)),
            timezone: Some("UTC".to_string()),
            ..GigDraft::default()
        }
    }

    fn cavern() -> VenueInput {
        VenueInput {
            name: "The Cavern".to_string(),
            address_line1: Some("10 Mathew Street".to_string()),
            city: Some("Liverpool".to_string()),
            country: None,
        }
    }

    #[test]
    fn creating_an_in_person_gig_resolves_the_venue_and_publishes() {
        let store = Store::open_in_memory().expect("open store");
        let mut d = draft("Cavern Night");
        d.venue = Some(cavern());

        let result = create_gig(&store, "artist-1", &d, now()).expect("create");
        assert_eq!(result.booking_status, BookingStatus::Confirmed);
        assert_eq!(result.gig_status, GigStatus::Published);
        let venue_id = result.venue_id.expect("venue created");

        let mut second = draft("Cavern Encore");
        second.venue = Some(VenueInput {
            name: "THE CAVERN".to_string(),
            ..VenueInput::default()
        });
        let again = create_gig(&store, "artist-1", &second, now()).expect("create again");
        // Same owner and name, different case: the venue row is reused.
        assert_eq!(again.venue_id.as_deref(), Some(venue_id.as_str()));

        let gig = store
            .get_gig(&result.gig_id)
            .expect("query")
            .expect("found");
        assert_eq!(gig.metadata.kind, Some(GigKind::InPerson));
        assert_eq!(gig.metadata.venue_name.as_deref(), Some("The Cavern"));
        let publish = gig.metadata.publish.expect("publish block");
        assert_eq!(publish.mode, PublishMode::Immediate);
        assert_eq!(publish.published_at, Some(now()));
    }

    #[test]
    fn missing_required_fields_are_validation_errors() {
        let store = Store::open_in_memory().expect("open store");
        let mut d = draft("No Start");
        d.starts_at = None;
        let err = create_gig(&store, "artist-1", &d, now()).expect_err("rejected");
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::MissingField("start time"))
        ));

        let mut blank = draft("   ");
        blank.title = Some("   ".to_string());
        let err = create_gig(&store, "artist-1", &blank, now()).expect_err("rejected");
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::MissingField("title"))
        ));
    }

    #[test]
    fn cross_day_gigs_are_rejected_at_create() {
        let store = Store::open_in_memory().expect("open store");
        let mut d = draft("Late One");
        d.starts_at = Some(utc(2025, 7, 15, 23, 0));
        d.ends_at = Some(utc(2025, 7, 16, 1, 0));
        let err = create_gig(&store, "artist-1", &d, now()).expect_err("rejected");
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::CrossDayNotAllowed)
        ));
    }

    #[test]
    fn fees_are_normalized_on_the_way_in() {
        let store = Store::open_in_memory().expect("open store");
        let mut d = draft("Paid Show");
        d.fee = Some(19.999);
        d.currency = Some("gbp".to_string());
        let result = create_gig(&store, "artist-1", &d, now()).expect("create");
        let booking = store
            .get_booking(&result.booking_id)
            .expect("query")
            .expect("found");
        assert_eq!(booking.fee, Some(20.0));
        assert_eq!(booking.currency.as_deref(), Some("GBP"));

        let mut negative = draft("Free Show");
        negative.fee = Some(-1.0);
        assert!(matches!(
            create_gig(&store, "artist-1", &negative, now()),
            Err(EngineError::Validation(ValidationError::InvalidFee(_)))
        ));
    }

    #[test]
    fn a_streaming_gig_requires_a_well_formed_url() {
        let store = Store::open_in_memory().expect("open store");
        let mut d = draft("Live Stream");
        d.event_type = Some("livestream".to_string());
        d.live_stream_url = Some("https://stream.example.com/live".to_string());
        let result = create_gig(&store, "artist-1", &d, now()).expect("create");
        let gig = store
            .get_gig(&result.gig_id)
            .expect("query")
            .expect("found");
        assert_eq!(gig.metadata.kind, Some(GigKind::Streaming));

        let mut bad = draft("Broken Stream");
        bad.live_stream_url = Some("ftp://stream.example.com".to_string());
        assert!(matches!(
            create_gig(&store, "artist-1", &bad, now()),
            Err(EngineError::Validation(ValidationError::InvalidUrl(_)))
        ));
    }

    #[test]
    fn a_scheduled_gig_stays_draft_until_a_read_after_the_due_time() {
        let store = Store::open_in_memory().expect("open store");
        let mut d = draft("Scheduled Show");
        d.publish_mode = Some("scheduled".to_string());
        d.publish_date = Some("2025-07-08".to_string());

        let result = create_gig(&store, "artist-1", &d, now()).expect("create");
        assert_eq!(result.gig_status, GigStatus::Draft);

        let before = list_gigs(&store, "artist-1", &GigQuery::default(), now()).expect("list");
        assert_eq!(before.cards[0].gig.status, GigStatus::Draft);

        let after = list_gigs(
            &store,
            "artist-1",
            &GigQuery::default(),
            utc(2025, 7, 9, 8, 0),
        )
        .expect("list after due");
        let gig = &after.cards[0].gig;
        assert_eq!(gig.status, GigStatus::Published);
        let publish = gig.metadata.publish.as_ref().expect("publish block");
        assert_eq!(publish.mode, PublishMode::Immediate);
        assert_eq!(publish.publish_at, None);
    }

    #[test]
    fn an_invited_artist_accepts_and_the_booking_confirms() {
        let store = Store::open_in_memory().expect("open store");
        let mut d = draft("Invite Show");
        d.artist_id = Some("artist-9".to_string());

        let result = create_gig(&store, "venue-owner", &d, now()).expect("create");
        assert_eq!(result.booking_status, BookingStatus::Pending);

        // The inviter cannot accept their own invite.
        assert!(matches!(
            act_on_booking(&store, "venue-owner", &result.booking_id, "accept_invite", now()),
            Err(EngineError::Unauthorized(_))
        ));

        let booking = act_on_booking(&store, "artist-9", &result.booking_id, "accept_invite", now())
            .expect("accept");
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.confirmed_at, Some(now()));

        // Accepting again finds a non-pending booking.
        assert!(matches!(
            act_on_booking(&store, "artist-9", &result.booking_id, "accept_invite", now()),
            Err(EngineError::Conflict(_))
        ));
    }

    #[test]
    fn declining_an_invite_records_the_reason() {
        let store = Store::open_in_memory().expect("open store");
        let mut d = draft("Unwanted Invite");
        d.artist_id = Some("artist-9".to_string());
        let result = create_gig(&store, "venue-owner", &d, now()).expect("create");

        let booking = act_on_booking(&store, "artist-9", &result.booking_id, "decline_invite", now())
            .expect("decline");
        assert_eq!(booking.status, BookingStatus::Cancelled);
        assert_eq!(
            booking.cancellation_reason.as_deref(),
            Some("Declined by artist")
        );
    }

    #[test]
    fn completion_waits_for_the_gig_to_start() {
        let store = Store::open_in_memory().expect("open store");
        let mut d = draft("Completed Show");
        d.starts_at = Some(utc(2025, 7, 2, 20, 0));
        let result = create_gig(&store, "artist-1", &d, now()).expect("create");

        assert!(matches!(
            act_on_booking(&store, "artist-1", &result.booking_id, "mark_completed", now()),
            Err(EngineError::Conflict(_))
        ));

        let booking = act_on_booking(
            &store,
            "artist-1",
            &result.booking_id,
            "mark_completed",
            utc(2025, 7, 3, 9, 0),
        )
        .expect("complete");
        assert_eq!(booking.status, BookingStatus::Completed);
    }

    #[test]
    fn publish_now_overrides_a_future_schedule() {
        let store = Store::open_in_memory().expect("open store");
        let mut d = draft("Early Release");
        d.publish_mode = Some("scheduled".to_string());
        d.publish_date = Some("2025-08-01".to_string());
        let result = create_gig(&store, "artist-1", &d, now()).expect("create");
        assert_eq!(result.gig_status, GigStatus::Draft);

        act_on_booking(&store, "artist-1", &result.booking_id, "publish_now", now())
            .expect("publish now");
        let gig = store
            .get_gig(&result.gig_id)
            .expect("query")
            .expect("found");
        assert_eq!(gig.status, GigStatus::Published);
        let publish = gig.metadata.publish.expect("publish block");
        assert_eq!(publish.mode, PublishMode::Immediate);
        assert_eq!(publish.publish_at, None);
        assert_eq!(publish.published_at, Some(now()));
    }

    #[test]
    fn acting_on_someone_elses_booking_is_unauthorized() {
        let store = Store::open_in_memory().expect("open store");
        let result = create_gig(&store, "artist-1", &draft("Private Show"), now()).expect("create");

        assert!(matches!(
            act_on_booking(&store, "stranger", &result.booking_id, "accept_invite", now()),
            Err(EngineError::Unauthorized(_))
        ));
        assert!(matches!(
            act_on_booking(&store, "artist-1", &result.booking_id, "flag_for_review", now()),
            Err(EngineError::Validation(ValidationError::UnknownAction(_)))
        ));
        assert!(matches!(
            act_on_booking(&store, "artist-1", "no-such-booking", "accept_invite", now()),
            Err(EngineError::NotFound("booking"))
        ));
    }

    #[test]
    fn edits_merge_field_wise_and_are_initiator_only() {
        let store = Store::open_in_memory().expect("open store");
        let mut d = draft("Original Title");
        d.description = Some("Original description".to_string());
        let result = create_gig(&store, "artist-1", &d, now()).expect("create");

        let change = GigDraft {
            title: Some("Revised Title".to_string()),
            ..GigDraft::default()
        };
        assert!(matches!(
            edit_gig(&store, "stranger", &result.gig_id, &change, now()),
            Err(EngineError::Unauthorized(_))
        ));

        let gig = edit_gig(&store, "artist-1", &result.gig_id, &change, now()).expect("edit");
        assert_eq!(gig.title, "Revised Title");
        assert_eq!(gig.description.as_deref(), Some("Original description"));
    }

    #[test]
    fn cancelled_bookings_can_no_longer_be_edited() {
        let store = Store::open_in_memory().expect("open store");
        let mut d = draft("Doomed Show");
        d.artist_id = Some("artist-9".to_string());
        let result = create_gig(&store, "venue-owner", &d, now()).expect("create");
        act_on_booking(&store, "artist-9", &result.booking_id, "decline_invite", now())
            .expect("decline");

        let change = GigDraft {
            title: Some("Too Late".to_string()),
            ..GigDraft::default()
        };
        assert!(matches!(
            edit_gig(&store, "venue-owner", &result.gig_id, &change, now()),
            Err(EngineError::Conflict(_))
        ));
    }

    #[test]
    fn editing_a_draft_to_immediate_mode_publishes_it() {
        let store = Store::open_in_memory().expect("open store");
        let mut d = draft("Waiting Show");
        d.publish_mode = Some("scheduled".to_string());
        d.publish_date = Some("2025-08-01".to_string());
        let result = create_gig(&store, "artist-1", &d, now()).expect("create");
        assert_eq!(result.gig_status, GigStatus::Draft);

        let change = GigDraft {
            publish_mode: Some("immediate".to_string()),
            ..GigDraft::default()
        };
        let gig = edit_gig(&store, "artist-1", &result.gig_id, &change, now()).expect("edit");
        assert_eq!(gig.status, GigStatus::Published);

        let stored = store
            .get_gig(&result.gig_id)
            .expect("query")
            .expect("found");
        assert_eq!(stored.status, GigStatus::Published);
        let publish = stored.metadata.publish.expect("publish block");
        assert_eq!(publish.mode, PublishMode::Immediate);
        assert_eq!(publish.published_at, Some(now()));
    }

    #[test]
    fn a_published_gig_cannot_be_rescheduled() {
        let store = Store::open_in_memory().expect("open store");
        let result = create_gig(&store, "artist-1", &draft("Already Out"), now()).expect("create");
        assert_eq!(result.gig_status, GigStatus::Published);

        let change = GigDraft {
            publish_mode: Some("scheduled".to_string()),
            publish_date: Some("2025-08-01".to_string()),
            ..GigDraft::default()
        };
        assert!(matches!(
            edit_gig(&store, "artist-1", &result.gig_id, &change, now()),
            Err(EngineError::Conflict(_))
        ));
    }

    #[test]
    fn views_slice_the_booking_list_and_counts_summarize_it() {
        let store = Store::open_in_memory().expect("open store");
        create_gig(&store, "artist-1", &draft("Own Show"), now()).expect("self booked");
        let mut second = draft("Second Show");
        second.starts_at = Some(utc(2025, 7, 20, 19, 0));
        create_gig(&store, "artist-1", &second, now()).expect("self booked");
        let mut invite = draft("Invited Show");
        invite.artist_id = Some("artist-1".to_string());
        invite.starts_at = Some(utc(2025, 7, 25, 19, 0));
        create_gig(&store, "venue-owner", &invite, now()).expect("invite");

        let all = list_gigs(&store, "artist-1", &GigQuery::default(), now()).expect("all");
        assert_eq!(all.cards.len(), 3);
        assert_eq!(all.total, 3);
        assert_eq!(all.counts.confirmed, 2);
        assert_eq!(all.counts.pending, 1);
        assert_eq!(all.counts.completed, 0);

        let invites = list_gigs(
            &store,
            "artist-1",
            &GigQuery {
                view: ViewFilter::Invites,
                ..GigQuery::default()
            },
            now(),
        )
        .expect("invites");
        assert_eq!(invites.cards.len(), 1);
        assert_eq!(invites.cards[0].gig.title, "Invited Show");

        let calendar = list_gigs(
            &store,
            "artist-1",
            &GigQuery {
                view: ViewFilter::Calendar,
                ..GigQuery::default()
            },
            now(),
        )
        .expect("calendar");
        assert_eq!(calendar.cards.len(), 2);

        let requests = list_gigs(
            &store,
            "artist-1",
            &GigQuery {
                view: ViewFilter::Requests,
                ..GigQuery::default()
            },
            now(),
        )
        .expect("requests");
        assert!(requests.cards.is_empty());

        let page = list_gigs(
            &store,
            "artist-1",
            &GigQuery {
                limit: 1,
                offset: 1,
                ..GigQuery::default()
            },
            now(),
        )
        .expect("page");
        assert_eq!(page.cards.len(), 1);
        assert_eq!(page.total, 3);
        assert_eq!(page.limit, 1);
        assert_eq!(page.offset, 1);
        assert_eq!(page.cards[0].gig.title, "Second Show");
    }

    #[test]
    fn listed_cards_carry_the_reconciled_projections() {
        let store = Store::open_in_memory().expect("open store");
        let mut d = draft("Projection Show");
        d.venue = Some(cavern());
        d.set_start = Some("20:30".to_string());
        d.other_performers = Some(vec!["The Openers".to_string()]);
        create_gig(&store, "artist-1", &d, now()).expect("create");

        let list = list_gigs(&store, "artist-1", &GigQuery::default(), now()).expect("list");
        let card = &list.cards[0];
        assert_eq!(card.display.venue_name, "The Cavern");
        assert_eq!(card.display.venue_address, "10 Mathew Street, Liverpool");
        assert_eq!(card.tile.starts_at, utc(2025, 7, 15, 20, 30));
        assert!(card.tile.has_other_artists);
    }

    #[test]
    fn date_filters_bound_the_gig_start() {
        let store = Store::open_in_memory().expect("open store");
        create_gig(&store, "artist-1", &draft("July Show"), now()).expect("create");
        let mut august = draft("August Show");
        august.starts_at = Some(utc(2025, 8, 10, 19, 0));
        create_gig(&store, "artist-1", &august, now()).expect("create");

        let filtered = list_gigs(
            &store,
            "artist-1",
            &GigQuery {
                from: Some(utc(2025, 8, 1, 0, 0)),
                ..GigQuery::default()
            },
            now(),
        )
        .expect("filtered");
        assert_eq!(filtered.cards.len(), 1);
        assert_eq!(filtered.cards[0].gig.title, "August Show");
        assert_eq!(filtered.total, 1);
    }
}
