use chrono::{DateTime, LocalResult, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::models::{Booking, Gig, Venue, VenueOverride};

pub const VENUE_TBD: &str = "Venue TBD";
pub const ADDRESS_UNAVAILABLE: &str = "Address unavailable";

pub const VENUE_POLICY: &str = "Venue data currently supersedes artist data for public display.";
pub const ARTIST_POLICY: &str = "Artist data is displayed until venue official data is provided.";

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceOfTruth {
    Artist,
    Venue,
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MergeStatus {
    ArtistOnly,
    VenueOnly,
    Merged,
}

/// One party's claims about the public-facing fields, frozen at read time.
/// Neither party's stored data is touched while merging.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Submission {
    pub title: Option<String>,
    pub description: Option<String>,
    pub artwork_url: Option<String>,
    pub ticket_summary: Option<String>,
    pub entry_requirements: Option<String>,
    pub doors_open: Option<String>,
    pub set_start: Option<String>,
    pub set_end: Option<String>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct PublicDisplay {
    pub source_of_truth: SourceOfTruth,
    pub merge_status: MergeStatus,
    pub title: String,
    pub description: Option<String>,
    pub artwork_url: Option<String>,
    pub ticket_summary: Option<String>,
    pub entry_requirements: Option<String>,
    pub doors_open: Option<String>,
    pub set_start: Option<String>,
    pub set_end: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub venue_name: String,
    pub venue_address: String,
}

/// The artist-facing tile: the same merged record, but with the performer's
/// own set times recomposed onto the resolved calendar date.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ArtistTile {
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub has_other_artists: bool,
    pub other_performers: Vec<String>,
    pub data_policy: &'static str,
}

pub fn artist_submission(gig: &Gig) -> Submission {
    Submission {
        title: Some(gig.title.clone()),
        description: gig.description.clone(),
        artwork_url: gig.metadata.artwork_url.clone(),
        ticket_summary: gig.metadata.ticket_summary.clone(),
        entry_requirements: gig.metadata.entry_requirements.clone(),
        doors_open: gig.metadata.doors_open.clone(),
        set_start: gig.metadata.set_start.clone(),
        set_end: gig.metadata.set_end.clone(),
    }
}

pub fn venue_submission(block: &VenueOverride) -> Submission {
    Submission {
        title: block.title.clone(),
        description: block.description.clone(),
        artwork_url: block.artwork_url.clone(),
        ticket_summary: block.ticket_summary.clone(),
        entry_requirements: block.entry_requirements.clone(),
        doors_open: block.doors_open.clone(),
        set_start: block.set_start.clone(),
        set_end: block.set_end.clone(),
    }
}

/// Merges the two parties' submissions into the public projection. Pure and
/// recomputed on every read; nothing here is written back.
pub fn reconcile(booking: &Booking, gig: &Gig, venue: Option<&Venue>) -> PublicDisplay {
    let artist = artist_submission(gig);
    let block = gig.metadata.venue_override.clone().unwrap_or_default();
    let from_venue = venue_submission(&block);

    let has_venue_submission = override_present(&block);
    let venue_initiated = booking.initiated_by_other_party();
    let source_of_truth = if has_venue_submission || venue_initiated {
        SourceOfTruth::Venue
    } else {
        SourceOfTruth::Artist
    };
    let merge_status = if has_venue_submission {
        MergeStatus::Merged
    } else if source_of_truth == SourceOfTruth::Venue {
        MergeStatus::VenueOnly
    } else {
        MergeStatus::ArtistOnly
    };

    let venue_wins = source_of_truth == SourceOfTruth::Venue;
    // Field-level fallback: a winning party only wins the fields it filled.
    let pick = |venue_value: &Option<String>, artist_value: &Option<String>| -> Option<String> {
        if venue_wins {
            non_empty(venue_value)
                .or_else(|| non_empty(artist_value))
                .map(str::to_string)
        } else {
            non_empty(artist_value).map(str::to_string)
        }
    };

    let starts_at = if venue_wins {
        parse_instant(&block.starts_at).unwrap_or(gig.starts_at)
    } else {
        gig.starts_at
    };
    let ends_at = if venue_wins {
        parse_instant(&block.ends_at).or(gig.ends_at)
    } else {
        gig.ends_at
    };

    let venue_name = resolve_venue_name(venue, &block, gig);
    let venue_address = resolve_venue_address(venue, &block, gig);

    PublicDisplay {
        source_of_truth,
        merge_status,
        title: pick(&from_venue.title, &artist.title).unwrap_or_else(|| gig.title.clone()),
        description: pick(&from_venue.description, &artist.description),
        artwork_url: pick(&from_venue.artwork_url, &artist.artwork_url),
        ticket_summary: pick(&from_venue.ticket_summary, &artist.ticket_summary),
        entry_requirements: pick(&from_venue.entry_requirements, &artist.entry_requirements),
        doors_open: pick(&from_venue.doors_open, &artist.doors_open),
        set_start: pick(&from_venue.set_start, &artist.set_start),
        set_end: pick(&from_venue.set_end, &artist.set_end),
        starts_at,
        ends_at,
        venue_name,
        venue_address,
    }
}

pub fn artist_tile(gig: &Gig, display: &PublicDisplay) -> ArtistTile {
    let (starts_at, ends_at) = performer_times(gig, display);
    ArtistTile {
        starts_at,
        ends_at,
        has_other_artists: !gig.metadata.other_performers.is_empty(),
        other_performers: gig.metadata.other_performers.clone(),
        data_policy: match display.source_of_truth {
            SourceOfTruth::Venue => VENUE_POLICY,
            SourceOfTruth::Artist => ARTIST_POLICY,
        },
    }
}

/// The performer's slot: resolved calendar date plus the artist's own set
/// times. Falls back to the resolved instants when the composition fails.
fn performer_times(gig: &Gig, display: &PublicDisplay) -> (DateTime<Utc>, Option<DateTime<Utc>>) {
    let Ok(tz) = gig.timezone.parse::<Tz>() else {
        return (display.starts_at, display.ends_at);
    };
    let date = display.starts_at.with_timezone(&tz).date_naive();
    let start = gig
        .metadata
        .set_start
        .as_deref()
        .and_then(|raw| compose_local(date, raw, tz));
    let end = gig
        .metadata
        .set_end
        .as_deref()
        .and_then(|raw| compose_local(date, raw, tz));
    (start.unwrap_or(display.starts_at), end.or(display.ends_at))
}

fn compose_local(date: chrono::NaiveDate, time_raw: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let time = NaiveTime::parse_from_str(time_raw.trim(), "%H:%M").ok()?;
    let naive = NaiveDateTime::new(date, time);
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(dt, _) => Some(dt.with_timezone(&Utc)),
        LocalResult::None => None,
    }
}

fn override_present(block: &VenueOverride) -> bool {
    block.is_official
        || [
            &block.title,
            &block.description,
            &block.artwork_url,
            &block.ticket_summary,
            &block.entry_requirements,
            &block.doors_open,
            &block.set_start,
            &block.set_end,
            &block.starts_at,
            &block.ends_at,
            &block.venue_name,
            &block.venue_address,
        ]
        .iter()
        .any(|field| non_empty(field).is_some())
}

fn resolve_venue_name(venue: Option<&Venue>, block: &VenueOverride, gig: &Gig) -> String {
    venue
        .map(|v| v.name.clone())
        .filter(|name| !name.trim().is_empty())
        .or_else(|| non_empty(&block.venue_name).map(str::to_string))
        .or_else(|| non_empty(&gig.metadata.venue_name).map(str::to_string))
        .unwrap_or_else(|| VENUE_TBD.to_string())
}

fn resolve_venue_address(venue: Option<&Venue>, block: &VenueOverride, gig: &Gig) -> String {
    venue
        .and_then(compose_address)
        .or_else(|| usable_address(&block.venue_address))
        .or_else(|| usable_address(&gig.metadata.venue_address))
        .unwrap_or_else(|| ADDRESS_UNAVAILABLE.to_string())
}

fn compose_address(venue: &Venue) -> Option<String> {
    let parts: Vec<&str> = [&venue.address_line1, &venue.city, &venue.country]
        .into_iter()
        .filter_map(|part| non_empty(part))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

/// A stored address equal to the placeholder is stale filler, not data.
fn usable_address(value: &Option<String>) -> Option<String> {
    non_empty(value)
        .filter(|raw| !raw.eq_ignore_ascii_case(ADDRESS_UNAVAILABLE))
        .map(str::to_string)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_instant(raw: &Option<String>) -> Option<DateTime<Utc>> {
    non_empty(raw)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
