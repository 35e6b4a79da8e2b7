use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GigStatus {
    Draft,
    Published,
    Cancelled,
    Completed,
}

impl GigStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GigStatus::Draft => "draft",
            GigStatus::Published => "published",
            GigStatus::Cancelled => "cancelled",
            GigStatus::Completed => "completed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "draft" => Some(GigStatus::Draft),
            "published" => Some(GigStatus::Published),
            "cancelled" => Some(GigStatus::Cancelled),
            "completed" => Some(GigStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "cancelled" => Some(BookingStatus::Cancelled),
            "completed" => Some(BookingStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Concert,
    Festival,
    Private,
    OpenMic,
    Livestream,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Concert => "concert",
            EventType::Festival => "festival",
            EventType::Private => "private",
            EventType::OpenMic => "open_mic",
            EventType::Livestream => "livestream",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "concert" => Some(EventType::Concert),
            "festival" => Some(EventType::Festival),
            "private" => Some(EventType::Private),
            "open_mic" => Some(EventType::OpenMic),
            "livestream" => Some(EventType::Livestream),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GigKind {
    InPerson,
    Streaming,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgeMode {
    Unknown,
    HasRestrictions,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AgeRestriction {
    pub mode: AgeMode,
    #[serde(default)]
    pub selections: Vec<String>,
    pub display: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TicketMode {
    Skip,
    FullVenueCapacity,
    LessThanFullVenueCapacity,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TicketAvailability {
    pub mode: TicketMode,
    pub custom_count: Option<u32>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PublishMode {
    Immediate,
    Scheduled,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PublishSchedule {
    pub mode: PublishMode,
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    pub publish_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
}

impl PublishSchedule {
    /// The shape every gig converges on once it is live: no pending
    /// schedule, a single published-at stamp.
    pub fn immediate(published_at: DateTime<Utc>) -> Self {
        Self {
            mode: PublishMode::Immediate,
            date: None,
            time: None,
            publish_at: None,
            published_at: Some(published_at),
        }
    }
}

/// The venue party's own claims about a gig, written by venue-side flows
/// and consumed read-only here. Start/end are kept as raw strings; the
/// reconciler only trusts them when they parse.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct VenueOverride {
    pub title: Option<String>,
    pub description: Option<String>,
    pub artwork_url: Option<String>,
    pub ticket_summary: Option<String>,
    pub entry_requirements: Option<String>,
    pub doors_open: Option<String>,
    pub set_start: Option<String>,
    pub set_end: Option<String>,
    pub starts_at: Option<String>,
    pub ends_at: Option<String>,
    pub venue_name: Option<String>,
    pub venue_address: Option<String>,
    pub is_official: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct GigMetadata {
    pub kind: Option<GigKind>,
    pub live_stream_url: Option<String>,
    pub ticket_url: Option<String>,
    pub artwork_url: Option<String>,
    pub ticket_summary: Option<String>,
    pub entry_requirements: Option<String>,
    pub doors_open: Option<String>,
    pub set_start: Option<String>,
    pub set_end: Option<String>,
    pub venue_name: Option<String>,
    pub venue_address: Option<String>,
    pub age_restriction: Option<AgeRestriction>,
    pub tickets: Option<TicketAvailability>,
    pub publish: Option<PublishSchedule>,
    pub venue_override: Option<VenueOverride>,
    pub other_performers: Vec<String>,
    pub agreed_date: Option<NaiveDate>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Gig {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub event_type: EventType,
    pub status: GigStatus,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub timezone: String,
    pub venue_id: Option<String>,
    pub metadata: GigMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Booking {
    pub id: String,
    pub gig_id: String,
    pub artist_id: String,
    pub venue_id: Option<String>,
    pub status: BookingStatus,
    pub fee: Option<f64>,
    pub currency: Option<String>,
    pub special_request: Option<String>,
    pub booked_by: String,
    pub booked_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
}

impl Booking {
    /// True when the other party opened this booking, i.e. the artist was
    /// invited rather than self-booked.
    pub fn initiated_by_other_party(&self) -> bool {
        self.booked_by != self.artist_id
    }
}

/// How an artist's booking list is sliced before status/date filters apply.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViewFilter {
    Calendar,
    Invites,
    Requests,
    All,
}

#[derive(Clone, Debug)]
pub struct GigQuery {
    pub view: ViewFilter,
    pub statuses: Option<Vec<BookingStatus>>,
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for GigQuery {
    fn default() -> Self {
        Self {
            view: ViewFilter::All,
            statuses: None,
            from: None,
            until: None,
            limit: 50,
            offset: 0,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BookingCounts {
    pub pending: u32,
    pub confirmed: u32,
    pub completed: u32,
}

/// A planned status transition, produced by the lifecycle guards and applied
/// by the store as one conditional update.
#[derive(Clone, Debug, PartialEq)]
pub struct BookingChange {
    pub next: BookingStatus,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Venue {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub address_line1: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub created_at: DateTime<Utc>,
}
