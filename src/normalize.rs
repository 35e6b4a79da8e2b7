use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use url::Url;

use crate::models::{
    AgeMode, AgeRestriction, EventType, PublishMode, PublishSchedule, TicketAvailability,
    TicketMode,
};

pub const CURRENCIES: [&str; 4] = ["AUD", "EUR", "GBP", "USD"];

pub const MAX_FEE: f64 = 1_000_000.0;

/// Closed catalog of age bands a gig can advertise. "All ages" stands alone;
/// the rest combine as at most one Over plus at most one Under.
pub const AGE_OPTIONS: [&str; 7] = [
    "All ages",
    "Over 16s",
    "Over 18s",
    "Over 21s",
    "Under 16s",
    "Under 18s",
    "Under 21s",
];

static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid date regex"));
static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([01]\d|2[0-3]):[0-5]\d$").expect("valid time regex"));

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("unsupported currency: {0}")]
    InvalidCurrency(String),
    #[error("unsupported event type: {0}")]
    UnsupportedEventType(String),
    #[error("invalid fee: {0}")]
    InvalidFee(String),
    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("unknown age restriction mode: {0}")]
    UnknownAgeMode(String),
    #[error("age restriction requires at least one selection")]
    EmptyAgeSelection,
    #[error("unknown age restriction option: {0}")]
    UnknownAgeOption(String),
    #[error("\"All ages\" cannot be combined with other selections")]
    AllAgesExclusive,
    #[error("at most one \"Over\" selection is allowed")]
    MultipleOverSelections,
    #[error("at most one \"Under\" selection is allowed")]
    MultipleUnderSelections,
    #[error("unknown ticket availability: {0}")]
    UnknownTicketMode(String),
    #[error("a custom ticket count is required when selling below venue capacity")]
    MissingCustomTicketCount,
    #[error("unknown publish mode: {0}")]
    UnknownPublishMode(String),
    #[error("a publish date is required for scheduled publishing")]
    MissingPublishDate,
    #[error("invalid publish date: {0}")]
    InvalidPublishDate(String),
    #[error("invalid publish time: {0}")]
    InvalidPublishTime(String),
    #[error("scheduled publish time must be in the future")]
    ScheduledTimeNotFuture,
    #[error("unknown booking action: {0}")]
    UnknownAction(String),
    #[error("end must be after start")]
    EndBeforeStart,
    #[error("start and end must fall on the same calendar day")]
    CrossDayNotAllowed,
    #[error("{0} is required")]
    MissingField(&'static str),
}

pub fn clean_text(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

pub fn normalize_currency(raw: &str) -> Result<String, ValidationError> {
    let code = raw.trim().to_uppercase();
    if CURRENCIES.contains(&code.as_str()) {
        Ok(code)
    } else {
        Err(ValidationError::InvalidCurrency(raw.trim().to_string()))
    }
}

pub fn normalize_event_type(raw: &str) -> Result<EventType, ValidationError> {
    let lowered = raw.trim().to_lowercase();
    EventType::parse(&lowered)
        .ok_or_else(|| ValidationError::UnsupportedEventType(raw.trim().to_string()))
}

pub fn normalize_fee(raw: f64) -> Result<f64, ValidationError> {
    if !raw.is_finite() || raw < 0.0 {
        return Err(ValidationError::InvalidFee(
            "fee must be a non-negative amount".to_string(),
        ));
    }
    if raw > MAX_FEE {
        return Err(ValidationError::InvalidFee(format!(
            "fee cannot exceed {MAX_FEE}"
        )));
    }
    Ok((raw * 100.0).round() / 100.0)
}

pub fn normalize_timezone(raw: &str) -> Result<Tz, ValidationError> {
    raw.trim()
        .parse::<Tz>()
        .map_err(|_| ValidationError::InvalidTimezone(raw.trim().to_string()))
}

pub fn normalize_url(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    let parsed = Url::parse(trimmed)
        .map_err(|_| ValidationError::InvalidUrl(trimmed.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        _ => Err(ValidationError::InvalidUrl(trimmed.to_string())),
    }
}

pub fn resolve_age_restriction(
    mode: &str,
    selections: &[String],
) -> Result<AgeRestriction, ValidationError> {
    match mode.trim() {
        "unknown" => Ok(AgeRestriction {
            mode: AgeMode::Unknown,
            selections: Vec::new(),
            display: None,
        }),
        "has_restrictions" => {
            let cleaned: Vec<String> = selections
                .iter()
                .map(|s| clean_text(s))
                .filter(|s| !s.is_empty())
                .collect();
            if cleaned.is_empty() {
                return Err(ValidationError::EmptyAgeSelection);
            }
            for choice in &cleaned {
                if !AGE_OPTIONS.contains(&choice.as_str()) {
                    return Err(ValidationError::UnknownAgeOption(choice.clone()));
                }
            }
            let all_ages = cleaned.iter().any(|c| c == "All ages");
            if all_ages && cleaned.len() > 1 {
                return Err(ValidationError::AllAgesExclusive);
            }
            if cleaned.iter().filter(|c| c.starts_with("Over")).count() > 1 {
                return Err(ValidationError::MultipleOverSelections);
            }
            if cleaned.iter().filter(|c| c.starts_with("Under")).count() > 1 {
                return Err(ValidationError::MultipleUnderSelections);
            }
            let display = if all_ages {
                "Family Friendly".to_string()
            } else {
                // Catalog order, so the same set always renders the same.
                let labels: Vec<&str> = AGE_OPTIONS
                    .iter()
                    .copied()
                    .filter(|opt| cleaned.iter().any(|c| c == opt))
                    .collect();
                let mut text = labels.join(". ");
                text.push('.');
                text
            };
            Ok(AgeRestriction {
                mode: AgeMode::HasRestrictions,
                selections: cleaned,
                display: Some(display),
            })
        }
        other => Err(ValidationError::UnknownAgeMode(other.to_string())),
    }
}

pub fn resolve_ticket_availability(
    mode: &str,
    custom_count: Option<u32>,
) -> Result<TicketAvailability, ValidationError> {
    let canonical = match mode.trim() {
        "skip" => TicketMode::Skip,
        "full_venue_capacity" | "full_capacity" => TicketMode::FullVenueCapacity,
        "less_than_full_venue_capacity" | "custom" => TicketMode::LessThanFullVenueCapacity,
        other => return Err(ValidationError::UnknownTicketMode(other.to_string())),
    };
    if canonical == TicketMode::LessThanFullVenueCapacity {
        match custom_count {
            Some(count) if count > 0 => Ok(TicketAvailability {
                mode: canonical,
                custom_count: Some(count),
            }),
            _ => Err(ValidationError::MissingCustomTicketCount),
        }
    } else {
        Ok(TicketAvailability {
            mode: canonical,
            custom_count: None,
        })
    }
}

pub fn resolve_publish_schedule(
    mode: &str,
    date: Option<&str>,
    time: Option<&str>,
    tz: Tz,
    now: DateTime<Utc>,
) -> Result<PublishSchedule, ValidationError> {
    match mode.trim() {
        "immediate" => Ok(PublishSchedule::immediate(now)),
        "scheduled" => {
            let date_raw = date
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or(ValidationError::MissingPublishDate)?;
            if !DATE_RE.is_match(date_raw) {
                return Err(ValidationError::InvalidPublishDate(date_raw.to_string()));
            }
            let parsed_date = NaiveDate::parse_from_str(date_raw, "%Y-%m-%d")
                .map_err(|_| ValidationError::InvalidPublishDate(date_raw.to_string()))?;
            let time_raw = time.map(str::trim).filter(|s| !s.is_empty()).unwrap_or("00:00");
            if !TIME_RE.is_match(time_raw) {
                return Err(ValidationError::InvalidPublishTime(time_raw.to_string()));
            }
            let parsed_time = NaiveTime::parse_from_str(time_raw, "%H:%M")
                .map_err(|_| ValidationError::InvalidPublishTime(time_raw.to_string()))?;
            let local = NaiveDateTime::new(parsed_date, parsed_time);
            let instant = match tz.from_local_datetime(&local) {
                LocalResult::Single(dt) => dt,
                LocalResult::Ambiguous(dt, _) => dt,
                LocalResult::None => {
                    return Err(ValidationError::InvalidPublishTime(format!(
                        "{date_raw} {time_raw} does not exist in {tz}"
                    )))
                }
            };
            let publish_at = instant.with_timezone(&Utc);
            if publish_at <= now {
                return Err(ValidationError::ScheduledTimeNotFuture);
            }
            Ok(PublishSchedule {
                mode: PublishMode::Scheduled,
                date: Some(parsed_date),
                time: Some(time_raw.to_string()),
                publish_at: Some(publish_at),
                published_at: None,
            })
        }
        other => Err(ValidationError::UnknownPublishMode(other.to_string())),
    }
}

/// End after start, and both instants on one local calendar day.
pub fn validate_time_range(
    starts_at: DateTime<Utc>,
    ends_at: Option<DateTime<Utc>>,
    tz: Tz,
) -> Result<(), ValidationError> {
    let Some(ends_at) = ends_at else {
        return Ok(());
    };
    if ends_at <= starts_at {
        return Err(ValidationError::EndBeforeStart);
    }
    let start_day = starts_at.with_timezone(&tz).date_naive();
    let end_day = ends_at.with_timezone(&tz).date_naive();
    if start_day != end_day {
        return Err(ValidationError::CrossDayNotAllowed);
    }
    Ok(())
}
