use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{Booking, BookingChange, BookingStatus, Gig};

pub const DECLINED_BY_ARTIST: &str = "Declined by artist";
pub const CANCELLED_BY_ARTIST: &str = "Cancelled by artist";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BookingAction {
    AcceptInvite,
    DeclineInvite,
    CancelRequest,
    MarkCompleted,
    PublishNow,
}

impl BookingAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingAction::AcceptInvite => "accept_invite",
            BookingAction::DeclineInvite => "decline_invite",
            BookingAction::CancelRequest => "cancel_request",
            BookingAction::MarkCompleted => "mark_completed",
            BookingAction::PublishNow => "publish_now",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "accept_invite" => Some(BookingAction::AcceptInvite),
            "decline_invite" => Some(BookingAction::DeclineInvite),
            "cancel_request" => Some(BookingAction::CancelRequest),
            "mark_completed" => Some(BookingAction::MarkCompleted),
            "publish_now" => Some(BookingAction::PublishNow),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ActionError {
    #[error("{0}")]
    NotAllowed(&'static str),
    #[error("{0}")]
    InvalidState(&'static str),
    #[error("booking has no linked gig")]
    MissingGig,
}

/// What an allowed action does: move the booking, or publish the linked gig.
#[derive(Clone, Debug, PartialEq)]
pub enum Planned {
    Transition(BookingChange),
    PublishGig,
}

/// Evaluates the guards for one action without touching the store. The
/// caller applies the result through a conditional update keyed on the
/// status this saw.
pub fn plan(
    action: BookingAction,
    booking: &Booking,
    gig: Option<&Gig>,
    caller: &str,
    now: DateTime<Utc>,
) -> Result<Planned, ActionError> {
    match action {
        BookingAction::AcceptInvite => {
            if booking.booked_by == caller {
                return Err(ActionError::NotAllowed(
                    "only the invited party can accept this booking",
                ));
            }
            require_pending(booking, "only pending bookings can be accepted")?;
            Ok(Planned::Transition(BookingChange {
                next: BookingStatus::Confirmed,
                confirmed_at: Some(now),
                cancelled_at: None,
                cancellation_reason: None,
            }))
        }
        BookingAction::DeclineInvite => {
            if booking.booked_by == caller {
                return Err(ActionError::NotAllowed(
                    "only the invited party can decline this booking",
                ));
            }
            require_pending(booking, "only pending bookings can be declined")?;
            Ok(Planned::Transition(BookingChange {
                next: BookingStatus::Cancelled,
                confirmed_at: None,
                cancelled_at: Some(now),
                cancellation_reason: Some(DECLINED_BY_ARTIST.to_string()),
            }))
        }
        BookingAction::CancelRequest => {
            if booking.booked_by != caller {
                return Err(ActionError::NotAllowed(
                    "only the requesting party can cancel this booking",
                ));
            }
            require_pending(booking, "only pending bookings can be cancelled")?;
            Ok(Planned::Transition(BookingChange {
                next: BookingStatus::Cancelled,
                confirmed_at: None,
                cancelled_at: Some(now),
                cancellation_reason: Some(CANCELLED_BY_ARTIST.to_string()),
            }))
        }
        BookingAction::MarkCompleted => {
            if booking.status != BookingStatus::Confirmed {
                return Err(ActionError::InvalidState(
                    "only confirmed bookings can be completed",
                ));
            }
            let gig = gig.ok_or(ActionError::MissingGig)?;
            if gig.starts_at >= now {
                return Err(ActionError::InvalidState("the gig has not started yet"));
            }
            Ok(Planned::Transition(BookingChange {
                next: BookingStatus::Completed,
                confirmed_at: None,
                cancelled_at: None,
                cancellation_reason: None,
            }))
        }
        BookingAction::PublishNow => {
            if booking.booked_by != caller {
                return Err(ActionError::NotAllowed(
                    "only the booking initiator can publish this gig",
                ));
            }
            gig.ok_or(ActionError::MissingGig)?;
            Ok(Planned::PublishGig)
        }
    }
}

fn require_pending(booking: &Booking, message: &'static str) -> Result<(), ActionError> {
    if booking.status == BookingStatus::Pending {
        Ok(())
    } else {
        Err(ActionError::InvalidState(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventType, GigMetadata, GigStatus};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).single().expect("valid utc")
    }

    fn booking(status: BookingStatus, booked_by: &str) -> Booking {
        Booking {
            id: "b1".to_string(),
            gig_id: "g1".to_string(),
            artist_id: "artist-1".to_string(),
            venue_id: None,
            status,
            fee: None,
            currency: None,
            special_request: None,
            booked_by: booked_by.to_string(),
            booked_at: now() - Duration::days(7),
            confirmed_at: None,
            cancelled_at: None,
            cancellation_reason: None,
        }
    }

    fn gig(starts_at: DateTime<Utc>) -> Gig {
        Gig {
            id: "g1".to_string(),
            title: "Late Show".to_string(),
            description: None,
            event_type: EventType::Concert,
            status: GigStatus::Published,
            starts_at,
            ends_at: None,
            timezone: "Europe/London".to_string(),
            venue_id: None,
            metadata: GigMetadata::default(),
            created_at: now() - Duration::days(7),
            updated_at: now() - Duration::days(7),
        }
    }

    #[test]
    fn accepting_your_own_request_is_rejected_regardless_of_status() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Cancelled,
        ] {
            let result = plan(
                BookingAction::AcceptInvite,
                &booking(status, "artist-1"),
                None,
                "artist-1",
                now(),
            );
            assert!(matches!(result, Err(ActionError::NotAllowed(_))));
        }
    }

    #[test]
    fn accepting_an_invite_confirms_and_clears_cancellation() {
        let planned = plan(
            BookingAction::AcceptInvite,
            &booking(BookingStatus::Pending, "venue-owner"),
            None,
            "artist-1",
            now(),
        )
        .expect("allowed");
        match planned {
            Planned::Transition(change) => {
                assert_eq!(change.next, BookingStatus::Confirmed);
                assert_eq!(change.confirmed_at, Some(now()));
            }
            other => panic!("unexpected plan: {other:?}"),
        }
    }

    #[test]
    fn declining_an_invite_records_the_reason() {
        let planned = plan(
            BookingAction::DeclineInvite,
            &booking(BookingStatus::Pending, "venue-owner"),
            None,
            "artist-1",
            now(),
        )
        .expect("allowed");
        match planned {
            Planned::Transition(change) => {
                assert_eq!(change.next, BookingStatus::Cancelled);
                assert_eq!(change.cancellation_reason.as_deref(), Some("Declined by artist"));
            }
            other => panic!("unexpected plan: {other:?}"),
        }
    }

    #[test]
    fn only_the_initiator_can_cancel_a_request() {
        let result = plan(
            BookingAction::CancelRequest,
            &booking(BookingStatus::Pending, "venue-owner"),
            None,
            "artist-1",
            now(),
        );
        assert!(matches!(result, Err(ActionError::NotAllowed(_))));

        let planned = plan(
            BookingAction::CancelRequest,
            &booking(BookingStatus::Pending, "artist-1"),
            None,
            "artist-1",
            now(),
        )
        .expect("allowed");
        match planned {
            Planned::Transition(change) => {
                assert_eq!(change.cancellation_reason.as_deref(), Some("Cancelled by artist"));
            }
            other => panic!("unexpected plan: {other:?}"),
        }
    }

    #[test]
    fn non_pending_bookings_cannot_transition_from_pending_actions() {
        let result = plan(
            BookingAction::AcceptInvite,
            &booking(BookingStatus::Confirmed, "venue-owner"),
            None,
            "artist-1",
            now(),
        );
        assert_eq!(
            result,
            Err(ActionError::InvalidState("only pending bookings can be accepted"))
        );
    }

    #[test]
    fn completion_requires_the_gig_to_have_started() {
        let tomorrow = gig(now() + Duration::days(1));
        let result = plan(
            BookingAction::MarkCompleted,
            &booking(BookingStatus::Confirmed, "artist-1"),
            Some(&tomorrow),
            "artist-1",
            now(),
        );
        assert_eq!(
            result,
            Err(ActionError::InvalidState("the gig has not started yet"))
        );

        let yesterday = gig(now() - Duration::days(1));
        let planned = plan(
            BookingAction::MarkCompleted,
            &booking(BookingStatus::Confirmed, "artist-1"),
            Some(&yesterday),
            "artist-1",
            now(),
        )
        .expect("allowed");
        match planned {
            Planned::Transition(change) => assert_eq!(change.next, BookingStatus::Completed),
            other => panic!("unexpected plan: {other:?}"),
        }
    }

    #[test]
    fn completion_without_a_linked_gig_is_rejected() {
        let result = plan(
            BookingAction::MarkCompleted,
            &booking(BookingStatus::Confirmed, "artist-1"),
            None,
            "artist-1",
            now(),
        );
        assert_eq!(result, Err(ActionError::MissingGig));
    }

    #[test]
    fn publish_now_is_initiator_only() {
        let past = gig(now() - Duration::days(1));
        let result = plan(
            BookingAction::PublishNow,
            &booking(BookingStatus::Pending, "venue-owner"),
            Some(&past),
            "artist-1",
            now(),
        );
        assert!(matches!(result, Err(ActionError::NotAllowed(_))));

        let planned = plan(
            BookingAction::PublishNow,
            &booking(BookingStatus::Pending, "artist-1"),
            Some(&past),
            "artist-1",
            now(),
        )
        .expect("allowed");
        assert_eq!(planned, Planned::PublishGig);
    }
}
