//! # Provider Data Model
//!
//! Wire types for the two meetup.com reads and the normalized
//! [`EventRecord`] that the cache stores and the API returns.
//!
//! The record keeps the field names the service has always emitted
//! (`EventStatus`, `YesCount`, ...) so existing front-ends keep working.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::client::UpstreamError;

/// Metadata returned by `GET /{group}/events/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MeetupEvent {
    /// Maximum number of yes RSVPs, `0` when unlimited.
    #[serde(default)]
    pub rsvp_limit: u32,
    /// Provider status, e.g. `upcoming`, `past`, `cancelled`.
    #[serde(default)]
    pub status: String,
    /// Start time in epoch milliseconds.
    #[serde(default)]
    pub time: i64,
    /// Offset from UTC in milliseconds.
    #[serde(default)]
    pub utc_offset: i64,
}

/// One entry of `GET /{group}/events/{id}/rsvps`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MeetupRsvp {
    /// Raw response value; validated against [`RsvpResponse`].
    pub response: String,
    /// Extra guests the member brings.
    #[serde(default)]
    pub guests: u32,
    /// The member who answered.
    #[serde(default)]
    pub member: Member,
}

/// A meetup.com member as it appears in an RSVP.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Numeric member id.
    pub id: u64,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Profile photo, absent for members without one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<Photo>,
}

impl Member {
    /// Thumbnail link, or an empty string when the member has no photo.
    pub fn thumb_link(&self) -> &str {
        self.photo
            .as_ref()
            .map(|photo| photo.thumb_link.as_str())
            .unwrap_or_default()
    }
}

/// Member photo links.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    /// Small thumbnail URL.
    #[serde(default)]
    pub thumb_link: String,
}

/// The RSVP answers the provider is known to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsvpResponse {
    /// Attending.
    Yes,
    /// Not attending.
    No,
    /// On the waiting list.
    Waitlist,
}

impl FromStr for RsvpResponse {
    type Err = UpstreamError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "yes" => Ok(Self::Yes),
            "no" => Ok(Self::No),
            "waitlist" => Ok(Self::Waitlist),
            other => Err(UpstreamError::UnexpectedResponse(other.to_string())),
        }
    }
}

/// Whether an event is still ahead (attendance changing) or over (stable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Any status other than `past`.
    Upcoming,
    /// Provider status `past`.
    Past,
}

impl LifecycleState {
    /// Maps a provider status to a lifecycle state.
    pub fn from_status(status: &str) -> Self {
        if status == "past" {
            Self::Past
        } else {
            Self::Upcoming
        }
    }
}

/// Normalized snapshot of one event's RSVPs.
///
/// Built once per upstream fetch and never mutated afterwards; the cache
/// hands out `Arc<EventRecord>` clones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EventRecord {
    /// Start time in epoch milliseconds.
    #[serde(rename = "EventTime")]
    pub event_time: i64,
    /// Offset from UTC in milliseconds.
    #[serde(rename = "EventUTCOffset")]
    pub event_utc_offset: i64,
    /// Provider status string.
    #[serde(rename = "EventStatus")]
    pub event_status: String,
    /// Attendees including their guests.
    #[serde(rename = "YesCount")]
    pub yes_count: u32,
    /// Members who declined.
    #[serde(rename = "NoCount")]
    pub no_count: u32,
    /// RSVP limit of the event.
    #[serde(rename = "MaxCount")]
    pub max_count: u32,
    /// Members on the waiting list.
    #[serde(rename = "OnWaitlistCount")]
    pub on_waitlist_count: u32,
    /// Guests brought by attending members.
    #[serde(rename = "YesGuestCount")]
    pub yes_guest_count: u32,
    /// Attending members in provider order.
    #[serde(rename = "YesMembers")]
    pub yes_members: Vec<Member>,
}

impl EventRecord {
    /// Folds the two provider reads into one record.
    ///
    /// A `yes` adds the member plus their guests to `yes_count`. Any response
    /// outside `yes`/`no`/`waitlist` fails the whole fold, as does a guest
    /// count that would overflow a counter.
    pub fn fold(event: MeetupEvent, rsvps: Vec<MeetupRsvp>) -> Result<Self, UpstreamError> {
        let mut record = EventRecord {
            event_time: event.time,
            event_utc_offset: event.utc_offset,
            event_status: event.status,
            max_count: event.rsvp_limit,
            ..Default::default()
        };

        for rsvp in rsvps {
            match rsvp.response.parse::<RsvpResponse>()? {
                RsvpResponse::Yes => {
                    record.yes_count = rsvp
                        .guests
                        .checked_add(1)
                        .and_then(|party| record.yes_count.checked_add(party))
                        .ok_or(UpstreamError::CountOverflow("yes"))?;
                    record.yes_guest_count = record
                        .yes_guest_count
                        .checked_add(rsvp.guests)
                        .ok_or(UpstreamError::CountOverflow("guests"))?;
                    record.yes_members.push(rsvp.member);
                }
                RsvpResponse::No => {
                    record.no_count = record
                        .no_count
                        .checked_add(1)
                        .ok_or(UpstreamError::CountOverflow("no"))?;
                }
                RsvpResponse::Waitlist => {
                    record.on_waitlist_count = record
                        .on_waitlist_count
                        .checked_add(1)
                        .ok_or(UpstreamError::CountOverflow("waitlist"))?;
                }
            }
        }

        Ok(record)
    }

    /// Lifecycle state derived from the stored status.
    pub fn lifecycle(&self) -> LifecycleState {
        LifecycleState::from_status(&self.event_status)
    }
}
