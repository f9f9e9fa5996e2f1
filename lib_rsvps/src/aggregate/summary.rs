use serde::Serialize;
use std::collections::BTreeMap;

use crate::meetup::model::{EventRecord, Member};

/// Public view of an attending member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Profile {
    /// Member id as a string.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Thumbnail link, empty when the member has none.
    #[serde(rename = "thumbURL")]
    pub thumb_url: String,
}

impl From<&Member> for Profile {
    fn from(member: &Member) -> Self {
        Self {
            id: member.id.to_string(),
            name: member.name.clone(),
            thumb_url: member.thumb_link().to_string(),
        }
    }
}

/// Attendance across every event of one batch.
///
/// A member attending several events is listed once, with the profile from
/// the first event they appeared in. Guest totals are plain sums.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Sum of yes-guest counts.
    #[serde(rename = "allYesGuests")]
    pub all_yes_guests: u64,
    /// Unique attending member ids in first-seen order.
    #[serde(rename = "allYesIDs")]
    pub all_yes_ids: Vec<String>,
    /// Profile per id in `all_yes_ids`.
    pub profiles: BTreeMap<String, Profile>,
}

impl Summary {
    /// Adds one event's guests and its not-yet-seen attendees.
    pub fn absorb(&mut self, record: &EventRecord) {
        self.all_yes_guests += u64::from(record.yes_guest_count);

        for member in &record.yes_members {
            let id = member.id.to_string();
            if self.profiles.contains_key(&id) {
                continue;
            }
            self.all_yes_ids.push(id.clone());
            self.profiles.insert(id, Profile::from(member));
        }
    }

    /// Number of unique attendees.
    pub fn unique_attendees(&self) -> usize {
        self.all_yes_ids.len()
    }
}
