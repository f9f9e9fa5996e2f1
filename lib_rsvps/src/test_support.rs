//! In-memory fakes for the two network seams.

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::time::Instant;

use crate::allowlist::SourceFetcher;
use crate::meetup::{EventRecord, EventSource, Member, UpstreamError};
use crate::retrieve::HttpError;

/// Allow-list sources answered from a table. Unknown URLs fail.
#[derive(Default)]
pub(crate) struct ScriptedFetcher {
    bodies: Mutex<HashMap<String, Option<String>>>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub(crate) fn respond(&self, url: &str, body: &str) {
        self.bodies.lock().unwrap().insert(url.into(), Some(body.into()));
    }

    pub(crate) fn fail(&self, url: &str) {
        self.bodies.lock().unwrap().insert(url.into(), None);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SourceFetcher for ScriptedFetcher {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        _deadline: Option<Instant>,
    ) -> BoxFuture<'a, Result<String, HttpError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = match self.bodies.lock().unwrap().get(url) {
            Some(Some(body)) => Ok(body.clone()),
            _ => Err(HttpError::Status {
                url: url.into(),
                status: 503,
                body: String::new(),
            }),
        };
        async move { result }.boxed()
    }
}

/// Event records answered from a table keyed by `(group, event_id)`.
#[derive(Default)]
pub(crate) struct FakeEvents {
    records: Mutex<HashMap<(String, String), EventRecord>>,
    calls: AtomicUsize,
}

impl FakeEvents {
    pub(crate) fn insert(&self, group: &str, event_id: &str, record: EventRecord) {
        self.records
            .lock()
            .unwrap()
            .insert((group.into(), event_id.into()), record);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EventSource for FakeEvents {
    fn fetch_event_record<'a>(
        &'a self,
        group: &'a str,
        event_id: &'a str,
        _deadline: Option<Instant>,
    ) -> BoxFuture<'a, Result<EventRecord, UpstreamError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let found = self
            .records
            .lock()
            .unwrap()
            .get(&(group.to_string(), event_id.to_string()))
            .cloned();
        let result = found.ok_or_else(|| UpstreamError::Details {
            group: group.into(),
            event_id: event_id.into(),
            source: HttpError::Status {
                url: format!("https://api.meetup.com/{group}/events/{event_id}"),
                status: 404,
                body: String::new(),
            },
        });
        async move { result }.boxed()
    }
}

/// Record with the given status whose attendees are `members` as `(id, guests)`.
pub(crate) fn record(status: &str, members: &[(u64, u32)]) -> EventRecord {
    let mut record = EventRecord {
        event_status: status.into(),
        ..Default::default()
    };
    for &(id, guests) in members {
        record.yes_count += 1 + guests;
        record.yes_guest_count += guests;
        record.yes_members.push(Member {
            id,
            name: format!("member {id}"),
            photo: None,
        });
    }
    record
}
