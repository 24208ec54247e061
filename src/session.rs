//! Collaborative session tracking and the interaction history log.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::personality::PersonalityId;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Closed,
}

/// A collaborative session across all personalities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique session ID.
    pub id: String,
    /// What the session is about.
    pub topic: String,
    /// Opening request, if one was given.
    pub initial_request: Option<String>,
    /// When the session started.
    pub started_at: DateTime<Utc>,
    /// When the session was replaced by a newer one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    /// Participating personalities, in registry order.
    pub participants: Vec<PersonalityId>,
    /// Current state.
    pub status: SessionStatus,
}

impl Session {
    fn new(topic: String, initial_request: Option<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            topic,
            initial_request,
            started_at,
            closed_at: None,
            participants: PersonalityId::ALL.to_vec(),
            status: SessionStatus::Active,
        }
    }

    /// Check if the session is active.
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    fn close(&mut self, at: DateTime<Utc>) {
        self.status = SessionStatus::Closed;
        self.closed_at = Some(at);
    }
}

/// Kind of a recorded interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SessionStart,
    Consultation,
    Consensus,
    Feedback,
    TaskAssignment,
    StatusQuery,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::SessionStart => "session_start",
            EventKind::Consultation => "consultation",
            EventKind::Consensus => "consensus",
            EventKind::Feedback => "feedback",
            EventKind::TaskAssignment => "task_assignment",
            EventKind::StatusQuery => "status_query",
        };
        f.write_str(s)
    }
}

/// One completed operation, as recorded in history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEvent {
    /// Position in history.
    pub index: usize,
    /// When the event was recorded. Strictly increasing across history.
    pub timestamp: DateTime<Utc>,
    /// Event kind.
    pub kind: EventKind,
    /// Personality involved, absent for multi-personality events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personality: Option<PersonalityId>,
    /// Every personality asked to respond, in registry order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub participants: Vec<PersonalityId>,
    /// Session active when the event was recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Input and generated output.
    pub payload: Value,
}

impl InteractionEvent {
    /// Whether `id` took part in this interaction.
    pub fn involves(&self, id: PersonalityId) -> bool {
        self.participants.contains(&id)
    }
}

/// Owns the current session and the append-only history.
#[derive(Debug, Default)]
pub struct SessionStore {
    current: Option<Session>,
    archived: Vec<Session>,
    events: Vec<InteractionEvent>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl SessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Next history timestamp, bumped past the previous one if the clock did not advance.
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let ts = match self.last_timestamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(ts);
        ts
    }

    /// Start a new active session, archiving the current one.
    ///
    /// Appends a single `session_start` event whose payload carries the
    /// session input and `output`.
    pub fn start_session(
        &mut self,
        topic: impl Into<String>,
        initial_request: Option<String>,
        output: Value,
    ) -> &Session {
        let started_at = self.next_timestamp();

        if let Some(mut previous) = self.current.take() {
            previous.close(started_at);
            self.archived.push(previous);
        }

        let session = Session::new(topic.into(), initial_request, started_at);
        let payload = json!({
            "input": {
                "topic": session.topic,
                "initial_request": session.initial_request,
            },
            "output": output,
        });

        self.events.push(InteractionEvent {
            index: self.events.len(),
            timestamp: started_at,
            kind: EventKind::SessionStart,
            personality: None,
            participants: session.participants.clone(),
            session_id: Some(session.id.clone()),
            payload,
        });

        self.current.insert(session)
    }

    /// Current session, if any.
    pub fn current_session(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    /// Sessions replaced by newer ones, oldest first.
    pub fn archived_sessions(&self) -> &[Session] {
        &self.archived
    }

    /// Append an event to history.
    pub fn append_event(
        &mut self,
        kind: EventKind,
        personality: Option<PersonalityId>,
        payload: Value,
    ) -> &InteractionEvent {
        let participants = personality.into_iter().collect();
        self.push_event(kind, personality, participants, payload)
    }

    /// Append an event that every personality in `participants` responded to.
    pub fn append_team_event(
        &mut self,
        kind: EventKind,
        participants: Vec<PersonalityId>,
        payload: Value,
    ) -> &InteractionEvent {
        self.push_event(kind, None, participants, payload)
    }

    fn push_event(
        &mut self,
        kind: EventKind,
        personality: Option<PersonalityId>,
        participants: Vec<PersonalityId>,
        payload: Value,
    ) -> &InteractionEvent {
        let timestamp = self.next_timestamp();
        let event = InteractionEvent {
            index: self.events.len(),
            timestamp,
            kind,
            personality,
            participants,
            session_id: self.current.as_ref().map(|s| s.id.clone()),
            payload,
        };
        self.events.push(event);
        &self.events[self.events.len() - 1]
    }

    /// Full history in chronological order.
    pub fn history(&self) -> impl Iterator<Item = &InteractionEvent> + '_ {
        self.events.iter()
    }

    /// History from `index` onwards.
    pub fn history_since(&self, index: usize) -> impl Iterator<Item = &InteractionEvent> + '_ {
        self.events.iter().skip(index)
    }

    /// Events recorded strictly after `timestamp`.
    pub fn history_after(
        &self,
        timestamp: DateTime<Utc>,
    ) -> impl Iterator<Item = &InteractionEvent> + '_ {
        let start = self.events.partition_point(|e| e.timestamp <= timestamp);
        self.events[start..].iter()
    }

    /// Number of events recorded.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if no events have been recorded.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_session() {
        let mut store = SessionStore::new();
        assert!(store.current_session().is_none());

        let session = store
            .start_session("Auth redesign", None, json!([]))
            .clone();
        assert!(session.is_active());
        assert_eq!(session.participants, PersonalityId::ALL.to_vec());
        assert_eq!(store.len(), 1);

        let event = store.history().next().unwrap();
        assert_eq!(event.kind, EventKind::SessionStart);
        assert_eq!(event.session_id.as_deref(), Some(session.id.as_str()));
        assert_eq!(event.payload["input"]["topic"], "Auth redesign");
    }

    #[test]
    fn test_second_session_archives_first() {
        let mut store = SessionStore::new();
        let first = store.start_session("one", None, Value::Null).id.clone();
        store.append_event(EventKind::StatusQuery, None, Value::Null);
        let second = store
            .start_session("two", Some("go".into()), Value::Null)
            .id
            .clone();

        assert_ne!(first, second);
        assert_eq!(store.current_session().unwrap().id, second);
        assert_eq!(store.archived_sessions().len(), 1);
        assert_eq!(store.archived_sessions()[0].id, first);
        assert_eq!(store.archived_sessions()[0].status, SessionStatus::Closed);
        assert!(store.archived_sessions()[0].closed_at.is_some());

        let starts: Vec<_> = store
            .history()
            .filter(|e| e.kind == EventKind::SessionStart)
            .map(|e| e.session_id.clone().unwrap())
            .collect();
        assert_eq!(starts, vec![first, second]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let mut store = SessionStore::new();
        for _ in 0..200 {
            store.append_event(EventKind::StatusQuery, None, Value::Null);
        }
        let events: Vec<_> = store.history().collect();
        for pair in events.windows(2) {
            assert!(pair[0].timestamp < pair[1].timestamp);
            assert_eq!(pair[0].index + 1, pair[1].index);
        }
    }

    #[test]
    fn test_history_tails() {
        let mut store = SessionStore::new();
        store.start_session("t", None, Value::Null);
        store.append_event(EventKind::Consultation, Some(PersonalityId::Logic), Value::Null);
        let cutoff = store
            .append_event(EventKind::Consensus, None, Value::Null)
            .timestamp;
        store.append_event(EventKind::StatusQuery, None, Value::Null);

        assert_eq!(store.history_since(2).count(), 2);
        assert_eq!(store.history_since(10).count(), 0);

        let after: Vec<_> = store.history_after(cutoff).map(|e| e.kind).collect();
        assert_eq!(after, vec![EventKind::StatusQuery]);

        // Restartable: a second pass yields the same sequence.
        assert_eq!(store.history().count(), store.history().count());
    }

    #[test]
    fn test_events_carry_current_session() {
        let mut store = SessionStore::new();
        let orphan = store.append_event(EventKind::StatusQuery, None, Value::Null);
        assert!(orphan.session_id.is_none());

        let id = store.start_session("t", None, Value::Null).id.clone();
        let event = store.append_event(EventKind::Feedback, None, Value::Null);
        assert_eq!(event.session_id.as_deref(), Some(id.as_str()));
    }

    #[test]
    fn test_events_record_participants() {
        let mut store = SessionStore::new();
        store.start_session("t", None, Value::Null);
        let start = store.history().next().unwrap();
        assert!(PersonalityId::ALL.iter().all(|id| start.involves(*id)));

        let consult =
            store.append_event(EventKind::Consultation, Some(PersonalityId::Spark), Value::Null);
        assert!(consult.involves(PersonalityId::Spark));
        assert!(!consult.involves(PersonalityId::Logic));

        let team = store.append_team_event(
            EventKind::Consensus,
            vec![PersonalityId::Logic, PersonalityId::Guardian],
            Value::Null,
        );
        assert!(team.personality.is_none());
        assert!(team.involves(PersonalityId::Guardian));

        let status = store.append_event(EventKind::StatusQuery, None, Value::Null);
        assert!(status.participants.is_empty());
    }
}
