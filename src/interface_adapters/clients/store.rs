// Session store implementations: a thin HTTP client for the external
// session service, and an in-process fallback used when no service is
// configured (and by tests).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::RwLock;

use crate::domain::ports::SessionStore;
use crate::domain::{DecisionRecord, SessionRecord, SessionStatus};

/// Thin reqwest client for the external session/storage service.
///
/// Every method maps transport and status failures into the port's error
/// string; callers decide whether that is fatal (HTTP surface) or merely
/// logged (engine publishes).
#[derive(Clone)]
pub struct HttpStoreClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct StatusBody {
    status: SessionStatus,
}

#[derive(Debug, Serialize)]
struct ParticipantBody {
    participant_id: u64,
}

#[derive(Debug, Deserialize)]
struct CountBody {
    count: u32,
}

impl HttpStoreClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl SessionStore for HttpStoreClient {
    async fn create_session(&self, record: SessionRecord) -> Result<(), String> {
        let response = self
            .http
            .post(self.url("/sessions"))
            .json(&record)
            .send()
            .await
            .map_err(|e| format!("session store unreachable: {e}"))?;
        ok_or_status(response).await
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>, String> {
        let response = self
            .http
            .get(self.url(&format!("/sessions/{session_id}")))
            .send()
            .await
            .map_err(|e| format!("session store unreachable: {e}"))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(format!("session store returned {}", response.status()));
        }
        response
            .json::<SessionRecord>()
            .await
            .map(Some)
            .map_err(|e| format!("invalid session payload: {e}"))
    }

    async fn list_open_sessions(&self) -> Result<Vec<SessionRecord>, String> {
        let response = self
            .http
            .get(self.url("/sessions?status=open"))
            .send()
            .await
            .map_err(|e| format!("session store unreachable: {e}"))?;
        if !response.status().is_success() {
            return Err(format!("session store returned {}", response.status()));
        }
        response
            .json::<Vec<SessionRecord>>()
            .await
            .map_err(|e| format!("invalid session list payload: {e}"))
    }

    async fn add_participant(&self, session_id: &str, participant_id: u64) -> Result<(), String> {
        let response = self
            .http
            .post(self.url(&format!("/sessions/{session_id}/participants")))
            .json(&ParticipantBody { participant_id })
            .send()
            .await
            .map_err(|e| format!("session store unreachable: {e}"))?;
        ok_or_status(response).await
    }

    async fn participant_count(&self, session_id: &str) -> Result<u32, String> {
        let response = self
            .http
            .get(self.url(&format!("/sessions/{session_id}/participants/count")))
            .send()
            .await
            .map_err(|e| format!("session store unreachable: {e}"))?;
        if !response.status().is_success() {
            return Err(format!("session store returned {}", response.status()));
        }
        response
            .json::<CountBody>()
            .await
            .map(|body| body.count)
            .map_err(|e| format!("invalid count payload: {e}"))
    }

    async fn record_decision(
        &self,
        session_id: &str,
        decision: &DecisionRecord,
    ) -> Result<(), String> {
        let response = self
            .http
            .post(self.url(&format!("/sessions/{session_id}/decision")))
            .json(decision)
            .send()
            .await
            .map_err(|e| format!("session store unreachable: {e}"))?;
        ok_or_status(response).await
    }

    async fn set_session_status(
        &self,
        session_id: &str,
        status: SessionStatus,
    ) -> Result<(), String> {
        let response = self
            .http
            .put(self.url(&format!("/sessions/{session_id}/status")))
            .json(&StatusBody { status })
            .send()
            .await
            .map_err(|e| format!("session store unreachable: {e}"))?;
        ok_or_status(response).await
    }
}

async fn ok_or_status(response: reqwest::Response) -> Result<(), String> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(format!("session store returned {}", response.status()))
    }
}

#[derive(Debug, Default)]
struct StoredSession {
    record: Option<SessionRecord>,
    participants: HashSet<u64>,
    decision: Option<DecisionRecord>,
}

/// In-process session store. Canonical state lives in one locked map, the
/// same shape the HTTP service would keep server-side.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<String, StoredSession>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(&self, record: SessionRecord) -> Result<(), String> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.entry(record.session_id.clone()).or_default();
        if entry.record.is_some() {
            return Err("session already exists".to_string());
        }
        entry.record = Some(record);
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>, String> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(session_id)
            .and_then(|entry| entry.record.clone()))
    }

    async fn list_open_sessions(&self) -> Result<Vec<SessionRecord>, String> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .values()
            .filter_map(|entry| entry.record.clone())
            .filter(|record| record.status != SessionStatus::Completed)
            .collect())
    }

    async fn add_participant(&self, session_id: &str, participant_id: u64) -> Result<(), String> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(session_id) {
            Some(entry) => {
                entry.participants.insert(participant_id);
                Ok(())
            }
            None => Err("unknown session".to_string()),
        }
    }

    async fn participant_count(&self, session_id: &str) -> Result<u32, String> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(session_id)
            .map(|entry| entry.participants.len() as u32)
            .unwrap_or(0))
    }

    async fn record_decision(
        &self,
        session_id: &str,
        decision: &DecisionRecord,
    ) -> Result<(), String> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(session_id) {
            Some(entry) => {
                // First write wins; a decision is immutable once recorded.
                if entry.decision.is_some() {
                    return Err("decision already recorded".to_string());
                }
                entry.decision = Some(decision.clone());
                Ok(())
            }
            None => Err("unknown session".to_string()),
        }
    }

    async fn set_session_status(
        &self,
        session_id: &str,
        status: SessionStatus,
    ) -> Result<(), String> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(session_id) {
            Some(entry) => {
                if let Some(record) = entry.record.as_mut() {
                    record.status = status;
                }
                Ok(())
            }
            None => Err("unknown session".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, status: SessionStatus) -> SessionRecord {
        SessionRecord {
            session_id: id.to_string(),
            title: "t".to_string(),
            question: "q".to_string(),
            options: vec!["a".to_string(), "b".to_string()],
            status,
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = MemoryStore::new();
        store
            .create_session(record("s1", SessionStatus::Pending))
            .await
            .expect("create succeeds");

        let fetched = store
            .get_session("s1")
            .await
            .expect("get succeeds")
            .expect("session present");
        assert_eq!(fetched.title, "t");
        assert!(store.get_session("nope").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn listing_excludes_completed_sessions() {
        let store = MemoryStore::new();
        store
            .create_session(record("open", SessionStatus::Active))
            .await
            .expect("create succeeds");
        store
            .create_session(record("done", SessionStatus::Completed))
            .await
            .expect("create succeeds");

        let open = store.list_open_sessions().await.expect("list succeeds");
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].session_id, "open");
    }

    #[tokio::test]
    async fn participants_are_counted_once_each() {
        let store = MemoryStore::new();
        store
            .create_session(record("s1", SessionStatus::Active))
            .await
            .expect("create succeeds");

        store.add_participant("s1", 7).await.expect("add succeeds");
        store.add_participant("s1", 7).await.expect("add succeeds");
        store.add_participant("s1", 8).await.expect("add succeeds");
        assert_eq!(store.participant_count("s1").await.expect("count"), 2);
    }

    #[tokio::test]
    async fn a_decision_is_recorded_exactly_once() {
        let store = MemoryStore::new();
        store
            .create_session(record("s1", SessionStatus::Active))
            .await
            .expect("create succeeds");

        let decision = DecisionRecord {
            option_index: 0,
            option: "a".to_string(),
            conviction: 1.0,
        };
        store
            .record_decision("s1", &decision)
            .await
            .expect("first write succeeds");
        assert!(store.record_decision("s1", &decision).await.is_err());
    }

    #[tokio::test]
    async fn status_updates_reach_the_stored_record() {
        let store = MemoryStore::new();
        store
            .create_session(record("s1", SessionStatus::Pending))
            .await
            .expect("create succeeds");

        store
            .set_session_status("s1", SessionStatus::Completed)
            .await
            .expect("update succeeds");
        let fetched = store
            .get_session("s1")
            .await
            .expect("get succeeds")
            .expect("session present");
        assert_eq!(fetched.status, SessionStatus::Completed);
    }
}
