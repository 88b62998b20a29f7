// Session orchestration: spawning and managing per-session engine tasks.

use crate::domain::layout;
use crate::domain::ports::SessionStore;
use crate::use_cases::engine::swarm_task;
use crate::use_cases::types::{EngineUpdate, RosterState, SwarmEvent};
use crate::domain::{DecisionRecord, SessionRecord, SessionStatus, Vec2};
use axum::extract::ws::Utf8Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, RwLock, broadcast, mpsc, watch};

/// Shared configuration for spawning session engines.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Capacity for inbound participant events.
    pub event_channel_capacity: usize,
    /// Capacity for broadcast engine updates.
    pub update_broadcast_capacity: usize,
    /// Fixed tick interval for the engine loop.
    pub tick_interval: Duration,
}

/// Errors returned by session registry operations.
#[derive(Debug)]
pub enum SessionError {
    /// Session already exists and cannot be re-created.
    AlreadyExists,
}

/// Per-session channels shared by every connection.
#[derive(Clone)]
pub struct SessionHandle {
    /// Identifier clients use to target this session.
    pub session_id: Arc<str>,
    /// Creation-time session data (title, question, option labels).
    pub record: Arc<SessionRecord>,
    /// Fixed arena positions assigned to the options at creation.
    pub option_points: Arc<Vec<Vec2>>,
    /// Sender for participant events into the engine task.
    pub event_tx: mpsc::Sender<SwarmEvent>,
    /// Broadcast sender for raw engine updates.
    pub update_tx: broadcast::Sender<EngineUpdate>,
    /// Broadcast sender for serialized engine updates.
    pub bytes_tx: broadcast::Sender<Utf8Bytes>,
    /// Watch sender holding the latest serialized puck sample.
    pub latest_tx: watch::Sender<Utf8Bytes>,
    /// Watch sender for roster/status changes.
    pub roster_tx: watch::Sender<RosterState>,
    /// Watch sender carrying the finalized decision, exactly once.
    pub decision_tx: watch::Sender<Option<DecisionRecord>>,
    /// Signals the engine task to exit when the session is removed.
    shutdown: Arc<Notify>,
}

/// Thread-safe registry for active sessions.
pub struct SessionRegistry {
    /// Global settings applied to newly opened sessions.
    settings: SessionSettings,
    /// Map of session id to active handle.
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionRegistry {
    /// Creates a new registry with the provided settings.
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Opens a session and spawns its engine task.
    pub async fn open_session(
        &self,
        record: SessionRecord,
        store: Arc<dyn SessionStore>,
    ) -> Result<SessionHandle, SessionError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&record.session_id) {
            return Err(SessionError::AlreadyExists);
        }

        // Channel wiring for the session engine loop.
        let (event_tx, event_rx) =
            mpsc::channel::<SwarmEvent>(self.settings.event_channel_capacity);
        let (update_tx, _update_rx) =
            broadcast::channel::<EngineUpdate>(self.settings.update_broadcast_capacity);
        let (bytes_tx, _bytes_rx) =
            broadcast::channel::<Utf8Bytes>(self.settings.update_broadcast_capacity);
        let (latest_tx, _latest_rx) = watch::channel::<Utf8Bytes>(Utf8Bytes::from(""));
        let (roster_tx, _roster_rx) = watch::channel(RosterState {
            status: record.status,
            participants: 0,
        });
        let (decision_tx, _decision_rx) = watch::channel::<Option<DecisionRecord>>(None);
        let shutdown = Arc::new(Notify::new());

        let option_points = Arc::new(layout::option_positions(record.options.len()));
        let record = Arc::new(record);

        // Spawn the authoritative engine loop for this session.
        tokio::spawn(swarm_task(
            (*record).clone(),
            (*option_points).clone(),
            store,
            event_rx,
            update_tx.clone(),
            roster_tx.clone(),
            decision_tx.clone(),
            self.settings.tick_interval,
            shutdown.clone(),
        ));

        let handle = SessionHandle {
            session_id: Arc::from(record.session_id.as_str()),
            record,
            option_points,
            event_tx,
            update_tx,
            bytes_tx,
            latest_tx,
            roster_tx,
            decision_tx,
            shutdown,
        };

        sessions.insert(handle.session_id.to_string(), handle.clone());
        Ok(handle)
    }

    /// Returns a session handle for the provided id, if it exists.
    pub async fn get_session(&self, session_id: &str) -> Option<SessionHandle> {
        let sessions = self.sessions.read().await;
        sessions.get(session_id).cloned()
    }

    /// Removes a session and signals its engine task to exit.
    pub async fn remove_session(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.remove(session_id) {
            Some(handle) => {
                handle.shutdown.notify_one();
                true
            }
            None => false,
        }
    }
}
