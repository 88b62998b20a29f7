use async_trait::async_trait;

use crate::domain::session::{SessionRecord, SessionStatus};
use crate::domain::state::DecisionRecord;

// Port for the external session/storage layer. The engine treats every call
// as best-effort: failures are logged and dropped, never surfaced to
// participants.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, record: SessionRecord) -> Result<(), String>;
    async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>, String>;
    async fn list_open_sessions(&self) -> Result<Vec<SessionRecord>, String>;
    async fn add_participant(&self, session_id: &str, participant_id: u64) -> Result<(), String>;
    async fn participant_count(&self, session_id: &str) -> Result<u32, String>;
    async fn record_decision(
        &self,
        session_id: &str,
        decision: &DecisionRecord,
    ) -> Result<(), String>;
    async fn set_session_status(
        &self,
        session_id: &str,
        status: SessionStatus,
    ) -> Result<(), String>;
}
