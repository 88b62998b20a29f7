// Session entities shared between the engine, the HTTP surface, and the
// external store.

use serde::{Deserialize, Serialize};

/// Lifecycle status persisted in the external session store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Active,
    Completed,
}

/// Creation-time session data. Options are addressed by stable index into
/// `options`, established once and never reordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub title: String,
    pub question: String,
    pub options: Vec<String>,
    pub status: SessionStatus,
}
