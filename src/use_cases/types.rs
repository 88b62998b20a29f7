// Use-case level inputs/outputs for the engine loop.

use crate::domain::{IntentReport, PuckSample, SessionStatus, Vec2};

/// Events flowing from connections into a session's engine task.
#[derive(Debug, Clone)]
pub enum SwarmEvent {
    Join { participant_id: u64 },
    Leave { participant_id: u64 },
    Intent { participant_id: u64, target: Vec2 },
    Reset,
}

/// Updates the engine broadcasts to every connection. The decision travels
/// on its own watch channel so late subscribers still receive it.
#[derive(Debug, Clone)]
pub enum EngineUpdate {
    Puck(PuckSample),
    Intent(IntentReport),
}

/// Roster and lifecycle snapshot published on join/leave/finalize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RosterState {
    pub status: SessionStatus,
    pub participants: u32,
}
