// Wire protocol DTOs and conversions for public swarm server messages.
// Internal service-to-service DTOs should live outside this module.

use crate::domain::{
    DecisionRecord, IntentReport, PuckSample, SessionRecord, SessionStatus, Vec2,
};
use crate::use_cases::RosterState;
use serde::{Deserialize, Serialize};

/// Messages the server sends to connected participants over the WebSocket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    // Assigned identity for the connection.
    Identity { participant_id: u64 },
    // Full session snapshot sent once after the handshake.
    Session(SessionDto),
    // Throttled sample of the authoritative puck trajectory.
    PuckUpdate(PuckUpdateDto),
    // Another participant's accepted pull target.
    IntentUpdate(IntentUpdateDto),
    // Roster/status transitions.
    SessionState(SessionStateDto),
    // The finalized decision, sent exactly once per connection.
    Decision(DecisionDto),
}

/// Messages a participant sends to the server over the WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    // Initial handshake message.
    Join(JoinPayload),
    // Pull target updates sent after a successful Join.
    Intent(IntentDto),
    // Return the puck to center and clear any settling state.
    Reset,
}

/// Payload for the Join handshake.
#[derive(Debug, Clone, Deserialize)]
pub struct JoinPayload {
    #[serde(default)]
    pub display_name: String,
}

/// A pull target in arena-normalized coordinates.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct IntentDto {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
}

impl From<IntentDto> for Vec2 {
    fn from(dto: IntentDto) -> Self {
        Vec2::new(dto.x, dto.y)
    }
}

/// Session snapshot for the connection handshake.
#[derive(Debug, Clone, Serialize)]
pub struct SessionDto {
    pub session_id: String,
    pub title: String,
    pub question: String,
    pub options: Vec<OptionDto>,
    pub status: SessionStatusDto,
    pub participants: u32,
    // Present when the session already finished before this connection.
    pub decision: Option<DecisionDto>,
}

/// An option label pinned to its arena position.
#[derive(Debug, Clone, Serialize)]
pub struct OptionDto {
    pub index: u32,
    pub label: String,
    pub x: f32,
    pub y: f32,
}

pub fn session_dto(
    record: &SessionRecord,
    points: &[Vec2],
    roster: RosterState,
    decision: Option<&DecisionRecord>,
) -> SessionDto {
    let options = record
        .options
        .iter()
        .zip(points.iter())
        .enumerate()
        .map(|(index, (label, point))| OptionDto {
            index: index as u32,
            label: label.clone(),
            x: point.x,
            y: point.y,
        })
        .collect();

    SessionDto {
        session_id: record.session_id.clone(),
        title: record.title.clone(),
        question: record.question.clone(),
        options,
        status: roster.status.into(),
        participants: roster.participants,
        decision: decision.map(DecisionDto::from),
    }
}

/// Puck sample for wire transmission.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PuckUpdateDto {
    pub tick: u64,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
}

impl From<PuckSample> for PuckUpdateDto {
    fn from(sample: PuckSample) -> Self {
        Self {
            tick: sample.tick,
            x: sample.position.x,
            y: sample.position.y,
            vx: sample.velocity.x,
            vy: sample.velocity.y,
        }
    }
}

/// Another participant's pull target for remote magnet rendering.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct IntentUpdateDto {
    pub participant_id: u64,
    pub x: f32,
    pub y: f32,
}

impl From<IntentReport> for IntentUpdateDto {
    fn from(report: IntentReport) -> Self {
        Self {
            participant_id: report.participant_id,
            x: report.target.x,
            y: report.target.y,
        }
    }
}

/// Roster/status snapshot for wire transmission.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SessionStateDto {
    pub status: SessionStatusDto,
    pub participants: u32,
}

impl From<RosterState> for SessionStateDto {
    fn from(roster: RosterState) -> Self {
        Self {
            status: roster.status.into(),
            participants: roster.participants,
        }
    }
}

/// The finalized decision for wire transmission.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionDto {
    pub option_index: u32,
    pub option: String,
    pub conviction: f32,
}

impl From<&DecisionRecord> for DecisionDto {
    fn from(decision: &DecisionRecord) -> Self {
        Self {
            option_index: decision.option_index as u32,
            option: decision.option.clone(),
            conviction: decision.conviction,
        }
    }
}

/// Session lifecycle status sent to clients for UI flow.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatusDto {
    Pending,
    Active,
    Completed,
}

impl From<SessionStatus> for SessionStatusDto {
    fn from(status: SessionStatus) -> Self {
        match status {
            SessionStatus::Pending => SessionStatusDto::Pending,
            SessionStatus::Active => SessionStatusDto::Active,
            SessionStatus::Completed => SessionStatusDto::Completed,
        }
    }
}
