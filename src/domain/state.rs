// Domain-level simulation state and snapshot types.

use serde::{Deserialize, Serialize};

/// Lower bound of the normalized arena on both axes.
pub const ARENA_MIN: f32 = 0.0;
/// Upper bound of the normalized arena on both axes.
pub const ARENA_MAX: f32 = 100.0;

/// A point or direction in arena-normalized coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance_to(self, other: Vec2) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Unit vector from `self` toward `other`, or `None` when the points
    /// coincide (zero contribution, not a divide-by-zero fault).
    pub fn toward(self, other: Vec2) -> Option<Vec2> {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let distance = (dx * dx + dy * dy).sqrt();
        if distance > 0.0 {
            Some(Vec2::new(dx / distance, dy / distance))
        } else {
            None
        }
    }

    /// Clamps both components into the arena. A participant may point
    /// slightly outside while dragging near an edge.
    pub fn clamped_to_arena(self) -> Vec2 {
        Vec2::new(
            self.x.clamp(ARENA_MIN, ARENA_MAX),
            self.y.clamp(ARENA_MIN, ARENA_MAX),
        )
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Arena center, where the puck starts and returns to on reset.
pub fn arena_center() -> Vec2 {
    Vec2::new(50.0, 50.0)
}

/// The single shared marker whose trajectory encodes the group decision.
/// Exactly one engine task advances this per session.
#[derive(Debug, Clone, Copy)]
pub struct PuckState {
    pub position: Vec2,
    pub velocity: Vec2,
}

impl PuckState {
    pub fn centered() -> Self {
        Self {
            position: arena_center(),
            velocity: Vec2::ZERO,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::centered();
    }
}

/// Engine lifecycle for a session. `Decided` is terminal for the puck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    Free,
    Attracting(usize),
    Settling(usize),
    Decided(usize),
}

impl EnginePhase {
    /// Index of the option currently exerting basin attraction, if any.
    pub fn tracked_option(self) -> Option<usize> {
        match self {
            EnginePhase::Free => None,
            EnginePhase::Attracting(i) | EnginePhase::Settling(i) | EnginePhase::Decided(i) => {
                Some(i)
            }
        }
    }
}

/// Snapshot of the puck for broadcast; taken at most once per publish tick.
#[derive(Debug, Clone, Copy)]
pub struct PuckSample {
    pub tick: u64,
    pub position: Vec2,
    pub velocity: Vec2,
}

/// An accepted intent report, echoed so other participants can render it.
#[derive(Debug, Clone, Copy)]
pub struct IntentReport {
    pub participant_id: u64,
    pub target: Vec2,
}

/// The finalized outcome of a session. Created at most once, immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub option_index: usize,
    pub option: String,
    pub conviction: f32,
}
