// Domain layer: core simulation types and rules.

pub mod intents;
pub mod layout;
pub mod ports;
pub mod session;
pub mod state;
pub mod systems;
pub mod tuning;

pub use intents::IntentLedger;
pub use session::{SessionRecord, SessionStatus};
pub use state::{DecisionRecord, EnginePhase, IntentReport, PuckSample, PuckState, Vec2};
