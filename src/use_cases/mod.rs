// Use cases layer: application workflows for the swarm server.

pub mod engine;
pub mod session;
pub mod types;

pub use session::{SessionHandle, SessionRegistry, SessionSettings};
pub use types::{EngineUpdate, RosterState, SwarmEvent};
