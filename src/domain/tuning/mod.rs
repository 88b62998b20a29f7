// Gameplay tuning, kept separate from runtime/server configuration.

pub mod physics;
pub mod settlement;

pub use physics::PhysicsTuning;
pub use settlement::SettlementTuning;
