use crate::domain::state::{EnginePhase, Vec2};
use crate::domain::tuning::SettlementTuning;

/// What the engine must do after a settlement observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettlementAction {
    None,
    /// Settling began this tick: snap the puck to the option and zero its
    /// velocity.
    Snapped { option: usize },
    /// The finalization dwell elapsed: record the decision.
    Finalized { option: usize, conviction: f32 },
}

/// Watches puck position each tick and walks the phase machine
/// Free -> Attracting -> Settling -> Decided.
#[derive(Debug)]
pub struct SettlementDetector {
    phase: EnginePhase,
    settle_elapsed: f32,
    tuning: SettlementTuning,
}

impl SettlementDetector {
    pub fn new(tuning: SettlementTuning) -> Self {
        Self {
            phase: EnginePhase::Free,
            settle_elapsed: 0.0,
            tuning,
        }
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    pub fn decided(&self) -> bool {
        matches!(self.phase, EnginePhase::Decided(_))
    }

    /// Position of the option currently exerting basin attraction.
    pub fn attractor(&self, options: &[Vec2]) -> Option<Vec2> {
        match self.phase {
            EnginePhase::Attracting(i) | EnginePhase::Settling(i) => options.get(i).copied(),
            _ => None,
        }
    }

    /// Advances the phase machine one tick. `dt` only accumulates while
    /// settling; the dwell is cancelled by `reset`.
    pub fn observe(&mut self, puck: Vec2, options: &[Vec2], dt: f32) -> SettlementAction {
        match self.phase {
            EnginePhase::Decided(_) => SettlementAction::None,
            EnginePhase::Settling(option) => {
                self.settle_elapsed += dt;
                if self.settle_elapsed < self.tuning.finalize_delay_secs {
                    return SettlementAction::None;
                }

                // Distance at finalization is zero by construction after the
                // settling snap, so conviction is maximal for every settle.
                let distance = options
                    .get(option)
                    .map(|p| puck.distance_to(*p))
                    .unwrap_or(0.0);
                let conviction = conviction_from_distance(distance, self.tuning.conviction_falloff);
                self.phase = EnginePhase::Decided(option);
                SettlementAction::Finalized { option, conviction }
            }
            EnginePhase::Free | EnginePhase::Attracting(_) => {
                let Some((nearest, distance)) = nearest_option(puck, options) else {
                    return SettlementAction::None;
                };

                if distance < self.tuning.decision_threshold {
                    self.phase = EnginePhase::Settling(nearest);
                    self.settle_elapsed = 0.0;
                    return SettlementAction::Snapped { option: nearest };
                }

                // No hysteresis: the same threshold governs entry and exit,
                // and attraction always tracks the current nearest option.
                if distance < self.tuning.attraction_threshold {
                    self.phase = EnginePhase::Attracting(nearest);
                } else {
                    self.phase = EnginePhase::Free;
                }
                SettlementAction::None
            }
        }
    }

    /// Explicit reset: back to `Free` with the dwell timer cancelled, from
    /// any phase including `Decided`.
    pub fn reset(&mut self) {
        self.phase = EnginePhase::Free;
        self.settle_elapsed = 0.0;
    }
}

/// Index and distance of the closest option. Ties break toward the lowest
/// index, which is stable because option order never changes.
pub fn nearest_option(puck: Vec2, options: &[Vec2]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (index, position) in options.iter().enumerate() {
        let distance = puck.distance_to(*position);
        if best.is_none_or(|(_, d)| distance < d) {
            best = Some((index, distance));
        }
    }
    best
}

pub fn conviction_from_distance(distance: f32, falloff: f32) -> f32 {
    (1.0 - distance / falloff).clamp(0.0, 1.0)
}
