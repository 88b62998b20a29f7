// Per-participant intent storage, owned by the engine task. Writers feed it
// through the session event channel; only the tick loop touches the map.

use std::collections::HashMap;

use crate::domain::state::Vec2;

/// Engine-clock seconds after which an unrefreshed intent stops exerting
/// force. The slot itself stays until the participant leaves.
pub const DEFAULT_LIVENESS_SECS: f32 = 10.0;

#[derive(Debug, Clone, Copy)]
struct IntentSlot {
    target: Vec2,
    reported_at: f32,
}

/// Latest pull target per participant, with last-write-wins semantics.
#[derive(Debug)]
pub struct IntentLedger {
    slots: HashMap<u64, IntentSlot>,
    liveness_secs: f32,
}

impl IntentLedger {
    pub fn new(liveness_secs: f32) -> Self {
        Self {
            slots: HashMap::new(),
            liveness_secs,
        }
    }

    /// Records or overwrites the participant's pull target, clamped to the
    /// arena. Returns the stored target.
    pub fn report(&mut self, participant_id: u64, target: Vec2, now: f32) -> Vec2 {
        let target = target.clamped_to_arena();
        self.slots.insert(
            participant_id,
            IntentSlot {
                target,
                reported_at: now,
            },
        );
        target
    }

    pub fn remove(&mut self, participant_id: u64) {
        self.slots.remove(&participant_id);
    }

    /// Targets reported within the liveness window. No cross-participant
    /// ordering guarantee.
    pub fn fresh_targets(&self, now: f32) -> impl Iterator<Item = Vec2> + '_ {
        let cutoff = now - self.liveness_secs;
        self.slots
            .values()
            .filter(move |slot| slot.reported_at >= cutoff)
            .map(|slot| slot.target)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
