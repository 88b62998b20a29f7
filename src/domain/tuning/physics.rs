/// Tuning for the puck's force-driven motion.
///
/// Keep this separate from runtime/server configuration (tick rates, buffer
/// sizes, etc.).

#[derive(Debug, Clone, Copy)]
pub struct PhysicsTuning {
    /// Puck mass dividing net force into acceleration.
    pub mass: f32,

    /// Per-tick velocity damping, applied after force integration.
    pub friction: f32,

    /// Force contributed by each fresh participant intent. Unit-normalized:
    /// a faraway participant pulls exactly as hard as a nearby one.
    pub force_multiplier: f32,

    /// Force contributed by the tracked option while attracting or settling.
    /// Large enough to overwhelm participant disagreement near an option.
    pub option_attraction: f32,

    /// Speed cap in arena units per tick, direction preserved.
    pub max_velocity: f32,

    /// Velocity retained on wall contact, pointed inward.
    pub restitution: f32,

    /// Wall positions on both axes. The puck body never crosses these.
    pub wall_min: f32,
    pub wall_max: f32,
}

impl Default for PhysicsTuning {
    fn default() -> Self {
        Self {
            mass: 10.0,
            friction: 0.96,
            force_multiplier: 0.5,
            option_attraction: 2.0,
            max_velocity: 5.0,
            restitution: 0.5,
            wall_min: 5.0,
            wall_max: 95.0,
        }
    }
}
