use crate::domain::state::Vec2;
use crate::domain::tuning::PhysicsTuning;

/// Combines all fresh participant pulls, plus the option basin when one is
/// tracked, into a single net force on the puck.
///
/// Each participant contributes a unit vector toward their target scaled by
/// `force_multiplier` — conviction comes from numbers of aligned
/// participants, not proximity. A target coinciding with the puck
/// contributes nothing. The attractor term is the nonlinearity that turns a
/// noisy multi-force system into one with stable attractors at option
/// locations.
pub fn net_force(
    puck: Vec2,
    targets: impl Iterator<Item = Vec2>,
    attractor: Option<Vec2>,
    cfg: &PhysicsTuning,
) -> Vec2 {
    let mut force = Vec2::ZERO;

    for target in targets {
        if let Some(dir) = puck.toward(target) {
            force.x += dir.x * cfg.force_multiplier;
            force.y += dir.y * cfg.force_multiplier;
        }
    }

    if let Some(option) = attractor {
        if let Some(dir) = puck.toward(option) {
            force.x += dir.x * cfg.option_attraction;
            force.y += dir.y * cfg.option_attraction;
        }
    }

    force
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirrored_intents_cancel() {
        let cfg = PhysicsTuning::default();
        let puck = Vec2::new(50.0, 50.0);
        let targets = [Vec2::new(10.0, 50.0), Vec2::new(90.0, 50.0)];

        let force = net_force(puck, targets.into_iter(), None, &cfg);
        assert!(force.x.abs() < 1e-6);
        assert!(force.y.abs() < 1e-6);
    }

    #[test]
    fn coincident_target_contributes_nothing() {
        let cfg = PhysicsTuning::default();
        let puck = Vec2::new(50.0, 50.0);
        let targets = [Vec2::new(50.0, 50.0)];

        let force = net_force(puck, targets.into_iter(), None, &cfg);
        assert_eq!(force, Vec2::ZERO);
    }

    #[test]
    fn pull_strength_ignores_distance() {
        let cfg = PhysicsTuning::default();
        let puck = Vec2::new(50.0, 50.0);

        let near = net_force(puck, [Vec2::new(51.0, 50.0)].into_iter(), None, &cfg);
        let far = net_force(puck, [Vec2::new(99.0, 50.0)].into_iter(), None, &cfg);
        assert!((near.x - far.x).abs() < 1e-6);
    }

    #[test]
    fn basin_attraction_outweighs_a_lone_dissenter() {
        let cfg = PhysicsTuning::default();
        let puck = Vec2::new(30.0, 30.0);
        // One participant pulls away from the option; the basin pulls harder.
        let dissent = [Vec2::new(90.0, 90.0)];

        let force = net_force(
            puck,
            dissent.into_iter(),
            Some(Vec2::new(25.0, 25.0)),
            &cfg,
        );
        assert!(force.x < 0.0);
        assert!(force.y < 0.0);
    }
}
