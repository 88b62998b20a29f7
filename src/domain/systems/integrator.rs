use crate::domain::state::{ARENA_MAX, ARENA_MIN, PuckState, Vec2};
use crate::domain::tuning::PhysicsTuning;
use tracing::warn;

/// Advances the puck one fixed tick under the net force.
///
/// Order matters: force integrates into velocity before friction damps it,
/// then the speed cap applies, then position moves. Reversing force and
/// friction changes the settle-down behavior.
pub fn tick_puck(puck: &mut PuckState, force: Vec2, cfg: &PhysicsTuning) {
    let ax = force.x / cfg.mass;
    let ay = force.y / cfg.mass;

    puck.velocity.x = (puck.velocity.x + ax) * cfg.friction;
    puck.velocity.y = (puck.velocity.y + ay) * cfg.friction;

    let speed = puck.velocity.length();
    if speed > cfg.max_velocity {
        let scale = cfg.max_velocity / speed;
        puck.velocity.x *= scale;
        puck.velocity.y *= scale;
    }

    puck.position.x += puck.velocity.x;
    puck.position.y += puck.velocity.y;

    bounce_off_walls(puck, cfg);

    // Defensive check against numerical blow-up. Recover silently; the next
    // published sample supersedes whatever clients last saw.
    if !puck.position.is_finite()
        || puck.position.x < ARENA_MIN
        || puck.position.x > ARENA_MAX
        || puck.position.y < ARENA_MIN
        || puck.position.y > ARENA_MAX
    {
        warn!(x = puck.position.x, y = puck.position.y, "puck lost; resetting to center");
        puck.reset();
    }
}

// Clamp to the wall and push the velocity component inward at restitution.
// Not a sign flip: the component must point away from the wall even if the
// pre-collision value was already near zero or already inward.
fn bounce_off_walls(puck: &mut PuckState, cfg: &PhysicsTuning) {
    if puck.position.x < cfg.wall_min {
        puck.position.x = cfg.wall_min;
        puck.velocity.x = puck.velocity.x.abs() * cfg.restitution;
    }
    if puck.position.x > cfg.wall_max {
        puck.position.x = cfg.wall_max;
        puck.velocity.x = -puck.velocity.x.abs() * cfg.restitution;
    }
    if puck.position.y < cfg.wall_min {
        puck.position.y = cfg.wall_min;
        puck.velocity.y = puck.velocity.y.abs() * cfg.restitution;
    }
    if puck.position.y > cfg.wall_max {
        puck.position.y = cfg.wall_max;
        puck.velocity.y = -puck.velocity.y.abs() * cfg.restitution;
    }
}

/// Settling replaces force integration with exponential convergence toward
/// the chosen option, velocity pinned at zero, so the finalization dwell is
/// stable regardless of residual force noise.
pub fn settle_toward(puck: &mut PuckState, option: Vec2, settle_rate: f32) {
    puck.position.x = puck.position.x * (1.0 - settle_rate) + option.x * settle_rate;
    puck.position.y = puck.position.y * (1.0 - settle_rate) + option.y * settle_rate;
    puck.velocity = Vec2::ZERO;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_stays_inside_the_arena_under_sustained_force() {
        let cfg = PhysicsTuning::default();
        let mut puck = PuckState::centered();

        // Drive hard toward one corner for long enough to hit the wall.
        for _ in 0..600 {
            tick_puck(&mut puck, Vec2::new(25.0, 25.0), &cfg);
            assert!((ARENA_MIN..=ARENA_MAX).contains(&puck.position.x));
            assert!((ARENA_MIN..=ARENA_MAX).contains(&puck.position.y));
        }
        // The puck ends pinned against the wall, give or take one bounce.
        assert!(puck.position.x > cfg.wall_max - 5.0);
        assert!(puck.position.y > cfg.wall_max - 5.0);
    }

    #[test]
    fn friction_alone_decays_velocity_to_zero() {
        let cfg = PhysicsTuning::default();
        let mut puck = PuckState::centered();
        puck.velocity = Vec2::new(3.0, -2.0);

        for _ in 0..400 {
            tick_puck(&mut puck, Vec2::ZERO, &cfg);
        }
        assert!(puck.velocity.length() < 1e-3);
    }

    #[test]
    fn mirrored_pulls_leave_the_cross_axis_untouched() {
        let cfg = PhysicsTuning::default();
        let mut puck = PuckState::centered();
        let force = crate::domain::systems::forces::net_force(
            puck.position,
            [Vec2::new(10.0, 50.0), Vec2::new(90.0, 50.0)].into_iter(),
            None,
            &cfg,
        );

        tick_puck(&mut puck, force, &cfg);
        assert!(puck.velocity.y.abs() < 1e-6);
    }

    #[test]
    fn speed_is_capped_with_direction_preserved() {
        let cfg = PhysicsTuning::default();
        let mut puck = PuckState::centered();

        // Stop well before the wall so the cap is the only limiter.
        for _ in 0..5 {
            tick_puck(&mut puck, Vec2::new(100.0, 0.0), &cfg);
            assert!(puck.velocity.length() <= cfg.max_velocity + 1e-4);
        }
        assert!(puck.velocity.x > 0.0);
        assert_eq!(puck.velocity.y, 0.0);
    }

    #[test]
    fn wall_contact_pushes_the_velocity_inward() {
        let cfg = PhysicsTuning::default();
        let mut puck = PuckState::centered();
        puck.position = Vec2::new(6.0, 50.0);
        puck.velocity = Vec2::new(-4.0, 0.0);

        tick_puck(&mut puck, Vec2::ZERO, &cfg);
        assert_eq!(puck.position.x, cfg.wall_min);
        assert!(puck.velocity.x > 0.0);
    }

    #[test]
    fn non_finite_position_recovers_to_center() {
        let cfg = PhysicsTuning::default();
        let mut puck = PuckState::centered();
        puck.velocity = Vec2::new(f32::NAN, 0.0);

        tick_puck(&mut puck, Vec2::ZERO, &cfg);
        assert_eq!(puck.position, Vec2::new(50.0, 50.0));
        assert_eq!(puck.velocity, Vec2::ZERO);
    }

    #[test]
    fn settling_converges_on_the_option() {
        let mut puck = PuckState::centered();
        let option = Vec2::new(25.0, 25.0);

        for _ in 0..40 {
            settle_toward(&mut puck, option, 0.2);
        }
        assert!(puck.position.distance_to(option) < 0.01);
        assert_eq!(puck.velocity, Vec2::ZERO);
    }
}
