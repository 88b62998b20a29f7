// Option layout policy, keyed by option count. Positions are assigned once
// at session start and never move.

use crate::domain::state::Vec2;

/// Sessions must carry at least this many options.
pub const MIN_OPTIONS: usize = 2;
/// Sessions must carry at most this many options.
pub const MAX_OPTIONS: usize = 6;

/// Fixed arena positions for `count` options.
///
/// - 2 options: left and right of center.
/// - 3 or 4 options: corners of a square; with 3 the fourth corner is part
///   of the policy but dropped from the result.
/// - 5 or 6 options: evenly spaced on a radius-35 circle centered on the
///   arena, starting at the top and proceeding clockwise.
pub fn option_positions(count: usize) -> Vec<Vec2> {
    let mut positions = if count <= 2 {
        vec![Vec2::new(25.0, 50.0), Vec2::new(75.0, 50.0)]
    } else if count <= 4 {
        vec![
            Vec2::new(25.0, 25.0),
            Vec2::new(75.0, 25.0),
            Vec2::new(25.0, 75.0),
            Vec2::new(75.0, 75.0),
        ]
    } else {
        let radius = 35.0_f32;
        let center_x = 50.0_f32;
        let center_y = 50.0_f32;

        (0..count)
            .map(|i| {
                // Offset by -pi/2 so slot 0 sits at the top; increasing angle
                // walks clockwise in arena coordinates (+y is down).
                let angle = (i as f32) * (2.0 * std::f32::consts::PI / count as f32)
                    - std::f32::consts::FRAC_PI_2;
                Vec2::new(
                    center_x + radius * angle.cos(),
                    center_y + radius * angle.sin(),
                )
            })
            .collect()
    };

    positions.truncate(count);
    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_options_sit_left_and_right() {
        let positions = option_positions(2);
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0], Vec2::new(25.0, 50.0));
        assert_eq!(positions[1], Vec2::new(75.0, 50.0));
    }

    #[test]
    fn three_options_use_square_corners_and_drop_the_fourth() {
        let positions = option_positions(3);
        assert_eq!(positions.len(), 3);
        assert_eq!(positions[0], Vec2::new(25.0, 25.0));
        assert_eq!(positions[1], Vec2::new(75.0, 25.0));
        assert_eq!(positions[2], Vec2::new(25.0, 75.0));
    }

    #[test]
    fn four_options_fill_the_square() {
        let positions = option_positions(4);
        assert_eq!(positions.len(), 4);
        assert_eq!(positions[3], Vec2::new(75.0, 75.0));
    }

    #[test]
    fn six_options_start_at_the_top_and_walk_clockwise() {
        let positions = option_positions(6);
        assert_eq!(positions.len(), 6);

        // Slot 0 is straight up from center at the circle radius.
        assert!((positions[0].x - 50.0).abs() < 1e-4);
        assert!((positions[0].y - 15.0).abs() < 1e-4);

        // Clockwise with +y down means slot 1 is to the right of center
        // and above it.
        assert!(positions[1].x > 50.0);
        assert!(positions[1].y < 50.0);

        // All slots stay on the circle.
        for p in &positions {
            let r = Vec2::new(50.0, 50.0).distance_to(*p);
            assert!((r - 35.0).abs() < 1e-3);
        }
    }
}
