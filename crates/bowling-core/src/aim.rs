//! Maps the aim gesture onto the carried ball.
//!
//! Screen coordinates are normalized with y growing toward the player.
//! Dragging toward the player is the backswing: the ball moves back and
//! lifts. Dragging away carries it down the lane.

use glam::Vec2;
use rapier3d::prelude::Vector;

use crate::config::AimConfig;
use crate::util::smoothstep;

/// Ball position for a pointer at `pointer` when the gesture began at
/// `anchor` with the ball resting at `ball_start`.
pub fn aim_target(anchor: Vec2, pointer: Vec2, ball_start: Vector, config: &AimConfig) -> Vector {
    let offset = pointer - anchor;
    let lift = config.lift_height * smoothstep(0.0, config.lift_range, offset.y.max(0.0));
    Vector::new(
        ball_start.x + offset.x * config.lateral_scale,
        ball_start.y + lift,
        ball_start.z + offset.y * config.depth_scale,
    )
}

/// Moves the carried ball from `previous` toward `target` for one sample
/// of length `dt`.
///
/// Motion faster than `max_launch_speed` is slowed down to it. Forward
/// motion slower than `min_launch_speed` is sped up, by at most
/// `forgiveness_max_scale`, so a timid swing still reaches the pins.
pub fn limit_step(previous: Vector, target: Vector, dt: f32, config: &AimConfig) -> Vector {
    if dt <= 0.0 {
        return previous;
    }
    let delta = target - previous;
    let speed = delta.length() / dt;
    if speed <= f32::EPSILON {
        return previous;
    }

    let scale = if speed > config.max_launch_speed {
        config.max_launch_speed / speed
    } else if speed < config.min_launch_speed && delta.z < 0.0 {
        (config.min_launch_speed / speed).min(config.forgiveness_max_scale.max(1.0))
    } else {
        1.0
    };
    previous + delta * scale
}
