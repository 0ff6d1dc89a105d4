//! Pointer-curvature spin filter.
//!
//! Converts a stream of normalized screen positions into a signed spin rate.
//! Spin only builds while the gesture keeps turning the same way: per-sample
//! curvature below the sensitivity is treated as noise and the accumulated
//! curvature slowly forgets, so alternating jitter never adds up to hook.
//!
//! Screen space is normalized with y growing toward the player; a forward
//! swing moves toward smaller y.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::config::SpinConfig;

/// Leaky curvature integrator with sign-consistency gating.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SpinTracker {
    last_screen_pos: Vec2,
    last_screen_vel: Vec2,
    spin_rate: f32,
    curvature_accumulator: f32,
}

impl SpinTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all state and primes the tracker at `anchor`, the screen
    /// position where the aim gesture started.
    pub fn reset_at(&mut self, anchor: Vec2) {
        *self = Self {
            last_screen_pos: anchor,
            ..Self::default()
        };
    }

    /// Feeds one pointer sample and returns the updated spin rate.
    pub fn update(&mut self, current_screen_pos: Vec2, dt: f32, params: &SpinConfig) -> f32 {
        if dt <= 0.0 {
            return self.spin_rate;
        }

        let vel = (current_screen_pos - self.last_screen_pos) / dt;

        // Pulling back toward the player drops any curve intent.
        if vel.y > params.cancel_epsilon {
            self.spin_rate = 0.0;
            self.curvature_accumulator = 0.0;
            self.last_screen_pos = current_screen_pos;
            self.last_screen_vel = vel;
            return 0.0;
        }

        let curve = self.last_screen_vel.perp_dot(vel);

        if curve.abs() < params.sensitivity {
            self.curvature_accumulator *= (-dt / params.decay_time.max(f32::EPSILON)).exp();
        } else {
            self.curvature_accumulator += curve * dt;
        }

        let damping = (-params.damping * dt).exp();
        if self.curvature_accumulator.abs() >= params.sensitivity {
            let shaped = self.curvature_accumulator.abs().powf(params.exponent);
            let contribution =
                params.gain * vel.length() * shaped * self.curvature_accumulator.signum() * dt;
            self.spin_rate = (self.spin_rate + contribution).clamp(-params.max_spin, params.max_spin);
        }
        self.spin_rate *= damping;

        self.last_screen_pos = current_screen_pos;
        self.last_screen_vel = vel;
        self.spin_rate
    }

    pub fn spin_rate(&self) -> f32 {
        self.spin_rate
    }

    pub fn curvature(&self) -> f32 {
        self.curvature_accumulator
    }
}
