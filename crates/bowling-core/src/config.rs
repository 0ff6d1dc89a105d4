//! Tuning configuration for the simulation, spin filter, aiming and throws.
//!
//! Every value here is a feel/tuning constant rather than a physical model.
//! The defaults are what the game ships with; a JSON file can override any
//! subset of fields.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Error type for loading tuning files.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read tuning file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid tuning json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid tuning value: {0}")]
    Invalid(String),
}

/// Rigid-body world, lane geometry and impulse tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    /// Fixed physics sub-step in seconds.
    pub fixed_dt: f32,
    /// Upper bound on sub-steps run by a single `step` call.
    pub max_substeps: u32,
    pub gravity: [f32; 3],

    pub ball_radius: f32,
    pub ball_mass: f32,
    pub ball_friction: f32,
    pub ball_restitution: f32,

    pub pin_half_height: f32,
    pub pin_radius: f32,
    pub pin_mass: f32,
    pub pin_friction: f32,
    pub pin_restitution: f32,
    pub pin_linear_damping: f32,
    pub pin_angular_damping: f32,
    /// Damping for pins past the tilt threshold. A cylinder on its side
    /// otherwise rolls across the deck for a long time.
    pub fallen_pin_linear_damping: f32,
    pub fallen_pin_angular_damping: f32,
    /// Tilt from upright (radians) past which a pin counts as down.
    pub pin_tilt_threshold: f32,

    /// Lane centre line on the x axis. The ball travels toward -z.
    pub lane_center_x: f32,
    pub lane_surface_y: f32,
    pub foul_line_z: f32,
    /// Distance from the foul line to the head pin.
    pub lane_length: f32,
    pub lane_half_width: f32,

    /// Peak centering force in newtons.
    pub centering_strength: f32,
    /// Lane fraction where the centering bell peaks.
    pub centering_peak: f32,
    /// Width of the centering bell as a lane fraction.
    pub centering_width: f32,
    /// Exponent applied to the normalized lateral offset (> 1 is super-linear).
    pub centering_exponent: f32,
    pub rolling_height_tolerance: f32,
    pub rolling_max_vertical_speed: f32,
    pub rolling_min_forward_speed: f32,

    /// Lateral velocity gained per second per unit of `angvel × forward`.
    pub curve_coupling: f32,
    /// Lane fraction of travel where curve starts to take effect.
    pub curve_start: f32,
    /// Lane fraction of travel where curve reaches full effect.
    pub curve_full: f32,

    /// Base lateral impulse handed to a pin on contact, per unit of spin.
    pub pin_linear_impulse: f32,
    /// Base angular impulse handed to a pin on contact, per unit of spin.
    pub pin_angular_impulse: f32,
    /// Relative amplitude of the per-pin wobble (0 disables it).
    pub wobble_amount: f32,
    /// Seed for the deterministic wobble.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            fixed_dt: 0.005,
            max_substeps: 32,
            gravity: [0.0, -9.81, 0.0],

            ball_radius: 0.11,
            ball_mass: 6.5,
            ball_friction: 0.15,
            ball_restitution: 0.05,

            pin_half_height: 0.19,
            pin_radius: 0.06,
            pin_mass: 1.53,
            pin_friction: 0.5,
            pin_restitution: 0.2,
            pin_linear_damping: 0.1,
            pin_angular_damping: 0.3,
            fallen_pin_linear_damping: 1.0,
            fallen_pin_angular_damping: 4.0,
            pin_tilt_threshold: 45f32.to_radians(),

            lane_center_x: 0.0,
            lane_surface_y: 0.0,
            foul_line_z: 0.0,
            lane_length: 18.29,
            lane_half_width: 0.53,

            centering_strength: 6.0,
            centering_peak: 0.35,
            centering_width: 0.25,
            centering_exponent: 1.5,
            rolling_height_tolerance: 0.02,
            rolling_max_vertical_speed: 0.05,
            rolling_min_forward_speed: 0.5,

            curve_coupling: 0.25,
            curve_start: 0.5,
            curve_full: 0.85,

            pin_linear_impulse: 0.04,
            pin_angular_impulse: 0.35,
            wobble_amount: 0.35,
            seed: 0x5eed_b0b1,
        }
    }
}

/// Pointer-curvature spin filter tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpinConfig {
    pub gain: f32,
    /// Exponential damping rate of the spin value (1/s).
    pub damping: f32,
    /// Dead-zone for both the per-sample curvature and the accumulator.
    pub sensitivity: f32,
    /// Time constant (s) of the accumulator forget inside the dead-zone.
    pub decay_time: f32,
    /// Power-law shaping of accumulated curvature (1.0 is linear).
    pub exponent: f32,
    /// Backward pointer speed that cancels spin intent.
    pub cancel_epsilon: f32,
    /// Spin magnitude cap.
    pub max_spin: f32,
}

impl Default for SpinConfig {
    fn default() -> Self {
        Self {
            gain: 40.0,
            damping: 1.5,
            sensitivity: 0.01,
            decay_time: 0.25,
            exponent: 0.75,
            cancel_epsilon: 1e-4,
            max_spin: 30.0,
        }
    }
}

/// Screen-to-lane aim mapping and launch speed limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AimConfig {
    /// Metres of lateral travel per unit of normalized screen x.
    pub lateral_scale: f32,
    /// Metres of forward travel per unit of normalized screen y.
    pub depth_scale: f32,
    /// Maximum height the ball is lifted while aiming.
    pub lift_height: f32,
    /// Screen distance over which the lift ramps in.
    pub lift_range: f32,
    pub max_launch_speed: f32,
    pub min_launch_speed: f32,
    /// Largest factor a weak gesture may be scaled up by.
    pub forgiveness_max_scale: f32,
}

impl Default for AimConfig {
    fn default() -> Self {
        Self {
            lateral_scale: 0.6,
            depth_scale: 1.5,
            lift_height: 0.2,
            lift_range: 0.3,
            max_launch_speed: 9.0,
            min_launch_speed: 3.0,
            forgiveness_max_scale: 2.5,
        }
    }
}

/// Settle detection and throw timing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ThrowConfig {
    /// Combined linear + angular speed below which a body is still.
    pub stillness_threshold: f32,
    /// Bodies below this height are gone (gutter / off the deck).
    pub floor_y: f32,
    /// Physics keeps running at least this long after release.
    pub min_throw_time: f32,
    /// A throw is force-completed after this long.
    pub max_throw_time: f32,
}

impl Default for ThrowConfig {
    fn default() -> Self {
        Self {
            stillness_threshold: 0.05,
            floor_y: -0.25,
            min_throw_time: 1.0,
            max_throw_time: 12.0,
        }
    }
}

/// Complete tuning set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TuningConfig {
    pub simulation: SimulationConfig,
    pub spin: SpinConfig,
    pub aim: AimConfig,
    pub throw: ThrowConfig,
}

impl TuningConfig {
    /// Parses a configuration from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration to pretty JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reads and parses a tuning file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Rejects values that would make the fixed-step loop or the timers
    /// meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sim = &self.simulation;
        if !(sim.fixed_dt > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "simulation.fixed_dt must be positive, got {}",
                sim.fixed_dt
            )));
        }
        if sim.max_substeps == 0 {
            return Err(ConfigError::Invalid(
                "simulation.max_substeps must be at least 1".to_string(),
            ));
        }
        if sim.curve_full <= sim.curve_start {
            return Err(ConfigError::Invalid(
                "simulation.curve_full must exceed simulation.curve_start".to_string(),
            ));
        }
        if self.throw.max_throw_time < self.throw.min_throw_time {
            return Err(ConfigError::Invalid(
                "throw.max_throw_time must not be below throw.min_throw_time".to_string(),
            ));
        }
        Ok(())
    }
}
