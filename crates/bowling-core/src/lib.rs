//! Strike-Lane Core Library
//!
//! Throw simulation and scoring for ten-pin bowling using `Rapier3D` with
//! deterministic behavior.
//!
//! Pointer input steers a kinematic ball, the solver takes over on release,
//! settled throws are counted and fed to a ten-frame scoreboard. The optional
//! `bevy` feature adds a headless plugin around the same controller.

#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod aim;
pub mod config;
pub mod contact;
pub mod controller;
pub mod lane;
pub mod physics;
pub mod score;
pub mod simulation;
pub mod spin;
pub mod util;

// Bevy integration
#[cfg(feature = "bevy")]
pub mod bevy;

pub use config::{AimConfig, ConfigError, SimulationConfig, SpinConfig, ThrowConfig, TuningConfig};
pub use contact::{PendingImpulse, PinImpactObserver};
pub use controller::{RollReport, ThrowController, ThrowPhase};
pub use lane::{LaneMesh, PIN_SPACING, default_ball_start, default_pin_spots, standard_pin_rack};
pub use physics::{PHYSICS_DT, PhysicsWorld, default_gravity};
pub use score::{Frame, FrameRow, ScoreError, Scoreboard};
pub use simulation::{BallMode, BodyPose, BowlingSimulation, PIN_COUNT, SimulationError};
pub use spin::SpinTracker;
