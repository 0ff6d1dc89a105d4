//! ECS messages between the host app and the bowling systems.

use bevy::prelude::*;

use crate::controller::RollReport;
use crate::score::ScoreError;

/// Pointer input in normalized screen coordinates (y grows toward the
/// player).
#[derive(Message, Debug, Clone, Copy, PartialEq)]
pub enum PointerMessage {
    Down { position: Vec2 },
    /// `dt` is the time since the previous pointer sample.
    Move { position: Vec2, dt: f32 },
    Up,
}

/// Reset requests from the UI.
#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetCommand {
    /// Abandon the current throw.
    Force,
    /// Start a new game.
    Restart,
}

/// Fired once per settled throw.
#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollScoredEvent(pub RollReport);

/// Fired when the scoreboard refuses a throw result.
#[derive(Message, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollRejectedEvent(pub ScoreError);
