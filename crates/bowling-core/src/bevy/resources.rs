//! ECS resources for the bowling game.

use bevy::prelude::*;

use crate::controller::{RollReport, ThrowController};

/// Bevy Resource wrapping the throw controller.
#[derive(Resource, Debug)]
pub struct BowlingRes {
    pub controller: ThrowController,
    /// Report of the most recent settled throw.
    pub last_report: Option<RollReport>,
}

impl BowlingRes {
    pub fn new(controller: ThrowController) -> Self {
        Self {
            controller,
            last_report: None,
        }
    }
}
