//! ECS components for the ball and pin entities.

use bevy::prelude::*;

/// Marker for the ball entity.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Ball;

/// A pin entity, mirroring one rack slot.
#[derive(Component, Debug, Clone, Copy)]
pub struct Pin {
    /// Rack slot (0 is the head pin).
    pub slot: usize,
    /// Whether the pin was down at the last completion check.
    pub fallen: bool,
}

impl Pin {
    pub fn new(slot: usize) -> Self {
        Self {
            slot,
            fallen: false,
        }
    }
}
