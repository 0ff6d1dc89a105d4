//! Bevy integration for the bowling core.
//!
//! Headless only: the plugin drives a [`ThrowController`](crate::controller::ThrowController)
//! from frame time and pointer messages, and mirrors ball and pin poses onto
//! `Transform`s. Rendering and input plumbing live in the host app.

pub mod components;
pub mod events;
pub mod plugin;
pub mod resources;
pub mod systems;

#[cfg(test)]
pub(crate) mod test_utils;

pub use components::*;
pub use events::*;
pub use plugin::{BowlingPlugin, BowlingSet, BowlingState};
pub use resources::*;
