//! Test utilities for headless Bevy integration tests.
//!
//! Provides `TestApp`, a wrapper around `bevy::app::App` that uses
//! `MinimalPlugins` + `BowlingPlugin` with a fixed frame time, so every
//! `update` advances the game by exactly one 60 Hz frame.

use std::time::Duration;

use bevy::ecs::message::MessageCursor;
use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;

use crate::bevy::events::{PointerMessage, RollScoredEvent};
use crate::bevy::plugin::BowlingPlugin;
use crate::bevy::resources::BowlingRes;
use crate::controller::RollReport;

pub(crate) const FRAME_DT: f32 = 1.0 / 60.0;

/// A headless Bevy app wrapper for testing.
pub(crate) struct TestApp {
    pub app: App,
    /// Reads each roll report once across `run_until_scored` calls.
    scored: MessageCursor<RollScoredEvent>,
}

impl TestApp {
    pub fn new() -> Self {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins);
        app.add_plugins(bevy::state::app::StatesPlugin);
        app.add_plugins(BowlingPlugin::default());
        app.insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_secs_f32(
            FRAME_DT,
        )));
        // Run one update to run startup systems.
        app.update();
        Self {
            app,
            scored: MessageCursor::default(),
        }
    }

    pub fn update(&mut self) {
        self.app.update();
    }

    /// Queue a message for the next update.
    pub fn send<M: Message>(&mut self, message: M) {
        self.app.world_mut().write_message(message);
    }

    /// Twelve pointer samples straight up the screen, then release. One
    /// update per sample.
    pub fn swing_forward(&mut self) {
        for i in 1..=12 {
            #[allow(clippy::cast_precision_loss)]
            let t = i as f32 / 12.0;
            self.send(PointerMessage::Move {
                position: Vec2::new(0.5, 0.9 - 0.6 * t),
                dt: FRAME_DT,
            });
            self.update();
        }
        self.send(PointerMessage::Up);
        self.update();
    }

    /// Runs up to `max_frames` updates and returns the first roll report not
    /// returned before.
    pub fn run_until_scored(&mut self, max_frames: usize) -> Option<RollReport> {
        for _ in 0..max_frames {
            self.update();
            let messages = self.app.world().resource::<Messages<RollScoredEvent>>();
            if let Some(RollScoredEvent(report)) = self.scored.read(messages).last() {
                return Some(*report);
            }
        }
        None
    }

    pub fn bowling(&self) -> &BowlingRes {
        self.app.world().resource::<BowlingRes>()
    }

    pub fn world(&self) -> &World {
        self.app.world()
    }

    pub fn world_mut(&mut self) -> &mut World {
        self.app.world_mut()
    }
}
