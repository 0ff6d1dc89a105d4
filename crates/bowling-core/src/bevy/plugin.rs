//! Bevy plugin for the bowling game.

use bevy::prelude::*;

use crate::bevy::events::*;
use crate::bevy::resources::BowlingRes;
use crate::bevy::systems;
use crate::config::TuningConfig;
use crate::controller::ThrowController;

/// Whether a game is in progress.
#[derive(States, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BowlingState {
    #[default]
    Playing,
    GameOver,
}

/// Ordering of the bowling systems inside `Update`.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum BowlingSet {
    /// Pointer and reset messages reach the controller.
    Input,
    /// Physics step and throw completion.
    Simulate,
    /// Controller state mirrored into the ECS.
    Sync,
}

/// Headless plugin: a flat lane with the standard rack, driven by
/// [`PointerMessage`]s and frame time.
///
/// Requires `StatesPlugin` (part of `DefaultPlugins`).
///
/// # Panics
///
/// When the tuning is invalid or the physics world cannot be built.
#[derive(Default)]
pub struct BowlingPlugin {
    pub tuning: TuningConfig,
}

impl Plugin for BowlingPlugin {
    fn build(&self, app: &mut App) {
        // Nothing can run without a world, so a bad setup stops the app here.
        if let Err(err) = self.tuning.validate() {
            tracing::error!(%err, "[bowling] invalid tuning");
            panic!("[bowling] invalid tuning: {err}");
        }
        let controller = match ThrowController::with_flat_lane(self.tuning.clone()) {
            Ok(controller) => controller,
            Err(err) => {
                tracing::error!(%err, "[bowling] failed to build the physics world");
                panic!("[bowling] failed to build the physics world: {err}");
            }
        };

        app.init_state::<BowlingState>();
        app.insert_resource(BowlingRes::new(controller));

        app.add_message::<PointerMessage>()
            .add_message::<ResetCommand>()
            .add_message::<RollScoredEvent>()
            .add_message::<RollRejectedEvent>();

        app.configure_sets(
            Update,
            (BowlingSet::Input, BowlingSet::Simulate, BowlingSet::Sync).chain(),
        );

        app.add_systems(Startup, systems::spawn_bodies);
        app.add_systems(
            Update,
            (systems::handle_reset_commands, systems::handle_pointer_input)
                .chain()
                .in_set(BowlingSet::Input),
        );
        app.add_systems(Update, systems::tick_throw.in_set(BowlingSet::Simulate));
        app.add_systems(
            Update,
            (systems::sync_poses, systems::sync_game_state).in_set(BowlingSet::Sync),
        );
    }
}

#[cfg(test)]
mod tests {
    use bevy::prelude::*;

    use crate::bevy::components::{Ball, Pin};
    use crate::bevy::events::{PointerMessage, ResetCommand};
    use crate::bevy::plugin::{BowlingPlugin, BowlingState};
    use crate::bevy::resources::BowlingRes;
    use crate::config::TuningConfig;
    use crate::bevy::test_utils::TestApp;
    use crate::controller::ThrowPhase;
    use crate::simulation::PIN_COUNT;

    #[test]
    fn test_spawns_ball_and_pins() {
        let mut app = TestApp::new();
        let world = app.world_mut();
        let balls = world.query::<&Ball>().iter(world).count();
        let pins = world.query::<&Pin>().iter(world).count();
        assert_eq!(balls, 1);
        assert_eq!(pins, PIN_COUNT);
    }

    #[test]
    fn test_pointer_messages_drive_controller() {
        let mut app = TestApp::new();
        app.send(PointerMessage::Down {
            position: Vec2::new(0.5, 0.9),
        });
        app.update();
        assert_eq!(app.bowling().controller.phase(), ThrowPhase::Aim);

        app.swing_forward();
        assert!(matches!(
            app.bowling().controller.phase(),
            ThrowPhase::Throw { .. }
        ));
    }

    #[test]
    fn test_throw_is_scored_and_poses_synced() {
        let mut app = TestApp::new();
        app.send(PointerMessage::Down {
            position: Vec2::new(0.5, 0.9),
        });
        app.update();
        app.swing_forward();

        let report = app.run_until_scored(60 * 30).expect("throw should settle");
        assert_eq!(report.frame_index, 0);
        assert_eq!(app.bowling().controller.phase(), ThrowPhase::Idle);

        let expected = app.bowling().controller.simulation().ball_pose().position;
        let world = app.world_mut();
        let transform = world
            .query_filtered::<&Transform, With<Ball>>()
            .single(world)
            .unwrap();
        assert!((transform.translation.z - expected.z).abs() < 1e-6);
    }

    #[test]
    fn test_restart_command_clears_game() {
        let mut app = TestApp::new();
        app.send(PointerMessage::Down {
            position: Vec2::new(0.5, 0.9),
        });
        app.update();
        app.swing_forward();
        app.run_until_scored(60 * 30).expect("throw should settle");

        app.send(ResetCommand::Restart);
        app.update();
        let bowling = app.bowling();
        assert!(bowling.last_report.is_none());
        assert_eq!(bowling.controller.scoreboard().frames()[0].roll1, None);
        assert_eq!(
            *app.world().resource::<State<BowlingState>>().get(),
            BowlingState::Playing
        );
    }

    #[test]
    #[should_panic(expected = "invalid tuning")]
    fn test_invalid_tuning_stops_startup() {
        let mut tuning = TuningConfig::default();
        tuning.simulation.fixed_dt = 0.0;

        let mut app = App::new();
        app.add_plugins(MinimalPlugins);
        app.add_plugins(bevy::state::app::StatesPlugin);
        app.add_plugins(BowlingPlugin { tuning });
    }

    #[test]
    fn test_second_roll_is_reported_once() {
        let mut app = TestApp::new();
        app.send(PointerMessage::Down {
            position: Vec2::new(0.5, 0.9),
        });
        app.update();
        app.swing_forward();
        let first = app.run_until_scored(60 * 30).expect("first throw should settle");
        // The first report is still buffered but must not be seen again.
        assert!(app.run_until_scored(1).is_none());

        app.send(PointerMessage::Down {
            position: Vec2::new(0.5, 0.9),
        });
        app.update();
        app.swing_forward();
        let second = app.run_until_scored(60 * 30).expect("second throw should settle");

        let frames = app.bowling().controller.scoreboard().frames();
        let expected = if first.frame_completed {
            assert_eq!(second.frame_index, 1);
            frames[1].roll1
        } else {
            assert_eq!(second.frame_index, 0);
            frames[0].roll2
        };
        assert_eq!(expected, Some(second.knocked));
    }

    #[test]
    fn test_bowling_res_is_registered() {
        let app = TestApp::new();
        assert!(app.world().get_resource::<BowlingRes>().is_some());
    }
}
