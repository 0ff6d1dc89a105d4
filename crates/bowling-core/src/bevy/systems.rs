//! Systems that feed the controller and mirror its state into the ECS.

use bevy::prelude::*;

use crate::bevy::components::{Ball, Pin};
use crate::bevy::events::{PointerMessage, ResetCommand, RollRejectedEvent, RollScoredEvent};
use crate::bevy::plugin::BowlingState;
use crate::bevy::resources::BowlingRes;
use crate::controller::ThrowPhase;
use crate::simulation::{BodyPose, PIN_COUNT};

fn to_transform(pose: BodyPose) -> Transform {
    Transform::from_translation(Vec3::from_array(pose.position.to_array()))
        .with_rotation(Quat::from_array(pose.rotation.to_array()))
}

/// Spawns one ball entity and one entity per pin slot.
pub fn spawn_bodies(mut commands: Commands, bowling: Res<BowlingRes>) {
    let sim = bowling.controller.simulation();
    commands.spawn((Ball, to_transform(sim.ball_pose())));
    for slot in 0..PIN_COUNT {
        if let Some(pose) = sim.pin_pose(slot) {
            commands.spawn((Pin::new(slot), to_transform(pose)));
        }
    }
    tracing::info!("[bowling] spawned ball and {} pins", PIN_COUNT);
}

/// Routes pointer messages to the controller.
pub fn handle_pointer_input(
    mut bowling: ResMut<BowlingRes>,
    mut pointer: MessageReader<PointerMessage>,
) {
    for message in pointer.read() {
        let controller = &mut bowling.controller;
        match *message {
            PointerMessage::Down { position } => {
                controller.pointer_down(glam::Vec2::new(position.x, position.y));
            }
            PointerMessage::Move { position, dt } => {
                controller.pointer_move(glam::Vec2::new(position.x, position.y), dt);
            }
            PointerMessage::Up => {
                controller.pointer_up();
            }
        }
    }
}

/// Applies reset requests.
pub fn handle_reset_commands(
    mut bowling: ResMut<BowlingRes>,
    mut commands: MessageReader<ResetCommand>,
) {
    for command in commands.read() {
        match command {
            ResetCommand::Force => bowling.controller.force_reset(),
            ResetCommand::Restart => {
                bowling.controller.restart();
                bowling.last_report = None;
            }
        }
    }
}

/// Advances the throw by frame time and publishes settled rolls.
pub fn tick_throw(
    mut bowling: ResMut<BowlingRes>,
    time: Res<Time>,
    mut scored: MessageWriter<RollScoredEvent>,
    mut rejected: MessageWriter<RollRejectedEvent>,
) {
    match bowling.controller.tick(time.delta_secs()) {
        Ok(Some(report)) => {
            bowling.last_report = Some(report);
            scored.write(RollScoredEvent(report));
        }
        Ok(None) => {}
        Err(err) => {
            tracing::error!(%err, "[bowling] throw result rejected");
            rejected.write(RollRejectedEvent(err));
        }
    }
}

/// Copies ball and pin poses onto their transforms.
pub fn sync_poses(
    bowling: Res<BowlingRes>,
    mut balls: Query<&mut Transform, (With<Ball>, Without<Pin>)>,
    mut pins: Query<(&mut Pin, &mut Transform), Without<Ball>>,
) {
    let sim = bowling.controller.simulation();
    for mut transform in &mut balls {
        *transform = to_transform(sim.ball_pose());
    }
    for (mut pin, mut transform) in &mut pins {
        if let Some(pose) = sim.pin_pose(pin.slot) {
            *transform = to_transform(pose);
        }
        pin.fallen = sim.pin_fallen(pin.slot);
    }
}

/// Keeps [`BowlingState`] in step with the controller phase.
pub fn sync_game_state(
    bowling: Res<BowlingRes>,
    state: Res<State<BowlingState>>,
    mut next: ResMut<NextState<BowlingState>>,
) {
    let wanted = if bowling.controller.phase() == ThrowPhase::Result {
        BowlingState::GameOver
    } else {
        BowlingState::Playing
    };
    if *state.get() != wanted {
        tracing::info!(?wanted, "[bowling] game state changed");
        next.set(wanted);
    }
}
