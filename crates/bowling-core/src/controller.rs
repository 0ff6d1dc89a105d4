//! Throw phase machine.
//!
//! Pointer input steers the ball while aiming, the simulation takes over on
//! release, and once everything settles the knocked pins go to the
//! scoreboard and the lane is re-racked for the next roll.

use glam::Vec2;
use rapier3d::prelude::{Rotation, Vector};
use serde::{Deserialize, Serialize};

use crate::aim::{aim_target, limit_step};
use crate::config::TuningConfig;
use crate::lane::{LaneMesh, default_ball_start, default_pin_spots};
use crate::score::{ScoreError, Scoreboard};
use crate::simulation::{BowlingSimulation, PIN_COUNT, SimulationError};
use crate::spin::SpinTracker;

/// Phase of the current throw.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub enum ThrowPhase {
    /// Ball parked, waiting for the pointer.
    #[default]
    Idle,
    /// Pointer held; the ball follows it.
    Aim,
    /// Ball released; physics runs.
    Throw { elapsed: f32 },
    /// Game over, waiting for a restart.
    Result,
}

/// Outcome of one settled throw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollReport {
    /// Pins credited to this roll.
    pub knocked: u8,
    /// Frame the roll was scored in (0-based).
    pub frame_index: usize,
    pub frame_completed: bool,
    pub game_finished: bool,
}

/// Drives one player's game from pointer input and frame time.
#[derive(Debug)]
pub struct ThrowController {
    sim: BowlingSimulation,
    scoreboard: Scoreboard,
    spin: SpinTracker,
    tuning: TuningConfig,
    phase: ThrowPhase,
    pin_spots: [Vector; PIN_COUNT],
    ball_start: Vector,
    anchor: Vec2,
    carried: Vector,
    aim_yaw: f32,
    /// Pins already scored earlier in the current frame.
    credited: usize,
}

impl ThrowController {
    pub fn new(
        sim: BowlingSimulation,
        pin_spots: [Vector; PIN_COUNT],
        ball_start: Vector,
        tuning: TuningConfig,
    ) -> Self {
        Self {
            sim,
            scoreboard: Scoreboard::new(),
            spin: SpinTracker::new(),
            tuning,
            phase: ThrowPhase::Idle,
            pin_spots,
            ball_start,
            anchor: Vec2::ZERO,
            carried: ball_start,
            aim_yaw: 0.0,
            credited: 0,
        }
    }

    /// Controller over a flat lane with the standard rack.
    pub fn with_flat_lane(tuning: TuningConfig) -> Result<Self, SimulationError> {
        let lane = LaneMesh::flat(&tuning.simulation);
        let pin_spots = default_pin_spots(&tuning.simulation);
        let ball_start = default_ball_start(&tuning.simulation);
        let sim = BowlingSimulation::new(&lane, &pin_spots, ball_start, tuning.simulation.clone())?;
        Ok(Self::new(sim, pin_spots, ball_start, tuning))
    }

    pub fn phase(&self) -> ThrowPhase {
        self.phase
    }

    pub fn scoreboard(&self) -> &Scoreboard {
        &self.scoreboard
    }

    pub fn simulation(&self) -> &BowlingSimulation {
        &self.sim
    }

    pub fn tuning(&self) -> &TuningConfig {
        &self.tuning
    }

    pub fn spin_rate(&self) -> f32 {
        self.spin.spin_rate()
    }

    pub fn pins_credited(&self) -> usize {
        self.credited
    }

    /// Starts aiming. Returns `false` outside `Idle`.
    pub fn pointer_down(&mut self, pos: Vec2) -> bool {
        if self.phase != ThrowPhase::Idle {
            return false;
        }
        self.anchor = pos;
        self.spin.reset_at(pos);
        self.carried = self.ball_start;
        self.aim_yaw = 0.0;
        self.sim.set_spin_intent(0.0);
        self.sim
            .set_manual_ball_pose(self.ball_start, Rotation::IDENTITY, 0.0);

        self.phase = ThrowPhase::Aim;
        tracing::debug!(x = pos.x, y = pos.y, "[controller] aim started");
        true
    }

    /// Feeds one pointer sample while aiming. Ignored in other phases.
    pub fn pointer_move(&mut self, pos: Vec2, dt: f32) {
        if self.phase != ThrowPhase::Aim {
            return;
        }
        let spin_rate = self.spin.update(pos, dt, &self.tuning.spin);
        let target = aim_target(self.anchor, pos, self.ball_start, &self.tuning.aim);
        self.carried = limit_step(self.carried, target, dt, &self.tuning.aim);
        if dt > 0.0 {
            self.aim_yaw += spin_rate * dt;
        }

        self.sim.set_spin_intent(spin_rate);
        self.sim
            .set_manual_ball_pose(self.carried, Rotation::from_rotation_y(self.aim_yaw), dt);
    }

    /// Lets go of the ball. Returns `false` when not aiming.
    pub fn pointer_up(&mut self) -> bool {
        if self.phase != ThrowPhase::Aim {
            return false;
        }
        if !self.sim.release_ball_to_physics() {
            tracing::warn!("[controller] release refused, returning ball");
            self.sim.reset_standing(&self.pin_spots, self.ball_start);
            self.phase = ThrowPhase::Idle;
            return false;
        }
        self.phase = ThrowPhase::Throw { elapsed: 0.0 };
        tracing::info!(spin = self.spin.spin_rate(), "[controller] ball thrown");
        true
    }

    /// Advances frame time. Returns a report when a throw settles.
    pub fn tick(&mut self, dt: f32) -> Result<Option<RollReport>, ScoreError> {
        let ThrowPhase::Throw { elapsed } = self.phase else {
            return Ok(None);
        };
        let dt = dt.max(0.0);
        self.sim.step(dt);
        let elapsed = elapsed + dt;

        let throw = &self.tuning.throw;
        let mut down = None;
        if elapsed >= throw.min_throw_time {
            down = self
                .sim
                .check_throw_complete(throw.stillness_threshold, throw.floor_y);
        }
        if down.is_none() && elapsed >= throw.max_throw_time {
            tracing::warn!(elapsed, "[controller] throw did not settle, forcing completion");
            down = Some(self.sim.count_pins_down(throw.floor_y));
        }

        match down {
            Some(down) => self.finish_throw(down).map(Some),
            None => {
                self.phase = ThrowPhase::Throw { elapsed };
                Ok(None)
            }
        }
    }

    fn finish_throw(&mut self, down: usize) -> Result<RollReport, ScoreError> {
        let knocked = u8::try_from(down.saturating_sub(self.credited).min(PIN_COUNT))
            .unwrap_or(u8::MAX);
        let frame_index = self.scoreboard.current_frame_index();

        let frame_completed = match self.scoreboard.add_roll(knocked) {
            Ok(completed) => completed,
            Err(err) => {
                self.rack_full();
                self.phase = ThrowPhase::Idle;
                return Err(err);
            }
        };

        if frame_completed || down >= PIN_COUNT {
            self.rack_full();
        } else {
            self.sim.reset_standing(&self.pin_spots, self.ball_start);
            self.credited = down;
        }

        let game_finished = self.scoreboard.is_game_finished();
        self.phase = if game_finished {
            ThrowPhase::Result
        } else {
            ThrowPhase::Idle
        };

        tracing::info!(
            frame = frame_index + 1,
            knocked,
            total = self.scoreboard.total_score(),
            game_finished,
            "[controller] roll scored"
        );
        Ok(RollReport {
            knocked,
            frame_index,
            frame_completed,
            game_finished,
        })
    }

    fn rack_full(&mut self) {
        self.sim.reset(&self.pin_spots, self.ball_start);
        self.credited = 0;
    }

    /// Abandons whatever is in flight and returns to `Idle`. Pins scored
    /// earlier in the frame stay down. From `Result` this is a restart.
    pub fn force_reset(&mut self) {
        if self.phase == ThrowPhase::Result {
            self.restart();
            return;
        }
        if self.credited == 0 {
            self.sim.reset(&self.pin_spots, self.ball_start);
        } else {
            self.sim.restore_standing(&self.pin_spots, self.ball_start);
        }
        self.spin.reset_at(self.anchor);
        self.sim.set_spin_intent(0.0);
        self.phase = ThrowPhase::Idle;
        tracing::debug!("[controller] forced reset");
    }

    /// Clears the scoreboard and racks a new game.
    pub fn restart(&mut self) {
        self.scoreboard.reset();
        self.rack_full();
        self.spin = SpinTracker::new();
        self.sim.set_spin_intent(0.0);
        self.phase = ThrowPhase::Idle;
        tracing::info!("[controller] new game");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn controller() -> ThrowController {
        ThrowController::with_flat_lane(TuningConfig::default()).unwrap()
    }

    /// Straight forward swing from the bottom of the screen.
    fn swing(ctl: &mut ThrowController, dx: f32) {
        let start = Vec2::new(0.5, 0.9);
        assert!(ctl.pointer_down(start));
        for i in 1..=12 {
            #[allow(clippy::cast_precision_loss)]
            let t = i as f32 / 12.0;
            ctl.pointer_move(start + Vec2::new(dx * t, -0.6 * t), DT);
        }
        assert!(ctl.pointer_up());
    }

    fn run_throw(ctl: &mut ThrowController) -> RollReport {
        for _ in 0..(60 * 30) {
            if let Some(report) = ctl.tick(DT).unwrap() {
                return report;
            }
        }
        panic!("throw never finished");
    }

    #[test]
    fn test_phase_transitions() {
        let mut ctl = controller();
        assert_eq!(ctl.phase(), ThrowPhase::Idle);
        assert!(!ctl.pointer_up());
        assert_eq!(ctl.tick(DT), Ok(None));

        assert!(ctl.pointer_down(Vec2::new(0.5, 0.9)));
        assert_eq!(ctl.phase(), ThrowPhase::Aim);
        assert!(!ctl.pointer_down(Vec2::new(0.5, 0.9)));

        ctl.pointer_move(Vec2::new(0.5, 0.8), DT);
        ctl.pointer_move(Vec2::new(0.5, 0.7), DT);
        assert!(ctl.pointer_up());
        assert!(matches!(ctl.phase(), ThrowPhase::Throw { .. }));
    }

    #[test]
    fn test_aim_carries_ball() {
        let mut ctl = controller();
        let start = ctl.simulation().ball_pose().position;
        ctl.pointer_down(Vec2::new(0.5, 0.9));
        ctl.pointer_move(Vec2::new(0.5, 0.85), DT);
        ctl.pointer_move(Vec2::new(0.5, 0.8), DT);
        let pos = ctl.simulation().ball_pose().position;
        assert!(pos.z < start.z);
        assert!(ctl.simulation().ball_velocity().z < 0.0);
    }

    #[test]
    fn test_throw_waits_for_grace_time() {
        let mut ctl = controller();
        swing(&mut ctl, 0.0);
        let grace = ctl.tuning().throw.min_throw_time;
        let mut t = 0.0;
        while t + DT < grace {
            assert_eq!(ctl.tick(DT), Ok(None));
            t += DT;
        }
    }

    #[test]
    fn test_roll_is_scored() {
        let mut ctl = controller();
        swing(&mut ctl, 0.0);
        let report = run_throw(&mut ctl);

        assert_eq!(report.frame_index, 0);
        assert!(!report.game_finished);
        assert_eq!(ctl.phase(), ThrowPhase::Idle);
        assert_eq!(
            ctl.scoreboard().frames()[0].roll1,
            Some(report.knocked)
        );
        if report.frame_completed {
            assert_eq!(report.knocked, 10);
            assert_eq!(ctl.pins_credited(), 0);
        } else {
            assert_eq!(ctl.pins_credited(), usize::from(report.knocked));
        }
        assert_eq!(
            ctl.simulation().ball_pose().position,
            default_ball_start(&ctl.tuning().simulation)
        );
    }

    #[test]
    fn test_gutter_ball_scores_zero() {
        let mut ctl = controller();
        swing(&mut ctl, 0.9);
        let report = run_throw(&mut ctl);
        assert_eq!(report.knocked, 0);
        assert!(!report.frame_completed);
    }

    #[test]
    fn test_force_reset_returns_to_idle() {
        let mut ctl = controller();
        ctl.pointer_down(Vec2::new(0.5, 0.9));
        ctl.pointer_move(Vec2::new(0.5, 0.7), DT);
        ctl.force_reset();
        assert_eq!(ctl.phase(), ThrowPhase::Idle);
        assert_eq!(
            ctl.simulation().ball_pose().position,
            default_ball_start(&ctl.tuning().simulation)
        );

        swing(&mut ctl, 0.0);
        ctl.tick(DT).unwrap();
        ctl.force_reset();
        assert_eq!(ctl.phase(), ThrowPhase::Idle);
        assert_eq!(ctl.scoreboard().total_score(), 0);
        assert_eq!(ctl.scoreboard().frames()[0].roll1, None);
    }

    #[test]
    fn test_unsettled_throw_is_forced_at_timeout() {
        let mut tuning = TuningConfig::default();
        // Nothing is ever still enough.
        tuning.throw.stillness_threshold = -1.0;
        tuning.throw.max_throw_time = 3.0;
        let mut ctl = ThrowController::with_flat_lane(tuning).unwrap();
        swing(&mut ctl, 0.0);

        let mut ticks = 0u32;
        let report = loop {
            ticks += 1;
            if let Some(report) = ctl.tick(DT).unwrap() {
                break report;
            }
            assert!(ticks < 60 * 10, "timeout never fired");
        };

        #[allow(clippy::cast_precision_loss)]
        let elapsed = ticks as f32 * DT;
        assert!(elapsed >= 3.0 - 1e-3, "forced after only {elapsed} s");
        assert!(elapsed < 3.0 + 2.0 * DT);
        assert_eq!(report.frame_index, 0);
        assert_eq!(ctl.scoreboard().frames()[0].roll1, Some(report.knocked));
        assert_eq!(ctl.phase(), ThrowPhase::Idle);
    }

    /// Puts the scoreboard at the start of the tenth frame.
    fn into_tenth_frame(ctl: &mut ThrowController) {
        for _ in 0..18 {
            ctl.scoreboard.add_roll(0).unwrap();
        }
        assert_eq!(ctl.scoreboard.current_frame_index(), 9);
    }

    #[test]
    fn test_tenth_frame_strike_reracks_all_pins() {
        let mut ctl = controller();
        into_tenth_frame(&mut ctl);

        let report = ctl.finish_throw(PIN_COUNT).unwrap();
        assert_eq!(report.knocked, 10);
        assert_eq!(report.frame_index, 9);
        assert!(!report.frame_completed);
        assert!(!report.game_finished);

        assert_eq!(ctl.pins_credited(), 0);
        assert_eq!(ctl.scoreboard().standing_pins(), 10);
        let floor = ctl.tuning().throw.floor_y;
        assert_eq!(ctl.sim.count_pins_down(floor), 0);
        assert_eq!(ctl.phase(), ThrowPhase::Idle);
    }

    #[test]
    fn test_tenth_frame_spare_reracks_all_pins() {
        let mut ctl = controller();
        into_tenth_frame(&mut ctl);

        let first = ctl.finish_throw(4).unwrap();
        assert!(!first.frame_completed);
        assert_eq!(ctl.pins_credited(), 4);

        // The second roll clears the remaining six.
        let second = ctl.finish_throw(PIN_COUNT).unwrap();
        assert_eq!(second.knocked, 6);
        assert!(!second.frame_completed);
        assert!(ctl.scoreboard().frames()[9].is_spare);

        assert_eq!(ctl.pins_credited(), 0);
        assert_eq!(ctl.scoreboard().standing_pins(), 10);
        let floor = ctl.tuning().throw.floor_y;
        assert_eq!(ctl.sim.count_pins_down(floor), 0);
    }

    #[test]
    fn test_full_game_reaches_result() {
        let mut tuning = TuningConfig::default();
        tuning.throw.max_throw_time = 4.0;
        let mut ctl = ThrowController::with_flat_lane(tuning).unwrap();

        let mut rolls = 0;
        while ctl.phase() != ThrowPhase::Result {
            swing(&mut ctl, 0.9);
            run_throw(&mut ctl);
            rolls += 1;
            assert!(rolls <= 21);
        }
        assert_eq!(rolls, 20);
        assert!(ctl.scoreboard().is_game_finished());
        assert!(!ctl.pointer_down(Vec2::new(0.5, 0.9)));

        ctl.force_reset();
        assert_eq!(ctl.phase(), ThrowPhase::Idle);
        assert_eq!(*ctl.scoreboard(), Scoreboard::new());
    }
}
