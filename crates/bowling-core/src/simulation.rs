//! Ball, pins and lane inside one physics world.
//!
//! The ball is kinematic while the player carries it and dynamic once
//! released. Stepping runs a fixed sub-step accumulator; after every engine
//! update the lane centering force, the spin-to-curve nudge and any queued
//! pin impulses are applied.

use rapier3d::prelude::*;

use crate::config::SimulationConfig;
use crate::contact::PinImpactObserver;
use crate::lane::LaneMesh;
use crate::physics::{
    PhysicsWorld, USER_DATA_BALL, USER_DATA_LANE, USER_DATA_PIN, encode_user_data,
};
use crate::util::smoothstep;

/// Number of pins in a rack.
pub const PIN_COUNT: usize = 10;

/// Position samples closer than this are treated as duplicates.
const DUPLICATE_EPSILON: f32 = 1e-6;
/// Time constant (s) of the launch velocity filter.
const LAUNCH_FILTER_TIME: f32 = 0.04;

/// Errors raised while building the simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("lane vertex array has {0} floats, expected a non-empty multiple of 3")]
    LaneVertices(usize),
    #[error("lane index array has {0} entries, expected a non-empty multiple of 3")]
    LaneIndices(usize),
    #[error("lane index {index} out of range for {vertex_count} vertices")]
    LaneIndexOutOfRange { index: u32, vertex_count: usize },
    #[error("lane trimesh rejected: {0}")]
    LaneTrimesh(String),
}

/// World transform of one body, as handed to rendering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyPose {
    pub position: Vector,
    pub rotation: Rotation,
}

impl BodyPose {
    pub fn new(position: Vector) -> Self {
        Self {
            position,
            rotation: Rotation::IDENTITY,
        }
    }

    fn of(body: &RigidBody) -> Self {
        let t = body.translation();
        let r = body.rotation();
        Self {
            position: Vector::new(t.x, t.y, t.z),
            rotation: Rotation::from_xyzw(r.x, r.y, r.z, r.w),
        }
    }

    /// Angle in radians between the body's up axis and world up.
    pub fn tilt(&self) -> f32 {
        let up = self.rotation * Vector::Y;
        up.y.clamp(-1.0, 1.0).acos()
    }
}

/// Launch estimate built from successive carried poses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManualTrack {
    last_position: Vector,
    last_rotation: Rotation,
    filtered_velocity: Vector,
    angular_velocity: Vector,
    /// Time from duplicate samples still owed to the next distinct one.
    loaned_dt: f32,
}

impl ManualTrack {
    fn start(position: Vector, rotation: Rotation) -> Self {
        Self {
            last_position: position,
            last_rotation: rotation,
            filtered_velocity: Vector::ZERO,
            angular_velocity: Vector::ZERO,
            loaned_dt: 0.0,
        }
    }

    fn advance(self, position: Vector, rotation: Rotation, dt: f32) -> Self {
        if dt <= 0.0 {
            return self;
        }
        let elapsed = dt + self.loaned_dt;
        let delta = position - self.last_position;
        if delta.length_squared() <= DUPLICATE_EPSILON * DUPLICATE_EPSILON {
            return Self {
                loaned_dt: elapsed,
                ..self
            };
        }

        let instant = delta / elapsed;
        let alpha = 1.0 - (-elapsed / LAUNCH_FILTER_TIME).exp();
        let filtered_velocity = self.filtered_velocity + (instant - self.filtered_velocity) * alpha;

        let mut delta_rotation = rotation * self.last_rotation.inverse();
        if delta_rotation.w < 0.0 {
            delta_rotation = -delta_rotation;
        }
        let angular_velocity = delta_rotation.to_scaled_axis() / elapsed;

        Self {
            last_position: position,
            last_rotation: rotation,
            filtered_velocity,
            angular_velocity,
            loaned_dt: 0.0,
        }
    }

    pub fn velocity(&self) -> Vector {
        self.filtered_velocity
    }

    pub fn angular_velocity(&self) -> Vector {
        self.angular_velocity
    }

    pub fn loaned_dt(&self) -> f32 {
        self.loaned_dt
    }
}

/// Who drives the ball.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BallMode {
    /// Kinematic, parked at its start position.
    Idle,
    /// Kinematic, carried by the player.
    Manual(ManualTrack),
    /// Dynamic, owned by the solver. `origin` is where it was let go.
    Released { origin: Vector },
}

/// Lateral centering force (N) for a ball at `position`.
///
/// Bell-shaped along the lane, super-linear in the lateral offset and always
/// pointing back at the centre line.
pub fn centering_force(config: &SimulationConfig, position: Vector) -> f32 {
    let offset = position.x - config.lane_center_x;
    if offset == 0.0 || config.lane_half_width <= 0.0 || config.lane_length <= 0.0 {
        return 0.0;
    }
    let travel = ((config.foul_line_z - position.z) / config.lane_length).clamp(0.0, 1.0);
    let width = config.centering_width.max(f32::EPSILON);
    let bell = (-((travel - config.centering_peak) / width).powi(2)).exp();
    let normalized = (offset.abs() / config.lane_half_width).min(1.0);
    -offset.signum() * config.centering_strength * bell * normalized.powf(config.centering_exponent)
}

/// How much of the spin-to-curve coupling applies after `traveled` metres.
pub fn curve_effectiveness(config: &SimulationConfig, traveled: f32) -> f32 {
    smoothstep(
        config.curve_start * config.lane_length,
        config.curve_full * config.lane_length,
        traveled,
    )
}

/// The throw simulation: one ball, ten pins and a static lane.
#[derive(Debug)]
pub struct BowlingSimulation {
    world: PhysicsWorld,
    config: SimulationConfig,
    ball: RigidBodyHandle,
    pins: [RigidBodyHandle; PIN_COUNT],
    observer: PinImpactObserver,
    mode: BallMode,
    accumulator: f32,
    parked: [bool; PIN_COUNT],
    fallen: [bool; PIN_COUNT],
    ball_pose: BodyPose,
    pin_poses: [BodyPose; PIN_COUNT],
}

impl BowlingSimulation {
    /// Builds the world: the static lane trimesh, a kinematic ball parked at
    /// `ball_start` and ten dynamic pins.
    pub fn new(
        lane: &LaneMesh,
        pin_start: &[Vector; PIN_COUNT],
        ball_start: Vector,
        config: SimulationConfig,
    ) -> Result<Self, SimulationError> {
        let (points, triangles) = lane.to_trimesh()?;
        let gravity = Vector::new(config.gravity[0], config.gravity[1], config.gravity[2]);
        let mut world = PhysicsWorld::with_params(gravity, config.fixed_dt);

        let lane_collider =
            ColliderBuilder::trimesh_with_flags(points, triangles, TriMeshFlags::FIX_INTERNAL_EDGES)
            .map_err(|e| SimulationError::LaneTrimesh(format!("{e:?}")))?
            .friction(0.3)
            .user_data(encode_user_data(USER_DATA_LANE, 0))
            .build();
        world.add_static_collider(lane_collider);

        let ball = world.add_rigid_body(
            RigidBodyBuilder::kinematic_position_based()
                .translation(ball_start)
                .ccd_enabled(true)
                .build(),
        );
        let ball_collider = world.add_collider(
            ColliderBuilder::ball(config.ball_radius)
                .mass(config.ball_mass)
                .friction(config.ball_friction)
                .restitution(config.ball_restitution)
                .active_events(ActiveEvents::COLLISION_EVENTS)
                .user_data(encode_user_data(USER_DATA_BALL, 0))
                .build(),
            ball,
        );

        let mut pin_colliders = [(ColliderHandle::invalid(), RigidBodyHandle::invalid()); PIN_COUNT];
        for (slot, spot) in pin_start.iter().enumerate() {
            let body = world.add_rigid_body(
                RigidBodyBuilder::dynamic()
                    .translation(*spot)
                    .linear_damping(config.pin_linear_damping)
                    .angular_damping(config.pin_angular_damping)
                    .build(),
            );
            let collider = world.add_collider(
                ColliderBuilder::cylinder(config.pin_half_height, config.pin_radius)
                    .mass(config.pin_mass)
                    .friction(config.pin_friction)
                    .restitution(config.pin_restitution)
                    .user_data(encode_user_data(USER_DATA_PIN, slot as u64))
                    .build(),
                body,
            );
            pin_colliders[slot] = (collider, body);
        }
        let pins = pin_colliders.map(|(_, body)| body);
        let observer = PinImpactObserver::new(ball_collider, pin_colliders, &config);

        let mut sim = Self {
            world,
            config,
            ball,
            pins,
            observer,
            mode: BallMode::Idle,
            accumulator: 0.0,
            parked: [false; PIN_COUNT],
            fallen: [false; PIN_COUNT],
            ball_pose: BodyPose::new(ball_start),
            pin_poses: pin_start.map(BodyPose::new),
        };
        sim.refresh_poses();

        tracing::info!(
            vertices = lane.vertices.len() / 3,
            triangles = lane.indices.len() / 3,
            "[simulation] world created"
        );
        Ok(sim)
    }

    /// Advances the world by `dt` seconds of wall time and returns the number
    /// of fixed sub-steps that ran.
    pub fn step(&mut self, dt: f32) -> u32 {
        if !(dt > 0.0) {
            return 0;
        }
        let fixed = self.config.fixed_dt;
        self.accumulator += dt;

        let mut steps = 0;
        while self.accumulator >= fixed && steps < self.config.max_substeps {
            self.world.step_with_events(&self.observer);
            self.accumulator -= fixed;
            steps += 1;

            self.apply_lane_centering();
            self.apply_spin_curve(fixed);
            self.apply_pending_impulses();
            self.damp_fallen_pins();
        }

        if self.accumulator >= fixed {
            tracing::warn!(
                dropped = self.accumulator,
                max_substeps = self.config.max_substeps,
                "[simulation] sub-step cap reached, dropping backlog"
            );
            self.accumulator %= fixed;
        }

        self.refresh_poses();
        steps
    }

    fn apply_lane_centering(&mut self) {
        let BallMode::Released { .. } = self.mode else {
            return;
        };
        let cfg = &self.config;
        let Some(body) = self.world.rigid_body_set.get_mut(self.ball) else {
            return;
        };
        body.reset_forces(false);

        let t = body.translation();
        let v = body.linvel();
        let position = Vector::new(t.x, t.y, t.z);
        let rolling = (position.y - (cfg.lane_surface_y + cfg.ball_radius)).abs()
            < cfg.rolling_height_tolerance
            && v.y.abs() < cfg.rolling_max_vertical_speed
            && -v.z > cfg.rolling_min_forward_speed;
        if !rolling {
            return;
        }

        let force = centering_force(cfg, position);
        if force != 0.0 {
            body.add_force(Vector::new(force, 0.0, 0.0), true);
        }
    }

    fn apply_spin_curve(&mut self, dt: f32) {
        let BallMode::Released { origin } = self.mode else {
            return;
        };
        let cfg = &self.config;
        let Some(body) = self.world.rigid_body_set.get_mut(self.ball) else {
            return;
        };

        let traveled = origin.z - body.translation().z;
        let effectiveness = curve_effectiveness(cfg, traveled);
        if effectiveness <= 0.0 {
            return;
        }

        let w = body.angvel();
        let lateral = Vector::new(w.x, w.y, w.z).cross(Vector::NEG_Z).x;
        let nudge = lateral * cfg.curve_coupling * effectiveness * dt;
        if nudge != 0.0 {
            let v = body.linvel();
            body.set_linvel(Vector::new(v.x + nudge, v.y, v.z), true);
        }
    }

    fn apply_pending_impulses(&mut self) {
        for impulse in self.observer.drain() {
            if let Some(pin) = self.world.rigid_body_set.get_mut(impulse.target_pin) {
                pin.apply_impulse(impulse.linear_impulse, true);
                pin.apply_torque_impulse(impulse.angular_impulse, true);
            }
        }
    }

    /// Pins lying on the deck get heavy damping so they stop rolling.
    fn damp_fallen_pins(&mut self) {
        let cfg = &self.config;
        for (slot, handle) in self.pins.iter().enumerate() {
            if self.parked[slot] {
                continue;
            }
            let Some(pin) = self.world.rigid_body_set.get_mut(*handle) else {
                continue;
            };
            let (linear, angular) = if BodyPose::of(pin).tilt() > cfg.pin_tilt_threshold {
                (cfg.fallen_pin_linear_damping, cfg.fallen_pin_angular_damping)
            } else {
                (cfg.pin_linear_damping, cfg.pin_angular_damping)
            };
            pin.set_linear_damping(linear);
            pin.set_angular_damping(angular);
        }
    }

    /// Carries the ball to `position`/`rotation`. The first call after idle
    /// or release switches the ball to kinematic and starts a new track.
    pub fn set_manual_ball_pose(&mut self, position: Vector, rotation: Rotation, dt: f32) {
        let track = match self.mode {
            BallMode::Manual(track) => track.advance(position, rotation, dt),
            BallMode::Idle | BallMode::Released { .. } => {
                self.make_ball_kinematic();
                ManualTrack::start(position, rotation)
            }
        };
        self.mode = BallMode::Manual(track);

        if let Some(body) = self.world.rigid_body_set.get_mut(self.ball) {
            body.set_translation(position, false);
            body.set_rotation(rotation, false);
            body.set_next_kinematic_translation(position);
            body.set_next_kinematic_rotation(rotation);
            self.ball_pose = BodyPose::of(body);
        }
    }

    /// Hands the carried ball to the solver with its launch velocity.
    /// Returns `false` when the ball is not being carried.
    pub fn release_ball_to_physics(&mut self) -> bool {
        let BallMode::Manual(track) = self.mode else {
            tracing::debug!(mode = ?self.mode, "[simulation] release ignored");
            return false;
        };
        let Some(body) = self.world.rigid_body_set.get_mut(self.ball) else {
            return false;
        };

        body.set_body_type(RigidBodyType::Dynamic, true);
        body.set_linvel(track.velocity(), true);
        body.set_angvel(track.angular_velocity(), true);
        body.wake_up(true);

        self.accumulator = 0.0;
        self.observer.throw_index += 1;
        self.mode = BallMode::Released {
            origin: track.last_position,
        };
        tracing::info!(
            speed = track.velocity().length(),
            spin_intent = self.observer.spin_intent,
            "[simulation] ball released"
        );
        true
    }

    /// Spin value read by the contact observer on the next pin hits.
    pub fn set_spin_intent(&mut self, spin: f32) {
        self.observer.spin_intent = spin;
    }

    pub fn spin_intent(&self) -> f32 {
        self.observer.spin_intent
    }

    /// Returns the number of pins down once nothing above `floor_y` moves
    /// faster than `stillness_threshold`, otherwise `None`.
    ///
    /// Refreshes the per-pin fallen flags but never touches the world, so
    /// repeated calls without a step agree.
    pub fn check_throw_complete(&mut self, stillness_threshold: f32, floor_y: f32) -> Option<usize> {
        let (down, moving) = self.classify(stillness_threshold, floor_y);
        (!moving).then_some(down)
    }

    /// Pins down right now, regardless of motion.
    pub fn count_pins_down(&mut self, floor_y: f32) -> usize {
        self.classify(f32::INFINITY, floor_y).0
    }

    fn classify(&mut self, stillness_threshold: f32, floor_y: f32) -> (usize, bool) {
        let mut moving = false;

        if let Some(ball) = self.world.get_rigid_body(self.ball) {
            if ball.translation().y >= floor_y && body_speed(ball) > stillness_threshold {
                moving = true;
            }
        }

        for (slot, handle) in self.pins.iter().enumerate() {
            if self.parked[slot] {
                self.fallen[slot] = true;
                continue;
            }
            let Some(pin) = self.world.get_rigid_body(*handle) else {
                continue;
            };
            let below = pin.translation().y < floor_y;
            let tilted = BodyPose::of(pin).tilt() > self.config.pin_tilt_threshold;
            self.fallen[slot] = below || tilted;
            if !below && body_speed(pin) > stillness_threshold {
                moving = true;
            }
        }

        (self.fallen.iter().filter(|f| **f).count(), moving)
    }

    /// Full re-rack: every pin back on its spot and the ball parked.
    pub fn reset(&mut self, pin_positions: &[Vector; PIN_COUNT], ball_position: Vector) {
        self.observer.clear();
        self.accumulator = 0.0;
        self.parked = [false; PIN_COUNT];
        self.fallen = [false; PIN_COUNT];

        for (handle, spot) in self.pins.iter().zip(pin_positions) {
            if let Some(pin) = self.world.rigid_body_set.get_mut(*handle) {
                pin.set_enabled(true);
                place_at_rest(pin, *spot);
            }
        }
        self.park_ball(ball_position);
        self.refresh_poses();
        tracing::debug!("[simulation] full rack");
    }

    /// Re-rack between rolls of one frame: pins flagged down by the last
    /// completion check are parked, standing pins go back to their spots.
    pub fn reset_standing(&mut self, pin_positions: &[Vector; PIN_COUNT], ball_position: Vector) {
        self.rerack(pin_positions, ball_position, true);
    }

    /// Like [`reset_standing`](Self::reset_standing) but only pins already
    /// parked stay out; anything that fell since goes back up.
    pub fn restore_standing(&mut self, pin_positions: &[Vector; PIN_COUNT], ball_position: Vector) {
        self.rerack(pin_positions, ball_position, false);
    }

    fn rerack(&mut self, pin_positions: &[Vector; PIN_COUNT], ball_position: Vector, park_fallen: bool) {
        self.observer.clear();
        self.accumulator = 0.0;

        for (slot, (handle, spot)) in self.pins.iter().zip(pin_positions).enumerate() {
            let Some(pin) = self.world.rigid_body_set.get_mut(*handle) else {
                continue;
            };
            if self.parked[slot] || (park_fallen && self.fallen[slot]) {
                self.parked[slot] = true;
                self.fallen[slot] = true;
                pin.set_enabled(false);
            } else {
                self.fallen[slot] = false;
                place_at_rest(pin, *spot);
            }
        }
        self.park_ball(ball_position);
        self.refresh_poses();
        tracing::debug!(
            parked = self.parked.iter().filter(|p| **p).count(),
            "[simulation] standing pins re-racked"
        );
    }

    fn make_ball_kinematic(&mut self) {
        if let Some(body) = self.world.rigid_body_set.get_mut(self.ball) {
            body.set_body_type(RigidBodyType::KinematicPositionBased, true);
            body.set_linvel(Vector::ZERO, false);
            body.set_angvel(Vector::ZERO, false);
        }
    }

    fn park_ball(&mut self, position: Vector) {
        self.make_ball_kinematic();
        if let Some(body) = self.world.rigid_body_set.get_mut(self.ball) {
            place_at_rest(body, position);
            body.set_next_kinematic_translation(position);
            body.set_next_kinematic_rotation(Rotation::IDENTITY);
        }
        self.mode = BallMode::Idle;
    }

    fn refresh_poses(&mut self) {
        if let Some(ball) = self.world.get_rigid_body(self.ball) {
            self.ball_pose = BodyPose::of(ball);
        }
        for (pose, handle) in self.pin_poses.iter_mut().zip(&self.pins) {
            if let Some(pin) = self.world.rigid_body_set.get(*handle) {
                *pose = BodyPose::of(pin);
            }
        }
    }

    pub fn ball_pose(&self) -> BodyPose {
        self.ball_pose
    }

    pub fn pin_pose(&self, slot: usize) -> Option<BodyPose> {
        self.pin_poses.get(slot).copied()
    }

    pub fn pin_poses(&self) -> &[BodyPose; PIN_COUNT] {
        &self.pin_poses
    }

    /// Whether pin `slot` was down at the last completion check.
    pub fn pin_fallen(&self, slot: usize) -> bool {
        self.fallen.get(slot).copied().unwrap_or(false)
    }

    pub fn pin_fallen_flags(&self) -> [bool; PIN_COUNT] {
        self.fallen
    }

    pub fn ball_mode(&self) -> BallMode {
        self.mode
    }

    /// Current ball velocity: the launch estimate while carried, the solver's
    /// velocity once released.
    pub fn ball_velocity(&self) -> Vector {
        match self.mode {
            BallMode::Manual(track) => track.velocity(),
            BallMode::Idle => Vector::ZERO,
            BallMode::Released { .. } => self
                .world
                .get_rigid_body(self.ball)
                .map_or(Vector::ZERO, |b| {
                    let v = b.linvel();
                    Vector::new(v.x, v.y, v.z)
                }),
        }
    }

    pub fn pending_impulse_count(&self) -> usize {
        self.observer.pending_len()
    }

    pub fn world_hash(&self) -> u64 {
        self.world.compute_hash()
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }
}

fn body_speed(body: &RigidBody) -> f32 {
    let v = body.linvel();
    let w = body.angvel();
    Vector::new(v.x, v.y, v.z).length() + Vector::new(w.x, w.y, w.z).length()
}

fn place_at_rest(body: &mut RigidBody, position: Vector) {
    body.set_translation(position, true);
    body.set_rotation(Rotation::IDENTITY, true);
    body.set_linvel(Vector::ZERO, true);
    body.set_angvel(Vector::ZERO, true);
    body.reset_forces(true);
    body.reset_torques(true);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lane::{default_ball_start, default_pin_spots};

    const FRAME: f32 = 1.0 / 60.0;

    fn new_sim() -> BowlingSimulation {
        let config = SimulationConfig::default();
        let lane = LaneMesh::flat(&config);
        let pins = default_pin_spots(&config);
        let ball = default_ball_start(&config);
        BowlingSimulation::new(&lane, &pins, ball, config).unwrap()
    }

    /// Carries the ball forward at `velocity` for a few frames and lets go.
    fn throw(sim: &mut BowlingSimulation, velocity: Vector) {
        let start = default_ball_start(sim.config());
        for i in 0..12 {
            #[allow(clippy::cast_precision_loss)]
            let pos = start + velocity * (FRAME * i as f32);
            sim.set_manual_ball_pose(pos, Rotation::IDENTITY, FRAME);
        }
        assert!(sim.release_ball_to_physics());
    }

    fn run_until_settled(sim: &mut BowlingSimulation) -> usize {
        let throw = crate::config::ThrowConfig::default();
        for _ in 0..(60 * 20) {
            sim.step(FRAME);
            if let Some(down) = sim.check_throw_complete(throw.stillness_threshold, throw.floor_y) {
                return down;
            }
        }
        sim.count_pins_down(throw.floor_y)
    }

    #[test]
    fn test_rejects_bad_lane() {
        let config = SimulationConfig::default();
        let lane = LaneMesh::new(vec![0.0; 9], vec![0, 1]);
        let result = BowlingSimulation::new(
            &lane,
            &default_pin_spots(&config),
            default_ball_start(&config),
            config,
        );
        assert!(matches!(result, Err(SimulationError::LaneIndices(2))));
    }

    #[test]
    fn test_starts_idle_with_poses() {
        let sim = new_sim();
        assert_eq!(sim.ball_mode(), BallMode::Idle);
        assert_eq!(sim.ball_pose().position, default_ball_start(sim.config()));
        let spots = default_pin_spots(sim.config());
        for (slot, spot) in spots.iter().enumerate() {
            assert_eq!(sim.pin_pose(slot).unwrap().position, *spot);
            assert!(!sim.pin_fallen(slot));
        }
        assert!(sim.pin_pose(PIN_COUNT).is_none());
    }

    #[test]
    fn test_non_positive_dt_is_ignored() {
        let mut sim = new_sim();
        let hash = sim.world_hash();
        assert_eq!(sim.step(0.0), 0);
        assert_eq!(sim.step(-1.0), 0);
        assert_eq!(sim.world_hash(), hash);
    }

    #[test]
    fn test_accumulator_carries_remainder() {
        let mut sim = new_sim();
        // 2.5 sub-steps worth.
        assert_eq!(sim.step(sim.config().fixed_dt * 2.5), 2);
        assert_eq!(sim.step(sim.config().fixed_dt * 0.6), 1);
    }

    #[test]
    fn test_substep_cap_drops_backlog() {
        let mut sim = new_sim();
        let cap = sim.config().max_substeps;
        assert_eq!(sim.step(10.0), cap);
        assert!(sim.accumulator < sim.config().fixed_dt);
        // No catch-up spiral on the next frame.
        assert!(sim.step(FRAME) <= 4);
    }

    #[test]
    fn test_duplicate_samples_loan_their_time() {
        let p0 = Vector::new(0.0, 0.2, 0.5);
        let p1 = Vector::new(0.0, 0.2, 0.4);

        let mut a = new_sim();
        a.set_manual_ball_pose(p0, Rotation::IDENTITY, FRAME);
        a.set_manual_ball_pose(p0, Rotation::IDENTITY, FRAME);
        let BallMode::Manual(track) = a.ball_mode() else {
            panic!("ball should be carried");
        };
        assert_eq!(track.velocity(), Vector::ZERO);
        assert!((track.loaned_dt() - FRAME).abs() < 1e-7);
        a.set_manual_ball_pose(p1, Rotation::IDENTITY, FRAME);

        let mut b = new_sim();
        b.set_manual_ball_pose(p0, Rotation::IDENTITY, FRAME);
        b.set_manual_ball_pose(p1, Rotation::IDENTITY, 2.0 * FRAME);

        let va = a.ball_velocity();
        let vb = b.ball_velocity();
        assert!((va - vb).length() < 1e-5, "{va:?} vs {vb:?}");
        // No spike above the true average speed.
        assert!(va.length() <= (p1 - p0).length() / (2.0 * FRAME) + 1e-4);
    }

    #[test]
    fn test_release_requires_carried_ball() {
        let mut sim = new_sim();
        assert!(!sim.release_ball_to_physics());
        assert_eq!(sim.ball_mode(), BallMode::Idle);

        throw(&mut sim, Vector::new(0.0, 0.0, -6.0));
        assert!(matches!(sim.ball_mode(), BallMode::Released { .. }));
        assert!(!sim.release_ball_to_physics());
        assert!(sim.ball_velocity().z < -3.0);
    }

    #[test]
    fn test_centering_force_points_home() {
        let config = SimulationConfig::default();
        let z = config.foul_line_z - config.lane_length * config.centering_peak;

        let right = centering_force(&config, Vector::new(0.2, 0.11, z));
        let left = centering_force(&config, Vector::new(-0.2, 0.11, z));
        assert!(right < 0.0);
        assert!(left > 0.0);
        assert!((right + left).abs() < 1e-6);
        assert_eq!(centering_force(&config, Vector::new(0.0, 0.11, z)), 0.0);

        // Super-linear in offset.
        let near = centering_force(&config, Vector::new(0.1, 0.11, z)).abs();
        let far = centering_force(&config, Vector::new(0.2, 0.11, z)).abs();
        assert!(far > 2.0 * near);

        // Bell along the lane.
        let at_foul = centering_force(&config, Vector::new(0.2, 0.11, config.foul_line_z)).abs();
        assert!(at_foul < right.abs());
    }

    #[test]
    fn test_curve_effectiveness_ramp() {
        let config = SimulationConfig::default();
        assert_eq!(curve_effectiveness(&config, 0.0), 0.0);
        assert_eq!(
            curve_effectiveness(&config, config.curve_start * config.lane_length),
            0.0
        );
        assert_eq!(
            curve_effectiveness(&config, config.curve_full * config.lane_length),
            1.0
        );
        let mid = curve_effectiveness(
            &config,
            0.5 * (config.curve_start + config.curve_full) * config.lane_length,
        );
        assert!((mid - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_straight_throw_knocks_pins() {
        let mut sim = new_sim();
        throw(&mut sim, Vector::new(0.0, 0.0, -7.5));
        let down = run_until_settled(&mut sim);
        assert!(down > 0, "no pins fell");
        assert_eq!(sim.pending_impulse_count(), 0);
    }

    #[test]
    fn test_full_speed_throw_settles_before_timeout() {
        let mut sim = new_sim();
        throw(&mut sim, Vector::new(0.05, 0.0, -6.0));
        let cfg = crate::config::ThrowConfig::default();

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let frames = (cfg.max_throw_time / FRAME) as usize;
        let settled = (0..frames).position(|_| {
            sim.step(FRAME);
            sim.check_throw_complete(cfg.stillness_threshold, cfg.floor_y)
                .is_some()
        });
        assert!(
            settled.is_some(),
            "throw still moving after {} s",
            cfg.max_throw_time
        );
    }

    #[test]
    fn test_centred_throw_holds_its_line() {
        let mut sim = new_sim();
        throw(&mut sim, Vector::new(0.0, 0.0, -6.0));
        let head_z = sim.config().foul_line_z - sim.config().lane_length;

        let mut reached = false;
        let mut max_offset = 0.0f32;
        for _ in 0..(60 * 8) {
            sim.step(FRAME);
            let p = sim.ball_pose().position;
            if p.z < head_z + 0.5 {
                reached = true;
                break;
            }
            max_offset = max_offset.max(p.x.abs());
            assert!(p.y > 0.0, "ball left the lane at z={}", p.z);
        }
        assert!(reached, "ball never reached the pins");
        assert!(max_offset < 0.02, "drifted {max_offset} m off the centre line");
    }

    #[test]
    fn test_completion_check_is_idempotent() {
        let mut sim = new_sim();
        throw(&mut sim, Vector::new(0.0, 0.0, -7.5));
        let down = run_until_settled(&mut sim);
        let throw_cfg = crate::config::ThrowConfig::default();
        let flags = sim.pin_fallen_flags();
        for _ in 0..3 {
            assert_eq!(
                sim.check_throw_complete(throw_cfg.stillness_threshold, throw_cfg.floor_y),
                Some(down)
            );
        }
        assert_eq!(sim.pin_fallen_flags(), flags);
    }

    #[test]
    fn test_gutter_ball_scores_nothing() {
        let mut sim = new_sim();
        throw(&mut sim, Vector::new(2.0, 0.0, -6.0));
        assert_eq!(run_until_settled(&mut sim), 0);
        assert!(sim.ball_pose().position.y < crate::config::ThrowConfig::default().floor_y);
    }

    #[test]
    fn test_reset_restores_rack() {
        let mut sim = new_sim();
        throw(&mut sim, Vector::new(0.0, 0.0, -7.5));
        run_until_settled(&mut sim);

        let config = sim.config().clone();
        let spots = default_pin_spots(&config);
        let ball = default_ball_start(&config);
        sim.reset(&spots, ball);

        assert_eq!(sim.ball_mode(), BallMode::Idle);
        assert_eq!(sim.ball_pose().position, ball);
        assert_eq!(sim.ball_velocity(), Vector::ZERO);
        for (slot, spot) in spots.iter().enumerate() {
            assert_eq!(sim.pin_pose(slot).unwrap().position, *spot);
            assert!(!sim.pin_fallen(slot));
        }
        assert_eq!(sim.count_pins_down(-0.25), 0);
    }

    #[test]
    fn test_reset_standing_parks_fallen_pins() {
        let mut sim = new_sim();
        throw(&mut sim, Vector::new(0.0, 0.0, -7.5));
        let down = run_until_settled(&mut sim);
        let flags = sim.pin_fallen_flags();

        let config = sim.config().clone();
        let spots = default_pin_spots(&config);
        sim.reset_standing(&spots, default_ball_start(&config));

        // Parked pins stay counted, standing ones are back on their spots.
        assert_eq!(sim.count_pins_down(-0.25), down);
        for (slot, fallen) in flags.iter().enumerate() {
            if !fallen {
                assert_eq!(sim.pin_pose(slot).unwrap().position, spots[slot]);
            }
        }
    }

    #[test]
    fn test_same_throw_same_world() {
        let mut a = new_sim();
        let mut b = new_sim();
        for sim in [&mut a, &mut b] {
            sim.set_spin_intent(1.5);
            throw(sim, Vector::new(0.05, 0.0, -7.0));
            for _ in 0..240 {
                sim.step(FRAME);
            }
        }
        assert_eq!(a.world_hash(), b.world_hash());
    }

    #[test]
    fn test_restore_standing_keeps_only_parked() {
        let mut sim = new_sim();
        throw(&mut sim, Vector::new(0.0, 0.0, -7.5));
        let first = run_until_settled(&mut sim);

        let config = sim.config().clone();
        let spots = default_pin_spots(&config);
        let ball = default_ball_start(&config);
        sim.reset_standing(&spots, ball);

        throw(&mut sim, Vector::new(0.0, 0.0, -7.5));
        sim.step(2.0);
        sim.restore_standing(&spots, ball);
        assert_eq!(sim.count_pins_down(-0.25), first);
        assert_eq!(sim.ball_mode(), BallMode::Idle);
    }
}
