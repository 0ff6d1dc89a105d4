//! Rigid-body world wrapper around `Rapier3D` with deterministic stepping.

use rapier3d::prelude::*;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Default fixed sub-step (5 ms).
pub const PHYSICS_DT: f32 = 0.005;

/// Default gravity vector (downward, m/s²).
pub fn default_gravity() -> Vector {
    Vector::new(0.0, -9.81, 0.0)
}

/// Type tags for collider `user_data`.
pub const USER_DATA_BALL: u64 = 1;
pub const USER_DATA_PIN: u64 = 2;
pub const USER_DATA_LANE: u64 = 3;

/// Encodes a type tag and ID into u128 `user_data`.
pub fn encode_user_data(type_tag: u64, id: u64) -> u128 {
    (u128::from(type_tag) << 64) | u128::from(id)
}

/// Decodes u128 `user_data` into (type_tag, id).
pub fn decode_user_data(user_data: u128) -> (u64, u64) {
    #[allow(clippy::cast_possible_truncation)]
    let type_tag = (user_data >> 64) as u64;
    #[allow(clippy::cast_possible_truncation)]
    let id = user_data as u64;
    (type_tag, id)
}

/// Physics world containing all `Rapier3D` components for deterministic simulation.
pub struct PhysicsWorld {
    pub rigid_body_set: RigidBodySet,
    pub collider_set: ColliderSet,
    pub integration_parameters: IntegrationParameters,
    pub physics_pipeline: PhysicsPipeline,
    pub island_manager: IslandManager,
    pub broad_phase: DefaultBroadPhase,
    pub narrow_phase: NarrowPhase,
    pub impulse_joint_set: ImpulseJointSet,
    pub multibody_joint_set: MultibodyJointSet,
    pub ccd_solver: CCDSolver,
    pub gravity: Vector,
    pub frame: u64,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PhysicsWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhysicsWorld")
            .field("frame", &self.frame)
            .field("rigid_body_count", &self.rigid_body_set.len())
            .field("collider_count", &self.collider_set.len())
            .field("gravity", &self.gravity)
            .field("dt", &self.integration_parameters.dt)
            .finish_non_exhaustive()
    }
}

impl PhysicsWorld {
    /// Creates a new physics world with default settings.
    pub fn new() -> Self {
        Self::with_params(default_gravity(), PHYSICS_DT)
    }

    /// Creates a new physics world with custom gravity and sub-step size.
    pub fn with_params(gravity: Vector, dt: f32) -> Self {
        let integration_parameters = IntegrationParameters {
            dt,
            ..Default::default()
        };

        Self {
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            integration_parameters,
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            gravity,
            frame: 0,
        }
    }

    /// Advances by one fixed timestep, reporting contacts to `events`.
    ///
    /// The handler only gets shared access to the body and collider sets
    /// while the pipeline is mid-step; anything it wants to change has to be
    /// queued and applied after this returns.
    pub fn step_with_events(&mut self, events: &dyn EventHandler) {
        self.physics_pipeline.step(
            self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            &(),
            events,
        );
        self.frame += 1;
    }

    /// Adds a rigid body to the world and returns its handle.
    pub fn add_rigid_body(&mut self, rigid_body: RigidBody) -> RigidBodyHandle {
        self.rigid_body_set.insert(rigid_body)
    }

    /// Adds a collider attached to a rigid body.
    pub fn add_collider(
        &mut self,
        collider: Collider,
        parent: RigidBodyHandle,
    ) -> ColliderHandle {
        self.collider_set
            .insert_with_parent(collider, parent, &mut self.rigid_body_set)
    }

    /// Adds a collider without a parent (static collider).
    pub fn add_static_collider(&mut self, collider: Collider) -> ColliderHandle {
        self.collider_set.insert(collider)
    }

    /// Gets an immutable reference to a rigid body.
    pub fn get_rigid_body(&self, handle: RigidBodyHandle) -> Option<&RigidBody> {
        self.rigid_body_set.get(handle)
    }

    /// Computes a deterministic hash of the current physics state.
    /// Two worlds fed the same inputs must hash equal.
    pub fn compute_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.frame.hash(&mut hasher);

        for (handle, body) in self.rigid_body_set.iter() {
            let (index, generation) = handle.into_raw_parts();
            index.hash(&mut hasher);
            generation.hash(&mut hasher);

            let pos = body.translation();
            hash_f32(pos.x, &mut hasher);
            hash_f32(pos.y, &mut hasher);
            hash_f32(pos.z, &mut hasher);

            let rot = body.rotation();
            hash_f32(rot.x, &mut hasher);
            hash_f32(rot.y, &mut hasher);
            hash_f32(rot.z, &mut hasher);
            hash_f32(rot.w, &mut hasher);

            let linvel = body.linvel();
            hash_f32(linvel.x, &mut hasher);
            hash_f32(linvel.y, &mut hasher);
            hash_f32(linvel.z, &mut hasher);

            let angvel = body.angvel();
            hash_f32(angvel.x, &mut hasher);
            hash_f32(angvel.y, &mut hasher);
            hash_f32(angvel.z, &mut hasher);
        }

        hasher.finish()
    }
}

/// Hashes a f32 value by converting to bits.
fn hash_f32(value: f32, hasher: &mut impl Hasher) {
    value.to_bits().hash(hasher);
}
