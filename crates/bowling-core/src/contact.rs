//! Ball-to-pin contact observer.
//!
//! Rapier calls the observer while it is still walking its contact graph, so
//! the observer never touches bodies itself. Each ball/pin touch becomes a
//! [`PendingImpulse`] that the simulation applies once the step returns.

use parking_lot::Mutex;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rapier3d::prelude::*;

use crate::config::SimulationConfig;
use crate::physics::{USER_DATA_PIN, decode_user_data};
use crate::simulation::PIN_COUNT;

/// Impulse to hand to a pin after the current sub-step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingImpulse {
    pub target_pin: RigidBodyHandle,
    pub linear_impulse: Vector,
    pub angular_impulse: Vector,
}

/// Deterministic wobble in `[-1, 1]` for one pin on one throw.
///
/// Same seed, throw and pin always give the same value; consecutive throws
/// scatter differently.
pub fn pin_wobble(seed: u64, throw_index: u64, pin_index: usize) -> f32 {
    let mut rng = ChaCha8Rng::seed_from_u64(
        seed ^ throw_index.rotate_left(17) ^ (pin_index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15),
    );
    rng.random_range(-1.0..=1.0)
}

/// Turns ball/pin contacts into queued spin impulses.
#[derive(Debug)]
pub struct PinImpactObserver {
    ball_collider: ColliderHandle,
    pins: [(ColliderHandle, RigidBodyHandle); PIN_COUNT],
    pub(crate) spin_intent: f32,
    pub(crate) throw_index: u64,
    linear_scale: f32,
    angular_scale: f32,
    wobble_amount: f32,
    seed: u64,
    queue: Mutex<Vec<PendingImpulse>>,
}

impl PinImpactObserver {
    pub fn new(
        ball_collider: ColliderHandle,
        pins: [(ColliderHandle, RigidBodyHandle); PIN_COUNT],
        config: &SimulationConfig,
    ) -> Self {
        Self {
            ball_collider,
            pins,
            spin_intent: 0.0,
            throw_index: 0,
            linear_scale: config.pin_linear_impulse,
            angular_scale: config.pin_angular_impulse,
            wobble_amount: config.wobble_amount,
            seed: config.seed,
            queue: Mutex::new(Vec::new()),
        }
    }

    /// Takes every queued impulse, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<PendingImpulse> {
        std::mem::take(self.queue.get_mut())
    }

    /// Drops queued impulses without applying them.
    pub fn clear(&mut self) {
        self.queue.get_mut().clear();
    }

    pub fn pending_len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Computes the impulse for a ball touching pin `slot`.
    ///
    /// The impact normal is approximated by the horizontal centre-to-centre
    /// offset; the lateral push runs across it.
    pub fn impulse_for(&self, slot: usize, ball_pos: Vector, pin_pos: Vector) -> Option<PendingImpulse> {
        if self.spin_intent == 0.0 {
            return None;
        }
        let offset = pin_pos - ball_pos;
        let normal = Vector::new(offset.x, 0.0, offset.z).normalize_or_zero();
        if normal == Vector::ZERO {
            return None;
        }
        let lateral = Vector::Y.cross(normal);

        let wobble = 1.0 + self.wobble_amount * pin_wobble(self.seed, self.throw_index, slot);
        let spin = self.spin_intent * wobble;

        Some(PendingImpulse {
            target_pin: self.pins[slot].1,
            linear_impulse: lateral * (spin * self.linear_scale),
            angular_impulse: Vector::Y * (spin * self.angular_scale),
        })
    }

    fn pin_slot(&self, colliders: &ColliderSet, collider: ColliderHandle) -> Option<usize> {
        let (tag, id) = decode_user_data(colliders.get(collider)?.user_data);
        if tag != USER_DATA_PIN {
            return None;
        }
        let slot = usize::try_from(id).ok()?;
        (self.pins.get(slot)?.0 == collider).then_some(slot)
    }
}

impl EventHandler for PinImpactObserver {
    fn handle_collision_event(
        &self,
        bodies: &RigidBodySet,
        colliders: &ColliderSet,
        event: CollisionEvent,
        _contact_pair: Option<&ContactPair>,
    ) {
        if !event.started() {
            return;
        }

        let (c1, c2) = (event.collider1(), event.collider2());
        let other = if c1 == self.ball_collider {
            c2
        } else if c2 == self.ball_collider {
            c1
        } else {
            return;
        };
        let Some(slot) = self.pin_slot(colliders, other) else {
            return;
        };

        let pin_body = self.pins[slot].1;
        let (Some(pin), Some(ball_parent)) = (
            bodies.get(pin_body),
            colliders.get(self.ball_collider).and_then(Collider::parent),
        ) else {
            return;
        };
        let Some(ball) = bodies.get(ball_parent) else {
            return;
        };

        let ball_pos = ball.translation();
        let pin_pos = pin.translation();
        let ball_pos = Vector::new(ball_pos.x, ball_pos.y, ball_pos.z);
        let pin_pos = Vector::new(pin_pos.x, pin_pos.y, pin_pos.z);

        if let Some(impulse) = self.impulse_for(slot, ball_pos, pin_pos) {
            tracing::trace!(pin = slot, "[contact] queued pin spin impulse");
            self.queue.lock().push(impulse);
        }
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
    }
}
