use glam::Vec2;
use parking_lot::{Mutex, MutexGuard, RwLock};
use robosim_shared::*;

use crate::physics::{BodyHandle, JointHandle, PhysicsWorld};

/// Stable identity of an object within its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(pub u32);

/// Where an object's pose lives.
#[derive(Debug)]
pub enum Placement {
    /// Backed by a physics body. The body's pose is authoritative while it
    /// exists in the world.
    Body(BodyHandle),
    /// Plain stored pose for objects with no physics presence (wall markers).
    Fixed(RwLock<Pose>),
}

/// Non-physics state guarded by the per-object lock.
#[derive(Debug)]
pub enum ObjectState {
    Inert,
    Token { grabbed: bool },
    Robot(RobotState),
}

#[derive(Debug, Default)]
pub struct RobotState {
    pub motors: [MotorPower; 2],
    pub holding: Option<Grip>,
}

/// A held object and the weld joint keeping it on the grabber.
#[derive(Debug)]
pub struct Grip {
    pub object: std::sync::Weak<GameObject>,
    pub joint: JointHandle,
}

/// An entity in the arena: a static obstacle, a marker, a token or a robot.
#[derive(Debug)]
pub struct GameObject {
    id: ObjectId,
    kind: ObjectKind,
    marker_id: Option<u32>,
    grabbable: bool,
    placement: Placement,
    state: Mutex<ObjectState>,
}

impl GameObject {
    pub(crate) fn new(
        id: ObjectId,
        kind: ObjectKind,
        marker_id: Option<u32>,
        placement: Placement,
    ) -> Self {
        let (grabbable, state) = match kind {
            ObjectKind::Token => (true, ObjectState::Token { grabbed: false }),
            ObjectKind::Robot => (false, ObjectState::Robot(RobotState::default())),
            ObjectKind::WallMarker | ObjectKind::Pedestal => (false, ObjectState::Inert),
        };
        Self {
            id,
            kind,
            marker_id,
            grabbable,
            placement,
            state: Mutex::new(state),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn marker_id(&self) -> Option<u32> {
        self.marker_id
    }

    pub fn grabbable(&self) -> bool {
        self.grabbable
    }

    pub fn body(&self) -> Option<BodyHandle> {
        match self.placement {
            Placement::Body(body) => Some(body),
            Placement::Fixed(_) => None,
        }
    }

    /// Current pose. For body-backed objects this reads the live body and
    /// returns `None` if the body is no longer in `world`.
    pub fn pose(&self, world: &PhysicsWorld) -> Option<Pose> {
        match &self.placement {
            Placement::Body(body) => Some(Pose::new(world.position(*body)?, world.angle(*body)?)),
            Placement::Fixed(pose) => Some(*pose.read()),
        }
    }

    pub fn set_pose(&self, world: &mut PhysicsWorld, pose: Pose) {
        match &self.placement {
            Placement::Body(body) => world.set_transform(*body, pose.location, pose.heading),
            Placement::Fixed(stored) => *stored.write() = pose,
        }
    }

    /// Linear speed; zero for objects without a body.
    pub fn speed(&self, world: &PhysicsWorld) -> f32 {
        self.body()
            .and_then(|body| world.linear_velocity(body))
            .map_or(0.0, Vec2::length)
    }

    /// Token locks are leaves in the lock order, so this is safe to call with
    /// the physics lock held. Non-tokens never touch their lock here.
    pub fn is_grabbed(&self) -> bool {
        if self.kind != ObjectKind::Token {
            return false;
        }
        matches!(*self.state.lock(), ObjectState::Token { grabbed: true })
    }

    /// Flip the grabbed flag. Only tokens can be grabbed; returns false for
    /// anything else.
    pub(crate) fn set_grabbed(&self, value: bool) -> bool {
        if self.kind != ObjectKind::Token {
            return false;
        }
        match &mut *self.state.lock() {
            ObjectState::Token { grabbed } => {
                *grabbed = value;
                true
            }
            _ => false,
        }
    }

    pub fn surface_name(&self) -> &'static str {
        match self.kind {
            ObjectKind::Robot => "sb/robot.png",
            ObjectKind::Token if self.is_grabbed() => "sb/token_grabbed.png",
            ObjectKind::Token => "sb/token.png",
            ObjectKind::WallMarker => "sb/wall_marker.png",
            ObjectKind::Pedestal => "sb/pedestal.png",
        }
    }

    /// Lock this object's non-physics state. Callers that also need the
    /// physics world go through `Arena::with_object_and_world`, which keeps
    /// the object-before-world order.
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, ObjectState> {
        self.state.lock()
    }

    pub fn snapshot(&self, world: &PhysicsWorld) -> Option<ObjectSnapshot> {
        let pose = self.pose(world)?;
        Some(ObjectSnapshot {
            id: self.id.0,
            kind: self.kind,
            surface_name: self.surface_name().to_string(),
            x: pose.location.x,
            y: pose.location.y,
            heading: pose.heading,
            marker_id: self.marker_id,
            grabbed: self.is_grabbed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::BodyDef;

    #[test]
    fn test_fixed_pose_is_stored_value() {
        let mut world = PhysicsWorld::new();
        let marker = GameObject::new(
            ObjectId(0),
            ObjectKind::WallMarker,
            Some(3),
            Placement::Fixed(RwLock::new(Pose::new(Vec2::new(1.0, 4.0), 0.5))),
        );
        assert_eq!(marker.pose(&world), Some(Pose::new(Vec2::new(1.0, 4.0), 0.5)));

        marker.set_pose(&mut world, Pose::new(Vec2::new(-1.0, 4.0), 0.0));
        assert_eq!(marker.pose(&world).unwrap().location, Vec2::new(-1.0, 4.0));
        assert_eq!(marker.speed(&world), 0.0);
        assert!(marker.body().is_none());
    }

    #[test]
    fn test_body_pose_reads_through_world() {
        let mut world = PhysicsWorld::new();
        let body = world.create_body(BodyDef::dynamic(Vec2::new(0.5, -0.5), 1.0));
        let token = GameObject::new(ObjectId(1), ObjectKind::Token, Some(40), Placement::Body(body));

        let pose = token.pose(&world).unwrap();
        assert_eq!(pose.location, Vec2::new(0.5, -0.5));
        assert!((pose.heading - 1.0).abs() < 1e-6);

        token.set_pose(&mut world, Pose::new(Vec2::new(2.0, 2.0), 0.0));
        assert_eq!(world.position(body), Some(Vec2::new(2.0, 2.0)));
    }

    #[test]
    fn test_only_tokens_are_grabbable() {
        let token = GameObject::new(
            ObjectId(1),
            ObjectKind::Token,
            Some(40),
            Placement::Fixed(RwLock::new(Pose::default())),
        );
        let pedestal = GameObject::new(
            ObjectId(2),
            ObjectKind::Pedestal,
            None,
            Placement::Fixed(RwLock::new(Pose::default())),
        );

        assert!(token.grabbable());
        assert!(!pedestal.grabbable());
        assert!(token.set_grabbed(true));
        assert!(token.is_grabbed());
        assert_eq!(token.surface_name(), "sb/token_grabbed.png");
        assert!(!pedestal.set_grabbed(true));
        assert!(!pedestal.is_grabbed());
    }
}
