//! The arena: physics world, object list and the per-tick advancement.
//!
//! Locking: `physics` guards every read or write of body and joint state,
//! including the pose of body-backed objects. Each object carries its own
//! lock for non-physics state. When both are needed the object lock is
//! always taken first; `with_object_and_world` is the only place that takes
//! both. Token locks are leaves and may be taken under either.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use glam::Vec2;
use parking_lot::{Mutex, RwLock};
use robosim_shared::*;

use crate::error::SimError;
use crate::games::{self, Game};
use crate::object::{GameObject, ObjectId, ObjectState, Placement};
use crate::physics::{BodyDef, Material, PhysicsWorld};
use crate::robot;

const WALL_MATERIAL: Material = Material {
    density: 0.0,
    friction: WALL_FRICTION,
    restitution: WALL_RESTITUTION,
};

/// Rectangular extent of the arena, centred on the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl Bounds {
    pub fn from_size(size: Vec2) -> Self {
        Self {
            left: -size.x / 2.0,
            right: size.x / 2.0,
            top: -size.y / 2.0,
            bottom: size.y / 2.0,
        }
    }

    pub fn corners(&self) -> [Vec2; 4] {
        [
            Vec2::new(self.left, self.top),
            Vec2::new(self.right, self.top),
            Vec2::new(self.right, self.bottom),
            Vec2::new(self.left, self.bottom),
        ]
    }

    /// X is checked before Y; bounds are exclusive.
    pub fn contains_point(&self, p: Vec2) -> PointCheck {
        if !(self.left < p.x && p.x < self.right) {
            PointCheck::Outside {
                axis: Axis::X,
                clamped: p.x.clamp(self.left, self.right),
            }
        } else if !(self.top < p.y && p.y < self.bottom) {
            PointCheck::Outside {
                axis: Axis::Y,
                clamped: p.y.clamp(self.top, self.bottom),
            }
        } else {
            PointCheck::Inside
        }
    }
}

/// Staging area used while an arena is being populated. Games append their
/// static and dynamic objects here before the arena is shared.
pub struct ArenaBuilder {
    bounds: Bounds,
    world: PhysicsWorld,
    objects: Vec<Arc<GameObject>>,
}

impl ArenaBuilder {
    fn new(bounds: Bounds) -> Result<Self, SimError> {
        let mut world = PhysicsWorld::new();
        create_boundary_walls(&mut world, &bounds)?;
        Ok(Self {
            bounds,
            world,
            objects: Vec::new(),
        })
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    fn push(&mut self, kind: ObjectKind, marker_id: Option<u32>, placement: Placement) -> Arc<GameObject> {
        let id = ObjectId(self.objects.len() as u32);
        let object = Arc::new(GameObject::new(id, kind, marker_id, placement));
        self.objects.push(Arc::clone(&object));
        object
    }

    /// A marker with no physical presence, e.g. printed on a wall.
    pub fn add_wall_marker(&mut self, marker_id: u32, pose: Pose) -> Arc<GameObject> {
        self.push(
            ObjectKind::WallMarker,
            Some(marker_id),
            Placement::Fixed(RwLock::new(pose)),
        )
    }

    pub fn add_pedestal(&mut self, location: Vec2) -> Result<Arc<GameObject>, SimError> {
        let body = self.world.create_body(BodyDef::fixed(location, 0.0));
        self.world.create_box_fixture(
            body,
            Vec2::ZERO,
            Vec2::splat(PEDESTAL_WIDTH / 2.0),
            WALL_MATERIAL,
        )?;
        Ok(self.push(ObjectKind::Pedestal, None, Placement::Body(body)))
    }

    pub fn add_token(&mut self, marker_id: u32, location: Vec2, heading: f32) -> Result<Arc<GameObject>, SimError> {
        let body = self
            .world
            .create_body(BodyDef::dynamic(location, heading).with_damping(TOKEN_DAMPING));
        self.world.create_box_fixture(
            body,
            Vec2::ZERO,
            Vec2::splat(TOKEN_HALF_WIDTH),
            Material {
                density: TOKEN_DENSITY,
                friction: TOKEN_FRICTION,
                restitution: TOKEN_RESTITUTION,
            },
        )?;
        Ok(self.push(ObjectKind::Token, Some(marker_id), Placement::Body(body)))
    }
}

/// Four static slabs just outside the arena rectangle, long enough to close
/// the corners.
fn create_boundary_walls(world: &mut PhysicsWorld, bounds: &Bounds) -> Result<(), SimError> {
    let half = WALL_THICKNESS / 2.0;
    let half_height = (bounds.bottom - bounds.top) / 2.0 + WALL_THICKNESS;
    let half_width = (bounds.right - bounds.left) / 2.0;

    let walls = [
        (Vec2::new(bounds.right, 0.0), Vec2::new(half, 0.0), Vec2::new(half, half_height)),
        (Vec2::new(bounds.left, 0.0), Vec2::new(-half, 0.0), Vec2::new(half, half_height)),
        (Vec2::new(0.0, bounds.top), Vec2::new(0.0, -half), Vec2::new(half_width, half)),
        (Vec2::new(0.0, bounds.bottom), Vec2::new(0.0, half), Vec2::new(half_width, half)),
    ];

    for (position, centre, half_extents) in walls {
        let body = world.create_body(BodyDef::fixed(position, 0.0));
        world.create_box_fixture(body, centre, half_extents, WALL_MATERIAL)?;
    }
    Ok(())
}

pub struct Arena {
    config: SimConfig,
    bounds: Bounds,
    physics: Mutex<PhysicsWorld>,
    objects: RwLock<Vec<Arc<GameObject>>>,
    next_id: AtomicU32,
    ticks: AtomicU64,
    start_locations: Vec<Vec2>,
    start_headings: Vec<f32>,
}

impl Arena {
    /// Build the arena for `config.game`. An unknown game name is fatal.
    pub fn from_config(config: SimConfig) -> Result<Arc<Self>, SimError> {
        let game = games::resolve(&config.game)?;
        Self::with_game(game.as_ref(), config)
    }

    pub fn with_game(game: &dyn Game, config: SimConfig) -> Result<Arc<Self>, SimError> {
        let mut builder = ArenaBuilder::new(Bounds::from_size(game.size()))?;
        game.populate(&mut builder, config.seed)?;

        let ArenaBuilder {
            bounds,
            world,
            objects,
        } = builder;

        log::info!(
            "Arena '{}' ready: {} objects, {} start zones",
            game.name(),
            objects.len(),
            game.start_locations().len()
        );

        Ok(Arc::new(Self {
            config,
            bounds,
            physics: Mutex::new(world),
            next_id: AtomicU32::new(objects.len() as u32),
            objects: RwLock::new(objects),
            ticks: AtomicU64::new(0),
            start_locations: game.start_locations(),
            start_headings: game.start_headings(),
        }))
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn contains_point(&self, p: Vec2) -> PointCheck {
        self.bounds.contains_point(p)
    }

    pub fn start_locations(&self) -> &[Vec2] {
        &self.start_locations
    }

    pub fn start_headings(&self) -> &[f32] {
        &self.start_headings
    }

    pub fn start_pose(&self, zone: usize) -> Result<Pose, SimError> {
        match (self.start_locations.get(zone), self.start_headings.get(zone)) {
            (Some(&location), Some(&heading)) => Ok(Pose::new(location, heading)),
            _ => Err(SimError::NoStartZone {
                zone,
                zones: self.start_locations.len().min(self.start_headings.len()),
            }),
        }
    }

    /// Copy of the object list in insertion order.
    pub fn objects(&self) -> Vec<Arc<GameObject>> {
        self.objects.read().clone()
    }

    pub fn object_count(&self) -> usize {
        self.objects.read().len()
    }

    pub(crate) fn add_object(&self, kind: ObjectKind, marker_id: Option<u32>, placement: Placement) -> Arc<GameObject> {
        let id = ObjectId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let object = Arc::new(GameObject::new(id, kind, marker_id, placement));
        self.objects.write().push(Arc::clone(&object));
        object
    }

    /// Number of completed ticks.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }

    /// Run `f` with the physics lock held.
    pub fn with_world<R>(&self, f: impl FnOnce(&mut PhysicsWorld) -> R) -> R {
        let mut world = self.physics.lock();
        f(&mut world)
    }

    /// Run `f` with `object`'s lock and then the physics lock held.
    pub fn with_object_and_world<R>(
        &self,
        object: &GameObject,
        f: impl FnOnce(&mut ObjectState, &mut PhysicsWorld) -> R,
    ) -> R {
        let mut state = object.lock_state();
        let mut world = self.physics.lock();
        f(&mut state, &mut world)
    }

    pub fn pose_of(&self, object: &GameObject) -> Option<Pose> {
        self.with_world(|world| object.pose(world))
    }

    pub fn set_pose_of(&self, object: &GameObject, pose: Pose) {
        self.with_world(|world| object.set_pose(world, pose));
    }

    /// Step the world, then let every robot apply its actuation.
    ///
    /// The physics lock is released between the step and the per-robot
    /// work so control threads are not starved by a long tick.
    pub fn tick(&self, dt: f32) {
        self.with_world(|world| world.step(dt, VELOCITY_ITERATIONS, POSITION_ITERATIONS));

        for object in self.objects() {
            if object.kind() == ObjectKind::Robot {
                robot::tick(self, &object);
            }
        }

        let tick = self.ticks.fetch_add(1, Ordering::AcqRel) + 1;
        log::trace!("tick {} (dt={:.4})", tick, dt);
    }

    /// Render-ready view of every object, consistent at one instant.
    pub fn snapshot(&self) -> ArenaFrame {
        let objects = self.objects();
        let snapshots = self.with_world(|world| {
            objects
                .iter()
                .filter_map(|object| object.snapshot(world))
                .collect()
        });
        ArenaFrame {
            tick: self.ticks(),
            objects: snapshots,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::EmptyGame;

    fn empty_arena() -> Arc<Arena> {
        Arena::with_game(&EmptyGame, SimConfig::default()).unwrap()
    }

    #[test]
    fn test_contains_point() {
        let arena = empty_arena();
        assert_eq!(arena.contains_point(Vec2::ZERO), PointCheck::Inside);
        assert_eq!(
            arena.contains_point(Vec2::new(5.0, 0.0)),
            PointCheck::Outside { axis: Axis::X, clamped: 4.0 }
        );
        assert_eq!(
            arena.contains_point(Vec2::new(0.0, -6.0)),
            PointCheck::Outside { axis: Axis::Y, clamped: -4.0 }
        );
        // X is reported first when both are out
        assert_eq!(
            arena.contains_point(Vec2::new(-9.0, 9.0)),
            PointCheck::Outside { axis: Axis::X, clamped: -4.0 }
        );
        // Bounds are exclusive
        assert!(!arena.contains_point(Vec2::new(4.0, 0.0)).is_inside());
    }

    #[test]
    fn test_boundary_walls_block_rays() {
        let arena = empty_arena();
        let hits = arena.with_world(|world| world.cast_ray(Vec2::ZERO, Vec2::new(5.0, 0.0), None));
        assert_eq!(hits.len(), 1);
        assert!((hits[0].point.x - 4.0).abs() < 1e-4);
    }

    #[test]
    fn test_zero_dt_tick_keeps_poses() {
        let arena = Arena::with_game(
            &crate::games::PirateIslands,
            SimConfig { seed: 7, ..Default::default() },
        )
        .unwrap();
        let robot = crate::robot::SimRobot::new(&arena, 0).unwrap();
        robot.set_motor(MotorChannel::Left, MotorPower::Power(80.0)).unwrap();
        robot.set_motor(MotorChannel::Right, MotorPower::Power(-30.0)).unwrap();
        let body = robot.object().body().unwrap();
        let forward = robot.pose().forward();
        let sideways = forward.perp();
        arena.with_world(|world| world.set_linear_velocity(body, forward + sideways * 0.5));
        let before = arena.snapshot();

        arena.tick(0.0);

        let after = arena.snapshot();
        assert_eq!(before.objects.len(), after.objects.len());
        for (a, b) in before.objects.iter().zip(&after.objects) {
            assert_eq!((a.x, a.y, a.heading), (b.x, b.y, b.heading), "object {} moved", a.id);
        }
        assert_eq!(arena.ticks(), 1);

        // Actuation still ran: the sideways slip was cancelled
        let velocity = arena.with_world(|world| world.linear_velocity(body)).unwrap();
        assert!(velocity.dot(sideways).abs() < 1e-2, "lateral velocity survived: {:?}", velocity);
    }

    #[test]
    fn test_start_pose_out_of_range() {
        let arena = empty_arena();
        assert!(arena.start_pose(0).is_ok());
        assert_eq!(
            arena.start_pose(9),
            Err(SimError::NoStartZone { zone: 9, zones: 4 })
        );
    }

    #[test]
    fn test_object_ids_follow_insertion_order() {
        let arena = empty_arena();
        let ids: Vec<u32> = arena.objects().iter().map(|o| o.id().0).collect();
        let expected: Vec<u32> = (0..ids.len() as u32).collect();
        assert_eq!(ids, expected);
    }
}
