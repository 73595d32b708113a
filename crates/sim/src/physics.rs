//! Rigid-body world backing the arena.
//!
//! Thin layer over rapier2d that speaks in `glam` types and exposes only the
//! operations the arena needs: body/fixture/joint creation, fixed-step
//! integration and segment ray casts. Every mutator must be called with the
//! arena's physics lock held; the arena enforces this by owning the world
//! behind its `Mutex`.

use glam::Vec2;
use rapier2d::prelude::*;

use crate::error::SimError;

/// Handle to a body in the world. Stays valid for the lifetime of the world
/// since bodies are never removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle(RigidBodyHandle);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixtureHandle(ColliderHandle);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JointHandle(ImpulseJointHandle);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Static,
    Dynamic,
}

#[derive(Debug, Clone, Copy)]
pub struct BodyDef {
    pub kind: BodyKind,
    pub position: Vec2,
    pub angle: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
}

impl BodyDef {
    pub fn fixed(position: Vec2, angle: f32) -> Self {
        Self {
            kind: BodyKind::Static,
            position,
            angle,
            linear_damping: 0.0,
            angular_damping: 0.0,
        }
    }

    pub fn dynamic(position: Vec2, angle: f32) -> Self {
        Self {
            kind: BodyKind::Dynamic,
            ..Self::fixed(position, angle)
        }
    }

    pub fn with_damping(mut self, damping: f32) -> Self {
        self.linear_damping = damping;
        self.angular_damping = damping;
        self
    }
}

/// Material properties of a fixture.
#[derive(Debug, Clone, Copy)]
pub struct Material {
    pub density: f32,
    pub friction: f32,
    pub restitution: f32,
}

impl Default for Material {
    fn default() -> Self {
        // Box2D fixture defaults
        Self {
            density: 0.0,
            friction: 0.2,
            restitution: 0.0,
        }
    }
}

/// One ray/fixture intersection.
#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    pub fixture: FixtureHandle,
    pub body: Option<BodyHandle>,
    pub point: Vec2,
    pub normal: Vec2,
    /// Position along the cast segment: 0 at the origin, 1 at the target.
    pub fraction: f32,
}

pub struct PhysicsWorld {
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    physics_pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: BroadPhase,
    narrow_phase: NarrowPhase,
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld {
    /// Create an empty top-down world (no gravity).
    pub fn new() -> Self {
        Self {
            gravity: vector![0.0, 0.0],
            integration_parameters: IntegrationParameters::default(),
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: BroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
        }
    }

    pub fn create_body(&mut self, def: BodyDef) -> BodyHandle {
        let builder = match def.kind {
            BodyKind::Static => RigidBodyBuilder::fixed(),
            BodyKind::Dynamic => RigidBodyBuilder::dynamic(),
        };
        let body = builder
            .translation(vector![def.position.x, def.position.y])
            .rotation(def.angle)
            .linear_damping(def.linear_damping)
            .angular_damping(def.angular_damping)
            .build();
        BodyHandle(self.rigid_body_set.insert(body))
    }

    /// Attach a convex polygon given in body-local coordinates.
    pub fn create_polygon_fixture(
        &mut self,
        body: BodyHandle,
        vertices: &[Vec2],
        material: Material,
    ) -> Result<FixtureHandle, SimError> {
        let points: Vec<Point<Real>> = vertices.iter().map(|v| point![v.x, v.y]).collect();
        let collider = ColliderBuilder::convex_hull(&points)
            .ok_or(SimError::DegenerateFixture)?
            .density(material.density)
            .friction(material.friction)
            .restitution(material.restitution)
            .build();
        Ok(self.attach(collider, body))
    }

    /// Attach an axis-aligned box of the given half extents centred on `centre`
    /// (body-local).
    pub fn create_box_fixture(
        &mut self,
        body: BodyHandle,
        centre: Vec2,
        half_extents: Vec2,
        material: Material,
    ) -> Result<FixtureHandle, SimError> {
        let vertices = [
            centre + Vec2::new(-half_extents.x, -half_extents.y),
            centre + Vec2::new(half_extents.x, -half_extents.y),
            centre + Vec2::new(half_extents.x, half_extents.y),
            centre + Vec2::new(-half_extents.x, half_extents.y),
        ];
        self.create_polygon_fixture(body, &vertices, material)
    }

    pub fn create_circle_fixture(
        &mut self,
        body: BodyHandle,
        centre: Vec2,
        radius: f32,
        material: Material,
    ) -> FixtureHandle {
        let collider = ColliderBuilder::ball(radius)
            .translation(vector![centre.x, centre.y])
            .density(material.density)
            .friction(material.friction)
            .restitution(material.restitution)
            .build();
        self.attach(collider, body)
    }

    fn attach(&mut self, collider: Collider, body: BodyHandle) -> FixtureHandle {
        FixtureHandle(
            self.collider_set
                .insert_with_parent(collider, body.0, &mut self.rigid_body_set),
        )
    }

    /// Rigidly fix `body_b` to `body_a`, keeping their current relative angle.
    /// Anchors are body-local. The welded pair no longer collides.
    pub fn create_weld_joint(
        &mut self,
        body_a: BodyHandle,
        body_b: BodyHandle,
        local_anchor_a: Vec2,
        local_anchor_b: Vec2,
    ) -> JointHandle {
        let reference_angle = self.angle(body_b).unwrap_or(0.0) - self.angle(body_a).unwrap_or(0.0);
        let joint = FixedJointBuilder::new()
            .contacts_enabled(false)
            .local_frame1(Isometry::new(
                vector![local_anchor_a.x, local_anchor_a.y],
                reference_angle,
            ))
            .local_frame2(Isometry::new(
                vector![local_anchor_b.x, local_anchor_b.y],
                0.0,
            ));
        JointHandle(
            self.impulse_joint_set
                .insert(body_a.0, body_b.0, joint, true),
        )
    }

    /// Remove a joint. Returns false if it was already gone.
    pub fn destroy_joint(&mut self, joint: JointHandle) -> bool {
        self.impulse_joint_set.remove(joint.0, true).is_some()
    }

    pub fn joint_count(&self) -> usize {
        self.impulse_joint_set.len()
    }

    pub fn joint_connects(&self, joint: JointHandle, a: BodyHandle, b: BodyHandle) -> bool {
        self.impulse_joint_set.get(joint.0).is_some_and(|j| {
            (j.body1 == a.0 && j.body2 == b.0) || (j.body1 == b.0 && j.body2 == a.0)
        })
    }

    /// Advance the world by `dt` seconds. A non-positive `dt` is a no-op.
    pub fn step(&mut self, dt: f32, velocity_iterations: usize, position_iterations: usize) {
        if dt <= 0.0 {
            return;
        }

        self.integration_parameters.dt = dt;
        self.integration_parameters.max_velocity_iterations = velocity_iterations;
        self.integration_parameters.max_stabilization_iterations = position_iterations;

        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
    }

    /// Every fixture crossed by the segment `origin -> target`, in no
    /// particular order. Fixtures on `exclude` are skipped.
    pub fn cast_ray(&mut self, origin: Vec2, target: Vec2, exclude: Option<BodyHandle>) -> Vec<RayHit> {
        let delta = target - origin;
        if delta.length_squared() == 0.0 {
            return Vec::new();
        }

        self.query_pipeline
            .update(&self.rigid_body_set, &self.collider_set);

        let ray = Ray::new(point![origin.x, origin.y], vector![delta.x, delta.y]);
        let mut filter = QueryFilter::default();
        if let Some(body) = exclude {
            filter = filter.exclude_rigid_body(body.0);
        }

        let colliders = &self.collider_set;
        let mut hits = Vec::new();
        // Direction is not normalised, so time of impact is the segment fraction.
        self.query_pipeline.intersections_with_ray(
            &self.rigid_body_set,
            colliders,
            &ray,
            1.0,
            true,
            filter,
            |handle, intersection| {
                let point = origin + delta * intersection.toi;
                hits.push(RayHit {
                    fixture: FixtureHandle(handle),
                    body: colliders.get(handle).and_then(|c| c.parent()).map(BodyHandle),
                    point,
                    normal: Vec2::new(intersection.normal.x, intersection.normal.y),
                    fraction: intersection.toi,
                });
                true
            },
        );
        hits
    }

    // ------------------------------------------------------------------
    // Body state
    // ------------------------------------------------------------------

    pub fn position(&self, body: BodyHandle) -> Option<Vec2> {
        self.rigid_body_set.get(body.0).map(|b| {
            let t = b.translation();
            Vec2::new(t.x, t.y)
        })
    }

    pub fn angle(&self, body: BodyHandle) -> Option<f32> {
        self.rigid_body_set.get(body.0).map(|b| b.rotation().angle())
    }

    pub fn world_center(&self, body: BodyHandle) -> Option<Vec2> {
        self.rigid_body_set.get(body.0).map(|b| {
            let c = b.center_of_mass();
            Vec2::new(c.x, c.y)
        })
    }

    pub fn linear_velocity(&self, body: BodyHandle) -> Option<Vec2> {
        self.rigid_body_set.get(body.0).map(|b| {
            let v = b.linvel();
            Vec2::new(v.x, v.y)
        })
    }

    pub fn mass(&self, body: BodyHandle) -> Option<f32> {
        self.rigid_body_set.get(body.0).map(|b| b.mass())
    }

    /// Move a body. Its fixtures follow on the next step.
    pub fn set_transform(&mut self, body: BodyHandle, position: Vec2, angle: f32) {
        if let Some(b) = self.rigid_body_set.get_mut(body.0) {
            b.set_position(Isometry::new(vector![position.x, position.y], angle), true);
        }
    }

    pub fn set_linear_velocity(&mut self, body: BodyHandle, velocity: Vec2) {
        if let Some(b) = self.rigid_body_set.get_mut(body.0) {
            b.set_linvel(vector![velocity.x, velocity.y], true);
        }
    }

    /// Body-local point to world coordinates.
    pub fn world_point(&self, body: BodyHandle, local: Vec2) -> Option<Vec2> {
        self.rigid_body_set.get(body.0).map(|b| {
            let p = b.position().transform_point(&point![local.x, local.y]);
            Vec2::new(p.x, p.y)
        })
    }

    /// Body-local direction to world coordinates.
    pub fn world_vector(&self, body: BodyHandle, local: Vec2) -> Option<Vec2> {
        self.rigid_body_set.get(body.0).map(|b| {
            let v = b.rotation().transform_vector(&vector![local.x, local.y]);
            Vec2::new(v.x, v.y)
        })
    }

    /// World direction to body-local coordinates.
    pub fn local_vector(&self, body: BodyHandle, world: Vec2) -> Option<Vec2> {
        self.rigid_body_set.get(body.0).map(|b| {
            let v = b.rotation().inverse_transform_vector(&vector![world.x, world.y]);
            Vec2::new(v.x, v.y)
        })
    }

    /// Velocity of the body-local point `local`, in world coordinates.
    pub fn velocity_at_local_point(&self, body: BodyHandle, local: Vec2) -> Option<Vec2> {
        self.rigid_body_set.get(body.0).map(|b| {
            let p = b.position().transform_point(&point![local.x, local.y]);
            let v = b.velocity_at_point(&p);
            Vec2::new(v.x, v.y)
        })
    }

    /// Clear forces accumulated for the coming step.
    pub fn reset_forces(&mut self, body: BodyHandle) {
        if let Some(b) = self.rigid_body_set.get_mut(body.0) {
            b.reset_forces(true);
        }
    }

    /// Add a force (world coordinates) at a world point, applied on the next step.
    pub fn apply_force(&mut self, body: BodyHandle, force: Vec2, point: Vec2) {
        if let Some(b) = self.rigid_body_set.get_mut(body.0) {
            b.add_force_at_point(vector![force.x, force.y], point![point.x, point.y], true);
        }
    }

    /// Apply an impulse at the centre of mass, changing velocity immediately.
    pub fn apply_linear_impulse(&mut self, body: BodyHandle, impulse: Vec2) {
        if let Some(b) = self.rigid_body_set.get_mut(body.0) {
            b.apply_impulse(vector![impulse.x, impulse.y], true);
        }
    }

    pub fn body_count(&self) -> usize {
        self.rigid_body_set.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wall_at(world: &mut PhysicsWorld, x: f32) -> BodyHandle {
        let wall = world.create_body(BodyDef::fixed(Vec2::new(x, 0.0), 0.0));
        world
            .create_box_fixture(wall, Vec2::new(0.5, 0.0), Vec2::new(0.5, 2.0), Material::default())
            .unwrap();
        wall
    }

    #[test]
    fn test_cast_ray_reports_fraction() {
        let mut world = PhysicsWorld::new();
        let wall = wall_at(&mut world, 1.0);

        let hits = world.cast_ray(Vec2::ZERO, Vec2::new(4.0, 0.0), None);
        assert_eq!(hits.len(), 1);
        let hit = hits[0];
        assert_eq!(hit.body, Some(wall));
        assert!((hit.fraction - 0.25).abs() < 1e-4, "fraction {}", hit.fraction);
        assert!((hit.point.x - 1.0).abs() < 1e-4);
        assert!(hit.normal.x < -0.9, "normal should face the ray, got {:?}", hit.normal);
    }

    #[test]
    fn test_cast_ray_misses() {
        let mut world = PhysicsWorld::new();
        wall_at(&mut world, 5.0);

        assert!(world.cast_ray(Vec2::ZERO, Vec2::new(4.0, 0.0), None).is_empty());
        assert!(world.cast_ray(Vec2::ZERO, Vec2::new(0.0, 4.0), None).is_empty());
    }

    #[test]
    fn test_cast_ray_excludes_body() {
        let mut world = PhysicsWorld::new();
        let body = world.create_body(BodyDef::dynamic(Vec2::ZERO, 0.0));
        world
            .create_box_fixture(body, Vec2::ZERO, Vec2::splat(0.2), Material::default())
            .unwrap();
        wall_at(&mut world, 2.0);

        let hits = world.cast_ray(Vec2::ZERO, Vec2::new(4.0, 0.0), Some(body));
        assert_eq!(hits.len(), 1);
        assert!((hits[0].fraction - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_zero_step_is_noop() {
        let mut world = PhysicsWorld::new();
        let body = world.create_body(BodyDef::dynamic(Vec2::new(1.0, 2.0), 0.5));
        world.create_circle_fixture(body, Vec2::ZERO, 0.1, Material { density: 1.0, ..Default::default() });
        world.set_linear_velocity(body, Vec2::new(1.0, 0.0));

        world.step(0.0, 8, 3);

        assert_eq!(world.position(body), Some(Vec2::new(1.0, 2.0)));
        assert!((world.angle(body).unwrap() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_step_integrates_velocity() {
        let mut world = PhysicsWorld::new();
        let body = world.create_body(BodyDef::dynamic(Vec2::ZERO, 0.0));
        world.create_circle_fixture(body, Vec2::ZERO, 0.1, Material { density: 1.0, ..Default::default() });
        world.set_linear_velocity(body, Vec2::new(1.0, 0.0));

        for _ in 0..30 {
            world.step(1.0 / 30.0, 8, 3);
        }

        let x = world.position(body).unwrap().x;
        assert!((x - 1.0).abs() < 0.01, "expected ~1m travelled, got {}", x);
    }

    #[test]
    fn test_weld_joint_lifecycle() {
        let mut world = PhysicsWorld::new();
        let a = world.create_body(BodyDef::dynamic(Vec2::ZERO, 0.0));
        let b = world.create_body(BodyDef::dynamic(Vec2::new(0.25, 0.0), 0.0));
        let material = Material { density: 1.0, ..Default::default() };
        world.create_box_fixture(a, Vec2::ZERO, Vec2::splat(0.1), material).unwrap();
        world.create_box_fixture(b, Vec2::ZERO, Vec2::splat(0.05), material).unwrap();

        let joint = world.create_weld_joint(a, b, Vec2::new(0.25, 0.0), Vec2::ZERO);
        assert!(world.joint_connects(joint, a, b));
        assert_eq!(world.joint_count(), 1);

        world.set_linear_velocity(a, Vec2::new(0.0, 1.0));
        for _ in 0..30 {
            world.step(1.0 / 30.0, 8, 3);
        }
        // The pair may spin as a whole; the offset holds in a's frame.
        let offset = world.position(b).unwrap() - world.position(a).unwrap();
        assert!((offset.length() - 0.25).abs() < 0.02, "welded distance drifted: {:?}", offset);
        let local = world.local_vector(a, offset).unwrap();
        assert!((local - Vec2::new(0.25, 0.0)).length() < 0.02, "welded offset drifted: {:?}", local);

        assert!(world.destroy_joint(joint));
        assert!(!world.destroy_joint(joint));
        assert_eq!(world.joint_count(), 0);
    }

    #[test]
    fn test_local_world_vector_round_trip() {
        let mut world = PhysicsWorld::new();
        let body = world.create_body(BodyDef::dynamic(Vec2::ZERO, std::f32::consts::FRAC_PI_2));
        let w = world.world_vector(body, Vec2::X).unwrap();
        assert!((w - Vec2::Y).length() < 1e-5);
        let l = world.local_vector(body, Vec2::Y).unwrap();
        assert!((l - Vec2::X).length() < 1e-5);
    }
}
