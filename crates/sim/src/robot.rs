//! Simulated robot: the hardware interface a control program talks to.
//!
//! Actuator values live under the robot's object lock and are only turned
//! into forces by `tick`, which runs on the simulation thread. Everything on
//! `SimRobot` is safe to call from any thread at any rate.

use std::sync::Arc;
use std::time::Duration;

use glam::Vec2;
use robosim_shared::*;

use crate::arena::Arena;
use crate::error::SimError;
use crate::object::{GameObject, Grip, ObjectState, Placement, RobotState};
use crate::physics::{BodyDef, BodyHandle, Material, PhysicsWorld};
use crate::sensors::{Camera, UltrasonicSensor, UltrasoundChannel};

/// Body-local attachment point of a drive wheel.
fn wheel_offset(channel: MotorChannel) -> Vec2 {
    match channel {
        MotorChannel::Left => Vec2::new(0.0, -ROBOT_WIDTH / 2.0),
        MotorChannel::Right => Vec2::new(0.0, ROBOT_WIDTH / 2.0),
    }
}

/// Forward force produced by one wheel, given the forward component of the
/// wheel's velocity in the robot frame.
fn wheel_force(power: MotorPower, forward_velocity: f32) -> f32 {
    match power {
        MotorPower::Power(p) => p * DRIVE_FORCE_PER_PERCENT - forward_velocity * DRIVE_FRICTION_COEFF,
        MotorPower::Coast => forward_velocity * COAST_FRICTION_COEFF,
    }
}

/// Apply both wheels' forces, then cancel sideways motion so the robot
/// behaves as if its wheels cannot skid.
fn drive(world: &mut PhysicsWorld, body: BodyHandle, motors: &[MotorPower; 2]) -> Option<()> {
    world.reset_forces(body);

    for channel in MotorChannel::ALL {
        let local = wheel_offset(channel);
        let velocity = world.velocity_at_local_point(body, local)?;
        let forward_velocity = world.local_vector(body, velocity)?.x;
        let force = wheel_force(motors[channel.index()], forward_velocity);

        let world_force = world.world_vector(body, Vec2::new(force, 0.0))?;
        let point = world.world_point(body, local)?;
        world.apply_force(body, world_force, point);
    }

    let right_normal = world.world_vector(body, Vec2::Y)?;
    let lateral = right_normal.dot(world.linear_velocity(body)?) * right_normal;
    let mass = world.mass(body)?;
    world.apply_linear_impulse(body, -lateral * mass);
    Some(())
}

/// Per-tick actuation for one robot object. Called by `Arena::tick` after
/// the world has been stepped.
pub(crate) fn tick(arena: &Arena, object: &GameObject) {
    let Some(body) = object.body() else {
        return;
    };
    arena.with_object_and_world(object, |state, world| {
        if let ObjectState::Robot(robot) = state {
            if drive(world, body, &robot.motors).is_none() {
                log::warn!("robot object {} has no body in the world", object.id().0);
            }
        }
    });
}

/// Handle used by a control program to drive one robot.
#[derive(Clone)]
pub struct SimRobot {
    arena: Arc<Arena>,
    object: Arc<GameObject>,
    zone: usize,
    ultrasonic: UltrasonicSensor,
    camera: Camera,
}

impl SimRobot {
    /// Place a new robot at the start pose of `zone`.
    pub fn new(arena: &Arc<Arena>, zone: usize) -> Result<Self, SimError> {
        let pose = arena.start_pose(zone)?;
        let body = arena.with_world(|world| {
            let body = world.create_body(BodyDef::dynamic(pose.location, pose.heading));
            world.create_box_fixture(
                body,
                Vec2::ZERO,
                Vec2::splat(ROBOT_WIDTH / 2.0),
                Material {
                    density: ROBOT_DENSITY,
                    ..Default::default()
                },
            )?;
            Ok::<_, SimError>(body)
        })?;

        let marker_id = arena
            .config()
            .robot_markers
            .then(|| ROBOT_MARKER_BASE + zone as u32);
        let object = arena.add_object(ObjectKind::Robot, marker_id, Placement::Body(body));

        log::info!(
            "Robot {} placed in zone {} at ({:.2}, {:.2})",
            object.id().0,
            zone,
            pose.location.x,
            pose.location.y
        );

        Ok(Self {
            arena: Arc::clone(arena),
            object,
            zone,
            ultrasonic: UltrasonicSensor::default(),
            camera: Camera::with_latency(Duration::from_millis(arena.config().vision_latency_ms)),
        })
    }

    pub fn zone(&self) -> usize {
        self.zone
    }

    pub fn arena(&self) -> &Arc<Arena> {
        &self.arena
    }

    pub fn object(&self) -> &Arc<GameObject> {
        &self.object
    }

    pub fn pose(&self) -> Pose {
        self.arena.pose_of(&self.object).unwrap_or_default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut RobotState) -> R) -> Option<R> {
        match &mut *self.object.lock_state() {
            ObjectState::Robot(state) => Some(f(state)),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Motors
    // ------------------------------------------------------------------

    /// Set a motor. Invalid values are rejected and the previous setting
    /// stays in place. Takes effect on the next tick.
    pub fn set_motor(&self, channel: MotorChannel, power: MotorPower) -> Result<(), SimError> {
        if let MotorPower::Power(p) = power {
            if !power.is_valid() {
                return Err(SimError::InvalidMotorPower(p));
            }
        }
        self.with_state(|state| state.motors[channel.index()] = power);
        Ok(())
    }

    pub fn motor(&self, channel: MotorChannel) -> MotorPower {
        self.with_state(|state| state.motors[channel.index()])
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Grabber
    // ------------------------------------------------------------------

    /// Try to pick up a grabbable object in front of the robot.
    ///
    /// Candidates are within `GRAB_RADIUS` of the robot and inside the
    /// grab sector around its heading. The nearest wins, then the lowest
    /// id. Returns `Ok(false)` when nothing qualifies.
    pub fn grab(&self) -> Result<bool, SimError> {
        let Some(robot_body) = self.object.body() else {
            return Ok(false);
        };
        let objects = self.arena.objects();

        self.arena.with_object_and_world(&self.object, |state, world| {
            let ObjectState::Robot(robot) = state else {
                return Ok(false);
            };
            if robot.holding.is_some() {
                return Err(SimError::AlreadyHolding);
            }
            let Some(pose) = self.object.pose(world) else {
                return Ok(false);
            };

            let target = objects
                .iter()
                .filter(|o| o.id() != self.object.id() && o.grabbable() && !o.is_grabbed())
                .filter_map(|o| {
                    let location = o.pose(world)?.location;
                    let distance = pose.location.distance(location);
                    let in_sector = pose.bearing_to(location).abs() < HALF_GRAB_SECTOR_WIDTH;
                    (distance <= GRAB_RADIUS && in_sector).then_some((distance, o))
                })
                .min_by(|(da, a), (db, b)| da.total_cmp(db).then(a.id().cmp(&b.id())));

            let Some((distance, target)) = target else {
                return Ok(false);
            };
            let Some(target_body) = target.body() else {
                return Ok(false);
            };

            let joint = world.create_weld_joint(
                robot_body,
                target_body,
                Vec2::new(GRABBER_OFFSET, 0.0),
                Vec2::ZERO,
            );
            target.set_grabbed(true);
            robot.holding = Some(Grip {
                object: Arc::downgrade(target),
                joint,
            });

            log::debug!(
                "Robot {} grabbed object {} at {:.3}m",
                self.object.id().0,
                target.id().0,
                distance
            );
            Ok(true)
        })
    }

    /// Drop whatever is held. Returns false if nothing was held.
    pub fn release(&self) -> bool {
        self.arena.with_object_and_world(&self.object, |state, world| {
            let ObjectState::Robot(robot) = state else {
                return false;
            };
            let Some(grip) = robot.holding.take() else {
                return false;
            };

            world.destroy_joint(grip.joint);
            if let Some(held) = grip.object.upgrade() {
                held.set_grabbed(false);
                log::debug!("Robot {} released object {}", self.object.id().0, held.id().0);
            }
            true
        })
    }

    pub fn is_holding(&self) -> bool {
        self.with_state(|state| state.holding.is_some())
            .unwrap_or(false)
    }

    pub fn held_object(&self) -> Option<Arc<GameObject>> {
        self.with_state(|state| state.holding.as_ref().and_then(|g| g.object.upgrade()))
            .flatten()
    }

    // ------------------------------------------------------------------
    // Sensors
    // ------------------------------------------------------------------

    /// Read the ultrasound module wired to `trigger`/`echo`. Unknown pins
    /// and "no echo" both read as 0.0.
    pub fn read_ultrasound(&self, trigger: u8, echo: u8) -> f32 {
        match UltrasoundChannel::from_pins(trigger, echo) {
            Ok(channel) => self.ultrasound(channel),
            Err(err) => {
                log::warn!("{}", err);
                0.0
            }
        }
    }

    pub fn ultrasound(&self, channel: UltrasoundChannel) -> f32 {
        self.ultrasonic
            .read(&self.arena, &self.object, channel.angle_offset())
            .unwrap_or(0.0)
    }

    /// Markers visible to the camera, nearest first. Blocks for the
    /// configured vision latency.
    pub fn see(&self) -> Vec<Marker> {
        self.camera.see(&self.arena, &self.object)
    }
}
