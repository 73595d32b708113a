//! Simulated sensors. Both read the shared world through the arena's locks
//! and turn raw geometry into the partial view real hardware would give.

use std::f32::consts::FRAC_PI_2;
use std::thread;
use std::time::Duration;

use glam::Vec2;
use robosim_shared::*;

use crate::arena::Arena;
use crate::error::SimError;
use crate::object::GameObject;

/// The ultrasound modules fitted to a robot, addressed by their pin pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UltrasoundChannel {
    Ahead,
    Right,
    Left,
}

impl UltrasoundChannel {
    pub const ALL: [UltrasoundChannel; 3] = [
        UltrasoundChannel::Ahead,
        UltrasoundChannel::Right,
        UltrasoundChannel::Left,
    ];

    /// (trigger, echo)
    pub fn pins(self) -> (u8, u8) {
        match self {
            UltrasoundChannel::Ahead => (6, 7),
            UltrasoundChannel::Right => (8, 9),
            UltrasoundChannel::Left => (10, 11),
        }
    }

    pub fn from_pins(trigger: u8, echo: u8) -> Result<Self, SimError> {
        Self::ALL
            .into_iter()
            .find(|channel| channel.pins() == (trigger, echo))
            .ok_or(SimError::UnknownUltrasoundPins { trigger, echo })
    }

    /// Mounting angle relative to the robot's heading.
    pub fn angle_offset(self) -> f32 {
        match self {
            UltrasoundChannel::Ahead => 0.0,
            UltrasoundChannel::Right => FRAC_PI_2,
            UltrasoundChannel::Left => -FRAC_PI_2,
        }
    }

    fn label(self) -> &'static str {
        match self {
            UltrasoundChannel::Ahead => "ahead",
            UltrasoundChannel::Right => "right",
            UltrasoundChannel::Left => "left",
        }
    }

    pub fn describe_all() -> String {
        Self::ALL
            .iter()
            .map(|c| {
                let (trigger, echo) = c.pins();
                format!("{}/{} ({})", trigger, echo, c.label())
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Ray-cast range finder. A fan of rays approximates the transducer's
/// conical beam; the nearest return across the fan wins.
#[derive(Debug, Clone, Copy)]
pub struct UltrasonicSensor {
    pub range: f32,
    /// Rays on each side of the centre ray.
    pub spread_casts: i32,
    /// Half-angle of the fan.
    pub spread_angle: f32,
}

impl Default for UltrasonicSensor {
    fn default() -> Self {
        Self {
            range: ULTRASOUND_RANGE,
            spread_casts: ULTRASOUND_SPREAD_CASTS,
            spread_angle: ULTRASOUND_SPREAD_ANGLE,
        }
    }
}

impl UltrasonicSensor {
    /// Distance to the nearest fixture within range, or `None` when nothing
    /// answers. The robot's own body is never detected.
    pub fn read(&self, arena: &Arena, robot: &GameObject, angle_offset: f32) -> Option<f32> {
        let body = robot.body()?;
        let casts = self.spread_casts.max(0);

        let nearest = arena.with_world(|world| {
            let centre = world.world_center(body)?;
            let heading = world.angle(body)? + angle_offset;

            let mut fractions: Vec<f32> = Vec::new();
            for i in -casts..=casts {
                let spread = if casts == 0 {
                    0.0
                } else {
                    self.spread_angle * i as f32 / casts as f32
                };
                let target = centre + Vec2::from_angle(heading + spread) * self.range;
                fractions.extend(
                    world
                        .cast_ray(centre, target, Some(body))
                        .iter()
                        .map(|hit| hit.fraction),
                );
            }
            fractions.into_iter().min_by(f32::total_cmp)
        })?;

        Some(nearest * self.range)
    }
}

/// Forward-facing camera that reports fiducial markers.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub half_fov: f32,
    pub blur_speed: f32,
    /// Exposure and processing delay between capture and result.
    pub latency: Duration,
}

impl Default for Camera {
    fn default() -> Self {
        Self::with_latency(Duration::from_millis(VISION_LATENCY_MS))
    }
}

impl Camera {
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            half_fov: HALF_FOV_WIDTH,
            blur_speed: MOTION_BLUR_SPEED_THRESHOLD,
            latency,
        }
    }

    /// Markers in view, nearest first.
    ///
    /// The robot's pose is captured first; the call then blocks for the
    /// latency with no locks held. Positions are relative to the captured
    /// pose, so the result is stale by `latency` when it arrives. Motion
    /// blur, the observer's included, is judged at readout.
    pub fn see(&self, arena: &Arena, robot: &GameObject) -> Vec<Marker> {
        let Some(captured) = arena.with_world(|world| robot.pose(world)) else {
            return Vec::new();
        };

        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }

        let objects = arena.objects();
        let mut markers: Vec<Marker> = arena.with_world(|world| {
            let observer_speed = robot.speed(world);
            if observer_speed > self.blur_speed {
                log::trace!("camera on object {} blurred ({:.2} m/s)", robot.id().0, observer_speed);
                return Vec::new();
            }
            objects
                .iter()
                .filter(|object| object.id() != robot.id())
                .filter_map(|object| {
                    let marker_id = object.marker_id()?;
                    if object.kind() == ObjectKind::Robot && object.speed(world) > self.blur_speed {
                        return None;
                    }
                    let location = object.pose(world)?.location;
                    let bearing = captured.bearing_to(location);
                    if bearing.abs() >= self.half_fov {
                        return None;
                    }
                    Some(Marker {
                        id: marker_id,
                        size: marker_size(marker_id),
                        polar: PolarCoord::new(captured.location.distance(location), bearing),
                    })
                })
                .collect()
        });

        markers.sort_by(|a, b| a.polar.distance_meters.total_cmp(&b.polar.distance_meters));
        markers
    }
}
