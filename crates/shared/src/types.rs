use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Power setting for one motor channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MotorPower {
    /// Percentage of full power, in `[-MAX_MOTOR_POWER, MAX_MOTOR_POWER]`.
    Power(f32),
    /// No drive force; the wheel spins freely against friction.
    Coast,
}

impl MotorPower {
    /// Braking and zero power behave identically.
    pub const BRAKE: MotorPower = MotorPower::Power(0.0);

    pub fn is_valid(&self) -> bool {
        match *self {
            MotorPower::Power(p) => p.is_finite() && p.abs() <= crate::MAX_MOTOR_POWER,
            MotorPower::Coast => true,
        }
    }
}

impl Default for MotorPower {
    fn default() -> Self {
        Self::BRAKE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MotorChannel {
    /// m0, wheel at `-ROBOT_WIDTH / 2` from the centreline.
    Left,
    /// m1, wheel at `+ROBOT_WIDTH / 2` from the centreline.
    Right,
}

impl MotorChannel {
    pub const ALL: [MotorChannel; 2] = [MotorChannel::Left, MotorChannel::Right];

    pub fn index(&self) -> usize {
        match self {
            MotorChannel::Left => 0,
            MotorChannel::Right => 1,
        }
    }
}

/// Position and heading of an object in arena coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub location: Vec2,
    pub heading: f32,
}

impl Pose {
    pub fn new(location: Vec2, heading: f32) -> Self {
        Self { location, heading }
    }

    pub fn forward(&self) -> Vec2 {
        Vec2::new(self.heading.cos(), self.heading.sin())
    }

    /// Signed angle from this pose's heading to `point`, in [-PI, PI].
    /// Positive is clockwise on screen (toward the robot's right).
    pub fn bearing_to(&self, point: Vec2) -> f32 {
        let rel = point - self.location;
        angle_diff(rel.y.atan2(rel.x), self.heading)
    }
}

/// Shortest angular difference (signed), result in [-PI, PI].
pub fn angle_diff(target: f32, current: f32) -> f32 {
    use std::f32::consts::PI;
    let mut diff = target - current;
    while diff > PI {
        diff -= 2.0 * PI;
    }
    while diff < -PI {
        diff += 2.0 * PI;
    }
    diff
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
}

/// Result of an arena boundary check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PointCheck {
    Inside,
    /// Outside the arena. `axis` is the first violated axis (X is checked
    /// before Y) and `clamped` the coordinate on that axis pulled back
    /// inside the bounds.
    Outside { axis: Axis, clamped: f32 },
}

impl PointCheck {
    pub fn is_inside(&self) -> bool {
        matches!(self, PointCheck::Inside)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolarCoord {
    pub distance_meters: f32,
    pub rot_y_rad: f32,
    pub rot_y_deg: f32,
}

impl PolarCoord {
    pub fn new(distance_meters: f32, rot_y_rad: f32) -> Self {
        Self {
            distance_meters,
            rot_y_rad,
            rot_y_deg: rot_y_rad.to_degrees(),
        }
    }
}

/// A marker observed by the camera. Values are captured at observation
/// time and stay valid regardless of what later happens to the source object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub id: u32,
    pub size: f32,
    pub polar: PolarCoord,
}

impl Marker {
    pub fn is_wall_marker(&self) -> bool {
        is_wall_marker(self.id)
    }

    pub fn is_token_marker(&self) -> bool {
        is_token_marker(self.id)
    }
}

impl std::fmt::Display for Marker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Marker {}, pos: ({},{})",
            self.id, self.polar.distance_meters, self.polar.rot_y_rad
        )
    }
}

pub fn is_wall_marker(id: u32) -> bool {
    crate::WALL_MARKER_IDS.contains(&id)
}

pub fn is_token_marker(id: u32) -> bool {
    crate::TOKEN_MARKER_IDS.contains(&id)
}

/// Physical size of the marker with the given id.
pub fn marker_size(id: u32) -> f32 {
    if is_wall_marker(id) {
        crate::WALL_MARKER_SIZE
    } else if is_token_marker(id) {
        crate::TOKEN_MARKER_SIZE
    } else {
        crate::ROBOT_MARKER_SIZE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectKind {
    WallMarker,
    Pedestal,
    Token,
    Robot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectSnapshot {
    pub id: u32,
    pub kind: ObjectKind,
    pub surface_name: String,
    pub x: f32,
    pub y: f32,
    pub heading: f32,
    pub marker_id: Option<u32>,
    pub grabbed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArenaFrame {
    pub tick: u64,
    pub objects: Vec<ObjectSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    pub config: SimConfig,
    pub frames: Vec<ArenaFrame>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub game: String,
    pub tick_rate: u32,
    pub vision_latency_ms: u64,
    pub seed: u64,
    pub robot_markers: bool,
    pub frame_interval: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            game: "pirate-islands".into(),
            tick_rate: crate::TICK_RATE,
            vision_latency_ms: crate::VISION_LATENCY_MS,
            seed: 0,
            robot_markers: false,
            frame_interval: crate::FRAME_INTERVAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_motor_power_validity() {
        assert!(MotorPower::Power(100.0).is_valid());
        assert!(MotorPower::Power(-100.0).is_valid());
        assert!(MotorPower::Coast.is_valid());
        assert!(!MotorPower::Power(100.5).is_valid());
        assert!(!MotorPower::Power(f32::NAN).is_valid());
        assert_eq!(MotorPower::default(), MotorPower::BRAKE);
    }

    #[test]
    fn test_marker_classification() {
        assert!(is_wall_marker(0));
        assert!(is_wall_marker(27));
        assert!(!is_wall_marker(28));
        assert!(is_token_marker(32));
        assert!(!is_token_marker(96));
        assert!(!is_token_marker(crate::ROBOT_MARKER_BASE));
        assert!((marker_size(3) - crate::WALL_MARKER_SIZE).abs() < 1e-6);
        assert!((marker_size(40) - crate::TOKEN_MARKER_SIZE).abs() < 1e-6);
    }

    #[test]
    fn test_polar_degrees() {
        let p = PolarCoord::new(1.0, std::f32::consts::FRAC_PI_2);
        assert!((p.rot_y_deg - 90.0).abs() < 1e-4);
    }

    #[test]
    fn test_angle_diff_wraps() {
        use std::f32::consts::PI;
        assert!(angle_diff(0.0, 0.0).abs() < 1e-6);
        // 3.0 - (-3.0) should give ~-0.28 not ~6.0
        assert!((angle_diff(3.0, -3.0) - (6.0 - 2.0 * PI)).abs() < 1e-4);
        assert!(angle_diff(PI, 0.0).abs() <= PI + 1e-6);
    }

    #[test]
    fn test_bearing_to() {
        let pose = Pose::new(Vec2::ZERO, std::f32::consts::FRAC_PI_2);
        assert!(pose.bearing_to(Vec2::new(0.0, 2.0)).abs() < 1e-6);
        assert!((pose.bearing_to(Vec2::new(-1.0, 0.0)) - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn test_point_check_inside() {
        assert!(PointCheck::Inside.is_inside());
        assert!(!PointCheck::Outside { axis: Axis::X, clamped: 4.0 }.is_inside());
    }
}
