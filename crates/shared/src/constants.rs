use std::f32::consts::PI;

// Tick rate
pub const TICK_RATE: u32 = 30;
pub const DT: f32 = 1.0 / TICK_RATE as f32;

// Solver iterations (stable for light tokens against heavier robot bodies)
pub const VELOCITY_ITERATIONS: usize = 8;
pub const POSITION_ITERATIONS: usize = 3;

// Arena (top-down: X=horizontal, Y=vertical, origin at the centre)
pub const ARENA_WIDTH: f32 = 8.0;
pub const ARENA_HEIGHT: f32 = 8.0;
pub const WALL_THICKNESS: f32 = 2.0;
pub const WALL_RESTITUTION: f32 = 0.2;
pub const WALL_FRICTION: f32 = 0.3;

// Robot
pub const ROBOT_WIDTH: f32 = 0.45;
pub const ROBOT_DENSITY: f32 = 500.0 * 0.12; // MDF @ 12cm thickness
pub const MAX_MOTOR_POWER: f32 = 100.0;

// Wheel model
pub const DRIVE_FORCE_PER_PERCENT: f32 = 0.6;
pub const DRIVE_FRICTION_COEFF: f32 = 50.2;
pub const COAST_FRICTION_COEFF: f32 = -5.2;

// Grabber
pub const GRAB_RADIUS: f32 = 0.4;
pub const HALF_GRAB_SECTOR_WIDTH: f32 = PI / 4.0; // 45 deg half-angle
pub const GRABBER_OFFSET: f32 = 0.25;

// Tokens
pub const TOKEN_HALF_WIDTH: f32 = 0.08;
pub const TOKEN_DENSITY: f32 = 1.0;
pub const TOKEN_DAMPING: f32 = 5.0;
pub const TOKEN_RESTITUTION: f32 = 0.2;
pub const TOKEN_FRICTION: f32 = 0.3;

// Pedestals
pub const PEDESTAL_WIDTH: f32 = 0.3;

// Ultrasound
pub const ULTRASOUND_SPREAD_CASTS: i32 = 10;
pub const ULTRASOUND_SPREAD_ANGLE: f32 = 10.0 * PI / 180.0;
pub const ULTRASOUND_RANGE: f32 = 4.0;

// Camera
pub const HALF_FOV_WIDTH: f32 = PI / 6.0; // 30 deg half-angle
pub const MOTION_BLUR_SPEED_THRESHOLD: f32 = 5.0;
pub const VISION_LATENCY_MS: u64 = 200;

// Markers
pub const MARKERS_PER_WALL: u32 = 7;
pub const WALL_MARKER_IDS: std::ops::Range<u32> = 0..28;
pub const TOKEN_MARKER_IDS: std::ops::Range<u32> = 32..96;
pub const ROBOT_MARKER_BASE: u32 = 100;
pub const WALL_MARKER_SIZE: f32 = 0.25;
pub const TOKEN_MARKER_SIZE: f32 = 0.1;
pub const ROBOT_MARKER_SIZE: f32 = 0.1;

// Recording
pub const FRAME_INTERVAL: u32 = 3; // every 3rd tick = 10fps at 30Hz
