pub mod arena;
pub mod config;
pub mod controller;
pub mod error;
pub mod games;
pub mod object;
pub mod physics;
pub mod robot;
pub mod sensors;
pub mod sim_loop;

pub use arena::{Arena, ArenaBuilder, Bounds};
pub use controller::Controller;
pub use error::SimError;
pub use games::Game;
pub use object::{GameObject, ObjectId};
pub use robot::SimRobot;
pub use sensors::{Camera, UltrasonicSensor, UltrasoundChannel};
pub use sim_loop::*;
