use thiserror::Error;

use crate::sensors::UltrasoundChannel;

#[derive(Debug, Error, PartialEq)]
pub enum SimError {
    #[error("Invalid motor power: {0} (valid values: between -100 and 100, Coast, or Brake)")]
    InvalidMotorPower(f32),
    #[error("The robot is already holding something.")]
    AlreadyHolding,
    #[error("Unknown game '{0}'. Valid options: {}", crate::games::GAME_NAMES.join(", "))]
    UnknownGame(String),
    #[error("There's no ultrasound module on pins {trigger} and {echo}. Try: {}", UltrasoundChannel::describe_all())]
    UnknownUltrasoundPins { trigger: u8, echo: u8 },
    #[error("No start zone {zone} in this arena ({zones} zones)")]
    NoStartZone { zone: usize, zones: usize },
    #[error("Fixture vertices do not form a convex polygon")]
    DegenerateFixture,
    #[error("Unknown controller '{0}'. Valid options: {}", crate::controller::CONTROLLER_NAMES.join(", "))]
    UnknownController(String),
}
