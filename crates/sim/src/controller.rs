use std::time::Duration;

use robosim_shared::*;

use crate::error::SimError;
use crate::robot::SimRobot;
use crate::sim_loop::StopSignal;

pub const CONTROLLER_NAMES: &[&str] = &["idle", "spinner", "seeker"];

/// A robot control program. `run` owns the calling thread until it returns;
/// implementations should return promptly once `stop` fires.
pub trait Controller: Send {
    fn name(&self) -> &str;
    fn run(&mut self, robot: &SimRobot, stop: &StopSignal);
}

pub fn resolve(name: &str) -> Result<Box<dyn Controller>, SimError> {
    match name {
        "idle" => Ok(Box::new(IdleController)),
        "spinner" => Ok(Box::new(SpinnerController::default())),
        "seeker" => Ok(Box::new(SeekerController::default())),
        other => Err(SimError::UnknownController(other.to_string())),
    }
}

fn set_wheels(robot: &SimRobot, left: f32, right: f32) {
    for (channel, power) in [(MotorChannel::Left, left), (MotorChannel::Right, right)] {
        let power = MotorPower::Power(power.clamp(-MAX_MOTOR_POWER, MAX_MOTOR_POWER));
        if let Err(err) = robot.set_motor(channel, power) {
            log::warn!("zone {}: {}", robot.zone(), err);
        }
    }
}

/// Sits still until stopped.
pub struct IdleController;

impl Controller for IdleController {
    fn name(&self) -> &str {
        "idle"
    }

    fn run(&mut self, robot: &SimRobot, stop: &StopSignal) {
        set_wheels(robot, 0.0, 0.0);
        while stop.sleep(Duration::from_millis(100)) {}
    }
}

/// Turns on the spot with opposing wheel powers.
pub struct SpinnerController {
    pub power: f32,
}

impl Default for SpinnerController {
    fn default() -> Self {
        Self { power: 40.0 }
    }
}

impl Controller for SpinnerController {
    fn name(&self) -> &str {
        "spinner"
    }

    fn run(&mut self, robot: &SimRobot, stop: &StopSignal) {
        set_wheels(robot, self.power, -self.power);
        while stop.sleep(Duration::from_millis(100)) {}
    }
}

/// Camera-driven token collector: turn toward the nearest token marker,
/// drive up to it, grab, back away and drop it.
pub struct SeekerController {
    pub cruise_power: f32,
    pub turn_power: f32,
    /// Distance at which a grab is attempted.
    pub grab_distance: f32,
    /// Bearing error tolerated while driving.
    pub aim_tolerance: f32,
    pub grabs: u32,
}

impl Default for SeekerController {
    fn default() -> Self {
        Self {
            cruise_power: 50.0,
            turn_power: 25.0,
            grab_distance: GRAB_RADIUS - 0.03,
            aim_tolerance: 0.15,
            grabs: 0,
        }
    }
}

impl SeekerController {
    /// One perception/action cycle. Returns false when stopped mid-cycle.
    fn step(&mut self, robot: &SimRobot, stop: &StopSignal) -> bool {
        if robot.is_holding() {
            set_wheels(robot, -self.cruise_power, -self.cruise_power);
            let finished = stop.sleep(Duration::from_millis(800));
            set_wheels(robot, 0.0, 0.0);
            robot.release();
            set_wheels(robot, self.turn_power, -self.turn_power);
            return finished && stop.sleep(Duration::from_millis(600));
        }

        let target = robot.see().into_iter().find(|m| m.is_token_marker());
        let Some(target) = target else {
            // Nothing in view; sweep
            set_wheels(robot, self.turn_power, -self.turn_power);
            return stop.sleep(Duration::from_millis(200));
        };

        let bearing = target.polar.rot_y_rad;
        let distance = target.polar.distance_meters;
        log::trace!("seeker zone {}: {} at {:.2}m {:.1}deg", robot.zone(), target.id, distance, target.polar.rot_y_deg);

        if distance <= self.grab_distance && bearing.abs() < HALF_GRAB_SECTOR_WIDTH {
            set_wheels(robot, 0.0, 0.0);
            match robot.grab() {
                Ok(true) => {
                    self.grabs += 1;
                    log::info!("zone {}: grabbed token {}", robot.zone(), target.id);
                }
                Ok(false) => {
                    // Not quite in reach; nudge forward
                    set_wheels(robot, self.turn_power, self.turn_power);
                    return stop.sleep(Duration::from_millis(100));
                }
                Err(err) => log::warn!("zone {}: {}", robot.zone(), err),
            }
            return true;
        }

        if bearing.abs() > self.aim_tolerance {
            // Positive bearing is to the right; left wheel forward turns right
            let turn = self.turn_power * bearing.signum();
            set_wheels(robot, turn, -turn);
            let duration = Duration::from_secs_f32((bearing.abs() * 0.15).clamp(0.05, 0.3));
            let finished = stop.sleep(duration);
            set_wheels(robot, 0.0, 0.0);
            return finished;
        }

        // Slow down on the final approach
        let power = if distance < 0.6 { self.turn_power } else { self.cruise_power };
        set_wheels(robot, power, power);
        let finished = stop.sleep(Duration::from_millis(150));
        set_wheels(robot, 0.0, 0.0);
        finished
    }
}

impl Controller for SeekerController {
    fn name(&self) -> &str {
        "seeker"
    }

    fn run(&mut self, robot: &SimRobot, stop: &StopSignal) {
        while self.step(robot, stop) {}
        set_wheels(robot, 0.0, 0.0);
        log::info!("seeker zone {} finished with {} grabs", robot.zone(), self.grabs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::games::EmptyGame;

    fn robot() -> SimRobot {
        let arena = Arena::with_game(&EmptyGame, SimConfig::default()).unwrap();
        SimRobot::new(&arena, 0).unwrap()
    }

    fn stopped() -> StopSignal {
        let stop = StopSignal::new();
        stop.stop();
        stop
    }

    #[test]
    fn test_resolve() {
        for name in CONTROLLER_NAMES {
            assert_eq!(resolve(name).unwrap().name(), *name);
        }
        assert_eq!(
            resolve("autopilot").err(),
            Some(SimError::UnknownController("autopilot".into()))
        );
    }

    #[test]
    fn test_spinner_sets_opposing_powers() {
        let robot = robot();
        SpinnerController { power: 30.0 }.run(&robot, &stopped());
        assert_eq!(robot.motor(MotorChannel::Left), MotorPower::Power(30.0));
        assert_eq!(robot.motor(MotorChannel::Right), MotorPower::Power(-30.0));
    }

    #[test]
    fn test_idle_brakes() {
        let robot = robot();
        robot.set_motor(MotorChannel::Left, MotorPower::Coast).unwrap();
        IdleController.run(&robot, &stopped());
        assert_eq!(robot.motor(MotorChannel::Left), MotorPower::BRAKE);
    }

    #[test]
    fn test_wheel_powers_are_clamped() {
        let robot = robot();
        set_wheels(&robot, 250.0, -250.0);
        assert_eq!(robot.motor(MotorChannel::Left), MotorPower::Power(100.0));
        assert_eq!(robot.motor(MotorChannel::Right), MotorPower::Power(-100.0));
    }
}
