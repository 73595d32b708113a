//! Fixed-cadence driver for `Arena::tick` and the control-thread launcher.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use robosim_shared::*;

use crate::arena::Arena;
use crate::controller::Controller;
use crate::robot::SimRobot;

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Sleep for `duration`, waking early if stopped. Returns false if the
    /// signal fired.
    pub fn sleep(&self, duration: Duration) -> bool {
        const SLICE: Duration = Duration::from_millis(10);
        let deadline = Instant::now() + duration;
        loop {
            if self.is_stopped() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(SLICE));
        }
    }
}

/// Steps an arena at a fixed rate, optionally recording frames.
pub struct SimulationLoop {
    arena: Arc<Arena>,
    tick_rate: u32,
    frame_interval: u32,
    frames: Option<Vec<ArenaFrame>>,
}

impl SimulationLoop {
    pub fn new(arena: Arc<Arena>, tick_rate: u32) -> Self {
        let frame_interval = arena.config().frame_interval;
        Self {
            arena,
            tick_rate: tick_rate.max(1),
            frame_interval,
            frames: None,
        }
    }

    /// Capture a frame every `frame_interval` ticks (plus the initial state).
    pub fn with_recording(mut self) -> Self {
        self.frames = Some(vec![self.arena.snapshot()]);
        self
    }

    pub fn arena(&self) -> &Arc<Arena> {
        &self.arena
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate as f64)
    }

    pub fn frames(&self) -> &[ArenaFrame] {
        self.frames.as_deref().unwrap_or(&[])
    }

    pub fn into_frames(self) -> Vec<ArenaFrame> {
        self.frames.unwrap_or_default()
    }

    fn step(&mut self, dt: f32) {
        self.arena.tick(dt);

        if let Some(frames) = &mut self.frames {
            if self.frame_interval > 0 && self.arena.ticks() % self.frame_interval as u64 == 0 {
                frames.push(self.arena.snapshot());
            }
        }
    }

    /// Run `n` ticks at the loop's cadence on the calling thread.
    pub fn run_ticks(&mut self, n: u64) {
        self.run(Some(n), &StopSignal::new());
    }

    /// Run until `stop` fires.
    pub fn run_until(&mut self, stop: &StopSignal) {
        self.run(None, stop);
    }

    fn run(&mut self, limit: Option<u64>, stop: &StopSignal) {
        let period = self.period();
        let dt = 1.0 / self.tick_rate as f32;
        let mut next = Instant::now();
        let mut done = 0u64;

        while !stop.is_stopped() && limit.map_or(true, |n| done < n) {
            self.step(dt);
            done += 1;

            next += period;
            let now = Instant::now();
            if next > now {
                thread::sleep(next - now);
            } else if now - next > period {
                // Fell more than a tick behind: drop the backlog instead of
                // bursting to catch up.
                log::warn!(
                    "Simulation tick {} overran by {:.1}ms; re-basing schedule",
                    self.arena.ticks(),
                    (now - next).as_secs_f64() * 1000.0
                );
                next = now;
            }
        }
    }

    /// Move the loop onto its own thread.
    pub fn spawn(mut self) -> std::io::Result<LoopHandle> {
        let stop = StopSignal::new();
        let arena = Arc::clone(&self.arena);
        let thread_stop = stop.clone();
        let thread = thread::Builder::new()
            .name("simulation".into())
            .spawn(move || {
                log::info!("Simulation loop started at {} Hz", self.tick_rate);
                self.run_until(&thread_stop);
                log::info!("Simulation loop stopped after {} ticks", self.arena.ticks());
                self
            })?;
        Ok(LoopHandle { arena, stop, thread })
    }
}

/// A simulation loop running on its own thread.
pub struct LoopHandle {
    arena: Arc<Arena>,
    stop: StopSignal,
    thread: JoinHandle<SimulationLoop>,
}

impl LoopHandle {
    pub fn ticks(&self) -> u64 {
        self.arena.ticks()
    }

    /// The loop's own stop flag, for handing to control threads.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Stop the loop and wait for it to finish its current tick.
    pub fn stop(self) -> SimulationLoop {
        self.stop.stop();
        match self.thread.join() {
            Ok(sim) => sim,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

/// Run `controller` against `robot` on a named, detached thread.
///
/// The thread is never joined: when `stop` fires the controller is expected
/// to return, but one that ignores it is abandoned at process exit.
pub fn spawn_controller(
    robot: SimRobot,
    mut controller: Box<dyn Controller>,
    stop: StopSignal,
) -> std::io::Result<()> {
    let name = format!("robot-{}-{}", robot.zone(), controller.name());
    log::info!("Starting controller '{}' for zone {}", controller.name(), robot.zone());
    thread::Builder::new().name(name).spawn(move || {
        controller.run(&robot, &stop);
        log::debug!("Controller for zone {} returned", robot.zone());
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::EmptyGame;

    fn arena() -> Arc<Arena> {
        Arena::with_game(&EmptyGame, SimConfig::default()).unwrap()
    }

    #[test]
    fn test_run_ticks_counts_and_paces() {
        let mut sim = SimulationLoop::new(arena(), 30);
        let start = Instant::now();
        sim.run_ticks(6);
        assert_eq!(sim.arena().ticks(), 6);
        // Six periods of ~33ms, minus scheduling slack
        assert!(start.elapsed() >= Duration::from_millis(150), "loop ran too fast: {:?}", start.elapsed());
    }

    #[test]
    fn test_recording_every_frame_interval() {
        let arena = Arena::with_game(
            &EmptyGame,
            SimConfig {
                frame_interval: 3,
                ..Default::default()
            },
        )
        .unwrap();
        let mut sim = SimulationLoop::new(arena, 120).with_recording();
        sim.run_ticks(9);

        let ticks: Vec<u64> = sim.frames().iter().map(|f| f.tick).collect();
        assert_eq!(ticks, vec![0, 3, 6, 9]);
    }

    #[test]
    fn test_spawned_loop_stops() {
        let handle = SimulationLoop::new(arena(), 60).spawn().unwrap();
        thread::sleep(Duration::from_millis(100));
        assert!(handle.ticks() > 0);

        let sim = handle.stop();
        let ticks = sim.arena().ticks();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(sim.arena().ticks(), ticks, "loop kept ticking after stop");
    }

    #[test]
    fn test_stop_signal_wakes_sleeper() {
        let stop = StopSignal::new();
        let remote = stop.clone();
        let sleeper = thread::spawn(move || remote.sleep(Duration::from_secs(10)));
        stop.stop();
        assert!(!sleeper.join().unwrap());
        assert!(StopSignal::new().sleep(Duration::from_millis(1)));
    }
}
