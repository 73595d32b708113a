use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use robosim_shared::*;
use robosim_sim::config::load_config;
use robosim_sim::controller::{self, CONTROLLER_NAMES};
use robosim_sim::games::GAME_NAMES;
use robosim_sim::{spawn_controller, Arena, SimRobot, SimulationLoop};

#[derive(Parser)]
#[command(name = "robosim", about = "Robot arena simulator CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation with one controller per start zone
    Run {
        /// YAML config file; flags below override its values
        #[arg(long)]
        config: Option<PathBuf>,

        /// Arena layout (empty, pirate-islands)
        #[arg(long)]
        game: Option<String>,

        /// Comma-separated controller names, one per zone (idle, spinner, seeker)
        #[arg(long, default_value = "seeker,spinner")]
        robots: String,

        /// Wall-clock duration of the run
        #[arg(long, default_value_t = 10.0)]
        seconds: f32,

        /// Seed for token placement
        #[arg(long)]
        seed: Option<u64>,

        /// Simulation rate in Hz
        #[arg(long)]
        tick_rate: Option<u32>,

        /// Camera latency in milliseconds
        #[arg(long)]
        vision_latency_ms: Option<u64>,

        /// Give each robot a visible marker
        #[arg(long)]
        robot_markers: bool,

        /// Output path for the recording JSON
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// List the available games and controllers
    List,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            game,
            robots,
            seconds,
            seed,
            tick_rate,
            vision_latency_ms,
            robot_markers,
            output,
        } => {
            let mut sim_config = match config {
                Some(path) => match load_config(&path) {
                    Ok(config) => config,
                    Err(e) => {
                        eprintln!("{}", e);
                        std::process::exit(1);
                    }
                },
                None => SimConfig::default(),
            };
            if let Some(game) = game {
                sim_config.game = game;
            }
            if let Some(seed) = seed {
                sim_config.seed = seed;
            }
            if let Some(tick_rate) = tick_rate {
                sim_config.tick_rate = tick_rate;
            }
            if let Some(latency) = vision_latency_ms {
                sim_config.vision_latency_ms = latency;
            }
            sim_config.robot_markers |= robot_markers;
            log::debug!("effective config: {:?}", sim_config);

            cmd_run(sim_config, &robots, seconds, output);
        }

        Commands::List => cmd_list(),
    }
}

fn cmd_run(config: SimConfig, robots: &str, seconds: f32, output: Option<PathBuf>) {
    let controller_names: Vec<&str> = robots
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    let mut controllers = Vec::new();
    for name in &controller_names {
        match controller::resolve(name) {
            Ok(c) => controllers.push(c),
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(1);
            }
        }
    }

    let arena = match Arena::from_config(config.clone()) {
        Ok(arena) => arena,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let mut sim_robots = Vec::new();
    for zone in 0..controllers.len() {
        match SimRobot::new(&arena, zone) {
            Ok(robot) => sim_robots.push(robot),
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(1);
            }
        }
    }

    println!(
        "Running '{}' with {} robot(s) for {:.1}s at {} Hz (seed={})",
        config.game,
        sim_robots.len(),
        seconds,
        config.tick_rate,
        config.seed
    );

    let mut sim = SimulationLoop::new(arena.clone(), config.tick_rate);
    if output.is_some() {
        sim = sim.with_recording();
    }
    let handle = match sim.spawn() {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to start simulation thread: {}", e);
            std::process::exit(1);
        }
    };

    for (robot, controller) in sim_robots.iter().cloned().zip(controllers) {
        if let Err(e) = spawn_controller(robot, controller, handle.stop_signal()) {
            eprintln!("Failed to start controller thread: {}", e);
        }
    }

    std::thread::sleep(Duration::from_secs_f32(seconds.max(0.0)));
    let sim = handle.stop();

    println!();
    println!("=== Run Result ===");
    println!(
        "Ticks:      {} ({:.1}s simulated)",
        arena.ticks(),
        arena.ticks() as f32 / config.tick_rate.max(1) as f32
    );
    println!();
    println!("--- Robots ---");
    for (robot, name) in sim_robots.iter().zip(&controller_names) {
        let pose = robot.pose();
        println!(
            "  zone {} ({}): pos=({:.2}, {:.2}) heading={:.1}deg holding={}",
            robot.zone(),
            name,
            pose.location.x,
            pose.location.y,
            pose.heading.to_degrees(),
            robot.is_holding()
        );
    }

    if let Some(path) = output {
        let recording = Recording {
            config,
            frames: sim.into_frames(),
        };
        match serde_json::to_string_pretty(&recording) {
            Ok(json) => match std::fs::write(&path, json) {
                Ok(()) => println!("\nRecording written to {}", path.display()),
                Err(e) => eprintln!("\nFailed to write recording: {}", e),
            },
            Err(e) => eprintln!("\nFailed to serialize recording: {}", e),
        }
    }
}

fn cmd_list() {
    println!("Games:       {}", GAME_NAMES.join(", "));
    println!("Controllers: {}", CONTROLLER_NAMES.join(", "));
}
