//! Arena content. A game decides the arena size, the robot start zones and
//! which objects populate the arena before it is shared.

use std::f32::consts::{FRAC_PI_2, PI};

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use robosim_shared::*;

use crate::arena::{ArenaBuilder, Bounds};
use crate::error::SimError;

pub const GAME_NAMES: &[&str] = &["empty", "pirate-islands"];

pub trait Game: Send + Sync {
    fn name(&self) -> &str;

    fn size(&self) -> Vec2 {
        Vec2::new(ARENA_WIDTH, ARENA_HEIGHT)
    }

    /// One entry per robot zone.
    fn start_locations(&self) -> Vec<Vec2>;

    /// One entry per robot zone, matching `start_locations`.
    fn start_headings(&self) -> Vec<f32>;

    fn populate(&self, builder: &mut ArenaBuilder, seed: u64) -> Result<(), SimError>;
}

/// Resolve a game by name.
pub fn resolve(name: &str) -> Result<Box<dyn Game>, SimError> {
    match name {
        "empty" => Ok(Box::new(EmptyGame)),
        "pirate-islands" => Ok(Box::new(PirateIslands)),
        other => Err(SimError::UnknownGame(other.to_string())),
    }
}

/// Place `MARKERS_PER_WALL` markers evenly along each wall, facing inward.
/// Ids run clockwise from the top-left corner.
fn add_wall_markers(builder: &mut ArenaBuilder) {
    let bounds = builder.bounds();
    let corners = bounds.corners();
    let mut marker_id = WALL_MARKER_IDS.start;

    for (i, &start) in corners.iter().enumerate() {
        let end = corners[(i + 1) % corners.len()];
        let along = end - start;
        // Inward normal for a clockwise walk in screen coordinates (y down)
        let inward = Vec2::new(-along.y, along.x).normalize_or_zero();
        let heading = inward.y.atan2(inward.x);

        for n in 1..=MARKERS_PER_WALL {
            let t = n as f32 / (MARKERS_PER_WALL + 1) as f32;
            builder.add_wall_marker(marker_id, Pose::new(start + along * t, heading));
            marker_id += 1;
        }
    }
}

/// Corners of the arena pulled inward by `inset`.
fn corner_starts(bounds: &Bounds, inset: f32) -> Vec<Vec2> {
    bounds
        .corners()
        .iter()
        .map(|c| *c - c.signum() * inset)
        .collect()
}

/// Walls and wall markers only.
pub struct EmptyGame;

impl Game for EmptyGame {
    fn name(&self) -> &str {
        "empty"
    }

    fn start_locations(&self) -> Vec<Vec2> {
        corner_starts(&Bounds::from_size(self.size()), 0.5)
    }

    fn start_headings(&self) -> Vec<f32> {
        // Face the centre from each corner
        self.start_locations()
            .iter()
            .map(|p| (-p.y).atan2(-p.x))
            .collect()
    }

    fn populate(&self, builder: &mut ArenaBuilder, _seed: u64) -> Result<(), SimError> {
        add_wall_markers(builder);
        Ok(())
    }
}

/// Four pedestals around the centre and a cluster of tokens in each quadrant.
pub struct PirateIslands;

impl PirateIslands {
    pub const PEDESTAL_LOCATIONS: [Vec2; 4] = [
        Vec2::new(-2.0, 0.0),
        Vec2::new(2.0, 0.0),
        Vec2::new(0.0, -2.0),
        Vec2::new(0.0, 2.0),
    ];
    pub const TOKENS_PER_ZONE: usize = 4;
    const MIN_TOKEN_SPACING: f32 = 0.3;

    /// `n` points in `[0.07, 1.77)^2`, each at least `min_dist` from the others.
    fn random_positions_spaced(rng: &mut Pcg64, n: usize, min_dist: f32) -> Vec<Vec2> {
        let mut positions: Vec<Vec2> = Vec::with_capacity(n);
        while positions.len() < n {
            let candidate = Vec2::new(
                0.07 + rng.random::<f32>() * 1.7,
                0.07 + rng.random::<f32>() * 1.7,
            );
            if positions.iter().all(|p| p.distance(candidate) > min_dist) {
                positions.push(candidate);
            }
        }
        positions
    }
}

impl Game for PirateIslands {
    fn name(&self) -> &str {
        "pirate-islands"
    }

    fn start_locations(&self) -> Vec<Vec2> {
        vec![Vec2::new(-3.6, -3.6), Vec2::new(3.6, 3.6)]
    }

    fn start_headings(&self) -> Vec<f32> {
        vec![FRAC_PI_2, -FRAC_PI_2]
    }

    fn populate(&self, builder: &mut ArenaBuilder, seed: u64) -> Result<(), SimError> {
        add_wall_markers(builder);

        for location in Self::PEDESTAL_LOCATIONS {
            builder.add_pedestal(location)?;
        }

        // The same spread in every quadrant, rotated a quarter turn per zone
        let mut rng = Pcg64::seed_from_u64(seed);
        let spread = Self::random_positions_spaced(&mut rng, Self::TOKENS_PER_ZONE, Self::MIN_TOKEN_SPACING);
        let mut marker_id = TOKEN_MARKER_IDS.start;
        for zone in 0..4 {
            let rotation = Vec2::from_angle(zone as f32 * PI / 2.0);
            for offset in &spread {
                let local = -(*offset + Vec2::splat(0.15));
                builder.add_token(marker_id, rotation.rotate(local), 0.0)?;
                marker_id += 1;
            }
        }
        Ok(())
    }
}

/// Hand-placed layouts for unit tests.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    #[derive(Default)]
    pub struct Scenario {
        pub starts: Vec<Pose>,
        pub tokens: Vec<Vec2>,
        pub pedestals: Vec<Vec2>,
        pub wall_markers: Vec<(u32, Pose)>,
    }

    impl Game for Scenario {
        fn name(&self) -> &str {
            "scenario"
        }

        fn start_locations(&self) -> Vec<Vec2> {
            self.starts.iter().map(|p| p.location).collect()
        }

        fn start_headings(&self) -> Vec<f32> {
            self.starts.iter().map(|p| p.heading).collect()
        }

        fn populate(&self, builder: &mut ArenaBuilder, _seed: u64) -> Result<(), SimError> {
            for &(id, pose) in &self.wall_markers {
                builder.add_wall_marker(id, pose);
            }
            for &location in &self.pedestals {
                builder.add_pedestal(location)?;
            }
            for (i, &location) in self.tokens.iter().enumerate() {
                builder.add_token(TOKEN_MARKER_IDS.start + i as u32, location, 0.0)?;
            }
            Ok(())
        }
    }
}
