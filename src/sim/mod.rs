//! Particle simulation.
//!
//! Owns every live entity and advances them one frame tick at a time.
//! The simulation is deterministic for a given seed and operation
//! sequence: all randomness flows through one owned RNG, and nothing
//! here reads the wall clock or touches the terminal.

pub mod entities;

pub use entities::{Fragment, Projectile, Sparkle, Trail};

use entities::rand_in;

use crate::config::Config;
use crate::theme::Rgb;

const WHITE: Rgb = (255, 255, 255);

/// An explosion below this much fragment headroom is skipped outright.
const MIN_BURST_HEADROOM: usize = 10;

/// Who asked for a launch. Direct user actions may evict the oldest
/// projectile at the ceiling; automatic launches are simply rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchKind {
    Auto,
    User,
}

/// A burst that happened during an `advance` step, for the driver to
/// hang glint flashes on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Burst {
    pub x: f32,
    pub y: f32,
    pub color: Rgb,
}

pub struct Simulation {
    width: f32,
    height: f32,
    cfg: Config,
    rng: fastrand::Rng,
    projectiles: Vec<Projectile>,
    fragments: Vec<Fragment>,
    trails: Vec<Trail>,
    sparkles: Vec<Sparkle>,
}

impl Simulation {
    pub fn new(width: f32, height: f32, cfg: Config, seed: u64) -> Self {
        let mut rng = fastrand::Rng::with_seed(seed);
        let sparkles = (0..cfg.sparkle_count)
            .map(|_| Sparkle::new(width, height, &mut rng))
            .collect();
        Self {
            width,
            height,
            cfg,
            rng,
            projectiles: Vec::new(),
            fragments: Vec::with_capacity(cfg.max_particles),
            trails: Vec::new(),
            sparkles,
        }
    }

    pub fn bounds(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn trails(&self) -> &[Trail] {
        &self.trails
    }

    pub fn sparkles(&self) -> &[Sparkle] {
        &self.sparkles
    }

    /// New viewport bounds. Ambient sparkles are re-rolled inside the
    /// new sky; everything in flight keeps going.
    pub fn resize(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
        for s in &mut self.sparkles {
            s.reposition(width, height, &mut self.rng);
        }
    }

    /// Drop everything transient. Sparkles persist; they are a fixed
    /// pool, not launch debris.
    pub fn clear_transient(&mut self) {
        self.projectiles.clear();
        self.fragments.clear();
        self.trails.clear();
    }

    /// Launch a projectile from `origin` toward `target`, colored from
    /// `palette`. Returns false when the launch was rejected at the
    /// projectile ceiling.
    pub fn spawn_projectile(
        &mut self,
        origin: (f32, f32),
        target: (f32, f32),
        palette: &[Rgb],
        kind: LaunchKind,
    ) -> bool {
        if self.projectiles.len() >= self.cfg.max_projectiles {
            match kind {
                LaunchKind::Auto => return false,
                // Oldest first in, first out.
                LaunchKind::User => {
                    self.projectiles.remove(0);
                }
            }
        }

        let color = palette[self.rng.usize(..palette.len())];
        let secondary = palette[self.rng.usize(..palette.len())];
        let speed = rand_in(&mut self.rng, 12.0, 16.0);
        self.projectiles
            .push(Projectile::new(origin, target, color, secondary, speed));
        true
    }

    /// Advance the whole show by one frame tick. Returns the bursts
    /// that went off during the step.
    pub fn advance(&mut self) -> Vec<Burst> {
        for s in &mut self.sparkles {
            s.step();
        }

        let mut bursts = Vec::new();
        let mut i = 0;
        while i < self.projectiles.len() {
            if self.projectiles[i].tick_trail() {
                let (x, y, color) = {
                    let p = &self.projectiles[i];
                    (p.x, p.y, p.color)
                };
                let trail = Trail::new(x, y, color, &mut self.rng);
                self.trails.push(trail);
            }

            self.projectiles[i].step(self.cfg.gravity);

            if self.projectiles[i].ready_to_explode() {
                // Removal by index shift; the burst replaces the shell
                // in the same step.
                let p = self.projectiles.remove(i);
                bursts.push(Burst {
                    x: p.x,
                    y: p.y,
                    color: p.color,
                });
                self.explode(&p);
            } else {
                i += 1;
            }
        }

        let mut i = 0;
        while i < self.fragments.len() {
            self.fragments[i].step(self.cfg.gravity, self.cfg.friction, &mut self.rng);
            if self.fragments[i].is_dead() {
                self.fragments.swap_remove(i);
            } else {
                i += 1;
            }
        }

        let mut i = 0;
        while i < self.trails.len() {
            self.trails[i].step();
            if self.trails[i].is_dead() {
                self.trails.swap_remove(i);
            } else {
                i += 1;
            }
        }

        bursts
    }

    /// Burst a shell into fragments. The fragment ceiling is a hard
    /// cap: the primary ring and the inner burst together never push
    /// the live count past it, and a nearly-full sky gets no burst at
    /// all.
    fn explode(&mut self, p: &Projectile) {
        let headroom = self.cfg.max_particles.saturating_sub(self.fragments.len());
        if headroom <= MIN_BURST_HEADROOM {
            return;
        }

        let count = self.cfg.particle_count.min(headroom);
        for i in 0..count {
            let angle = (std::f32::consts::TAU / count as f32) * i as f32
                + rand_in(&mut self.rng, -0.1, 0.1);
            let speed = rand_in(&mut self.rng, 2.0, 5.0);
            let color = if i % 3 == 0 { p.secondary_color } else { p.color };
            let f = Fragment::new(
                p.x,
                p.y,
                angle.cos() * speed,
                angle.sin() * speed,
                color,
                self.cfg.particle_decay,
                &mut self.rng,
            );
            self.fragments.push(f);
        }

        let inner = (count * 2 / 5).min(headroom - count);
        for _ in 0..inner {
            let angle = rand_in(&mut self.rng, 0.0, std::f32::consts::TAU);
            let speed = rand_in(&mut self.rng, 0.5, 2.5);
            let f = Fragment::new(
                p.x,
                p.y,
                angle.cos() * speed,
                angle.sin() * speed,
                WHITE,
                self.cfg.particle_decay,
                &mut self.rng,
            );
            self.fragments.push(f);
        }
    }
}
