//! The four visual entity kinds and their per-tick physics.
//!
//! All motion constants are per-frame-tick values in virtual pixel
//! space. Nothing here is scaled by elapsed time; the show's pacing is
//! coupled to the tick rate on purpose.

use crate::theme::Rgb;

/// Opacity below which a fragment is dead.
pub const FRAGMENT_DEATH_ALPHA: f32 = 0.02;
/// Trail particles fade by this much every tick.
pub const TRAIL_DECAY: f32 = 0.04;
/// A projectile drops a trail particle every this many ticks.
pub const TRAIL_EVERY: u32 = 2;

pub(crate) fn rand_in(rng: &mut fastrand::Rng, min: f32, max: f32) -> f32 {
    min + rng.f32() * (max - min)
}

/// A launched shell climbing toward its burst point.
#[derive(Debug, Clone)]
pub struct Projectile {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub target_y: f32,
    pub color: Rgb,
    pub secondary_color: Rgb,
    trail_tick: u32,
}

impl Projectile {
    /// Aim from `origin` toward `target` at the given speed.
    pub fn new(
        origin: (f32, f32),
        target: (f32, f32),
        color: Rgb,
        secondary_color: Rgb,
        speed: f32,
    ) -> Self {
        let angle = (target.1 - origin.1).atan2(target.0 - origin.0);
        Self {
            x: origin.0,
            y: origin.1,
            vx: angle.cos() * speed,
            vy: angle.sin() * speed,
            target_y: target.1,
            color,
            secondary_color,
            trail_tick: 0,
        }
    }

    /// Advance the trail counter; true when this tick emits a trail.
    pub fn tick_trail(&mut self) -> bool {
        self.trail_tick += 1;
        self.trail_tick % TRAIL_EVERY == 0
    }

    pub fn step(&mut self, gravity: f32) {
        self.x += self.vx;
        self.y += self.vy;
        self.vy += gravity;
    }

    /// Apex passed, or the target height reached.
    pub fn ready_to_explode(&self) -> bool {
        self.vy >= 0.0 || self.y <= self.target_y
    }
}

/// One explosion-burst particle.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub color: Rgb,
    pub alpha: f32,
    pub decay: f32,
    pub size: f32,
    /// Occasionally re-brightens instead of fading smoothly.
    pub glints: bool,
}

impl Fragment {
    pub fn new(
        x: f32,
        y: f32,
        vx: f32,
        vy: f32,
        color: Rgb,
        decay_base: f32,
        rng: &mut fastrand::Rng,
    ) -> Self {
        Self {
            x,
            y,
            vx,
            vy,
            color,
            alpha: 1.0,
            decay: rand_in(rng, decay_base, decay_base + 0.01),
            size: rand_in(rng, 1.5, 3.5),
            glints: rng.f32() > 0.7,
        }
    }

    pub fn step(&mut self, gravity: f32, friction: f32, rng: &mut fastrand::Rng) {
        self.x += self.vx;
        self.y += self.vy;
        self.vy += gravity;
        self.vx *= friction;
        self.vy *= friction;
        self.alpha -= self.decay;

        if self.glints && rng.f32() > 0.9 {
            self.alpha = (self.alpha + 0.1).min(1.0);
        }
    }

    pub fn is_dead(&self) -> bool {
        self.alpha <= FRAGMENT_DEATH_ALPHA
    }
}

/// Short-lived mark along a projectile's path.
#[derive(Debug, Clone)]
pub struct Trail {
    pub x: f32,
    pub y: f32,
    pub color: Rgb,
    pub alpha: f32,
    pub size: f32,
}

impl Trail {
    pub fn new(x: f32, y: f32, color: Rgb, rng: &mut fastrand::Rng) -> Self {
        Self {
            x,
            y,
            color,
            alpha: 0.8,
            size: rand_in(rng, 1.0, 2.5),
        }
    }

    pub fn step(&mut self) {
        self.alpha -= TRAIL_DECAY;
    }

    pub fn is_dead(&self) -> bool {
        self.alpha <= 0.0
    }
}

/// Persistent background twinkle. Lives in the upper 80% of the sky,
/// oscillating between faint and bright forever.
#[derive(Debug, Clone)]
pub struct Sparkle {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub alpha: f32,
    pub speed: f32,
    pub dir: f32,
}

impl Sparkle {
    pub fn new(width: f32, height: f32, rng: &mut fastrand::Rng) -> Self {
        let mut s = Self {
            x: 0.0,
            y: 0.0,
            size: 0.0,
            alpha: 0.0,
            speed: 0.0,
            dir: 1.0,
        };
        s.reposition(width, height, rng);
        s
    }

    /// Re-roll position and phase inside the given bounds.
    pub fn reposition(&mut self, width: f32, height: f32, rng: &mut fastrand::Rng) {
        self.x = rand_in(rng, 0.0, width);
        self.y = rand_in(rng, 0.0, height * 0.8);
        self.size = rand_in(rng, 0.5, 2.0);
        self.alpha = rand_in(rng, 0.2, 0.7);
        self.speed = rand_in(rng, 0.01, 0.02);
        self.dir = if rng.bool() { 1.0 } else { -1.0 };
    }

    pub fn step(&mut self) {
        self.alpha += self.speed * self.dir;
        if self.alpha >= 0.8 || self.alpha <= 0.1 {
            self.dir = -self.dir;
        }
    }
}
