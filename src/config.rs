//! Show tunables, scaled by power profile.
//!
//! All physics constants are per-frame-tick multipliers. The show is
//! deliberately frame-rate-coupled: pacing comes from the tick rate,
//! not from measured wall time, so none of these are scaled by dt.

/// Virtual pixels per half-block subcell. The simulation runs in
/// virtual pixel space; the renderer divides by this to find a cell.
pub const PX_PER_CELL: f32 = 8.0;

/// Frames with a measured gap above this are dropped outright.
pub const STALL_MS: u64 = 100;

/// Resize events are applied only after this quiet period.
pub const RESIZE_DEBOUNCE_MS: u64 = 150;

/// Minimum interval between user-driven launches.
pub const LAUNCH_THROTTLE_MS: u64 = 80;

/// Swipe classification: minimum travel (virtual px) and maximum
/// press-to-release duration.
pub const SWIPE_MIN_DIST: f32 = 60.0;
pub const SWIPE_MAX_MS: u64 = 500;
/// Delay between staggered swipe launches.
pub const SWIPE_STAGGER_MS: u64 = 80;

/// Glint flash delays after a burst.
pub const GLINT_DELAYS_MS: [u64; 2] = [50, 120];

/// Power profile. `Low` halves the draw rate and shrinks every pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Profile {
    #[default]
    Full,
    Low,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Full => "full",
            Profile::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "full" => Some(Profile::Full),
            "low" => Some(Profile::Low),
            _ => None,
        }
    }
}

/// Numeric knobs for one run of the show.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub profile: Profile,
    /// Fragments per primary explosion ring.
    pub particle_count: usize,
    /// Per-tick downward acceleration (virtual px / tick^2).
    pub gravity: f32,
    /// Per-tick velocity multiplier for fragments.
    pub friction: f32,
    /// Ambient sparkle pool size.
    pub sparkle_count: usize,
    /// Milliseconds between automatic launches.
    pub auto_interval_ms: u64,
    /// Ceiling on concurrently airborne projectiles.
    pub max_projectiles: usize,
    /// Ceiling on live explosion fragments (trails included).
    pub max_particles: usize,
    /// Base per-tick opacity decay for fragments.
    pub particle_decay: f32,
}

impl Config {
    pub fn for_profile(profile: Profile) -> Self {
        match profile {
            Profile::Full => Self {
                profile,
                particle_count: 55,
                gravity: 0.04,
                friction: 0.975,
                sparkle_count: 35,
                auto_interval_ms: 1800,
                max_projectiles: 6,
                max_particles: 350,
                particle_decay: 0.018,
            },
            Profile::Low => Self {
                profile,
                particle_count: 35,
                gravity: 0.04,
                friction: 0.975,
                sparkle_count: 20,
                auto_interval_ms: 2500,
                max_projectiles: 4,
                max_particles: 200,
                particle_decay: 0.018,
            },
        }
    }

    /// Auto-launches hold off while the sky is this full.
    pub fn auto_launch_headroom(&self) -> usize {
        self.max_particles * 6 / 10
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::for_profile(Profile::Full)
    }
}
