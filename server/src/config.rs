//! Tunables for the simulation and the network loop.
//!
//! Game-defining constants (grid size, tick rate, speeds) live in `shared`
//! because the client depends on them too. The values here only shape the
//! server's behaviour and can be overridden from the command line.

use shared::{FOOD_CAP, INITIAL_FOOD, TICK_RATE};
use std::time::Duration;

/// Food value dropped at each segment of a dead snake.
pub const DEATH_DROP_VALUE: u8 = 2;
/// Food value dropped behind a boosting snake.
pub const BOOST_DROP_VALUE: u8 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct WorldConfig {
    pub initial_food: usize,
    pub food_cap: usize,
    /// Chance per tick that a boosting snake leaks food at its tail.
    pub boost_drop_chance: f64,
    /// Chance per segment that a despawned snake leaves food behind.
    pub death_drop_chance: f64,
}

impl WorldConfig {
    /// Clamps probabilities into `[0, 1]` and keeps the initial food within
    /// the cap.
    pub fn sanitized(mut self) -> Self {
        self.boost_drop_chance = sanitize_chance(self.boost_drop_chance);
        self.death_drop_chance = sanitize_chance(self.death_drop_chance);
        self.initial_food = self.initial_food.min(self.food_cap);
        self
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            initial_food: INITIAL_FOOD,
            food_cap: FOOD_CAP,
            boost_drop_chance: 0.2,
            death_drop_chance: 0.5,
        }
    }
}

fn sanitize_chance(chance: f64) -> f64 {
    if chance.is_nan() {
        0.0
    } else {
        chance.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub tick_duration: Duration,
    pub max_sessions: usize,
    /// Sessions silent for longer than this are disconnected.
    pub session_timeout: Duration,
    /// Outbound datagrams buffered for the sender task before new ones are
    /// dropped.
    pub outbound_queue: usize,
    pub world: WorldConfig,
    /// Fixed RNG seed for reproducible sessions.
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_duration: Duration::from_secs_f64(1.0 / TICK_RATE as f64),
            max_sessions: 64,
            session_timeout: Duration::from_secs(5),
            outbound_queue: 256,
            world: WorldConfig::default(),
            seed: None,
        }
    }
}
