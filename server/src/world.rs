//! The authoritative simulation.
//!
//! `World` owns every player and food pellet. It is driven by exactly one
//! task: the network loop calls [`World::tick`] at the fixed rate and applies
//! joins, inputs and leaves between ticks.

use crate::collision::{self, Death};
use crate::config::{WorldConfig, BOOST_DROP_VALUE, DEATH_DROP_VALUE};
use crate::food::{FoodDelta, FoodStore};
use crate::player::Player;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{radius_for_score, PlayerId, FOOD_RADIUS, GRID_SIZE, MIN_SCORE};
use slotmap::SlotMap;

/// A death resolved during a tick, with the display details of both sides
/// captured before the victim was removed.
#[derive(Debug, Clone, PartialEq)]
pub struct Kill {
    pub killer: PlayerId,
    pub killer_name: String,
    pub killer_color: String,
    pub victim: PlayerId,
    pub victim_name: String,
    pub victim_color: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutcome {
    pub kills: Vec<Kill>,
}

pub struct World {
    config: WorldConfig,
    players: SlotMap<PlayerId, Player>,
    food: FoodStore,
    rng: StdRng,
    tick: u32,
}

impl World {
    pub fn new(config: WorldConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Builds a world whose spawns and drops are reproducible.
    pub fn with_seed(config: WorldConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: WorldConfig, rng: StdRng) -> Self {
        let mut world = Self {
            config: config.sanitized(),
            players: SlotMap::with_key(),
            food: FoodStore::new(),
            rng,
            tick: 0,
        };

        for _ in 0..world.config.initial_food {
            world.food.spawn_random(&mut world.rng);
        }
        info!(
            "World created ({}x{}) with {} food",
            GRID_SIZE,
            GRID_SIZE,
            world.food.len()
        );
        world
    }

    /// Spawns a minimum-size snake at a random point inside the bounds.
    pub fn add_player(&mut self, name: String, color: String) -> PlayerId {
        let margin = radius_for_score(MIN_SCORE);
        let x = self.rng.gen_range(margin..=GRID_SIZE - margin);
        let y = self.rng.gen_range(margin..=GRID_SIZE - margin);

        let id = self
            .players
            .insert_with_key(|id| Player::new(id, name, color, x, y));
        info!("Spawned player {} at ({:.0}, {:.0})", id, x, y);
        id
    }

    /// Despawns a player, scattering food where its body was, then trims the
    /// food field back to the cap. Unknown ids are ignored.
    pub fn remove_player(&mut self, id: PlayerId) -> bool {
        let Some(player) = self.players.remove(id) else {
            return false;
        };

        let mut dropped = 0;
        for &(x, y) in &player.segments {
            if self.rng.gen_bool(self.config.death_drop_chance) {
                self.food.insert(x, y, DEATH_DROP_VALUE);
                dropped += 1;
            }
        }
        let evicted = self.food.enforce_cap(self.config.food_cap);

        info!(
            "Removed player {} ({}) at score {:.0}, dropped {} food, evicted {}",
            id, player.name, player.score, dropped, evicted
        );
        true
    }

    /// Stores steering input for the next tick. Returns false for ids that
    /// no longer resolve, e.g. a snake that died this tick.
    pub fn handle_input(&mut self, id: PlayerId, angle: f32, boosting: bool) -> bool {
        match self.players.get_mut(id) {
            Some(player) => {
                player.set_input(angle, boosting);
                true
            }
            None => false,
        }
    }

    /// Advances the simulation by one fixed step.
    pub fn tick(&mut self) -> TickOutcome {
        self.tick = self.tick.wrapping_add(1);

        let ids: Vec<PlayerId> = self.players.keys().collect();
        for id in ids {
            self.advance_player(id);
        }

        let deaths = {
            let players: Vec<&Player> = self.players.values().collect();
            collision::detect_deaths(&players)
        };
        let kills: Vec<Kill> = deaths.iter().filter_map(|death| self.describe(death)).collect();
        for death in &deaths {
            self.remove_player(death.victim);
        }
        self.food.enforce_cap(self.config.food_cap);

        self.update_leader();

        if !kills.is_empty() {
            debug!("Tick {}: {} deaths", self.tick, kills.len());
        }
        TickOutcome { kills }
    }

    /// Boost, movement, body update and food pickup for a single snake.
    fn advance_player(&mut self, id: PlayerId) {
        let Some(player) = self.players.get_mut(id) else {
            return;
        };

        player.refresh_radius();
        let tail = player.tail();
        let boosted = player.resolve_boost();
        if boosted && self.rng.gen_bool(self.config.boost_drop_chance) {
            self.food.insert(tail.0, tail.1, BOOST_DROP_VALUE);
        }

        player.advance(player.speed(boosted));
        player.sync_segments();

        let (x, y) = player.head();
        let eaten = self.food.consume_near(x, y, player.radius + FOOD_RADIUS);
        for food in &eaten {
            player.score += f32::from(food.value);
            self.food.spawn_random(&mut self.rng);
        }

        player.settle();
    }

    fn describe(&self, death: &Death) -> Option<Kill> {
        let killer = self.players.get(death.killer)?;
        let victim = self.players.get(death.victim)?;
        Some(Kill {
            killer: death.killer,
            killer_name: killer.name.clone(),
            killer_color: killer.color.clone(),
            victim: death.victim,
            victim_name: victim.name.clone(),
            victim_color: victim.color.clone(),
        })
    }

    /// Flags the first highest-scoring player in slot order as leader.
    fn update_leader(&mut self) {
        let mut leader: Option<(PlayerId, f32)> = None;
        for (id, player) in self.players.iter_mut() {
            player.is_leader = false;
            if leader.map_or(true, |(_, best)| player.score > best) {
                leader = Some((id, player.score));
            }
        }

        if let Some(player) = leader.and_then(|(id, _)| self.players.get_mut(id)) {
            player.is_leader = true;
        }
    }

    /// Drains the food changes since the previous snapshot.
    pub fn take_food_delta(&mut self) -> FoodDelta {
        self.food.take_delta()
    }

    /// Puts back a delta that never reached the clients, so the next
    /// snapshot carries it.
    pub fn restore_food_delta(&mut self, delta: FoodDelta) {
        self.food.restore_delta(delta);
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    #[cfg(test)]
    pub(crate) fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    /// Live players in slot order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn leader(&self) -> Option<PlayerId> {
        self.players().find(|player| player.is_leader).map(|player| player.id)
    }

    pub fn food(&self) -> &FoodStore {
        &self.food
    }

    #[cfg(test)]
    pub(crate) fn food_mut(&mut self) -> &mut FoodStore {
        &mut self.food
    }

    pub fn food_count(&self) -> usize {
        self.food.len()
    }

    pub fn tick_count(&self) -> u32 {
        self.tick
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }
}
