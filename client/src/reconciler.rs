//! Client-side shadow of the arena.
//!
//! Snapshots arrive at the server's tick rate, at best, and some never arrive.
//! The shadow state keeps the latest snapshot as a target and eases the drawn
//! players towards it once per render frame, so motion stays continuous
//! between and across missing snapshots.
//!
//! A tick the server split across several datagrams only becomes a target
//! once every part has arrived. Food changes apply as soon as they land.

use shared::{wrap_angle, FoodId, FoodView, PlayerId, PlayerView};
use std::collections::{BTreeMap, BTreeSet};

/// A player as drawn this frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowPlayer {
    pub id: PlayerId,
    pub name: String,
    pub color: String,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub score: u32,
    pub radius: f32,
    pub segments: Vec<(f32, f32)>,
    pub is_boosting: bool,
    pub is_leader: bool,
}

impl From<&PlayerView> for ShadowPlayer {
    fn from(view: &PlayerView) -> Self {
        Self {
            id: view.id,
            name: view.name.clone(),
            color: view.color.clone(),
            x: view.x,
            y: view.y,
            angle: view.angle,
            score: view.score,
            radius: view.radius,
            segments: view
                .segments
                .iter()
                .map(|s| (f32::from(s.x), f32::from(s.y)))
                .collect(),
            is_boosting: view.is_boosting,
            is_leader: view.is_leader,
        }
    }
}

impl ShadowPlayer {
    /// Moves one step towards `target`. Segments snap when the body length
    /// changed, otherwise every point is eased like the head.
    fn approach(&mut self, target: &PlayerView, factor: f32) {
        self.x = lerp(self.x, target.x, factor);
        self.y = lerp(self.y, target.y, factor);
        self.angle = lerp_angle(self.angle, target.angle, factor);

        if self.segments.len() == target.segments.len() {
            for (point, goal) in self.segments.iter_mut().zip(&target.segments) {
                point.0 = lerp(point.0, f32::from(goal.x), factor);
                point.1 = lerp(point.1, f32::from(goal.y), factor);
            }
        } else {
            self.segments = target
                .segments
                .iter()
                .map(|s| (f32::from(s.x), f32::from(s.y)))
                .collect();
        }

        self.name.clone_from(&target.name);
        self.color.clone_from(&target.color);
        self.score = target.score;
        self.radius = target.radius;
        self.is_boosting = target.is_boosting;
        self.is_leader = target.is_leader;
    }
}

pub fn lerp(from: f32, to: f32, factor: f32) -> f32 {
    from + (to - from) * factor
}

/// Eases an angle along the shorter arc, so turning across ±π never spins
/// the long way round.
pub fn lerp_angle(from: f32, to: f32, factor: f32) -> f32 {
    wrap_angle(from + wrap_angle(to - from) * factor)
}

/// The parts of a split tick received so far.
#[derive(Debug)]
struct PartialSnapshot {
    tick: u32,
    parts: u16,
    received: BTreeSet<u16>,
    players: Vec<PlayerView>,
}

#[derive(Debug, Default)]
pub struct ShadowState {
    players: BTreeMap<PlayerId, ShadowPlayer>,
    targets: BTreeMap<PlayerId, PlayerView>,
    food: BTreeMap<FoodId, FoodView>,
    last_tick: Option<u32>,
    partial: Option<PartialSnapshot>,
}

impl ShadowState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the food field wholesale.
    pub fn apply_initial_food(&mut self, food: Vec<FoodView>) {
        self.food = food.into_iter().map(|item| (item.id, item)).collect();
    }

    /// Folds a snapshot that arrived in one datagram into the shadow.
    pub fn apply_snapshot(
        &mut self,
        tick: u32,
        players: Vec<PlayerView>,
        eaten_food: &[FoodId],
        new_food: Vec<FoodView>,
    ) -> bool {
        self.apply_snapshot_part(tick, 0, 1, players, eaten_food, new_food)
    }

    /// Folds one snapshot part into the shadow.
    ///
    /// Food changes always apply; ids already removed or already present are
    /// harmless. The player set only becomes the new target once every part
    /// of a tick newer than the last one applied has arrived. Returns whether
    /// it did. A newer tick abandons an unfinished older one.
    pub fn apply_snapshot_part(
        &mut self,
        tick: u32,
        part: u16,
        parts: u16,
        players: Vec<PlayerView>,
        eaten_food: &[FoodId],
        new_food: Vec<FoodView>,
    ) -> bool {
        for id in eaten_food {
            self.food.remove(id);
        }
        for item in new_food {
            self.food.insert(item.id, item);
        }

        if self.last_tick.is_some_and(|last| tick <= last) || part >= parts {
            return false;
        }
        if parts == 1 {
            self.partial = None;
            self.commit(tick, players);
            return true;
        }

        if self.partial.as_ref().is_some_and(|partial| partial.tick > tick) {
            return false;
        }
        if self.partial.as_ref().map_or(true, |partial| partial.tick != tick) {
            self.partial = Some(PartialSnapshot {
                tick,
                parts,
                received: BTreeSet::new(),
                players: Vec::new(),
            });
        }
        let Some(partial) = self.partial.as_mut() else {
            return false;
        };
        if !partial.received.insert(part) {
            return false;
        }
        partial.players.extend(players);
        if partial.received.len() < usize::from(partial.parts) {
            return false;
        }

        let players = std::mem::take(&mut partial.players);
        self.partial = None;
        self.commit(tick, players);
        true
    }

    fn commit(&mut self, tick: u32, players: Vec<PlayerView>) {
        self.last_tick = Some(tick);
        self.targets = players.into_iter().map(|view| (view.id, view)).collect();

        if self.players.is_empty() {
            self.players = self
                .targets
                .values()
                .map(|view| (view.id, ShadowPlayer::from(view)))
                .collect();
        }
    }

    /// Eases every shadow player towards its target. Call once per frame.
    pub fn interpolate(&mut self, factor: f32) {
        let targets = &self.targets;
        self.players.retain(|id, _| targets.contains_key(id));

        for (id, target) in targets {
            match self.players.get_mut(id) {
                Some(player) => player.approach(target, factor),
                None => {
                    self.players.insert(*id, ShadowPlayer::from(target));
                }
            }
        }
    }

    /// Forgets everything, e.g. after the server dropped the session.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn player(&self, id: PlayerId) -> Option<&ShadowPlayer> {
        self.players.get(&id)
    }

    pub fn players(&self) -> impl Iterator<Item = &ShadowPlayer> {
        self.players.values()
    }

    /// The latest snapshot's record of `id`, before interpolation.
    pub fn target(&self, id: PlayerId) -> Option<&PlayerView> {
        self.targets.get(&id)
    }

    /// Whether the latest target snapshot contains `id`.
    pub fn is_alive(&self, id: PlayerId) -> bool {
        self.targets.contains_key(&id)
    }

    pub fn food(&self) -> impl Iterator<Item = &FoodView> {
        self.food.values()
    }

    pub fn food_count(&self) -> usize {
        self.food.len()
    }

    pub fn last_tick(&self) -> Option<u32> {
        self.last_tick
    }

    /// The `n` highest scores, best first.
    pub fn leaderboard(&self, n: usize) -> Vec<&ShadowPlayer> {
        let mut ranked: Vec<&ShadowPlayer> = self.players.values().collect();
        ranked.sort_by(|a, b| b.score.cmp(&a.score).then(a.id.cmp(&b.id)));
        ranked.truncate(n);
        ranked
    }
}
