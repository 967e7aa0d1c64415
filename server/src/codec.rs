//! Builds the outbound packets from world state.
//!
//! Everything the client sees is quantized here: positions, headings and
//! radii to 0.1, scores to whole points, body and food coordinates to whole
//! world units.
//!
//! A tick's broadcast must fit in UDP datagrams. Players are packed into as
//! many snapshot parts as needed, and a body too long for any datagram is
//! thinned before it is packed.

use crate::food::{Food, FoodDelta};
use crate::player::Player;
use crate::world::{Kill, World};
use shared::{
    encoded_len, round_tenth, round_unit, FoodId, FoodView, Packet, PlayerView, Segment,
    MAX_DATAGRAM_SIZE,
};

/// Payload bytes a snapshot part may fill, leaving room for the packet
/// header and the part's own framing.
pub const SNAPSHOT_BUDGET: usize = MAX_DATAGRAM_SIZE - 1024;
/// Body points a single view may carry.
pub const MAX_VIEW_SEGMENTS: usize = 8_000;

pub fn player_view(player: &Player) -> PlayerView {
    PlayerView {
        id: player.id,
        name: player.name.clone(),
        color: player.color.clone(),
        x: round_tenth(player.x),
        y: round_tenth(player.y),
        angle: round_tenth(player.angle),
        score: player.score.round() as u32,
        radius: round_tenth(player.radius),
        segments: player
            .segments
            .iter()
            .map(|&(x, y)| Segment {
                x: round_unit(x),
                y: round_unit(y),
            })
            .collect(),
        is_boosting: player.is_boosting,
        is_leader: player.is_leader,
    }
}

pub fn food_view(food: &Food) -> FoodView {
    FoodView {
        id: food.id,
        x: round_unit(food.x),
        y: round_unit(food.y),
        value: food.value,
    }
}

/// Keeps every n-th body point so at most [`MAX_VIEW_SEGMENTS`] remain.
/// The head and the tail always survive.
pub fn thin_segments(segments: Vec<Segment>) -> Vec<Segment> {
    let len = segments.len();
    if len <= MAX_VIEW_SEGMENTS {
        return segments;
    }

    let stride = len.div_ceil(MAX_VIEW_SEGMENTS - 1);
    let mut thinned: Vec<Segment> = segments.iter().step_by(stride).copied().collect();
    if (len - 1) % stride != 0 {
        thinned.push(segments[len - 1]);
    }
    thinned
}

fn snapshot_view(player: &Player) -> PlayerView {
    let mut view = player_view(player);
    view.segments = thin_segments(view.segments);
    view
}

/// The per-tick broadcast: every live player plus the food changes in
/// `delta`, split into datagram-sized parts. Part 0 carries the food changes
/// and there is always at least one part.
pub fn world_snapshot(world: &World, delta: &FoodDelta) -> Vec<Packet> {
    let eaten_food: Vec<FoodId> = delta.eaten.clone();
    let new_food: Vec<FoodView> = delta.added.iter().map(food_view).collect();

    let mut chunks: Vec<Vec<PlayerView>> = vec![Vec::new()];
    // An unmeasurable item is charged a full part.
    let mut used = encoded_len(&eaten_food).unwrap_or(SNAPSHOT_BUDGET)
        + encoded_len(&new_food).unwrap_or(SNAPSHOT_BUDGET);
    for player in world.players() {
        let view = snapshot_view(player);
        let size = encoded_len(&view).unwrap_or(SNAPSHOT_BUDGET);
        if used + size > SNAPSHOT_BUDGET && used > 0 {
            chunks.push(Vec::new());
            used = 0;
        }
        used += size;
        if let Some(chunk) = chunks.last_mut() {
            chunk.push(view);
        }
    }

    let tick = world.tick_count();
    let parts = chunks.len() as u16;
    let mut food = Some((eaten_food, new_food));
    chunks
        .into_iter()
        .enumerate()
        .map(|(part, players)| {
            let (eaten_food, new_food) = food.take().unwrap_or_default();
            Packet::WorldSnapshot {
                tick,
                part: part as u16,
                parts,
                players,
                eaten_food,
                new_food,
            }
        })
        .collect()
}

/// The complete food field, sent once after a join.
pub fn initial_food_snapshot(world: &World) -> Packet {
    Packet::InitialFood {
        food: world.food().iter().map(food_view).collect(),
    }
}

pub fn kill_notification(kill: &Kill) -> Packet {
    Packet::KillNotification {
        killer_name: kill.killer_name.clone(),
        killer_color: kill.killer_color.clone(),
        victim_name: kill.victim_name.clone(),
        victim_color: kill.victim_color.clone(),
    }
}
