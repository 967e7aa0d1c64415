//! Two-phase head-versus-body collision detection.
//!
//! Every ordered pair of snakes (A, B) is tested: a cheap axis-aligned
//! rejection first, then A's head against each of B's segments. Deaths are
//! only collected here; the world applies them after the full scan, so a
//! snake that dies this tick still acts as a hazard for everyone else.

use crate::player::Player;
use shared::PlayerId;

/// Number of leading segments on which a head-to-head contact is resolved
/// by score instead of by the body test.
pub const HEAD_CONTACT_SEGMENTS: usize = 5;
/// Extra slack added to the broad-phase window.
pub const BROAD_PHASE_MARGIN: f32 = 50.0;
/// Fraction of the other snake's radius used for body hits.
pub const BODY_RADIUS_FACTOR: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Death {
    pub victim: PlayerId,
    pub killer: PlayerId,
}

/// True unless the heads are too far apart on either axis for A to reach any
/// of B's segments.
pub fn broad_phase_overlaps(a: &Player, b: &Player) -> bool {
    let window = a.radius + b.radius + b.score + BROAD_PHASE_MARGIN;
    (a.x - b.x).abs() <= window && (a.y - b.y).abs() <= window
}

fn within(a: (f32, f32), b: (f32, f32), distance: f32) -> bool {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    dx * dx + dy * dy < distance * distance
}

/// Narrow phase: does A's head run into B?
///
/// Among the first [`HEAD_CONTACT_SEGMENTS`] segments an overlap of the two
/// heads kills A only when A is strictly smaller, so equal snakes bounce
/// through each other. Elsewhere A dies when its head comes within
/// `A.radius + B.radius * 0.5` of a segment. Scanning stops at the first
/// contact.
pub fn head_hits(a: &Player, b: &Player) -> bool {
    let heads_touch = within(a.head(), b.head(), a.radius + b.radius);
    let body_reach = a.radius + b.radius * BODY_RADIUS_FACTOR;

    for (index, &segment) in b.segments.iter().enumerate() {
        if index < HEAD_CONTACT_SEGMENTS && heads_touch {
            if a.score < b.score {
                return true;
            }
        } else if within(a.head(), segment, body_reach) {
            return true;
        }
    }
    false
}

/// Scans every ordered pair and reports each victim once, credited to the
/// first killer found in iteration order.
pub fn detect_deaths(players: &[&Player]) -> Vec<Death> {
    let mut deaths = Vec::new();

    for a in players {
        for b in players {
            if a.id == b.id || !broad_phase_overlaps(a, b) {
                continue;
            }
            if head_hits(a, b) {
                deaths.push(Death {
                    victim: a.id,
                    killer: b.id,
                });
                break;
            }
        }
    }

    deaths
}
