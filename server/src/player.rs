use shared::{
    radius_for_score, wrap_angle, PlayerId, BASE_SPEED, BOOST_COST, BOOST_SPEED, GRID_SIZE,
    MIN_SCORE, SPAWN_SEGMENTS,
};
use std::collections::VecDeque;

/// A snake as simulated by the server.
///
/// The world mutates players exclusively through these methods so that the
/// per-tick invariants (segment count, radius, clamped head) are restored in
/// one place by [`Player::settle`].
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub color: String,
    pub x: f32,
    pub y: f32,
    /// Heading in radians, kept within `(-π, π]`.
    pub angle: f32,
    pub radius: f32,
    pub score: f32,
    /// Body points, head first.
    pub segments: VecDeque<(f32, f32)>,
    /// Last boost request received from the client.
    pub boost_intent: bool,
    pub is_boosting: bool,
    pub is_leader: bool,
    pub base_speed: f32,
    pub boost_speed: f32,
}

impl Player {
    /// Creates a minimum-size snake whose whole body sits on the spawn point.
    pub fn new(id: PlayerId, name: String, color: String, x: f32, y: f32) -> Self {
        let mut player = Self {
            id,
            name,
            color,
            x,
            y,
            angle: 0.0,
            radius: radius_for_score(MIN_SCORE),
            score: MIN_SCORE,
            segments: VecDeque::with_capacity(SPAWN_SEGMENTS),
            boost_intent: false,
            is_boosting: false,
            is_leader: false,
            base_speed: BASE_SPEED,
            boost_speed: BOOST_SPEED,
        };
        player.clamp_to_bounds();
        player.segments.extend(std::iter::repeat((player.x, player.y)).take(SPAWN_SEGMENTS));
        player
    }

    pub fn head(&self) -> (f32, f32) {
        (self.x, self.y)
    }

    pub fn tail(&self) -> (f32, f32) {
        self.segments.back().copied().unwrap_or((self.x, self.y))
    }

    pub fn can_boost(&self) -> bool {
        self.score > MIN_SCORE
    }

    /// Stores the latest steering input. Takes effect on the next tick.
    pub fn set_input(&mut self, angle: f32, boosting: bool) {
        self.angle = wrap_angle(angle);
        self.boost_intent = boosting;
    }

    pub fn refresh_radius(&mut self) {
        self.radius = radius_for_score(self.score);
    }

    /// Decides whether the snake boosts this tick and drains its score if so.
    ///
    /// Returns true when boost speed applies this tick. The published flag is
    /// cleared once the drain reaches the score floor.
    pub fn resolve_boost(&mut self) -> bool {
        if !(self.boost_intent && self.can_boost()) {
            self.is_boosting = false;
            return false;
        }
        self.score = (self.score - BOOST_COST).max(MIN_SCORE);
        self.is_boosting = self.can_boost();
        true
    }

    pub fn speed(&self, boosted: bool) -> f32 {
        if boosted {
            self.boost_speed
        } else {
            self.base_speed
        }
    }

    /// Moves the head along the heading and records it as the new first
    /// segment.
    pub fn advance(&mut self, speed: f32) {
        self.x += self.angle.cos() * speed;
        self.y += self.angle.sin() * speed;
        self.clamp_to_bounds();
        self.segments.push_front((self.x, self.y));
    }

    pub fn clamp_to_bounds(&mut self) {
        let max = GRID_SIZE - self.radius;
        self.x = self.x.clamp(self.radius, max);
        self.y = self.y.clamp(self.radius, max);
    }

    /// Target body length for the current score.
    pub fn desired_length(&self) -> usize {
        self.score.floor().max(0.0) as usize
    }

    /// Truncates or extends the body to `floor(score)` points. Growth repeats
    /// the tail point so new segments unfold from the end of the body.
    pub fn sync_segments(&mut self) {
        let desired = self.desired_length();
        if self.segments.len() > desired {
            self.segments.truncate(desired);
        } else {
            let tail = self.tail();
            while self.segments.len() < desired {
                self.segments.push_back(tail);
            }
        }
    }

    /// Restores the end-of-tick invariants after the score changed.
    pub fn settle(&mut self) {
        self.refresh_radius();
        self.clamp_to_bounds();
        if let Some(head) = self.segments.front_mut() {
            *head = (self.x, self.y);
        }
        self.sync_segments();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::f32::consts::PI;

    fn player_at(x: f32, y: f32) -> Player {
        Player::new(
            PlayerId::default(),
            "Viper".to_string(),
            "#39ff14".to_string(),
            x,
            y,
        )
    }

    #[test]
    fn test_player_creation() {
        let player = player_at(100.0, 200.0);
        assert_eq!(player.score, MIN_SCORE);
        assert_eq!(player.segments.len(), SPAWN_SEGMENTS);
        assert!(player.segments.iter().all(|&s| s == (100.0, 200.0)));
        assert_approx_eq!(player.radius, radius_for_score(MIN_SCORE));
        assert!(!player.is_boosting);
        assert!(!player.is_leader);
    }

    #[test]
    fn test_spawn_is_clamped() {
        let player = player_at(0.0, GRID_SIZE);
        assert_approx_eq!(player.x, player.radius);
        assert_approx_eq!(player.y, GRID_SIZE - player.radius);
        assert_eq!(player.segments[0], (player.x, player.y));
    }

    #[test]
    fn test_advance_moves_along_heading() {
        let mut player = player_at(500.0, 500.0);
        player.set_input(PI / 2.0, false);
        player.advance(BASE_SPEED);

        assert_approx_eq!(player.x, 500.0, 1e-3);
        assert_approx_eq!(player.y, 505.0, 1e-3);
        assert_eq!(player.segments.len(), SPAWN_SEGMENTS + 1);
        assert_eq!(player.segments[0], (player.x, player.y));
    }

    #[test]
    fn test_advance_clamps_at_wall() {
        let mut player = player_at(GRID_SIZE - 12.0, 500.0);
        player.set_input(0.0, false);
        player.advance(BOOST_SPEED);
        assert_approx_eq!(player.x, GRID_SIZE - player.radius);
    }

    #[test]
    fn test_boost_requires_score_above_floor() {
        let mut player = player_at(500.0, 500.0);
        player.set_input(0.0, true);

        assert!(!player.resolve_boost());
        assert!(!player.is_boosting);
        assert_eq!(player.score, MIN_SCORE);
    }

    #[test]
    fn test_boost_drains_score() {
        let mut player = player_at(500.0, 500.0);
        player.score = 12.0;
        player.set_input(0.0, true);

        assert!(player.resolve_boost());
        assert!(player.is_boosting);
        assert_approx_eq!(player.score, 11.8);
        assert_eq!(player.speed(true), BOOST_SPEED);
    }

    #[test]
    fn test_boost_flag_clears_at_floor() {
        let mut player = player_at(500.0, 500.0);
        player.score = 10.1;
        player.set_input(0.0, true);

        assert!(player.resolve_boost());
        assert_eq!(player.score, MIN_SCORE);
        assert!(!player.is_boosting);
    }

    #[test]
    fn test_sync_segments_truncates_and_extends() {
        let mut player = player_at(500.0, 500.0);
        player.segments = (0..12).map(|i| (500.0 - i as f32, 500.0)).collect();

        player.score = 15.0;
        player.sync_segments();
        assert_eq!(player.segments.len(), 15);
        assert_eq!(player.segments[0], (500.0, 500.0));
        assert_eq!(player.segments[14], (489.0, 500.0));

        player.score = 11.9;
        player.sync_segments();
        assert_eq!(player.segments.len(), 11);
    }

    #[test]
    fn test_settle_restores_invariants() {
        let mut player = player_at(500.0, 500.0);
        player.score = 30.0;
        player.settle();

        assert_eq!(player.segments.len(), 30);
        assert_approx_eq!(player.radius, 10.0 + 30.0_f32.sqrt() * 0.5);
        assert_eq!(player.segments[0], player.head());
    }
}
