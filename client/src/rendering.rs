use crate::network::{ClientStatus, KillFeedEntry};
use crate::reconciler::{ShadowPlayer, ShadowState};
use macroquad::prelude::*;
use shared::{parse_color, PlayerId, FOOD_RADIUS, GRID_SIZE, MIN_SCORE};

const BACKGROUND: Color = Color::new(0.1, 0.1, 0.1, 1.0);
const GRID_LINE: Color = Color::new(0.18, 0.18, 0.18, 1.0);
const GRID_SPACING: f32 = 100.0;
const LEADERBOARD_SIZE: usize = 5;
const LEADERBOARD_NAME_LEN: usize = 10;
const BOOST_READY: Color = Color::new(1.0, 0.6, 0.0, 1.0);

/// Everything the HUD needs besides the world itself
pub struct Frame<'a> {
    pub state: &'a ShadowState,
    pub me: Option<PlayerId>,
    pub status: &'a ClientStatus,
    /// Our score in the last snapshot we were alive in.
    pub last_score: Option<u32>,
    pub kill_feed: Vec<&'a KillFeedEntry>,
}

/// Camera-follow renderer. The local snake stays centred; while dead or
/// spectating the camera stays where it last was.
pub struct Renderer {
    camera: (f32, f32),
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            camera: (GRID_SIZE / 2.0, GRID_SIZE / 2.0),
        }
    }

    pub fn render(&mut self, frame: &Frame) {
        if let Some(player) = frame.me.and_then(|id| frame.state.player(id)) {
            self.camera = (player.x, player.y);
        }

        clear_background(BACKGROUND);
        self.draw_grid();
        self.draw_food(frame.state);

        for player in frame.state.players() {
            self.draw_snake(player, Some(player.id) == frame.me);
        }

        self.draw_hud(frame);
    }

    fn to_screen(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x - self.camera.0 + screen_width() / 2.0,
            y - self.camera.1 + screen_height() / 2.0,
        )
    }

    fn visible(&self, x: f32, y: f32, margin: f32) -> bool {
        let (sx, sy) = self.to_screen(x, y);
        sx > -margin && sy > -margin && sx < screen_width() + margin && sy < screen_height() + margin
    }

    fn draw_grid(&self) {
        let mut offset = 0.0;
        while offset <= GRID_SIZE {
            let (x0, y0) = self.to_screen(offset, 0.0);
            let (x1, y1) = self.to_screen(offset, GRID_SIZE);
            draw_line(x0, y0, x1, y1, 1.0, GRID_LINE);
            let (x0, y0) = self.to_screen(0.0, offset);
            let (x1, y1) = self.to_screen(GRID_SIZE, offset);
            draw_line(x0, y0, x1, y1, 1.0, GRID_LINE);
            offset += GRID_SPACING;
        }

        let (x, y) = self.to_screen(0.0, 0.0);
        draw_rectangle_lines(x, y, GRID_SIZE, GRID_SIZE, 4.0, RED);
    }

    fn draw_food(&self, state: &ShadowState) {
        for food in state.food() {
            let (x, y) = (f32::from(food.x), f32::from(food.y));
            if !self.visible(x, y, FOOD_RADIUS) {
                continue;
            }
            let (sx, sy) = self.to_screen(x, y);
            draw_circle(sx, sy, FOOD_RADIUS, food_color(food.value));
        }
    }

    fn draw_snake(&self, player: &ShadowPlayer, is_local: bool) {
        let color = hex_color(&player.color);
        let body = Color::new(color.r * 0.8, color.g * 0.8, color.b * 0.8, 1.0);

        for &(x, y) in player.segments.iter().rev() {
            if self.visible(x, y, player.radius) {
                let (sx, sy) = self.to_screen(x, y);
                draw_circle(sx, sy, player.radius, body);
            }
        }

        let (hx, hy) = self.to_screen(player.x, player.y);
        draw_circle(hx, hy, player.radius, color);
        if player.is_leader {
            draw_circle_lines(hx, hy, player.radius + 4.0, 3.0, GOLD);
        }
        if player.is_boosting {
            draw_circle_lines(hx, hy, player.radius + 1.5, 1.5, WHITE);
        }

        // Eyes along the heading.
        let (dx, dy) = (player.angle.cos(), player.angle.sin());
        let (px, py) = (-dy, dx);
        for side in [-1.0, 1.0] {
            let ex = hx + dx * player.radius * 0.5 + px * side * player.radius * 0.4;
            let ey = hy + dy * player.radius * 0.5 + py * side * player.radius * 0.4;
            draw_circle(ex, ey, player.radius * 0.25, WHITE);
        }

        let label_color = if is_local { YELLOW } else { WHITE };
        let size = measure_text(&player.name, None, 16, 1.0);
        draw_text(
            &player.name,
            hx - size.width / 2.0,
            hy - player.radius - 6.0,
            16.0,
            label_color,
        );
    }

    fn draw_hud(&self, frame: &Frame) {
        if let Some(player) = frame.me.and_then(|id| frame.state.player(id)) {
            draw_text(&format!("Score: {}", player.score), 10.0, 24.0, 24.0, WHITE);
            self.draw_boost_meter(player.score);
        }

        let right = screen_width() - 180.0;
        draw_text("Leaderboard", right, 24.0, 20.0, WHITE);
        for (rank, player) in frame.state.leaderboard(LEADERBOARD_SIZE).iter().enumerate() {
            let line = format!(
                "{}. {} {}",
                rank + 1,
                truncate_name(&player.name, LEADERBOARD_NAME_LEN),
                player.score
            );
            let color = if Some(player.id) == frame.me {
                YELLOW
            } else {
                hex_color(&player.color)
            };
            draw_text(&line, right, 46.0 + rank as f32 * 20.0, 18.0, color);
        }

        for (i, entry) in frame.kill_feed.iter().enumerate() {
            let y = screen_height() - 20.0 - i as f32 * 20.0;
            let killer = truncate_name(&entry.killer_name, LEADERBOARD_NAME_LEN);
            let victim = truncate_name(&entry.victim_name, LEADERBOARD_NAME_LEN);
            draw_text(&killer, 10.0, y, 18.0, hex_color(&entry.killer_color));
            let offset = measure_text(&killer, None, 18, 1.0).width;
            draw_text(" ate ", 10.0 + offset, y, 18.0, LIGHTGRAY);
            let offset = offset + measure_text(" ate ", None, 18, 1.0).width;
            draw_text(&victim, 10.0 + offset, y, 18.0, hex_color(&entry.victim_color));
        }

        if let Some(text) = status_banner(frame.status, frame.last_score) {
            let size = measure_text(&text, None, 32, 1.0);
            draw_text(
                &text,
                (screen_width() - size.width) / 2.0,
                screen_height() / 2.0,
                32.0,
                WHITE,
            );
        }
    }

    /// Full and orange while boosting is possible, empty and grey otherwise.
    fn draw_boost_meter(&self, score: u32) {
        let (x, y, width, height) = (10.0, 36.0, 120.0, 10.0);
        draw_text("Boost", x, y + height + 16.0, 16.0, LIGHTGRAY);
        if boost_ready(score) {
            draw_rectangle(x, y, width, height, BOOST_READY);
        }
        draw_rectangle_lines(x, y, width, height, 2.0, GRAY);
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Boosting drains score, so it needs more than the minimum.
pub fn boost_ready(score: u32) -> bool {
    score as f32 > MIN_SCORE
}

/// The centred message for anything but normal play.
pub fn status_banner(status: &ClientStatus, last_score: Option<u32>) -> Option<String> {
    match status {
        ClientStatus::Dead => Some(match last_score {
            Some(score) => format!("You died with {} points. Press Enter to respawn", score),
            None => "You died. Press Enter to respawn".to_string(),
        }),
        ClientStatus::Spectating => Some("Press Enter to play".to_string()),
        ClientStatus::Disconnected { reason } => Some(format!("Disconnected: {}", reason)),
        ClientStatus::Playing => None,
    }
}

/// Shortens a name for the leaderboard, counting characters, not bytes.
pub fn truncate_name(name: &str, max: usize) -> String {
    name.chars().take(max).collect()
}

/// Parses a `#rrggbb` color, falling back to grey for anything else.
pub fn hex_color(color: &str) -> Color {
    match parse_color(color) {
        Some((r, g, b)) => Color::from_rgba(r, g, b, 255),
        None => GRAY,
    }
}

/// Food is tinted by its value.
pub fn food_color(value: u8) -> Color {
    match value {
        1 => Color::from_rgba(255, 99, 71, 255),
        2 => Color::from_rgba(255, 215, 0, 255),
        3 => Color::from_rgba(50, 205, 50, 255),
        4 => Color::from_rgba(30, 144, 255, 255),
        _ => Color::from_rgba(238, 130, 238, 255),
    }
}
