//! Mouse and keyboard sampling

use macroquad::prelude::*;

/// What the player asked for this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInput {
    /// Heading in radians, world axes (y grows downwards like the screen)
    pub angle: f32,
    pub boosting: bool,
    /// Enter went down this frame
    pub respawn: bool,
    pub quit: bool,
}

/// Samples input once per frame and turns held keys into press events
pub struct InputManager {
    last_angle: f32,
    prev_enter: bool,
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            last_angle: 0.0,
            prev_enter: false,
        }
    }

    pub fn update(&mut self) -> FrameInput {
        let center = (screen_width() / 2.0, screen_height() / 2.0);
        if let Some(angle) = heading_from(center, mouse_position()) {
            self.last_angle = angle;
        }

        let enter = is_key_down(KeyCode::Enter) || is_key_down(KeyCode::KpEnter);
        let respawn = pressed(&mut self.prev_enter, enter);

        FrameInput {
            angle: self.last_angle,
            boosting: is_mouse_button_down(MouseButton::Left) || is_key_down(KeyCode::Space),
            respawn,
            quit: is_key_pressed(KeyCode::Escape),
        }
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Angle from the screen centre to the cursor. `None` while the cursor sits
/// on the centre, where the heading is undefined.
pub fn heading_from(center: (f32, f32), cursor: (f32, f32)) -> Option<f32> {
    let dx = cursor.0 - center.0;
    let dy = cursor.1 - center.1;
    if dx.abs() < f32::EPSILON && dy.abs() < f32::EPSILON {
        return None;
    }
    Some(dy.atan2(dx))
}

/// Edge detection: true only on the frame `down` flips to true.
fn pressed(previous: &mut bool, down: bool) -> bool {
    let edge = down && !*previous;
    *previous = down;
    edge
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::f32::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_heading_from_cursor() {
        let center = (400.0, 300.0);
        assert_approx_eq!(heading_from(center, (500.0, 300.0)).unwrap(), 0.0);
        assert_approx_eq!(heading_from(center, (400.0, 400.0)).unwrap(), FRAC_PI_2);
        assert_approx_eq!(heading_from(center, (300.0, 300.0)).unwrap(), PI);
        assert_approx_eq!(heading_from(center, (400.0, 200.0)).unwrap(), -FRAC_PI_2);
    }

    #[test]
    fn test_heading_undefined_at_center() {
        assert_eq!(heading_from((400.0, 300.0), (400.0, 300.0)), None);
    }

    #[test]
    fn test_pressed_fires_once_per_press() {
        let mut previous = false;
        assert!(!pressed(&mut previous, false));
        assert!(pressed(&mut previous, true));
        assert!(!pressed(&mut previous, true));
        assert!(!pressed(&mut previous, false));
        assert!(pressed(&mut previous, true));
    }

    #[test]
    fn test_input_manager_creation() {
        let manager = InputManager::new();
        assert_eq!(manager.last_angle, 0.0);
        assert!(!manager.prev_enter);
    }
}
