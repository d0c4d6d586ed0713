use super::ease::lerp;

/// Direction the ring moved during the last frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

/// Global scroll state of the carousel, in world units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollState {
    /// Smoothed offset actually rendered.
    pub current: f32,
    /// Offset requested by input.
    pub target: f32,
    /// `current` as of the previous frame.
    pub last: f32,
    /// Per-frame smoothing factor in `(0, 1]`.
    pub ease: f32,
}

impl ScrollState {
    pub fn new(ease: f32) -> Self {
        Self {
            current: 0.0,
            target: 0.0,
            last: 0.0,
            ease,
        }
    }

    /// Moves `current` toward `target` by `ease`.
    pub fn advance(&mut self) {
        self.current = lerp(self.current, self.target, self.ease);
    }

    pub fn direction(&self) -> Direction {
        if self.current > self.last {
            Direction::Right
        } else {
            Direction::Left
        }
    }

    /// Records this frame's position for the next direction check.
    pub fn commit(&mut self) {
        self.last = self.current;
    }

    /// Rounds `target` to the nearest whole item so exactly one item ends centered.
    pub fn snap(&mut self, item_width: f32) {
        self.target = snap_to_item(self.target, item_width);
    }
}

/// Nearest multiple of `item_width`, keeping the sign of `target`.
pub fn snap_to_item(target: f32, item_width: f32) -> f32 {
    if !(item_width.is_finite() && item_width > 0.0) || !target.is_finite() {
        return target;
    }
    let index = (target.abs() / item_width).round();
    let item = item_width * index;
    if target < 0.0 { -item } else { item }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snap_rounds_to_nearest_item() {
        assert_eq!(snap_to_item(0.075, 7.0), 0.0);
        assert_eq!(snap_to_item(3.6, 7.0), 7.0);
        assert_eq!(snap_to_item(-3.6, 7.0), -7.0);
        assert_eq!(snap_to_item(-10.0, 7.0), -7.0);
        assert_eq!(snap_to_item(15.0, 7.0), 14.0);
    }

    #[test]
    fn snap_is_a_fixed_point() {
        let mut state = ScrollState::new(0.08);
        for target in [-40.3_f32, -3.5, 0.0, 0.2, 12.9, 123.4] {
            state.target = target;
            state.snap(6.4);
            let once = state.target;
            state.snap(6.4);
            assert_eq!(once, state.target);
        }
    }

    #[test]
    fn snap_ignores_degenerate_width() {
        assert_eq!(snap_to_item(4.2, 0.0), 4.2);
        assert_eq!(snap_to_item(4.2, f32::NAN), 4.2);
    }

    #[test]
    fn direction_follows_frame_delta() {
        let mut state = ScrollState::new(0.5);
        state.target = 10.0;
        state.advance();
        assert_eq!(state.direction(), Direction::Right);
        state.commit();
        state.target = -10.0;
        state.advance();
        assert_eq!(state.direction(), Direction::Left);
        state.commit();
        // no movement reads as left
        state.target = state.current;
        state.advance();
        assert_eq!(state.direction(), Direction::Left);
    }
}
