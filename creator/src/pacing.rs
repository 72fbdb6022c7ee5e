//! Adaptive pacing of unit creation (§4.6): `create_delay` is nudged up or
//! down after every unit, based on the levels of the last three units this
//! process created, so a flooded committee backs off and a starved one
//! speeds up.

use std::time::Duration;

/// Tracks the levels of the last three locally created units and adjusts
/// `create_delay` accordingly. Mirrors `Process.adjust_create_delay` in
/// `original_source/aleph/process.py`: two units created back to back at
/// the same level means we are producing faster than the committee can
/// advance, so slow down; levels advancing by two or more over the last
/// three units means we are lagging, so speed up.
pub struct AdaptiveDelay {
    delay: Duration,
    step_size: f64,
    recent_levels: [u64; 3],
    filled: usize,
}

impl AdaptiveDelay {
    pub fn new(initial_delay: Duration, step_size: f64) -> Self {
        Self { delay: initial_delay, step_size, recent_levels: [0; 3], filled: 0 }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Records the level of a just-created unit and adjusts `delay`.
    pub fn record(&mut self, level: u64) {
        self.recent_levels.rotate_left(1);
        self.recent_levels[2] = level;
        self.filled = (self.filled + 1).min(3);

        if self.filled < 3 {
            return;
        }

        let [oldest, middle, newest] = self.recent_levels;
        if newest == middle {
            self.delay = self.delay.mul_f64(1.0 + self.step_size);
        } else if oldest <= newest.saturating_sub(2) {
            self.delay = self.delay.div_f64(1.0 + self.step_size);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_units_at_the_same_level_increase_the_delay() {
        let mut pacing = AdaptiveDelay::new(Duration::from_secs(2), 0.1);
        pacing.record(0);
        pacing.record(1);
        pacing.record(1);
        assert!(pacing.delay() > Duration::from_secs(2));
    }

    #[test]
    fn lagging_behind_by_two_levels_decreases_the_delay() {
        let mut pacing = AdaptiveDelay::new(Duration::from_secs(2), 0.1);
        pacing.record(0);
        pacing.record(1);
        pacing.record(2);
        assert!(pacing.delay() < Duration::from_secs(2));
    }

    #[test]
    fn a_single_step_after_a_plateau_leaves_the_delay_unchanged() {
        // two units at the same level, then one unit one level higher:
        // neither "stuck" nor "lagging by two", so delay holds steady.
        let mut pacing = AdaptiveDelay::new(Duration::from_secs(2), 0.1);
        pacing.record(2);
        pacing.record(2);
        pacing.record(3);
        assert_eq!(pacing.delay(), Duration::from_secs(2));
    }

    #[test]
    fn fewer_than_three_samples_never_adjusts() {
        let mut pacing = AdaptiveDelay::new(Duration::from_secs(2), 0.1);
        pacing.record(5);
        pacing.record(9);
        assert_eq!(pacing.delay(), Duration::from_secs(2));
    }
}
