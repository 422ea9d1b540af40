//! Keyboard-style navigation over rendered results.

use crate::config::NavigationConfig;

/// A cursor movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    Down,
    Up,
    DownSkip,
    UpSkip,
}

/// Selection over a list of results.
///
/// Nothing is selected initially. Moving one step up from the first result
/// wraps to the last, moving past the last wraps to the first, and a backward
/// skip that would go further than one step before the start stops at the
/// first result.
#[derive(Debug, Clone)]
pub struct Cursor {
    len: usize,
    selected: Option<usize>,
    forward_skip: usize,
    backward_skip: usize,
}

impl Cursor {
    pub fn new(len: usize, config: &NavigationConfig) -> Self {
        Cursor {
            len,
            selected: None,
            forward_skip: config.forward_skip,
            backward_skip: config.backward_skip,
        }
    }

    /// Currently selected index
    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Forget the selection, e.g. after the results were refreshed.
    pub fn reset(&mut self, len: usize) {
        self.len = len;
        self.selected = None;
    }

    /// Apply a movement and return the new selection.
    pub fn step(&mut self, movement: Move) -> Option<usize> {
        if self.len == 0 {
            return None;
        }

        let (start, delta): (i64, i64) = match movement {
            Move::Down => (-1, 1),
            Move::Up => (0, -1),
            Move::DownSkip => (-1, self.forward_skip as i64),
            Move::UpSkip => (0, -(self.backward_skip as i64)),
        };

        let last = self.len as i64 - 1;
        let current = self.selected.map_or(start, |sel| sel as i64);
        let next = match current + delta {
            -1 => last,
            n if n < 0 => 0,
            n if n > last => 0,
            n => n,
        };

        self.selected = Some(next as usize);
        self.selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor(len: usize) -> Cursor {
        Cursor::new(len, &NavigationConfig::default())
    }

    #[test]
    fn test_first_moves() {
        assert_eq!(cursor(5).step(Move::Down), Some(0));
        assert_eq!(cursor(5).step(Move::Up), Some(4));
        assert_eq!(cursor(20).step(Move::DownSkip), Some(9));
        assert_eq!(cursor(20).step(Move::UpSkip), Some(0));
    }

    #[test]
    fn test_wraps_by_one_step() {
        let mut c = cursor(3);
        assert_eq!(c.step(Move::Down), Some(0));
        assert_eq!(c.step(Move::Up), Some(2));
        assert_eq!(c.step(Move::Down), Some(0));
        c.step(Move::Down);
        c.step(Move::Down);
        assert_eq!(c.selected(), Some(2));
        assert_eq!(c.step(Move::Down), Some(0));
    }

    #[test]
    fn test_skips() {
        let mut c = cursor(25);
        assert_eq!(c.step(Move::DownSkip), Some(9));
        assert_eq!(c.step(Move::DownSkip), Some(19));
        // Past the end wraps to the start
        assert_eq!(c.step(Move::DownSkip), Some(0));

        c.step(Move::Down);
        c.step(Move::Down);
        // Skipping back past the start clamps
        assert_eq!(c.step(Move::UpSkip), Some(0));
    }

    #[test]
    fn test_configured_skip_sizes() {
        let config = NavigationConfig {
            forward_skip: 3,
            backward_skip: 1,
        };
        let mut c = Cursor::new(10, &config);
        assert_eq!(c.step(Move::DownSkip), Some(2));
        assert_eq!(c.step(Move::DownSkip), Some(5));
        assert_eq!(c.step(Move::UpSkip), Some(4));

        // A backward skip landing exactly one before the start wraps
        c.reset(10);
        c.step(Move::Down);
        assert_eq!(c.step(Move::UpSkip), Some(9));
    }

    #[test]
    fn test_empty_and_reset() {
        let mut c = cursor(0);
        assert_eq!(c.step(Move::Down), None);
        assert!(c.is_empty());

        c.reset(2);
        assert_eq!(c.selected(), None);
        assert_eq!(c.step(Move::Up), Some(1));
    }
}
