//! Playback queue snapshot.
//!
//! A [`PlaybackQueue`] is an ordered copy of the list playback was started
//! from plus a cursor. Starting playback from another list builds a new
//! queue; the cursor only moves one step at a time and stops at either end.

use crate::catalog::CatalogItem;
use crate::error::{PlaybackError, Result};

/// Default number of items shown by an "up next" view.
pub const DEFAULT_UPCOMING_COUNT: usize = 5;

/// Ordered items with a cursor that stays inside the list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackQueue {
    items: Vec<CatalogItem>,
    current: usize,
}

impl PlaybackQueue {
    /// Build a queue positioned at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`PlaybackError::InvalidIndex`] when `index` is outside `items`.
    pub fn new(items: Vec<CatalogItem>, index: usize) -> Result<Self> {
        if index >= items.len() {
            return Err(PlaybackError::InvalidIndex {
                index,
                len: items.len(),
            }
            .into());
        }
        Ok(Self {
            items,
            current: index,
        })
    }

    /// All items in order.
    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the queue holds nothing.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Cursor position. Meaningless for an empty queue.
    pub const fn current_index(&self) -> usize {
        self.current
    }

    /// Item under the cursor.
    pub fn current(&self) -> Option<&CatalogItem> {
        self.items.get(self.current)
    }

    /// Whether there is an item after the cursor.
    pub fn has_next(&self) -> bool {
        self.current + 1 < self.items.len()
    }

    /// Whether there is an item before the cursor.
    pub fn has_previous(&self) -> bool {
        self.current > 0 && !self.items.is_empty()
    }

    /// Index after the cursor, if any.
    pub fn next_index(&self) -> Option<usize> {
        self.has_next().then_some(self.current + 1)
    }

    /// Index before the cursor, if any.
    pub fn previous_index(&self) -> Option<usize> {
        self.has_previous().then(|| self.current - 1)
    }

    /// Move the cursor forward. Returns `false` at the last item.
    pub fn advance(&mut self) -> bool {
        match self.next_index() {
            Some(index) => {
                self.current = index;
                true
            }
            None => false,
        }
    }

    /// Move the cursor back. Returns `false` at the first item.
    pub fn retreat(&mut self) -> bool {
        match self.previous_index() {
            Some(index) => {
                self.current = index;
                true
            }
            None => false,
        }
    }

    /// Up to `count` items after the cursor, in order.
    pub fn upcoming(&self, count: usize) -> impl Iterator<Item = &CatalogItem> + '_ {
        let start = (self.current + 1).min(self.items.len());
        self.items[start..].iter().take(count)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn tracks(names: &[&str]) -> Vec<CatalogItem> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| CatalogItem::file(i.to_string(), *n, Some("audio/mpeg")))
            .collect()
    }

    #[test]
    fn test_new_rejects_out_of_range() {
        let err = PlaybackQueue::new(tracks(&["a"]), 1).unwrap_err();
        assert!(matches!(
            err,
            Error::Playback(PlaybackError::InvalidIndex { index: 1, len: 1 })
        ));
        assert!(PlaybackQueue::new(Vec::new(), 0).is_err());
    }

    #[test]
    fn test_advance_then_retreat_restores_cursor() {
        let mut queue = PlaybackQueue::new(tracks(&["a", "b", "c"]), 1).unwrap();
        assert!(queue.advance());
        assert!(queue.retreat());
        assert_eq!(queue.current_index(), 1);
    }

    #[test]
    fn test_boundaries_clamp() {
        let mut queue = PlaybackQueue::new(tracks(&["a", "b"]), 0).unwrap();
        assert!(!queue.has_previous());
        assert!(!queue.retreat());
        assert_eq!(queue.current_index(), 0);

        assert!(queue.advance());
        assert!(!queue.has_next());
        assert!(!queue.advance());
        assert_eq!(queue.current_index(), 1);
    }

    #[test]
    fn test_upcoming_is_bounded() {
        let queue = PlaybackQueue::new(tracks(&["a", "b", "c", "d"]), 1).unwrap();
        let names: Vec<_> = queue.upcoming(5).map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["c", "d"]);
        assert_eq!(queue.upcoming(1).count(), 1);
        assert_eq!(queue.upcoming(0).count(), 0);
    }

    #[test]
    fn test_upcoming_empty_at_last_index() {
        let queue = PlaybackQueue::new(tracks(&["a", "b"]), 1).unwrap();
        assert_eq!(queue.upcoming(DEFAULT_UPCOMING_COUNT).count(), 0);
        assert_eq!(PlaybackQueue::default().upcoming(3).count(), 0);
    }
}
