//! Playback queue
//!
//! An ordered list of canonical tracks with a cursor. Navigation wraps in
//! both directions; repeat policy for auto-advance is applied by the manager.

use crate::error::{PlaybackError, Result};
use crate::types::CanonicalTrack;

/// Ordered playback sequence with a cursor
///
/// Invariant: `cursor` is `Some(i)` with `i < tracks.len()`, or `None` when
/// the queue is empty or nothing has been selected yet.
#[derive(Debug, Clone, Default)]
pub struct Queue {
    tracks: Vec<CanonicalTrack>,
    cursor: Option<usize>,
}

impl Queue {
    /// Create new empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the queue and select `start_index`
    ///
    /// An out-of-range index selects the last track.
    pub fn set_queue(&mut self, tracks: Vec<CanonicalTrack>, start_index: usize) {
        self.cursor = if tracks.is_empty() {
            None
        } else {
            Some(start_index.min(tracks.len() - 1))
        };
        self.tracks = tracks;
    }

    /// Drop all tracks and the selection
    pub fn clear(&mut self) {
        self.tracks.clear();
        self.cursor = None;
    }

    /// Move forward one track, wrapping to the start after the last one
    pub fn advance(&mut self) -> Result<CanonicalTrack> {
        let len = self.non_empty_len()?;
        let next = match self.cursor {
            Some(i) => (i + 1) % len,
            None => 0,
        };
        self.cursor = Some(next);
        Ok(self.tracks[next].clone())
    }

    /// Move back one track, wrapping to the end before the first one
    pub fn retreat(&mut self) -> Result<CanonicalTrack> {
        let len = self.non_empty_len()?;
        let prev = match self.cursor {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.cursor = Some(prev);
        Ok(self.tracks[prev].clone())
    }

    /// Currently selected track
    pub fn current(&self) -> Option<&CanonicalTrack> {
        self.cursor.and_then(|i| self.tracks.get(i))
    }

    /// Currently selected index
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Whether the cursor sits on the last track
    pub fn is_at_end(&self) -> bool {
        match self.cursor {
            Some(i) => i + 1 == self.tracks.len(),
            None => false,
        }
    }

    /// All tracks in order
    pub fn tracks(&self) -> &[CanonicalTrack] {
        &self.tracks
    }

    /// Total number of tracks
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Check if queue is empty
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    fn non_empty_len(&self) -> Result<usize> {
        if self.tracks.is_empty() {
            Err(PlaybackError::EmptyQueue)
        } else {
            Ok(self.tracks.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MediaRef;

    fn create_test_track(id: &str) -> CanonicalTrack {
        CanonicalTrack {
            id: id.to_string(),
            title: format!("Track {id}"),
            artist_names: vec!["Artist".to_string()],
            artwork_url: None,
            media_ref: MediaRef::Uri(format!("spotify:track:{id}")),
            duration_ms: 180_000,
        }
    }

    fn queue_of(ids: &[&str], start: usize) -> Queue {
        let mut queue = Queue::new();
        queue.set_queue(ids.iter().map(|id| create_test_track(id)).collect(), start);
        queue
    }

    #[test]
    fn test_new_queue_is_empty() {
        let queue = Queue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.cursor(), None);
        assert!(queue.current().is_none());
    }

    #[test]
    fn test_set_queue_selects_start_index() {
        let queue = queue_of(&["1", "2", "3"], 1);
        assert_eq!(queue.cursor(), Some(1));
        assert_eq!(queue.current().unwrap().id, "2");
    }

    #[test]
    fn test_set_queue_clamps_start_index() {
        let queue = queue_of(&["1", "2", "3"], 10);
        assert_eq!(queue.cursor(), Some(2));
    }

    #[test]
    fn test_set_empty_queue_has_no_cursor() {
        let mut queue = queue_of(&["1"], 0);
        queue.set_queue(Vec::new(), 0);
        assert_eq!(queue.cursor(), None);
    }

    #[test]
    fn test_advance_wraps_to_start() {
        let mut queue = queue_of(&["1", "2", "3"], 2);
        assert_eq!(queue.advance().unwrap().id, "1");
        assert_eq!(queue.cursor(), Some(0));
    }

    #[test]
    fn test_retreat_wraps_to_end() {
        let mut queue = queue_of(&["1", "2", "3"], 0);
        assert_eq!(queue.retreat().unwrap().id, "3");
        assert_eq!(queue.cursor(), Some(2));
    }

    #[test]
    fn test_navigation_on_empty_queue_fails() {
        let mut queue = Queue::new();
        assert!(matches!(queue.advance(), Err(PlaybackError::EmptyQueue)));
        assert!(matches!(queue.retreat(), Err(PlaybackError::EmptyQueue)));
    }

    #[test]
    fn test_single_track_queue_wraps_onto_itself() {
        let mut queue = queue_of(&["only"], 0);
        assert_eq!(queue.advance().unwrap().id, "only");
        assert_eq!(queue.retreat().unwrap().id, "only");
        assert_eq!(queue.cursor(), Some(0));
    }

    #[test]
    fn test_is_at_end() {
        let mut queue = queue_of(&["1", "2"], 0);
        assert!(!queue.is_at_end());
        queue.advance().unwrap();
        assert!(queue.is_at_end());
    }

    #[test]
    fn test_clear() {
        let mut queue = queue_of(&["1", "2"], 1);
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.cursor(), None);
    }
}
