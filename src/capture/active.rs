//! Open Down entries of the key presses currently in flight.
//!
//! Entries are indexed by pointer id. When the only open entry is released
//! it is kept as a tombstone: it no longer matches an Up, but the next Down
//! can still find it to compute its down-down interval.

use super::types::RawTouchEvent;
use std::collections::HashMap;

/// Down events waiting for their Up, plus the last released one.
#[derive(Debug, Default)]
pub struct ActiveEntries {
    /// Open Down events by pointer id
    open: HashMap<u32, RawTouchEvent>,
    /// Last entry released while it was the only open one
    tombstone: Option<RawTouchEvent>,
}

impl ActiveEntries {
    /// Create an empty set with no tombstone.
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent Down (open or tombstoned) strictly earlier than `event`.
    pub fn previous_down(&self, event: &RawTouchEvent) -> Option<&RawTouchEvent> {
        self.open
            .values()
            .chain(self.tombstone.iter())
            .filter(|entry| entry.timestamp < event.timestamp)
            .max_by_key(|entry| entry.timestamp)
    }

    /// Register a new Down. A second Down for the same pointer replaces the first.
    pub fn push(&mut self, event: RawTouchEvent) {
        self.open.insert(event.pointer_id, event);
    }

    /// Release the open Down of `pointer_id`, returning a copy of it.
    ///
    /// Releasing the only open entry turns it into the tombstone. Releasing
    /// one of several drops any earlier tombstone. Returns `None` for an
    /// unknown pointer.
    pub fn release(&mut self, pointer_id: u32) -> Option<RawTouchEvent> {
        if !self.open.contains_key(&pointer_id) {
            return None;
        }

        if self.open.len() == 1 {
            let entry = self.open.remove(&pointer_id)?;
            self.tombstone = Some(entry.clone());
            Some(entry)
        } else {
            self.tombstone = None;
            self.open.remove(&pointer_id)
        }
    }

    /// Number of live (not tombstoned) entries.
    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Whether a released entry is still kept for interval lookups.
    pub fn has_tombstone(&self) -> bool {
        self.tombstone.is_some()
    }

    /// Drop every entry and the tombstone, as at the start of a session.
    pub fn clear(&mut self) {
        self.open.clear();
        self.tombstone = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::types::TouchEventKind;
    use chrono::{Duration, Utc};

    fn down(pointer_id: u32, offset_ms: i64) -> RawTouchEvent {
        let base = Utc::now();
        RawTouchEvent::new(
            pointer_id,
            TouchEventKind::Down,
            base + Duration::milliseconds(offset_ms),
        )
    }

    #[test]
    fn test_tombstone_keeps_last_entry_visible() {
        let mut entries = ActiveEntries::new();
        let first = down(0, 0);
        let second = down(1, 100);
        let first_ts = first.timestamp;

        entries.push(first);
        assert!(entries.release(0).is_some());
        assert_eq!(entries.open_count(), 0);
        assert!(entries.has_tombstone());

        let previous = entries.previous_down(&second).map(|e| e.timestamp);
        assert_eq!(previous, Some(first_ts));

        // Tombstones never match an Up
        assert!(entries.release(0).is_none());
    }

    #[test]
    fn test_overlapping_presses() {
        let mut entries = ActiveEntries::new();
        let base = Utc::now();
        let a = RawTouchEvent::new(0, TouchEventKind::Down, base);
        let b = RawTouchEvent::new(1, TouchEventKind::Down, base + Duration::milliseconds(50));
        let c = RawTouchEvent::new(2, TouchEventKind::Down, base + Duration::milliseconds(90));

        entries.push(a);
        entries.push(b.clone());
        assert_eq!(
            entries.previous_down(&c).map(|e| e.pointer_id),
            Some(1)
        );

        // Releasing one of two open entries removes it outright
        assert!(entries.release(1).is_some());
        assert!(!entries.has_tombstone());
        assert_eq!(
            entries.previous_down(&c).map(|e| e.pointer_id),
            Some(0)
        );

        entries.clear();
        assert!(entries.previous_down(&b).is_none());
    }
}
