//! Input sources feeding the capture state machine.

use super::session::CaptureError;
use super::types::{Acquisition, RawTouchEvent};
use std::collections::VecDeque;

/// Stream of touch events in ascending timestamp order.
pub trait InputSource {
    /// Next event, or `None` once the source is drained.
    fn next_event(&mut self) -> Option<RawTouchEvent>;

    /// Whether the field being typed into still holds text.
    fn has_pending_text(&self) -> bool;
}

/// Replays recorded acquisitions as if they were typed live.
#[derive(Debug, Default)]
pub struct ReplayInput {
    events: VecDeque<RawTouchEvent>,
    pending_text: bool,
}

impl ReplayInput {
    pub fn new(acquisition: &Acquisition) -> Result<Self, CaptureError> {
        Ok(Self::from_events(acquisition.replay_events()?))
    }

    pub fn from_events(events: Vec<RawTouchEvent>) -> Self {
        let pending_text = !events.is_empty();
        Self {
            events: events.into(),
            pending_text,
        }
    }

    /// Simulate the user clearing (or filling) the edited field.
    pub fn set_pending_text(&mut self, pending: bool) {
        self.pending_text = pending;
    }

    pub fn remaining(&self) -> usize {
        self.events.len()
    }
}

impl InputSource for ReplayInput {
    fn next_event(&mut self) -> Option<RawTouchEvent> {
        self.events.pop_front()
    }

    fn has_pending_text(&self) -> bool {
        self.pending_text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::types::Keystroke;
    use chrono::Utc;

    #[test]
    fn test_replay_drains_in_order() {
        let mut acquisition = Acquisition::new(1, 0, Utc::now());
        acquisition.keystrokes.push(Keystroke::default());
        acquisition.keystrokes.push(Keystroke {
            down_down_interval: 120.0,
            up_down_interval: 60.0,
            ..Default::default()
        });

        let mut input = ReplayInput::new(&acquisition).unwrap();
        assert!(input.has_pending_text());
        assert_eq!(input.remaining(), 4);

        let mut last = None;
        while let Some(event) = input.next_event() {
            if let Some(previous) = last {
                assert!(event.timestamp >= previous);
            }
            last = Some(event.timestamp);
        }
        assert_eq!(input.remaining(), 0);
    }
}
