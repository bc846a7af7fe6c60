use std::collections::VecDeque;

use crate::frame::Frame;

/// Events retained by [`EventBus::new`]; older ones are dropped first.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Notable session transitions, kept for traceability and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    AffiliationsReplaced {
        received: usize,
        valid: usize,
        curve_segments: usize,
    },
    LandmassReady {
        disks: usize,
    },
    LandmassUnavailable {
        reason: String,
    },
    Resized {
        width: u32,
        height: u32,
    },
    Disposed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Index of the last frame rendered before the event, if any.
    pub frame_index: Option<u64>,
    pub kind: EventKind,
}

/// Bounded log of recent session events.
#[derive(Debug)]
pub struct EventBus {
    events: VecDeque<Event>,
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn emit(&mut self, frame: Option<Frame>, kind: EventKind) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(Event {
            frame_index: frame.map(|f| f.index),
            kind,
        });
    }

    /// Retained events, oldest first.
    pub fn events(&self) -> impl DoubleEndedIterator<Item = &Event> + ExactSizeIterator {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn drain(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{EventBus, EventKind};
    use pretty_assertions::assert_eq;
    use crate::frame::FrameClock;

    #[test]
    fn records_events_with_frame_index() {
        let mut bus = EventBus::new();
        let mut clock = FrameClock::new();
        clock.tick(0.0);
        clock.tick(0.016);
        bus.emit(clock.last(), EventKind::Disposed);
        bus.emit(None, EventKind::LandmassReady { disks: 3 });
        let frames: Vec<_> = bus.events().map(|e| e.frame_index).collect();
        assert_eq!(frames, vec![Some(1), None]);
    }

    #[test]
    fn drain_clears_events() {
        let mut bus = EventBus::new();
        bus.emit(None, EventKind::Resized { width: 4, height: 3 });
        let drained = bus.drain();
        assert_eq!(drained.len(), 1);
        assert!(bus.is_empty());
    }

    #[test]
    fn drops_oldest_beyond_capacity() {
        let mut bus = EventBus::with_capacity(3);
        for width in 1..=5 {
            bus.emit(None, EventKind::Resized { width, height: 1 });
        }
        assert_eq!(bus.len(), 3);
        let widths: Vec<_> = bus
            .events()
            .map(|e| match e.kind {
                EventKind::Resized { width, .. } => width,
                _ => 0,
            })
            .collect();
        assert_eq!(widths, vec![3, 4, 5]);
    }

    #[test]
    fn zero_capacity_keeps_latest_event() {
        let mut bus = EventBus::with_capacity(0);
        bus.emit(None, EventKind::Disposed);
        bus.emit(None, EventKind::Resized { width: 2, height: 2 });
        assert_eq!(bus.len(), 1);
        assert_eq!(
            bus.events().last().map(|e| &e.kind),
            Some(&EventKind::Resized { width: 2, height: 2 })
        );
    }
}
