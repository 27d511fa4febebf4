use std::{cmp::Reverse, collections::BinaryHeap};

use chrono::NaiveDateTime;

/// Anything that can sit in the orchestrator's priority queue. `priority`
/// breaks ties between events at the same `time` (lower sorts first);
/// `entity_key` breaks further ties lexicographically (§5).
pub trait Event {
    fn time(&self) -> NaiveDateTime;

    fn priority(&self) -> u8 {
        0
    }

    fn entity_key(&self) -> &str {
        ""
    }

    fn sort_key(&self) -> Reverse<(NaiveDateTime, u8, String)> {
        Reverse((self.time(), self.priority(), self.entity_key().to_string()))
    }
}

#[derive(Debug, Clone)]
struct EventWrapper<E: Event>(E);

impl<E: Event> PartialEq for EventWrapper<E> {
    fn eq(&self, other: &Self) -> bool {
        self.0.sort_key() == other.0.sort_key()
    }
}

impl<E: Event> PartialOrd for EventWrapper<E> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<E: Event> Eq for EventWrapper<E> {}
impl<E: Event> Ord for EventWrapper<E> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.sort_key().cmp(&other.0.sort_key())
    }
}

#[derive(Debug, Clone)]
pub struct EventQueue<E: Event> {
    events: BinaryHeap<EventWrapper<E>>,
}

impl<E: Event> EventQueue<E> {
    pub fn new() -> EventQueue<E> {
        EventQueue {
            events: BinaryHeap::new(),
        }
    }

    pub fn push(&mut self, event: E) {
        self.events.push(EventWrapper(event));
    }

    pub fn peek(&self) -> Option<&E> {
        self.events.peek().map(|w| &w.0)
    }

    pub fn pop(&mut self) -> Option<E> {
        self.events.pop().map(|EventWrapper(e)| e)
    }

    /// Pops every event with `time <= now`, in queue order (earliest, then
    /// priority, then entity id).
    pub fn drain_due(&mut self, now: NaiveDateTime) -> Vec<E> {
        let mut due = vec![];
        while let Some(event) = self.peek() {
            if event.time() > now {
                break;
            }
            due.push(self.pop().expect("peek just confirmed an event exists"));
        }
        due
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

impl<E: Event> Default for EventQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Tagged(NaiveDateTime, u8, &'static str);

    impl Event for Tagged {
        fn time(&self) -> NaiveDateTime {
            self.0
        }
        fn priority(&self) -> u8 {
            self.1
        }
        fn entity_key(&self) -> &str {
            self.2
        }
    }

    fn t(minute: i64) -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2026, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + chrono::Duration::minutes(minute)
    }

    #[test]
    fn pops_earliest_first() {
        let mut q = EventQueue::new();
        q.push(Tagged(t(5), 0, "a"));
        q.push(Tagged(t(1), 0, "b"));
        assert_eq!(q.pop().unwrap().2, "b");
        assert_eq!(q.pop().unwrap().2, "a");
    }

    #[test]
    fn same_time_breaks_tie_by_priority_then_entity_key() {
        let mut q = EventQueue::new();
        q.push(Tagged(t(5), 2, "z"));
        q.push(Tagged(t(5), 1, "b"));
        q.push(Tagged(t(5), 1, "a"));
        assert_eq!(q.pop().unwrap().2, "a");
        assert_eq!(q.pop().unwrap().2, "b");
        assert_eq!(q.pop().unwrap().2, "z");
    }

    #[test]
    fn drain_due_only_takes_events_at_or_before_now() {
        let mut q = EventQueue::new();
        q.push(Tagged(t(1), 0, "early"));
        q.push(Tagged(t(10), 0, "late"));
        let due = q.drain_due(t(5));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].2, "early");
        assert_eq!(q.len(), 1);
    }
}
