//! Bounded in-memory ring of recent audit events.
//!
//! Capacity is fixed at construction; once full, recording a new event
//! drops the oldest. Reads take a shared lock and never block emitters for
//! longer than one clone.

use std::collections::VecDeque;
use std::sync::RwLock;

use crate::audit::AuditEvent;

/// Filter applied to `tail` reads.
#[derive(Debug, Clone, Default)]
pub struct TailFilter {
    pub event_type: Option<String>,
    pub severity: Option<String>,
}

/// Fixed-capacity ring buffer over the most recent audit events.
pub struct AuditRing {
    capacity: usize,
    inner: RwLock<VecDeque<AuditEvent>>,
}

impl AuditRing {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Record one event, evicting the oldest when full.
    pub fn record(&self, event: AuditEvent) {
        let mut ring = self.inner.write().expect("audit ring lock poisoned");
        if ring.len() == self.capacity {
            ring.pop_front();
        }
        ring.push_back(event);
    }

    /// The most recent `limit` events matching the filter, newest first.
    pub fn tail(&self, limit: usize, filter: &TailFilter) -> Vec<AuditEvent> {
        let ring = self.inner.read().expect("audit ring lock poisoned");
        ring.iter()
            .rev()
            .filter(|event| {
                filter
                    .event_type
                    .as_deref()
                    .is_none_or(|t| event.event_type == t)
                    && filter
                        .severity
                        .as_deref()
                        .is_none_or(|s| event.severity.as_str() == s)
            })
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("audit ring lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use provtrack_core::types::Severity;

    fn event(event_type: &str, severity: Severity) -> AuditEvent {
        AuditEvent::new(event_type).with_severity(severity)
    }

    #[test]
    fn overflow_keeps_exactly_capacity_most_recent() {
        let ring = AuditRing::new(10);
        for i in 0..25 {
            ring.record(event(&format!("event.{i}"), Severity::Info));
        }
        assert_eq!(ring.len(), 10);
        let tail = ring.tail(100, &TailFilter::default());
        assert_eq!(tail.len(), 10);
        // Newest first: event.24 down to event.15.
        for (offset, entry) in tail.iter().enumerate() {
            assert_eq!(entry.event_type, format!("event.{}", 24 - offset));
        }
    }

    #[test]
    fn tail_respects_limit_and_filters() {
        let ring = AuditRing::new(100);
        for i in 0..10 {
            let severity = if i % 2 == 0 {
                Severity::Info
            } else {
                Severity::Error
            };
            ring.record(event("http.request", severity));
        }
        ring.record(event("scheduler.run", Severity::Info));

        assert_eq!(ring.tail(3, &TailFilter::default()).len(), 3);

        let errors = ring.tail(
            100,
            &TailFilter {
                severity: Some("error".into()),
                ..Default::default()
            },
        );
        assert_eq!(errors.len(), 5);

        let scheduler = ring.tail(
            100,
            &TailFilter {
                event_type: Some("scheduler.run".into()),
                ..Default::default()
            },
        );
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn zero_capacity_is_clamped_to_one() {
        let ring = AuditRing::new(0);
        ring.record(event("a", Severity::Info));
        ring.record(event("b", Severity::Info));
        assert_eq!(ring.len(), 1);
        assert_eq!(ring.tail(10, &TailFilter::default())[0].event_type, "b");
    }
}
