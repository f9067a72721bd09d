//! Time-based event deduplication keyed on (event type, severity)

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::debug;

use crate::types::{Event, EventType, Severity};

#[derive(Debug, Clone)]
pub struct CooldownFilter {
    interval: Duration,
    last_emitted: HashMap<(EventType, Severity), DateTime<Utc>>,
}

impl CooldownFilter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emitted: HashMap::new(),
        }
    }

    /// Saturates at `Duration::MAX` for intervals chrono cannot represent.
    pub fn from_secs(secs: u64) -> Self {
        let interval = i64::try_from(secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        Self::new(interval)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Drop events whose key fired less than `interval` before `now`.
    ///
    /// Surviving events refresh their key's timestamp. Input order is kept.
    pub fn filter(&mut self, events: Vec<Event>, now: DateTime<Utc>) -> Vec<Event> {
        let mut passed = Vec::with_capacity(events.len());
        for event in events {
            let key = event.cooldown_key();
            if let Some(&last) = self.last_emitted.get(&key) {
                let elapsed = now - last;
                if elapsed < self.interval {
                    debug!(
                        event_type = %key.0,
                        severity = %key.1,
                        elapsed_secs = elapsed.num_seconds(),
                        "Event suppressed - cooldown active"
                    );
                    continue;
                }
            }
            self.last_emitted.insert(key, now);
            passed.push(event);
        }
        passed
    }

    pub fn last_emission(&self, event_type: EventType, severity: Severity) -> Option<DateTime<Utc>> {
        self.last_emitted.get(&(event_type, severity)).copied()
    }

    /// Number of keys that have emitted at least once.
    pub fn len(&self) -> usize {
        self.last_emitted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_emitted.is_empty()
    }
}
