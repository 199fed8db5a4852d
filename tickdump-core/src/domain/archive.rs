//! The per-symbol, per-day ordered event sequence.

use chrono::NaiveDate;

use super::event::{EventKind, UnifiedEvent};

/// All events for one (symbol, day), sorted by SIP timestamp.
///
/// Ordering invariant: timestamps are non-decreasing, and events with equal
/// timestamps keep the order in which they were appended. Callers append all
/// trades before any quote, so at a shared timestamp trades come first.
/// Nothing is deduplicated.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolArchive {
    symbol: String,
    day: NaiveDate,
    events: Vec<UnifiedEvent>,
}

impl SymbolArchive {
    /// Build an archive from events in append order.
    ///
    /// `sort_by_key` is a stable sort, which is what preserves the append
    /// order among equal timestamps.
    pub fn from_appended(
        symbol: impl Into<String>,
        day: NaiveDate,
        mut events: Vec<UnifiedEvent>,
    ) -> Self {
        events.sort_by_key(UnifiedEvent::timestamp);
        Self {
            symbol: symbol.into(),
            day,
            events,
        }
    }

    /// Wrap events that are already in archive order (e.g. read back from disk).
    ///
    /// Returns `None` if the sequence violates the timestamp ordering.
    pub fn from_sorted(
        symbol: impl Into<String>,
        day: NaiveDate,
        events: Vec<UnifiedEvent>,
    ) -> Option<Self> {
        if !is_chronological(&events) {
            return None;
        }
        Some(Self {
            symbol: symbol.into(),
            day,
            events,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn day(&self) -> NaiveDate {
        self.day
    }

    pub fn events(&self) -> &[UnifiedEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn count_of(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|e| e.kind() == kind).count()
    }

    pub fn first_timestamp(&self) -> Option<i64> {
        self.events.first().map(UnifiedEvent::timestamp)
    }

    pub fn last_timestamp(&self) -> Option<i64> {
        self.events.last().map(UnifiedEvent::timestamp)
    }
}

/// True if timestamps never decrease along the sequence.
pub fn is_chronological(events: &[UnifiedEvent]) -> bool {
    events
        .windows(2)
        .all(|pair| pair[0].timestamp() <= pair[1].timestamp())
}
