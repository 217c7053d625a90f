//! Bounded rolling event log.
//!
//! Every noteworthy controller decision lands here as a typed record and is
//! shipped with each tick snapshot. The log only keeps the newest
//! `capacity` records.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use luma_domain::Instrument;

// =============================================================================
// Event Types
// =============================================================================

/// Kind of a logged event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// Regime mode changed
    Regime,
    /// Entry order placed
    Entry,
    /// Stale orders cancelled
    Cancel,
    /// Gateway rejected an entry or cancel
    Reject,
    /// Ratchet record opened for a new position
    RatchetOpened,
    /// Position reached breakeven protection
    Secured,
    /// Trailing stop tightened
    StopRaised,
    /// Record dropped for a position that left the book
    Pruned,
    /// Position closed by the ratchet
    Close,
    /// Close order rejected; the record is kept
    CloseRejected,
    /// Account state unavailable
    Outage,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EventKind::Regime => "REGIME",
            EventKind::Entry => "ENTRY",
            EventKind::Cancel => "CANCEL",
            EventKind::Reject => "REJECT",
            EventKind::RatchetOpened => "RATCHET_OPENED",
            EventKind::Secured => "SECURED",
            EventKind::StopRaised => "STOP_RAISED",
            EventKind::Pruned => "PRUNED",
            EventKind::Close => "CLOSE",
            EventKind::CloseRejected => "CLOSE_REJECTED",
            EventKind::Outage => "OUTAGE",
        };
        f.write_str(label)
    }
}

/// One entry of the rolling log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub at: DateTime<Utc>,
    pub kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instrument: Option<Instrument>,
    pub message: String,
}

impl fmt::Display for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let instrument = self.instrument.as_ref().map(Instrument::as_str).unwrap_or("-");
        write!(
            f,
            "[{}] {} | {} | {}",
            self.at.format("%H:%M:%S"),
            self.kind,
            instrument,
            self.message
        )
    }
}

// =============================================================================
// Event Log
// =============================================================================

/// Fixed-capacity FIFO of event records.
#[derive(Debug, Clone)]
pub struct EventLog {
    capacity: usize,
    records: VecDeque<EventRecord>,
}

impl EventLog {
    /// Create a log holding at most `capacity` records (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a record, evicting the oldest when full.
    pub fn push(
        &mut self,
        at: DateTime<Utc>,
        kind: EventKind,
        instrument: Option<&Instrument>,
        message: impl Into<String>,
    ) {
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(EventRecord {
            at,
            kind,
            instrument: instrument.cloned(),
            message: message.into(),
        });
    }

    /// Records, oldest first
    pub fn records(&self) -> impl Iterator<Item = &EventRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Newest record of a kind
    pub fn last_of(&self, kind: EventKind) -> Option<&EventRecord> {
        self.records.iter().rev().find(|r| r.kind == kind)
    }

    /// Copy of the current contents for a snapshot
    pub fn to_vec(&self) -> Vec<EventRecord> {
        self.records.iter().cloned().collect()
    }
}
