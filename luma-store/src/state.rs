//! Durable restart state.
//!
//! Everything Luma needs to resume after a restart without re-arming stops
//! from scratch. The regime itself is never stored; only its anchor.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use luma_domain::{Cooldown, Instrument, RatchetRecord, TradeStats};

/// Schema version written with every save
pub const STATE_VERSION: u32 = 1;

/// State saved after every tick and loaded once at start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Equity baseline for the regime controller
    #[serde(default)]
    pub anchor_equity: Option<Decimal>,
    /// Active trauma and order-action cooldowns
    #[serde(default)]
    pub cooldowns: Vec<Cooldown>,
    /// One record per managed position
    #[serde(default)]
    pub ratchet_records: Vec<RatchetRecord>,
    #[serde(default)]
    pub stats: TradeStats,
    /// When this snapshot was written
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

fn default_version() -> u32 {
    STATE_VERSION
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            anchor_equity: None,
            cooldowns: Vec::new(),
            ratchet_records: Vec::new(),
            stats: TradeStats::default(),
            saved_at: None,
        }
    }
}

impl PersistedState {
    /// Nothing worth restoring
    pub fn is_empty(&self) -> bool {
        self.anchor_equity.is_none()
            && self.cooldowns.is_empty()
            && self.ratchet_records.is_empty()
            && self.stats.total() == 0
    }

    /// Ratchet record for an instrument, if persisted
    pub fn record(&self, instrument: &Instrument) -> Option<&RatchetRecord> {
        self.ratchet_records.iter().find(|r| &r.instrument == instrument)
    }
}
