//! Per-tick state snapshot for the presentation layer.
//!
//! The controller builds one `TickSnapshot` at the end of every tick and
//! hands it to a write-only `SnapshotSink`. The shipped sink writes
//! `dashboard_state.json` atomically next to the state file.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use luma_domain::{Cooldown, Instrument, RegimeMode, Side, TradeStats};
use luma_engine::TradingSession;

use crate::error::{DaemonError, DaemonResult};
use crate::event_log::EventRecord;

/// File written by [`JsonFileSink`]
pub const SNAPSHOT_FILE_NAME: &str = "dashboard_state.json";

// =============================================================================
// Snapshot Types
// =============================================================================

/// Everything the dashboard shows after one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickSnapshot {
    pub timestamp: DateTime<Utc>,
    /// `None` until the first equity reading
    pub mode: Option<RegimeMode>,
    pub shield: bool,
    pub titan: bool,
    pub session: TradingSession,
    pub equity: Decimal,
    pub anchor: Option<Decimal>,
    pub account_roe: Decimal,
    pub total_unrealized_pnl: Decimal,
    pub positions: Vec<PositionView>,
    pub stats: TradeStats,
    /// Percent of counted closes that were wins, `None` before the first
    pub win_rate: Option<Decimal>,
    pub cooldowns: Vec<Cooldown>,
    pub events: Vec<EventRecord>,
}

/// One open position as tracked by the ratchet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionView {
    pub instrument: Instrument,
    pub side: Side,
    pub size: Decimal,
    pub pnl: Decimal,
    pub roe: Decimal,
    pub secured: bool,
    /// Stop threshold in ROE percent, when a record exists
    pub stop: Option<Decimal>,
    pub high_water: Option<Decimal>,
}

impl TickSnapshot {
    /// View of one instrument, if open
    pub fn position(&self, instrument: &Instrument) -> Option<&PositionView> {
        self.positions.iter().find(|p| &p.instrument == instrument)
    }
}

// =============================================================================
// Sinks
// =============================================================================

/// Write-only destination for tick snapshots.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    /// Publish one snapshot.
    ///
    /// # Errors
    ///
    /// Returns `DaemonError::Snapshot` if the snapshot cannot be written.
    async fn publish(&self, snapshot: &TickSnapshot) -> DaemonResult<()>;
}

/// Writes the snapshot as pretty JSON, replacing the file atomically.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
    temp: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let temp = path.with_extension("json.tmp");
        Self { path, temp }
    }

    /// Sink writing `dashboard_state.json` inside `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(SNAPSHOT_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SnapshotSink for JsonFileSink {
    async fn publish(&self, snapshot: &TickSnapshot) -> DaemonResult<()> {
        let bytes = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| DaemonError::Snapshot(e.to_string()))?;
        luma_store::write_atomic(&self.path, &self.temp, &bytes)
            .await
            .map_err(|e| DaemonError::Snapshot(format!("{}: {}", self.path.display(), e)))?;
        debug!(path = %self.path.display(), "Snapshot published");
        Ok(())
    }
}

/// Keeps every published snapshot in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    published: Mutex<Vec<TickSnapshot>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent snapshot
    pub fn last(&self) -> Option<TickSnapshot> {
        self.published.lock().unwrap_or_else(PoisonError::into_inner).last().cloned()
    }

    pub fn count(&self) -> usize {
        self.published.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl SnapshotSink for MemorySink {
    async fn publish(&self, snapshot: &TickSnapshot) -> DaemonResult<()> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn snapshot() -> TickSnapshot {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 14, 0, 0).unwrap();
        TickSnapshot {
            timestamp: now,
            mode: Some(RegimeMode::Standard),
            shield: false,
            titan: false,
            session: TradingSession::at(now),
            equity: dec!(1020),
            anchor: Some(dec!(1000)),
            account_roe: dec!(2),
            total_unrealized_pnl: dec!(12.5),
            positions: vec![PositionView {
                instrument: Instrument::new("SOL").unwrap(),
                side: Side::Long,
                size: dec!(3.86),
                pnl: dec!(12.5),
                roe: dec!(11.36),
                secured: true,
                stop: Some(dec!(6.36)),
                high_water: Some(dec!(11.36)),
            }],
            stats: TradeStats { wins: 3, losses: 1 },
            win_rate: Some(dec!(75)),
            cooldowns: Vec::new(),
            events: Vec::new(),
        }
    }

    #[test]
    fn test_snapshot_json_shape() {
        let json = serde_json::to_value(snapshot()).unwrap();

        assert_eq!(json["mode"], "STANDARD");
        assert_eq!(json["session"], "NEW_YORK");
        assert_eq!(json["accountRoe"], "2");
        assert_eq!(json["positions"][0]["highWater"], "11.36");
        assert_eq!(json["stats"]["wins"], 3);
        assert_eq!(json["winRate"], "75");
    }

    #[tokio::test]
    async fn test_memory_sink_keeps_history() {
        let sink = MemorySink::new();
        sink.publish(&snapshot()).await.unwrap();
        sink.publish(&snapshot()).await.unwrap();

        assert_eq!(sink.count(), 2);
        assert_eq!(sink.last().unwrap().equity, dec!(1020));
    }

    #[tokio::test]
    async fn test_json_sink_writes_file() {
        let dir = std::env::temp_dir().join(format!("luma-sink-{}", std::process::id()));
        let sink = JsonFileSink::in_dir(&dir);

        sink.publish(&snapshot()).await.unwrap();

        let bytes = tokio::fs::read(sink.path()).await.unwrap();
        let parsed: TickSnapshot = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed, snapshot());
        assert!(!dir.join("dashboard_state.json.tmp").exists());

        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
