//! Per-instrument cooldowns.
//!
//! Two kinds: a trauma cooldown after a losing close and a short action
//! cooldown after any place/cancel. Either blocks entries and cancels.

use chrono::{DateTime, Duration, Utc};
use luma_domain::{Cooldown, CooldownReason, Instrument};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::error::{EngineError, EngineResult};

/// Cooldown lengths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownConfig {
    pub trauma_secs: i64,
    pub action_secs: i64,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            trauma_secs: 15 * 60,
            action_secs: 60,
        }
    }
}

impl CooldownConfig {
    /// Durations must not be negative
    pub fn validate(&self) -> EngineResult<()> {
        if self.trauma_secs < 0 || self.action_secs < 0 {
            return Err(EngineError::invalid("cooldown durations must be non-negative"));
        }
        Ok(())
    }

    fn duration(&self, reason: CooldownReason) -> Duration {
        match reason {
            CooldownReason::Trauma => Duration::seconds(self.trauma_secs),
            CooldownReason::OrderAction => Duration::seconds(self.action_secs),
        }
    }
}

/// Active cooldowns keyed by instrument and reason.
#[derive(Debug, Clone)]
pub struct CooldownBook {
    config: CooldownConfig,
    entries: HashMap<(Instrument, CooldownReason), DateTime<Utc>>,
}

impl CooldownBook {
    pub fn new(config: CooldownConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            entries: HashMap::new(),
        })
    }

    /// Start (or extend) a cooldown. An earlier expiry never shortens a
    /// running one.
    pub fn start(&mut self, instrument: &Instrument, reason: CooldownReason, now: DateTime<Utc>) {
        let until = now + self.config.duration(reason);
        let slot = self
            .entries
            .entry((instrument.clone(), reason))
            .or_insert(until);
        if until > *slot {
            *slot = until;
        }
        debug!(%instrument, %reason, %until, "Cooldown started");
    }

    /// First active cooldown on an instrument, trauma first.
    pub fn blocking(&self, instrument: &Instrument, now: DateTime<Utc>) -> Option<Cooldown> {
        [CooldownReason::Trauma, CooldownReason::OrderAction]
            .into_iter()
            .find_map(|reason| {
                self.entries
                    .get(&(instrument.clone(), reason))
                    .filter(|until| now < **until)
                    .map(|until| Cooldown {
                        instrument: instrument.clone(),
                        reason,
                        until: *until,
                    })
            })
    }

    /// Is the instrument blocked at `now`
    pub fn is_blocked(&self, instrument: &Instrument, now: DateTime<Utc>) -> bool {
        self.blocking(instrument, now).is_some()
    }

    /// Drop expired entries.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        self.entries.retain(|_, until| now < *until);
    }

    /// Active cooldowns for persistence, sorted by instrument.
    pub fn snapshot(&self, now: DateTime<Utc>) -> Vec<Cooldown> {
        let mut list: Vec<Cooldown> = self
            .entries
            .iter()
            .filter(|(_, until)| now < **until)
            .map(|((instrument, reason), until)| Cooldown {
                instrument: instrument.clone(),
                reason: *reason,
                until: *until,
            })
            .collect();
        list.sort_by(|a, b| a.instrument.cmp(&b.instrument).then(a.until.cmp(&b.until)));
        list
    }

    /// Restore persisted cooldowns, skipping expired ones.
    pub fn restore(&mut self, cooldowns: Vec<Cooldown>, now: DateTime<Utc>) {
        for cooldown in cooldowns.into_iter().filter(|c| c.is_active(now)) {
            self.entries
                .insert((cooldown.instrument, cooldown.reason), cooldown.until);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 5, 12, 0, 0).unwrap()
    }

    fn sol() -> Instrument {
        Instrument::new("SOL").unwrap()
    }

    #[test]
    fn test_action_cooldown_expires() {
        let mut book = CooldownBook::new(CooldownConfig::default()).unwrap();
        book.start(&sol(), CooldownReason::OrderAction, t0());

        assert!(book.is_blocked(&sol(), t0() + Duration::seconds(59)));
        assert!(!book.is_blocked(&sol(), t0() + Duration::seconds(60)));
    }

    #[test]
    fn test_trauma_reported_first() {
        let mut book = CooldownBook::new(CooldownConfig::default()).unwrap();
        book.start(&sol(), CooldownReason::OrderAction, t0());
        book.start(&sol(), CooldownReason::Trauma, t0());

        let blocking = book.blocking(&sol(), t0()).unwrap();
        assert_eq!(blocking.reason, CooldownReason::Trauma);
        assert_eq!(blocking.until, t0() + Duration::minutes(15));
    }

    #[test]
    fn test_restart_never_shortens() {
        let mut book = CooldownBook::new(CooldownConfig::default()).unwrap();
        book.start(&sol(), CooldownReason::Trauma, t0());
        book.start(&sol(), CooldownReason::Trauma, t0() - Duration::minutes(10));
        assert_eq!(book.blocking(&sol(), t0()).unwrap().until, t0() + Duration::minutes(15));
    }

    #[test]
    fn test_snapshot_and_restore() {
        let mut book = CooldownBook::new(CooldownConfig::default()).unwrap();
        book.start(&sol(), CooldownReason::Trauma, t0());
        book.start(&Instrument::new("WIF").unwrap(), CooldownReason::OrderAction, t0());

        let later = t0() + Duration::minutes(5);
        let snapshot = book.snapshot(later);
        assert_eq!(snapshot.len(), 1);

        let mut restored = CooldownBook::new(CooldownConfig::default()).unwrap();
        restored.restore(snapshot, later);
        assert!(restored.is_blocked(&sol(), later));
        assert!(!restored.is_blocked(&Instrument::new("WIF").unwrap(), later));
    }

    #[test]
    fn test_prune() {
        let mut book = CooldownBook::new(CooldownConfig::default()).unwrap();
        book.start(&sol(), CooldownReason::OrderAction, t0());
        book.prune(t0() + Duration::minutes(2));
        assert!(book.snapshot(t0()).is_empty());
    }
}
