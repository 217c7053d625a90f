//! Daemon configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;

use luma_connectors::HYPERLIQUID_INFO_URL;
use luma_domain::{CandleInterval, Instrument, InstrumentClass, InstrumentSpec};
use luma_engine::{
    CooldownConfig, CycleConfig, LifecycleConfig, RatchetConfig, RegimeConfig, SignalConfig,
    SizingConfig,
};

use crate::error::{DaemonError, DaemonResult};

/// Instruments scanned when `LUMA_INSTRUMENTS` is unset
pub const DEFAULT_INSTRUMENTS: &str =
    "SOL:trend:2,SUI:trend:1,ETH:trend:4,DOGE:volatile:0,WIF:volatile:0";

/// Benchmark read by the cycle filter when `LUMA_CYCLE_BENCHMARK` is unset
pub const DEFAULT_CYCLE_BENCHMARK: &str = "BTC";

/// Instruments used by [`Config::test`]
const TEST_INSTRUMENTS: &str = "SOL:trend:2,WIF:volatile:0";

/// Size decimals assumed when an instrument entry omits them
const DEFAULT_SIZE_DECIMALS: u32 = 2;

// =============================================================================
// Configuration
// =============================================================================

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Environment (test, development, production)
    pub environment: Environment,

    /// Account whose state is mirrored
    pub wallet_address: String,

    /// Directory for `luma_state.json` and `dashboard_state.json`
    pub data_dir: PathBuf,

    /// Sleep between ticks
    pub tick_interval: Duration,

    /// Budget for every provider and gateway call
    pub call_timeout: Duration,

    /// Candle interval used for signals
    pub candle_interval: CandleInterval,

    /// Scanned instruments
    pub instruments: Vec<InstrumentSpec>,

    /// Explicit anchor equity (persisted anchor wins)
    pub anchor_equity: Option<Decimal>,

    /// Hyperliquid info endpoint
    pub info_url: String,

    /// Rolling event log length
    pub event_log_capacity: usize,

    pub regime: RegimeConfig,
    pub sizing: SizingConfig,
    pub signals: SignalConfig,
    pub ratchet: RatchetConfig,
    pub lifecycle: LifecycleConfig,
    pub cooldown: CooldownConfig,
    pub cycle: CycleConfig,
}

/// Environment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Test environment (uses stubs)
    Test,
    /// Development environment
    Development,
    /// Production environment
    Production,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> DaemonResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> DaemonResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);
        let mut config = Self::default();

        config.environment = vars.parse("LUMA_ENV", Environment::Development)?;
        config.wallet_address = vars.get("LUMA_WALLET_ADDRESS").unwrap_or_default();
        if let Some(dir) = vars.get("LUMA_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        config.tick_interval = Duration::from_secs(vars.parse("LUMA_TICK_INTERVAL_SECS", 20u64)?);
        config.call_timeout = Duration::from_secs(vars.parse("LUMA_CALL_TIMEOUT_SECS", 10u64)?);
        config.candle_interval = vars.parse("LUMA_CANDLE_INTERVAL", CandleInterval::FifteenMinutes)?;
        let list = vars.get("LUMA_INSTRUMENTS");
        config.instruments = parse_instruments(list.as_deref().unwrap_or(DEFAULT_INSTRUMENTS))?;
        config.anchor_equity = vars.parse_optional::<Decimal>("LUMA_ANCHOR_EQUITY")?;
        if let Some(url) = vars.get("LUMA_INFO_URL") {
            config.info_url = url;
        }
        config.event_log_capacity = vars.parse("LUMA_EVENT_LOG_CAPACITY", config.event_log_capacity)?;

        let sizing = &mut config.sizing;
        sizing.base_fraction = vars.parse("LUMA_BASE_FRACTION", sizing.base_fraction)?;
        sizing.cap_fraction = vars.parse("LUMA_CAP_FRACTION", sizing.cap_fraction)?;
        sizing.recovery_multiplier = vars.parse("LUMA_RECOVERY_MULTIPLIER", sizing.recovery_multiplier)?;
        sizing.min_margin = vars.parse("LUMA_MIN_MARGIN", sizing.min_margin)?;

        let regime = &mut config.regime;
        regime.god_mode_roe = vars.parse("LUMA_GOD_MODE_ROE", regime.god_mode_roe)?;
        regime.titan_roe = vars.parse("LUMA_TITAN_ROE", regime.titan_roe)?;
        regime.shield_roe = vars.parse("LUMA_SHIELD_ROE", regime.shield_roe)?;

        config.lifecycle.tolerance_pct =
            vars.parse("LUMA_ORDER_TOLERANCE_PCT", config.lifecycle.tolerance_pct)?;
        config.cooldown.trauma_secs = vars.parse("LUMA_TRAUMA_COOLDOWN_SECS", config.cooldown.trauma_secs)?;
        config.cooldown.action_secs = vars.parse("LUMA_ACTION_COOLDOWN_SECS", config.cooldown.action_secs)?;
        config.ratchet.emergency_stop_roe =
            vars.parse("LUMA_EMERGENCY_STOP_ROE", config.ratchet.emergency_stop_roe)?;
        config.cycle.enabled = vars.parse_bool("LUMA_CYCLE_FILTER", config.cycle.enabled)?;
        let benchmark = vars
            .get("LUMA_CYCLE_BENCHMARK")
            .unwrap_or_else(|| DEFAULT_CYCLE_BENCHMARK.to_string());
        config.cycle.benchmark = Some(
            Instrument::new(benchmark)
                .map_err(|e| DaemonError::Config(format!("Invalid LUMA_CYCLE_BENCHMARK value: {}", e)))?,
        );

        config.validate()?;
        Ok(config)
    }

    /// Create test configuration.
    pub fn test() -> Self {
        Self {
            environment: Environment::Test,
            wallet_address: "0xtest".to_string(),
            data_dir: env::temp_dir().join("luma-test"),
            tick_interval: Duration::from_millis(10),
            call_timeout: Duration::from_secs(1),
            instruments: parse_instruments(TEST_INSTRUMENTS).unwrap_or_default(),
            ..Self::default()
        }
    }

    /// Spec for a configured instrument
    pub fn spec(&self, instrument: &Instrument) -> Option<&InstrumentSpec> {
        self.instruments.iter().find(|s| &s.instrument == instrument)
    }

    /// Reject settings the engine would refuse, with the variable name in the message.
    pub fn validate(&self) -> DaemonResult<()> {
        if self.tick_interval.is_zero() {
            return Err(DaemonError::Config("LUMA_TICK_INTERVAL_SECS must be positive".to_string()));
        }
        if self.call_timeout.is_zero() {
            return Err(DaemonError::Config("LUMA_CALL_TIMEOUT_SECS must be positive".to_string()));
        }
        if self.instruments.is_empty() {
            return Err(DaemonError::Config("LUMA_INSTRUMENTS must name at least one instrument".to_string()));
        }
        if self.event_log_capacity == 0 {
            return Err(DaemonError::Config("LUMA_EVENT_LOG_CAPACITY must be positive".to_string()));
        }
        if self.anchor_equity.is_some_and(|a| a <= Decimal::ZERO) {
            return Err(DaemonError::Config("LUMA_ANCHOR_EQUITY must be positive".to_string()));
        }
        self.regime
            .validate()
            .and_then(|_| self.sizing.validate())
            .and_then(|_| self.signals.validate())
            .and_then(|_| self.ratchet.validate())
            .and_then(|_| self.cooldown.validate())
            .and_then(|_| self.cycle.validate())
            .map_err(|e| DaemonError::Config(e.to_string()))?;
        if self.lifecycle.tolerance_pct <= Decimal::ZERO {
            return Err(DaemonError::Config("LUMA_ORDER_TOLERANCE_PCT must be positive".to_string()));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            wallet_address: String::new(),
            data_dir: PathBuf::from("./data"),
            tick_interval: Duration::from_secs(20),
            call_timeout: Duration::from_secs(10),
            candle_interval: CandleInterval::FifteenMinutes,
            // The default list is a constant and always parses
            instruments: parse_instruments(DEFAULT_INSTRUMENTS).unwrap_or_default(),
            anchor_equity: None,
            info_url: HYPERLIQUID_INFO_URL.to_string(),
            event_log_capacity: 50,
            regime: RegimeConfig::default(),
            sizing: SizingConfig::default(),
            signals: SignalConfig::default(),
            ratchet: RatchetConfig::default(),
            lifecycle: LifecycleConfig::default(),
            cooldown: CooldownConfig::default(),
            cycle: CycleConfig::default(),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Test => write!(f, "test"),
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "test" => Ok(Environment::Test),
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("{}. Expected: test, development, production", other)),
        }
    }
}

// =============================================================================
// Parsing helpers
// =============================================================================

/// Parse `COIN:class[:szDecimals[:riskMult]]` entries separated by commas.
///
/// # Examples
///
/// ```
/// use lumad::config::parse_instruments;
///
/// let specs = parse_instruments("SOL:trend:2, WIF:volatile:0:0.5").unwrap();
/// assert_eq!(specs.len(), 2);
/// assert_eq!(specs[1].size_decimals, 0);
/// ```
pub fn parse_instruments(list: &str) -> DaemonResult<Vec<InstrumentSpec>> {
    let mut specs: Vec<InstrumentSpec> = Vec::new();
    for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let parts: Vec<&str> = entry.split(':').map(str::trim).collect();
        let bad = |why: &str| DaemonError::Config(format!("Invalid LUMA_INSTRUMENTS entry '{}': {}", entry, why));

        if parts.len() < 2 || parts.len() > 4 {
            return Err(bad("expected COIN:class[:szDecimals[:riskMult]]"));
        }
        let instrument = Instrument::new(parts[0]).map_err(|e| bad(&e.to_string()))?;
        let class = InstrumentClass::from_str(parts[1]).map_err(|e| bad(&e.to_string()))?;
        let size_decimals = match parts.get(2) {
            Some(raw) => raw.parse::<u32>().map_err(|_| bad("szDecimals must be an integer"))?,
            None => DEFAULT_SIZE_DECIMALS,
        };
        let risk = match parts.get(3) {
            Some(raw) => Decimal::from_str(raw).map_err(|_| bad("riskMult must be a decimal"))?,
            None => Decimal::ONE,
        };
        if risk <= Decimal::ZERO {
            return Err(bad("riskMult must be positive"));
        }
        if specs.iter().any(|s| s.instrument == instrument) {
            return Err(bad("duplicate instrument"));
        }

        specs.push(InstrumentSpec::new(instrument, class, size_decimals).with_risk_multiplier(risk));
    }
    Ok(specs)
}

/// Variable lookup with typed parsing.
struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn parse<T>(&self, key: &str, default: T) -> DaemonResult<T>
    where
        T: FromStr,
    {
        Ok(self.parse_optional(key)?.unwrap_or(default))
    }

    fn parse_optional<T>(&self, key: &str) -> DaemonResult<Option<T>>
    where
        T: FromStr,
    {
        match self.get(key) {
            Some(val) => val
                .parse::<T>()
                .map(Some)
                .map_err(|_| DaemonError::Config(format!("Invalid {} value: {}", key, val))),
            None => Ok(None),
        }
    }

    fn parse_bool(&self, key: &str, default: bool) -> DaemonResult<bool> {
        match self.get(key).map(|v| v.to_lowercase()) {
            None => Ok(default),
            Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
            Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
            Some(v) => Err(DaemonError::Config(format!("Invalid {} value: {}", key, v))),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
