//! Configuration management for the dual-venue hedger.
//!
//! Loads settings from an optional `config` file and `DVH__`-prefixed
//! environment variables (e.g. `DVH__HEDGE__SYMBOL=ETH`).

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::control::{HedgeParams, HedgeSettings, SubmitParams};
use crate::venue::Venue;

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Hedge controller defaults
    #[serde(default)]
    pub hedge: HedgeConfig,
    /// Submit scheduler defaults
    #[serde(default)]
    pub submit: SubmitConfig,
    /// Browser automation bridge
    #[serde(default)]
    pub bridge: BridgeConfig,
    /// Venue trading page URLs
    #[serde(default)]
    pub venues: VenuesConfig,
    /// Starting state of the paper backend
    #[serde(default)]
    pub paper: PaperConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HedgeConfig {
    /// Symbol to keep delta-neutral
    #[serde(default = "default_symbol")]
    pub symbol: String,
    /// Milliseconds between position checks
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Absolute net exposure that triggers a corrective order
    #[serde(default = "default_imbalance_threshold")]
    pub imbalance_threshold: Decimal,
    /// How long a corrective order blocks the next one
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    /// Pause between typing a new size and submitting
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Fractional digits of the corrective quantity
    #[serde(default = "default_quantity_precision")]
    pub quantity_precision: u32,
    /// Venue that receives corrective orders
    #[serde(default = "default_corrective_venue")]
    pub corrective_venue: Venue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitConfig {
    #[serde(default = "default_total_clicks")]
    pub total_clicks: u32,
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,
    /// Fixed jitter seed; entropy when unset
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Base URL of the automation bridge
    #[serde(default = "default_bridge_url")]
    pub base_url: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_bridge_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenuesConfig {
    /// Trading page prefix; the symbol is appended
    #[serde(default = "default_lighter_trade_url")]
    pub lighter_trade_url: String,
    #[serde(default = "default_variational_trade_url")]
    pub variational_trade_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperConfig {
    #[serde(default = "default_paper_account_value")]
    pub account_value: Decimal,
    /// Signed starting position on Lighter
    #[serde(default)]
    pub lighter_position: Decimal,
    /// Signed starting position on Variational
    #[serde(default)]
    pub variational_position: Decimal,
}

// Default value functions
fn default_symbol() -> String {
    "BTC".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_imbalance_threshold() -> Decimal {
    Decimal::new(1, 2) // 0.01
}

fn default_lock_timeout_ms() -> u64 {
    5000
}

fn default_settle_delay_ms() -> u64 {
    300
}

fn default_quantity_precision() -> u32 {
    5
}

fn default_corrective_venue() -> Venue {
    Venue::Lighter
}

fn default_total_clicks() -> u32 {
    10
}

fn default_min_interval_ms() -> u64 {
    1000
}

fn default_max_interval_ms() -> u64 {
    3000
}

fn default_bridge_url() -> String {
    "http://127.0.0.1:9333".to_string()
}

fn default_bridge_timeout() -> u64 {
    10
}

fn default_lighter_trade_url() -> String {
    "https://app.lighter.xyz/trade/".to_string()
}

fn default_variational_trade_url() -> String {
    "https://omni.variational.io/perpetual/".to_string()
}

fn default_paper_account_value() -> Decimal {
    Decimal::new(10_000, 0)
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::default().separator("__").prefix("DVH"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.hedge.symbol.trim().is_empty(), "hedge.symbol must be set");
        anyhow::ensure!(
            self.hedge.poll_interval_ms > 0,
            "hedge.poll_interval_ms must be positive"
        );
        anyhow::ensure!(
            self.hedge.imbalance_threshold > Decimal::ZERO,
            "hedge.imbalance_threshold must be positive"
        );
        anyhow::ensure!(
            self.hedge.lock_timeout_ms > 0,
            "hedge.lock_timeout_ms must be positive"
        );
        anyhow::ensure!(
            self.hedge.quantity_precision <= 10,
            "hedge.quantity_precision must be at most 10"
        );
        anyhow::ensure!(
            self.hedge.imbalance_threshold >= self.hedge_settings().smallest_threshold(),
            "hedge.imbalance_threshold must be at least half a unit of the last quantity digit"
        );

        anyhow::ensure!(self.submit.total_clicks >= 1, "submit.total_clicks must be >= 1");
        anyhow::ensure!(
            self.submit.min_interval_ms <= self.submit.max_interval_ms,
            "submit.min_interval_ms must be <= submit.max_interval_ms"
        );

        anyhow::ensure!(
            self.bridge.base_url.starts_with("http://") || self.bridge.base_url.starts_with("https://"),
            "bridge.base_url must be an http(s) URL"
        );
        anyhow::ensure!(self.bridge.timeout_secs > 0, "bridge.timeout_secs must be positive");

        Ok(())
    }

    pub fn hedge_params(&self) -> HedgeParams {
        HedgeParams {
            symbol: self.hedge.symbol.to_uppercase(),
            poll_interval: Duration::from_millis(self.hedge.poll_interval_ms),
            imbalance_threshold: self.hedge.imbalance_threshold,
            lock_timeout: Duration::from_millis(self.hedge.lock_timeout_ms),
        }
    }

    pub fn hedge_settings(&self) -> HedgeSettings {
        HedgeSettings {
            corrective_venue: self.hedge.corrective_venue,
            settle_delay: Duration::from_millis(self.hedge.settle_delay_ms),
            quantity_precision: self.hedge.quantity_precision,
        }
    }

    pub fn submit_params(&self) -> SubmitParams {
        SubmitParams {
            total_clicks: self.submit.total_clicks,
            min_interval: Duration::from_millis(self.submit.min_interval_ms),
            max_interval: Duration::from_millis(self.submit.max_interval_ms),
        }
    }
}

impl VenuesConfig {
    /// Trading page prefix for `venue`.
    pub fn trade_url(&self, venue: Venue) -> &str {
        match venue {
            Venue::Lighter => &self.lighter_trade_url,
            Venue::Variational => &self.variational_trade_url,
        }
    }

    /// Scheme-less trading URL used to recognise a venue's page.
    pub fn page_pattern(&self, venue: Venue) -> &str {
        let url = self.trade_url(venue);
        url.split_once("://").map(|(_, rest)| rest).unwrap_or(url)
    }
}

impl Default for HedgeConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            poll_interval_ms: default_poll_interval_ms(),
            imbalance_threshold: default_imbalance_threshold(),
            lock_timeout_ms: default_lock_timeout_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            quantity_precision: default_quantity_precision(),
            corrective_venue: default_corrective_venue(),
        }
    }
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            total_clicks: default_total_clicks(),
            min_interval_ms: default_min_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
            seed: None,
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_url: default_bridge_url(),
            timeout_secs: default_bridge_timeout(),
        }
    }
}

impl Default for VenuesConfig {
    fn default() -> Self {
        Self {
            lighter_trade_url: default_lighter_trade_url(),
            variational_trade_url: default_variational_trade_url(),
        }
    }
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            account_value: default_paper_account_value(),
            lighter_position: Decimal::ZERO,
            variational_position: Decimal::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_intervals_rejected() {
        let mut config = Config::default();
        config.submit.min_interval_ms = 5000;
        config.submit.max_interval_ms = 1000;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.hedge.imbalance_threshold = Decimal::ZERO;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.hedge.imbalance_threshold = dec!(0.000001);
        assert!(config.validate().is_err());
        config.hedge.quantity_precision = 6;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_conversions() {
        let mut config = Config::default();
        config.hedge.symbol = "eth".to_string();
        config.hedge.imbalance_threshold = dec!(0.05);

        let params = config.hedge_params();
        assert_eq!(params.symbol, "ETH");
        assert_eq!(params.poll_interval, Duration::from_millis(1000));
        assert_eq!(params.imbalance_threshold, dec!(0.05));
        assert!(params.validate().is_ok());

        let settings = config.hedge_settings();
        assert_eq!(settings, HedgeSettings::default());

        let submit = config.submit_params();
        assert_eq!(submit.total_clicks, 10);
        assert!(submit.validate().is_ok());
    }

    #[test]
    fn test_page_patterns() {
        let venues = VenuesConfig::default();
        assert_eq!(venues.page_pattern(Venue::Lighter), "app.lighter.xyz/trade/");
        assert_eq!(
            venues.page_pattern(Venue::Variational),
            "omni.variational.io/perpetual/"
        );
        assert_eq!(venues.trade_url(Venue::Lighter), "https://app.lighter.xyz/trade/");
    }

    #[test]
    fn test_partial_section_uses_defaults() {
        let config: Config = serde_json::from_value(serde_json::json!({
            "hedge": { "symbol": "SOL", "corrective_venue": "variational" }
        }))
        .unwrap();
        assert_eq!(config.hedge.symbol, "SOL");
        assert_eq!(config.hedge.corrective_venue, Venue::Variational);
        assert_eq!(config.hedge.lock_timeout_ms, 5000);
        assert_eq!(config.submit.max_interval_ms, 3000);
    }
}
