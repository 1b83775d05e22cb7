//! Engine configuration.
//!
//! Supports YAML file and environment variable overrides.

use std::path::Path;

use chrono::Duration;
use serde::Deserialize;

/// Engine configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Join-throttle configuration.
    pub cooldown: CooldownConfig,
    /// Commission split configuration.
    pub splits: SplitConfig,
    /// Coupon expiry configuration.
    pub coupons: CouponConfig,
    /// Tier promotion configuration.
    pub tiers: TierConfig,
    /// Payout validation configuration.
    pub payouts: PayoutConfig,
}

/// Platform-wide anti-abuse join throttle.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CooldownConfig {
    /// Rolling window length in hours.
    pub window_hours: u32,
    /// Maximum joins allowed inside the window.
    pub max_joins: u32,
    /// Optional per-business re-engagement cooldown in days. When set,
    /// a second join at the same business inside the window is blocked.
    pub business_reengagement_days: Option<u32>,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            window_hours: 24,
            max_joins: 3,
            business_reengagement_days: None,
        }
    }
}

impl CooldownConfig {
    pub fn window(&self) -> Duration {
        Duration::hours(self.window_hours as i64)
    }
}

/// Commission split resolution.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Platform default percentage when neither business nor campaign
    /// configures one.
    pub platform_default_pct: u8,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            platform_default_pct: 20,
        }
    }
}

/// Coupon expiry rules.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CouponConfig {
    /// Affiliate coupons expire at campaign end or this many days from
    /// issuance, whichever is sooner.
    pub affiliate_validity_days: i64,
    /// Content-meal coupons always expire this many days from issuance.
    pub content_meal_validity_days: i64,
}

impl Default for CouponConfig {
    fn default() -> Self {
        Self {
            affiliate_validity_days: 30,
            content_meal_validity_days: 7,
        }
    }
}

/// Tier promotion rules.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TierConfig {
    /// Fraction of the next band's threshold a qualifying account must
    /// reach to be promoted one band (e.g. 0.8).
    pub promotion_proximity: f64,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            promotion_proximity: 0.8,
        }
    }
}

/// Payout validation rules.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PayoutConfig {
    /// Minimum request amount in minor units.
    pub minimum_amount: i64,
}

impl Default for PayoutConfig {
    fn default() -> Self {
        Self {
            minimum_amount: 2000,
        }
    }
}

impl EngineConfig {
    /// Load configuration from file and environment.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. Config file (`ENGINE_CONFIG`, default `engine.yaml`)
    /// 3. Defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("ENGINE_CONFIG").unwrap_or_else(|_| "engine.yaml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            Self::from_file(&config_path)?
        } else {
            Self::default()
        };

        config.apply_env_overrides();

        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string(), e.to_string()))?;

        serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(hours) = std::env::var("COOLDOWN_WINDOW_HOURS") {
            if let Ok(h) = hours.parse() {
                self.cooldown.window_hours = h;
            }
        }

        if let Ok(max) = std::env::var("COOLDOWN_MAX_JOINS") {
            if let Ok(m) = max.parse() {
                self.cooldown.max_joins = m;
            }
        }

        if let Ok(pct) = std::env::var("PLATFORM_DEFAULT_SPLIT_PCT") {
            if let Ok(p) = pct.parse() {
                self.splits.platform_default_pct = p;
            }
        }

        if let Ok(min) = std::env::var("MINIMUM_PAYOUT_AMOUNT") {
            if let Ok(m) = min.parse() {
                self.payouts.minimum_amount = m;
            }
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{0}': {1}")]
    FileRead(String, String),

    #[error("Failed to parse config: {0}")]
    Parse(String),
}
