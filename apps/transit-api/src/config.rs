//! # Server Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     DATABASE_PATH, JWT_SECRET, PSP_WEBHOOK_SECRET, TRANSIT_*           │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     path in TRANSIT_CONFIG                                             │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [server]
//! bind_addr = "0.0.0.0"
//! port = 8080
//!
//! [database]
//! path = "/var/lib/sotral/transit.db"
//! max_connections = 10
//!
//! [auth]
//! jwt_secret = "change-me"
//! token_lifetime_secs = 86400
//!
//! [payment]
//! webhook_secret = "whsec_..."
//! default_currency = "FCFA"
//!
//! [pricing]
//! student_price = 100
//! zones = [
//!     { max_km = 5.0, price = 100 },
//!     { max_km = 10.0, price = 150 },
//!     { max_km = 20.0, price = 200 },
//!     { price = 250 },
//! ]
//!
//! [issuance]
//! max_bulk_quantity = 1000
//! max_purchase_quantity = 50
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use transit_core::validation::validate_currency;
use transit_core::{
    Money, PricingError, PricingZone, ZoneLadder, DEFAULT_CURRENCY, DEFAULT_MAX_BULK_QUANTITY,
    DEFAULT_STUDENT_PRICE, MAX_PURCHASE_QUANTITY,
};
use transit_engine::IssuanceLimits;

/// Environment variable naming the TOML file.
pub const CONFIG_PATH_ENV: &str = "TRANSIT_CONFIG";

const DEV_JWT_SECRET: &str = "transit-dev-secret-change-in-production";

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Invalid pricing ladder: {0}")]
    Pricing(#[from] PricingError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    /// Returns the full bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: PathBuf,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: PathBuf::from("./transit_dev.db"),
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Lifetime of issued bearer tokens.
    pub token_lifetime_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_lifetime_secs: 86_400,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentConfig {
    /// Shared secret for `X-PSP-Signature`. Unset disables verification.
    pub webhook_secret: Option<String>,
    pub default_currency: String,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        PaymentConfig {
            webhook_secret: None,
            default_currency: DEFAULT_CURRENCY.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub student_price: i64,
    pub zones: Vec<PricingZone>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        PricingConfig {
            student_price: DEFAULT_STUDENT_PRICE,
            zones: ZoneLadder::standard().zones().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuanceConfig {
    pub max_bulk_quantity: i64,
    pub max_purchase_quantity: i64,
}

impl Default for IssuanceConfig {
    fn default() -> Self {
        IssuanceConfig {
            max_bulk_quantity: DEFAULT_MAX_BULK_QUANTITY,
            max_purchase_quantity: MAX_PURCHASE_QUANTITY,
        }
    }
}

impl IssuanceConfig {
    pub fn limits(&self) -> IssuanceLimits {
        IssuanceLimits {
            max_purchase_quantity: self.max_purchase_quantity,
            max_bulk_quantity: self.max_bulk_quantity,
        }
    }
}

// =============================================================================
// App Config
// =============================================================================

/// Complete server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseSettings,
    pub auth: AuthConfig,
    pub payment: PaymentConfig,
    pub pricing: PricingConfig,
    pub issuance: IssuanceConfig,
}

impl AppConfig {
    /// Loads defaults, then the TOML file (if any), then the environment.
    ///
    /// Fails when the result does not validate.
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let path = config_path.or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from));

        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => {
                debug!("No config file given, using defaults");
                Self::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parses a TOML file. Missing sections and keys take their defaults.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        info!(?path, "Loading config from file");
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Checks every setting and builds the fare ladder.
    pub fn validate(&self) -> ConfigResult<ZoneLadder> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue("server.port".into()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue("database.max_connections".into()));
        }
        if self.auth.jwt_secret.is_empty() {
            return Err(ConfigError::InvalidValue("auth.jwt_secret".into()));
        }
        if self.auth.token_lifetime_secs <= 0 {
            return Err(ConfigError::InvalidValue("auth.token_lifetime_secs".into()));
        }
        if validate_currency(&self.payment.default_currency).is_err() {
            return Err(ConfigError::InvalidValue("payment.default_currency".into()));
        }
        if self.issuance.max_bulk_quantity < 1 {
            return Err(ConfigError::InvalidValue("issuance.max_bulk_quantity".into()));
        }
        if self.issuance.max_purchase_quantity < 1 {
            return Err(ConfigError::InvalidValue("issuance.max_purchase_quantity".into()));
        }

        Ok(ZoneLadder::new(
            self.pricing.zones.clone(),
            Money::fcfa(self.pricing.student_price),
        )?)
    }

    /// True while the built-in development secret is in use.
    pub fn uses_dev_jwt_secret(&self) -> bool {
        self.auth.jwt_secret == DEV_JWT_SECRET
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from `lookup` (the process environment in production).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("TRANSIT_BIND_ADDR") {
            self.server.bind_addr = addr;
        }

        if let Some(port) = lookup("TRANSIT_PORT") {
            match port.parse::<u16>() {
                Ok(p) => {
                    debug!(port = p, "Overriding port from environment");
                    self.server.port = p;
                }
                Err(_) => warn!(port = %port, "Ignoring invalid TRANSIT_PORT"),
            }
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(max) = lookup("TRANSIT_DB_MAX_CONNECTIONS") {
            if let Ok(max) = max.parse() {
                self.database.max_connections = max;
            }
        }

        if let Some(secret) = lookup("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }

        if let Some(lifetime) = lookup("TRANSIT_TOKEN_LIFETIME_SECS") {
            if let Ok(lifetime) = lifetime.parse() {
                self.auth.token_lifetime_secs = lifetime;
            }
        }

        if let Some(secret) = lookup("PSP_WEBHOOK_SECRET") {
            self.payment.webhook_secret = Some(secret).filter(|s| !s.is_empty());
        }

        if let Some(price) = lookup("TRANSIT_STUDENT_PRICE") {
            match price.parse() {
                Ok(price) => self.pricing.student_price = price,
                Err(_) => warn!(price = %price, "Ignoring invalid TRANSIT_STUDENT_PRICE"),
            }
        }

        if let Some(max) = lookup("TRANSIT_MAX_BULK_QUANTITY") {
            if let Ok(max) = max.parse() {
                self.issuance.max_bulk_quantity = max;
            }
        }

        if let Some(max) = lookup("TRANSIT_MAX_PURCHASE_QUANTITY") {
            if let Ok(max) = max.parse() {
                self.issuance.max_purchase_quantity = max;
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_validate() {
        let config = AppConfig::default();
        let ladder = config.validate().unwrap();
        assert_eq!(ladder, ZoneLadder::standard());
        assert!(config.uses_dev_jwt_secret());
        assert!(config.payment.webhook_secret.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [server]
            port = 9090

            [pricing]
            student_price = 75
            zones = [
                { max_km = 8.0, price = 120 },
                { price = 220 },
            ]
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.bind_addr, "0.0.0.0");
        assert_eq!(config.issuance.max_bulk_quantity, 1000);

        let ladder = config.validate().unwrap();
        assert_eq!(ladder.student_price(), Money::fcfa(75));
        assert_eq!(
            ladder.price_for_distance(12.0, false).unwrap().price,
            Money::fcfa(220)
        );
    }

    #[test]
    fn test_ladder_without_catch_all_is_rejected() {
        let config: AppConfig = toml::from_str(
            r#"
            [pricing]
            zones = [{ max_km = 5.0, price = 100 }]
            "#,
        )
        .unwrap();

        assert!(matches!(
            config.validate(),
            Err(ConfigError::Pricing(PricingError::MissingCatchAll))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("TRANSIT_PORT", "3000"),
            ("DATABASE_PATH", "/tmp/transit.db"),
            ("JWT_SECRET", "s3cret"),
            ("PSP_WEBHOOK_SECRET", "whsec_1"),
            ("TRANSIT_MAX_BULK_QUANTITY", "250"),
        ]);

        let mut config = AppConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.database.path, PathBuf::from("/tmp/transit.db"));
        assert_eq!(config.auth.jwt_secret, "s3cret");
        assert_eq!(config.payment.webhook_secret.as_deref(), Some("whsec_1"));
        assert_eq!(config.issuance.max_bulk_quantity, 250);
        assert!(!config.uses_dev_jwt_secret());
    }

    #[test]
    fn test_invalid_values() {
        let mut config = AppConfig::default();
        config.auth.jwt_secret.clear();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.payment.default_currency = "EUR".into();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.issuance.max_bulk_quantity = 0;
        assert!(config.validate().is_err());
    }
}
