//! # Fiscal Configuration
//!
//! Station, database, till and printer settings.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     CAIXA_STATION_ID=station-01                                        │
//! │     CAIXA_DATABASE_PATH=/var/lib/caixa/caixa.db                        │
//! │     CAIXA_MAX_OPEN_ATTEMPTS=5                                          │
//! │     CAIXA_TILL_TOLERANCE_HOURS=2                                       │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/caixa/caixa.toml (Linux)                                 │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [station]
//! id = "station-01"
//! name = "Register 1"
//!
//! [database]
//! path = "caixa.db"
//!
//! [till]
//! closing_tolerance_hours = 2  # yesterday's till is accepted until 02:00
//!
//! [printer]
//! driver = "virtual"
//! max_open_attempts = 5
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::coupon::RetryPolicy;
use crate::error::{FiscalError, FiscalResult};

/// Default number of device opens per coupon.
pub const DEFAULT_MAX_OPEN_ATTEMPTS: u32 = 5;

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationConfig {
    /// Identifier tills and sales are recorded under.
    #[serde(default = "default_station_id")]
    pub id: String,

    #[serde(default = "default_station_name")]
    pub name: String,
}

fn default_station_id() -> String {
    caixa_core::DEFAULT_STATION_ID.to_string()
}

fn default_station_name() -> String {
    "Caixa".to_string()
}

impl Default for StationConfig {
    fn default() -> Self {
        StationConfig {
            id: default_station_id(),
            name: default_station_name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("caixa.db")
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TillSettings {
    /// Hours past midnight during which yesterday's till does not need to
    /// be closed yet.
    #[serde(default = "default_tolerance")]
    pub closing_tolerance_hours: u32,
}

fn default_tolerance() -> u32 {
    caixa_core::DEFAULT_TILL_TOLERANCE_HOURS
}

impl Default for TillSettings {
    fn default() -> Self {
        TillSettings {
            closing_tolerance_hours: default_tolerance(),
        }
    }
}

/// Which fiscal printer driver to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    /// In-process simulated printer.
    #[default]
    Virtual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterSettings {
    #[serde(default)]
    pub driver: DriverKind,

    #[serde(default = "default_max_open_attempts")]
    pub max_open_attempts: u32,
}

fn default_max_open_attempts() -> u32 {
    DEFAULT_MAX_OPEN_ATTEMPTS
}

impl Default for PrinterSettings {
    fn default() -> Self {
        PrinterSettings {
            driver: DriverKind::default(),
            max_open_attempts: default_max_open_attempts(),
        }
    }
}

// =============================================================================
// Fiscal Configuration
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalConfig {
    #[serde(default)]
    pub station: StationConfig,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub till: TillSettings,

    #[serde(default)]
    pub printer: PrinterSettings,
}

impl FiscalConfig {
    /// Loads configuration: defaults, then the TOML file (explicit path or
    /// the platform config dir), then environment overrides.
    pub fn load(config_path: Option<PathBuf>) -> FiscalResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading fiscal config from file");
                config = Self::from_file(&path)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> FiscalResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn save(&self, path: &Path) -> FiscalResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        info!(?path, "Fiscal config saved");
        Ok(())
    }

    pub fn validate(&self) -> FiscalResult<()> {
        if self.station.id.trim().is_empty() {
            return Err(FiscalError::Config("station id must not be empty".into()));
        }
        if self.printer.max_open_attempts == 0 {
            return Err(FiscalError::Config(
                "printer.max_open_attempts must be at least 1".into(),
            ));
        }
        if self.till.closing_tolerance_hours > 23 {
            return Err(FiscalError::Config(format!(
                "till.closing_tolerance_hours must be below 24, got {}",
                self.till.closing_tolerance_hours
            )));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.printer.max_open_attempts)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("CAIXA_STATION_ID") {
            debug!(station_id = %id, "Overriding station id from environment");
            self.station.id = id;
        }

        if let Ok(path) = std::env::var("CAIXA_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(attempts) = std::env::var("CAIXA_MAX_OPEN_ATTEMPTS") {
            match attempts.parse::<u32>() {
                Ok(n) => self.printer.max_open_attempts = n,
                Err(_) => warn!(value = %attempts, "Ignoring invalid CAIXA_MAX_OPEN_ATTEMPTS"),
            }
        }

        if let Ok(hours) = std::env::var("CAIXA_TILL_TOLERANCE_HOURS") {
            match hours.parse::<u32>() {
                Ok(h) => self.till.closing_tolerance_hours = h,
                Err(_) => warn!(value = %hours, "Ignoring invalid CAIXA_TILL_TOLERANCE_HOURS"),
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("br", "caixa", "caixa")
            .map(|dirs| dirs.config_dir().join("caixa.toml"))
    }
}
