//! # Fiscal Error Types
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Fiscal Error Categories                            │
//! │                                                                         │
//! │  DriverFault (driver.rs)      raw device/driver faults                 │
//! │       │                                                                 │
//! │       ▼  wrapped, never leaked as-is                                   │
//! │  CouponError                  one coupon operation failed              │
//! │    InvalidState, UnknownItem   caller sequenced the coupon wrongly     │
//! │    Aborted                     operator chose "Confirm later"          │
//! │    StaleCoupon                 a leftover coupon could not be cancelled│
//! │    RetriesExhausted            open() kept failing                     │
//! │    Driver { operation, fault } terminal device fault                   │
//! │    MissingCouponId             closed, but no coupon number reported   │
//! │                                                                         │
//! │  FiscalError                  till workflows and configuration         │
//! │    Persistence(DbError), NoOpenTill, Config, ConfigLoad                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::coupon::CouponState;
use crate::driver::DriverFault;
use caixa_db::DbError;

/// Result type alias for helper operations.
pub type FiscalResult<T> = Result<T, FiscalError>;

/// Failure of a single coupon operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponError {
    /// The operation is not allowed in the coupon's current state.
    #[error("Cannot {operation} a coupon in state {state}")]
    InvalidState {
        operation: &'static str,
        state: CouponState,
    },

    /// The item was never printed on this coupon.
    #[error("Item {item_id} is not on the coupon")]
    UnknownItem { item_id: String },

    #[error("Coupon emission postponed by the operator")]
    Aborted,

    /// A coupon left open on the printer could not be cancelled.
    #[error("Could not cancel the coupon left open on the printer: {0}")]
    StaleCoupon(DriverFault),

    #[error("Gave up opening the coupon after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("Fiscal printer failed to {operation}: {fault}")]
    Driver {
        operation: &'static str,
        fault: DriverFault,
    },

    /// The printer closed the coupon without reporting its number.
    #[error("The fiscal printer did not report a coupon number")]
    MissingCouponId,
}

impl CouponError {
    /// The device fault behind this error, if any.
    pub fn fault(&self) -> Option<&DriverFault> {
        match self {
            CouponError::StaleCoupon(fault) | CouponError::Driver { fault, .. } => Some(fault),
            _ => None,
        }
    }
}

/// Failure of a till workflow or of the fiscal configuration.
#[derive(Debug, Error)]
pub enum FiscalError {
    #[error("Database error: {0}")]
    Persistence(#[from] DbError),

    /// Closing was requested but the station has no open till.
    #[error("Station {station_id} has no open till")]
    NoOpenTill { station_id: String },

    #[error("Invalid fiscal configuration: {0}")]
    Config(String),

    #[error("Failed to load configuration: {0}")]
    ConfigLoad(String),
}

impl From<std::io::Error> for FiscalError {
    fn from(err: std::io::Error) -> Self {
        FiscalError::ConfigLoad(err.to_string())
    }
}

impl From<toml::de::Error> for FiscalError {
    fn from(err: toml::de::Error) -> Self {
        FiscalError::ConfigLoad(err.to_string())
    }
}

impl From<toml::ser::Error> for FiscalError {
    fn from(err: toml::ser::Error) -> Self {
        FiscalError::Config(err.to_string())
    }
}
