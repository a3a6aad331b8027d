//! # Error Types
//!
//! Domain-specific error types for caixa-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  caixa-core errors (this file)                                         │
//! │  ├── CoreError        - General domain errors                          │
//! │  ├── TillError        - Illegal till transitions                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  caixa-db errors                                                       │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  caixa-fiscal errors                                                   │
//! │  ├── DriverFault      - What the fiscal printer reported               │
//! │  ├── CouponError      - Coupon operation failures (operator-facing)    │
//! │  └── FiscalError      - Till workflow / persistence failures           │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → FiscalError → Operator  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Sale is not in a state that allows the requested operation.
    ///
    /// ## When This Occurs
    /// - Checking out a sale that was already completed or voided
    #[error("Sale {sale_id} is {current_status}, cannot perform operation")]
    InvalidSaleStatus {
        sale_id: String,
        current_status: String,
    },

    /// Payments do not settle the sale.
    #[error("Invalid payment amount: {reason}")]
    InvalidPaymentAmount { reason: String },

    /// Till transition refused.
    #[error("Till error: {0}")]
    Till(#[from] TillError),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Till Error
// =============================================================================

/// Illegal till transitions.
///
/// These are shown to the operator as-is, so the messages are written for
/// a cashier, not a developer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TillError {
    /// Only a pending till can be opened.
    #[error("Till {till_id} was already opened")]
    NotPending { till_id: String },

    /// Only an open till can be closed.
    #[error("Till {till_id} is not open")]
    NotOpen { till_id: String },

    /// The station still has a till that was never closed.
    ///
    /// ## When This Occurs
    /// - The previous day's till was left open and the operator tries to
    ///   open a new one without reconciling it first
    #[error("The previous till of station {station_id} was not closed")]
    PreviousTillOpen { station_id: String },

    /// Cash counts cannot go below zero.
    #[error("{field} cannot be negative")]
    NegativeCash { field: String },
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, malformed document).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
