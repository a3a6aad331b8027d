//! # caixa-core: Pure Business Logic for Caixa
//!
//! Domain types and rules shared by the database layer and the fiscal
//! coupon machinery. Nothing in here performs I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Caixa Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 apps/terminal (console operator)                │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │        caixa-fiscal (FiscalCoupon, FiscalPrinterHelper)         │   │
//! │  └──────────────┬──────────────────────────────┬───────────────────┘   │
//! │                 │                              │                        │
//! │  ┌──────────────▼──────────────┐   ┌───────────▼───────────────────┐   │
//! │  │  ★ caixa-core (THIS CRATE) ★ │◄──│  caixa-db (SQLite, tills)    │   │
//! │  │  Money • Sale • Till rules   │   │                               │   │
//! │  └──────────────────────────────┘   └───────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Sale, SaleItem, Payment, Person
//! - [`till`] - Cash register sessions and the fiscal-day closing rule
//! - [`money`] - Integer money
//! - [`error`] - Domain error types
//! - [`validation`] - Input checks used before persisting
//!
//! ## Example Usage
//!
//! ```rust
//! use caixa_core::{Money, Till};
//! use chrono::Utc;
//!
//! let mut till = Till::new("station-01");
//! till.open(Utc::now(), Money::from_cents(5000)).unwrap();
//! assert!(till.is_open());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod till;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, TillError, ValidationError};
pub use money::Money;
pub use till::{Till, TillStatus};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default station ID used when no station is configured.
pub const DEFAULT_STATION_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Hours after midnight during which yesterday's till may still be used.
///
/// ## Business Reason
/// Stores that close after midnight keep selling on the till they opened the
/// previous day. Past this hour the till must be closed first.
pub const DEFAULT_TILL_TOLERANCE_HOURS: u32 = 0;

/// Maximum quantity of a single sale item.
pub const MAX_ITEM_QUANTITY: i64 = 999;
