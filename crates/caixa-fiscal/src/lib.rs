//! # caixa-fiscal: Fiscal Coupon Lifecycle for Caixa
//!
//! Prints a sale's fiscal coupon on a fiscal printer (ECF) and keeps the
//! station's till consistent around it.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Caixa Sale Flow                                │
//! │                                                                         │
//! │  apps/terminal                                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   caixa-fiscal (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │  FiscalPrinterHelper ── open_till / close_till / needs_closing │   │
//! │  │        │                        (caixa-db transactions)        │   │
//! │  │        │ create_coupon()                                        │   │
//! │  │        ▼                                                        │   │
//! │  │  FiscalCoupon ── open, add_item, totalize, payments, close     │   │
//! │  │        │                                                        │   │
//! │  │        ▼                                                        │   │
//! │  │  dyn FiscalDriver ── VirtualPrinter (or a device driver)       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  Operator / TillEditor: prompts answered by the front end              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`coupon`] - Coupon state machine
//! - [`helper`] - Till preconditions and coupon creation
//! - [`driver`] - Fiscal printer trait and faults
//! - [`operator`] - Operator prompts and till dialogs
//! - [`config`] - Station, database, till and printer settings
//! - [`virtual_printer`] - Simulated fiscal printer
//! - [`error`] - Error types

pub mod config;
pub mod coupon;
pub mod driver;
pub mod error;
pub mod helper;
pub mod operator;
pub mod virtual_printer;

#[cfg(test)]
mod test_support;

pub use config::{DriverKind, FiscalConfig};
pub use coupon::{CouponState, FiscalCoupon, ItemOutcome, RemoveOutcome, RetryPolicy};
pub use driver::{CouponId, DriverFault, FaultClass, FiscalDriver, LineId};
pub use error::{CouponError, FiscalError, FiscalResult};
pub use helper::FiscalPrinterHelper;
pub use operator::{Operator, RetryDecision, TillEditor};
pub use virtual_printer::{JournalEntry, PrinterOp, VirtualPrinter};

/// Builds the driver named in the configuration.
pub fn load_driver(config: &FiscalConfig) -> Box<dyn FiscalDriver> {
    match config.printer.driver {
        DriverKind::Virtual => Box::new(VirtualPrinter::new()),
    }
}
