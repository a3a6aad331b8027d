//! # Fiscal Device Driver
//!
//! The capability a fiscal printer (ECF) exposes to the coupon state
//! machine, and the faults it may report.
//!
//! ## Fault Classes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       DriverFault::class()                              │
//! │                                                                         │
//! │  OperatorRetry   OutOfPaper, PrinterOffline                            │
//! │                  the operator fixes the device, then Resume / Abort    │
//! │                                                                         │
//! │  AutoRetry       CouponOpen                                            │
//! │                  a stale coupon is cancelled, then open() again        │
//! │                                                                         │
//! │  Terminal        Driver(..), Device(..)                                │
//! │                  reported to the operator, never retried               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use caixa_core::{Payment, Person, Sale, SaleItem};

/// Line number the printer assigned to an item on the open coupon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineId(pub u32);

impl std::fmt::Display for LineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Number the printer assigned to a closed coupon (the COO).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CouponId(pub i64);

impl CouponId {
    #[inline]
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for CouponId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:06}", self.0)
    }
}

/// A fault reported by the fiscal device or its driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverFault {
    /// The printer still holds an open coupon from an earlier session.
    #[error("A coupon is already open on the fiscal printer")]
    CouponOpen,

    #[error("The fiscal printer is out of paper")]
    OutOfPaper,

    #[error("The fiscal printer is offline")]
    PrinterOffline,

    /// The driver rejected the command.
    #[error("Driver error: {0}")]
    Driver(String),

    /// The device answered with an error status.
    #[error("Device error: {0}")]
    Device(String),
}

/// How the coupon reacts to a [`DriverFault`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultClass {
    OperatorRetry,
    AutoRetry,
    Terminal,
}

impl DriverFault {
    pub fn class(&self) -> FaultClass {
        match self {
            DriverFault::OutOfPaper | DriverFault::PrinterOffline => FaultClass::OperatorRetry,
            DriverFault::CouponOpen => FaultClass::AutoRetry,
            DriverFault::Driver(_) | DriverFault::Device(_) => FaultClass::Terminal,
        }
    }
}

/// A fiscal printer.
///
/// Calls are synchronous and block until the device answers. A driver is
/// owned by one [`crate::FiscalPrinterHelper`] and lent exclusively to the
/// coupon being printed.
pub trait FiscalDriver: Send {
    /// Opens a new coupon on the device.
    fn open(&mut self) -> Result<(), DriverFault>;

    /// Prints an item line and returns its line number.
    fn add_item(&mut self, item: &SaleItem) -> Result<LineId, DriverFault>;

    /// Cancels a previously printed line.
    fn remove_item(&mut self, line: LineId) -> Result<(), DriverFault>;

    /// Starts the totalization of the open coupon.
    fn totalize(&mut self, sale: &Sale) -> Result<(), DriverFault>;

    fn add_payments(&mut self, sale: &Sale, payments: &[Payment]) -> Result<(), DriverFault>;

    /// Closes the coupon. `None` means the device closed it without
    /// reporting its number.
    fn close(&mut self) -> Result<Option<CouponId>, DriverFault>;

    /// Cancels the open coupon (or the last one, if none is open).
    fn cancel(&mut self) -> Result<(), DriverFault>;

    /// Prints the customer identification on the coupon.
    fn identify_customer(&mut self, customer: &Person) -> Result<(), DriverFault>;

    /// Called once when a coupon is created for this device, before any
    /// other command. Drivers use it to check the device is usable.
    fn coupon_created(&mut self) -> Result<(), DriverFault> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_classes() {
        assert_eq!(DriverFault::OutOfPaper.class(), FaultClass::OperatorRetry);
        assert_eq!(DriverFault::PrinterOffline.class(), FaultClass::OperatorRetry);
        assert_eq!(DriverFault::CouponOpen.class(), FaultClass::AutoRetry);
        assert_eq!(DriverFault::Driver("x".into()).class(), FaultClass::Terminal);
        assert_eq!(DriverFault::Device("x".into()).class(), FaultClass::Terminal);
    }

    #[test]
    fn test_display() {
        assert_eq!(CouponId(42).to_string(), "000042");
        assert_eq!(LineId(7).to_string(), "7");
        assert_eq!(
            DriverFault::Device("checksum".into()).to_string(),
            "Device error: checksum"
        );
    }
}
