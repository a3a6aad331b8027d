//! # Fiscal Coupon
//!
//! One sale's fiscal document, driven step by step on the printer.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   NEW ──open()──► OPEN ──add_item()──► ITEMS_ADDED ◄─┐                  │
//! │                                          │   add_item / remove_item    │
//! │                                          │ ──────────┘                 │
//! │                                     totalize()                         │
//! │                                          ▼                              │
//! │                                     TOTALIZED                          │
//! │                                          │ setup_payments()            │
//! │                                          ▼                              │
//! │                                   PAYMENTS_ADDED ──close()──► CLOSED    │
//! │                                                                         │
//! │   any non-terminal state ──cancel()──► CANCELLED                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Filtered Items
//! Gift certificates and items priced zero or below are never sent to the
//! printer: `add_item`/`remove_item` return `NotPrinted` without a device
//! call. A coupon that never recorded an item (e.g. services only) skips the
//! device on `totalize`, `setup_payments` and `close`.
//!
//! ## Line Table
//! Printed lines are keyed by `SaleItem::id`. The same item may be added
//! several times; removing it cancels every line recorded for it.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::driver::{CouponId, DriverFault, FaultClass, FiscalDriver, LineId};
use crate::error::CouponError;
use crate::operator::{Operator, RetryDecision};
use caixa_core::{Payment, Person, Sale, SaleItem};

const OUT_OF_PAPER: &str =
    "The fiscal printer has run out of paper.\nAdd more paper before continuing.";
const PRINTER_OFFLINE: &str = "The fiscal printer is offline, turn it on and try again";
const OPEN_FAILED: &str = "It is not possible to emit the coupon";
const ADD_ITEM_FAILED: &str = "It is not possible to add the item to the coupon";
const REMOVE_ITEM_FAILED: &str = "It is not possible to remove the item from the coupon";
const TOTALIZE_FAILED: &str = "It is not possible to totalize the coupon";
const PAYMENTS_FAILED: &str = "It is not possible to add payments to the coupon";
const CLOSE_FAILED: &str = "It's not possible to close the coupon";
const IDENTIFY_FAILED: &str = "It is not possible to identify the customer on the coupon";

// =============================================================================
// States & Outcomes
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CouponState {
    New,
    Open,
    ItemsAdded,
    Totalized,
    PaymentsAdded,
    Closed,
    Cancelled,
}

impl CouponState {
    /// Closed and cancelled coupons accept no further device commands.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CouponState::Closed | CouponState::Cancelled)
    }
}

impl std::fmt::Display for CouponState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CouponState::New => "new",
            CouponState::Open => "open",
            CouponState::ItemsAdded => "items_added",
            CouponState::Totalized => "totalized",
            CouponState::PaymentsAdded => "payments_added",
            CouponState::Closed => "closed",
            CouponState::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}

/// Result of [`FiscalCoupon::add_item`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Printed(LineId),
    /// The item is not a fiscal item; nothing was sent to the printer.
    NotPrinted,
}

/// Result of [`FiscalCoupon::remove_item`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    NotPrinted,
    /// Number of printed lines cancelled.
    Removed(usize),
}

/// How many times `open()` may hit the device before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// At least one attempt is always made.
    pub fn new(max_attempts: u32) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(crate::config::DEFAULT_MAX_OPEN_ATTEMPTS)
    }
}

// =============================================================================
// Fiscal Coupon
// =============================================================================

/// A fiscal coupon being printed.
///
/// The coupon borrows the printer exclusively for its whole life, so two
/// coupons can never interleave commands on the same device. It never
/// touches the database: the coupon number ends up on the [`Sale`] passed
/// to [`close`](Self::close).
///
/// ## Example
/// ```rust,ignore
/// let mut coupon = helper.create_coupon().ok_or("printer unavailable")?;
/// coupon.open()?;
/// for item in &items {
///     coupon.add_item(item)?;
/// }
/// coupon.totalize(&sale)?;
/// coupon.setup_payments(&sale, &payments)?;
/// coupon.close(&mut sale)?;
/// ```
pub struct FiscalCoupon<'a> {
    driver: &'a mut dyn FiscalDriver,
    operator: Arc<dyn Operator>,
    policy: RetryPolicy,
    state: CouponState,
    items: BTreeMap<String, Vec<LineId>>,
    coupon_id: Option<CouponId>,
}

impl<'a> FiscalCoupon<'a> {
    pub fn new(
        driver: &'a mut dyn FiscalDriver,
        operator: Arc<dyn Operator>,
        policy: RetryPolicy,
    ) -> Self {
        FiscalCoupon {
            driver,
            operator,
            policy,
            state: CouponState::New,
            items: BTreeMap::new(),
            coupon_id: None,
        }
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub fn state(&self) -> CouponState {
        self.state
    }

    /// Printed lines recorded for an item. `None` if the item was never
    /// printed on this coupon.
    pub fn line_ids(&self, item_id: &str) -> Option<&[LineId]> {
        self.items.get(item_id).map(Vec::as_slice)
    }

    /// Ids of the items recorded on this coupon.
    pub fn items(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    /// True when no item was ever printed on this coupon.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The number the printer assigned when the coupon was closed.
    pub fn coupon_id(&self) -> Option<CouponId> {
        self.coupon_id
    }

    // =========================================================================
    // Opening
    // =========================================================================

    /// Opens the coupon on the printer.
    ///
    /// ## Fault Handling
    /// - `CouponOpen`: the leftover coupon is cancelled once, then open is
    ///   retried. If that cancel fails the coupon cannot be emitted.
    /// - `OutOfPaper` / `PrinterOffline`: the operator is asked to fix the
    ///   printer; "Resume" retries, "Confirm later" aborts.
    /// - anything else: reported, no retry.
    ///
    /// At most `policy.max_attempts` device opens are issued. A fault on the
    /// last one gives up without cancelling or prompting.
    pub fn open(&mut self) -> Result<(), CouponError> {
        self.expect_state("open", &[CouponState::New])?;

        let mut attempts = 0;
        loop {
            attempts += 1;
            debug!(attempt = attempts, "Opening fiscal coupon");

            let fault = match self.driver.open() {
                Ok(()) => {
                    self.state = CouponState::Open;
                    info!(attempts, "Fiscal coupon opened");
                    return Ok(());
                }
                Err(fault) => fault,
            };

            match fault.class() {
                FaultClass::Terminal => return Err(self.fail("open", OPEN_FAILED, fault)),
                // No attempt left to follow a cancel or a resume.
                _ if attempts >= self.policy.max_attempts => break,
                FaultClass::AutoRetry => {
                    warn!("A coupon was left open on the printer, cancelling it");
                    if let Err(cancel_fault) = self.driver.cancel() {
                        self.warn_fault(OPEN_FAILED, &cancel_fault);
                        return Err(CouponError::StaleCoupon(cancel_fault));
                    }
                }
                FaultClass::OperatorRetry => {
                    let message = match fault {
                        DriverFault::OutOfPaper => OUT_OF_PAPER,
                        _ => PRINTER_OFFLINE,
                    };
                    match self.operator.ask_retry(message) {
                        RetryDecision::Retry => {
                            debug!(%fault, "Operator resumed coupon emission");
                        }
                        RetryDecision::Abort => {
                            info!(%fault, "Operator postponed coupon emission");
                            return Err(CouponError::Aborted);
                        }
                    }
                }
            }
        }

        warn!(attempts, "Giving up opening the fiscal coupon");
        self.operator.warning(
            OPEN_FAILED,
            Some(&format!("the printer did not accept a new coupon after {attempts} attempts")),
        );
        Err(CouponError::RetriesExhausted { attempts })
    }

    // =========================================================================
    // Items
    // =========================================================================

    /// Prints an item on the coupon.
    pub fn add_item(&mut self, item: &SaleItem) -> Result<ItemOutcome, CouponError> {
        if !item.is_fiscally_printable() {
            debug!(item_id = %item.id, "Item is not fiscal, skipping printer");
            return Ok(ItemOutcome::NotPrinted);
        }
        self.expect_state("add_item", &[CouponState::Open, CouponState::ItemsAdded])?;

        match self.driver.add_item(item) {
            Ok(line) => {
                self.items.entry(item.id.clone()).or_default().push(line);
                self.state = CouponState::ItemsAdded;
                debug!(item_id = %item.id, %line, "Item printed");
                Ok(ItemOutcome::Printed(line))
            }
            Err(fault) => Err(self.fail("add_item", ADD_ITEM_FAILED, fault)),
        }
    }

    /// Cancels every printed line of an item.
    ///
    /// Lines are cancelled in the order they were printed. If the printer
    /// refuses one, the lines not yet cancelled stay recorded so the removal
    /// can be retried.
    pub fn remove_item(&mut self, item: &SaleItem) -> Result<RemoveOutcome, CouponError> {
        if !item.is_fiscally_printable() {
            return Ok(RemoveOutcome::NotPrinted);
        }
        self.expect_state("remove_item", &[CouponState::Open, CouponState::ItemsAdded])?;

        let Some(lines) = self.items.get_mut(&item.id) else {
            return Err(CouponError::UnknownItem {
                item_id: item.id.clone(),
            });
        };

        let mut removed = 0;
        let mut failure = None;
        while let Some(&line) = lines.first() {
            match self.driver.remove_item(line) {
                Ok(()) => {
                    lines.remove(0);
                    removed += 1;
                }
                Err(fault) => {
                    failure = Some(fault);
                    break;
                }
            }
        }

        match failure {
            Some(fault) => {
                warn!(item_id = %item.id, removed, "Item only partially removed from coupon");
                Err(self.fail("remove_item", REMOVE_ITEM_FAILED, fault))
            }
            None => {
                debug!(item_id = %item.id, removed, "Item removed from coupon");
                Ok(RemoveOutcome::Removed(removed))
            }
        }
    }

    // =========================================================================
    // Totals, Payments, Closing
    // =========================================================================

    pub fn totalize(&mut self, sale: &Sale) -> Result<(), CouponError> {
        if self.skips_device("totalize")? {
            return Ok(());
        }
        self.expect_state("totalize", &[CouponState::ItemsAdded])?;

        match self.driver.totalize(sale) {
            Ok(()) => {
                self.state = CouponState::Totalized;
                Ok(())
            }
            Err(fault) => Err(self.fail("totalize", TOTALIZE_FAILED, fault)),
        }
    }

    pub fn setup_payments(&mut self, sale: &Sale, payments: &[Payment]) -> Result<(), CouponError> {
        if self.skips_device("setup_payments")? {
            return Ok(());
        }
        self.expect_state("setup_payments", &[CouponState::Totalized])?;

        match self.driver.add_payments(sale, payments) {
            Ok(()) => {
                self.state = CouponState::PaymentsAdded;
                Ok(())
            }
            Err(fault) => Err(self.fail("setup_payments", PAYMENTS_FAILED, fault)),
        }
    }

    /// Closes the coupon and stamps its number on `sale`.
    ///
    /// The sale is only stamped when the printer reports a number. A failed
    /// close leaves both the sale and the coupon state untouched.
    pub fn close(&mut self, sale: &mut Sale) -> Result<(), CouponError> {
        if self.skips_device("close")? {
            self.state = CouponState::Closed;
            return Ok(());
        }
        self.expect_state("close", &[CouponState::PaymentsAdded])?;

        match self.driver.close() {
            Ok(Some(coupon_id)) => {
                sale.coupon_id = Some(coupon_id.get());
                self.coupon_id = Some(coupon_id);
                self.state = CouponState::Closed;
                info!(sale_id = %sale.id, %coupon_id, "Fiscal coupon closed");
                Ok(())
            }
            Ok(None) => {
                self.state = CouponState::Closed;
                warn!(sale_id = %sale.id, "Coupon closed without a coupon number");
                self.operator.warning(
                    CLOSE_FAILED,
                    Some("the fiscal printer did not report the coupon number"),
                );
                Err(CouponError::MissingCouponId)
            }
            Err(fault) => Err(self.fail("close", CLOSE_FAILED, fault)),
        }
    }

    /// Cancels the coupon on the printer.
    ///
    /// Returns false, without touching the printer, if the coupon was never
    /// opened or is already closed or cancelled. A device cancel with no
    /// coupon open would hit the previous sale's coupon. A printer failure is
    /// logged and also reported as false.
    pub fn cancel(&mut self) -> bool {
        if self.state == CouponState::New || self.state.is_terminal() {
            return false;
        }

        match self.driver.cancel() {
            Ok(()) => {
                info!(state = %self.state, "Fiscal coupon cancelled");
                self.state = CouponState::Cancelled;
                true
            }
            Err(fault) => {
                warn!(%fault, state = %self.state, "Failed to cancel fiscal coupon");
                false
            }
        }
    }

    pub fn identify_customer(&mut self, customer: &Person) -> Result<(), CouponError> {
        match self.driver.identify_customer(customer) {
            Ok(()) => Ok(()),
            Err(fault) => Err(self.fail("identify_customer", IDENTIFY_FAILED, fault)),
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn expect_state(
        &self,
        operation: &'static str,
        allowed: &[CouponState],
    ) -> Result<(), CouponError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(CouponError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    /// Whether a device step can be skipped because nothing was printed.
    fn skips_device(&self, operation: &'static str) -> Result<bool, CouponError> {
        if self.state.is_terminal() {
            return Err(CouponError::InvalidState {
                operation,
                state: self.state,
            });
        }
        Ok(self.items.is_empty())
    }

    fn warn_fault(&self, message: &str, fault: &DriverFault) {
        warn!(%fault, "{}", message);
        self.operator.warning(message, Some(&fault.to_string()));
    }

    fn fail(&self, operation: &'static str, message: &str, fault: DriverFault) -> CouponError {
        self.warn_fault(message, &fault);
        CouponError::Driver { operation, fault }
    }
}

impl std::fmt::Debug for FiscalCoupon<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FiscalCoupon")
            .field("state", &self.state)
            .field("items", &self.items)
            .field("coupon_id", &self.coupon_id)
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
