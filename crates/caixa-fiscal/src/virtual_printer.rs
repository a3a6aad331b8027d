//! # Virtual Fiscal Printer
//!
//! An in-process ECF used by the terminal when no device is attached and by
//! the tests. It keeps the device-side coupon state a real printer keeps
//! (open coupon, line numbers, running total, coupon counter) and writes a
//! journal of everything it "printed".
//!
//! ## Device Coupon State
//! ```text
//! IDLE ──open──► OPEN ──totalize──► TOTALIZED ──add_payments──► PAID
//!   ▲              │                    │                          │
//!   └── cancel ────┴────────────────────┴──────── close ───────────┘
//! ```
//!
//! Faults can be injected per operation with [`VirtualPrinter::inject`];
//! each injected fault fails exactly one call.
//!
//! Clones share the same device, so a test can keep a handle for
//! inspection after handing the printer to a helper.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::driver::{CouponId, DriverFault, FiscalDriver, LineId};
use caixa_core::{Money, Payment, Person, Sale, SaleItem};

/// Operations faults can be injected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrinterOp {
    CouponCreated,
    Open,
    AddItem,
    RemoveItem,
    Totalize,
    AddPayments,
    Close,
    Cancel,
    IdentifyCustomer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum DeviceState {
    #[default]
    Idle,
    Open,
    Totalized,
    Paid,
}

/// One entry of the printed journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JournalEntry {
    CouponOpened,
    ItemPrinted {
        line: LineId,
        code: String,
        description: String,
        quantity: i64,
        unit_price_cents: i64,
    },
    ItemCancelled {
        line: LineId,
    },
    Totalized {
        total_cents: i64,
        discount_cents: i64,
    },
    PaymentRegistered {
        method: String,
        amount_cents: i64,
    },
    CustomerIdentified {
        name: String,
        document: Option<String>,
    },
    CouponClosed {
        coupon_id: CouponId,
        total_cents: i64,
    },
    CouponCancelled,
}

#[derive(Debug, Default)]
struct Device {
    state: DeviceState,
    lines: Vec<(LineId, i64, bool)>,
    next_line: u32,
    discount_cents: i64,
    coo: i64,
    faults: Vec<(PrinterOp, DriverFault)>,
    journal: Vec<JournalEntry>,
}

impl Device {
    fn total_cents(&self) -> i64 {
        self.lines
            .iter()
            .filter(|(_, _, cancelled)| !cancelled)
            .map(|(_, cents, _)| cents)
            .sum()
    }

    fn take_fault(&mut self, op: PrinterOp) -> Result<(), DriverFault> {
        match self.faults.iter().position(|(target, _)| *target == op) {
            Some(index) => {
                let (_, fault) = self.faults.remove(index);
                debug!(?op, %fault, "Injected printer fault");
                Err(fault)
            }
            None => Ok(()),
        }
    }

    fn require(&self, state: DeviceState, command: &str) -> Result<(), DriverFault> {
        if self.state == state {
            Ok(())
        } else {
            Err(DriverFault::Driver(format!(
                "{command} not accepted in device state {:?}",
                self.state
            )))
        }
    }

    fn begin_coupon(&mut self) {
        self.state = DeviceState::Open;
        self.lines.clear();
        self.next_line = 1;
        self.discount_cents = 0;
    }
}

/// Simulated fiscal printer.
#[derive(Debug, Clone, Default)]
pub struct VirtualPrinter {
    device: Arc<Mutex<Device>>,
}

impl VirtualPrinter {
    pub fn new() -> Self {
        VirtualPrinter::default()
    }

    /// Starts the coupon counter at `coo`; the next closed coupon gets
    /// `coo + 1`.
    pub fn with_coo(coo: i64) -> Self {
        let printer = VirtualPrinter::new();
        printer.device().coo = coo;
        printer
    }

    /// Fails the next call of `op` with `fault`.
    pub fn inject(&self, op: PrinterOp, fault: DriverFault) {
        self.device().faults.push((op, fault));
    }

    /// Leaves a coupon open, as a crash in an earlier session would.
    pub fn leave_coupon_open(&self) {
        self.device().begin_coupon();
    }

    pub fn has_open_coupon(&self) -> bool {
        self.device().state != DeviceState::Idle
    }

    /// Number of the last closed coupon.
    pub fn coo(&self) -> i64 {
        self.device().coo
    }

    /// Running total of the coupon being printed.
    pub fn total(&self) -> Money {
        Money::from_cents(self.device().total_cents())
    }

    pub fn journal(&self) -> Vec<JournalEntry> {
        self.device().journal.clone()
    }

    pub fn journal_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.device().journal)
    }

    fn device(&self) -> MutexGuard<'_, Device> {
        self.device.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FiscalDriver for VirtualPrinter {
    fn coupon_created(&mut self) -> Result<(), DriverFault> {
        self.device().take_fault(PrinterOp::CouponCreated)
    }

    fn open(&mut self) -> Result<(), DriverFault> {
        let mut device = self.device();
        device.take_fault(PrinterOp::Open)?;
        if device.state != DeviceState::Idle {
            return Err(DriverFault::CouponOpen);
        }
        device.begin_coupon();
        device.journal.push(JournalEntry::CouponOpened);
        Ok(())
    }

    fn add_item(&mut self, item: &SaleItem) -> Result<LineId, DriverFault> {
        let mut device = self.device();
        device.take_fault(PrinterOp::AddItem)?;
        device.require(DeviceState::Open, "add_item")?;

        let line = LineId(device.next_line);
        device.next_line += 1;
        device.lines.push((line, item.line_total().cents(), false));
        device.journal.push(JournalEntry::ItemPrinted {
            line,
            code: item.code_snapshot.clone(),
            description: item.description_snapshot.clone(),
            quantity: item.quantity,
            unit_price_cents: item.unit_price_cents,
        });
        Ok(line)
    }

    fn remove_item(&mut self, line: LineId) -> Result<(), DriverFault> {
        let mut device = self.device();
        device.take_fault(PrinterOp::RemoveItem)?;
        device.require(DeviceState::Open, "remove_item")?;

        let entry = device
            .lines
            .iter_mut()
            .find(|(id, _, cancelled)| *id == line && !cancelled)
            .ok_or_else(|| DriverFault::Driver(format!("line {line} is not on the coupon")))?;
        entry.2 = true;
        device.journal.push(JournalEntry::ItemCancelled { line });
        Ok(())
    }

    fn totalize(&mut self, sale: &Sale) -> Result<(), DriverFault> {
        let mut device = self.device();
        device.take_fault(PrinterOp::Totalize)?;
        device.require(DeviceState::Open, "totalize")?;

        device.discount_cents = sale.discount_cents;
        device.state = DeviceState::Totalized;
        let total_cents = device.total_cents();
        device.journal.push(JournalEntry::Totalized {
            total_cents,
            discount_cents: sale.discount_cents,
        });
        Ok(())
    }

    fn add_payments(&mut self, _sale: &Sale, payments: &[Payment]) -> Result<(), DriverFault> {
        let mut device = self.device();
        device.take_fault(PrinterOp::AddPayments)?;
        device.require(DeviceState::Totalized, "add_payments")?;

        let due = device.total_cents() - device.discount_cents;
        let paid: i64 = payments.iter().map(|p| p.amount_cents).sum();
        if paid < due {
            return Err(DriverFault::Driver(format!(
                "payments of {} do not cover {}",
                Money::from_cents(paid),
                Money::from_cents(due)
            )));
        }

        for payment in payments {
            device.journal.push(JournalEntry::PaymentRegistered {
                method: payment.method.fiscal_name().to_string(),
                amount_cents: payment.amount_cents,
            });
        }
        device.state = DeviceState::Paid;
        Ok(())
    }

    fn close(&mut self) -> Result<Option<CouponId>, DriverFault> {
        let mut device = self.device();
        device.take_fault(PrinterOp::Close)?;
        device.require(DeviceState::Paid, "close")?;

        device.coo += 1;
        let coupon_id = CouponId(device.coo);
        let total_cents = device.total_cents() - device.discount_cents;
        device.state = DeviceState::Idle;
        device.journal.push(JournalEntry::CouponClosed {
            coupon_id,
            total_cents,
        });
        Ok(Some(coupon_id))
    }

    fn cancel(&mut self) -> Result<(), DriverFault> {
        let mut device = self.device();
        device.take_fault(PrinterOp::Cancel)?;
        if device.state == DeviceState::Idle {
            return Err(DriverFault::Driver("no coupon to cancel".into()));
        }
        device.state = DeviceState::Idle;
        device.journal.push(JournalEntry::CouponCancelled);
        Ok(())
    }

    fn identify_customer(&mut self, customer: &Person) -> Result<(), DriverFault> {
        let mut device = self.device();
        device.take_fault(PrinterOp::IdentifyCustomer)?;
        device.journal.push(JournalEntry::CustomerIdentified {
            name: customer.name.clone(),
            document: customer.document.clone(),
        });
        Ok(())
    }
}
