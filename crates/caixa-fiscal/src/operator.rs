//! # Operator Interaction
//!
//! The fiscal layer never draws a dialog itself. Whatever front end runs it
//! (console, GUI, tests) implements these traits and decides how to ask.

use caixa_core::{Money, Till};

/// Answer to a "fix the printer and try again?" prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// "Resume": try the device command again.
    Retry,
    /// "Confirm later": give up on this coupon for now.
    Abort,
}

/// Messages and yes/no questions addressed to the cashier.
pub trait Operator: Send + Sync {
    /// Shows a warning. `details` carries the underlying fault, if any.
    fn warning(&self, message: &str, details: Option<&str>);

    /// Asks whether a device command should be retried.
    fn ask_retry(&self, message: &str) -> RetryDecision;

    /// Asks whether the till opened on `opened_on` should be closed now.
    /// Returns true for "Close Till", false for "Not now".
    fn confirm_close_till(&self, opened_on: &str) -> bool;
}

/// Till opening and closing dialogs.
pub trait TillEditor: Send + Sync {
    /// Runs the opening dialog. `carry_over` is the cash left in the drawer
    /// by the previous till. Returns the cash the operator adds, or `None`
    /// when the dialog is cancelled.
    fn run_opening(&self, carry_over: Money) -> Option<Money>;

    /// Runs the closing dialog for `till`. Returns the cash counted in the
    /// drawer, or `None` when the dialog is cancelled.
    fn run_closing(&self, till: &Till, previous_day: bool) -> Option<Money>;
}
