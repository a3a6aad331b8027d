//! Scripted collaborators for unit tests.

use std::collections::VecDeque;
use std::mem::discriminant;
use std::sync::Mutex;

use crate::driver::{CouponId, DriverFault, FiscalDriver, LineId};
use crate::operator::{Operator, RetryDecision, TillEditor};
use caixa_core::{Money, Payment, Person, Sale, SaleItem, Till};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Open,
    AddItem,
    RemoveItem(LineId),
    Totalize,
    AddPayments,
    Close,
    Cancel,
    IdentifyCustomer,
    CouponCreated,
}

/// Driver that records every call and fails the ones it was told to.
#[derive(Debug)]
pub struct ScriptedDriver {
    pub calls: Vec<Call>,
    pub coupon_number: Option<CouponId>,
    pub reject_removal_of: Option<LineId>,
    faults: Vec<(Call, DriverFault)>,
    next_line: u32,
}

impl Default for ScriptedDriver {
    fn default() -> Self {
        ScriptedDriver::starting_at(1)
    }
}

impl ScriptedDriver {
    pub fn starting_at(first_line: u32) -> Self {
        ScriptedDriver {
            calls: Vec::new(),
            coupon_number: Some(CouponId(1)),
            reject_removal_of: None,
            faults: Vec::new(),
            next_line: first_line,
        }
    }

    /// Makes the next call of this kind fail once.
    pub fn fail(&mut self, call: Call, fault: DriverFault) {
        self.faults.push((call, fault));
    }

    pub fn removals(&self) -> Vec<LineId> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::RemoveItem(line) => Some(*line),
                _ => None,
            })
            .collect()
    }

    fn record(&mut self, call: Call) -> Result<(), DriverFault> {
        self.calls.push(call);
        match self
            .faults
            .iter()
            .position(|(scripted, _)| discriminant(scripted) == discriminant(&call))
        {
            Some(index) => Err(self.faults.remove(index).1),
            None => Ok(()),
        }
    }
}

impl FiscalDriver for ScriptedDriver {
    fn open(&mut self) -> Result<(), DriverFault> {
        self.record(Call::Open)
    }

    fn add_item(&mut self, _item: &SaleItem) -> Result<LineId, DriverFault> {
        self.record(Call::AddItem)?;
        let line = LineId(self.next_line);
        self.next_line += 1;
        Ok(line)
    }

    fn remove_item(&mut self, line: LineId) -> Result<(), DriverFault> {
        self.record(Call::RemoveItem(line))?;
        if self.reject_removal_of == Some(line) {
            return Err(DriverFault::Device(format!("line {line} cannot be cancelled")));
        }
        Ok(())
    }

    fn totalize(&mut self, _sale: &Sale) -> Result<(), DriverFault> {
        self.record(Call::Totalize)
    }

    fn add_payments(&mut self, _sale: &Sale, _payments: &[Payment]) -> Result<(), DriverFault> {
        self.record(Call::AddPayments)
    }

    fn close(&mut self) -> Result<Option<CouponId>, DriverFault> {
        self.record(Call::Close)?;
        Ok(self.coupon_number)
    }

    fn cancel(&mut self) -> Result<(), DriverFault> {
        self.record(Call::Cancel)
    }

    fn identify_customer(&mut self, _customer: &Person) -> Result<(), DriverFault> {
        self.record(Call::IdentifyCustomer)
    }

    fn coupon_created(&mut self) -> Result<(), DriverFault> {
        self.record(Call::CouponCreated)
    }
}

/// Operator that records what it was told and answers from a script.
#[derive(Debug, Default)]
pub struct RecordingOperator {
    warnings: Mutex<Vec<(String, Option<String>)>>,
    questions: Mutex<Vec<String>>,
    answers: Mutex<VecDeque<RetryDecision>>,
    close_till_prompts: Mutex<Vec<String>>,
    pub close_till_answer: bool,
}

impl RecordingOperator {
    pub fn answering(answers: &[RetryDecision]) -> Self {
        RecordingOperator {
            answers: Mutex::new(answers.iter().copied().collect()),
            ..Default::default()
        }
    }

    pub fn warnings(&self) -> Vec<(String, Option<String>)> {
        self.warnings.lock().unwrap().clone()
    }

    pub fn questions(&self) -> Vec<String> {
        self.questions.lock().unwrap().clone()
    }

    pub fn close_till_prompts(&self) -> Vec<String> {
        self.close_till_prompts.lock().unwrap().clone()
    }
}

impl Operator for RecordingOperator {
    fn warning(&self, message: &str, details: Option<&str>) {
        self.warnings
            .lock()
            .unwrap()
            .push((message.to_string(), details.map(str::to_string)));
    }

    fn ask_retry(&self, message: &str) -> RetryDecision {
        self.questions.lock().unwrap().push(message.to_string());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(RetryDecision::Abort)
    }

    fn confirm_close_till(&self, opened_on: &str) -> bool {
        self.close_till_prompts
            .lock()
            .unwrap()
            .push(opened_on.to_string());
        self.close_till_answer
    }
}

/// Till dialogs answered from fixed values; `None` cancels the dialog.
#[derive(Debug, Default)]
pub struct ScriptedTillEditor {
    pub opening: Option<Money>,
    pub closing: Option<Money>,
    openings: Mutex<Vec<Money>>,
    closings: Mutex<Vec<(String, bool)>>,
}

impl ScriptedTillEditor {
    pub fn new(opening: Option<Money>, closing: Option<Money>) -> Self {
        ScriptedTillEditor {
            opening,
            closing,
            ..Default::default()
        }
    }

    /// Carry-over amounts the opening dialog was shown.
    pub fn openings(&self) -> Vec<Money> {
        self.openings.lock().unwrap().clone()
    }

    /// (till id, previous_day) of every closing dialog run.
    pub fn closings(&self) -> Vec<(String, bool)> {
        self.closings.lock().unwrap().clone()
    }
}

impl TillEditor for ScriptedTillEditor {
    fn run_opening(&self, carry_over: Money) -> Option<Money> {
        self.openings.lock().unwrap().push(carry_over);
        self.opening
    }

    fn run_closing(&self, till: &Till, previous_day: bool) -> Option<Money> {
        self.closings
            .lock()
            .unwrap()
            .push((till.id.clone(), previous_day));
        self.closing
    }
}
