//! # Fiscal Printer Helper
//!
//! Guards the till around fiscal operations and hands out coupons.
//!
//! ## Till Workflows
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  open_till()                                                            │
//! │    current till? ──yes──► warn "already opened" ───────────► false     │
//! │        │ no                                                             │
//! │        ▼                                                                │
//! │    BEGIN ─► carry-over from last closed till ─► opening dialog         │
//! │        cancelled / TillError ──► ROLLBACK ─────────────────► false     │
//! │        confirmed ─► INSERT till ─► COMMIT ─────────────────► true      │
//! │                                                                         │
//! │  close_till(previous_day)                                               │
//! │    no open till ────────────────────────────────► Err(NoOpenTill)      │
//! │    BEGIN ─► closing dialog                                              │
//! │        cancelled ─► ROLLBACK ──────────────────────────────► false     │
//! │        confirmed ─► UPDATE till ─► COMMIT ─────────────────► true      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::{Local, Utc};
use tracing::{debug, error, info, warn};

use crate::config::FiscalConfig;
use crate::coupon::FiscalCoupon;
use crate::driver::FiscalDriver;
use crate::error::{FiscalError, FiscalResult};
use crate::operator::{Operator, TillEditor};
use caixa_core::{Money, Sale, Till};
use caixa_db::{finish_transaction, Database, DbTransaction};

const TILL_ALREADY_OPEN: &str =
    "You already have a till operation opened. Close the current Till and open another one.";

/// Entry point of the fiscal layer for one station.
pub struct FiscalPrinterHelper {
    db: Database,
    station_id: String,
    driver: Box<dyn FiscalDriver>,
    operator: Arc<dyn Operator>,
    till_editor: Arc<dyn TillEditor>,
    config: FiscalConfig,
}

impl FiscalPrinterHelper {
    pub fn new(
        db: Database,
        driver: Box<dyn FiscalDriver>,
        operator: Arc<dyn Operator>,
        till_editor: Arc<dyn TillEditor>,
        config: FiscalConfig,
    ) -> Self {
        FiscalPrinterHelper {
            db,
            station_id: config.station.id.clone(),
            driver,
            operator,
            till_editor,
            config,
        }
    }

    pub fn station_id(&self) -> &str {
        &self.station_id
    }

    pub fn config(&self) -> &FiscalConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    // =========================================================================
    // Till
    // =========================================================================

    /// Opens a till for the station.
    ///
    /// Returns `Ok(false)` when a till is already open, when the operator
    /// cancels the opening dialog, or when the till rules refuse it.
    pub async fn open_till(&self) -> FiscalResult<bool> {
        let tills = self.db.tills();
        if let Some(current) = tills.current(&self.station_id).await? {
            info!(till_id = %current.id, "Till already open, not opening another");
            self.operator.warning(TILL_ALREADY_OPEN, None);
            return Ok(false);
        }

        let mut tx = self.db.begin().await?;
        match self.open_till_in(&mut tx).await {
            Ok(Some(till)) => {
                finish_transaction(tx, true).await?;
                info!(
                    till_id = %till.id,
                    station_id = %self.station_id,
                    initial_cash = %till.initial_cash(),
                    "Till opened"
                );
                Ok(true)
            }
            Ok(None) => Ok(finish_transaction(tx, false).await?),
            Err(e) => {
                rollback(tx).await;
                Err(e)
            }
        }
    }

    async fn open_till_in(&self, tx: &mut DbTransaction) -> FiscalResult<Option<Till>> {
        let tills = self.db.tills();
        let previous = tills.last_closed_in(tx, &self.station_id).await?;
        let carry_over = previous
            .as_ref()
            .and_then(Till::final_cash)
            .unwrap_or_default();

        let Some(added) = self.till_editor.run_opening(carry_over) else {
            debug!("Till opening cancelled by the operator");
            return Ok(None);
        };

        let mut till = Till::new(&self.station_id);
        if let Err(e) = till.open_after(previous.as_ref(), Utc::now(), added) {
            warn!(error = %e, "Till opening refused");
            self.operator.warning(&e.to_string(), None);
            return Ok(None);
        }

        tills.insert(tx, &till).await?;
        Ok(Some(till))
    }

    /// Closes the station's last opened till.
    ///
    /// `previous_day` tells the closing dialog the till belongs to an
    /// earlier fiscal day. Calling this without an open till is a caller
    /// error, reported as [`FiscalError::NoOpenTill`].
    pub async fn close_till(&self, previous_day: bool) -> FiscalResult<bool> {
        let tills = self.db.tills();
        let Some(mut till) = tills
            .last_opened(&self.station_id)
            .await?
            .filter(Till::is_open)
        else {
            return Err(FiscalError::NoOpenTill {
                station_id: self.station_id.clone(),
            });
        };

        let mut tx = self.db.begin().await?;
        let Some(final_cash) = self.till_editor.run_closing(&till, previous_day) else {
            debug!(till_id = %till.id, "Till closing cancelled by the operator");
            return Ok(finish_transaction(tx, false).await?);
        };

        if let Err(e) = till.close(Utc::now(), final_cash) {
            warn!(till_id = %till.id, error = %e, "Till closing refused");
            self.operator.warning(&e.to_string(), None);
            return Ok(finish_transaction(tx, false).await?);
        }

        if let Err(e) = tills.update(&mut tx, &till).await {
            rollback(tx).await;
            return Err(e.into());
        }
        finish_transaction(tx, true).await?;

        info!(
            till_id = %till.id,
            final_cash = %final_cash,
            previous_day,
            "Till closed"
        );
        Ok(true)
    }

    /// True when the last opened till belongs to an earlier fiscal day and
    /// the operator chose not to close it now. Callers must not start new
    /// fiscal operations while this holds.
    pub async fn needs_closing(&self) -> FiscalResult<bool> {
        let Some(till) = self.db.tills().last_opened(&self.station_id).await? else {
            return Ok(false);
        };

        let tolerance = self.config.till.closing_tolerance_hours;
        if !till.needs_closing(Local::now(), tolerance) {
            return Ok(false);
        }

        let opened_on = till
            .opening_date
            .map(|date| date.with_timezone(&Local).date_naive().to_string())
            .unwrap_or_default();
        let close_now = self.operator.confirm_close_till(&opened_on);
        debug!(till_id = %till.id, %opened_on, close_now, "Till spans a fiscal day");
        Ok(!close_now)
    }

    /// Cash the station's last closed till left in the drawer.
    pub async fn carry_over(&self) -> FiscalResult<Money> {
        let previous = self.db.tills().last_closed(&self.station_id).await?;
        Ok(previous.and_then(|till| till.final_cash()).unwrap_or_default())
    }

    // =========================================================================
    // Coupons
    // =========================================================================

    /// Creates a coupon bound to this station's printer.
    ///
    /// Returns `None`, after warning the operator, when the printer refuses
    /// to start a coupon session.
    pub fn create_coupon(&mut self) -> Option<FiscalCoupon<'_>> {
        if let Err(fault) = self.driver.coupon_created() {
            warn!(%fault, "Fiscal printer unavailable");
            self.operator.warning(&fault.to_string(), None);
            return None;
        }

        Some(FiscalCoupon::new(
            self.driver.as_mut(),
            self.operator.clone(),
            self.config.retry_policy(),
        ))
    }

    /// Persists the coupon number a closed coupon stamped on `sale`.
    ///
    /// Returns `Ok(false)` if the sale carries no coupon number.
    pub async fn record_coupon(&self, sale: &Sale) -> FiscalResult<bool> {
        let Some(coupon_id) = sale.coupon_id else {
            return Ok(false);
        };
        self.db.sales().set_coupon_id(&sale.id, coupon_id).await?;
        info!(sale_id = %sale.id, coupon_id, "Coupon number recorded");
        Ok(true)
    }
}

async fn rollback(tx: DbTransaction) {
    if let Err(e) = finish_transaction(tx, false).await {
        error!(error = %e, "Failed to roll back till transaction");
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DriverFault;
    use crate::test_support::{Call, RecordingOperator, ScriptedDriver, ScriptedTillEditor};
    use caixa_core::TillStatus;
    use caixa_db::DbConfig;
    use chrono::Duration;

    const STATION: &str = "st-01";

    struct Fixture {
        helper: FiscalPrinterHelper,
        operator: Arc<RecordingOperator>,
        editor: Arc<ScriptedTillEditor>,
    }

    async fn fixture(editor: ScriptedTillEditor, operator: RecordingOperator) -> Fixture {
        fixture_with_driver(editor, operator, ScriptedDriver::default()).await
    }

    async fn fixture_with_driver(
        editor: ScriptedTillEditor,
        operator: RecordingOperator,
        driver: ScriptedDriver,
    ) -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let operator = Arc::new(operator);
        let editor = Arc::new(editor);
        let mut config = FiscalConfig::default();
        config.station.id = STATION.to_string();

        let helper = FiscalPrinterHelper::new(
            db,
            Box::new(driver),
            operator.clone(),
            editor.clone(),
            config,
        );
        Fixture {
            helper,
            operator,
            editor,
        }
    }

    async fn insert_till(db: &Database, till: &Till) {
        let mut tx = db.begin().await.unwrap();
        db.tills().insert(&mut tx, till).await.unwrap();
        finish_transaction(tx, true).await.unwrap();
    }

    #[tokio::test]
    async fn test_open_till() {
        let f = fixture(
            ScriptedTillEditor::new(Some(Money::from_cents(2000)), None),
            RecordingOperator::default(),
        )
        .await;

        assert!(f.helper.open_till().await.unwrap());

        let current = f.helper.database().tills().current(STATION).await.unwrap().unwrap();
        assert_eq!(current.initial_cash_cents, 2000);
        assert_eq!(f.editor.openings(), vec![Money::zero()]);
    }

    #[tokio::test]
    async fn test_open_till_when_one_is_open_warns() {
        let f = fixture(
            ScriptedTillEditor::new(Some(Money::zero()), None),
            RecordingOperator::default(),
        )
        .await;
        let mut open = Till::new(STATION);
        open.open(Utc::now(), Money::zero()).unwrap();
        insert_till(f.helper.database(), &open).await;

        assert!(!f.helper.open_till().await.unwrap());

        assert_eq!(f.operator.warnings()[0].0, TILL_ALREADY_OPEN);
        assert!(f.editor.openings().is_empty());
        assert_eq!(f.helper.database().tills().count_for_station(STATION).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_opening_rolls_back() {
        let f = fixture(ScriptedTillEditor::new(None, None), RecordingOperator::default()).await;

        assert!(!f.helper.open_till().await.unwrap());
        assert_eq!(f.helper.database().tills().count_for_station(STATION).await.unwrap(), 0);
        assert!(f.operator.warnings().is_empty());
    }

    #[tokio::test]
    async fn test_negative_opening_cash_is_refused() {
        let f = fixture(
            ScriptedTillEditor::new(Some(Money::from_cents(-500)), None),
            RecordingOperator::default(),
        )
        .await;

        assert!(!f.helper.open_till().await.unwrap());
        assert_eq!(f.operator.warnings().len(), 1);
        assert_eq!(f.helper.database().tills().count_for_station(STATION).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_open_then_close_carries_cash_over() {
        let f = fixture(
            ScriptedTillEditor::new(Some(Money::from_cents(1000)), Some(Money::from_cents(3500))),
            RecordingOperator::default(),
        )
        .await;

        assert!(f.helper.open_till().await.unwrap());
        assert!(f.helper.close_till(false).await.unwrap());
        assert_eq!(f.helper.carry_over().await.unwrap(), Money::from_cents(3500));

        assert!(f.helper.open_till().await.unwrap());
        let current = f.helper.database().tills().current(STATION).await.unwrap().unwrap();
        assert_eq!(current.initial_cash_cents, 4500);
        assert_eq!(
            f.editor.openings(),
            vec![Money::zero(), Money::from_cents(3500)]
        );
        assert_eq!(f.editor.closings().len(), 1);
    }

    #[tokio::test]
    async fn test_close_till_without_open_till() {
        let f = fixture(ScriptedTillEditor::default(), RecordingOperator::default()).await;

        let err = f.helper.close_till(false).await.unwrap_err();
        assert!(matches!(err, FiscalError::NoOpenTill { .. }));
        assert!(f.editor.closings().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_closing_keeps_till_open() {
        let f = fixture(
            ScriptedTillEditor::new(Some(Money::zero()), None),
            RecordingOperator::default(),
        )
        .await;
        f.helper.open_till().await.unwrap();

        assert!(!f.helper.close_till(true).await.unwrap());

        let current = f.helper.database().tills().current(STATION).await.unwrap();
        assert_eq!(current.map(|t| t.status), Some(TillStatus::Open));
        assert!(f.editor.closings()[0].1);
    }

    #[tokio::test]
    async fn test_needs_closing() {
        let mut operator = RecordingOperator::default();
        operator.close_till_answer = false;
        let f = fixture(ScriptedTillEditor::default(), operator).await;

        // No till at all.
        assert!(!f.helper.needs_closing().await.unwrap());

        let mut stale = Till::new(STATION);
        stale.open(Utc::now() - Duration::days(3), Money::zero()).unwrap();
        insert_till(f.helper.database(), &stale).await;

        assert!(f.helper.needs_closing().await.unwrap());
        assert_eq!(f.operator.close_till_prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_needs_closing_when_operator_closes_now() {
        let mut operator = RecordingOperator::default();
        operator.close_till_answer = true;
        let f = fixture(ScriptedTillEditor::default(), operator).await;

        let mut stale = Till::new(STATION);
        stale.open(Utc::now() - Duration::days(3), Money::zero()).unwrap();
        insert_till(f.helper.database(), &stale).await;

        assert!(!f.helper.needs_closing().await.unwrap());
    }

    #[tokio::test]
    async fn test_todays_till_does_not_need_closing() {
        let f = fixture(
            ScriptedTillEditor::new(Some(Money::zero()), None),
            RecordingOperator::default(),
        )
        .await;
        f.helper.open_till().await.unwrap();

        assert!(!f.helper.needs_closing().await.unwrap());
        assert!(f.operator.close_till_prompts().is_empty());
    }

    #[tokio::test]
    async fn test_create_coupon() {
        let mut f = fixture(ScriptedTillEditor::default(), RecordingOperator::default()).await;
        let coupon = f.helper.create_coupon().unwrap();
        assert!(coupon.is_empty());
    }

    #[tokio::test]
    async fn test_create_coupon_with_unavailable_printer() {
        let mut driver = ScriptedDriver::default();
        driver.fail(Call::CouponCreated, DriverFault::Device("no ECF".into()));
        let mut f = fixture_with_driver(
            ScriptedTillEditor::default(),
            RecordingOperator::default(),
            driver,
        )
        .await;

        assert!(f.helper.create_coupon().is_none());
        assert_eq!(f.operator.warnings()[0].0, "Device error: no ECF");
        assert!(f.helper.create_coupon().is_some());
    }

    #[tokio::test]
    async fn test_record_coupon() {
        let f = fixture(ScriptedTillEditor::default(), RecordingOperator::default()).await;
        let mut sale = Sale::new(STATION, "R-1");
        f.helper.database().sales().insert_sale(&sale).await.unwrap();

        assert!(!f.helper.record_coupon(&sale).await.unwrap());

        sale.coupon_id = Some(77);
        assert!(f.helper.record_coupon(&sale).await.unwrap());
        let stored = f.helper.database().sales().get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(stored.coupon_id, Some(77));
    }
}
