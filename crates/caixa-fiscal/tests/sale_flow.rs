//! A complete sale: till, coupon on the virtual printer, persisted coupon
//! number.

use std::sync::{Arc, Mutex};

use caixa_core::{Money, Payment, PaymentMethod, Person, Sale, SaleItem, SellableKind, Till};
use caixa_db::{Database, DbConfig};
use caixa_fiscal::{
    CouponError, CouponState, DriverFault, FiscalConfig, FiscalPrinterHelper, ItemOutcome,
    JournalEntry, Operator, PrinterOp, RemoveOutcome, RetryDecision, TillEditor, VirtualPrinter,
};

#[derive(Default)]
struct Cashier {
    warnings: Mutex<Vec<String>>,
    retries: Mutex<Vec<RetryDecision>>,
}

impl Operator for Cashier {
    fn warning(&self, message: &str, _details: Option<&str>) {
        self.warnings.lock().unwrap().push(message.to_string());
    }

    fn ask_retry(&self, _message: &str) -> RetryDecision {
        self.retries.lock().unwrap().pop().unwrap_or(RetryDecision::Abort)
    }

    fn confirm_close_till(&self, _opened_on: &str) -> bool {
        true
    }
}

struct Drawer;

impl TillEditor for Drawer {
    fn run_opening(&self, _carry_over: Money) -> Option<Money> {
        Some(Money::from_cents(10_000))
    }

    fn run_closing(&self, till: &Till, _previous_day: bool) -> Option<Money> {
        Some(till.initial_cash())
    }
}

async fn setup(printer: &VirtualPrinter, cashier: Arc<Cashier>) -> FiscalPrinterHelper {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let mut config = FiscalConfig::default();
    config.station.id = "station-01".to_string();
    FiscalPrinterHelper::new(db, Box::new(printer.clone()), cashier, Arc::new(Drawer), config)
}

#[tokio::test]
async fn test_complete_sale() {
    let printer = VirtualPrinter::with_coo(99);
    let cashier = Arc::new(Cashier::default());
    let mut helper = setup(&printer, cashier.clone()).await;

    assert!(helper.open_till().await.unwrap());
    assert!(!helper.needs_closing().await.unwrap());

    let mut sale = Sale::new(helper.station_id(), "R-0001");
    let coffee = SaleItem::new(&sale.id, "C1", "Coffee", Money::from_cents(450), 2, SellableKind::Product);
    let cake = SaleItem::new(&sale.id, "K1", "Cake", Money::from_cents(700), 1, SellableKind::Product);
    let gift = SaleItem::new(&sale.id, "GC", "Gift card", Money::from_cents(5000), 1, SellableKind::GiftCertificate);
    let items = [coffee.clone(), gift.clone()];
    sale.update_totals(&items);
    helper.database().sales().insert_sale(&sale).await.unwrap();
    for item in &items {
        helper.database().sales().add_item(item).await.unwrap();
    }
    let payments = vec![Payment::cash(&sale.id, Money::from_cents(900), Money::from_cents(1000))];

    {
        let mut coupon = helper.create_coupon().unwrap();
        coupon.identify_customer(&Person::new("Ana").with_document("12345678909")).unwrap();
        coupon.open().unwrap();
        assert!(matches!(coupon.add_item(&coffee).unwrap(), ItemOutcome::Printed(_)));
        assert_eq!(coupon.add_item(&gift).unwrap(), ItemOutcome::NotPrinted);

        // The customer changed their mind about the cake.
        coupon.add_item(&cake).unwrap();
        assert_eq!(coupon.remove_item(&cake).unwrap(), RemoveOutcome::Removed(1));

        coupon.totalize(&sale).unwrap();
        coupon.setup_payments(&sale, &payments).unwrap();
        coupon.close(&mut sale).unwrap();
        assert_eq!(coupon.state(), CouponState::Closed);
    }

    assert_eq!(sale.coupon_id, Some(100));
    assert!(helper.record_coupon(&sale).await.unwrap());
    let stored = helper.database().sales().get_by_id(&sale.id).await.unwrap().unwrap();
    assert_eq!(stored.coupon_id, Some(100));

    let journal = printer.journal();
    assert!(journal.contains(&JournalEntry::CouponClosed {
        coupon_id: caixa_fiscal::CouponId(100),
        total_cents: 900,
    }));
    assert!(journal
        .iter()
        .any(|entry| matches!(entry, JournalEntry::CustomerIdentified { .. })));
    assert!(cashier.warnings.lock().unwrap().is_empty());

    assert!(helper.close_till(false).await.unwrap());
    assert!(helper.database().tills().current("station-01").await.unwrap().is_none());
}

#[tokio::test]
async fn test_stale_coupon_and_out_of_paper_recovery() {
    let printer = VirtualPrinter::new();
    printer.leave_coupon_open();
    printer.inject(PrinterOp::Open, DriverFault::OutOfPaper);
    let cashier = Arc::new(Cashier::default());
    cashier.retries.lock().unwrap().push(RetryDecision::Retry);
    let mut helper = setup(&printer, cashier.clone()).await;

    {
        let mut coupon = helper.create_coupon().unwrap();
        coupon.open().unwrap();
        assert_eq!(coupon.state(), CouponState::Open);
    }

    // out of paper, resumed; stale coupon cancelled; opened.
    let journal = printer.journal();
    assert_eq!(journal, vec![JournalEntry::CouponCancelled, JournalEntry::CouponOpened]);
    assert!(printer.has_open_coupon());
}

#[tokio::test]
async fn test_printer_failure_on_close_keeps_sale_unstamped() {
    let printer = VirtualPrinter::new();
    printer.inject(PrinterOp::Close, DriverFault::Device("paper jam".into()));
    let cashier = Arc::new(Cashier::default());
    let mut helper = setup(&printer, cashier.clone()).await;

    let mut sale = Sale::new(helper.station_id(), "R-0002");
    let item = SaleItem::new(&sale.id, "S1", "Soap", Money::from_cents(300), 1, SellableKind::Product);
    sale.update_totals(std::slice::from_ref(&item));
    let payments = vec![Payment::new(&sale.id, PaymentMethod::Card, Money::from_cents(300))];

    {
        let mut coupon = helper.create_coupon().unwrap();
        coupon.open().unwrap();
        coupon.add_item(&item).unwrap();
        coupon.totalize(&sale).unwrap();
        coupon.setup_payments(&sale, &payments).unwrap();

        let err = coupon.close(&mut sale).unwrap_err();
        assert!(matches!(err, CouponError::Driver { operation: "close", .. }));

        // The printer recovered: closing again succeeds.
        coupon.close(&mut sale).unwrap();
    }

    assert_eq!(sale.coupon_id, Some(1));
    assert_eq!(
        *cashier.warnings.lock().unwrap(),
        vec!["It's not possible to close the coupon".to_string()]
    );
}

#[tokio::test]
async fn test_aborted_open_keeps_previous_coupon() {
    let printer = VirtualPrinter::new();
    let cashier = Arc::new(Cashier::default());
    let mut helper = setup(&printer, cashier.clone()).await;

    let mut sale = Sale::new(helper.station_id(), "R-0003");
    let item = SaleItem::new(&sale.id, "S1", "Soap", Money::from_cents(300), 1, SellableKind::Product);
    sale.update_totals(std::slice::from_ref(&item));
    let payments = vec![Payment::new(&sale.id, PaymentMethod::Cash, Money::from_cents(300))];
    {
        let mut coupon = helper.create_coupon().unwrap();
        coupon.open().unwrap();
        coupon.add_item(&item).unwrap();
        coupon.totalize(&sale).unwrap();
        coupon.setup_payments(&sale, &payments).unwrap();
        coupon.close(&mut sale).unwrap();
    }

    // Next sale: the printer goes offline and the cashier confirms later.
    printer.inject(PrinterOp::Open, DriverFault::PrinterOffline);
    {
        let mut coupon = helper.create_coupon().unwrap();
        assert_eq!(coupon.open().unwrap_err(), CouponError::Aborted);
        assert!(!coupon.cancel());
    }

    let journal = printer.journal();
    assert!(!journal.contains(&JournalEntry::CouponCancelled));
    assert_eq!(printer.coo(), 1);
}
