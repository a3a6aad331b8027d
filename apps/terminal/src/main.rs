//! # Caixa Terminal
//!
//! Console front end: opens the station's till if needed and rings up one
//! sale through the fiscal printer.
//!
//! ## Startup Sequence
//! 1. Initialize tracing (logging)
//! 2. Load configuration (file given as first argument, or the platform
//!    config dir, then `CAIXA_*` environment overrides)
//! 3. Connect to database & run migrations
//! 4. Make sure a till of the current fiscal day is open
//! 5. Ring up the sale, print its coupon, record the coupon number
//!
//! ## Log Levels
//! - `RUST_LOG=debug` - Show debug messages
//! - `RUST_LOG=caixa_fiscal=trace` - Trace the coupon state machine only
//! - Default: INFO level

mod console;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use caixa_core::{Money, Payment, PaymentMethod, Sale, SaleItem, SellableKind};
use caixa_db::{repository::sale::generate_receipt_number, Database, DbConfig};
use caixa_fiscal::{load_driver, CouponError, FiscalConfig, FiscalPrinterHelper};

use console::{ConsoleOperator, ConsoleTillEditor};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = FiscalConfig::load(config_path)?;
    info!(
        station_id = %config.station.id,
        database = %config.database.path.display(),
        driver = ?config.printer.driver,
        "Configuration loaded"
    );

    let db = Database::new(DbConfig::new(&config.database.path)).await?;
    let driver = load_driver(&config);
    let mut helper = FiscalPrinterHelper::new(
        db.clone(),
        driver,
        Arc::new(ConsoleOperator),
        Arc::new(ConsoleTillEditor),
        config,
    );

    if ensure_till(&helper).await? {
        ring_up_sale(&mut helper).await?;
    }

    db.close().await;
    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,caixa=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Leaves the station with an open till of the current fiscal day.
/// Returns false when the operator did not get there.
async fn ensure_till(helper: &FiscalPrinterHelper) -> Result<bool, Box<dyn Error>> {
    if helper.needs_closing().await? {
        warn!("The till of a previous day is still open, no sale can start");
        return Ok(false);
    }

    let tolerance = helper.config().till.closing_tolerance_hours;
    let current = helper.database().tills().current(helper.station_id()).await?;
    let opened = match current {
        Some(till) if till.needs_closing(Local::now(), tolerance) => {
            helper.close_till(true).await? && helper.open_till().await?
        }
        Some(_) => true,
        None => helper.open_till().await?,
    };

    if !opened {
        info!("No open till, nothing to do");
    }
    Ok(opened)
}

async fn ring_up_sale(helper: &mut FiscalPrinterHelper) -> Result<(), Box<dyn Error>> {
    let sales = helper.database().sales();
    let station_id = helper.station_id().to_string();

    let mut sale = Sale::new(&station_id, generate_receipt_number(&station_id));
    sale.till_id = helper
        .database()
        .tills()
        .current(&station_id)
        .await?
        .map(|till| till.id);

    sales.insert_sale(&sale).await?;
    for item in [
        SaleItem::new(&sale.id, "7891000100103", "Cafe torrado 500g", Money::from_cents(1890), 1, SellableKind::Product),
        SaleItem::new(&sale.id, "7894900011517", "Refrigerante 2L", Money::from_cents(899), 2, SellableKind::Product),
        SaleItem::new(&sale.id, "ENTREGA", "Entrega gratuita", Money::zero(), 1, SellableKind::Service),
    ] {
        sales.add_item(&item).await?;
    }

    // The coupon prints what was stored, not what was typed.
    let items = sales.get_items(&sale.id).await?;
    sale.update_totals(&items);
    sales.update_totals(&sale).await?;

    let payments = vec![Payment::new(&sale.id, PaymentMethod::Cash, sale.total())];
    sale.validate_checkout(&items, &payments)?;
    for payment in &payments {
        sales.add_payment(payment).await?;
    }
    info!(receipt = %sale.receipt_number, total = %sale.total(), "Sale registered");

    let Some(mut coupon) = helper.create_coupon() else {
        warn!("Fiscal printer unavailable, sale left as draft");
        return Ok(());
    };

    let printed: Result<(), CouponError> = (|| {
        coupon.open()?;
        for item in &items {
            coupon.add_item(item)?;
        }
        coupon.totalize(&sale)?;
        coupon.setup_payments(&sale, &payments)?;
        coupon.close(&mut sale)
    })();

    if let Err(e) = printed {
        warn!(error = %e, state = %coupon.state(), "Coupon not printed");
        match recovery_for(&e) {
            Recovery::KeepDraft => {
                warn!(
                    sale_id = %sale.id,
                    "Coupon emitted without a number, sale kept as draft"
                );
            }
            Recovery::Void => {
                if coupon.cancel() {
                    info!("Coupon cancelled on the printer");
                }
                sales.void_sale(&sale.id).await?;
            }
        }
        return Ok(());
    }
    drop(coupon);

    helper.record_coupon(&sale).await?;
    sales.finalize_sale(&sale.id).await?;
    debug!(sale_id = %sale.id, "Sale finalized");

    println!(
        "\nSale {} closed with coupon {}. Total {}",
        sale.receipt_number,
        sale.coupon_id.map(|id| id.to_string()).unwrap_or_else(|| "-".into()),
        sale.total()
    );
    Ok(())
}

/// What becomes of a sale whose coupon did not print cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recovery {
    /// The coupon is on paper but its number is unknown. Voiding the sale
    /// would orphan an emitted fiscal document.
    KeepDraft,
    /// Cancel whatever the coupon opened and void the sale.
    Void,
}

fn recovery_for(error: &CouponError) -> Recovery {
    match error {
        CouponError::MissingCouponId => Recovery::KeepDraft,
        _ => Recovery::Void,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caixa_fiscal::{CouponState, DriverFault};

    #[test]
    fn test_emitted_coupon_without_number_keeps_sale() {
        assert_eq!(recovery_for(&CouponError::MissingCouponId), Recovery::KeepDraft);
    }

    #[test]
    fn test_failed_coupons_void_the_sale() {
        let errors = [
            CouponError::Aborted,
            CouponError::StaleCoupon(DriverFault::PrinterOffline),
            CouponError::RetriesExhausted { attempts: 5 },
            CouponError::InvalidState {
                operation: "close",
                state: CouponState::Totalized,
            },
            CouponError::Driver {
                operation: "close",
                fault: DriverFault::Device("paper jam".into()),
            },
        ];
        for error in &errors {
            assert_eq!(recovery_for(error), Recovery::Void, "{error}");
        }
    }
}
