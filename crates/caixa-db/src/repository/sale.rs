//! # Sale Repository
//!
//! Database operations for sales, sale items and payments.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. insert_sale()        Sale { status: Draft }                        │
//! │  2. add_item() ...       SaleItem rows (snapshot of the sellable)      │
//! │  3. add_payment() ...    Payment rows                                  │
//! │  4. fiscal coupon        printed by caixa-fiscal, no DB access         │
//! │  5. set_coupon_id()      the number the printer assigned               │
//! │  6. finalize_sale()      Sale { status: Completed }                    │
//! │                                                                         │
//! │  (optional) void_sale()  Sale { status: Voided }                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use caixa_core::{Payment, Sale, SaleItem};

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(
            r#"
            SELECT
                id, station_id, till_id, receipt_number, status,
                subtotal_cents, discount_cents, total_cents,
                coupon_id, notes,
                created_at, updated_at, completed_at
            FROM sales
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sale)
    }

    /// Inserts a sale.
    pub async fn insert_sale(&self, sale: &Sale) -> DbResult<()> {
        debug!(id = %sale.id, receipt_number = %sale.receipt_number, "Inserting sale");

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, station_id, till_id, receipt_number, status,
                subtotal_cents, discount_cents, total_cents,
                coupon_id, notes,
                created_at, updated_at, completed_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8,
                ?9, ?10,
                ?11, ?12, ?13
            )
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.station_id)
        .bind(&sale.till_id)
        .bind(&sale.receipt_number)
        .bind(sale.status)
        .bind(sale.subtotal_cents)
        .bind(sale.discount_cents)
        .bind(sale.total_cents)
        .bind(sale.coupon_id)
        .bind(&sale.notes)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .bind(sale.completed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Adds an item to a sale.
    ///
    /// ## Snapshot Pattern
    /// Code, description and price are copied onto the item so the sale
    /// (and its fiscal coupon) stays reproducible if the catalogue changes.
    pub async fn add_item(&self, item: &SaleItem) -> DbResult<()> {
        debug!(sale_id = %item.sale_id, item_id = %item.id, "Adding sale item");

        sqlx::query(
            r#"
            INSERT INTO sale_items (
                id, sale_id,
                code_snapshot, description_snapshot, unit_price_cents,
                quantity, sellable_kind, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&item.id)
        .bind(&item.sale_id)
        .bind(&item.code_snapshot)
        .bind(&item.description_snapshot)
        .bind(item.unit_price_cents)
        .bind(item.quantity)
        .bind(item.sellable_kind)
        .bind(item.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets all items for a sale, in the order they were added.
    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(
            r#"
            SELECT
                id, sale_id,
                code_snapshot, description_snapshot, unit_price_cents,
                quantity, sellable_kind, created_at
            FROM sale_items
            WHERE sale_id = ?1
            ORDER BY created_at, rowid
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Writes subtotal, discount and total of a draft sale.
    pub async fn update_totals(&self, sale: &Sale) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE sales SET
                subtotal_cents = ?2,
                discount_cents = ?3,
                total_cents = ?4,
                updated_at = ?5
            WHERE id = ?1 AND status = 'draft'
            "#,
        )
        .bind(&sale.id)
        .bind(sale.subtotal_cents)
        .bind(sale.discount_cents)
        .bind(sale.total_cents)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale (draft)", &sale.id));
        }

        Ok(())
    }

    /// Records the fiscal coupon number printed for a sale.
    ///
    /// Voided sales are refused.
    pub async fn set_coupon_id(&self, sale_id: &str, coupon_id: i64) -> DbResult<()> {
        debug!(sale_id = %sale_id, coupon_id, "Recording fiscal coupon id");

        let result = sqlx::query(
            r#"
            UPDATE sales SET
                coupon_id = ?2,
                updated_at = ?3
            WHERE id = ?1 AND status IN ('draft', 'completed')
            "#,
        )
        .bind(sale_id)
        .bind(coupon_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", sale_id));
        }

        Ok(())
    }

    /// Finalizes a draft sale (marks as completed).
    pub async fn finalize_sale(&self, sale_id: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE sales SET
                status = 'completed',
                completed_at = ?2,
                updated_at = ?2
            WHERE id = ?1 AND status = 'draft'
            "#,
        )
        .bind(sale_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale (draft)", sale_id));
        }

        Ok(())
    }

    /// Voids a sale.
    pub async fn void_sale(&self, sale_id: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE sales SET
                status = 'voided',
                updated_at = ?2
            WHERE id = ?1 AND status IN ('draft', 'completed')
            "#,
        )
        .bind(sale_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", sale_id));
        }

        Ok(())
    }

    /// Records a payment for a sale.
    pub async fn add_payment(&self, payment: &Payment) -> DbResult<()> {
        debug!(sale_id = %payment.sale_id, amount = payment.amount_cents, "Recording payment");

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, sale_id, method,
                amount_cents, tendered_cents, change_cents,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.sale_id)
        .bind(payment.method)
        .bind(payment.amount_cents)
        .bind(payment.tendered_cents)
        .bind(payment.change_cents)
        .bind(payment.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets all payments for a sale.
    pub async fn get_payments(&self, sale_id: &str) -> DbResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT
                id, sale_id, method,
                amount_cents, tendered_cents, change_cents,
                created_at
            FROM payments
            WHERE sale_id = ?1
            ORDER BY created_at, rowid
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }
}

/// Generates a receipt number in format: YYYYMMDD-SS-NNNNNN
///
/// - YYYYMMDD: Date
/// - SS: Station code (last 2 chars of station_id)
/// - NNNNNN: sub-second sequence
pub fn generate_receipt_number(station_id: &str) -> String {
    let now = Utc::now();
    let date_part = now.format("%Y%m%d");

    let tail: Vec<char> = station_id.chars().rev().take(2).collect();
    let station_code: String = if tail.len() < 2 {
        "00".to_string()
    } else {
        tail.into_iter().rev().collect()
    };

    // TODO: replace with a per-station daily counter table
    let seq = now.timestamp_subsec_micros() % 1_000_000;

    format!("{}-{}-{:06}", date_part, station_code, seq)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use caixa_core::{Money, PaymentMethod, SaleStatus, SellableKind};

    async fn db_with_sale() -> (Database, Sale) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let sale = Sale::new("st-01", generate_receipt_number("st-01"));
        db.sales().insert_sale(&sale).await.unwrap();
        (db, sale)
    }

    #[tokio::test]
    async fn test_items_and_payments_round_trip() {
        let (db, sale) = db_with_sale().await;
        let repo = db.sales();

        let coffee = SaleItem::new(&sale.id, "C1", "Coffee", Money::from_cents(450), 2, SellableKind::Product);
        let gift = SaleItem::new(&sale.id, "GC", "Gift card", Money::from_cents(5000), 1, SellableKind::GiftCertificate);
        repo.add_item(&coffee).await.unwrap();
        repo.add_item(&gift).await.unwrap();
        repo.add_payment(&Payment::new(&sale.id, PaymentMethod::Card, Money::from_cents(5900)))
            .await
            .unwrap();

        let items = repo.get_items(&sale.id).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, coffee.id);
        assert_eq!(items[1].sellable_kind, SellableKind::GiftCertificate);

        let payments = repo.get_payments(&sale.id).await.unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].method, PaymentMethod::Card);
    }

    #[tokio::test]
    async fn test_set_coupon_id_and_finalize() {
        let (db, sale) = db_with_sale().await;
        let repo = db.sales();

        repo.set_coupon_id(&sale.id, 1234).await.unwrap();
        repo.finalize_sale(&sale.id).await.unwrap();

        let stored = repo.get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(stored.coupon_id, Some(1234));
        assert_eq!(stored.status, SaleStatus::Completed);
        assert!(stored.completed_at.is_some());

        // A completed sale cannot be finalized twice.
        assert!(repo.finalize_sale(&sale.id).await.is_err());
    }

    #[tokio::test]
    async fn test_update_totals_only_on_drafts() {
        let (db, mut sale) = db_with_sale().await;
        let repo = db.sales();

        let soap = SaleItem::new(&sale.id, "S1", "Soap", Money::from_cents(300), 3, SellableKind::Product);
        repo.add_item(&soap).await.unwrap();
        sale.update_totals(&repo.get_items(&sale.id).await.unwrap());
        repo.update_totals(&sale).await.unwrap();

        let stored = repo.get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(stored.subtotal_cents, 900);
        assert_eq!(stored.total_cents, 900);

        repo.finalize_sale(&sale.id).await.unwrap();
        let err = repo.update_totals(&sale).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_voided_sale_refuses_coupon_id() {
        let (db, sale) = db_with_sale().await;
        let repo = db.sales();

        repo.void_sale(&sale.id).await.unwrap();
        let err = repo.set_coupon_id(&sale.id, 1).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_item_for_unknown_sale_violates_foreign_key() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let orphan = SaleItem::new("missing", "C1", "Coffee", Money::from_cents(450), 1, SellableKind::Product);
        let err = db.sales().add_item(&orphan).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }

    #[test]
    fn test_receipt_number_format() {
        let number = generate_receipt_number("station-07");
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 8);
        assert_eq!(parts[1], "07");
        assert_eq!(parts[2].len(), 6);

        assert!(generate_receipt_number("x").contains("-00-"));
    }
}
