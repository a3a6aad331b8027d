//! # Domain Types
//!
//! Core domain types used throughout Caixa.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Sale       │   │    SaleItem     │   │    Payment      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │◄──│  sale_id (FK)   │   │  sale_id (FK)   │       │
//! │  │  receipt_number │   │  unit_price     │   │  method         │       │
//! │  │  status         │   │  sellable_kind  │   │  amount_cents   │       │
//! │  │  coupon_id ◄────┼───┼── stamped when the fiscal coupon closes     │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐                             │
//! │  │     Person      │   │  SellableKind   │                             │
//! │  │  name, document │   │  Product        │                             │
//! │  │  (identified on │   │  Service        │                             │
//! │  │   the coupon)   │   │  GiftCertificate│  ← never fiscally printed   │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Every entity carries a UUID v4 `id`. The fiscal coupon keys its line
//! table by `SaleItem::id`, never by memory address.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::validation::{validate_payment_amount, validate_sale_item};

// =============================================================================
// Sellable Kind
// =============================================================================

/// What kind of sellable a sale item refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum SellableKind {
    #[default]
    Product,
    Service,
    /// Gift certificates are paid for at the till but are not fiscal
    /// documents; they are printed when redeemed, not when sold.
    GiftCertificate,
}

// =============================================================================
// Sale Status
// =============================================================================

/// The status of a sale transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Sale is in progress (items being added).
    #[default]
    Draft,
    /// Sale has been paid and finalized.
    Completed,
    /// Sale was cancelled.
    Voided,
}

impl std::fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaleStatus::Draft => write!(f, "draft"),
            SaleStatus::Completed => write!(f, "completed"),
            SaleStatus::Voided => write!(f, "voided"),
        }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Check,
    GiftCertificate,
}

impl PaymentMethod {
    /// Name the fiscal printer prints next to the amount.
    pub fn fiscal_name(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Dinheiro",
            PaymentMethod::Card => "Cartao",
            PaymentMethod::Check => "Cheque",
            PaymentMethod::GiftCertificate => "Vale",
        }
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A sale transaction.
///
/// `coupon_id` is the only trace a fiscal coupon leaves on the sale: the
/// number the fiscal printer assigned when the coupon was closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: String,
    pub station_id: String,
    pub till_id: Option<String>,
    pub receipt_number: String,
    pub status: SaleStatus,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub coupon_id: Option<i64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Sale {
    /// Creates a new draft sale for a station.
    pub fn new(station_id: impl Into<String>, receipt_number: impl Into<String>) -> Self {
        let now = Utc::now();
        Sale {
            id: Uuid::new_v4().to_string(),
            station_id: station_id.into(),
            till_id: None,
            receipt_number: receipt_number.into(),
            status: SaleStatus::Draft,
            subtotal_cents: 0,
            discount_cents: 0,
            total_cents: 0,
            coupon_id: None,
            notes: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn discount(&self) -> Money {
        Money::from_cents(self.discount_cents)
    }

    /// Recomputes subtotal and total from the given items.
    pub fn update_totals(&mut self, items: &[SaleItem]) {
        let subtotal: Money = items.iter().map(SaleItem::line_total).sum();
        self.subtotal_cents = subtotal.cents();
        self.total_cents = (subtotal - self.discount()).cents();
        self.updated_at = Utc::now();
    }

    /// Checks that a draft sale can go to the fiscal printer.
    ///
    /// ## Rules
    /// - The sale must still be a draft
    /// - Every item passes [`validate_sale_item`]
    /// - Every payment is positive and together they cover the total
    pub fn validate_checkout(&self, items: &[SaleItem], payments: &[Payment]) -> CoreResult<()> {
        if self.status != SaleStatus::Draft {
            return Err(CoreError::InvalidSaleStatus {
                sale_id: self.id.clone(),
                current_status: self.status.to_string(),
            });
        }

        for item in items {
            validate_sale_item(item)?;
        }

        let mut paid = Money::zero();
        for payment in payments {
            validate_payment_amount(payment.amount_cents)?;
            paid += payment.amount();
        }
        if paid < self.total() {
            return Err(CoreError::InvalidPaymentAmount {
                reason: format!("paid {} of {}", paid, self.total()),
            });
        }

        Ok(())
    }
}

// =============================================================================
// Sale Item
// =============================================================================

/// A line item in a sale.
/// Uses snapshot pattern to freeze sellable data at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    /// Code of the sellable at time of sale (frozen).
    pub code_snapshot: String,
    /// Description printed on the coupon (frozen).
    pub description_snapshot: String,
    /// Unit price in cents at time of sale (frozen).
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub sellable_kind: SellableKind,
    pub created_at: DateTime<Utc>,
}

impl SaleItem {
    /// Creates a new sale item.
    pub fn new(
        sale_id: impl Into<String>,
        code: impl Into<String>,
        description: impl Into<String>,
        unit_price: Money,
        quantity: i64,
        sellable_kind: SellableKind,
    ) -> Self {
        SaleItem {
            id: Uuid::new_v4().to_string(),
            sale_id: sale_id.into(),
            code_snapshot: code.into(),
            description_snapshot: description.into(),
            unit_price_cents: unit_price.cents(),
            quantity,
            sellable_kind,
            created_at: Utc::now(),
        }
    }

    /// Returns the unit price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        self.price().multiply_quantity(self.quantity)
    }

    #[inline]
    pub fn is_gift_certificate(&self) -> bool {
        self.sellable_kind == SellableKind::GiftCertificate
    }

    /// Whether this item goes on the fiscal coupon.
    ///
    /// Gift certificates and free items (free deliveries, price zero or
    /// below) are registered on the sale but never sent to the printer.
    pub fn is_fiscally_printable(&self) -> bool {
        !self.is_gift_certificate() && self.price().is_positive()
    }
}

// =============================================================================
// Payment
// =============================================================================

/// A payment towards a sale.
/// A sale can have multiple payments for split tender scenarios.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Payment {
    pub id: String,
    pub sale_id: String,
    pub method: PaymentMethod,
    pub amount_cents: i64,
    /// For cash: amount customer gave (to calculate change).
    pub tendered_cents: Option<i64>,
    /// For cash: change returned to customer.
    pub change_cents: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Creates a payment of `amount` for a sale.
    pub fn new(sale_id: impl Into<String>, method: PaymentMethod, amount: Money) -> Self {
        Payment {
            id: Uuid::new_v4().to_string(),
            sale_id: sale_id.into(),
            method,
            amount_cents: amount.cents(),
            tendered_cents: None,
            change_cents: None,
            created_at: Utc::now(),
        }
    }

    /// Creates a cash payment, computing the change from what was tendered.
    pub fn cash(sale_id: impl Into<String>, amount: Money, tendered: Money) -> Self {
        let mut payment = Payment::new(sale_id, PaymentMethod::Cash, amount);
        payment.tendered_cents = Some(tendered.cents());
        payment.change_cents = Some((tendered - amount).cents());
        payment
    }

    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Person
// =============================================================================

/// A customer that can be identified on a fiscal coupon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub name: String,
    /// Fiscal document number (CPF or CNPJ), digits only.
    pub document: Option<String>,
    pub address: Option<String>,
}

impl Person {
    pub fn new(name: impl Into<String>) -> Self {
        Person {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            document: None,
            address: None,
        }
    }

    pub fn with_document(mut self, document: impl Into<String>) -> Self {
        self.document = Some(document.into());
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
