//! # Validation Module
//!
//! Input checks run before anything reaches the database or the fiscal
//! printer. The printer rejects malformed input with opaque device errors,
//! so we catch what we can here and give the operator a readable message.
//!
//! ## Usage
//! ```rust
//! use caixa_core::validation::{validate_document, validate_quantity};
//!
//! assert!(validate_quantity(5).is_ok());
//! assert!(validate_document("123.456.789-09").is_ok());
//! ```

use crate::error::ValidationError;
use crate::types::SaleItem;
use crate::MAX_ITEM_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest description most fiscal printers accept on one item line.
pub const MAX_DESCRIPTION_LEN: usize = 200;

/// Validates a quantity.
///
/// ## Rules
/// - Must be positive
/// - Must not exceed [`MAX_ITEM_QUANTITY`]
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a payment amount in cents. Zero payments are rejected.
pub fn validate_payment_amount(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "payment amount".to_string(),
        });
    }
    Ok(())
}

/// Validates an item description.
pub fn validate_description(description: &str) -> ValidationResult<()> {
    let description = description.trim();

    if description.is_empty() {
        return Err(ValidationError::Required {
            field: "description".to_string(),
        });
    }

    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ValidationError::TooLong {
            field: "description".to_string(),
            max: MAX_DESCRIPTION_LEN,
        });
    }

    Ok(())
}

/// Validates a sale item before it is registered.
///
/// The price is not checked: zero-priced items are legal, they are simply
/// not printed on the fiscal coupon.
pub fn validate_sale_item(item: &SaleItem) -> ValidationResult<()> {
    validate_description(&item.description_snapshot)?;
    validate_quantity(item.quantity)?;
    validate_uuid(&item.sale_id)
}

/// Validates a customer fiscal document (CPF or CNPJ).
///
/// Punctuation (`.`, `-`, `/`) and spaces are ignored; what remains must be
/// 11 digits (CPF) or 14 digits (CNPJ). Check digits are not verified.
pub fn validate_document(document: &str) -> ValidationResult<()> {
    let digits: String = document
        .chars()
        .filter(|c| !matches!(c, '.' | '-' | '/' | ' '))
        .collect();

    if digits.is_empty() {
        return Err(ValidationError::Required {
            field: "document".to_string(),
        });
    }

    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "document".to_string(),
            reason: "must contain only digits".to_string(),
        });
    }

    match digits.len() {
        11 | 14 => Ok(()),
        n => Err(ValidationError::InvalidFormat {
            field: "document".to_string(),
            reason: format!("expected 11 (CPF) or 14 (CNPJ) digits, got {}", n),
        }),
    }
}

/// Validates a UUID string.
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::types::SellableKind;

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_ITEM_QUANTITY).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(MAX_ITEM_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_payment_amount() {
        assert!(validate_payment_amount(1).is_ok());
        assert!(validate_payment_amount(0).is_err());
    }

    #[test]
    fn test_validate_document() {
        assert!(validate_document("123.456.789-09").is_ok());
        assert!(validate_document("12.345.678/0001-95").is_ok());
        assert!(validate_document("").is_err());
        assert!(validate_document("1234").is_err());
        assert!(validate_document("123.456.789-0X").is_err());
    }

    #[test]
    fn test_validate_sale_item() {
        let sale_id = uuid::Uuid::new_v4().to_string();
        let item = SaleItem::new(&sale_id, "C1", "Coffee", Money::zero(), 1, SellableKind::Product);
        assert!(validate_sale_item(&item).is_ok());

        let blank = SaleItem::new(&sale_id, "C1", "  ", Money::zero(), 1, SellableKind::Product);
        assert!(matches!(
            validate_sale_item(&blank),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("not-a-uuid").is_err());
    }
}
