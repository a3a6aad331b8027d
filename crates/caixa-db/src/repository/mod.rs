//! # Repository Module
//!
//! Data access per entity.
//!
//! ## Available Repositories
//!
//! - [`till::TillRepository`] - Cash-register sessions
//! - [`sale::SaleRepository`] - Sales, sale items, payments, coupon ids
//!
//! ## Transactions
//! Reads that only inform the operator go straight to the pool. Writes that
//! belong to a till workflow take the caller's [`crate::DbTransaction`], so
//! the workflow decides whether they are committed.

pub mod sale;
pub mod till;
