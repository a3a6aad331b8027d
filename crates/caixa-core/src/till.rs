//! # Till
//!
//! A till is one cash-register session of a station. Sales are registered
//! against the open till; fiscal coupons are only emitted while one is open.
//!
//! ## Till Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Till::new()          open()                 close()                   │
//! │   ─────────► PENDING ─────────► OPEN ─────────────────► CLOSED          │
//! │                                  │                                      │
//! │                                  │ fiscal day changes                   │
//! │                                  ▼                                      │
//! │                           "needs closing"  (derived, not stored)        │
//! │                                                                         │
//! │  Invariant: at most one OPEN till per station.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Cash Carry-Over
//! The cash counted when a till is closed stays in the drawer, so the next
//! till of the station starts with it. See [`Till::open_after`].

use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TillError;
use crate::money::Money;

// =============================================================================
// Till Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum TillStatus {
    /// Created but not opened yet.
    #[default]
    Pending,
    Open,
    Closed,
}

// =============================================================================
// Till
// =============================================================================

/// A cash-register session for one station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Till {
    pub id: String,
    pub station_id: String,
    pub status: TillStatus,
    pub opening_date: Option<DateTime<Utc>>,
    pub closing_date: Option<DateTime<Utc>>,
    /// Cash in the drawer when the till was opened.
    pub initial_cash_cents: i64,
    /// Cash counted when the till was closed.
    pub final_cash_cents: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Till {
    /// Creates a pending till for a station.
    pub fn new(station_id: impl Into<String>) -> Self {
        Till {
            id: Uuid::new_v4().to_string(),
            station_id: station_id.into(),
            status: TillStatus::Pending,
            opening_date: None,
            closing_date: None,
            initial_cash_cents: 0,
            final_cash_cents: None,
            created_at: Utc::now(),
        }
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == TillStatus::Open
    }

    #[inline]
    pub fn initial_cash(&self) -> Money {
        Money::from_cents(self.initial_cash_cents)
    }

    #[inline]
    pub fn final_cash(&self) -> Option<Money> {
        self.final_cash_cents.map(Money::from_cents)
    }

    /// Opens a pending till with `initial_cash` in the drawer.
    pub fn open(&mut self, now: DateTime<Utc>, initial_cash: Money) -> Result<(), TillError> {
        if self.status != TillStatus::Pending {
            return Err(TillError::NotPending {
                till_id: self.id.clone(),
            });
        }
        if initial_cash.is_negative() {
            return Err(TillError::NegativeCash {
                field: "initial cash".to_string(),
            });
        }

        self.status = TillStatus::Open;
        self.opening_date = Some(now);
        self.initial_cash_cents = initial_cash.cents();
        Ok(())
    }

    /// Opens this till after the station's `previous` till.
    ///
    /// ## Rules
    /// - The previous till must be closed, otherwise
    ///   [`TillError::PreviousTillOpen`]
    /// - The initial cash is the previous till's final cash plus `added`
    ///
    /// ## Example
    /// ```rust
    /// use caixa_core::{Money, Till};
    /// use chrono::Utc;
    ///
    /// let mut yesterday = Till::new("st-01");
    /// yesterday.open(Utc::now(), Money::from_cents(1000)).unwrap();
    /// yesterday.close(Utc::now(), Money::from_cents(2500)).unwrap();
    ///
    /// let mut today = Till::new("st-01");
    /// today.open_after(Some(&yesterday), Utc::now(), Money::from_cents(500)).unwrap();
    /// assert_eq!(today.initial_cash().cents(), 3000);
    /// ```
    pub fn open_after(
        &mut self,
        previous: Option<&Till>,
        now: DateTime<Utc>,
        added: Money,
    ) -> Result<(), TillError> {
        let carried = match previous {
            Some(prev) if prev.status != TillStatus::Closed => {
                return Err(TillError::PreviousTillOpen {
                    station_id: self.station_id.clone(),
                });
            }
            Some(prev) => prev.final_cash().unwrap_or_default(),
            None => Money::zero(),
        };
        self.open(now, carried + added)
    }

    /// Closes an open till, recording the cash counted in the drawer.
    pub fn close(&mut self, now: DateTime<Utc>, final_cash: Money) -> Result<(), TillError> {
        if self.status != TillStatus::Open {
            return Err(TillError::NotOpen {
                till_id: self.id.clone(),
            });
        }
        if final_cash.is_negative() {
            return Err(TillError::NegativeCash {
                field: "final cash".to_string(),
            });
        }

        self.status = TillStatus::Closed;
        self.closing_date = Some(now);
        self.final_cash_cents = Some(final_cash.cents());
        Ok(())
    }

    /// Whether this till spans a fiscal-day boundary and must be closed
    /// before new fiscal operations start.
    ///
    /// ## Rules
    /// ```text
    /// not open ─────────────────────────────────────────► false
    /// opened today (in `now`'s time zone) ──────────────► false
    /// opened yesterday and now.hour < tolerance_hours ──► false
    /// otherwise ────────────────────────────────────────► true
    /// ```
    pub fn needs_closing<Tz: TimeZone>(&self, now: DateTime<Tz>, tolerance_hours: u32) -> bool {
        if !self.is_open() {
            return false;
        }
        let Some(opened_at) = self.opening_date else {
            return false;
        };

        let opened_on = opened_at.with_timezone(&now.timezone()).date_naive();
        let today = now.date_naive();
        if opened_on >= today {
            return false;
        }

        let yesterday = today - Duration::days(1);
        !(opened_on == yesterday && now.hour() < tolerance_hours)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn open_till(opened: DateTime<Utc>) -> Till {
        let mut till = Till::new("st-01");
        till.open(opened, Money::from_cents(1000)).unwrap();
        till
    }

    #[test]
    fn test_open_and_close() {
        let mut till = open_till(at(2024, 3, 1, 9));
        assert!(till.is_open());
        assert_eq!(till.initial_cash().cents(), 1000);

        till.close(at(2024, 3, 1, 18), Money::from_cents(4200)).unwrap();
        assert_eq!(till.status, TillStatus::Closed);
        assert_eq!(till.final_cash(), Some(Money::from_cents(4200)));
    }

    #[test]
    fn test_illegal_transitions() {
        let mut till = open_till(at(2024, 3, 1, 9));
        assert!(matches!(
            till.open(at(2024, 3, 1, 10), Money::zero()),
            Err(TillError::NotPending { .. })
        ));

        let mut pending = Till::new("st-01");
        assert!(matches!(
            pending.close(at(2024, 3, 1, 10), Money::zero()),
            Err(TillError::NotOpen { .. })
        ));
        assert!(matches!(
            pending.open(at(2024, 3, 1, 10), Money::from_cents(-1)),
            Err(TillError::NegativeCash { .. })
        ));
    }

    #[test]
    fn test_open_after_refuses_unclosed_previous() {
        let previous = open_till(at(2024, 3, 1, 9));
        let mut next = Till::new("st-01");
        let err = next
            .open_after(Some(&previous), at(2024, 3, 2, 9), Money::zero())
            .unwrap_err();
        assert_eq!(
            err,
            TillError::PreviousTillOpen {
                station_id: "st-01".to_string()
            }
        );
        assert_eq!(next.status, TillStatus::Pending);
    }

    #[test]
    fn test_open_after_carries_cash_over() {
        let mut previous = open_till(at(2024, 3, 1, 9));
        previous.close(at(2024, 3, 1, 18), Money::from_cents(2500)).unwrap();

        let mut next = Till::new("st-01");
        next.open_after(Some(&previous), at(2024, 3, 2, 9), Money::from_cents(100))
            .unwrap();
        assert_eq!(next.initial_cash().cents(), 2600);

        let mut first = Till::new("st-02");
        first.open_after(None, at(2024, 3, 2, 9), Money::from_cents(100)).unwrap();
        assert_eq!(first.initial_cash().cents(), 100);
    }

    #[test]
    fn test_needs_closing_same_day() {
        let till = open_till(at(2024, 3, 1, 9));
        assert!(!till.needs_closing(at(2024, 3, 1, 23), 0));
    }

    #[test]
    fn test_needs_closing_next_day() {
        let till = open_till(at(2024, 3, 1, 9));
        assert!(till.needs_closing(at(2024, 3, 2, 8), 0));
        assert!(till.needs_closing(at(2024, 3, 5, 8), 6));
    }

    #[test]
    fn test_needs_closing_tolerance() {
        let till = open_till(at(2024, 3, 1, 9));
        // Still within the after-midnight tolerance.
        assert!(!till.needs_closing(at(2024, 3, 2, 1), 2));
        assert!(till.needs_closing(at(2024, 3, 2, 2), 2));
    }

    #[test]
    fn test_closed_till_never_needs_closing() {
        let mut till = open_till(at(2024, 3, 1, 9));
        till.close(at(2024, 3, 1, 18), Money::zero()).unwrap();
        assert!(!till.needs_closing(at(2024, 3, 9, 9), 0));
    }
}
