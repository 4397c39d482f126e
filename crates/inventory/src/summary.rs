//! Read-side aggregation over accepted movements.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockmaster_core::{DomainError, DomainResult};

use crate::movement::{Movement, MovementKind};

/// Per-day movement totals (UTC calendar day).
///
/// Quantity totals saturate at `i64::MAX`; a single day can legitimately move more
/// units than fit in the stock counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementSummary {
    pub date: NaiveDate,
    pub movement_count: u64,
    pub total_inbound_quantity: i64,
    pub total_outbound_quantity: i64,
    pub adjustment_count: u64,
}

impl MovementSummary {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            movement_count: 0,
            total_inbound_quantity: 0,
            total_outbound_quantity: 0,
            adjustment_count: 0,
        }
    }

    /// Aggregate the movements whose `occurred_at` falls on `date`; others are ignored.
    pub fn from_movements<'a>(
        date: NaiveDate,
        movements: impl IntoIterator<Item = &'a Movement>,
    ) -> Self {
        let mut summary = Self::empty(date);
        for m in movements {
            if m.occurred_at.date_naive() == date {
                summary.record(m);
            }
        }
        summary
    }

    fn record(&mut self, movement: &Movement) {
        self.movement_count += 1;
        match movement.kind {
            MovementKind::Inbound => {
                self.total_inbound_quantity =
                    self.total_inbound_quantity.saturating_add(movement.quantity)
            }
            MovementKind::Outbound => {
                self.total_outbound_quantity =
                    self.total_outbound_quantity.saturating_add(movement.quantity)
            }
            MovementKind::Adjustment => self.adjustment_count += 1,
        }
    }
}

/// Half-open UTC range `[start, end)` covering `date`.
pub fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_time(chrono::NaiveTime::MIN).and_utc();
    (start, start + chrono::Duration::days(1))
}

/// Half-open UTC range `[start, end)` covering a calendar month.
pub fn month_bounds(year: i32, month: u32) -> DomainResult<(DateTime<Utc>, DateTime<Utc>)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| DomainError::validation(format!("invalid month {year}-{month:02}")))?;
    let next = if first.month() == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| DomainError::validation(format!("month {year}-{month:02} out of range")))?;

    Ok((day_bounds(first).0, day_bounds(next).0))
}
