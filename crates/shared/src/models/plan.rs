use serde::Serialize;
use time::{Date, Month, OffsetDateTime};
use uuid::Uuid;

/// A recurring shared expense owned by one user and split among its members.
///
/// `amount`, `fee_basis_points`, and `payment_day` are fixed at creation;
/// only `name` may change afterwards.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Plan {
    pub uuid: Uuid,
    pub name: String,
    /// Total cost in minor currency units (cents).
    pub amount: i64,
    /// Service fee in basis points (1/100 of a percent; 1000 = 10.00%).
    pub fee_basis_points: i32,
    /// 1-indexed day in month payments are done.
    pub payment_day: i16,
    pub owner_uuid: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Plan {
    pub fn new(
        name: impl Into<String>,
        amount: i64,
        fee_basis_points: i32,
        payment_day: i16,
        owner_uuid: Uuid,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            amount,
            fee_basis_points,
            payment_day,
            owner_uuid,
            created_at: now,
            updated_at: now,
        }
    }

    /// Amount owed per person, given the number of non-owner members.
    ///
    /// The owner always pays alongside the members, so the pool is divided by
    /// `member_count + 1`. The fee is applied on top and the result rounds
    /// half-up to the nearest minor unit.
    pub fn payment_amount(&self, member_count: u32) -> i64 {
        let payers = i64::from(member_count) + 1;
        let numer = self.amount * (10_000 + i64::from(self.fee_basis_points));
        let denom = payers * 10_000;

        (numer + denom / 2) / denom
    }

    /// The date the next payment will be attempted.
    ///
    /// Anchors `now` to `payment_day`, clamped to the length of the month so
    /// a day-30 plan bills on February 28th rather than overflowing into
    /// March. If the anchored date has already passed, advances one calendar
    /// month (clamping again).
    pub fn next_payment_date(&self, now: OffsetDateTime) -> OffsetDateTime {
        let candidate = now.replace_date(anchored(now.year(), now.month(), self.payment_day));

        if candidate < now {
            let (year, month) = match now.month() {
                Month::December => (now.year() + 1, Month::January),
                month => (now.year(), month.next()),
            };

            return now.replace_date(anchored(year, month, self.payment_day));
        }

        candidate
    }
}

/// Build a date with the day-of-month clamped into the month's valid range.
#[allow(clippy::expect_used)]
fn anchored(year: i32, month: Month, day: i16) -> Date {
    let clamped = day.clamp(1, i16::from(month.length(year))) as u8;

    Date::from_calendar_date(year, month, clamped).expect("day is clamped to the month length")
}
