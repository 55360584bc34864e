use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Every appointment occupies exactly one slot of this length.
pub const SLOT_MINUTES: i64 = 30;

/// Truncates to the start of the enclosing 30-minute slot: minutes 0-29 map to :00,
/// 30-59 to :30, seconds and sub-seconds are dropped.
pub fn normalize(t: DateTime<Utc>) -> DateTime<Utc> {
    let slot_secs = SLOT_MINUTES * 60;
    let secs = t.timestamp();
    let start = secs - secs.rem_euclid(slot_secs);
    DateTime::from_timestamp(start, 0).unwrap_or(t)
}

pub fn slot_end(start: DateTime<Utc>) -> DateTime<Utc> {
    start + Duration::minutes(SLOT_MINUTES)
}

/// Calendar day an appointment is filed under.
pub fn slot_date(start: DateTime<Utc>) -> NaiveDate {
    start.date_naive()
}
