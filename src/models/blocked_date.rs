use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// An admin-declared date that cannot be booked. Independent of bookings: a
/// date can be blocked while an existing booking still sits on it, and the
/// booking survives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockedDate {
    pub date: NaiveDate,
    pub reason: Option<String>,
}
