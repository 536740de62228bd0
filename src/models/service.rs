use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A bookable offering. Bookings snapshot `price_cents` at creation time, so
/// editing a service never rewrites historic bookings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub name: String,
    pub price_cents: i64,
    pub duration_label: String,
    pub active: bool,
    pub featured: bool,
    pub created_at: NaiveDateTime,
}

/// Render a cents amount with a currency label, e.g. "RM450" or "RM450.50".
pub fn format_amount(cents: i64, currency_label: &str) -> String {
    if cents % 100 == 0 {
        format!("{currency_label}{}", cents / 100)
    } else {
        format!("{currency_label}{}.{:02}", cents / 100, cents % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_whole_amount() {
        assert_eq!(format_amount(45000, "RM"), "RM450");
    }

    #[test]
    fn test_format_fractional_amount() {
        assert_eq!(format_amount(45050, "RM"), "RM450.50");
        assert_eq!(format_amount(45005, "RM"), "RM450.05");
    }
}
