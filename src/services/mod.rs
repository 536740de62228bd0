pub mod availability;
pub mod calendar;
pub mod lifecycle;
pub mod notify;
pub mod payments;
pub mod refund;
pub mod reminders;
pub mod token;
