pub mod blocked_date;
pub mod booking;
pub mod service;

pub use blocked_date::BlockedDate;
pub use booking::{Actor, Booking, BookingStatus};
pub use service::Service;
