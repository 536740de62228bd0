use super::EmailMessage;
use crate::config::AppConfig;
use crate::models::{service, Booking};

fn price(booking: &Booking, config: &AppConfig) -> String {
    service::format_amount(booking.price_paid_cents, &config.currency_label)
}

pub fn booking_confirmation(
    booking: &Booking,
    service_name: &str,
    config: &AppConfig,
    token: &str,
) -> EmailMessage {
    let base = &config.base_url;
    EmailMessage {
        to: booking.customer_email.clone(),
        subject: format!("Booking confirmed — {service_name} on {}", booking.date),
        body: format!(
            "Hi {name},\n\n\
             Your booking is confirmed.\n\n\
             Service: {service_name}\n\
             Date: {date}\n\
             Time: {time}\n\
             Amount paid: {price}\n\n\
             Add it to your calendar: {base}/calendar/{id}.ics\n\n\
             Need to make a change?\n\
             Cancel: {base}/booking/cancel/{token}\n\
             Reschedule: {base}/booking/reschedule/{token}\n\n\
             See you soon,\n{business}",
            name = booking.customer_name,
            date = booking.date,
            time = booking.time_slot,
            price = price(booking, config),
            id = booking.id,
            business = config.business_name,
        ),
    }
}

pub fn operator_new_booking(booking: &Booking, service_name: &str, config: &AppConfig) -> EmailMessage {
    EmailMessage {
        to: config.operator_email.clone(),
        subject: format!("New paid booking: {} on {}", booking.customer_name, booking.date),
        body: format!(
            "{service_name} — {date} {time}\n\
             Customer: {name} <{email}>{phone}\n\
             Paid: {price}\n\
             Notes: {notes}",
            date = booking.date,
            time = booking.time_slot,
            name = booking.customer_name,
            email = booking.customer_email,
            phone = booking
                .customer_phone
                .as_deref()
                .map(|p| format!(" ({p})"))
                .unwrap_or_default(),
            price = price(booking, config),
            notes = booking.customer_notes.as_deref().unwrap_or("-"),
        ),
    }
}

pub fn booking_cancelled(
    booking: &Booking,
    service_name: &str,
    config: &AppConfig,
    refunded: bool,
) -> EmailMessage {
    let refund_line = if refunded {
        format!(
            "Your payment of {} will be refunded to the original payment method.",
            price(booking, config)
        )
    } else {
        "No payment was taken for this booking.".to_string()
    };
    EmailMessage {
        to: booking.customer_email.clone(),
        subject: format!("Booking cancelled — {service_name} on {}", booking.date),
        body: format!(
            "Hi {name},\n\n\
             Your booking for {service_name} on {date} at {time} has been cancelled.\n\
             {refund_line}\n\n\
             {business}",
            name = booking.customer_name,
            date = booking.date,
            time = booking.time_slot,
            business = config.business_name,
        ),
    }
}

pub fn operator_cancelled(booking: &Booking, service_name: &str, config: &AppConfig) -> EmailMessage {
    EmailMessage {
        to: config.operator_email.clone(),
        subject: format!("Cancelled: {} on {}", booking.customer_name, booking.date),
        body: format!(
            "{service_name} — {date} {time}\n\
             Customer: {name} <{email}>",
            date = booking.date,
            time = booking.time_slot,
            name = booking.customer_name,
            email = booking.customer_email,
        ),
    }
}

pub fn booking_rescheduled(booking: &Booking, service_name: &str, config: &AppConfig) -> EmailMessage {
    EmailMessage {
        to: booking.customer_email.clone(),
        subject: format!("Booking moved — {service_name} now on {}", booking.date),
        body: format!(
            "Hi {name},\n\n\
             Your booking for {service_name} has been moved to {date} at {time}.\n\n\
             {business}",
            name = booking.customer_name,
            date = booking.date,
            time = booking.time_slot,
            business = config.business_name,
        ),
    }
}

pub fn operator_rescheduled(booking: &Booking, service_name: &str, config: &AppConfig) -> EmailMessage {
    EmailMessage {
        to: config.operator_email.clone(),
        subject: format!("Rescheduled: {} to {}", booking.customer_name, booking.date),
        body: format!(
            "{service_name} — now {date} {time}\n\
             Customer: {name} <{email}>",
            date = booking.date,
            time = booking.time_slot,
            name = booking.customer_name,
            email = booking.customer_email,
        ),
    }
}

pub fn reminder_24h(booking: &Booking, service_name: &str, config: &AppConfig) -> EmailMessage {
    EmailMessage {
        to: booking.customer_email.clone(),
        subject: format!("Reminder: {service_name} tomorrow at {}", booking.time_slot),
        body: format!(
            "Hi {name},\n\n\
             A reminder that your {service_name} session is tomorrow, {date} at {time}.{link}\n\n\
             {business}",
            name = booking.customer_name,
            date = booking.date,
            time = booking.time_slot,
            link = booking
                .meeting_link
                .as_deref()
                .map(|l| format!("\nJoin here: {l}"))
                .unwrap_or_default(),
            business = config.business_name,
        ),
    }
}

pub fn reminder_1h(booking: &Booking, service_name: &str, config: &AppConfig) -> EmailMessage {
    EmailMessage {
        to: booking.customer_email.clone(),
        subject: format!("Starting soon: {service_name} at {}", booking.time_slot),
        body: format!(
            "Hi {name},\n\n\
             Your {service_name} session starts at {time} today.\n\
             Join here: {link}\n\n\
             {business}",
            name = booking.customer_name,
            time = booking.time_slot,
            link = booking.meeting_link.as_deref().unwrap_or("-"),
            business = config.business_name,
        ),
    }
}
