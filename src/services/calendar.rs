use chrono::Duration;

use crate::models::{Booking, BookingStatus};

pub fn generate_ics(booking: &Booking, duration_minutes: u32, salon_name: &str) -> String {
    let start = booking.scheduled_at();
    let dtstart = start.format("%Y%m%dT%H%M%S").to_string();
    let dtend = (start + Duration::minutes(duration_minutes as i64))
        .format("%Y%m%dT%H%M%S")
        .to_string();
    let dtstamp = booking.created_at.format("%Y%m%dT%H%M%SZ").to_string();
    let uid = format!("{}@salonbook", booking.id);

    let summary = format!("Appointment at {salon_name}");
    let status = match booking.status {
        BookingStatus::Cancelled => "CANCELLED",
        _ => "CONFIRMED",
    };

    format!(
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//Salonbook//Bookings//EN\r\n\
         BEGIN:VEVENT\r\n\
         UID:{uid}\r\n\
         DTSTAMP:{dtstamp}\r\n\
         DTSTART:{dtstart}\r\n\
         DTEND:{dtend}\r\n\
         SUMMARY:{summary}\r\n\
         STATUS:{status}\r\n\
         DESCRIPTION:Booking reference {id}\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR\r\n",
        id = booking.id,
    )
}
