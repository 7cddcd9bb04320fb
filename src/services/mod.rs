pub mod accounts;
pub mod availability;
pub mod calendar;
pub mod duration;
pub mod hours;
pub mod messaging;
pub mod notifications;
pub mod overlap;
pub mod payments;
pub mod reminders;
pub mod reservation;
