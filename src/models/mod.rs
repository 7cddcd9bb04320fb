pub mod booking;
pub mod catalog;
pub mod hours;
pub mod notification;
pub mod resource;
pub mod slot;
pub mod user;

pub use booking::{Booking, BookingStatus, Payment};
pub use catalog::{Style, Variation};
pub use hours::{DayHours, WeeklyHours};
pub use notification::{Channel, Notification};
pub use resource::{LeaveRecord, Resource, Surcharge};
pub use slot::{Slot, SlotResource};
pub use user::{Caller, GuestContact, Role, User};
