use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use rusqlite::Connection;

use crate::db::queries;
use crate::models::hours::format_minutes;
use crate::models::resource::is_on_leave;
use crate::models::{Booking, LeaveRecord, Resource, Slot, SlotResource, WeeklyHours};
use crate::services::duration::{PricingDurationIndex, DEFAULT_DURATION_MINUTES};
use crate::services::hours::effective_window;
use crate::services::overlap::overlaps;

pub const SLOT_STEP_MINUTES: u32 = 60;
pub const MAX_RANGE_DAYS: i64 = 62;

#[derive(Debug, Clone, Default)]
pub struct AvailabilityFilters {
    pub style_id: Option<String>,
    pub variation_id: Option<String>,
    pub resource_id: Option<String>,
    pub duration_minutes: Option<u32>,
    pub exclude_booking_id: Option<String>,
}

/// Everything one availability query reads, loaded once so the whole computation
/// sees a single consistent view of hours, staff and bookings.
#[derive(Debug, Clone, Default)]
pub struct AvailabilitySnapshot {
    pub resources: Vec<Resource>,
    pub business_hours: WeeklyHours,
    pub leave: Vec<LeaveRecord>,
    pub bookings: Vec<Booking>,
    pub index: PricingDurationIndex,
}

impl AvailabilitySnapshot {
    pub fn load(conn: &Connection, start: NaiveDate, end: NaiveDate) -> anyhow::Result<Self> {
        Ok(Self {
            resources: queries::list_resources(conn)?,
            business_hours: queries::get_business_hours(conn)?,
            leave: queries::leave_in_range(conn, start, end)?,
            bookings: queries::live_bookings_in_range(conn, start, end)?,
            index: PricingDurationIndex::load(conn)?,
        })
    }

    fn booking_interval(&self, booking: &Booking) -> (u32, u32) {
        let start = booking.start_minute();
        let minutes = self
            .index
            .duration_for(&booking.style_id, &booking.variation_id);
        (start, start.saturating_add(minutes))
    }
}

impl AvailabilityFilters {
    /// Style used for the capability filter: the explicit one, else the variation's.
    fn effective_style<'a>(&'a self, index: &'a PricingDurationIndex) -> Option<&'a str> {
        self.style_id.as_deref().or_else(|| {
            self.variation_id
                .as_deref()
                .and_then(|v| index.style_of(v))
        })
    }

    pub fn requested_duration(&self, index: &PricingDurationIndex) -> u32 {
        if let Some(minutes) = self.duration_minutes.filter(|m| *m > 0) {
            return minutes;
        }
        match (self.effective_style(index), self.variation_id.as_deref()) {
            (Some(style), Some(variation)) => index.duration_for(style, variation),
            _ => DEFAULT_DURATION_MINUTES,
        }
    }
}

/// Bookable hourly slots for one day. A slot is listed only when at least one
/// matching stylist is free after unassigned bookings take their share.
pub fn slots_for_day(
    snapshot: &AvailabilitySnapshot,
    day: NaiveDate,
    filters: &AvailabilityFilters,
) -> Vec<Slot> {
    let style = filters.effective_style(&snapshot.index);

    let candidates: Vec<Resource> = snapshot
        .resources
        .iter()
        .filter(|r| r.active)
        .filter(|r| style.map_or(true, |s| r.is_capable_of(s)))
        .filter(|r| {
            filters
                .resource_id
                .as_deref()
                .map_or(true, |id| r.id == id)
        })
        .filter(|r| !is_on_leave(&snapshot.leave, &r.id, day))
        .cloned()
        .collect();

    if candidates.is_empty() {
        return vec![];
    }

    let window = effective_window(day, &candidates, &snapshot.business_hours, &snapshot.leave);
    if window.is_closed() {
        return vec![];
    }

    let duration = filters.requested_duration(&snapshot.index);

    let mut unassigned: Vec<(u32, u32)> = vec![];
    let mut by_resource: HashMap<&str, Vec<(u32, u32)>> = HashMap::new();
    for booking in snapshot.bookings.iter().filter(|b| {
        b.booking_date == day
            && b.is_live()
            && filters.exclude_booking_id.as_deref() != Some(b.id.as_str())
    }) {
        let interval = snapshot.booking_interval(booking);
        match booking.resource_id.as_deref() {
            Some(resource_id) => by_resource.entry(resource_id).or_default().push(interval),
            None => unassigned.push(interval),
        }
    }

    let mut slots = vec![];
    let mut slot_start = window.min_start / SLOT_STEP_MINUTES * SLOT_STEP_MINUTES;
    while slot_start < window.max_end {
        let slot_end = slot_start.saturating_add(duration);

        let shared_conflicts = unassigned
            .iter()
            .filter(|(s, e)| overlaps(slot_start, slot_end, *s, *e))
            .count();

        let free: Vec<SlotResource> = candidates
            .iter()
            .filter(|r| match window.window_of(&r.id) {
                Some((open, close)) => slot_start >= open && slot_end <= close,
                None => false,
            })
            .filter(|r| {
                by_resource
                    .get(r.id.as_str())
                    .map_or(true, |booked| {
                        !booked
                            .iter()
                            .any(|(s, e)| overlaps(slot_start, slot_end, *s, *e))
                    })
            })
            .map(|r| SlotResource {
                id: r.id.clone(),
                name: r.name.clone(),
            })
            .collect();

        let spots = free.len() as i64 - shared_conflicts as i64;
        if spots > 0 {
            slots.push(Slot {
                time: format_minutes(slot_start),
                available: true,
                spots: spots as u32,
                resources: free,
            });
        }

        slot_start += SLOT_STEP_MINUTES;
    }

    slots
}

/// Slots for every day in `[start, end]`; closed days map to an empty list.
pub fn compute_availability(
    snapshot: &AvailabilitySnapshot,
    start: NaiveDate,
    end: NaiveDate,
    filters: &AvailabilityFilters,
) -> BTreeMap<NaiveDate, Vec<Slot>> {
    start
        .iter_days()
        .take_while(|day| *day <= end)
        .map(|day| (day, slots_for_day(snapshot, day, filters)))
        .collect()
}

pub fn load_availability(
    conn: &Connection,
    start: NaiveDate,
    end: NaiveDate,
    filters: &AvailabilityFilters,
) -> anyhow::Result<BTreeMap<NaiveDate, Vec<Slot>>> {
    let snapshot = AvailabilitySnapshot::load(conn, start, end)?;
    Ok(compute_availability(&snapshot, start, end, filters))
}
