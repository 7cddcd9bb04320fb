use chrono::{Datelike, NaiveDate, Weekday};

use crate::models::hours::MINUTES_PER_DAY;
use crate::models::resource::is_on_leave;
use crate::models::{LeaveRecord, Resource, WeeklyHours};

/// How a resource's own schedule treats a given weekday.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceDay {
    /// No override: bound by the salon's hours.
    Inherit,
    Closed,
    Open(u32, u32),
}

pub fn resource_day(resource: &Resource, weekday: Weekday) -> ResourceDay {
    let Some(hours) = &resource.working_hours else {
        return ResourceDay::Inherit;
    };
    match hours.day(weekday) {
        Some(day) if day.is_open => match day.window() {
            Some((start, end)) => ResourceDay::Open(start, end),
            None => {
                tracing::warn!(
                    resource = %resource.id,
                    %weekday,
                    open = %day.open,
                    close = %day.close,
                    "unusable working hours, resource skipped for the day"
                );
                ResourceDay::Closed
            }
        },
        _ => ResourceDay::Closed,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceWindow {
    pub resource_id: String,
    /// `None` when the resource does not work that day.
    pub window: Option<(u32, u32)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveWindow {
    pub min_start: u32,
    pub max_end: u32,
    pub per_resource: Vec<ResourceWindow>,
}

impl EffectiveWindow {
    pub fn is_closed(&self) -> bool {
        self.min_start >= self.max_end
    }

    pub fn window_of(&self, resource_id: &str) -> Option<(u32, u32)> {
        self.per_resource
            .iter()
            .find(|r| r.resource_id == resource_id)
            .and_then(|r| r.window)
    }
}

/// The day's bounding range: salon hours unioned with the hours of every active
/// resource that works that day. Resources without an override take the salon window
/// and never widen it; resources on leave contribute nothing.
pub fn effective_window(
    day: NaiveDate,
    resources: &[Resource],
    global: &WeeklyHours,
    leave: &[LeaveRecord],
) -> EffectiveWindow {
    let weekday = day.weekday();
    let global_window = global.window_for(weekday);

    let (mut min_start, mut max_end) = global_window.unwrap_or((MINUTES_PER_DAY, 0));

    let per_resource = resources
        .iter()
        .filter(|r| r.active)
        .map(|r| {
            let window = if is_on_leave(leave, &r.id, day) {
                None
            } else {
                match resource_day(r, weekday) {
                    ResourceDay::Inherit => global_window,
                    ResourceDay::Closed => None,
                    ResourceDay::Open(start, end) => {
                        min_start = min_start.min(start);
                        max_end = max_end.max(end);
                        Some((start, end))
                    }
                }
            };
            ResourceWindow {
                resource_id: r.id.clone(),
                window,
            }
        })
        .collect();

    EffectiveWindow {
        min_start,
        max_end,
        per_resource,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DayHours;

    const H: u32 = 60;

    // 2025-06-16 is a Monday.
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 16).unwrap()
    }

    fn resource(id: &str, hours: Option<WeeklyHours>) -> Resource {
        Resource {
            id: id.to_string(),
            name: id.to_string(),
            active: true,
            working_hours: hours,
            style_ids: vec![],
            surcharge: None,
            user_id: None,
        }
    }

    fn monday_only(open: &str, close: &str, is_open: bool) -> WeeklyHours {
        let mut hours = WeeklyHours::default();
        hours.set_day(
            Weekday::Mon,
            Some(DayHours {
                open: open.to_string(),
                close: close.to_string(),
                is_open,
            }),
        );
        hours
    }

    #[test]
    fn test_global_closed_resource_open_gives_resource_window() {
        let global = WeeklyHours::default();
        let resources = [resource("r1", Some(monday_only("09:00", "17:00", true)))];

        let window = effective_window(monday(), &resources, &global, &[]);
        assert_eq!((window.min_start, window.max_end), (9 * H, 17 * H));
        assert!(!window.is_closed());
        assert_eq!(window.window_of("r1"), Some((9 * H, 17 * H)));
    }

    #[test]
    fn test_union_widens_beyond_global_hours() {
        let global = WeeklyHours::every_day("10:00", "16:00");
        let resources = [
            resource("early", Some(monday_only("08:00", "12:00", true))),
            resource("late", Some(monday_only("14:00", "20:00", true))),
            resource("inherit", None),
        ];

        let window = effective_window(monday(), &resources, &global, &[]);
        assert_eq!((window.min_start, window.max_end), (8 * H, 20 * H));
        assert_eq!(window.window_of("inherit"), Some((10 * H, 16 * H)));
    }

    #[test]
    fn test_inheriting_resource_does_not_widen() {
        let global = WeeklyHours::default();
        let resources = [resource("inherit", None)];

        let window = effective_window(monday(), &resources, &global, &[]);
        assert!(window.is_closed());
        assert_eq!(window.window_of("inherit"), None);
    }

    #[test]
    fn test_closed_override_beats_open_global() {
        let global = WeeklyHours::every_day("09:00", "17:00");
        let resources = [resource("r1", Some(monday_only("09:00", "17:00", false)))];

        let window = effective_window(monday(), &resources, &global, &[]);
        assert_eq!(window.window_of("r1"), None);
        assert_eq!((window.min_start, window.max_end), (9 * H, 17 * H));
    }

    #[test]
    fn test_override_without_the_weekday_is_closed() {
        let global = WeeklyHours::every_day("09:00", "17:00");
        let mut hours = WeeklyHours::default();
        hours.set_day(Weekday::Tue, Some(DayHours::open("09:00", "17:00")));
        let resources = [resource("r1", Some(hours))];

        let window = effective_window(monday(), &resources, &global, &[]);
        assert_eq!(window.window_of("r1"), None);
    }

    #[test]
    fn test_malformed_hours_contribute_nothing() {
        let global = WeeklyHours::default();
        let resources = [
            resource("bad", Some(monday_only("nine", "17:00", true))),
            resource("good", Some(monday_only("11:00", "13:00", true))),
        ];

        let window = effective_window(monday(), &resources, &global, &[]);
        assert_eq!((window.min_start, window.max_end), (11 * H, 13 * H));
        assert_eq!(window.window_of("bad"), None);
    }

    #[test]
    fn test_inactive_and_on_leave_resources_are_ignored() {
        let global = WeeklyHours::default();
        let mut inactive = resource("inactive", Some(monday_only("06:00", "22:00", true)));
        inactive.active = false;
        let on_leave = resource("away", Some(monday_only("07:00", "21:00", true)));
        let leave = [LeaveRecord {
            resource_id: "away".to_string(),
            start_date: monday(),
            end_date: monday(),
            reason: "vacation".to_string(),
        }];

        let window = effective_window(monday(), &[inactive, on_leave], &global, &leave);
        assert!(window.is_closed());
        assert_eq!(window.per_resource.len(), 1);
        assert_eq!(window.window_of("away"), None);
    }
}
