use chrono::Weekday;
use serde::{Deserialize, Serialize};

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Opening hours for a single weekday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayHours {
    pub open: String,
    pub close: String,
    #[serde(rename = "isOpen", alias = "is_open", default)]
    pub is_open: bool,
}

impl DayHours {
    pub fn open(open: &str, close: &str) -> Self {
        Self {
            open: open.to_string(),
            close: close.to_string(),
            is_open: true,
        }
    }

    /// Half-open `[open, close)` in minutes-of-day. `None` when the day is closed,
    /// when either time fails to parse, or when the range is empty.
    pub fn window(&self) -> Option<(u32, u32)> {
        if !self.is_open {
            return None;
        }
        let start = parse_hhmm(&self.open)?;
        let end = parse_hhmm(&self.close)?;
        (start < end).then_some((start, end))
    }
}

/// Weekday → hours. A missing weekday means closed on that day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeeklyHours {
    #[serde(default, alias = "mon", skip_serializing_if = "Option::is_none")]
    pub monday: Option<DayHours>,
    #[serde(default, alias = "tue", skip_serializing_if = "Option::is_none")]
    pub tuesday: Option<DayHours>,
    #[serde(default, alias = "wed", skip_serializing_if = "Option::is_none")]
    pub wednesday: Option<DayHours>,
    #[serde(default, alias = "thu", skip_serializing_if = "Option::is_none")]
    pub thursday: Option<DayHours>,
    #[serde(default, alias = "fri", skip_serializing_if = "Option::is_none")]
    pub friday: Option<DayHours>,
    #[serde(default, alias = "sat", skip_serializing_if = "Option::is_none")]
    pub saturday: Option<DayHours>,
    #[serde(default, alias = "sun", skip_serializing_if = "Option::is_none")]
    pub sunday: Option<DayHours>,
}

impl WeeklyHours {
    /// Every open day must carry a valid, non-empty window. Checked before hours are stored.
    pub fn validate(&self) -> anyhow::Result<()> {
        for weekday in ALL_WEEKDAYS {
            if let Some(day) = self.day(weekday) {
                if day.is_open && day.window().is_none() {
                    anyhow::bail!(
                        "invalid hours for {weekday}: {}-{}",
                        day.open,
                        day.close
                    );
                }
            }
        }
        Ok(())
    }

    /// Same weekly hours on every day of the week.
    pub fn every_day(open: &str, close: &str) -> Self {
        let day = Some(DayHours::open(open, close));
        Self {
            monday: day.clone(),
            tuesday: day.clone(),
            wednesday: day.clone(),
            thursday: day.clone(),
            friday: day.clone(),
            saturday: day.clone(),
            sunday: day,
        }
    }

    pub fn day(&self, weekday: Weekday) -> Option<&DayHours> {
        match weekday {
            Weekday::Mon => self.monday.as_ref(),
            Weekday::Tue => self.tuesday.as_ref(),
            Weekday::Wed => self.wednesday.as_ref(),
            Weekday::Thu => self.thursday.as_ref(),
            Weekday::Fri => self.friday.as_ref(),
            Weekday::Sat => self.saturday.as_ref(),
            Weekday::Sun => self.sunday.as_ref(),
        }
    }

    pub fn set_day(&mut self, weekday: Weekday, hours: Option<DayHours>) {
        let slot = match weekday {
            Weekday::Mon => &mut self.monday,
            Weekday::Tue => &mut self.tuesday,
            Weekday::Wed => &mut self.wednesday,
            Weekday::Thu => &mut self.thursday,
            Weekday::Fri => &mut self.friday,
            Weekday::Sat => &mut self.saturday,
            Weekday::Sun => &mut self.sunday,
        };
        *slot = hours;
    }

    pub fn window_for(&self, weekday: Weekday) -> Option<(u32, u32)> {
        self.day(weekday).and_then(DayHours::window)
    }
}

const ALL_WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Parses `HH:MM` (or `HH:MM:SS`) into minutes since midnight. `24:00` is accepted
/// as an end-of-day close.
pub fn parse_hhmm(s: &str) -> Option<u32> {
    let mut parts = s.trim().split(':');
    let hour: u32 = parts.next()?.parse().ok()?;
    let minute: u32 = parts.next()?.parse().ok()?;
    if let Some(seconds) = parts.next() {
        seconds.parse::<u32>().ok().filter(|s| *s < 60)?;
    }
    if parts.next().is_some() || minute > 59 {
        return None;
    }
    match hour {
        0..=23 => Some(hour * 60 + minute),
        24 if minute == 0 => Some(MINUTES_PER_DAY),
        _ => None,
    }
}

pub fn format_minutes(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}
