use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::hours::WeeklyHours;

/// A stylist with their own calendar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub name: String,
    pub active: bool,
    /// `None` inherits the salon's business hours.
    pub working_hours: Option<WeeklyHours>,
    pub style_ids: Vec<String>,
    pub surcharge: Option<Surcharge>,
    /// Account that operates on this resource's behalf (check-ins).
    pub user_id: Option<String>,
}

impl Resource {
    pub fn is_capable_of(&self, style_id: &str) -> bool {
        self.style_ids.iter().any(|s| s == style_id)
    }

    pub fn surcharge_for(&self, style_id: &str) -> i64 {
        self.surcharge
            .as_ref()
            .map(|s| s.amount_for(style_id))
            .unwrap_or(0)
    }
}

/// Extra charge in cents for booking a particular stylist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Surcharge {
    Flat(i64),
    PerStyle(HashMap<String, i64>),
}

impl Surcharge {
    pub fn amount_for(&self, style_id: &str) -> i64 {
        match self {
            Surcharge::Flat(cents) => *cents,
            Surcharge::PerStyle(by_style) => by_style.get(style_id).copied().unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveRecord {
    pub resource_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
}

impl LeaveRecord {
    /// Both ends inclusive.
    pub fn covers(&self, day: NaiveDate) -> bool {
        self.start_date <= day && day <= self.end_date
    }
}

pub fn is_on_leave(leave: &[LeaveRecord], resource_id: &str, day: NaiveDate) -> bool {
    leave
        .iter()
        .any(|l| l.resource_id == resource_id && l.covers(day))
}
