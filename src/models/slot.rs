use serde::Serialize;

/// A bookable candidate time with the stylists still free for it.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Slot {
    pub time: String,
    pub available: bool,
    pub spots: u32,
    pub resources: Vec<SlotResource>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SlotResource {
    pub id: String,
    pub name: String,
}
