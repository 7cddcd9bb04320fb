use std::collections::HashMap;

use rusqlite::Connection;

use crate::db::queries;
use crate::models::{Resource, Variation};

pub const DEFAULT_DURATION_MINUTES: u32 = 60;

#[derive(Debug, Clone, Copy)]
struct CatalogEntry {
    duration_minutes: u32,
    price_cents: i64,
}

/// (style, variation) → service duration and base price.
#[derive(Debug, Clone, Default)]
pub struct PricingDurationIndex {
    entries: HashMap<(String, String), CatalogEntry>,
}

impl PricingDurationIndex {
    pub fn from_variations(variations: &[Variation]) -> Self {
        let entries = variations
            .iter()
            .map(|v| {
                let entry = CatalogEntry {
                    duration_minutes: v
                        .duration_minutes
                        .filter(|m| *m > 0)
                        .unwrap_or(DEFAULT_DURATION_MINUTES),
                    price_cents: v.price_cents,
                };
                ((v.style_id.clone(), v.id.clone()), entry)
            })
            .collect();
        Self { entries }
    }

    pub fn load(conn: &Connection) -> anyhow::Result<Self> {
        Ok(Self::from_variations(&queries::list_variations(conn)?))
    }

    /// Minutes for the pair, 60 when the catalog has no entry.
    pub fn duration_for(&self, style_id: &str, variation_id: &str) -> u32 {
        self.entries
            .get(&(style_id.to_string(), variation_id.to_string()))
            .map(|e| e.duration_minutes)
            .unwrap_or(DEFAULT_DURATION_MINUTES)
    }

    pub fn style_of(&self, variation_id: &str) -> Option<&str> {
        self.entries
            .keys()
            .find(|(_, v)| v == variation_id)
            .map(|(style, _)| style.as_str())
    }

    /// Base price plus the stylist's surcharge for this style.
    pub fn price_for(&self, style_id: &str, variation_id: &str, resource: Option<&Resource>) -> i64 {
        let base = self
            .entries
            .get(&(style_id.to_string(), variation_id.to_string()))
            .map(|e| e.price_cents)
            .unwrap_or(0);
        base + resource.map(|r| r.surcharge_for(style_id)).unwrap_or(0)
    }
}
