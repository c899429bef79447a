use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::order::Order;
use crate::models::parcel::Parcel;

pub const OTHER_ZONE: &str = "Other";

/// Abidjan communes first, then other cities, so that an address naming both
/// a commune and the city lands in the commune.
const DEFAULT_ZONES: &[&str] = &[
    "Cocody",
    "Plateau",
    "Yopougon",
    "Abobo",
    "Adjamé",
    "Treichville",
    "Marcory",
    "Koumassi",
    "Port-Bouët",
    "Attécoubé",
    "Bingerville",
    "Anyama",
    "Songon",
    "Abidjan",
    "Bouaké",
    "Yamoussoukro",
    "San-Pédro",
    "Daloa",
    "Korhogo",
    "Gagnoa",
    "Grand-Bassam",
];

/// Ordered list of known zone names. Earlier entries win when an address
/// mentions several.
#[derive(Debug, Clone)]
pub struct Gazetteer {
    zones: Vec<(String, String)>,
}

impl Default for Gazetteer {
    fn default() -> Self {
        Self::new(DEFAULT_ZONES.iter().map(|zone| zone.to_string()))
    }
}

impl Gazetteer {
    pub fn new(zones: impl IntoIterator<Item = String>) -> Self {
        let zones = zones
            .into_iter()
            .map(|zone| zone.trim().to_string())
            .filter(|zone| !zone.is_empty())
            .map(|zone| {
                let lowered = zone.to_lowercase();
                (zone, lowered)
            })
            .collect();

        Self { zones }
    }

    /// Parses a JSON array of zone names.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let zones: Vec<String> = serde_json::from_str(raw)?;
        Ok(Self::new(zones))
    }

    /// Names the zone an address belongs to. A trailing separator with
    /// nothing after it classifies as `Other`, not as an empty zone.
    pub fn classify(&self, address: &str) -> String {
        if address.trim().is_empty() {
            return OTHER_ZONE.to_string();
        }

        let haystack = address.to_lowercase();
        if let Some((zone, _)) = self
            .zones
            .iter()
            .find(|(_, lowered)| haystack.contains(lowered.as_str()))
        {
            return zone.clone();
        }

        let segments: Vec<&str> = address.split([',', '-']).collect();
        if segments.len() > 1 {
            let last = segments[segments.len() - 1].trim();
            if !last.is_empty() {
                return last.to_string();
            }
        }

        OTHER_ZONE.to_string()
    }

    /// Buckets items by zone. Items keep their input order inside a bucket;
    /// buckets are sorted by name with `Other` always last.
    pub fn group_by_zone<T>(&self, items: &[T]) -> Vec<ZoneGroup<T>>
    where
        T: Addressed + Clone,
    {
        let mut groups: Vec<ZoneGroup<T>> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for item in items {
            let zone = self.classify(item.address());
            let slot = *index.entry(zone.clone()).or_insert_with(|| {
                groups.push(ZoneGroup {
                    zone,
                    items: Vec::new(),
                    count: 0,
                });
                groups.len() - 1
            });

            let group = &mut groups[slot];
            group.items.push(item.clone());
            group.count += 1;
        }

        groups.sort_by(|a, b| {
            let a_other = a.zone == OTHER_ZONE;
            let b_other = b.zone == OTHER_ZONE;
            a_other.cmp(&b_other).then_with(|| a.zone.cmp(&b.zone))
        });

        groups
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ZoneGroup<T> {
    pub zone: String,
    pub items: Vec<T>,
    pub count: usize,
}

/// Anything carrying a delivery destination.
pub trait Addressed {
    fn receiver_address(&self) -> Option<&str> {
        None
    }

    fn delivery_address(&self) -> Option<&str> {
        None
    }

    fn address(&self) -> &str {
        self.receiver_address()
            .filter(|address| !address.is_empty())
            .or_else(|| self.delivery_address().filter(|address| !address.is_empty()))
            .unwrap_or("")
    }
}

impl Addressed for Parcel {
    fn receiver_address(&self) -> Option<&str> {
        Some(&self.receiver_address)
    }
}

impl Addressed for Order {
    fn delivery_address(&self) -> Option<&str> {
        Some(&self.delivery_address)
    }
}
