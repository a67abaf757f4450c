//! Tour search descriptors.
//!
//! # Design
//! The search form fills `TourSearch` loosely: any combination of a
//! coordinate filter, a country and a region may be set. `resolve` turns it
//! into exactly one `TourQuery` using a fixed precedence (coordinate, then
//! country, then region), so request building never has to guess.

use serde::{Deserialize, Serialize};

/// Country id meaning "every country". The backend has no such id; the
/// client lists all activities instead.
pub const ALL_COUNTRIES: &str = "-1";

/// Centre point and radius for a proximity search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoFilter {
    pub lat: f64,
    pub long: f64,
    pub dist: f64,
}

/// Search form state as the UI collects it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TourSearch {
    #[serde(default)]
    pub coordinate: Option<GeoFilter>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

/// One resolved tour listing request.
#[derive(Debug, Clone, PartialEq)]
pub enum TourQuery {
    Nearby(GeoFilter),
    AllActivities,
    Country(String),
    Region(String),
}

impl TourSearch {
    /// Pick the single query this search stands for, or `None` when no
    /// filter is set. Empty strings count as unset.
    pub fn resolve(&self) -> Option<TourQuery> {
        if let Some(geo) = self.coordinate {
            return Some(TourQuery::Nearby(geo));
        }
        if let Some(country) = non_empty(&self.country) {
            if country == ALL_COUNTRIES {
                return Some(TourQuery::AllActivities);
            }
            return Some(TourQuery::Country(country.to_string()));
        }
        non_empty(&self.region).map(|region| TourQuery::Region(region.to_string()))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}
