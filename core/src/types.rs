//! Wire records and domain records for the tour API.
//!
//! # Design
//! The backend is loose about shapes: ids arrive as JSON numbers or strings,
//! columns may be missing or `null`, and enrichment joins yield a single
//! value or a list depending on the relation. Every field is decoded
//! tolerantly and falls back to an empty value, so mapping a payload never
//! fails on content once it is valid JSON of the right outer shape.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A tour exactly as the backend returns it.
///
/// Enrichment columns may arrive under a plain name (`location`), a join
/// name (`get_location`) or a list join name (`get_location_all`). Each name
/// has its own field so a record carrying several of them still decodes;
/// [`Tour::from_raw`] picks one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TourRaw {
    #[serde(default, deserialize_with = "de::text")]
    pub id: String,
    #[serde(default, deserialize_with = "de::text")]
    pub name: String,
    #[serde(default, deserialize_with = "de::text")]
    pub description: String,
    #[serde(default, deserialize_with = "de::text")]
    pub source: String,
    #[serde(default, deserialize_with = "de::text")]
    pub activity_type: String,
    #[serde(default, deserialize_with = "de::text")]
    pub get_activity_type: String,
    #[serde(default, deserialize_with = "de::one_or_many")]
    pub country: Vec<String>,
    #[serde(default, deserialize_with = "de::one_or_many")]
    pub get_country: Vec<String>,
    #[serde(default, deserialize_with = "de::one_or_many")]
    pub get_country_all: Vec<String>,
    #[serde(default, deserialize_with = "de::one_or_many")]
    pub location: Vec<String>,
    #[serde(default, deserialize_with = "de::one_or_many")]
    pub get_location: Vec<String>,
    #[serde(default, deserialize_with = "de::one_or_many")]
    pub get_location_all: Vec<String>,
    #[serde(default, deserialize_with = "de::one_or_many")]
    pub location_type: Vec<String>,
    #[serde(default, deserialize_with = "de::one_or_many")]
    pub get_location_type_all: Vec<String>,
    #[serde(default, deserialize_with = "de::one_or_many")]
    pub region: Vec<String>,
    #[serde(default, deserialize_with = "de::one_or_many")]
    pub get_region: Vec<String>,
}

/// A tour as the UI consumes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Tour {
    pub id: String,
    pub name: String,
    pub description: String,
    pub source: String,
    pub activity_type: String,
    pub countries: Vec<String>,
    pub locations: Vec<String>,
    pub location_types: Vec<String>,
    pub regions: Vec<String>,
}

impl Tour {
    /// Joined values win over plain columns, and list joins over single ones.
    pub fn from_raw(raw: TourRaw) -> Self {
        let activity_type = if raw.get_activity_type.is_empty() {
            raw.activity_type
        } else {
            raw.get_activity_type
        };
        Self {
            id: raw.id,
            name: raw.name,
            description: raw.description,
            source: raw.source,
            activity_type,
            countries: first_non_empty([raw.get_country_all, raw.get_country, raw.country]),
            locations: first_non_empty([raw.get_location_all, raw.get_location, raw.location]),
            location_types: first_non_empty([raw.get_location_type_all, raw.location_type]),
            regions: first_non_empty([raw.get_region, raw.region]),
        }
    }
}

fn first_non_empty<const N: usize>(candidates: [Vec<String>; N]) -> Vec<String> {
    candidates.into_iter().find(|v| !v.is_empty()).unwrap_or_default()
}

impl From<TourRaw> for Tour {
    fn from(raw: TourRaw) -> Self {
        Tour::from_raw(raw)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default, deserialize_with = "de::text")]
    pub id: String,
    #[serde(default, deserialize_with = "de::text")]
    pub body: String,
    #[serde(default, deserialize_with = "de::text")]
    pub activity_id: String,
    #[serde(default, deserialize_with = "de::text")]
    pub updated_at: String,
}

/// Request payload for creating a comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    pub body: String,
    pub activity_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityType {
    #[serde(default, deserialize_with = "de::text")]
    pub id: String,
    #[serde(default, deserialize_with = "de::text")]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, deserialize_with = "de::text")]
    pub id: String,
    #[serde(default, deserialize_with = "de::text")]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationType {
    #[serde(default, deserialize_with = "de::text")]
    pub id: String,
    #[serde(default, deserialize_with = "de::text")]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    #[serde(default, deserialize_with = "de::text")]
    pub id: String,
    #[serde(default, deserialize_with = "de::text")]
    pub name: String,
    #[serde(default, deserialize_with = "de::text")]
    pub abbreviation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    #[serde(default, deserialize_with = "de::text")]
    pub id: String,
    #[serde(default, deserialize_with = "de::text")]
    pub name: String,
}

mod de {
    use super::*;

    fn scalar(value: Value) -> Option<String> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            other => Some(other.to_string()),
        }
    }

    /// String, number or `null`; `null` becomes the empty string.
    pub fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(scalar(Value::deserialize(deserializer)?).unwrap_or_default())
    }

    /// A scalar, a list of scalars, or `null`.
    pub fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Array(items) => items.into_iter().filter_map(scalar).collect(),
            other => scalar(other).into_iter().collect(),
        })
    }
}
