//! Parameter blobs: filter, sort, projection and enrichment instructions
//! sent as a base64-encoded JSON object in a URL path segment.
//!
//! The backend decodes the segment with the standard base64 alphabet, so
//! the encoding here must not switch to the URL-safe variant even though
//! the value lives in a path.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Sort direction understood by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    pub dir: SortDir,
}

impl OrderBy {
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            dir: SortDir::Asc,
        }
    }
}

/// The JSON object carried by a blob. Keys that are `None` are left out of
/// the encoded text entirely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlobParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dist: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<OrderBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Vec<String>>,
    /// Relation joins, `get_<relation>` to the column to inline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrich: Option<BTreeMap<String, String>>,
}

impl BlobParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn term(mut self, term: &str) -> Self {
        self.term = Some(term.to_string());
        self
    }

    pub fn only(mut self, columns: &[&str]) -> Self {
        self.only = Some(strings(columns));
        self
    }

    pub fn near(mut self, lat: f64, long: f64, dist: f64) -> Self {
        self.lat = Some(lat);
        self.long = Some(long);
        self.dist = Some(dist);
        self
    }

    pub fn key(mut self, column: &str, value: &str) -> Self {
        self.keys
            .get_or_insert_with(BTreeMap::new)
            .insert(column.to_string(), value.to_string());
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by = Some(order);
        self
    }

    pub fn output(mut self, columns: &[&str]) -> Self {
        self.output = Some(strings(columns));
        self
    }

    pub fn enrich(mut self, relation: &str, column: &str) -> Self {
        self.enrich
            .get_or_insert_with(BTreeMap::new)
            .insert(relation.to_string(), column.to_string());
        self
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Serialize `params` to JSON text and base64-encode its UTF-8 bytes.
pub fn encode_blob(params: &BlobParams) -> Result<String, ApiError> {
    let json = serde_json::to_string(params).map_err(|e| ApiError::Serialization(e.to_string()))?;
    Ok(STANDARD.encode(json.as_bytes()))
}

/// Inverse of [`encode_blob`].
pub fn decode_blob(segment: &str) -> Result<BlobParams, ApiError> {
    let bytes = STANDARD
        .decode(segment)
        .map_err(|e| ApiError::Deserialization(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Deserialization(e.to_string()))
}
