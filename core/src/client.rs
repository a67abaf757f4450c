//! Stateless request builder and response parser for the tour API.
//!
//! # Design
//! `TourClient` holds only a `base_url` and carries no mutable state between
//! calls. Each operation is split into a `build_*` method that produces an
//! `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`.
//! Filter, sort and projection parameters travel as a blob path segment
//! (see [`crate::blob`]); only comment creation sends a JSON body.

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::blob::{encode_blob, BlobParams, OrderBy};
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::query::{GeoFilter, TourQuery};
use crate::types::{
    ActivityType, Comment, Country, Location, LocationType, NewComment, Region, Tour, TourRaw,
};

/// Synchronous, stateless client for the tour API.
#[derive(Debug, Clone)]
pub struct TourClient {
    base_url: String,
}

impl TourClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, resource: &str) -> String {
        format!("{}/main/{resource}", self.base_url)
    }

    fn blob_get(&self, resource: &str, params: &BlobParams) -> Result<HttpRequest, ApiError> {
        let blob = encode_blob(params)?;
        Ok(HttpRequest::get(self.url(&format!("{resource}/{blob}"))))
    }

    // -- tours --------------------------------------------------------------

    pub fn build_list_tours(&self, query: &TourQuery) -> Result<HttpRequest, ApiError> {
        match query {
            TourQuery::Nearby(GeoFilter { lat, long, dist }) => {
                let params = BlobParams::new().only(&["name", "id"]).near(*lat, *long, *dist);
                self.blob_get("find_tour", &params)
            }
            TourQuery::AllActivities => {
                let params = BlobParams::new()
                    .order_by(OrderBy::asc("name"))
                    .output(&["id", "name"]);
                self.blob_get("list/activity", &params)
            }
            TourQuery::Country(country_id) => {
                self.blob_get("find_tour_by_area", &area_params("country_id", country_id))
            }
            TourQuery::Region(region_id) => {
                self.blob_get("find_tour_by_area", &area_params("id", region_id))
            }
        }
    }

    pub fn build_get_tour(&self, id: &str) -> Result<HttpRequest, ApiError> {
        let params = BlobParams::new()
            .output(&["name", "id", "description", "source"])
            .enrich("get_activity_type", "name")
            .enrich("get_country_all", "abbreviation")
            .enrich("get_location_all", "name")
            .enrich("get_location_type_all", "id");
        self.blob_get(&format!("find/activity/{id}"), &params)
    }

    pub fn build_tours_by_term(&self, term: &str) -> Result<HttpRequest, ApiError> {
        let params = BlobParams::new()
            .term(term)
            .output(&["name", "id"])
            .enrich("get_location", "name")
            .enrich("get_region", "name")
            .enrich("get_country", "abbreviation");
        self.blob_get("find_tour_by_term", &params)
    }

    pub fn parse_tours(&self, response: HttpResponse) -> Result<Vec<Tour>, ApiError> {
        let raw: Vec<TourRaw> = parse_json(&response)?;
        Ok(raw.into_iter().map(Tour::from_raw).collect())
    }

    pub fn parse_tour(&self, response: HttpResponse) -> Result<Tour, ApiError> {
        parse_json::<TourRaw>(&response).map(Tour::from_raw)
    }

    // -- comments -----------------------------------------------------------

    pub fn build_list_comments(&self, activity_id: &str) -> Result<HttpRequest, ApiError> {
        let params = BlobParams::new()
            .key("activity_id", activity_id)
            .order_by(OrderBy::asc("updated_at"))
            .output(&["id", "body", "updated_at"]);
        self.blob_get("list/comment", &params)
    }

    /// The backend does not echo the owning activity, so comments without
    /// one are attributed to `activity_id`.
    pub fn parse_list_comments(
        &self,
        response: HttpResponse,
        activity_id: &str,
    ) -> Result<Vec<Comment>, ApiError> {
        let comments: Vec<Comment> = parse_json(&response)?;
        Ok(comments
            .into_iter()
            .map(|c| {
                if c.activity_id.is_empty() {
                    Comment {
                        activity_id: activity_id.to_string(),
                        ..c
                    }
                } else {
                    c
                }
            })
            .collect())
    }

    pub fn build_create_comment(&self, input: &NewComment) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(input).map_err(|e| ApiError::Serialization(e.to_string()))?;
        Ok(HttpRequest {
            method: HttpMethod::Post,
            url: self.url("create/comment"),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: Some(body),
        })
    }

    /// Returns the plain-text acknowledgement.
    pub fn parse_create_comment(&self, response: HttpResponse) -> Result<String, ApiError> {
        check_status(&response)?;
        Ok(response.text())
    }

    // -- files --------------------------------------------------------------

    pub fn build_get_pdf(&self, activity_id: &str) -> HttpRequest {
        HttpRequest::get(self.url(&format!("file/{activity_id}")))
    }

    pub fn parse_get_pdf(&self, response: HttpResponse) -> Result<Bytes, ApiError> {
        check_status(&response)?;
        Ok(response.body)
    }

    // -- lookup lists -------------------------------------------------------

    pub fn build_list_activity_types(&self) -> Result<HttpRequest, ApiError> {
        self.blob_get("list/activity_type", &name_id_listing())
    }

    pub fn parse_list_activity_types(&self, response: HttpResponse) -> Result<Vec<ActivityType>, ApiError> {
        parse_json(&response)
    }

    pub fn build_list_locations(&self) -> Result<HttpRequest, ApiError> {
        self.blob_get("list/location", &name_id_listing())
    }

    pub fn parse_list_locations(&self, response: HttpResponse) -> Result<Vec<Location>, ApiError> {
        parse_json(&response)
    }

    pub fn build_list_location_types(&self) -> Result<HttpRequest, ApiError> {
        self.blob_get("list/location_type", &name_id_listing())
    }

    pub fn parse_list_location_types(&self, response: HttpResponse) -> Result<Vec<LocationType>, ApiError> {
        parse_json(&response)
    }

    pub fn build_list_countries(&self) -> Result<HttpRequest, ApiError> {
        let params = BlobParams::new()
            .order_by(OrderBy::asc("name"))
            .output(&["name", "id", "abbreviation"]);
        self.blob_get("list/country", &params)
    }

    pub fn parse_list_countries(&self, response: HttpResponse) -> Result<Vec<Country>, ApiError> {
        parse_json(&response)
    }

    pub fn build_list_regions(&self, country_id: &str) -> Result<HttpRequest, ApiError> {
        let params = BlobParams::new()
            .key("country_id", country_id)
            .order_by(OrderBy::asc("name"))
            .output(&["name", "id"]);
        self.blob_get("list/region", &params)
    }

    pub fn parse_list_regions(&self, response: HttpResponse) -> Result<Vec<Region>, ApiError> {
        parse_json(&response)
    }

    // -- hikes and statistics -----------------------------------------------

    pub fn build_hike(&self, activity_id: &str, typ: &str) -> HttpRequest {
        HttpRequest::get(self.url(&format!("hike/{activity_id}?typ={typ}")))
    }

    pub fn build_hike_stats(&self, activity_id: &str) -> HttpRequest {
        HttpRequest::get(self.url(&format!("stats/hikes/{activity_id}")))
    }

    pub fn build_general_stats(&self) -> HttpRequest {
        HttpRequest::get(self.url("stats"))
    }

    /// Hike and statistics payloads have no fixed schema.
    pub fn parse_value(&self, response: HttpResponse) -> Result<serde_json::Value, ApiError> {
        parse_json(&response)
    }
}

fn area_params(key: &str, value: &str) -> BlobParams {
    BlobParams::new()
        .key(key, value)
        .order_by(OrderBy::asc("name"))
        .output(&["id", "name"])
        .enrich("get_location", "name")
        .enrich("get_region", "name")
}

fn name_id_listing() -> BlobParams {
    BlobParams::new()
        .order_by(OrderBy::asc("name"))
        .output(&["name", "id"])
}

/// Any 2xx is success; everything else becomes `ApiError::Http`.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    Err(ApiError::Http {
        status: response.status,
        body: response.text(),
    })
}

fn parse_json<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, ApiError> {
    check_status(response)?;
    serde_json::from_slice(&response.body).map_err(|e| ApiError::Deserialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::decode_blob;
    use serde_json::json;

    const BASE: &str = "http://localhost:5000";

    fn client() -> TourClient {
        TourClient::new(BASE)
    }

    /// Decode the blob that follows `{BASE}/main/{resource}/`. The blob may
    /// itself contain '/', so the prefix is stripped rather than split off.
    fn decoded(req: &HttpRequest, resource: &str) -> serde_json::Value {
        let prefix = format!("{BASE}/main/{resource}/");
        let segment = req
            .url
            .strip_prefix(&prefix)
            .unwrap_or_else(|| panic!("{} does not start with {prefix}", req.url));
        serde_json::to_value(decode_blob(segment).unwrap()).unwrap()
    }

    fn ok(body: &str) -> HttpResponse {
        HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    #[test]
    fn nearby_query_uses_find_tour() {
        let req = client()
            .build_list_tours(&TourQuery::Nearby(GeoFilter {
                lat: 46.5,
                long: 9.25,
                dist: 10.0,
            }))
            .unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        let blob = decoded(&req, "find_tour");
        assert_eq!(
            blob,
            json!({ "only": ["name", "id"], "lat": 46.5, "long": 9.25, "dist": 10.0 })
        );
    }

    #[test]
    fn all_activities_query_lists_activities() {
        let req = client().build_list_tours(&TourQuery::AllActivities).unwrap();
        let blob = decoded(&req, "list/activity");
        assert_eq!(
            blob,
            json!({ "order_by": { "column": "name", "dir": "asc" }, "output": ["id", "name"] })
        );
    }

    #[test]
    fn country_query_uses_area_search() {
        let req = client().build_list_tours(&TourQuery::Country("2".to_string())).unwrap();
        let blob = decoded(&req, "find_tour_by_area");
        assert_eq!(
            blob,
            json!({
                "keys": { "country_id": "2" },
                "order_by": { "column": "name", "dir": "asc" },
                "output": ["id", "name"],
                "enrich": { "get_location": "name", "get_region": "name" }
            })
        );
    }

    #[test]
    fn region_query_keys_on_id() {
        let req = client().build_list_tours(&TourQuery::Region("11".to_string())).unwrap();
        let blob = decoded(&req, "find_tour_by_area");
        assert_eq!(blob["keys"], json!({ "id": "11" }));
        assert_eq!(blob["enrich"], json!({ "get_location": "name", "get_region": "name" }));
    }

    #[test]
    fn get_tour_puts_id_before_blob() {
        let req = client().build_get_tour("42").unwrap();
        let blob = decoded(&req, "find/activity/42");
        assert_eq!(
            blob,
            json!({
                "output": ["name", "id", "description", "source"],
                "enrich": {
                    "get_activity_type": "name",
                    "get_country_all": "abbreviation",
                    "get_location_all": "name",
                    "get_location_type_all": "id"
                }
            })
        );
    }

    #[test]
    fn term_search_blob() {
        let req = client().build_tours_by_term("Grat").unwrap();
        let blob = decoded(&req, "find_tour_by_term");
        assert_eq!(blob["term"], "Grat");
        assert_eq!(blob["output"], json!(["name", "id"]));
        assert_eq!(blob["enrich"]["get_country"], "abbreviation");
    }

    #[test]
    fn comments_sorted_by_update_time() {
        let req = client().build_list_comments("5").unwrap();
        let blob = decoded(&req, "list/comment");
        assert_eq!(
            blob,
            json!({
                "keys": { "activity_id": "5" },
                "order_by": { "column": "updated_at", "dir": "asc" },
                "output": ["id", "body", "updated_at"]
            })
        );
    }

    #[test]
    fn create_comment_is_plain_json_post() {
        let req = client()
            .build_create_comment(&NewComment {
                body: "Steep but worth it".to_string(),
                activity_id: "5".to_string(),
            })
            .unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, format!("{BASE}/main/create/comment"));
        assert_eq!(
            req.headers,
            vec![("content-type".to_string(), "application/json".to_string())]
        );
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({ "body": "Steep but worth it", "activity_id": "5" }));
    }

    #[test]
    fn lookup_lists() {
        let c = client();
        let blob = decoded(&c.build_list_activity_types().unwrap(), "list/activity_type");
        assert_eq!(blob["output"], json!(["name", "id"]));

        decoded(&c.build_list_locations().unwrap(), "list/location");
        decoded(&c.build_list_location_types().unwrap(), "list/location_type");

        let blob = decoded(&c.build_list_countries().unwrap(), "list/country");
        assert_eq!(blob["output"], json!(["name", "id", "abbreviation"]));

        let blob = decoded(&c.build_list_regions("1").unwrap(), "list/region");
        assert_eq!(blob["keys"], json!({ "country_id": "1" }));
    }

    #[test]
    fn blobless_paths() {
        let c = client();
        assert_eq!(c.build_get_pdf("3").url, format!("{BASE}/main/file/3"));
        assert_eq!(c.build_hike("3", "done").url, format!("{BASE}/main/hike/3?typ=done"));
        assert_eq!(c.build_hike_stats("3").url, format!("{BASE}/main/stats/hikes/3"));
        assert_eq!(c.build_general_stats().url, format!("{BASE}/main/stats"));
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let c = TourClient::new("http://localhost:5000/");
        assert_eq!(c.build_general_stats().url, "http://localhost:5000/main/stats");
    }

    #[test]
    fn parse_tours_preserves_order() {
        let tours = client()
            .parse_tours(ok(r#"[{"id":2,"name":"B"},{"id":1,"name":"A"}]"#))
            .unwrap();
        let names: Vec<_> = tours.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["B", "A"]);
    }

    #[test]
    fn parse_comments_fills_owning_activity() {
        let comments = client()
            .parse_list_comments(ok(r#"[{"id":1,"body":"hi","updated_at":"t"}]"#), "5")
            .unwrap();
        assert_eq!(comments[0].activity_id, "5");
    }

    #[test]
    fn parse_pdf_keeps_raw_bytes() {
        let response = HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: Bytes::from_static(b"%PDF-1.4\x00\xff"),
        };
        let bytes = client().parse_get_pdf(response).unwrap();
        assert_eq!(&bytes[..], b"%PDF-1.4\x00\xff");
    }

    #[test]
    fn non_success_status_is_http_error() {
        let response = HttpResponse {
            status: 422,
            headers: Vec::new(),
            body: Bytes::from_static(b"missing parameter"),
        };
        let err = client().parse_list_countries(response).unwrap_err();
        assert!(matches!(err, ApiError::Http { status: 422, .. }));
    }

    #[test]
    fn created_status_is_success() {
        let response = HttpResponse {
            status: 201,
            headers: Vec::new(),
            body: Bytes::from_static(b"created"),
        };
        assert_eq!(client().parse_create_comment(response).unwrap(), "created");
    }

    #[test]
    fn bad_json_is_deserialization_error() {
        let err = client().parse_tours(ok("not json")).unwrap_err();
        assert!(matches!(err, ApiError::Deserialization(_)));
    }
}
