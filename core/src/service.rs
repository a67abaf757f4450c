//! Async tour API operations.
//!
//! # Design
//! `TourDb` joins the stateless `TourClient` with a `Transport`. Every
//! operation builds one request, runs it under the `RetryPolicy` its method
//! allows (`READ` for idempotent GETs, `NONE` for the comment POST), parses the answer, and reports any
//! failure through the `ErrorHook` exactly once before returning it. Nothing
//! is shared between calls, and nothing happens until the returned future
//! is polled; dropping it abandons the request.

use bytes::Bytes;
use serde_json::Value;

use crate::client::TourClient;
use crate::config::ClientConfig;
use crate::error::{ApiError, ErrorHook};
use crate::http::{HttpRequest, HttpResponse};
use crate::query::{TourQuery, TourSearch};
use crate::retry::RetryPolicy;
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{ActivityType, Comment, Country, Location, LocationType, NewComment, Region, Tour};

#[derive(Debug)]
pub struct TourDb<T = ReqwestTransport> {
    client: TourClient,
    transport: T,
    on_error: ErrorHook,
}

impl TourDb<ReqwestTransport> {
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new(config.timeout)?;
        Ok(Self::new(TourClient::new(&config.api_url), transport))
    }
}

impl<T: Transport> TourDb<T> {
    pub fn new(client: TourClient, transport: T) -> Self {
        Self {
            client,
            transport,
            on_error: ErrorHook::default(),
        }
    }

    pub fn with_error_hook(mut self, hook: ErrorHook) -> Self {
        self.on_error = hook;
        self
    }

    pub fn client(&self) -> &TourClient {
        &self.client
    }

    fn prepare(&self, built: Result<HttpRequest, ApiError>) -> Result<HttpRequest, ApiError> {
        built.map_err(|e| self.on_error.report(e))
    }

    async fn execute<R, P>(&self, request: HttpRequest, parse: P) -> Result<R, ApiError>
    where
        P: Fn(HttpResponse) -> Result<R, ApiError>,
    {
        let policy = RetryPolicy::for_method(request.method);
        let transport = &self.transport;
        let request = &request;
        let parse = &parse;
        policy
            .run(|| async move { parse(transport.send(request).await?) })
            .await
            .map_err(|e| self.on_error.report(e))
    }

    /// List tours for a search form. Returns `Ok(None)` without any request
    /// when the form has no filter set.
    pub async fn list_tours(&self, search: &TourSearch) -> Result<Option<Vec<Tour>>, ApiError> {
        let Some(query) = search.resolve() else {
            tracing::debug!("tour search without filter, nothing to request");
            return Ok(None);
        };
        self.tours(&query).await.map(Some)
    }

    pub async fn tours(&self, query: &TourQuery) -> Result<Vec<Tour>, ApiError> {
        let request = self.prepare(self.client.build_list_tours(query))?;
        self.execute(request, |r| self.client.parse_tours(r)).await
    }

    pub async fn tour(&self, id: &str) -> Result<Tour, ApiError> {
        let request = self.prepare(self.client.build_get_tour(id))?;
        self.execute(request, |r| self.client.parse_tour(r)).await
    }

    pub async fn tours_by_term(&self, term: &str) -> Result<Vec<Tour>, ApiError> {
        let request = self.prepare(self.client.build_tours_by_term(term))?;
        self.execute(request, |r| self.client.parse_tours(r)).await
    }

    pub async fn comments(&self, activity_id: &str) -> Result<Vec<Comment>, ApiError> {
        let request = self.prepare(self.client.build_list_comments(activity_id))?;
        self.execute(request, |r| self.client.parse_list_comments(r, activity_id))
            .await
    }

    /// Post a comment. Never retried: the backend may have stored the first
    /// attempt even if its answer was lost.
    pub async fn create_comment(&self, comment: &NewComment) -> Result<String, ApiError> {
        let request = self.prepare(self.client.build_create_comment(comment))?;
        self.execute(request, |r| self.client.parse_create_comment(r))
            .await
    }

    /// Raw bytes of the tour's PDF document.
    pub async fn pdf(&self, activity_id: &str) -> Result<Bytes, ApiError> {
        let request = self.client.build_get_pdf(activity_id);
        self.execute(request, |r| self.client.parse_get_pdf(r)).await
    }

    pub async fn activity_types(&self) -> Result<Vec<ActivityType>, ApiError> {
        let request = self.prepare(self.client.build_list_activity_types())?;
        self.execute(request, |r| self.client.parse_list_activity_types(r))
            .await
    }

    pub async fn locations(&self) -> Result<Vec<Location>, ApiError> {
        let request = self.prepare(self.client.build_list_locations())?;
        self.execute(request, |r| self.client.parse_list_locations(r)).await
    }

    pub async fn location_types(&self) -> Result<Vec<LocationType>, ApiError> {
        let request = self.prepare(self.client.build_list_location_types())?;
        self.execute(request, |r| self.client.parse_list_location_types(r))
            .await
    }

    pub async fn countries(&self) -> Result<Vec<Country>, ApiError> {
        let request = self.prepare(self.client.build_list_countries())?;
        self.execute(request, |r| self.client.parse_list_countries(r)).await
    }

    pub async fn regions(&self, country_id: &str) -> Result<Vec<Region>, ApiError> {
        let request = self.prepare(self.client.build_list_regions(country_id))?;
        self.execute(request, |r| self.client.parse_list_regions(r)).await
    }

    /// Record a hike event of kind `typ` for a tour.
    pub async fn hike(&self, activity_id: &str, typ: &str) -> Result<Value, ApiError> {
        let request = self.client.build_hike(activity_id, typ);
        self.execute(request, |r| self.client.parse_value(r)).await
    }

    pub async fn hike_stats(&self, activity_id: &str) -> Result<Value, ApiError> {
        let request = self.client.build_hike_stats(activity_id);
        self.execute(request, |r| self.client.parse_value(r)).await
    }

    pub async fn general_stats(&self) -> Result<Value, ApiError> {
        let request = self.client.build_general_stats();
        self.execute(request, |r| self.client.parse_value(r)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;
    use crate::query::GeoFilter;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Answers requests from a fixed script and records what was sent.
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<HttpResponse, ApiError>>>,
        sent: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<HttpResponse, ApiError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                sent: Mutex::new(Vec::new()),
            }
        }

        fn sent(&self) -> Vec<HttpRequest> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
            self.sent.lock().unwrap().push(request.clone());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::Transport("script exhausted".to_string())))
        }
    }

    fn ok(body: &str) -> Result<HttpResponse, ApiError> {
        Ok(HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: Bytes::from(body.to_string()),
        })
    }

    fn unavailable(n: usize) -> Result<HttpResponse, ApiError> {
        Ok(HttpResponse {
            status: 503,
            headers: Vec::new(),
            body: Bytes::from(format!("down {n}")),
        })
    }

    fn db(script: Vec<Result<HttpResponse, ApiError>>) -> (TourDb<ScriptedTransport>, Arc<AtomicUsize>) {
        let reported = Arc::new(AtomicUsize::new(0));
        let counter = reported.clone();
        let db = TourDb::new(
            TourClient::new("http://localhost:5000"),
            ScriptedTransport::new(script),
        )
        .with_error_hook(ErrorHook::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        (db, reported)
    }

    #[tokio::test]
    async fn search_without_filter_sends_nothing() {
        let (db, reported) = db(vec![]);
        let result = db.list_tours(&TourSearch::default()).await.unwrap();
        assert!(result.is_none());
        assert!(db.transport.sent().is_empty());
        assert_eq!(reported.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn coordinate_search_beats_country() {
        let (db, _) = db(vec![ok("[]")]);
        let search = TourSearch {
            coordinate: Some(GeoFilter {
                lat: 47.0,
                long: 9.0,
                dist: 5.0,
            }),
            country: Some("2".to_string()),
            region: None,
        };
        db.list_tours(&search).await.unwrap();
        let sent = db.transport.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].url.starts_with("http://localhost:5000/main/find_tour/"));
    }

    #[tokio::test]
    async fn read_succeeds_after_three_failures() {
        let (db, reported) = db(vec![
            unavailable(1),
            Err(ApiError::Transport("reset".to_string())),
            unavailable(3),
            ok(r#"[{"id":1,"name":"Schwarzhorn"}]"#),
        ]);
        let tours = db.tours_by_term("horn").await.unwrap();
        assert_eq!(tours[0].name, "Schwarzhorn");
        assert_eq!(db.transport.sent().len(), 4);
        assert_eq!(reported.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn read_fails_with_last_error_after_four_failures() {
        let (db, reported) = db(vec![unavailable(1), unavailable(2), unavailable(3), unavailable(4), ok("[]")]);
        let err = db.countries().await.unwrap_err();
        assert!(matches!(err, ApiError::Http { status: 503, ref body } if body == "down 4"));
        assert_eq!(db.transport.sent().len(), 4);
        assert_eq!(reported.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn client_errors_are_retried_too() {
        let not_found = Ok(HttpResponse {
            status: 404,
            headers: Vec::new(),
            body: Bytes::new(),
        });
        let (db, _) = db(vec![not_found, ok(r#"{"id":3,"name":"Piz Sol"}"#)]);
        let tour = db.tour("3").await.unwrap();
        assert_eq!(tour.name, "Piz Sol");
        assert_eq!(db.transport.sent().len(), 2);
    }

    #[tokio::test]
    async fn create_comment_is_not_retried() {
        let (db, reported) = db(vec![unavailable(1), Ok(HttpResponse {
            status: 201,
            headers: Vec::new(),
            body: Bytes::from_static(b"created"),
        })]);
        let comment = NewComment {
            body: "Icy at the top".to_string(),
            activity_id: "3".to_string(),
        };
        let err = db.create_comment(&comment).await.unwrap_err();
        assert!(matches!(err, ApiError::Http { status: 503, .. }));
        let sent = db.transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, HttpMethod::Post);
        assert_eq!(reported.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn malformed_payload_is_retried_then_reported() {
        let (db, reported) = db(vec![ok("{"), ok("{"), ok("{"), ok("{")]);
        let err = db.general_stats().await.unwrap_err();
        assert!(matches!(err, ApiError::Deserialization(_)));
        assert_eq!(db.transport.sent().len(), 4);
        assert_eq!(reported.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pdf_is_returned_as_bytes() {
        let (db, _) = db(vec![Ok(HttpResponse {
            status: 200,
            headers: vec![("content-type".to_string(), "application/pdf".to_string())],
            body: Bytes::from_static(b"%PDF-1.7"),
        })]);
        let pdf = db.pdf("8").await.unwrap();
        assert_eq!(&pdf[..], b"%PDF-1.7");
    }

    #[tokio::test]
    async fn hike_passes_type_tag() {
        let (db, _) = db(vec![ok(r#"{"activity_id":8,"typ":"done"}"#)]);
        let value = db.hike("8", "done").await.unwrap();
        assert_eq!(value["typ"], "done");
        assert_eq!(db.transport.sent()[0].url, "http://localhost:5000/main/hike/8?typ=done");
    }

    #[tokio::test]
    async fn comments_carry_activity_id() {
        let (db, _) = db(vec![ok(r#"[{"id":1,"body":"a","updated_at":"t1"},{"id":2,"body":"b","updated_at":"t2"}]"#)]);
        let comments = db.comments("8").await.unwrap();
        assert_eq!(comments.len(), 2);
        assert!(comments.iter().all(|c| c.activity_id == "8"));
        assert_eq!(comments[1].body, "b");
    }
}
