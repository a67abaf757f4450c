use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};

#[derive(Clone, Debug, Serialize)]
pub struct Comment {
    pub id: u64,
    pub body: String,
    pub activity_id: String,
    pub updated_at: String,
}

#[derive(Deserialize)]
pub struct CreateComment {
    pub body: String,
    pub activity_id: String,
}

#[derive(Deserialize)]
pub struct HikeParams {
    #[serde(default)]
    pub typ: String,
}

struct Activity {
    id: u64,
    name: &'static str,
    description: &'static str,
    source: &'static str,
    activity_type_id: u64,
    location_ids: &'static [u64],
}

struct Place {
    id: u64,
    name: &'static str,
    lat: f64,
    long: f64,
    region_id: u64,
    location_type_id: u64,
}

const COUNTRIES: &[(u64, &str, &str)] = &[(1, "Schweiz", "CH"), (2, "Österreich", "AT")];
const REGIONS: &[(u64, &str, u64)] = &[(1, "Graubünden", 1), (2, "St. Gallen", 1), (3, "Tirol", 2)];
const ACTIVITY_TYPES: &[(u64, &str)] = &[(1, "Wanderung"), (2, "Skitour")];
const LOCATION_TYPES: &[(u64, &str)] = &[(1, "Gipfel"), (2, "Ortschaft")];
const LOCATIONS: &[Place] = &[
    Place { id: 1, name: "Piz Languard", lat: 46.50, long: 9.95, region_id: 1, location_type_id: 1 },
    Place { id: 2, name: "Pontresina", lat: 46.49, long: 9.90, region_id: 1, location_type_id: 2 },
    Place { id: 3, name: "Säntis", lat: 47.25, long: 9.34, region_id: 2, location_type_id: 1 },
    Place { id: 4, name: "Zugspitze", lat: 47.42, long: 10.98, region_id: 3, location_type_id: 1 },
];
const ACTIVITIES: &[Activity] = &[
    Activity {
        id: 1,
        name: "Piz Languard",
        description: "Aussichtsberg über Pontresina",
        source: "sac",
        activity_type_id: 1,
        location_ids: &[1, 2],
    },
    Activity {
        id: 2,
        name: "Säntis Nordwand",
        description: "Steiler Aufstieg. Wer schafft's? Gipfel >2500 m",
        source: "sac",
        activity_type_id: 1,
        location_ids: &[3],
    },
    Activity {
        id: 3,
        name: "Zugspitze Reintal",
        description: "Lange Tour durchs Reintal",
        source: "dav",
        activity_type_id: 2,
        location_ids: &[4],
    },
];

pub const PDF_BYTES: &[u8] = b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n1 0 obj\n<<>>\nendobj\n%%EOF\n";

/// Shared mock state: stored writes plus fault injection and a request counter.
#[derive(Default)]
pub struct MockState {
    comments: RwLock<Vec<Comment>>,
    hikes: RwLock<Vec<u64>>,
    failures_left: AtomicUsize,
    requests: AtomicUsize,
}

impl MockState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer the next `n` requests with 503.
    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Requests received so far, failed ones included.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

pub type Db = Arc<MockState>;

pub fn app() -> Router {
    app_with(MockState::new())
}

pub fn app_with(db: Db) -> Router {
    let main = Router::new()
        .route("/find_tour/{*blob}", get(find_tour))
        .route("/find_tour_by_area/{*blob}", get(find_tour_by_area))
        .route("/find_tour_by_term/{*blob}", get(find_tour_by_term))
        .route("/find/activity/{id}/{*blob}", get(find_activity))
        .route("/list/activity/{*blob}", get(list_activity))
        .route("/list/activity_type/{*blob}", get(list_activity_type))
        .route("/list/location/{*blob}", get(list_location))
        .route("/list/location_type/{*blob}", get(list_location_type))
        .route("/list/country/{*blob}", get(list_country))
        .route("/list/region/{*blob}", get(list_region))
        .route("/list/comment/{*blob}", get(list_comment))
        .route("/create/comment", post(create_comment))
        .route("/file/{id}", get(file))
        .route("/hike/{id}", get(hike))
        .route("/stats/hikes/{id}", get(hike_stats))
        .route("/stats", get(stats));

    Router::new()
        .nest("/main", main)
        .layer(middleware::from_fn_with_state(db.clone(), count_and_inject))
        .with_state(db)
}

pub async fn run_with(listener: TcpListener, db: Db) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(db)).await
}

async fn count_and_inject(State(db): State<Db>, request: Request, next: Next) -> Response {
    let n = db.requests.fetch_add(1, Ordering::SeqCst) + 1;
    let injected = db
        .failures_left
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
        .is_ok();
    if injected {
        tracing::info!(request = n, uri = %request.uri(), "injecting failure");
        return (StatusCode::SERVICE_UNAVAILABLE, "injected failure").into_response();
    }
    tracing::debug!(request = n, method = %request.method(), uri = %request.uri(), "handling request");
    next.run(request).await
}

// -- blob handling ------------------------------------------------------------

fn decode(blob: &str) -> Result<Value, StatusCode> {
    let bytes = STANDARD.decode(blob).map_err(|_| StatusCode::BAD_REQUEST)?;
    let value: Value = serde_json::from_slice(&bytes).map_err(|_| StatusCode::BAD_REQUEST)?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(StatusCode::BAD_REQUEST)
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn columns(params: &Value, key: &str) -> Option<Vec<String>> {
    params[key]
        .as_array()
        .map(|cols| cols.iter().filter_map(|c| c.as_str().map(str::to_string)).collect())
}

/// Filter by `keys`, sort by `order_by`, then project to `output` / `only`.
fn shape(rows: Vec<Value>, params: &Value) -> Vec<Value> {
    let mut rows: Vec<Value> = rows
        .into_iter()
        .filter(|row| match params["keys"].as_object() {
            Some(keys) => keys.iter().all(|(k, v)| as_text(&row[k]) == as_text(v)),
            None => true,
        })
        .collect();

    if let Some(column) = params["order_by"]["column"].as_str() {
        rows.sort_by_key(|row| as_text(&row[column]));
        if params["order_by"]["dir"] == "desc" {
            rows.reverse();
        }
    }

    match columns(params, "output").or_else(|| columns(params, "only")) {
        Some(cols) => rows.into_iter().map(|row| project(&row, &cols)).collect(),
        None => rows,
    }
}

fn project(row: &Value, cols: &[String]) -> Value {
    let mut out = Map::new();
    for col in cols {
        if let Some(v) = row.get(col) {
            out.insert(col.clone(), v.clone());
        }
    }
    Value::Object(out)
}

// -- fixture lookups ----------------------------------------------------------

fn activity_row(a: &Activity) -> Value {
    json!({
        "id": a.id,
        "name": a.name,
        "description": a.description,
        "source": a.source,
        "activity_type_id": a.activity_type_id,
    })
}

fn place(id: u64) -> Option<&'static Place> {
    LOCATIONS.iter().find(|l| l.id == id)
}

fn region_of(place: &Place) -> Option<&'static (u64, &'static str, u64)> {
    REGIONS.iter().find(|r| r.0 == place.region_id)
}

fn country_of(place: &Place) -> Option<&'static (u64, &'static str, &'static str)> {
    region_of(place).and_then(|r| COUNTRIES.iter().find(|c| c.0 == r.2))
}

fn places(a: &Activity) -> impl Iterator<Item = &'static Place> + '_ {
    a.location_ids.iter().filter_map(|id| place(*id))
}

/// Join location, region and country of the first place. Callers project
/// away what the request did not ask for.
fn with_first_place(mut row: Value, a: &Activity) -> Value {
    if let Some(first) = places(a).next() {
        row["get_location"] = json!(first.name);
        row["get_region"] = json!(region_of(first).map(|r| r.1));
        row["get_country"] = json!(country_of(first).map(|c| c.2));
    }
    row
}

fn keep_joined(params: &mut Value, joined: &[&str]) {
    let mut cols = columns(params, "output").unwrap_or_default();
    cols.extend(joined.iter().map(|c| c.to_string()));
    params["output"] = json!(cols);
}

// -- tour handlers ------------------------------------------------------------

async fn find_tour(Path(blob): Path<String>) -> Result<Json<Vec<Value>>, StatusCode> {
    let params = decode(&blob)?;
    let (Some(lat), Some(long), Some(dist)) = (
        params["lat"].as_f64(),
        params["long"].as_f64(),
        params["dist"].as_f64(),
    ) else {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    };
    // Square box around the point, 111 km per degree.
    let deg = dist / 111.0;
    let rows = ACTIVITIES
        .iter()
        .filter(|a| places(a).any(|p| (p.lat - lat).abs() <= deg && (p.long - long).abs() <= deg))
        .map(activity_row)
        .collect();
    Ok(Json(shape(rows, &params)))
}

async fn find_tour_by_area(Path(blob): Path<String>) -> Result<Json<Vec<Value>>, StatusCode> {
    let mut params = decode(&blob)?;
    let keys = params["keys"].take();
    let country = keys.get("country_id").map(as_text);
    let region = keys.get("id").map(as_text);

    let in_area = |a: &&Activity| {
        places(a).any(|p| match (&country, &region) {
            (Some(c), _) => country_of(p).is_some_and(|found| found.0.to_string() == *c),
            (None, Some(r)) => p.region_id.to_string() == *r,
            (None, None) => false,
        })
    };
    let rows: Vec<Value> = ACTIVITIES
        .iter()
        .filter(in_area)
        .map(|a| with_first_place(activity_row(a), a))
        .collect();

    keep_joined(&mut params, &["get_location", "get_region"]);
    Ok(Json(shape(rows, &params)))
}

async fn find_tour_by_term(Path(blob): Path<String>) -> Result<Json<Vec<Value>>, StatusCode> {
    let mut params = decode(&blob)?;
    let Some(term) = params["term"].as_str().map(str::to_lowercase) else {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    };
    let rows: Vec<Value> = ACTIVITIES
        .iter()
        .filter(|a| a.name.to_lowercase().contains(&term) || a.description.to_lowercase().contains(&term))
        .map(|a| with_first_place(activity_row(a), a))
        .collect();

    keep_joined(&mut params, &["get_location", "get_region", "get_country"]);
    Ok(Json(shape(rows, &params)))
}

async fn find_activity(Path((id, blob)): Path<(u64, String)>) -> Result<Json<Value>, StatusCode> {
    let params = decode(&blob)?;
    let a = ACTIVITIES.iter().find(|a| a.id == id).ok_or(StatusCode::NOT_FOUND)?;

    let mut row = match columns(&params, "output") {
        Some(cols) => project(&activity_row(a), &cols),
        None => activity_row(a),
    };
    row["get_activity_type"] = json!(ACTIVITY_TYPES.iter().find(|t| t.0 == a.activity_type_id).map(|t| t.1));
    row["get_country_all"] = json!(places(a).filter_map(country_of).map(|c| c.2).collect::<Vec<_>>());
    row["get_location_all"] = json!(places(a).map(|p| p.name).collect::<Vec<_>>());
    row["get_location_type_all"] = json!(places(a).map(|p| p.location_type_id).collect::<Vec<_>>());
    Ok(Json(row))
}

// -- lookup lists -------------------------------------------------------------

fn listing(blob: &str, rows: Vec<Value>) -> Result<Json<Vec<Value>>, StatusCode> {
    let params = decode(blob)?;
    Ok(Json(shape(rows, &params)))
}

fn id_name(rows: &[(u64, &str)]) -> Vec<Value> {
    rows.iter().map(|(id, name)| json!({ "id": id, "name": name })).collect()
}

async fn list_activity(Path(blob): Path<String>) -> Result<Json<Vec<Value>>, StatusCode> {
    listing(&blob, ACTIVITIES.iter().map(activity_row).collect())
}

async fn list_activity_type(Path(blob): Path<String>) -> Result<Json<Vec<Value>>, StatusCode> {
    listing(&blob, id_name(ACTIVITY_TYPES))
}

async fn list_location(Path(blob): Path<String>) -> Result<Json<Vec<Value>>, StatusCode> {
    listing(&blob, LOCATIONS.iter().map(|p| json!({ "id": p.id, "name": p.name })).collect())
}

async fn list_location_type(Path(blob): Path<String>) -> Result<Json<Vec<Value>>, StatusCode> {
    listing(&blob, id_name(LOCATION_TYPES))
}

async fn list_country(Path(blob): Path<String>) -> Result<Json<Vec<Value>>, StatusCode> {
    let rows = COUNTRIES
        .iter()
        .map(|(id, name, abbreviation)| json!({ "id": id, "name": name, "abbreviation": abbreviation }))
        .collect();
    listing(&blob, rows)
}

async fn list_region(Path(blob): Path<String>) -> Result<Json<Vec<Value>>, StatusCode> {
    let rows = REGIONS
        .iter()
        .map(|(id, name, country_id)| json!({ "id": id, "name": name, "country_id": country_id }))
        .collect();
    listing(&blob, rows)
}

// -- comments, files, hikes ---------------------------------------------------

async fn list_comment(State(db): State<Db>, Path(blob): Path<String>) -> Result<Json<Vec<Value>>, StatusCode> {
    let rows = db.comments.read().await.iter().map(|c| json!(c)).collect();
    listing(&blob, rows)
}

async fn create_comment(State(db): State<Db>, Json(input): Json<CreateComment>) -> (StatusCode, &'static str) {
    let mut comments = db.comments.write().await;
    let id = comments.len() as u64 + 1;
    comments.push(Comment {
        id,
        body: input.body,
        activity_id: input.activity_id,
        updated_at: format!("2020-01-01T00:00:{:02}", id % 60),
    });
    (StatusCode::CREATED, "created")
}

async fn file(Path(id): Path<u64>) -> Result<impl IntoResponse, StatusCode> {
    if !ACTIVITIES.iter().any(|a| a.id == id) {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(([(header::CONTENT_TYPE, "application/pdf")], PDF_BYTES))
}

async fn hike(
    State(db): State<Db>,
    Path(id): Path<u64>,
    Query(params): Query<HikeParams>,
) -> Result<Json<Value>, StatusCode> {
    if !ACTIVITIES.iter().any(|a| a.id == id) {
        return Err(StatusCode::BAD_REQUEST);
    }
    db.hikes.write().await.push(id);
    Ok(Json(json!({ "activity_id": id, "typ": params.typ })))
}

async fn hike_stats(State(db): State<Db>, Path(id): Path<u64>) -> Json<Value> {
    let hikes = db.hikes.read().await.iter().filter(|h| **h == id).count();
    Json(json!({ "activity_id": id, "hikes": hikes }))
}

async fn stats(State(db): State<Db>) -> Json<Value> {
    Json(json!({
        "activities": ACTIVITIES.len(),
        "comments": db.comments.read().await.len(),
        "hikes": db.hikes.read().await.len(),
    }))
}
