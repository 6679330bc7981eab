use std::sync::Arc;

use axum::extract::{Path, Query, RawQuery, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use kbbi_lexicon::{Dictionary, LookupError, Sense, parse_sense_key};
use kbbi_types::{Lemma, Stats};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error};

const DEFAULT_SEARCH_LIMIT: usize = 10;
const ENDPOINTS: [&str; 4] = [
    "/api/v1/entry/{entry}",
    "/api/v1/entry/_random",
    "/api/v1/entry/_wotd",
    "/api/v1/search?prefix={prefix}&limit={limit}",
];

#[derive(Clone)]
pub struct AppState {
    pub dictionary: Arc<Dictionary>,
    pub max_page_size: usize,
    pub disable_cache: bool,
}

#[derive(Deserialize)]
pub struct EntryQuery {
    #[serde(rename = "entryNo")]
    pub entry_no: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub prefix: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct HomeResponse<'a> {
    message: &'static str,
    stats: &'a Stats,
    endpoints: [&'static str; 4],
}

#[derive(Serialize)]
pub struct SearchResponse<'a> {
    prefix: &'a str,
    limit: usize,
    items: Vec<&'a Lemma>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/healthz", get(healthz))
        .route("/api/v1/entry/_random", get(random))
        .route("/api/v1/entry/_wotd", get(lemma_of_the_day))
        .route("/api/v1/entry/{entry}", get(entry))
        .route("/api/v1/search", get(search))
        .fallback(not_found)
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    "ok"
}

async fn not_found() -> ApiError {
    ApiError::NotFound("not found".to_string())
}

async fn home(State(state): State<AppState>) -> Response {
    let body = Json(HomeResponse {
        message: "Welcome to the (unofficial) KBBI API",
        stats: state.dictionary.stats(),
        endpoints: ENDPOINTS,
    });
    cacheable(&state, "public, max-age=3600", body)
}

async fn entry(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    RawQuery(raw_query): RawQuery,
    Query(params): Query<EntryQuery>,
) -> Result<Response, ApiError> {
    let lowered = raw.to_lowercase();
    if lowered != raw {
        let mut location = urlencoding::encode(&lowered).into_owned();
        if let Some(query) = raw_query.filter(|q| !q.is_empty()) {
            location.push('?');
            location.push_str(&query);
        }
        return redirect(StatusCode::MOVED_PERMANENTLY, &location);
    }

    // A `(N)` suffix in the path takes precedence over `entryNo`.
    let (key, sense) = match parse_sense_key(&raw) {
        Some((key, number)) => (key, Sense::Number(number.into())),
        None => (raw.as_str(), parse_entry_no(params.entry_no.as_deref())?),
    };

    let view = state.dictionary.lookup(key, sense).map_err(|err| {
        debug!("lookup of {key:?} failed: {err}");
        ApiError::from(err)
    })?;
    Ok(cacheable(&state, "public, max-age=300", Json(view)))
}

fn parse_entry_no(raw: Option<&str>) -> Result<Sense, ApiError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(Sense::All),
        Some(value) => value
            .parse::<i64>()
            .map(Sense::Number)
            .map_err(|_| ApiError::bad_request("unexpected `entryNo` query")),
    }
}

async fn random(State(state): State<AppState>) -> Result<Response, ApiError> {
    let lemma = state.dictionary.random_lemma();
    redirect(StatusCode::FOUND, &urlencoding::encode(&lemma.lemma))
}

async fn lemma_of_the_day(State(state): State<AppState>) -> Result<Response, ApiError> {
    let lemma = state.dictionary.lemma_of_the_day()?;
    redirect(StatusCode::FOUND, &urlencoding::encode(&lemma.lemma))
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Result<Response, ApiError> {
    let mut limit = params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    if limit == 0 {
        return Err(ApiError::bad_request("limit must be >= 1"));
    }
    if limit > state.max_page_size {
        limit = state.max_page_size;
    }

    let prefix = params.prefix.unwrap_or_default();
    let items = state.dictionary.search(&prefix, limit);
    let response = SearchResponse {
        prefix: &prefix,
        limit,
        items,
    };
    Ok(cacheable(&state, "public, max-age=300", Json(response)))
}

fn cacheable(state: &AppState, policy: &'static str, body: impl IntoResponse) -> Response {
    if state.disable_cache {
        return body.into_response();
    }
    (
        [(header::CACHE_CONTROL, HeaderValue::from_static(policy))],
        body,
    )
        .into_response()
}

fn redirect(status: StatusCode, location: &str) -> Result<Response, ApiError> {
    let location = HeaderValue::from_str(location).map_err(|err| {
        error!("cannot build redirect location {location:?}: {err}");
        ApiError::Internal
    })?;
    Ok((status, [(header::LOCATION, location)]).into_response())
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    UriTooLong(String),
    #[error("internal server error")]
    Internal,
}

impl ApiError {
    fn bad_request<T: Into<String>>(msg: T) -> Self {
        ApiError::BadRequest(msg.into())
    }
}

impl From<LookupError> for ApiError {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::EmptyKey => ApiError::bad_request("empty lemma"),
            LookupError::InvalidSenseNumber(n) => {
                ApiError::bad_request(format!("invalid entry number: {n}"))
            }
            LookupError::NotFound | LookupError::SenseNotFound => {
                ApiError::NotFound(err.to_string())
            }
            LookupError::KeyTooLong => ApiError::UriTooLong("lemma is too long".to_string()),
            LookupError::RotationIndexOutOfRange(_)
            | LookupError::RotationSlotOutOfRange { .. } => {
                error!("asset data integrity failure: {err}");
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::UriTooLong(_) => StatusCode::URI_TOO_LONG,
            ApiError::Internal => {
                let body = Json(json!({ "error": "internal server error" }));
                return (StatusCode::INTERNAL_SERVER_ERROR, body).into_response();
            }
        };
        let body = Json(ErrorResponse {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}
