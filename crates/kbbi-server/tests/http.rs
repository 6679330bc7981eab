use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use tower::util::ServiceExt;

use kbbi_lexicon::{AssetKey, LoadMode, asset};
use kbbi_server::assets::{AssetConfig, DICTIONARY_ASSET, ROTATION_ASSET, load_dictionary};
use kbbi_server::handlers::{AppState, router};
use kbbi_types::{AssetBundle, Entry, Lemma, Stats};

const KEY_HEX: &str = "00112233445566778899aabbccddeeff";
const NONCE_HEX: &str = "0102030405060708090a0b0c";

fn bundle() -> AssetBundle {
    let lemma = |text: &str, entries: &[&str]| {
        Lemma::new(text, entries.iter().map(|e| Entry::titled(*e)).collect())
    };
    AssetBundle {
        stats: Stats {
            edition: "VI".into(),
            entry_count: 6,
            lemma_count: 4,
        },
        lemmas: vec![
            lemma("apel", &["apel (1)", "apel (2)"]),
            lemma("apél", &["apél"]),
            lemma("termometer maks/min", &["termometer maks/min"]),
            lemma("kafé", &["kafé (1)", "kafé (2)"]),
        ],
    }
}

async fn make_state(disable_cache: bool) -> AppState {
    let key = AssetKey::from_hex(KEY_HEX, NONCE_HEX).unwrap();
    let tempdir = tempfile::tempdir().unwrap();
    std::fs::write(
        tempdir.path().join(DICTIONARY_ASSET),
        asset::seal(&bundle(), &key).unwrap(),
    )
    .unwrap();
    std::fs::write(
        tempdir.path().join(ROTATION_ASSET),
        asset::seal(&[4i64, 4], &key).unwrap(),
    )
    .unwrap();
    let dictionary = load_dictionary(&AssetConfig {
        directory: tempdir.path().to_path_buf(),
        key,
        dictionary_url: None,
        load_mode: LoadMode::Owned,
    })
    .await
    .unwrap();
    AppState {
        dictionary: Arc::new(dictionary),
        max_page_size: 2,
        disable_cache,
    }
}

async fn app() -> Router {
    router(make_state(false).await)
}

async fn get(app: Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body_bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let body = serde_json::from_slice(&body_bytes).unwrap_or(serde_json::Value::Null);
    (status, headers, body)
}

fn location(headers: &axum::http::HeaderMap) -> &str {
    headers[header::LOCATION].to_str().unwrap()
}

fn error_message(body: &serde_json::Value) -> String {
    body["error"].as_str().unwrap_or_default().to_lowercase()
}

#[tokio::test]
async fn healthz_ok() {
    let response = app()
        .await
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn home_reports_stats() {
    let (status, headers, body) = get(app().await, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["edition"], "VI");
    assert_eq!(body["stats"]["lemmaCount"], 4);
    assert!(headers.contains_key(header::CACHE_CONTROL));
}

#[tokio::test]
async fn entry_returns_all_senses() {
    let (status, headers, body) = get(app().await, "/api/v1/entry/apel").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lemma"], "apel");
    assert_eq!(body["entries"].as_array().unwrap().len(), 2);
    assert_eq!(body["entries"][1]["entry"], "apel (2)");
    assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=300");
}

#[tokio::test]
async fn entry_sense_from_query_and_path() {
    let (status, _, body) = get(app().await, "/api/v1/entry/apel?entryNo=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entries"].as_array().unwrap().len(), 1);
    assert_eq!(body["entries"][0]["entry"], "apel (2)");

    // the suffix in the path wins over the query
    let (status, _, body) = get(app().await, "/api/v1/entry/apel%20(1)?entryNo=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entries"][0]["entry"], "apel (1)");
}

#[tokio::test]
async fn entry_falls_back_to_diacritic_free_form() {
    let (status, _, body) = get(app().await, "/api/v1/entry/kafe").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lemma"], "kafé");
}

#[tokio::test]
async fn entry_with_slash_is_found() {
    let (status, _, body) = get(app().await, "/api/v1/entry/termometer%20maks%2Fmin").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lemma"], "termometer maks/min");
}

#[tokio::test]
async fn entry_errors_map_to_statuses() {
    let (status, _, body) = get(app().await, "/api/v1/entry/jeruk").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(error_message(&body).contains("lemma not found"));

    let (status, _, body) = get(app().await, "/api/v1/entry/apel?entryNo=3").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(error_message(&body).contains("entry not found"));

    let (status, _, body) = get(app().await, "/api/v1/entry/apel?entryNo=-1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error_message(&body).contains("entry number"));

    let (status, _, body) = get(app().await, "/api/v1/entry/apel?entryNo=satu").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error_message(&body).contains("entryno"));

    let (status, _, _) = get(
        app().await,
        "/api/v1/entry/termometer%20maks%2Fmin%20fahrenheit",
    )
    .await;
    assert_eq!(status, StatusCode::URI_TOO_LONG);
}

#[tokio::test]
async fn entry_redirects_to_lowercase() {
    let (status, headers, _) = get(app().await, "/api/v1/entry/Apel?entryNo=1").await;
    assert_eq!(status, StatusCode::MOVED_PERMANENTLY);
    assert_eq!(location(&headers), "apel?entryNo=1");

    let (status, headers, _) = get(app().await, "/api/v1/entry/Termometer%20maks%2Fmin").await;
    assert_eq!(status, StatusCode::MOVED_PERMANENTLY);
    assert_eq!(location(&headers), "termometer%20maks%2Fmin");
}

#[tokio::test]
async fn wotd_redirects_to_rotation_lemma() {
    let (status, headers, _) = get(app().await, "/api/v1/entry/_wotd").await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(location(&headers), "kaf%C3%A9");
}

#[tokio::test]
async fn random_redirects_to_a_lemma() {
    let (status, headers, _) = get(app().await, "/api/v1/entry/_random").await;
    assert_eq!(status, StatusCode::FOUND);
    let target = urlencoding::decode(location(&headers)).unwrap().into_owned();
    assert!(bundle().lemmas.iter().any(|l| l.lemma == target));
}

#[tokio::test]
async fn search_by_prefix() {
    let (status, _, body) = get(app().await, "/api/v1/search?prefix=ap&limit=10").await;
    assert_eq!(status, StatusCode::OK);
    // limit is clamped to the configured page size
    assert_eq!(body["limit"], 2);
    let items: Vec<&str> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["lemma"].as_str().unwrap())
        .collect();
    assert_eq!(items, vec!["apel", "apél"]);

    let (status, _, body) = get(app().await, "/api/v1/search?prefix=zzz").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn search_without_prefix_uses_bundle_order() {
    let (status, _, body) = get(app().await, "/api/v1/search?limit=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"][0]["lemma"], "apel");

    let (status, _, body) = get(app().await, "/api/v1/search?limit=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error_message(&body).contains("limit"));
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let (status, _, body) = get(app().await, "/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not found");
}

#[tokio::test]
async fn cache_headers_can_be_disabled() {
    let app = router(make_state(true).await);
    let (status, headers, _) = get(app, "/api/v1/entry/apel").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!headers.contains_key(header::CACHE_CONTROL));
}
