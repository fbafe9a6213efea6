//! Time-series adapter against a mock backend
//!
//! The mock keeps imported lines in memory and answers instant and range
//! queries from them, so writes and reads can be checked end to end.

use pulse::schema::{Labels, Sample, TimeseriesData, METRIC_NAME_LABEL};
use pulse::timeseries::{BackendConfig, RangeQuery, TimeseriesClient};
use pulse::Error;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Default)]
struct MockBackend {
    imports: Vec<Value>,
    queries: Vec<(String, HashMap<String, String>)>,
}

type Shared = Arc<Mutex<MockBackend>>;

async fn import(State(state): State<Shared>, body: String) -> impl IntoResponse {
    let line: Value = match serde_json::from_str(&body) {
        Ok(line) => line,
        Err(_) => return (StatusCode::BAD_REQUEST, "cannot parse import line".to_string()),
    };
    if line["metric"]["__name__"] == "rejected" {
        return (StatusCode::BAD_REQUEST, "metric rejected by backend".to_string());
    }
    state.lock().imports.push(line);
    (StatusCode::NO_CONTENT, String::new())
}

fn matching(state: &MockBackend, query: &str) -> Vec<Value> {
    state
        .imports
        .iter()
        .filter(|line| line["metric"]["__name__"] == query)
        .cloned()
        .collect()
}

fn error_body(query: &str) -> Option<(StatusCode, Json<Value>)> {
    (query == "broken").then(|| {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "status": "error",
                "errorType": "422",
                "error": "cannot parse query \"broken\""
            })),
        )
    })
}

async fn instant(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let query = params.get("query").cloned().unwrap_or_default();
    let mut guard = state.lock();
    guard.queries.push(("/api/v1/query".to_string(), params));

    if let Some(error) = error_body(&query) {
        return error;
    }
    if query == "garbage" {
        return (
            StatusCode::OK,
            Json(json!({"status": "success", "data": {"resultType": "vector", "result": [
                {"metric": {"__name__": "garbage"}, "value": [1, "abc"]}
            ]}})),
        );
    }

    let result: Vec<Value> = matching(&guard, &query)
        .into_iter()
        .map(|line| {
            let last = line["values"].as_array().and_then(|v| v.last()).cloned();
            let ts = line["timestamps"].as_array().and_then(|t| t.last()).cloned();
            json!({
                "metric": line["metric"],
                "value": [ts, last.map(|v| v.to_string())]
            })
        })
        .collect();

    (
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "data": {"resultType": "vector", "result": result},
            "stats": {"seriesFetched": result.len().to_string(), "executionTimeMsec": 1}
        })),
    )
}

async fn range(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let query = params.get("query").cloned().unwrap_or_default();
    let mut guard = state.lock();
    guard.queries.push(("/api/v1/query_range".to_string(), params));

    if let Some(error) = error_body(&query) {
        return error;
    }

    let result: Vec<Value> = matching(&guard, &query)
        .into_iter()
        .map(|line| {
            let values: Vec<Value> = line["timestamps"]
                .as_array()
                .into_iter()
                .flatten()
                .zip(line["values"].as_array().into_iter().flatten())
                .map(|(ts, v)| json!([ts, v.to_string()]))
                .collect();
            json!({"metric": line["metric"], "values": values})
        })
        .collect();

    (
        StatusCode::OK,
        Json(json!({"status": "success", "data": {"resultType": "matrix", "result": result}})),
    )
}

async fn start_backend() -> (Shared, TimeseriesClient) {
    let state: Shared = Arc::new(Mutex::new(MockBackend::default()));
    let app = Router::new()
        .route("/api/v1/import", post(import))
        .route("/api/v1/query", get(instant))
        .route("/api/v1/query_range", get(range))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = TimeseriesClient::new(BackendConfig {
        base_url: format!("http://{addr}"),
        timeout: Duration::from_secs(5),
    })
    .unwrap();
    (state, client)
}

fn series(name: &str, job: &str, samples: &[(f64, i64)]) -> TimeseriesData {
    let mut labels = Labels::new();
    labels.insert(METRIC_NAME_LABEL.to_string(), name.to_string());
    labels.insert("job".to_string(), job.to_string());
    samples
        .iter()
        .fold(TimeseriesData::new(labels), |ts, (v, t)| ts.with_sample(*v, *t))
}

#[tokio::test]
async fn test_write_posts_one_import_line_per_series() {
    let (state, client) = start_backend().await;
    let input = vec![
        series("up", "api", &[(1.0, 1000), (0.0, 2000)]),
        series("up", "db", &[(1.0, 1000)]),
    ];

    assert_eq!(client.write(&input).await.unwrap(), 2);

    let imports = state.lock().imports.clone();
    assert_eq!(imports.len(), 2);
    assert_eq!(imports[0]["metric"], json!({"__name__": "up", "job": "api"}));
    assert_eq!(imports[0]["values"], json!([1.0, 0.0]));
    assert_eq!(imports[0]["timestamps"], json!([1000, 2000]));
    assert_eq!(imports[1]["metric"]["job"], "db");
}

#[tokio::test]
async fn test_write_stops_at_rejected_series() {
    let (state, client) = start_backend().await;
    let input = vec![
        series("up", "a", &[(1.0, 1)]),
        series("rejected", "b", &[(1.0, 1)]),
        series("up", "c", &[(1.0, 1)]),
    ];

    match client.write(&input).await.unwrap_err() {
        Error::Backend { status, message } => {
            assert_eq!(status, Some(400));
            assert!(message.contains("rejected"));
        }
        other => panic!("expected backend error, got {other:?}"),
    }
    assert_eq!(state.lock().imports.len(), 1);
}

#[tokio::test]
async fn test_write_without_metric_name_sends_nothing() {
    let (state, client) = start_backend().await;
    let unnamed = TimeseriesData::new(Labels::new()).with_sample(1.0, 1);

    assert!(matches!(
        client.write(&[unnamed]).await.unwrap_err(),
        Error::InvalidRequest(_)
    ));
    assert!(state.lock().imports.is_empty());
}

#[tokio::test]
async fn test_written_series_read_back_by_range_query() {
    let (_state, client) = start_backend().await;
    let written = series("temperature", "lab", &[(20.5, 1000), (21.0, 2000), (21.5, 3000)]);
    client.write(std::slice::from_ref(&written)).await.unwrap();

    let read = client
        .query_range(&RangeQuery::new("temperature").with_window("0", "4000", "1s"))
        .await
        .unwrap();

    assert_eq!(read, vec![written]);
}

#[tokio::test]
async fn test_single_sample_series_read_back_by_instant_query() {
    let (_state, client) = start_backend().await;
    let written = series("pressure", "lab", &[(101.3, 5000)]);
    client.write(std::slice::from_ref(&written)).await.unwrap();

    let read = client.query_instant("pressure").await.unwrap();
    assert_eq!(read, vec![written]);
}

#[tokio::test]
async fn test_instant_query_returns_one_sample_per_series() {
    let (state, client) = start_backend().await;
    client
        .write(&[
            series("up", "a", &[(0.0, 1000), (1.0, 2000)]),
            series("up", "b", &[(1.0, 2000)]),
        ])
        .await
        .unwrap();

    let read = client.query_instant("up").await.unwrap();
    assert_eq!(read.len(), 2);
    assert!(read.iter().all(|ts| ts.samples.len() == 1));
    assert_eq!(read[0].samples[0], Sample::new(1.0, 2000));

    let queries = state.lock().queries.clone();
    assert_eq!(queries[0].0, "/api/v1/query");
    assert_eq!(queries[0].1.get("query").map(String::as_str), Some("up"));
}

#[tokio::test]
async fn test_range_query_forwards_window() {
    let (state, client) = start_backend().await;
    client
        .query_range(&RangeQuery::new("up").with_window("100", "200", "15s"))
        .await
        .unwrap();

    let queries = state.lock().queries.clone();
    let (path, params) = &queries[0];
    assert_eq!(path, "/api/v1/query_range");
    assert_eq!(params.get("start").map(String::as_str), Some("100"));
    assert_eq!(params.get("end").map(String::as_str), Some("200"));
    assert_eq!(params.get("step").map(String::as_str), Some("15s"));
}

#[tokio::test]
async fn test_incomplete_window_falls_back_to_instant_query() {
    let (state, client) = start_backend().await;
    client.write(&[series("up", "a", &[(1.0, 5000)])]).await.unwrap();

    let mut query = RangeQuery::new("up").with_window("100", "200", "15s");
    query.step = Some(String::new());
    let read = client.query_range(&query).await.unwrap();

    assert_eq!(read.len(), 1);
    assert_eq!(read[0].samples, vec![Sample::new(1.0, 5000)]);
    assert_eq!(state.lock().queries[0].0, "/api/v1/query");
}

#[tokio::test]
async fn test_unparseable_value_is_parse_error() {
    let (_state, client) = start_backend().await;
    assert!(matches!(
        client.query_instant("garbage").await.unwrap_err(),
        Error::Parse { .. }
    ));
}

#[tokio::test]
async fn test_backend_query_error_keeps_message() {
    let (_state, client) = start_backend().await;
    match client.query_instant("broken").await.unwrap_err() {
        Error::Backend { status, message } => {
            assert_eq!(status, Some(422));
            assert!(message.contains("cannot parse query"));
        }
        other => panic!("expected backend error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_backend_is_backend_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = TimeseriesClient::new(BackendConfig {
        base_url: format!("http://{addr}"),
        timeout: Duration::from_secs(2),
    })
    .unwrap();

    assert!(matches!(
        client.query_instant("up").await.unwrap_err(),
        Error::Backend { status: None, .. }
    ));
}
