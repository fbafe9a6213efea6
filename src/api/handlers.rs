//! HTTP handlers for the gateway operations

use super::service::{
    IngestResponse, NewValidationRequest, NewValidationResponse, ReadResponse, ValidateRequest,
    ValidateResponse, WriteRequest, WriteResponse,
};
use super::ApiState;
use crate::schema::IngestBatch;
use crate::timeseries::RangeQuery;
use crate::Error;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Error body returned by every endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub error: String,
}

/// Crate error rendered as an HTTP response
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

pub fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::InvalidRequest(_) | Error::Decode(_) => StatusCode::BAD_REQUEST,
        Error::Backend { .. } | Error::Parse { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            warn!(error = %self.0, "Request failed");
        }
        let body = ErrorResponse {
            status: "error".to_string(),
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// POST /api/v1/ingest
pub async fn ingest(
    State(state): State<ApiState>,
    Json(batch): Json<IngestBatch>,
) -> (StatusCode, Json<IngestResponse>) {
    let response = state.service.ingest(&batch).await;
    let status = if response.error.is_none() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(response))
}

/// POST /api/v1/validation-rules
pub async fn add_validation_rule(
    State(state): State<ApiState>,
    Json(request): Json<NewValidationRequest>,
) -> Result<Json<NewValidationResponse>, ApiError> {
    Ok(Json(state.service.add_validation_rule(&request).await?))
}

/// POST /api/v1/validate
pub async fn validate(
    State(state): State<ApiState>,
    Json(request): Json<ValidateRequest>,
) -> Result<Json<ValidateResponse>, ApiError> {
    Ok(Json(state.service.validate(&request).await?))
}

/// POST /api/v1/timeseries/write
pub async fn write_timeseries(
    State(state): State<ApiState>,
    Json(request): Json<WriteRequest>,
) -> Result<Json<WriteResponse>, ApiError> {
    Ok(Json(state.service.write_timeseries(&request).await?))
}

#[derive(Debug, Deserialize)]
pub struct InstantQueryParams {
    pub query: String,
}

/// Window parts are optional; an incomplete window becomes an instant query
#[derive(Debug, Deserialize)]
pub struct RangeQueryParams {
    pub query: String,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub step: Option<String>,
}

impl From<RangeQueryParams> for RangeQuery {
    fn from(params: RangeQueryParams) -> Self {
        RangeQuery {
            query: params.query,
            start: params.start,
            end: params.end,
            step: params.step,
        }
    }
}

/// GET /api/v1/timeseries/query
pub async fn query_instant(
    State(state): State<ApiState>,
    Query(params): Query<InstantQueryParams>,
) -> Result<Json<ReadResponse>, ApiError> {
    Ok(Json(state.service.query_instant(&params.query).await?))
}

/// GET /api/v1/timeseries/query_range
pub async fn query_range(
    State(state): State<ApiState>,
    Query(params): Query<RangeQueryParams>,
) -> Result<Json<ReadResponse>, ApiError> {
    let query = RangeQuery::from(params);
    Ok(Json(state.service.query_range(&query).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            status_for(&Error::InvalidRequest("bad".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&Error::Backend {
                status: Some(503),
                message: "down".into()
            }),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&Error::Storage("disk".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
