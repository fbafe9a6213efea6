//! Gateway operations exposed to callers
//!
//! Transport-independent: the HTTP handlers are thin wrappers over these.

use crate::ingestion::IngestionPipeline;
use crate::schema::{IngestBatch, TimeseriesData, ValidationSample};
use crate::timeseries::{RangeQuery, TimeseriesClient};
use crate::Result;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Status of an ingest call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestResponse {
    pub status: String,
    /// Records committed before any failure
    pub written: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// New validation rule request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewValidationRequest {
    pub metric_name: String,
    pub source_id: String,
    pub min_value: f64,
    pub max_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewValidationResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
}

/// Validate-only request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidateRequest {
    pub source_id: String,
    #[serde(default)]
    pub metrics: Vec<ValidationSample>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub success: bool,
    pub message: String,
}

/// Timeseries write request
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WriteRequest {
    #[serde(default)]
    pub timeseries: Vec<TimeseriesData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteResponse {
    pub status: String,
    pub written: usize,
}

/// Timeseries returned by either query mode
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReadResponse {
    pub timeseries: Vec<TimeseriesData>,
}

pub const WRITE_SUCCESS_STATUS: &str = "Timeseries written successfully";

/// The six gateway operations over a pipeline and a backend client
pub struct GatewayService {
    pipeline: Arc<IngestionPipeline>,
    timeseries: TimeseriesClient,
}

impl GatewayService {
    pub fn new(pipeline: Arc<IngestionPipeline>, timeseries: TimeseriesClient) -> Self {
        Self {
            pipeline,
            timeseries,
        }
    }

    pub fn pipeline(&self) -> &Arc<IngestionPipeline> {
        &self.pipeline
    }

    /// Ingest a batch. A failed write is reported in the response, not as an error.
    pub async fn ingest(&self, batch: &IngestBatch) -> IngestResponse {
        let report = self.pipeline.ingest(batch).await;
        IngestResponse {
            status: report.status().to_string(),
            written: report.written,
            error: report.error.map(|e| e.to_string()),
        }
    }

    pub async fn add_validation_rule(
        &self,
        request: &NewValidationRequest,
    ) -> Result<NewValidationResponse> {
        let id = self
            .pipeline
            .add_validation(
                &request.metric_name,
                &request.source_id,
                request.min_value,
                request.max_value,
            )
            .await?;
        Ok(NewValidationResponse {
            success: true,
            id: Some(id),
        })
    }

    pub async fn validate(&self, request: &ValidateRequest) -> Result<ValidateResponse> {
        let outcome = self
            .pipeline
            .validate(&request.source_id, &request.metrics)
            .await?;
        Ok(ValidateResponse {
            success: outcome.valid,
            message: outcome.message,
        })
    }

    pub async fn write_timeseries(&self, request: &WriteRequest) -> Result<WriteResponse> {
        let written = self.timeseries.write(&request.timeseries).await?;
        Ok(WriteResponse {
            status: WRITE_SUCCESS_STATUS.to_string(),
            written,
        })
    }

    pub async fn query_instant(&self, query: &str) -> Result<ReadResponse> {
        Ok(ReadResponse {
            timeseries: self.timeseries.query_instant(query).await?,
        })
    }

    pub async fn query_range(&self, query: &RangeQuery) -> Result<ReadResponse> {
        Ok(ReadResponse {
            timeseries: self.timeseries.query_range(query).await?,
        })
    }
}
