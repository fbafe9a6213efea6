//! Backend wire format and transcoding
//!
//! Writes use the bulk-import line format, one JSON object per series:
//! `{"metric": {"__name__": .., <label>: ..}, "values": [..], "timestamps": [..]}`.
//!
//! Reads come back in one of two shapes. Instant results carry one
//! `"value": [ts, "v"]` pair per series, range results carry
//! `"values": [[ts, "v"], ..]`. Each shape has its own typed schema so a
//! response of the wrong shape is a decode error rather than a bad sample.

use crate::schema::{Labels, Sample, TimeseriesData, METRIC_NAME_LABEL};
use crate::{Error, Result};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const STATUS_SUCCESS: &str = "success";
const RESULT_TYPE_VECTOR: &str = "vector";
const RESULT_TYPE_MATRIX: &str = "matrix";

/// One import line for the backend write endpoint
#[derive(Debug, Serialize)]
pub struct ImportLine<'a> {
    pub metric: BTreeMap<&'a str, &'a str>,
    pub values: Vec<f64>,
    pub timestamps: Vec<i64>,
}

/// Query response envelope shared by both query modes
#[derive(Debug, Deserialize)]
pub struct QueryResponse<R> {
    pub status: String,
    pub data: Option<QueryData<R>>,
    #[serde(rename = "errorType", default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QueryData<R> {
    #[serde(rename = "resultType")]
    pub result_type: String,
    pub result: Vec<R>,
}

/// `[timestamp, "value"]` as returned by the backend
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SamplePair(pub f64, pub String);

impl SamplePair {
    /// Decode into a sample. The timestamp is taken as-is, truncated to an integer.
    pub fn to_sample(&self) -> Result<Sample> {
        let value = parse_sample_value(&self.1)?;
        Ok(Sample::new(value, self.0 as i64))
    }
}

/// One series of an instant query result
#[derive(Debug, Deserialize)]
pub struct InstantSeries {
    #[serde(default)]
    pub metric: Labels,
    pub value: SamplePair,
}

/// One series of a range query result
#[derive(Debug, Deserialize)]
pub struct RangeSeries {
    #[serde(default)]
    pub metric: Labels,
    pub values: Vec<SamplePair>,
}

/// Parse a backend sample value string.
pub fn parse_sample_value(raw: &str) -> Result<f64> {
    raw.trim().parse::<f64>().map_err(|e| Error::Parse {
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Build the import line for one series.
///
/// The metric object carries every label; `__name__` must be present.
pub fn encode_import_line(series: &TimeseriesData) -> Result<String> {
    match series.metric_name() {
        Some(name) if !name.is_empty() => {}
        _ => {
            return Err(Error::InvalidRequest(format!(
                "timeseries is missing the {METRIC_NAME_LABEL} label"
            )))
        }
    }

    let line = ImportLine {
        metric: series
            .labels
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect(),
        values: series.samples.iter().map(|s| s.value).collect(),
        timestamps: series.samples.iter().map(|s| s.timestamp).collect(),
    };

    serde_json::to_string(&line)
        .map_err(|e| Error::Serialization(format!("failed to encode import line: {e}")))
}

fn decode_envelope<R: serde::de::DeserializeOwned>(
    body: &[u8],
    expected_type: &str,
) -> Result<Vec<R>> {
    let response: QueryResponse<R> = serde_json::from_slice(body)
        .map_err(|e| Error::Decode(format!("unexpected query response shape: {e}")))?;

    if response.status != STATUS_SUCCESS {
        let message = match (response.error_type, response.error) {
            (Some(kind), Some(msg)) => format!("{kind}: {msg}"),
            (None, Some(msg)) => msg,
            (Some(kind), None) => kind,
            (None, None) => format!("query returned status '{}'", response.status),
        };
        return Err(Error::Backend {
            status: None,
            message,
        });
    }

    let data = response
        .data
        .ok_or_else(|| Error::Decode("successful query response has no data".to_string()))?;
    if data.result_type != expected_type {
        return Err(Error::Decode(format!(
            "expected {expected_type} result, got {}",
            data.result_type
        )));
    }
    Ok(data.result)
}

/// Decode an instant query response: one single-sample series per result.
pub fn decode_instant(body: &[u8]) -> Result<Vec<TimeseriesData>> {
    decode_envelope::<InstantSeries>(body, RESULT_TYPE_VECTOR)?
        .into_iter()
        .map(|series| {
            let sample = series.value.to_sample()?;
            Ok(TimeseriesData {
                labels: series.metric,
                samples: vec![sample],
            })
        })
        .collect()
}

/// Decode a range query response. Any unparseable value fails the whole response.
pub fn decode_range(body: &[u8]) -> Result<Vec<TimeseriesData>> {
    decode_envelope::<RangeSeries>(body, RESULT_TYPE_MATRIX)?
        .into_iter()
        .map(|series| {
            let samples = series
                .values
                .iter()
                .map(SamplePair::to_sample)
                .collect::<Result<Vec<_>>>()?;
            Ok(TimeseriesData {
                labels: series.metric,
                samples,
            })
        })
        .collect()
}
