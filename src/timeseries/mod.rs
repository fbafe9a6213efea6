//! Time-series protocol adapter
//!
//! Moves [`TimeseriesData`](crate::schema::TimeseriesData) between the
//! gateway and a VictoriaMetrics-compatible backend: bulk import for writes,
//! instant and range queries for reads.

mod client;
pub mod wire;

pub use client::{
    BackendConfig, RangeQuery, TimeseriesClient, IMPORT_PATH, QUERY_PATH, QUERY_RANGE_PATH,
};
pub use wire::{decode_instant, decode_range, encode_import_line, parse_sample_value};
