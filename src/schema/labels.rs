//! Label set type and its storage encoding
//!
//! Labels are persisted as a JSON object string. `decode_labels` is the exact
//! inverse of `encode_labels` for every label set.

use crate::{Error, Result};
use std::collections::BTreeMap;

/// Reserved label key carrying the metric name on the backend wire format
pub const METRIC_NAME_LABEL: &str = "__name__";

/// Label key/value mapping. Ordered so encodings are deterministic.
pub type Labels = BTreeMap<String, String>;

/// Encode a label set into its stored string form.
pub fn encode_labels(labels: &Labels) -> Result<String> {
    serde_json::to_string(labels)
        .map_err(|e| Error::Serialization(format!("failed to encode labels: {e}")))
}

/// Decode a stored label string back into a label set.
pub fn decode_labels(encoded: &str) -> Result<Labels> {
    serde_json::from_str(encoded)
        .map_err(|e| Error::Decode(format!("stored labels are not a JSON object: {e}")))
}
