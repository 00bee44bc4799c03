//! Control payload decoding

use super::path::{extract_position, PathSpec};
use super::position::BlindPosition;
use crate::error::DecodeError;
use serde_json::Value;

/// Turns raw payload bytes into a validated position
#[derive(Debug, Clone, Default)]
pub struct PayloadDecoder {
    path: PathSpec,
}

impl PayloadDecoder {
    pub fn new(path: PathSpec) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathSpec {
        &self.path
    }

    /// Parse `payload` as JSON and read the configured field.
    ///
    /// The parsed tree lives only for the duration of this call.
    pub fn decode(&self, payload: &[u8]) -> Result<BlindPosition, DecodeError> {
        let tree: Value = serde_json::from_slice(payload)
            .map_err(|e| DecodeError::parse_error(e.to_string()))?;
        extract_position(&tree, &self.path)
    }
}
