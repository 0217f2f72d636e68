// Typed errors with thiserror. Surface meaningful messages to JS.
// The viewport core never fails; these cover loading and host plumbing.

use thiserror::Error;
use wasm_bindgen::JsValue;

/// Engine error types.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid grid dataset: {0}")]
    InvalidGrid(String),

    #[error("Grid dataset is {columns}x{rows}, expected {expected_columns}x{expected_rows}")]
    GridDimensions {
        columns: usize,
        rows: usize,
        expected_columns: u32,
        expected_rows: u32,
    },

    #[error("Invalid occupant list: {0}")]
    InvalidOccupants(String),

    #[error("Canvas error: {0}")]
    Canvas(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

impl From<EngineError> for JsValue {
    fn from(err: EngineError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}
