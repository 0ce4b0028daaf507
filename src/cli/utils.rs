//! Utility functions for CLI operations.

use crate::error::{AgoraError, Result};
use serde::Serialize;
use serde_json::Value;

/// Converts a value to JSON for output.
pub fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| AgoraError::serialization(format!("Failed to encode output: {}", e)))
}

/// Prints a JSON value to stdout.
pub fn print_json(value: &Value) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| AgoraError::serialization(format!("Failed to encode output: {}", e)))?;
    println!("{}", text);
    Ok(())
}
