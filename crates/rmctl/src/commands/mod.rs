//! Command implementations

pub mod operation;
pub mod profile;
pub mod resource;

use anyhow::Result;
use serde_json::Value;

/// Pretty-print JSON to stdout
pub fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
