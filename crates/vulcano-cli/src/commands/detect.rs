//! Detect command implementation.

use anyhow::Result;

use vulcano_core::{Backend, LocalBackend};

/// Prints this host's OS facts as JSON.
pub fn run() -> Result<u8> {
    let info = LocalBackend::new().os_info();
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(0)
}
