// JSON persistence for detection results

use std::fs;
use std::io;
use std::path::Path;

use super::models::DetectionResult;

/// Write `result` as indented JSON (non-ASCII kept as is), creating the parent directory
pub fn write_result(result: &DetectionResult, destination: &Path) -> io::Result<()> {
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let json = serde_json::to_string_pretty(result)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    fs::write(destination, json)
}

pub fn read_result(source: &Path) -> io::Result<DetectionResult> {
    let content = fs::read_to_string(source)?;
    serde_json::from_str(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
