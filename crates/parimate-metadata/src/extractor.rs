use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use parimate_types::ParimateError;

/// Tag name (group prefix stripped) to raw tag value.
pub type MetadataMap = BTreeMap<String, Value>;

/// Reads container and codec tags from a media file.
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<MetadataMap, ParimateError>;
}

/// Runs the `exiftool` binary in JSON mode, including unknown and embedded
/// tags from every group.
#[derive(Debug, Clone)]
pub struct ExifTool {
    pub binary: PathBuf,
}

impl Default for ExifTool {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("exiftool"),
        }
    }
}

/// Flatten exiftool `-j -G0` output into a single tag map.
///
/// `Group:Tag` keys lose their group; when the same tag appears in several
/// groups the first one listed wins.
pub fn flatten_exiftool_json(raw: &[u8]) -> Result<MetadataMap, ParimateError> {
    let parsed: Value = serde_json::from_slice(raw)
        .map_err(|e| ParimateError::Extraction(format!("unreadable exiftool output: {e}")))?;
    let object = parsed
        .as_array()
        .and_then(|items| items.first())
        .and_then(Value::as_object)
        .ok_or_else(|| ParimateError::Extraction("exiftool returned no records".to_string()))?;

    let mut map = MetadataMap::new();
    for (key, value) in object {
        let tag = key.rsplit_once(':').map_or(key.as_str(), |(_, tag)| tag);
        if tag == "SourceFile" {
            continue;
        }
        map.entry(tag.to_string()).or_insert_with(|| value.clone());
    }
    Ok(map)
}

#[async_trait]
impl MetadataExtractor for ExifTool {
    async fn extract(&self, path: &Path) -> Result<MetadataMap, ParimateError> {
        let output = tokio::process::Command::new(&self.binary)
            .args(["-j", "-G0", "-a", "-u", "-ee"])
            .arg(path)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .output()
            .await
            .map_err(|e| ParimateError::Extraction(format!("failed to spawn exiftool: {e}")))?;

        if !output.status.success() {
            return Err(ParimateError::Extraction(format!(
                "exiftool exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        flatten_exiftool_json(&output.stdout)
    }
}

/// Tag value as text. Numbers are rendered, everything else is skipped.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Tag value as a number, parsing numeric strings.
pub fn value_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
