use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The fixed battery of metadata heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataCheck {
    Software,
    Time,
    AudioDuration,
    OriginalParameters,
    Comment,
    ModelDevice,
}

impl MetadataCheck {
    pub const ALL: [MetadataCheck; 6] = [
        MetadataCheck::Software,
        MetadataCheck::Time,
        MetadataCheck::AudioDuration,
        MetadataCheck::OriginalParameters,
        MetadataCheck::Comment,
        MetadataCheck::ModelDevice,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataCheck::Software => "software",
            MetadataCheck::Time => "time",
            MetadataCheck::AudioDuration => "audio_duration",
            MetadataCheck::OriginalParameters => "original_parameters",
            MetadataCheck::Comment => "comment",
            MetadataCheck::ModelDevice => "model_device",
        }
    }
}

impl fmt::Display for MetadataCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Findings per heuristic. Every heuristic has a bucket, possibly empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataReport {
    pub buckets: BTreeMap<MetadataCheck, Vec<String>>,
}

impl Default for MetadataReport {
    fn default() -> Self {
        Self {
            buckets: MetadataCheck::ALL.iter().map(|c| (*c, Vec::new())).collect(),
        }
    }
}

impl MetadataReport {
    pub fn push(&mut self, check: MetadataCheck, finding: impl Into<String>) {
        self.buckets.entry(check).or_default().push(finding.into());
    }

    pub fn findings(&self, check: MetadataCheck) -> &[String] {
        self.buckets.get(&check).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Heuristics with at least one finding.
    pub fn flagged(&self) -> Vec<MetadataCheck> {
        self.buckets
            .iter()
            .filter(|(_, findings)| !findings.is_empty())
            .map(|(check, _)| *check)
            .collect()
    }

    pub fn is_clean(&self) -> bool {
        self.buckets.values().all(Vec::is_empty)
    }

    /// `check: finding` lines for logs and evidence notes.
    pub fn lines(&self) -> Vec<String> {
        self.buckets
            .iter()
            .flat_map(|(check, findings)| findings.iter().map(move |f| format!("{check}: {f}")))
            .collect()
    }
}
