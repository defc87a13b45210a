use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use parimate_types::{
    CheckOutcome, CheckResult, Evidence, MetadataConfig, MetadataFailurePolicy, ParimateError,
};

use crate::extractor::{ExifTool, MetadataExtractor, MetadataMap};
use crate::heuristics;
use crate::report::MetadataReport;

/// Outcome of the metadata pass over one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum MetadataVerdict {
    Clean { report: MetadataReport },
    Flagged { report: MetadataReport },
    /// The tags could not be read at all.
    Unverifiable { reason: String },
}

impl MetadataVerdict {
    pub fn is_flagged(&self) -> bool {
        matches!(self, MetadataVerdict::Flagged { .. })
    }

    /// Map the verdict to a signal outcome under the given failure policy.
    pub fn to_result(&self, policy: MetadataFailurePolicy) -> CheckResult {
        match self {
            MetadataVerdict::Clean { report } => CheckResult::new(
                CheckOutcome::Correct,
                Evidence {
                    samples: report.buckets.len(),
                    ..Evidence::default()
                },
            ),
            MetadataVerdict::Flagged { report } => CheckResult::new(
                CheckOutcome::Fake,
                Evidence {
                    samples: report.buckets.len(),
                    notes: report.lines(),
                    ..Evidence::default()
                },
            ),
            MetadataVerdict::Unverifiable { reason } => match policy {
                MetadataFailurePolicy::FailOpen => {
                    CheckResult::inconclusive(format!("metadata unreadable: {reason}"))
                }
                MetadataFailurePolicy::FailClosed => CheckResult::new(
                    CheckOutcome::Fake,
                    Evidence {
                        notes: vec![format!("metadata unreadable: {reason}")],
                        ..Evidence::default()
                    },
                ),
            },
        }
    }
}

/// Container metadata forensics: extract tags, run the heuristics.
#[derive(Clone)]
pub struct MetadataForensics {
    extractor: Arc<dyn MetadataExtractor>,
    config: MetadataConfig,
}

impl MetadataForensics {
    pub fn new(extractor: Arc<dyn MetadataExtractor>, config: MetadataConfig) -> Self {
        Self { extractor, config }
    }

    /// Forensics backed by the `exiftool` binary on `PATH`.
    pub fn with_exiftool(config: MetadataConfig) -> Self {
        Self::new(Arc::new(ExifTool::default()), config)
    }

    pub fn config(&self) -> &MetadataConfig {
        &self.config
    }

    pub async fn extract(&self, path: &Path) -> Result<MetadataMap, ParimateError> {
        self.extractor.extract(path).await
    }

    pub fn analyze(&self, map: &MetadataMap) -> MetadataReport {
        heuristics::analyze(map, &self.config)
    }

    /// Extract and analyze. Extraction failures become `Unverifiable`.
    pub async fn check(&self, path: &Path) -> MetadataVerdict {
        let map = match self.extract(path).await {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Metadata extraction failed");
                return MetadataVerdict::Unverifiable {
                    reason: e.to_string(),
                };
            }
        };

        let report = self.analyze(&map);
        if report.is_clean() {
            tracing::debug!(path = %path.display(), tags = map.len(), "Metadata clean");
            MetadataVerdict::Clean { report }
        } else {
            tracing::info!(
                path = %path.display(),
                flagged = ?report.flagged(),
                "Metadata flagged"
            );
            MetadataVerdict::Flagged { report }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct FixedTags(Option<MetadataMap>);

    #[async_trait]
    impl MetadataExtractor for FixedTags {
        async fn extract(&self, _path: &Path) -> Result<MetadataMap, ParimateError> {
            self.0
                .clone()
                .ok_or_else(|| ParimateError::Extraction("tool missing".to_string()))
        }
    }

    fn forensics(tags: Option<MetadataMap>) -> MetadataForensics {
        MetadataForensics::new(Arc::new(FixedTags(tags)), MetadataConfig::default())
    }

    #[tokio::test]
    async fn test_software_tag_is_flagged() {
        let mut tags = MetadataMap::new();
        tags.insert("Software".into(), json!("Adobe Premiere"));
        let verdict = forensics(Some(tags)).check(Path::new("v.mp4")).await;
        assert!(verdict.is_flagged());

        let result = verdict.to_result(MetadataFailurePolicy::FailOpen);
        assert_eq!(result.outcome, CheckOutcome::Fake);
        assert!(result.evidence.notes[0].contains("Adobe Premiere"));
    }

    #[tokio::test]
    async fn test_empty_tags_are_clean() {
        let verdict = forensics(Some(MetadataMap::new()))
            .check(Path::new("v.mp4"))
            .await;
        assert!(matches!(verdict, MetadataVerdict::Clean { .. }));
        assert_eq!(
            verdict.to_result(MetadataFailurePolicy::FailOpen).outcome,
            CheckOutcome::Correct
        );
    }

    #[tokio::test]
    async fn test_unreadable_follows_policy() {
        let verdict = forensics(None).check(Path::new("v.mp4")).await;
        assert!(matches!(verdict, MetadataVerdict::Unverifiable { .. }));
        assert_eq!(
            verdict.to_result(MetadataFailurePolicy::FailOpen).outcome,
            CheckOutcome::Inconclusive
        );
        assert_eq!(
            verdict.to_result(MetadataFailurePolicy::FailClosed).outcome,
            CheckOutcome::Fake
        );
    }
}
