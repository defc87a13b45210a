use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ParimateError;
use crate::task::{OwnerId, Task, TaskId};

/// One independent verification run against a submitted video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CheckId {
    /// Metadata forensics, eye reflections and the learned classifier, chained.
    Deepfake,
    /// The person on camera is the account owner.
    Identity,
    /// The task phrase is spoken in the video.
    Phrase,
    /// The video content matches the task description.
    Description,
}

impl fmt::Display for CheckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CheckId::Deepfake => "deepfake",
            CheckId::Identity => "identity",
            CheckId::Phrase => "phrase",
            CheckId::Description => "description",
        };
        f.write_str(name)
    }
}

/// Sub-signals of the deepfake check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signal {
    Metadata,
    Reflection,
    Classifier,
}

/// Tagged outcome shared by every check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckOutcome {
    /// Evidence says the video is not genuine.
    Fake,
    /// Evidence supports the video.
    Correct,
    /// The check could not run to completion.
    Error,
    /// The check ran but had nothing to judge.
    Inconclusive,
}

/// Numbers and notes behind an outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub score: Option<f64>,
    pub threshold: Option<f64>,
    /// Frames, words or fields the score was computed over.
    pub samples: usize,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalResult {
    pub signal: Signal,
    pub outcome: CheckOutcome,
    pub evidence: Evidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub outcome: CheckOutcome,
    pub evidence: Evidence,
    /// Per-signal breakdown for composite checks; empty otherwise.
    pub signals: Vec<SignalResult>,
}

impl CheckResult {
    pub fn new(outcome: CheckOutcome, evidence: Evidence) -> Self {
        Self {
            outcome,
            evidence,
            signals: Vec::new(),
        }
    }

    /// Compare a score against a pass threshold: `score < threshold` is Fake.
    pub fn scored(score: f64, threshold: f64, samples: usize) -> Self {
        let outcome = if score < threshold {
            CheckOutcome::Fake
        } else {
            CheckOutcome::Correct
        };
        Self::new(
            outcome,
            Evidence {
                score: Some(score),
                threshold: Some(threshold),
                samples,
                notes: Vec::new(),
            },
        )
    }

    pub fn error(err: &ParimateError) -> Self {
        Self::new(
            CheckOutcome::Error,
            Evidence {
                notes: vec![err.to_string()],
                ..Evidence::default()
            },
        )
    }

    pub fn inconclusive(note: impl Into<String>) -> Self {
        Self::new(
            CheckOutcome::Inconclusive,
            Evidence {
                notes: vec![note.into()],
                ..Evidence::default()
            },
        )
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.evidence.notes.push(note.into());
        self
    }

    pub fn with_signals(mut self, signals: Vec<SignalResult>) -> Self {
        self.signals = signals;
        self
    }

    pub fn as_signal(&self, signal: Signal) -> SignalResult {
        SignalResult {
            signal,
            outcome: self.outcome,
            evidence: self.evidence.clone(),
        }
    }

    pub fn is_negative(&self) -> bool {
        matches!(self.outcome, CheckOutcome::Fake | CheckOutcome::Error)
    }
}

/// A check result tagged with the check that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckReport {
    pub check: CheckId,
    pub result: CheckResult,
    pub reported_at: DateTime<Utc>,
}

/// Everything a check needs to know about the submission.
#[derive(Debug, Clone)]
pub struct CheckContext {
    pub session_id: Uuid,
    pub owner_id: OwnerId,
    pub task: Task,
    pub video_path: PathBuf,
}

/// Trait for all verification checks.
///
/// Implementations may fail; the orchestrator turns an `Err` into an
/// `Error`-tagged result so every dispatched check is counted.
#[async_trait]
pub trait Check: Send + Sync {
    fn id(&self) -> CheckId;

    async fn run(&self, ctx: &CheckContext) -> Result<CheckResult, ParimateError>;
}

/// Final result list of one verification session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub session_id: Uuid,
    pub owner_id: OwnerId,
    pub task_id: TaskId,
    /// Reports in arrival order.
    pub results: Vec<CheckReport>,
    pub finished_at: DateTime<Utc>,
}

impl Verdict {
    /// No check reported Fake or Error.
    pub fn is_confirmed(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(|r| !r.result.is_negative())
    }

    pub fn result_for(&self, check: CheckId) -> Option<&CheckResult> {
        self.results
            .iter()
            .find(|r| r.check == check)
            .map(|r| &r.result)
    }
}
