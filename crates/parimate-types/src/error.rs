use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::check::CheckId;
use crate::session::{SessionEvent, SessionState};
use crate::task::{OwnerId, TaskId};

/// Why a single frame produced no reflection score.
///
/// These never fail a video on their own: the frame is dropped from the
/// session mean.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum DetectionError {
    #[error("no face detected")]
    NoFace,

    #[error("{0} faces detected, expected exactly one")]
    MultipleFaces(usize),

    #[error("eye landmarks are degenerate: {0}")]
    DegenerateEye(String),

    #[error("corneal mask is empty")]
    EmptyCornea,

    #[error("iris mask vanished after erosion")]
    EmptyIris,

    #[error("no highlight or pupil pixels in either eye")]
    EmptyReflection,

    #[error("landmark detector failed: {0}")]
    Landmarker(String),
}

#[derive(Debug, Error)]
pub enum ParimateError {
    #[error("Metadata extraction failed: {0}")]
    Extraction(String),

    #[error("Detection failed: {0}")]
    Detection(#[from] DetectionError),

    #[error("External service error ({service}): {message}")]
    ExternalService { service: String, message: String },

    #[error("Cannot read video {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("A verification session is already running for owner {owner_id} task {task_id}")]
    SessionBusy { owner_id: OwnerId, task_id: TaskId },

    #[error("Session transition error: cannot transition from {from:?} via {event:?}")]
    InvalidSessionTransition {
        from: SessionState,
        event: SessionEvent,
    },

    #[error("Check {0} already reported for this session")]
    DuplicateResult(CheckId),

    #[error("Check {0} was not dispatched for this session")]
    UnexpectedResult(CheckId),

    #[error("No reference face stored for owner {0}")]
    ReferenceMissing(OwnerId),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ParimateError {
    pub fn external(service: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::ExternalService {
            service: service.into(),
            message: message.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        Self::Io {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

impl From<serde_json::Error> for ParimateError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ParimateError>;
