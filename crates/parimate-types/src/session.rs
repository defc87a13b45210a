use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ParimateError;
use crate::check::{CheckId, CheckReport, Verdict};
use crate::task::{OwnerId, TaskId};

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Dispatched,
    Collecting,
    Finalizing,
}

/// Events that drive session state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionEvent {
    Dispatch,
    StartCollecting,
    AllReported,
    Reset,
}

impl SessionState {
    /// Attempt a state transition given an event.
    pub fn transition(self, event: SessionEvent) -> super::error::Result<SessionState> {
        match (self, event) {
            (SessionState::Idle, SessionEvent::Dispatch) => Ok(SessionState::Dispatched),
            (SessionState::Dispatched, SessionEvent::StartCollecting) => {
                Ok(SessionState::Collecting)
            }
            (SessionState::Collecting, SessionEvent::AllReported) => Ok(SessionState::Finalizing),
            (SessionState::Finalizing, SessionEvent::Reset) => Ok(SessionState::Idle),
            (state, event) => Err(ParimateError::InvalidSessionTransition { from: state, event }),
        }
    }
}

/// Bookkeeping for one in-flight video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationSession {
    pub id: Uuid,
    pub owner_id: OwnerId,
    pub task_id: TaskId,
    pub video_path: Option<PathBuf>,
    pub started_at: DateTime<Utc>,
    pub state: SessionState,
    expected: Vec<CheckId>,
    collected: Vec<CheckReport>,
}

impl VerificationSession {
    pub fn new(owner_id: OwnerId, task_id: TaskId, video_path: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            task_id,
            video_path: Some(video_path),
            started_at: Utc::now(),
            state: SessionState::Idle,
            expected: Vec::new(),
            collected: Vec::new(),
        }
    }

    /// Fix the set of checks this session waits for and move to Dispatched.
    pub fn dispatch(&mut self, checks: Vec<CheckId>) -> super::error::Result<()> {
        self.state = self.state.transition(SessionEvent::Dispatch)?;
        self.expected = checks;
        self.collected.clear();
        Ok(())
    }

    pub fn apply_event(&mut self, event: SessionEvent) -> super::error::Result<()> {
        self.state = self.state.transition(event)?;
        Ok(())
    }

    pub fn expected_count(&self) -> usize {
        self.expected.len()
    }

    pub fn collected(&self) -> &[CheckReport] {
        &self.collected
    }

    /// Record one report. Returns `true` once every expected check has
    /// reported. A check that already reported, or was never dispatched,
    /// is rejected and leaves the session untouched.
    pub fn record(&mut self, report: CheckReport) -> super::error::Result<bool> {
        if self.state != SessionState::Collecting {
            return Err(ParimateError::Internal(format!(
                "session {} is {:?}, not collecting",
                self.id, self.state
            )));
        }
        if !self.expected.contains(&report.check) {
            return Err(ParimateError::UnexpectedResult(report.check));
        }
        if self.collected.iter().any(|r| r.check == report.check) {
            return Err(ParimateError::DuplicateResult(report.check));
        }
        self.collected.push(report);
        Ok(self.is_complete())
    }

    pub fn is_complete(&self) -> bool {
        self.collected.len() == self.expected.len()
    }

    pub fn missing(&self) -> Vec<CheckId> {
        self.expected
            .iter()
            .copied()
            .filter(|id| !self.collected.iter().any(|r| r.check == *id))
            .collect()
    }

    /// Drain the collected reports into a verdict and reset to Idle. Takes the
    /// video path out so it can be discarded exactly once.
    pub fn finish(&mut self) -> super::error::Result<(Verdict, Option<PathBuf>)> {
        if self.state != SessionState::Finalizing {
            return Err(ParimateError::InvalidSessionTransition {
                from: self.state,
                event: SessionEvent::Reset,
            });
        }
        let verdict = Verdict {
            session_id: self.id,
            owner_id: self.owner_id,
            task_id: self.task_id,
            results: std::mem::take(&mut self.collected),
            finished_at: Utc::now(),
        };
        let video = self.video_path.take();
        self.apply_event(SessionEvent::Reset)?;
        Ok((verdict, video))
    }
}
