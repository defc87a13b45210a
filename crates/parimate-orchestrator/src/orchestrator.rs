use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use uuid::Uuid;

use parimate_types::{
    Check, CheckContext, CheckId, CheckReport, CheckResult, OrchestratorConfig, OwnerId,
    ParimateError, SessionEvent, SessionState, TaskId, TaskRegistry, VerificationSession, Verdict,
};

use crate::artifact::ArtifactStore;
use crate::registry::SessionRegistry;

/// Called once per verdict, after the video is discarded and the
/// `(owner, task)` slot is free again. A panic inside it is logged and
/// does not keep `SessionHandle::wait` from resolving.
pub type CompletionCallback = Box<dyn FnOnce(Verdict) + Send + 'static>;

/// Sees every accepted check report as it arrives.
pub trait ResultObserver: Send + Sync {
    fn on_result(&self, session_id: Uuid, report: &CheckReport);
}

/// Handle to an in-flight session.
#[derive(Debug)]
pub struct SessionHandle {
    pub session_id: Uuid,
    verdict: oneshot::Receiver<Verdict>,
}

impl SessionHandle {
    /// Wait for the session to finalize.
    pub async fn wait(self) -> Result<Verdict, ParimateError> {
        self.verdict.await.map_err(|_| {
            ParimateError::Internal(format!(
                "session {} ended without a verdict",
                self.session_id
            ))
        })
    }
}

/// Dispatches every configured check against a submitted video.
///
/// Each submission gets its own session. Checks run concurrently as tasks
/// on a `JoinSet`; one collector task per session records their reports,
/// so every dispatched check is counted exactly once whether it passed,
/// failed, timed out or panicked. When the last report is in, the video is
/// discarded, the `(owner, task)` slot is freed and `on_complete` fires.
#[derive(Clone)]
pub struct Orchestrator {
    tasks: TaskRegistry,
    sessions: SessionRegistry,
    checks: Vec<Arc<dyn Check>>,
    artifacts: Arc<dyn ArtifactStore>,
    observer: Option<Arc<dyn ResultObserver>>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        tasks: TaskRegistry,
        sessions: SessionRegistry,
        artifacts: Arc<dyn ArtifactStore>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            tasks,
            sessions,
            checks: Vec::new(),
            artifacts,
            observer: None,
            config,
        }
    }

    /// Add a check. A check with the same id replaces the earlier one.
    pub fn with_check(mut self, check: Arc<dyn Check>) -> Self {
        let id = check.id();
        self.checks.retain(|c| c.id() != id);
        self.checks.push(check);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ResultObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn tasks(&self) -> &TaskRegistry {
        &self.tasks
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn check_ids(&self) -> Vec<CheckId> {
        self.checks.iter().map(|c| c.id()).collect()
    }

    /// Start verifying `video_path` against one of the owner's tasks.
    ///
    /// Fails with `TaskNotFound` when the task does not exist or belongs to
    /// someone else, and with `SessionBusy` while an earlier submission for
    /// the same task is still running.
    pub async fn submit_video<F>(
        &self,
        owner_id: OwnerId,
        task_id: TaskId,
        video_path: impl Into<PathBuf>,
        on_complete: F,
    ) -> Result<SessionHandle, ParimateError>
    where
        F: FnOnce(Verdict) + Send + 'static,
    {
        let task = self
            .tasks
            .get(task_id)
            .await
            .filter(|t| t.owner_id == owner_id)
            .ok_or(ParimateError::TaskNotFound(task_id))?;

        let video_path = video_path.into();
        let mut session = VerificationSession::new(owner_id, task_id, video_path.clone());
        let session_id = session.id;
        self.sessions.acquire(owner_id, task_id, session_id)?;

        if let Err(e) = session.dispatch(self.check_ids()) {
            self.sessions.release(owner_id, task_id, session_id);
            return Err(e);
        }

        let ctx = CheckContext {
            session_id,
            owner_id,
            task,
            video_path,
        };
        let deadline = self.config.check_timeout();
        let mut workers = JoinSet::new();
        let mut running = HashMap::with_capacity(self.checks.len());
        for check in &self.checks {
            let id = check.id();
            let handle = workers.spawn(run_check(check.clone(), ctx.clone(), deadline));
            running.insert(handle.id(), id);
        }

        if let Err(e) = session.apply_event(SessionEvent::StartCollecting) {
            workers.abort_all();
            self.sessions.release(owner_id, task_id, session_id);
            return Err(e);
        }

        tracing::info!(
            session_id = %session_id,
            owner = %owner_id,
            task = %task_id,
            checks = running.len(),
            "Session dispatched"
        );

        let (done, verdict) = oneshot::channel();
        let collector = Collector {
            session,
            workers,
            running,
            artifacts: self.artifacts.clone(),
            sessions: self.sessions.clone(),
            observer: self.observer.clone(),
            on_complete: Box::new(on_complete),
            done,
        };
        tokio::spawn(collector.run());

        Ok(SessionHandle {
            session_id,
            verdict,
        })
    }
}

/// Run one check to a tagged result. Never fails.
///
/// On timeout the check's future is dropped, but blocking work it already
/// handed to `spawn_blocking` (decoding, landmark detection) cannot be
/// interrupted and runs to completion in the background. The session does
/// not wait for it: the verdict is delivered and the video discarded while
/// that thread may still hold the file open.
async fn run_check(
    check: Arc<dyn Check>,
    ctx: CheckContext,
    deadline: Option<Duration>,
) -> (CheckId, CheckResult) {
    let id = check.id();
    let started = Instant::now();

    let outcome = match deadline {
        Some(limit) => match tokio::time::timeout(limit, check.run(&ctx)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ParimateError::Internal(format!(
                "{id} check timed out after {}s",
                limit.as_secs_f64()
            ))),
        },
        None => check.run(&ctx).await,
    };

    let result = match outcome {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(session_id = %ctx.session_id, check = %id, error = %e, "Check failed");
            CheckResult::error(&e)
        }
    };
    tracing::info!(
        session_id = %ctx.session_id,
        check = %id,
        outcome = ?result.outcome,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Check reported"
    );
    (id, result)
}

/// Sole writer of one session's state.
struct Collector {
    session: VerificationSession,
    workers: JoinSet<(CheckId, CheckResult)>,
    running: HashMap<tokio::task::Id, CheckId>,
    artifacts: Arc<dyn ArtifactStore>,
    sessions: SessionRegistry,
    observer: Option<Arc<dyn ResultObserver>>,
    on_complete: CompletionCallback,
    done: oneshot::Sender<Verdict>,
}

impl Collector {
    async fn run(mut self) {
        while let Some(joined) = self.workers.join_next_with_id().await {
            let (check, result) = match joined {
                Ok((_, reported)) => reported,
                Err(e) => {
                    let Some(check) = self.running.get(&e.id()).copied() else {
                        tracing::error!(session_id = %self.session.id, error = %e, "Unknown worker ended");
                        continue;
                    };
                    tracing::error!(session_id = %self.session.id, check = %check, error = %e, "Check worker died");
                    let cause = if e.is_panic() { "panicked" } else { "was cancelled" };
                    let err = ParimateError::Internal(format!("{check} check {cause}"));
                    (check, CheckResult::error(&err))
                }
            };
            self.record(check, result);
        }
        self.finalize().await;
    }

    fn record(&mut self, check: CheckId, result: CheckResult) {
        let report = CheckReport {
            check,
            result,
            reported_at: Utc::now(),
        };
        let observed = report.clone();
        match self.session.record(report) {
            Ok(_) => {
                if let Some(observer) = &self.observer {
                    observer.on_result(self.session.id, &observed);
                }
            }
            Err(e) => {
                tracing::warn!(session_id = %self.session.id, check = %check, error = %e, "Report rejected");
            }
        }
    }

    async fn finalize(mut self) {
        let session_id = self.session.id;
        let (owner_id, task_id) = (self.session.owner_id, self.session.task_id);

        let missing = self.session.missing();
        if !missing.is_empty() {
            tracing::error!(session_id = %session_id, missing = ?missing, "Finalizing with missing checks");
        }

        let finished = if self.session.state == SessionState::Collecting {
            self.session
                .apply_event(SessionEvent::AllReported)
                .and_then(|()| self.session.finish())
        } else {
            self.session.finish()
        };

        match finished {
            Ok((verdict, video)) => {
                if let Some(video) = video {
                    if let Err(e) = self.artifacts.discard(&video).await {
                        tracing::warn!(session_id = %session_id, error = %e, "Failed to discard video");
                    }
                }
                tracing::info!(
                    session_id = %session_id,
                    results = verdict.results.len(),
                    confirmed = verdict.is_confirmed(),
                    "Session finalized"
                );
                self.sessions.release(owner_id, task_id, session_id);
                let on_complete = self.on_complete;
                let delivered = verdict.clone();
                if catch_unwind(AssertUnwindSafe(move || on_complete(delivered))).is_err() {
                    tracing::error!(session_id = %session_id, "Completion callback panicked");
                }
                let _ = self.done.send(verdict);
            }
            Err(e) => {
                tracing::error!(session_id = %session_id, error = %e, "Session could not finalize");
                self.sessions.release(owner_id, task_id, session_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parimate_types::{CheckOutcome, Evidence};

    #[derive(Default)]
    struct CountingStore {
        discarded: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl ArtifactStore for CountingStore {
        async fn discard(&self, path: &Path) -> Result<(), ParimateError> {
            self.discarded.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }
    }

    enum Behaviour {
        Pass,
        Fail,
        Panic,
        Hang,
        Blocking(Duration),
        WaitFor(Arc<tokio::sync::Notify>),
    }

    struct Scripted {
        id: CheckId,
        behaviour: Behaviour,
    }

    fn scripted(id: CheckId, behaviour: Behaviour) -> Arc<dyn Check> {
        Arc::new(Scripted { id, behaviour })
    }

    #[async_trait]
    impl Check for Scripted {
        fn id(&self) -> CheckId {
            self.id
        }

        async fn run(&self, _ctx: &CheckContext) -> Result<CheckResult, ParimateError> {
            match &self.behaviour {
                Behaviour::Pass => Ok(CheckResult::new(CheckOutcome::Correct, Evidence::default())),
                Behaviour::Fail => Err(ParimateError::external("speech", "503")),
                Behaviour::Panic => panic!("model crashed"),
                Behaviour::Hang => std::future::pending().await,
                Behaviour::Blocking(busy) => {
                    let busy = *busy;
                    tokio::task::spawn_blocking(move || std::thread::sleep(busy))
                        .await
                        .map_err(|e| ParimateError::Internal(e.to_string()))?;
                    Ok(CheckResult::new(CheckOutcome::Correct, Evidence::default()))
                }
                Behaviour::WaitFor(gate) => {
                    gate.notified().await;
                    Ok(CheckResult::new(CheckOutcome::Correct, Evidence::default()))
                }
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<CheckId>>,
    }

    impl ResultObserver for Recorder {
        fn on_result(&self, _session_id: Uuid, report: &CheckReport) {
            self.seen.lock().unwrap().push(report.check);
        }
    }

    async fn setup(
        checks: Vec<Arc<dyn Check>>,
        config: OrchestratorConfig,
    ) -> (Orchestrator, Arc<CountingStore>, TaskId) {
        let tasks = TaskRegistry::new();
        let task = tasks.create(OwnerId(1), "run", "morning run", "sunrise").await;
        let store = Arc::new(CountingStore::default());
        let mut orchestrator =
            Orchestrator::new(tasks, SessionRegistry::new(), store.clone(), config);
        for check in checks {
            orchestrator = orchestrator.with_check(check);
        }
        (orchestrator, store, task.id)
    }

    fn counting_callback() -> (Arc<AtomicUsize>, impl FnOnce(Verdict) + Send + 'static) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        (calls, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn test_errors_still_finalize_exactly_once() {
        let (orchestrator, store, task) = setup(
            vec![
                scripted(CheckId::Deepfake, Behaviour::Fail),
                scripted(CheckId::Identity, Behaviour::Fail),
                scripted(CheckId::Phrase, Behaviour::Fail),
                scripted(CheckId::Description, Behaviour::Pass),
            ],
            OrchestratorConfig::default(),
        )
        .await;
        let recorder = Arc::new(Recorder::default());
        let orchestrator = orchestrator.with_observer(recorder.clone());
        let (calls, callback) = counting_callback();

        let verdict = orchestrator
            .submit_video(OwnerId(1), task, "/videos/a.mp4", callback)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();

        assert_eq!(verdict.results.len(), 4);
        let errors = verdict
            .results
            .iter()
            .filter(|r| r.result.outcome == CheckOutcome::Error)
            .count();
        assert_eq!(errors, 3);
        assert!(!verdict.is_confirmed());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            *store.discarded.lock().unwrap(),
            vec![PathBuf::from("/videos/a.mp4")]
        );
        assert_eq!(recorder.seen.lock().unwrap().len(), 4);
        assert!(orchestrator.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_resubmission_starts_fresh_session() {
        let (orchestrator, store, task) = setup(
            vec![scripted(CheckId::Phrase, Behaviour::Pass)],
            OrchestratorConfig::default(),
        )
        .await;

        let first = orchestrator
            .submit_video(OwnerId(1), task, "a.mp4", |_| {})
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        let second = orchestrator
            .submit_video(OwnerId(1), task, "a.mp4", |_| {})
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();

        assert_ne!(first.session_id, second.session_id);
        assert_eq!(second.results.len(), 1);
        assert!(second.is_confirmed());
        assert_eq!(store.discarded.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_busy_while_running() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let (orchestrator, _, task) = setup(
            vec![scripted(CheckId::Phrase, Behaviour::WaitFor(gate.clone()))],
            OrchestratorConfig::default(),
        )
        .await;

        let handle = orchestrator
            .submit_video(OwnerId(1), task, "a.mp4", |_| {})
            .await
            .unwrap();
        let err = orchestrator
            .submit_video(OwnerId(1), task, "b.mp4", |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, ParimateError::SessionBusy { .. }));

        gate.notify_one();
        let verdict = handle.wait().await.unwrap();
        assert!(verdict.is_confirmed());
    }

    #[tokio::test]
    async fn test_unknown_or_foreign_task() {
        let (orchestrator, _, task) = setup(
            vec![scripted(CheckId::Phrase, Behaviour::Pass)],
            OrchestratorConfig::default(),
        )
        .await;

        let err = orchestrator
            .submit_video(OwnerId(1), TaskId(99), "a.mp4", |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, ParimateError::TaskNotFound(TaskId(99))));

        let err = orchestrator
            .submit_video(OwnerId(2), task, "a.mp4", |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, ParimateError::TaskNotFound(_)));
        assert!(orchestrator.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_hung_check_times_out() {
        let (orchestrator, _, task) = setup(
            vec![
                scripted(CheckId::Phrase, Behaviour::Hang),
                scripted(CheckId::Identity, Behaviour::Pass),
            ],
            OrchestratorConfig {
                check_timeout_secs: Some(1),
            },
        )
        .await;

        let verdict = orchestrator
            .submit_video(OwnerId(1), task, "a.mp4", |_| {})
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        let phrase = verdict.result_for(CheckId::Phrase).unwrap();
        assert_eq!(phrase.outcome, CheckOutcome::Error);
        assert!(phrase.evidence.notes[0].contains("timed out"));
        assert_eq!(
            verdict.result_for(CheckId::Identity).unwrap().outcome,
            CheckOutcome::Correct
        );
    }

    #[tokio::test]
    async fn test_timed_out_blocking_work_does_not_hold_verdict() {
        let (orchestrator, store, task) = setup(
            vec![scripted(CheckId::Deepfake, Behaviour::Blocking(Duration::from_secs(4)))],
            OrchestratorConfig {
                check_timeout_secs: Some(1),
            },
        )
        .await;

        let started = Instant::now();
        let verdict = orchestrator
            .submit_video(OwnerId(1), task, "a.mp4", |_| {})
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(
            verdict.result_for(CheckId::Deepfake).unwrap().outcome,
            CheckOutcome::Error
        );
        assert_eq!(store.discarded.lock().unwrap().len(), 1);
        assert!(orchestrator.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_panicking_callback_still_frees_slot() {
        let (orchestrator, _, task) = setup(
            vec![scripted(CheckId::Phrase, Behaviour::Pass)],
            OrchestratorConfig::default(),
        )
        .await;

        let verdict = orchestrator
            .submit_video(OwnerId(1), task, "a.mp4", |_| panic!("listener went away"))
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert!(verdict.is_confirmed());
        assert!(orchestrator.sessions().is_empty());

        let (calls, callback) = counting_callback();
        let again = orchestrator
            .submit_video(OwnerId(1), task, "b.mp4", callback)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert_ne!(again.session_id, verdict.session_id);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_check_reports_error() {
        let (orchestrator, store, task) = setup(
            vec![
                scripted(CheckId::Deepfake, Behaviour::Panic),
                scripted(CheckId::Phrase, Behaviour::Pass),
            ],
            OrchestratorConfig::default(),
        )
        .await;
        let (calls, callback) = counting_callback();

        let verdict = orchestrator
            .submit_video(OwnerId(1), task, "a.mp4", callback)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        let deepfake = verdict.result_for(CheckId::Deepfake).unwrap();
        assert_eq!(deepfake.outcome, CheckOutcome::Error);
        assert!(deepfake.evidence.notes[0].contains("panicked"));
        assert_eq!(verdict.results.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.discarded.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_no_checks_finalizes_empty() {
        let (orchestrator, store, task) = setup(Vec::new(), OrchestratorConfig::default()).await;
        let verdict = orchestrator
            .submit_video(OwnerId(1), task, "a.mp4", |_| {})
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert!(verdict.results.is_empty());
        assert!(!verdict.is_confirmed());
        assert_eq!(store.discarded.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_check_replaced() {
        let orchestrator = Orchestrator::new(
            TaskRegistry::new(),
            SessionRegistry::new(),
            Arc::new(CountingStore::default()),
            OrchestratorConfig::default(),
        )
        .with_check(scripted(CheckId::Phrase, Behaviour::Fail))
        .with_check(scripted(CheckId::Identity, Behaviour::Pass))
        .with_check(scripted(CheckId::Phrase, Behaviour::Pass));
        assert_eq!(
            orchestrator.check_ids(),
            vec![CheckId::Identity, CheckId::Phrase]
        );
    }
}
