use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use exam_core::model::{ExamId, SessionId};
use tokio::sync::Semaphore;
use tokio::time::Instant;

use crate::api::{ExamBackend, ProgressSnapshot, StartedExam, Submission, SubmissionReceipt};
use crate::error::BackendError;

/// One recorded backend call, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Start(ExamId),
    Save {
        at: Instant,
        session_id: SessionId,
        progress: ProgressSnapshot,
    },
    Submit {
        at: Instant,
        submission: Submission,
    },
}

#[derive(Default)]
struct State {
    exams: HashMap<ExamId, StartedExam>,
    start_failures: VecDeque<BackendError>,
    save_failures: VecDeque<BackendError>,
    submit_failures: VecDeque<BackendError>,
    calls: Vec<BackendCall>,
    saved: HashMap<SessionId, ProgressSnapshot>,
    submitted: HashSet<SessionId>,
    saves_in_flight: usize,
    max_saves_in_flight: usize,
    save_gate: Option<Arc<Semaphore>>,
}

/// Simple in-memory backend for tests and demos.
///
/// Failures can be scripted per operation and consumed in order. Saves can be held open
/// to simulate a slow network; the backend tracks how many saves were outstanding at once.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<Mutex<State>>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the response for `start_exam` on the exam's id.
    #[must_use]
    pub fn with_exam(self, started: StartedExam) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.exams.insert(started.exam.id(), started);
        }
        self
    }

    pub fn fail_next_start(&self, error: BackendError) {
        self.with_state(|s| s.start_failures.push_back(error));
    }

    /// Fail the next `times` saves with `error`.
    pub fn fail_next_saves(&self, times: usize, error: BackendError) {
        self.with_state(|s| {
            s.save_failures
                .extend(std::iter::repeat_n(error, times));
        });
    }

    pub fn fail_next_submit(&self, error: BackendError) {
        self.with_state(|s| s.submit_failures.push_back(error));
    }

    /// Hold every save open until released.
    pub fn hold_saves(&self) {
        self.with_state(|s| s.save_gate = Some(Arc::new(Semaphore::new(0))));
    }

    /// Let `count` held saves complete.
    pub fn release_saves(&self, count: usize) {
        self.with_state(|s| {
            if let Some(gate) = &s.save_gate {
                gate.add_permits(count);
            }
        });
    }

    /// Stop holding saves and release every waiting one.
    pub fn open_saves(&self) {
        self.with_state(|s| {
            if let Some(gate) = s.save_gate.take() {
                gate.close();
            }
        });
    }

    #[must_use]
    pub fn calls(&self) -> Vec<BackendCall> {
        self.read(|s| s.calls.clone())
    }

    #[must_use]
    pub fn start_count(&self) -> usize {
        self.read(|s| {
            s.calls
                .iter()
                .filter(|c| matches!(c, BackendCall::Start(_)))
                .count()
        })
    }

    /// Every save attempt with its arrival time.
    #[must_use]
    pub fn saves(&self) -> Vec<(Instant, ProgressSnapshot)> {
        self.read(|s| {
            s.calls
                .iter()
                .filter_map(|c| match c {
                    BackendCall::Save { at, progress, .. } => Some((*at, progress.clone())),
                    _ => None,
                })
                .collect()
        })
    }

    #[must_use]
    pub fn submissions(&self) -> Vec<Submission> {
        self.read(|s| {
            s.calls
                .iter()
                .filter_map(|c| match c {
                    BackendCall::Submit { submission, .. } => Some(submission.clone()),
                    _ => None,
                })
                .collect()
        })
    }

    /// Last successfully stored progress for a session.
    #[must_use]
    pub fn stored_progress(&self, session_id: SessionId) -> Option<ProgressSnapshot> {
        self.read(|s| s.saved.get(&session_id).cloned())
    }

    #[must_use]
    pub fn max_saves_in_flight(&self) -> usize {
        self.read(|s| s.max_saves_in_flight)
    }

    #[must_use]
    pub fn saves_in_flight(&self) -> usize {
        self.read(|s| s.saves_in_flight)
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, BackendError> {
        self.state
            .lock()
            .map_err(|e| BackendError::Transport(e.to_string()))
    }

    fn with_state(&self, f: impl FnOnce(&mut State)) {
        if let Ok(mut state) = self.state.lock() {
            f(&mut state);
        }
    }

    fn read<T: Default>(&self, f: impl FnOnce(&State) -> T) -> T {
        self.state.lock().map(|s| f(&s)).unwrap_or_default()
    }
}

/// Counts a save as outstanding until the call returns or its future is dropped.
struct InFlightGuard {
    state: Arc<Mutex<State>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.saves_in_flight = state.saves_in_flight.saturating_sub(1);
        }
    }
}

#[async_trait]
impl ExamBackend for InMemoryBackend {
    async fn start_exam(&self, exam_id: ExamId) -> Result<StartedExam, BackendError> {
        let mut state = self.lock()?;
        state.calls.push(BackendCall::Start(exam_id));
        if let Some(err) = state.start_failures.pop_front() {
            return Err(err);
        }
        state.exams.get(&exam_id).cloned().ok_or(BackendError::NotFound)
    }

    async fn save_progress(
        &self,
        _exam_id: ExamId,
        session_id: SessionId,
        progress: &ProgressSnapshot,
    ) -> Result<(), BackendError> {
        let gate = {
            let mut state = self.lock()?;
            state.calls.push(BackendCall::Save {
                at: Instant::now(),
                session_id,
                progress: progress.clone(),
            });
            state.saves_in_flight += 1;
            state.max_saves_in_flight = state.max_saves_in_flight.max(state.saves_in_flight);
            state.save_gate.clone()
        };
        let _guard = InFlightGuard {
            state: Arc::clone(&self.state),
        };

        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        let mut state = self.lock()?;
        if let Some(err) = state.save_failures.pop_front() {
            return Err(err);
        }
        if state.submitted.contains(&session_id) {
            return Err(BackendError::Conflict("session already submitted".into()));
        }
        state.saved.insert(session_id, progress.clone());
        Ok(())
    }

    async fn submit_exam(
        &self,
        _exam_id: ExamId,
        submission: &Submission,
    ) -> Result<SubmissionReceipt, BackendError> {
        let mut state = self.lock()?;
        state.calls.push(BackendCall::Submit {
            at: Instant::now(),
            submission: submission.clone(),
        });
        if let Some(err) = state.submit_failures.pop_front() {
            return Err(err);
        }
        if !state.submitted.insert(submission.session_id) {
            return Err(BackendError::Conflict("session already submitted".into()));
        }
        Ok(SubmissionReceipt {
            id: format!("receipt-{}", state.submitted.len()),
            submitted_at: submission.submitted_at,
            score: None,
        })
    }
}
