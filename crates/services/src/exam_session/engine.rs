use std::ops::ControlFlow;
use std::sync::Arc;

use backend::{
    BackendError, ExamBackend, ProgressSnapshot, StartedExam, Submission, SubmissionReceipt,
};
use exam_core::Clock;
use exam_core::model::{AnswerValue, Cursor, ExamDefinition, ExamId, Question, QuestionId};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::attempt::{Attempt, WallAnchor};
use super::handle::ExamSessionHandle;
use super::lifecycle::{Lifecycle, SubmitReason};
use super::timers::{SessionTimers, sleep_until_opt};
use super::view::ExamSessionView;
use crate::config::EngineConfig;
use crate::save::{SaveCoordinator, SaveReport, SaveTarget, SaveTrigger};

/// Requests sent from an `ExamSessionHandle` to the engine task.
#[derive(Debug)]
pub(crate) enum Command {
    Start(ExamId),
    Answer {
        question: Option<QuestionId>,
        value: AnswerValue,
    },
    ToggleFlag(Option<QuestionId>),
    Next,
    Previous,
    JumpTo {
        section_index: usize,
        question_index: usize,
    },
    RequestSubmit,
    CancelSubmit,
    ConfirmSubmit,
    RetrySave,
    RetrySubmit,
    Unmount,
}

/// Completion of a spawned backend call, tagged with the epoch it was issued in.
enum TaskEvent {
    Started {
        epoch: u64,
        result: Result<StartedExam, BackendError>,
    },
    Submitted {
        epoch: u64,
        result: Result<SubmissionReceipt, BackendError>,
    },
}

enum Wake {
    Command(Option<Command>),
    Task(TaskEvent),
    Save(SaveReport),
    Tick,
    Autosave,
    Debounce,
}

/// Save that must land before the submit call.
struct FinalSave {
    /// Aborted background job; awaited so only one save is ever outstanding.
    prior: Option<JoinHandle<()>>,
    snapshot: ProgressSnapshot,
}

/// Drives one exam attempt.
///
/// The engine runs as a single task that owns all session state. Commands, backend
/// completions and timer deadlines are handled one at a time, so no two handlers ever
/// observe a half-applied transition. Countdown ticks that are due are always applied
/// before anything else, which lets expiry win over a confirm arriving in the same tick.
pub struct ExamSessionEngine {
    backend: Arc<dyn ExamBackend>,
    config: EngineConfig,
    clock: Clock,

    commands: mpsc::UnboundedReceiver<Command>,
    tasks_tx: mpsc::UnboundedSender<TaskEvent>,
    tasks_rx: mpsc::UnboundedReceiver<TaskEvent>,
    reports_tx: mpsc::UnboundedSender<SaveReport>,
    reports_rx: mpsc::UnboundedReceiver<SaveReport>,
    progress: watch::Sender<ProgressSnapshot>,
    view: watch::Sender<ExamSessionView>,

    lifecycle: Lifecycle,
    attempt: Option<Attempt>,
    saves: SaveCoordinator,
    timers: Option<SessionTimers>,
    confirm_open: bool,
    submission: Option<Submission>,
    epoch: u64,
}

impl ExamSessionEngine {
    /// Spawn the engine on the current Tokio runtime and return its handle.
    ///
    /// The engine stops when `unmount` is called or every handle is dropped.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn spawn(
        backend: Arc<dyn ExamBackend>,
        config: EngineConfig,
        clock: Clock,
    ) -> ExamSessionHandle {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (tasks_tx, tasks_rx) = mpsc::unbounded_channel();
        let (reports_tx, reports_rx) = mpsc::unbounded_channel();
        let (progress, _) = watch::channel(ProgressSnapshot::default());
        let (view, view_rx) = watch::channel(ExamSessionView::default());

        let engine = Self {
            backend,
            config,
            clock,
            commands,
            tasks_tx,
            tasks_rx,
            reports_tx,
            reports_rx,
            progress,
            view,
            lifecycle: Lifecycle::new(),
            attempt: None,
            saves: SaveCoordinator::new(config.retry),
            timers: None,
            confirm_open: false,
            submission: None,
            epoch: 0,
        };
        tokio::spawn(engine.run());

        ExamSessionHandle::new(commands_tx, view_rx)
    }

    async fn run(mut self) {
        debug!("exam session engine running");
        loop {
            let deadlines = self.timers;
            let wake = tokio::select! {
                biased;
                command = self.commands.recv() => Wake::Command(command),
                Some(event) = self.tasks_rx.recv() => Wake::Task(event),
                Some(report) = self.reports_rx.recv() => Wake::Save(report),
                () = sleep_until_opt(deadlines.map(|t| t.tick_at)) => Wake::Tick,
                () = sleep_until_opt(deadlines.map(|t| t.autosave_at)) => Wake::Autosave,
                () = sleep_until_opt(deadlines.and_then(|t| t.debounce_at)) => Wake::Debounce,
            };

            self.run_due_ticks();
            let flow = match wake {
                Wake::Command(Some(command)) => self.handle_command(command),
                Wake::Command(None) => ControlFlow::Break(()),
                Wake::Task(event) => {
                    self.on_task(event);
                    ControlFlow::Continue(())
                }
                Wake::Save(report) => {
                    self.on_save_report(report);
                    ControlFlow::Continue(())
                }
                // Already applied by `run_due_ticks`.
                Wake::Tick => ControlFlow::Continue(()),
                Wake::Autosave => {
                    self.on_autosave();
                    ControlFlow::Continue(())
                }
                Wake::Debounce => {
                    self.on_debounce();
                    ControlFlow::Continue(())
                }
            };

            if flow.is_break() {
                self.teardown();
                break;
            }
            self.publish();
        }
        debug!("exam session engine stopped");
    }

    fn handle_command(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::Start(exam_id) => self.start(exam_id),
            Command::Answer { question, value } => self.set_answer(question, value),
            Command::ToggleFlag(question) => self.toggle_flag(question),
            Command::Next => self.navigate("next", Cursor::go_next),
            Command::Previous => self.navigate("previous", Cursor::go_previous),
            Command::JumpTo {
                section_index,
                question_index,
            } => self.jump_to(section_index, question_index),
            Command::RequestSubmit => {
                if self.accepts_input("request submit") {
                    self.confirm_open = true;
                }
            }
            Command::CancelSubmit => self.confirm_open = false,
            Command::ConfirmSubmit => {
                if self.accepts_input("confirm submit") {
                    self.begin_submit(SubmitReason::Manual);
                }
            }
            Command::RetrySave => {
                if self.accepts_input("retry save") {
                    self.publish_progress();
                    self.saves.retry();
                }
            }
            Command::RetrySubmit => self.retry_submit(),
            Command::Unmount => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    fn accepts_input(&self, action: &str) -> bool {
        let phase = self.lifecycle.phase();
        if !phase.accepts_input() {
            debug!(action, ?phase, "ignored outside an active session");
            return false;
        }
        true
    }

    //
    // ─── START ─────────────────────────────────────────────────────────────────
    //

    fn start(&mut self, exam_id: ExamId) {
        if !self.lifecycle.begin_start() {
            debug!(exam = %exam_id, phase = ?self.lifecycle.phase(), "start ignored");
            return;
        }
        self.epoch += 1;
        info!(exam = %exam_id, "starting exam");

        let epoch = self.epoch;
        let backend = Arc::clone(&self.backend);
        let events = self.tasks_tx.clone();
        tokio::spawn(async move {
            let result = backend.start_exam(exam_id).await;
            if events.send(TaskEvent::Started { epoch, result }).is_err() {
                debug!("session gone, dropping start result");
            }
        });
    }

    fn activate(&mut self, started: StartedExam) {
        if !self.lifecycle.activate() {
            return;
        }
        let now = Instant::now();
        let attempt = Attempt::resume(started, WallAnchor::new(self.clock.now(), now));
        info!(
            session = %attempt.session.id(),
            exam = %attempt.exam.id(),
            started_at = %attempt.session.started_at(),
            expires_at = %attempt.session.expires_at(),
            remaining = attempt.countdown.remaining(),
            answered = attempt.answers.answered_count(),
            "exam session active"
        );

        self.progress.send_replace(attempt.progress_snapshot());
        self.saves.bind(SaveTarget {
            backend: Arc::clone(&self.backend),
            exam_id: attempt.exam.id(),
            session_id: attempt.session.id(),
            snapshots: self.progress.subscribe(),
            reports: self.reports_tx.clone(),
            epoch: self.epoch,
        });
        self.timers = Some(SessionTimers::arm(now, &self.config));
        self.attempt = Some(attempt);
        self.expire_if_due();
    }

    //
    // ─── INPUT ─────────────────────────────────────────────────────────────────
    //

    fn set_answer(&mut self, question: Option<QuestionId>, value: AnswerValue) {
        if !self.accepts_input("answer") {
            return;
        }
        let Some(attempt) = self.attempt.as_mut() else {
            return;
        };
        let Some(id) = question.or_else(|| attempt.current_question().map(Question::id)) else {
            return;
        };
        let Some(target) = attempt.exam.question(id) else {
            warn!(question = %id, "answer for unknown question ignored");
            return;
        };
        match value.check(target) {
            Ok(value) => attempt.answers.set_answer(id, value),
            Err(err) => {
                warn!(error = %err, "answer rejected");
                return;
            }
        }

        let debounce_at = Instant::now() + self.config.debounce;
        if let Some(timers) = self.timers.as_mut() {
            timers.debounce_at = Some(debounce_at);
        }
    }

    fn toggle_flag(&mut self, question: Option<QuestionId>) {
        if !self.accepts_input("flag") {
            return;
        }
        let Some(attempt) = self.attempt.as_mut() else {
            return;
        };
        let Some(id) = question.or_else(|| attempt.current_question().map(Question::id)) else {
            return;
        };
        if attempt.exam.question(id).is_none() {
            warn!(question = %id, "flag for unknown question ignored");
            return;
        }
        let flagged = attempt.flags.toggle(id);
        debug!(question = %id, flagged, "flag toggled");
    }

    fn navigate(&mut self, action: &str, step: fn(&mut Cursor, &ExamDefinition) -> bool) {
        if !self.accepts_input(action) {
            return;
        }
        let Some(attempt) = self.attempt.as_mut() else {
            return;
        };
        if !step(&mut attempt.cursor, &attempt.exam) {
            debug!(action, "already at the boundary");
        }
    }

    fn jump_to(&mut self, section_index: usize, question_index: usize) {
        if !self.accepts_input("jump") {
            return;
        }
        let Some(attempt) = self.attempt.as_mut() else {
            return;
        };
        if let Err(err) = attempt
            .cursor
            .jump_to(&attempt.exam, section_index, question_index)
        {
            debug!(error = %err, "jump ignored");
        }
    }

    //
    // ─── TIME ──────────────────────────────────────────────────────────────────
    //

    /// Apply every countdown tick whose deadline has passed.
    fn run_due_ticks(&mut self) {
        let now = Instant::now();
        loop {
            let Some(timers) = self.timers.as_mut() else {
                return;
            };
            let finished = self
                .attempt
                .as_ref()
                .is_some_and(|attempt| attempt.countdown.is_finished());
            if finished || timers.tick_at > now {
                return;
            }
            timers.tick_at += self.config.tick_interval;
            self.on_tick();
        }
    }

    fn on_tick(&mut self) {
        if let Some(attempt) = self.attempt.as_mut() {
            attempt.countdown.tick();
        }
        self.expire_if_due();
    }

    fn expire_if_due(&mut self) {
        if self
            .attempt
            .as_mut()
            .is_some_and(|attempt| attempt.countdown.take_expiry())
        {
            info!("time expired");
            self.confirm_open = false;
            self.begin_submit(SubmitReason::Expired);
        }
    }

    fn on_autosave(&mut self) {
        let now = Instant::now();
        let Some(timers) = self.timers.as_mut() else {
            return;
        };
        if timers.autosave_at > now {
            return;
        }
        timers.autosave_at = now + self.config.autosave_interval;
        self.trigger_save(SaveTrigger::Periodic);
    }

    fn on_debounce(&mut self) {
        let now = Instant::now();
        let Some(timers) = self.timers.as_mut() else {
            return;
        };
        if !timers.debounce_at.is_some_and(|at| at <= now) {
            return;
        }
        timers.debounce_at = None;
        self.trigger_save(SaveTrigger::OnChange);
    }

    //
    // ─── SAVING ────────────────────────────────────────────────────────────────
    //

    fn trigger_save(&mut self, trigger: SaveTrigger) {
        self.publish_progress();
        self.saves.trigger(trigger);
    }

    fn on_save_report(&mut self, report: SaveReport) {
        let now = match &self.attempt {
            Some(attempt) => attempt.wall_time(Instant::now()),
            None => self.clock.now(),
        };
        self.saves.on_report(report, now);
    }

    //
    // ─── SUBMIT ────────────────────────────────────────────────────────────────
    //

    fn begin_submit(&mut self, reason: SubmitReason) {
        if !self.lifecycle.begin_submit(reason) {
            debug!(?reason, phase = ?self.lifecycle.phase(), "submit ignored");
            return;
        }
        self.confirm_open = false;
        self.timers = None;

        let Some(attempt) = self.attempt.as_ref() else {
            return;
        };
        let submission = attempt.submission(Instant::now());
        let snapshot = attempt.progress_snapshot();
        info!(
            ?reason,
            remaining = attempt.countdown.remaining(),
            answered = attempt.answers.answered_count(),
            "submitting exam"
        );

        self.progress.send_replace(snapshot.clone());
        let prior = self.saves.shutdown();
        self.spawn_submit(submission, Some(FinalSave { prior, snapshot }));
    }

    /// Resend the stored submission after a failed submit. Progress is not saved again.
    fn retry_submit(&mut self) {
        if !self.lifecycle.retry_submit() {
            debug!(phase = ?self.lifecycle.phase(), "submit retry ignored");
            return;
        }
        let Some(submission) = self.submission.clone() else {
            return;
        };
        info!("retrying submit");
        self.spawn_submit(submission, None);
    }

    fn spawn_submit(&mut self, submission: Submission, flush: Option<FinalSave>) {
        let Some(attempt) = self.attempt.as_ref() else {
            return;
        };
        let exam_id = attempt.exam.id();
        let session_id = attempt.session.id();
        self.submission = Some(submission.clone());

        let epoch = self.epoch;
        let backend = Arc::clone(&self.backend);
        let events = self.tasks_tx.clone();
        tokio::spawn(async move {
            if let Some(flush) = flush {
                if let Some(prior) = flush.prior {
                    // The job was aborted; only its completion matters.
                    let _ = prior.await;
                }
                match backend
                    .save_progress(exam_id, session_id, &flush.snapshot)
                    .await
                {
                    Ok(()) => debug!("final progress saved"),
                    Err(error) => warn!(error = %error, "final save failed, submitting anyway"),
                }
            }
            let result = backend.submit_exam(exam_id, &submission).await;
            if events.send(TaskEvent::Submitted { epoch, result }).is_err() {
                debug!("session gone, dropping submit result");
            }
        });
    }

    fn on_task(&mut self, event: TaskEvent) {
        match event {
            TaskEvent::Started { epoch, result } => {
                if epoch != self.epoch {
                    debug!(epoch, "dropping stale start result");
                    return;
                }
                match result {
                    Ok(started) => self.activate(started),
                    Err(error) => {
                        warn!(error = %error, "exam start failed");
                        self.lifecycle.fail_start(error);
                    }
                }
            }
            TaskEvent::Submitted { epoch, result } => {
                if epoch != self.epoch {
                    debug!(epoch, "dropping stale submit result");
                    return;
                }
                match result {
                    Ok(receipt) => {
                        info!(receipt = %receipt.id, "exam submitted");
                        self.lifecycle.submitted(receipt);
                    }
                    Err(error) => {
                        warn!(error = %error, "exam submit failed");
                        self.lifecycle.submit_failed(error);
                    }
                }
            }
        }
    }

    //
    // ─── OUTPUT ────────────────────────────────────────────────────────────────
    //

    fn publish_progress(&mut self) {
        if !self.lifecycle.phase().accepts_input() {
            return;
        }
        if let Some(attempt) = &self.attempt {
            self.progress.send_replace(attempt.progress_snapshot());
        }
    }

    fn publish(&mut self) {
        self.publish_progress();
        let view = ExamSessionView::build(
            &self.lifecycle,
            self.attempt.as_ref(),
            &self.saves,
            self.confirm_open,
        );
        self.view.send_if_modified(|current| {
            if *current == view {
                return false;
            }
            *current = view;
            true
        });
    }

    /// Stop timers and saves, clear flags and publish the closed view. Pending backend
    /// calls finish detached and their results are dropped.
    fn teardown(&mut self) {
        info!(phase = ?self.lifecycle.phase(), "exam session unmounted");
        self.timers = None;
        self.confirm_open = false;
        self.epoch += 1;
        self.saves.shutdown();
        if let Some(attempt) = self.attempt.as_mut() {
            attempt.flags.clear();
        }
        self.lifecycle.unmount();
        self.publish();
    }
}
