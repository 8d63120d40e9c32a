use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use backend::{BackendCall, BackendError, InMemoryBackend, StartedExam};
use chrono::TimeDelta;
use exam_core::model::{
    AnswerValue, ExamDefinition, ExamId, Question, QuestionId, QuestionKind, Section, Session,
    SessionId, StudentId,
};
use exam_core::time::{fixed_clock, fixed_now};
use serde_json::json;
use services::{
    EngineConfig, ExamSessionEngine, ExamSessionHandle, SaveBanner, SessionError, SessionPhase,
    SubmitReason,
};
use tokio::time::{Instant, sleep};

const EXAM: ExamId = ExamId::new(7);

fn q(id: u64) -> QuestionId {
    QuestionId::new(id)
}

/// Two sections of three and two questions.
fn exam() -> ExamDefinition {
    ExamDefinition::new(
        EXAM,
        "Physics midterm",
        60,
        vec![
            Section::new(
                "Mechanics",
                vec![
                    Question::new(q(1), QuestionKind::MultipleChoice, 2)
                        .with_prompt("g at sea level?")
                        .with_options(["1.6", "3.7", "9.8"]),
                    Question::new(q(2), QuestionKind::TrueFalse, 1),
                    Question::new(q(3), QuestionKind::ShortAnswer, 2),
                ],
            ),
            Section::new(
                "Essays",
                vec![
                    Question::new(q(4), QuestionKind::Essay, 5),
                    Question::new(q(5), QuestionKind::TrueFalse, 1),
                ],
            ),
        ],
    )
    .unwrap()
}

fn started(remaining: u64) -> StartedExam {
    let secs = i64::try_from(remaining).unwrap();
    let session = Session::new(
        SessionId::random(),
        EXAM,
        StudentId::new(42),
        fixed_now(),
        fixed_now() + TimeDelta::seconds(secs),
        Some(remaining),
    )
    .unwrap();
    StartedExam {
        session,
        exam: exam(),
        saved_answers: BTreeMap::new(),
        current_question_index: None,
    }
}

fn spawn(backend: &InMemoryBackend) -> ExamSessionHandle {
    ExamSessionEngine::spawn(
        Arc::new(backend.clone()),
        EngineConfig::default(),
        fixed_clock(),
    )
}

async fn active(backend: &InMemoryBackend) -> ExamSessionHandle {
    let handle = spawn(backend);
    handle.start(EXAM).unwrap();
    handle
        .wait_for(|v| v.phase == SessionPhase::Active)
        .await
        .unwrap();
    handle
}

fn choice(question: u64, value: u32) -> (QuestionId, AnswerValue) {
    (q(question), AnswerValue::Choice(value))
}

//
// ─── LIFECYCLE ─────────────────────────────────────────────────────────────────
//

#[tokio::test(start_paused = true)]
async fn start_publishes_the_first_question() {
    let backend = InMemoryBackend::new().with_exam(started(3600));
    let handle = active(&backend).await;

    let view = handle.view();
    assert_eq!(view.exam_title.as_deref(), Some("Physics midterm"));
    assert_eq!(view.total, 5);
    assert_eq!(view.total_points, 11);
    assert_eq!(view.answered, 0);
    assert_eq!(view.time_remaining, Some(3600));
    assert_eq!(view.time_display.as_deref(), Some("1:00:00"));
    assert!(!view.low_time);
    assert_eq!(view.palette.len(), 5);
    assert!(view.palette[0].current);

    let position = view.position.unwrap();
    assert_eq!(position.global_index, 0);
    assert_eq!(position.section_title, "Mechanics");

    let question = view.current_question.unwrap();
    assert_eq!(question.id, q(1));
    assert_eq!(question.options.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn repeated_start_issues_one_request() {
    let backend = InMemoryBackend::new().with_exam(started(3600));
    let handle = spawn(&backend);

    handle.start(EXAM).unwrap();
    handle.start(EXAM).unwrap();
    handle
        .wait_for(|v| v.phase == SessionPhase::Active)
        .await
        .unwrap();

    handle.start(EXAM).unwrap();
    handle.next().unwrap();
    handle
        .wait_for(|v| v.position.as_ref().is_some_and(|p| p.global_index == 1))
        .await
        .unwrap();

    assert_eq!(backend.start_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_start_can_be_retried() {
    let backend = InMemoryBackend::new().with_exam(started(3600));
    backend.fail_next_start(BackendError::Status(503));
    let handle = spawn(&backend);

    handle.start(EXAM).unwrap();
    let failed = handle
        .wait_for(|v| v.phase == SessionPhase::Failed)
        .await
        .unwrap();
    assert!(failed.error.unwrap().contains("could not start"));
    assert!(failed.current_question.is_none());

    handle.start(EXAM).unwrap();
    let view = handle
        .wait_for(|v| v.phase == SessionPhase::Active)
        .await
        .unwrap();
    assert!(view.error.is_none());
    assert_eq!(backend.start_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn low_time_warning_starts_below_five_minutes() {
    let backend = InMemoryBackend::new().with_exam(started(301));
    let handle = active(&backend).await;
    assert!(!handle.view().low_time);

    let view = handle
        .wait_for(|v| v.time_remaining == Some(299))
        .await
        .unwrap();
    assert!(view.low_time);
    assert_eq!(view.time_display.as_deref(), Some("04:59"));
}

#[tokio::test(start_paused = true)]
async fn resumes_saved_answers_and_position() {
    let mut resumed = started(1200);
    resumed.saved_answers = BTreeMap::from([(q(1), json!(2)), (q(4), json!("draft"))]);
    resumed.current_question_index = Some(3);
    let backend = InMemoryBackend::new().with_exam(resumed);

    let handle = active(&backend).await;
    let view = handle.view();

    assert_eq!(view.answered, 2);
    assert_eq!(view.progress_percent, 40);
    let position = view.position.unwrap();
    assert_eq!((position.section_index, position.question_index), (1, 0));
    let question = view.current_question.unwrap();
    assert_eq!(question.id, q(4));
    assert_eq!(question.answer, Some(AnswerValue::Text("draft".into())));
    assert!(view.palette[0].answered);
}

//
// ─── NAVIGATION & ANSWERS ──────────────────────────────────────────────────────
//

#[tokio::test(start_paused = true)]
async fn navigation_crosses_sections_and_ignores_bad_jumps() {
    let backend = InMemoryBackend::new().with_exam(started(3600));
    let handle = active(&backend).await;
    let at = |index: usize| {
        move |v: &services::ExamSessionView| {
            v.position.as_ref().is_some_and(|p| p.global_index == index)
        }
    };

    handle.previous().unwrap();
    handle.next().unwrap();
    handle.next().unwrap();
    handle.wait_for(at(2)).await.unwrap();

    handle.jump_to(9, 0).unwrap();
    handle.toggle_flag().unwrap();
    let view = handle
        .wait_for(|v| v.current_question.as_ref().is_some_and(|q| q.flagged))
        .await
        .unwrap();
    assert_eq!(view.position.unwrap().global_index, 2);
    assert!(view.palette[2].flagged);

    handle.next().unwrap();
    let view = handle.wait_for(at(3)).await.unwrap();
    assert_eq!(view.position.unwrap().section_title, "Essays");

    handle.previous().unwrap();
    handle.wait_for(at(2)).await.unwrap();

    handle.jump_to(1, 1).unwrap();
    handle.next().unwrap();
    handle.toggle_flag().unwrap();
    let view = handle
        .wait_for(|v| at(4)(v) && v.current_question.as_ref().is_some_and(|q| q.flagged))
        .await
        .unwrap();
    assert_eq!(view.position.unwrap().global_index, 4);
    assert_eq!(view.current_question.unwrap().id, q(5));
}

#[tokio::test(start_paused = true)]
async fn confirm_dialog_summarises_progress() {
    let backend = InMemoryBackend::new().with_exam(started(3600));
    let handle = active(&backend).await;

    let (id, value) = choice(1, 2);
    handle.answer_question(id, value).unwrap();
    handle.answer_question(q(1), AnswerValue::Choice(7)).unwrap();
    handle
        .answer_question(q(2), AnswerValue::Text("yes".into()))
        .unwrap();
    handle
        .answer_question(q(3), AnswerValue::Text("   ".into()))
        .unwrap();
    handle.toggle_flag_on(q(4)).unwrap();
    handle.request_submit().unwrap();

    let view = handle.wait_for(|v| v.confirm.is_some()).await.unwrap();
    let summary = view.confirm.unwrap();
    assert_eq!(summary.answered, 1);
    assert_eq!(summary.unanswered, 4);
    assert_eq!(summary.flagged, 1);
    assert_eq!(summary.total, 5);
    assert!(
        view.palette[0].answered,
        "out-of-range choice must not overwrite the stored answer"
    );

    handle.cancel_submit().unwrap();
    let view = handle.wait_for(|v| v.confirm.is_none()).await.unwrap();
    assert_eq!(view.phase, SessionPhase::Active);
    assert!(backend.submissions().is_empty());
}

//
// ─── AUTOSAVE ──────────────────────────────────────────────────────────────────
//

#[tokio::test(start_paused = true)]
async fn rapid_changes_collapse_into_one_save_with_the_last_value() {
    let backend = InMemoryBackend::new().with_exam(started(3600));
    let handle = active(&backend).await;
    let t0 = Instant::now();

    handle.answer(AnswerValue::Choice(0)).unwrap();
    handle.answer(AnswerValue::Choice(2)).unwrap();
    sleep(Duration::from_secs(1)).await;

    let saves = backend.saves();
    assert_eq!(saves.len(), 1);
    assert_eq!(saves[0].0 - t0, Duration::from_millis(500));
    assert_eq!(
        saves[0].1.answers.get(&q(1)),
        Some(&AnswerValue::Choice(2))
    );
    assert!(handle.view().save.last_saved_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn each_change_restarts_the_debounce() {
    let backend = InMemoryBackend::new().with_exam(started(3600));
    let handle = active(&backend).await;
    let t0 = Instant::now();

    handle.answer(AnswerValue::Choice(1)).unwrap();
    sleep(Duration::from_millis(300)).await;
    handle
        .answer_question(q(2), AnswerValue::TrueFalse(true))
        .unwrap();
    sleep(Duration::from_millis(300)).await;
    assert!(backend.saves().is_empty());

    sleep(Duration::from_millis(300)).await;
    let saves = backend.saves();
    assert_eq!(saves.len(), 1);
    assert_eq!(saves[0].0 - t0, Duration::from_millis(800));
    assert_eq!(saves[0].1.answers.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn saves_never_overlap_and_coalesce_while_one_is_in_flight() {
    let backend = InMemoryBackend::new().with_exam(started(3600));
    backend.hold_saves();
    let handle = active(&backend).await;

    handle.answer(AnswerValue::Choice(0)).unwrap();
    sleep(Duration::from_millis(600)).await;
    assert_eq!(backend.saves_in_flight(), 1);
    assert!(handle.view().save.state.in_flight);

    handle.answer(AnswerValue::Choice(1)).unwrap();
    sleep(Duration::from_millis(600)).await;
    handle.answer(AnswerValue::Choice(2)).unwrap();
    sleep(Duration::from_millis(600)).await;
    assert_eq!(backend.saves().len(), 1);

    backend.release_saves(1);
    sleep(Duration::from_millis(10)).await;
    let saves = backend.saves();
    assert_eq!(saves.len(), 2);
    assert_eq!(saves[1].1.answers.get(&q(1)), Some(&AnswerValue::Choice(2)));

    backend.open_saves();
    sleep(Duration::from_millis(10)).await;
    assert_eq!(backend.saves().len(), 2);
    assert_eq!(backend.max_saves_in_flight(), 1);

    let session_id = handle.view().session_id.unwrap();
    let stored = backend.stored_progress(session_id).unwrap();
    assert_eq!(stored.answers.get(&q(1)), Some(&AnswerValue::Choice(2)));
}

#[tokio::test(start_paused = true)]
async fn periodic_save_in_flight_defers_the_on_change_save() {
    let backend = InMemoryBackend::new().with_exam(started(3600));
    backend.hold_saves();
    let handle = active(&backend).await;

    sleep(Duration::from_millis(30_100)).await;
    assert_eq!(backend.saves_in_flight(), 1);
    assert!(backend.saves()[0].1.answers.is_empty());

    handle.answer(AnswerValue::Choice(1)).unwrap();
    sleep(Duration::from_secs(1)).await;
    assert_eq!(backend.saves().len(), 1);

    backend.release_saves(1);
    sleep(Duration::from_millis(10)).await;
    let saves = backend.saves();
    assert_eq!(saves.len(), 2);
    assert_eq!(saves[1].1.answers.get(&q(1)), Some(&AnswerValue::Choice(1)));

    backend.open_saves();
    sleep(Duration::from_millis(10)).await;
    assert_eq!(backend.max_saves_in_flight(), 1);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_retry_with_backoff_then_show_a_banner() {
    let backend = InMemoryBackend::new().with_exam(started(3600));
    backend.fail_next_saves(3, BackendError::Status(503));
    let handle = active(&backend).await;
    let t0 = Instant::now();

    handle.answer(AnswerValue::Choice(1)).unwrap();
    sleep(Duration::from_secs(1)).await;
    let view = handle.view();
    assert_eq!(view.save.banner, SaveBanner::Hidden);
    assert_eq!(view.save.state.pending_retry, 1);
    assert!(view.save.state.last_error.is_some());

    sleep(Duration::from_secs(4)).await;
    let at: Vec<Duration> = backend.saves().iter().map(|(at, _)| *at - t0).collect();
    assert_eq!(
        at,
        vec![
            Duration::from_millis(500),
            Duration::from_millis(1500),
            Duration::from_millis(3500),
        ]
    );
    assert!(matches!(
        handle.view().save.banner,
        SaveBanner::Failed { .. }
    ));

    sleep(Duration::from_secs(20)).await;
    assert_eq!(backend.saves().len(), 3);

    // The next periodic save succeeds and clears the banner.
    sleep(Duration::from_secs(6)).await;
    assert_eq!(backend.saves().len(), 4);
    let view = handle.view();
    assert_eq!(view.save.banner, SaveBanner::Hidden);
    assert!(view.save.last_saved_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn manual_retry_reports_each_failed_attempt() {
    let backend = InMemoryBackend::new().with_exam(started(3600));
    backend.fail_next_saves(3, BackendError::Transport("offline".into()));
    let handle = active(&backend).await;

    handle.answer(AnswerValue::Choice(1)).unwrap();
    handle
        .wait_for(|v| matches!(v.save.banner, SaveBanner::Failed { .. }))
        .await
        .unwrap();

    backend.fail_next_saves(1, BackendError::Status(500));
    handle.retry_save().unwrap();
    let view = handle
        .wait_for(|v| matches!(v.save.banner, SaveBanner::Retrying { .. }))
        .await
        .unwrap();
    assert_eq!(
        view.save.banner,
        SaveBanner::Retrying {
            attempt: 1,
            max_attempts: 3
        }
    );

    let view = handle
        .wait_for(|v| v.save.banner == SaveBanner::Hidden)
        .await
        .unwrap();
    assert!(view.save.last_saved_at.is_some());
    assert_eq!(backend.saves().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn rejected_save_pauses_autosave_until_retried() {
    let backend = InMemoryBackend::new().with_exam(started(3600));
    backend.fail_next_saves(1, BackendError::Forbidden);
    let handle = active(&backend).await;

    handle.answer(AnswerValue::Choice(1)).unwrap();
    handle
        .wait_for(|v| matches!(v.save.banner, SaveBanner::Rejected { .. }))
        .await
        .unwrap();
    assert_eq!(backend.saves().len(), 1);

    handle.answer(AnswerValue::Choice(2)).unwrap();
    sleep(Duration::from_secs(40)).await;
    assert_eq!(backend.saves().len(), 1);

    handle.retry_save().unwrap();
    handle
        .wait_for(|v| v.save.banner == SaveBanner::Hidden)
        .await
        .unwrap();
    let saves = backend.saves();
    assert_eq!(saves.len(), 2);
    assert_eq!(saves[1].1.answers.get(&q(1)), Some(&AnswerValue::Choice(2)));
}

//
// ─── SUBMIT ────────────────────────────────────────────────────────────────────
//

#[tokio::test(start_paused = true)]
async fn double_confirm_flushes_once_then_submits_once() {
    let backend = InMemoryBackend::new().with_exam(started(3600));
    let handle = active(&backend).await;

    handle.answer(AnswerValue::Choice(2)).unwrap();
    handle.confirm_submit().unwrap();
    handle.confirm_submit().unwrap();
    let view = handle
        .wait_for(|v| v.phase == SessionPhase::Submitted)
        .await
        .unwrap();

    assert_eq!(view.submit_reason, Some(SubmitReason::Manual));
    assert!(view.receipt.is_some());

    let calls = backend.calls();
    assert_eq!(calls.len(), 3);
    let BackendCall::Save { progress, .. } = &calls[1] else {
        panic!("expected the final save before submit, got {:?}", calls[1]);
    };
    assert_eq!(progress.answers.get(&q(1)), Some(&AnswerValue::Choice(2)));
    let BackendCall::Submit { submission, .. } = &calls[2] else {
        panic!("expected submit last, got {:?}", calls[2]);
    };
    assert_eq!(
        submission.answers.get(&q(1)),
        Some(&AnswerValue::Choice(2))
    );

    // Nothing is saved once the attempt is submitted.
    sleep(Duration::from_secs(60)).await;
    assert_eq!(backend.calls().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn confirm_waits_for_the_running_save_before_flushing() {
    let backend = InMemoryBackend::new().with_exam(started(3600));
    backend.hold_saves();
    let handle = active(&backend).await;

    handle.answer(AnswerValue::Choice(0)).unwrap();
    sleep(Duration::from_millis(600)).await;
    assert_eq!(backend.saves_in_flight(), 1);

    handle.answer(AnswerValue::Choice(2)).unwrap();
    handle.confirm_submit().unwrap();
    handle
        .wait_for(|v| v.phase == SessionPhase::Submitting)
        .await
        .unwrap();
    sleep(Duration::from_millis(10)).await;
    assert_eq!(backend.saves_in_flight(), 1);
    assert_eq!(backend.saves().len(), 2);
    assert!(backend.submissions().is_empty());

    backend.open_saves();
    handle
        .wait_for(|v| v.phase == SessionPhase::Submitted)
        .await
        .unwrap();
    assert_eq!(backend.max_saves_in_flight(), 1);

    let calls = backend.calls();
    assert_eq!(calls.len(), 4);
    let BackendCall::Save { progress, .. } = &calls[2] else {
        panic!("expected the final save before submit, got {:?}", calls[2]);
    };
    assert_eq!(progress.answers.get(&q(1)), Some(&AnswerValue::Choice(2)));
    assert!(matches!(calls[3], BackendCall::Submit { .. }));
}

#[tokio::test(start_paused = true)]
async fn expiry_wins_over_a_pending_confirmation() {
    let backend = InMemoryBackend::new().with_exam(started(3));
    let handle = active(&backend).await;
    let expires_at = fixed_now() + TimeDelta::seconds(3);

    handle.request_submit().unwrap();
    handle.wait_for(|v| v.confirm.is_some()).await.unwrap();

    sleep(Duration::from_secs(3)).await;
    handle.confirm_submit().unwrap();

    let view = handle
        .wait_for(|v| v.phase == SessionPhase::Submitted)
        .await
        .unwrap();
    assert_eq!(view.submit_reason, Some(SubmitReason::Expired));
    assert_eq!(view.time_remaining, Some(0));
    assert!(view.confirm.is_none());

    let submissions = backend.submissions();
    assert_eq!(submissions.len(), 1);
    assert!(submissions[0].submitted_at >= expires_at);
}

#[tokio::test(start_paused = true)]
async fn no_time_left_submits_right_after_start() {
    let backend = InMemoryBackend::new().with_exam(started(0));
    let handle = spawn(&backend);
    handle.start(EXAM).unwrap();

    let view = handle
        .wait_for(|v| v.phase == SessionPhase::Submitted)
        .await
        .unwrap();
    assert_eq!(view.submit_reason, Some(SubmitReason::Expired));
    assert_eq!(backend.saves().len(), 1);
    assert_eq!(backend.submissions().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_submit_locks_input_and_retries_without_resaving() {
    let backend = InMemoryBackend::new().with_exam(started(3600));
    backend.fail_next_submit(BackendError::Status(502));
    let handle = active(&backend).await;

    handle.answer(AnswerValue::Choice(2)).unwrap();
    handle.confirm_submit().unwrap();
    let view = handle
        .wait_for(|v| v.phase == SessionPhase::SubmitFailed)
        .await
        .unwrap();
    assert!(view.error.unwrap().contains("could not submit"));

    handle.answer(AnswerValue::Choice(0)).unwrap();
    handle.next().unwrap();
    handle.retry_submit().unwrap();
    let view = handle
        .wait_for(|v| v.phase == SessionPhase::Submitted)
        .await
        .unwrap();

    assert_eq!(view.position.unwrap().global_index, 0);
    assert_eq!(
        view.current_question.unwrap().answer,
        Some(AnswerValue::Choice(2))
    );
    assert_eq!(backend.saves().len(), 1);
    let submissions = backend.submissions();
    assert_eq!(submissions.len(), 2);
    assert_eq!(submissions[0], submissions[1]);
}

//
// ─── TEARDOWN ──────────────────────────────────────────────────────────────────
//

#[tokio::test(start_paused = true)]
async fn unmount_cancels_timers_and_closes_the_handle() {
    let backend = InMemoryBackend::new().with_exam(started(3600));
    let handle = active(&backend).await;

    handle.answer(AnswerValue::Choice(1)).unwrap();
    handle.unmount().unwrap();
    handle.closed().await;

    sleep(Duration::from_secs(60)).await;
    assert!(backend.saves().is_empty());
    assert!(backend.submissions().is_empty());
    assert_eq!(handle.view().time_remaining, Some(3600));

    assert_eq!(handle.next(), Err(SessionError::EngineClosed));
    assert_eq!(
        handle
            .wait_for(|v| v.phase == SessionPhase::Submitted)
            .await
            .unwrap_err(),
        SessionError::EngineClosed
    );
}

#[tokio::test(start_paused = true)]
async fn unmount_clears_flags_and_publishes_a_closed_view() {
    let backend = InMemoryBackend::new().with_exam(started(3600));
    let handle = active(&backend).await;

    handle.toggle_flag().unwrap();
    handle.request_submit().unwrap();
    handle
        .wait_for(|v| v.confirm.is_some() && v.palette[0].flagged)
        .await
        .unwrap();

    handle.unmount().unwrap();
    handle.closed().await;

    let view = handle.view();
    assert_eq!(view.phase, SessionPhase::Unmounted);
    assert!(!view.phase.accepts_input());
    assert!(view.confirm.is_none());
    assert!(view.palette.iter().all(|entry| !entry.flagged));
    assert!(!view.current_question.unwrap().flagged);
    assert!(!view.save.state.in_flight);
}
