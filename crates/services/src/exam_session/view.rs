use backend::SubmissionReceipt;
use exam_core::model::{AnswerValue, Question, QuestionId, QuestionKind, SessionId};
use exam_core::time::{LOW_TIME_THRESHOLD_SECS, format_remaining};
use serde::Serialize;

use super::attempt::Attempt;
use super::lifecycle::{Lifecycle, SessionPhase, SubmitReason};
use crate::save::{SaveCoordinator, SaveStatus};

/// Where the cursor sits, in both nested and flattened form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionPosition {
    pub section_index: usize,
    pub question_index: usize,
    pub global_index: usize,
    pub section_title: String,
}

/// The question under the cursor with the student's current answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionView {
    pub id: QuestionId,
    pub kind: QuestionKind,
    pub prompt: String,
    pub options: Vec<String>,
    pub points: u32,
    pub answer: Option<AnswerValue>,
    pub flagged: bool,
}

impl QuestionView {
    fn from_attempt(question: &Question, attempt: &Attempt) -> Self {
        Self {
            id: question.id(),
            kind: question.kind(),
            prompt: question.prompt().to_owned(),
            options: question.options().to_vec(),
            points: question.points(),
            answer: attempt.answers.get_answer(question.id()).cloned(),
            flagged: attempt.flags.is_flagged(question.id()),
        }
    }
}

/// One cell of the question palette.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaletteEntry {
    pub id: QuestionId,
    pub section_index: usize,
    pub question_index: usize,
    pub answered: bool,
    pub flagged: bool,
    pub current: bool,
}

/// Counts shown in the submit confirmation dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubmitSummary {
    pub answered: usize,
    pub unanswered: usize,
    pub flagged: usize,
    pub total: usize,
}

/// Presentation-agnostic snapshot of the exam session.
///
/// Published after every state change; the UI renders it and sends commands back
/// through the handle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExamSessionView {
    pub phase: SessionPhase,
    pub error: Option<String>,
    pub session_id: Option<SessionId>,
    pub exam_title: Option<String>,
    pub position: Option<QuestionPosition>,
    pub current_question: Option<QuestionView>,
    pub answered: usize,
    pub total: usize,
    pub total_points: u32,
    pub progress_percent: u8,
    pub time_remaining: Option<u64>,
    pub time_display: Option<String>,
    pub low_time: bool,
    pub save: SaveStatus,
    pub confirm: Option<SubmitSummary>,
    pub palette: Vec<PaletteEntry>,
    pub submit_reason: Option<SubmitReason>,
    pub receipt: Option<SubmissionReceipt>,
}

impl ExamSessionView {
    pub(crate) fn build(
        lifecycle: &Lifecycle,
        attempt: Option<&Attempt>,
        saves: &SaveCoordinator,
        confirm_open: bool,
    ) -> Self {
        let mut view = Self {
            phase: lifecycle.phase(),
            error: lifecycle.error().map(ToString::to_string),
            save: saves.status(),
            submit_reason: lifecycle.reason(),
            receipt: lifecycle.receipt().cloned(),
            ..Self::default()
        };
        let Some(attempt) = attempt else {
            return view;
        };

        let exam = &attempt.exam;
        let cursor = attempt.cursor;
        let total = exam.total_questions();
        let answered = attempt.answers.answered_count();
        let remaining = attempt.countdown.remaining();

        view.session_id = Some(attempt.session.id());
        view.exam_title = Some(exam.title().to_owned());
        view.position = exam
            .sections()
            .get(cursor.section_index())
            .map(|section| QuestionPosition {
                section_index: cursor.section_index(),
                question_index: cursor.question_index(),
                global_index: attempt.global_index(),
                section_title: section.title().to_owned(),
            });
        view.current_question = attempt
            .current_question()
            .map(|question| QuestionView::from_attempt(question, attempt));
        view.answered = answered;
        view.total = total;
        view.total_points = exam.total_points();
        view.progress_percent = percent(answered, total);
        view.time_remaining = Some(remaining);
        view.time_display = Some(format_remaining(remaining));
        view.low_time = remaining < LOW_TIME_THRESHOLD_SECS;
        view.confirm = confirm_open.then(|| SubmitSummary {
            answered,
            unanswered: total.saturating_sub(answered),
            flagged: attempt.flags.len(),
            total,
        });
        view.palette = exam
            .sections()
            .iter()
            .enumerate()
            .flat_map(|(s, section)| {
                section
                    .questions()
                    .iter()
                    .enumerate()
                    .map(move |(q, question)| (s, q, question.id()))
            })
            .map(|(s, q, id)| PaletteEntry {
                id,
                section_index: s,
                question_index: q,
                answered: attempt.answers.is_answered(id),
                flagged: attempt.flags.is_flagged(id),
                current: s == cursor.section_index() && q == cursor.question_index(),
            })
            .collect();

        view
    }
}

fn percent(part: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    u8::try_from(part.min(total) * 100 / total).unwrap_or(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_rounds_down_and_handles_empty() {
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(3, 3), 100);
        assert_eq!(percent(5, 3), 100);
    }
}
