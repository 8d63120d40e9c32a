//! Built-in exam served by the in-memory backend when no API is configured.

use std::collections::BTreeMap;

use backend::{InMemoryBackend, StartedExam};
use chrono::TimeDelta;
use exam_core::Clock;
use exam_core::model::{
    ExamDefinition, ExamError, ExamId, Question, QuestionId, QuestionKind, Section, Session,
    SessionId, StudentId,
};

const DEMO_MINUTES: u32 = 10;

pub fn seeded_backend(
    exam_id: ExamId,
    clock: &Clock,
) -> Result<InMemoryBackend, Box<dyn std::error::Error>> {
    let exam = demo_exam(exam_id)?;
    let started_at = clock.now();
    let session = Session::new(
        SessionId::random(),
        exam_id,
        StudentId::new(1),
        started_at,
        started_at + TimeDelta::minutes(i64::from(DEMO_MINUTES)),
        None,
    )?;

    Ok(InMemoryBackend::new().with_exam(StartedExam {
        session,
        exam,
        saved_answers: BTreeMap::new(),
        current_question_index: None,
    }))
}

fn demo_exam(exam_id: ExamId) -> Result<ExamDefinition, ExamError> {
    let q = QuestionId::new;
    ExamDefinition::new(
        exam_id,
        "Demo: Introductory Physics",
        DEMO_MINUTES,
        vec![
            Section::new(
                "Mechanics",
                vec![
                    Question::new(q(1), QuestionKind::MultipleChoice, 2)
                        .with_prompt("Which value is closest to g at sea level, in m/s²?")
                        .with_options(["1.6", "3.7", "9.8", "24.8"]),
                    Question::new(q(2), QuestionKind::TrueFalse, 1)
                        .with_prompt("Mass and weight are the same quantity."),
                    Question::new(q(3), QuestionKind::ShortAnswer, 2)
                        .with_prompt("Name the SI unit of force."),
                ],
            ),
            Section::new(
                "Energy",
                vec![
                    Question::new(q(4), QuestionKind::Essay, 5)
                        .with_prompt("Explain why a pendulum eventually stops swinging."),
                    Question::new(q(5), QuestionKind::TrueFalse, 1)
                        .with_prompt("Kinetic energy grows with the square of speed."),
                ],
            ),
        ],
    )
}
