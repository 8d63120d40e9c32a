use backend::{ProgressSnapshot, StartedExam, Submission};
use chrono::{DateTime, TimeDelta, Utc};
use exam_core::Countdown;
use exam_core::model::{AnswerStore, AnswerValue, Cursor, ExamDefinition, FlagSet, Question, Session};
use tokio::time::Instant;
use tracing::warn;

/// Wall-clock time pinned to a monotonic instant.
///
/// Timestamps derived from it follow the monotonic clock, so they cannot drift
/// backwards when the system clock is adjusted mid-exam.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WallAnchor {
    wall: DateTime<Utc>,
    instant: Instant,
}

impl WallAnchor {
    pub(crate) fn new(wall: DateTime<Utc>, instant: Instant) -> Self {
        Self { wall, instant }
    }

    pub(crate) fn at(&self, instant: Instant) -> DateTime<Utc> {
        let elapsed = instant.saturating_duration_since(self.instant);
        self.wall + TimeDelta::from_std(elapsed).unwrap_or_else(|_| TimeDelta::zero())
    }
}

/// Everything the student works on during an active attempt.
#[derive(Debug)]
pub(crate) struct Attempt {
    pub session: Session,
    pub exam: ExamDefinition,
    pub answers: AnswerStore,
    pub flags: FlagSet,
    pub cursor: Cursor,
    pub countdown: Countdown,
    anchor: WallAnchor,
}

impl Attempt {
    /// Build the attempt from a start response, restoring any earlier progress.
    ///
    /// Saved answers that no longer fit their question are dropped.
    pub(crate) fn resume(started: StartedExam, anchor: WallAnchor) -> Self {
        let StartedExam {
            session,
            exam,
            saved_answers,
            current_question_index,
        } = started;

        let mut answers = AnswerStore::new();
        for (id, raw) in &saved_answers {
            let Some(question) = exam.question(*id) else {
                warn!(question = %id, "dropping saved answer for unknown question");
                continue;
            };
            match AnswerValue::resolve(question, raw) {
                Ok(value) => answers.set_answer(*id, value),
                Err(err) => warn!(question = %id, error = %err, "dropping unreadable saved answer"),
            }
        }

        let cursor = current_question_index
            .and_then(|index| Cursor::from_global_index(&exam, index))
            .unwrap_or_else(|| Cursor::first(&exam));
        let countdown = Countdown::new(session.initial_remaining_seconds(&exam));

        Self {
            session,
            exam,
            answers,
            flags: FlagSet::new(),
            cursor,
            countdown,
            anchor,
        }
    }

    pub(crate) fn current_question(&self) -> Option<&Question> {
        self.exam.question_at(self.cursor)
    }

    pub(crate) fn global_index(&self) -> usize {
        self.cursor.global_index(&self.exam)
    }

    pub(crate) fn wall_time(&self, at: Instant) -> DateTime<Utc> {
        self.anchor.at(at)
    }

    pub(crate) fn progress_snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            answers: self.answers.snapshot(),
            current_question_index: self.global_index(),
            time_remaining: self.countdown.remaining(),
        }
    }

    pub(crate) fn submission(&self, at: Instant) -> Submission {
        Submission {
            session_id: self.session.id(),
            answers: self.answers.snapshot(),
            submitted_at: self.wall_time(at),
        }
    }
}
