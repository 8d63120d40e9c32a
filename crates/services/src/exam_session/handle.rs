use exam_core::model::{AnswerValue, ExamId, QuestionId};
use tokio::sync::{mpsc, watch};

use super::engine::Command;
use super::view::ExamSessionView;
use crate::error::SessionError;

/// Cloneable front door to a running `ExamSessionEngine`.
///
/// Every command is fire-and-forget: the engine applies it in order and publishes a new
/// `ExamSessionView`. Commands that make no sense in the current phase are ignored, and
/// every command fails with `SessionError::EngineClosed` once the engine has stopped.
#[derive(Clone)]
pub struct ExamSessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<ExamSessionView>,
}

impl ExamSessionHandle {
    pub(crate) fn new(
        commands: mpsc::UnboundedSender<Command>,
        view: watch::Receiver<ExamSessionView>,
    ) -> Self {
        Self { commands, view }
    }

    pub fn start(&self, exam_id: ExamId) -> Result<(), SessionError> {
        self.send(Command::Start(exam_id))
    }

    /// Answer the question under the cursor.
    pub fn answer(&self, value: AnswerValue) -> Result<(), SessionError> {
        self.send(Command::Answer {
            question: None,
            value,
        })
    }

    pub fn answer_question(
        &self,
        question: QuestionId,
        value: AnswerValue,
    ) -> Result<(), SessionError> {
        self.send(Command::Answer {
            question: Some(question),
            value,
        })
    }

    /// Toggle the review flag on the question under the cursor.
    pub fn toggle_flag(&self) -> Result<(), SessionError> {
        self.send(Command::ToggleFlag(None))
    }

    pub fn toggle_flag_on(&self, question: QuestionId) -> Result<(), SessionError> {
        self.send(Command::ToggleFlag(Some(question)))
    }

    pub fn next(&self) -> Result<(), SessionError> {
        self.send(Command::Next)
    }

    pub fn previous(&self) -> Result<(), SessionError> {
        self.send(Command::Previous)
    }

    /// Jump to a question; out-of-range positions are ignored.
    pub fn jump_to(&self, section_index: usize, question_index: usize) -> Result<(), SessionError> {
        self.send(Command::JumpTo {
            section_index,
            question_index,
        })
    }

    /// Open the confirmation dialog.
    pub fn request_submit(&self) -> Result<(), SessionError> {
        self.send(Command::RequestSubmit)
    }

    pub fn cancel_submit(&self) -> Result<(), SessionError> {
        self.send(Command::CancelSubmit)
    }

    /// Submit the attempt. Repeated confirms produce a single submission.
    pub fn confirm_submit(&self) -> Result<(), SessionError> {
        self.send(Command::ConfirmSubmit)
    }

    /// Save now and report each failed attempt in the banner.
    pub fn retry_save(&self) -> Result<(), SessionError> {
        self.send(Command::RetrySave)
    }

    pub fn retry_submit(&self) -> Result<(), SessionError> {
        self.send(Command::RetrySubmit)
    }

    /// Stop timers and saves and shut the engine down.
    pub fn unmount(&self) -> Result<(), SessionError> {
        self.send(Command::Unmount)
    }

    /// Latest published view.
    #[must_use]
    pub fn view(&self) -> ExamSessionView {
        self.view.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ExamSessionView> {
        self.view.clone()
    }

    /// Wait until the published view satisfies `predicate`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EngineClosed` if the engine stops first.
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&ExamSessionView) -> bool,
    ) -> Result<ExamSessionView, SessionError> {
        let mut view = self.view.clone();
        let matched = view
            .wait_for(predicate)
            .await
            .map_err(|_| SessionError::EngineClosed)?;
        Ok(matched.clone())
    }

    /// Resolves once the engine has stopped.
    pub async fn closed(&self) {
        self.commands.closed().await;
    }

    fn send(&self, command: Command) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .map_err(|_| SessionError::EngineClosed)
    }
}
