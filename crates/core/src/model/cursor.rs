use thiserror::Error;

use crate::model::exam::ExamDefinition;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CursorError {
    #[error("position ({section_index}, {question_index}) is outside the exam")]
    OutOfBounds {
        section_index: usize,
        question_index: usize,
    },
}

/// Position of the student within the nested section/question structure.
///
/// Every operation takes the exam by reference and derives positions from it on
/// demand; nothing about the structure is cached here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Cursor {
    section_index: usize,
    question_index: usize,
}

impl Cursor {
    #[must_use]
    pub fn new(section_index: usize, question_index: usize) -> Self {
        Self {
            section_index,
            question_index,
        }
    }

    /// First question of the exam, skipping empty leading sections.
    #[must_use]
    pub fn first(exam: &ExamDefinition) -> Self {
        exam.sections()
            .iter()
            .position(|s| !s.is_empty())
            .map_or_else(Self::default, |s| Self::new(s, 0))
    }

    /// Cursor at a flattened global question index.
    #[must_use]
    pub fn from_global_index(exam: &ExamDefinition, global_index: usize) -> Option<Self> {
        let mut remaining = global_index;
        for (s, section) in exam.sections().iter().enumerate() {
            if remaining < section.len() {
                return Some(Self::new(s, remaining));
            }
            remaining -= section.len();
        }
        None
    }

    #[must_use]
    pub fn section_index(&self) -> usize {
        self.section_index
    }

    #[must_use]
    pub fn question_index(&self) -> usize {
        self.question_index
    }

    /// Whether this position names an existing question.
    #[must_use]
    pub fn is_valid(&self, exam: &ExamDefinition) -> bool {
        exam.section_len(self.section_index)
            .is_some_and(|len| self.question_index < len)
    }

    /// Flattened index: questions in all preceding sections plus the in-section offset.
    #[must_use]
    pub fn global_index(&self, exam: &ExamDefinition) -> usize {
        let preceding: usize = exam
            .sections()
            .iter()
            .take(self.section_index)
            .map(|s| s.len())
            .sum();
        preceding + self.question_index
    }

    /// Move to the next question, crossing into the following non-empty section.
    ///
    /// Returns `false` (and leaves the cursor untouched) at the last question.
    pub fn go_next(&mut self, exam: &ExamDefinition) -> bool {
        let in_section = exam.section_len(self.section_index).unwrap_or(0);
        if self.question_index + 1 < in_section {
            self.question_index += 1;
            return true;
        }

        let next_section = exam
            .sections()
            .iter()
            .enumerate()
            .skip(self.section_index + 1)
            .find(|(_, s)| !s.is_empty());
        match next_section {
            Some((s, _)) => {
                *self = Self::new(s, 0);
                true
            }
            None => false,
        }
    }

    /// Move to the previous question, crossing into the preceding non-empty section.
    ///
    /// Returns `false` (and leaves the cursor untouched) at the first question.
    pub fn go_previous(&mut self, exam: &ExamDefinition) -> bool {
        if self.question_index > 0 {
            self.question_index -= 1;
            return true;
        }

        let previous_section = exam
            .sections()
            .iter()
            .enumerate()
            .take(self.section_index)
            .rev()
            .find(|(_, s)| !s.is_empty());
        match previous_section {
            Some((s, section)) => {
                *self = Self::new(s, section.len() - 1);
                true
            }
            None => false,
        }
    }

    /// Set the cursor directly, as the question palette does.
    ///
    /// # Errors
    ///
    /// Returns `CursorError::OutOfBounds` if the position names no question; the cursor is
    /// left unchanged.
    pub fn jump_to(
        &mut self,
        exam: &ExamDefinition,
        section_index: usize,
        question_index: usize,
    ) -> Result<(), CursorError> {
        let target = Self::new(section_index, question_index);
        if !target.is_valid(exam) {
            return Err(CursorError::OutOfBounds {
                section_index,
                question_index,
            });
        }
        *self = target;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExamId, Question, QuestionId, QuestionKind, Section};

    fn exam_with(sizes: &[usize]) -> ExamDefinition {
        let mut next_id = 0;
        let sections = sizes
            .iter()
            .map(|&n| {
                let questions = (0..n)
                    .map(|_| {
                        next_id += 1;
                        Question::new(QuestionId::new(next_id), QuestionKind::Essay, 1)
                    })
                    .collect();
                Section::new("S", questions)
            })
            .collect();
        ExamDefinition::new(ExamId::new(1), "Nav", 30, sections).unwrap()
    }

    #[test]
    fn navigation_is_clamped_at_exam_bounds() {
        let exam = exam_with(&[3, 2]);

        let mut cursor = Cursor::first(&exam);
        assert!(!cursor.go_previous(&exam));
        assert_eq!(cursor, Cursor::new(0, 0));

        let mut cursor = Cursor::new(1, 1);
        assert!(!cursor.go_next(&exam));
        assert_eq!(cursor, Cursor::new(1, 1));

        assert_eq!(Cursor::new(1, 0).global_index(&exam), 3);
    }

    #[test]
    fn next_and_previous_cross_section_boundaries() {
        let exam = exam_with(&[3, 2]);
        let mut cursor = Cursor::new(0, 2);

        assert!(cursor.go_next(&exam));
        assert_eq!(cursor, Cursor::new(1, 0));

        assert!(cursor.go_previous(&exam));
        assert_eq!(cursor, Cursor::new(0, 2));
    }

    #[test]
    fn walking_forward_visits_every_question_once() {
        let exam = exam_with(&[3, 2]);
        let mut cursor = Cursor::first(&exam);
        let mut visited = vec![cursor.global_index(&exam)];
        while cursor.go_next(&exam) {
            visited.push(cursor.global_index(&exam));
        }
        assert_eq!(visited, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn empty_sections_are_skipped() {
        let exam = exam_with(&[0, 2, 0, 1, 0]);

        let mut cursor = Cursor::first(&exam);
        assert_eq!(cursor, Cursor::new(1, 0));
        assert!(!cursor.go_previous(&exam));

        cursor = Cursor::new(1, 1);
        assert!(cursor.go_next(&exam));
        assert_eq!(cursor, Cursor::new(3, 0));
        assert!(!cursor.go_next(&exam));

        assert!(cursor.go_previous(&exam));
        assert_eq!(cursor, Cursor::new(1, 1));
    }

    #[test]
    fn jump_to_validates_bounds() {
        let exam = exam_with(&[3, 2]);
        let mut cursor = Cursor::first(&exam);

        cursor.jump_to(&exam, 1, 1).unwrap();
        assert_eq!(cursor.global_index(&exam), 4);

        let err = cursor.jump_to(&exam, 1, 2).unwrap_err();
        assert_eq!(
            err,
            CursorError::OutOfBounds {
                section_index: 1,
                question_index: 2
            }
        );
        assert!(cursor.jump_to(&exam, 5, 0).is_err());
        assert_eq!(cursor, Cursor::new(1, 1));
    }

    #[test]
    fn global_index_round_trips_through_positions() {
        let exam = exam_with(&[3, 0, 2]);
        assert_eq!(Cursor::from_global_index(&exam, 3), Some(Cursor::new(2, 0)));
        assert_eq!(Cursor::from_global_index(&exam, 5), None);
        assert_eq!(Cursor::new(2, 1).global_index(&exam), 4);
    }
}
