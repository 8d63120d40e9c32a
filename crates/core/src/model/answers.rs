use std::collections::{BTreeMap, HashMap, HashSet};

use crate::model::answer::AnswerValue;
use crate::model::ids::QuestionId;

/// Ordered snapshot of all answers, as sent to the backend.
pub type AnswerMap = BTreeMap<QuestionId, AnswerValue>;

/// In-memory answers for one attempt.
///
/// `set_answer` is the only mutator: each call replaces exactly one entry.
/// Values are stored as given; shape checks belong to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerStore {
    answers: HashMap<QuestionId, AnswerValue>,
}

impl AnswerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_answer(&mut self, question: QuestionId, value: AnswerValue) {
        self.answers.insert(question, value);
    }

    /// Stored value, or `None` when unanswered.
    #[must_use]
    pub fn get_answer(&self, question: QuestionId) -> Option<&AnswerValue> {
        self.answers.get(&question)
    }

    #[must_use]
    pub fn is_answered(&self, question: QuestionId) -> bool {
        self.answers.get(&question).is_some_and(|v| !v.is_empty())
    }

    /// Number of distinct questions holding a non-empty value.
    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.values().filter(|v| !v.is_empty()).count()
    }

    #[must_use]
    pub fn snapshot(&self) -> AnswerMap {
        self.answers
            .iter()
            .map(|(id, value)| (*id, value.clone()))
            .collect()
    }
}

/// Questions marked for review. Local only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagSet {
    flagged: HashSet<QuestionId>,
}

impl FlagSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the mark on a question, returning whether it is now flagged.
    pub fn toggle(&mut self, question: QuestionId) -> bool {
        if self.flagged.remove(&question) {
            false
        } else {
            self.flagged.insert(question);
            true
        }
    }

    #[must_use]
    pub fn is_flagged(&self, question: QuestionId) -> bool {
        self.flagged.contains(&question)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.flagged.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flagged.is_empty()
    }

    pub fn clear(&mut self) {
        self.flagged.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_answer_overwrites_previous_value() {
        let mut store = AnswerStore::new();
        let q = QuestionId::new(1);

        store.set_answer(q, AnswerValue::Choice(0));
        store.set_answer(q, AnswerValue::Choice(2));

        assert_eq!(store.get_answer(q), Some(&AnswerValue::Choice(2)));
        assert_eq!(store.answered_count(), 1);
        assert_eq!(store.snapshot().len(), 1);
    }

    #[test]
    fn blank_text_does_not_count_as_answered() {
        let mut store = AnswerStore::new();
        store.set_answer(QuestionId::new(1), AnswerValue::Text("   ".into()));
        store.set_answer(QuestionId::new(2), AnswerValue::TrueFalse(false));

        assert_eq!(store.answered_count(), 1);
        assert!(!store.is_answered(QuestionId::new(1)));
        assert!(store.get_answer(QuestionId::new(1)).is_some());
        assert!(store.get_answer(QuestionId::new(3)).is_none());
    }

    #[test]
    fn snapshot_is_ordered_by_question() {
        let mut store = AnswerStore::new();
        store.set_answer(QuestionId::new(9), AnswerValue::Choice(1));
        store.set_answer(QuestionId::new(3), AnswerValue::Choice(0));

        let keys: Vec<_> = store.snapshot().keys().copied().collect();
        assert_eq!(keys, vec![QuestionId::new(3), QuestionId::new(9)]);
    }

    #[test]
    fn flags_toggle() {
        let mut flags = FlagSet::new();
        assert!(flags.toggle(QuestionId::new(4)));
        assert!(flags.is_flagged(QuestionId::new(4)));
        assert!(!flags.toggle(QuestionId::new(4)));
        assert!(flags.is_empty());
    }
}
