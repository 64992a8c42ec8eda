use std::collections::BTreeSet;

use crate::{Question, StageCategory};

/// Tracks how far the interviewer agent has advanced through the question
/// list.
///
/// Progress events are last-write-wins: the wire offers no ordering
/// guarantee, so the received index is taken as-is with no monotonicity
/// check. `completed_stages` is derived on every read, never stored.
#[derive(Debug)]
pub struct ProgressTracker {
    questions: Vec<Question>,
    current_question_index: usize,
}

impl ProgressTracker {
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            questions,
            current_question_index: 0,
        }
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn current_question_index(&self) -> usize {
        self.current_question_index
    }

    /// Applies a progress event from the agent.
    pub fn apply(&mut self, question_index: usize) {
        self.current_question_index = question_index;
    }

    /// Stage categories of every question before the current one.
    pub fn completed_stages(&self) -> BTreeSet<StageCategory> {
        self.questions
            .iter()
            .take(self.current_question_index)
            .map(|q| q.category)
            .collect()
    }

    /// Returns to the first question with nothing completed.
    pub fn reset(&mut self) {
        self.current_question_index = 0;
    }
}
