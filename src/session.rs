//! Quiz progress: the per-session state value and the pure answer evaluator.
//!
//! `SessionState` is replaced wholesale when a new session starts. `evaluate`
//! never mutates its input: it returns the next state so observers always see
//! a consistent before/after snapshot.

use serde::{Deserialize, Serialize};

use crate::domain::{AnswerRecord, Mode, Sound, WordItem};
use crate::error::EvaluateError;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    #[serde(default)]
    pub mode: Mode,
    pub items: Vec<WordItem>,
    pub current_index: usize,
    pub score: usize,
    #[serde(default)]
    pub history: Vec<AnswerRecord>,
    pub total_questions: usize,
}

impl SessionState {
    /// Fresh quiz over `items`: index 0, score 0, empty history, mode InQuiz.
    pub fn new(items: Vec<WordItem>) -> Self {
        let total_questions = items.len();
        Self {
            mode: Mode::InQuiz,
            items,
            current_index: 0,
            score: 0,
            history: Vec::new(),
            total_questions,
        }
    }

    /// True once every question has been answered.
    pub fn is_finished(&self) -> bool {
        self.total_questions > 0 && self.current_index >= self.total_questions
    }

    pub fn current_word(&self) -> Option<&WordItem> {
        if self.current_index < self.total_questions {
            self.items.get(self.current_index)
        } else {
            None
        }
    }

    /// Rounded score percentage; 0 for an empty session.
    pub fn percentage(&self) -> u32 {
        if self.total_questions == 0 {
            return 0;
        }
        ((self.score as f64 / self.total_questions as f64) * 100.0).round() as u32
    }
}

/// Score one answer against the current word and return the next state.
pub fn evaluate(state: &SessionState, choice: Sound) -> Result<SessionState, EvaluateError> {
    let current = state
        .items
        .get(state.current_index)
        .ok_or(EvaluateError::OutOfRange {
            index: state.current_index,
            len: state.items.len(),
        })?;

    let is_correct = choice == current.expected_sound;
    let mut next = state.clone();
    next.current_index = state.current_index + 1;
    if is_correct {
        next.score += 1;
    }
    next.history.push(AnswerRecord {
        word: current.word.clone(),
        user_choice: choice,
        is_correct,
    });
    Ok(next)
}
