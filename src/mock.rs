//! Mock collaborator for testing the quiz without real API calls.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::collaborator::GenerationCollaborator;
use crate::domain::{DifficultyLevel, RuleCategory, WordItem};
use crate::error::CollaboratorError;

/// Returns canned content; `None` in a slot means "fail that call".
pub struct MockCollaborator {
    words: Option<Vec<WordItem>>,
    rules: Option<Vec<RuleCategory>>,
    speech: Option<Vec<u8>>,
    word_calls: AtomicU32,
    speech_calls: AtomicU32,
    last_excluded: Mutex<Vec<String>>,
}

impl MockCollaborator {
    pub fn new() -> Self {
        Self {
            words: None,
            rules: None,
            speech: None,
            word_calls: AtomicU32::new(0),
            speech_calls: AtomicU32::new(0),
            last_excluded: Mutex::new(Vec::new()),
        }
    }

    pub fn with_words(mut self, words: Vec<WordItem>) -> Self {
        self.words = Some(words);
        self
    }

    pub fn with_rules(mut self, rules: Vec<RuleCategory>) -> Self {
        self.rules = Some(rules);
        self
    }

    pub fn with_speech(mut self, pcm: Vec<u8>) -> Self {
        self.speech = Some(pcm);
        self
    }

    pub fn word_calls(&self) -> u32 {
        self.word_calls.load(Ordering::Relaxed)
    }

    pub fn speech_calls(&self) -> u32 {
        self.speech_calls.load(Ordering::Relaxed)
    }

    pub fn last_excluded(&self) -> Vec<String> {
        self.last_excluded.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationCollaborator for MockCollaborator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate_words(
        &self,
        _difficulty: DifficultyLevel,
        excluded: &[String],
    ) -> Result<Vec<WordItem>, CollaboratorError> {
        self.word_calls.fetch_add(1, Ordering::Relaxed);
        *self.last_excluded.lock().unwrap() = excluded.to_vec();
        self.words
            .clone()
            .ok_or_else(|| CollaboratorError::Parse("mock words unavailable".into()))
    }

    async fn generate_rule_examples(&self) -> Result<Vec<RuleCategory>, CollaboratorError> {
        self.rules
            .clone()
            .ok_or_else(|| CollaboratorError::Parse("mock rules unavailable".into()))
    }

    async fn synthesize_speech(&self, _text: &str) -> Result<Option<Vec<u8>>, CollaboratorError> {
        self.speech_calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.speech.clone())
    }
}
