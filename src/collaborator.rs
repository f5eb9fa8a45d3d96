//! The external generation collaborator: fresh word lists, rule examples and
//! synthesized speech.
//!
//! Implementations report failures as `CollaboratorError`; the word source and
//! the logic layer turn those into empty batches, kept content or silence, so
//! nothing thrown here ever reaches the user.

use async_trait::async_trait;

use crate::domain::{DifficultyLevel, RuleCategory, WordItem};
use crate::error::CollaboratorError;

#[async_trait]
pub trait GenerationCollaborator: Send + Sync {
    /// Human-readable backend name for logs.
    fn name(&self) -> &str;

    /// A fresh batch of -ed words for `difficulty`, avoiding `excluded`.
    async fn generate_words(
        &self,
        difficulty: DifficultyLevel,
        excluded: &[String],
    ) -> Result<Vec<WordItem>, CollaboratorError>;

    /// New rule cards. Callers keep prior content unless exactly three arrive.
    async fn generate_rule_examples(&self) -> Result<Vec<RuleCategory>, CollaboratorError>;

    /// Raw little-endian PCM16 audio for `text`, or `None` if the backend had nothing.
    async fn synthesize_speech(&self, text: &str) -> Result<Option<Vec<u8>>, CollaboratorError>;
}
