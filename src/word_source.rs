//! Word source: produces the ordered batch of quiz items for a session.
//!
//! Two paths:
//!   - static: the bundled (or configured) bank, minus already-seen words, shuffled
//!   - generated: whatever the generation collaborator supplies
//!
//! A failed or empty generated batch falls back to the full static bank, in
//! bank order.

use std::collections::HashSet;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::collaborator::GenerationCollaborator;
use crate::config::QuizSettings;
use crate::domain::{DifficultyLevel, WordItem};
use crate::ledger::word_key;

/// What the controller asks for when a session starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchRequest {
  pub token: u64,
  pub use_generated: bool,
  pub difficulty: DifficultyLevel,
  pub excluded: Vec<String>,
}

/// Where a batch came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOrigin {
  Generated,
  Static,
  Fallback,
}

impl BatchOrigin {
  pub fn as_str(self) -> &'static str {
    match self {
      BatchOrigin::Generated => "generated",
      BatchOrigin::Static => "static",
      BatchOrigin::Fallback => "fallback",
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Batch {
  pub items: Vec<WordItem>,
  pub origin: BatchOrigin,
}

#[derive(Clone)]
pub struct WordSource {
  bank: Vec<WordItem>,
  batch_size: usize,
  min_viable: usize,
  collaborator: Option<Arc<dyn GenerationCollaborator>>,
}

impl WordSource {
  pub fn new(
    bank: Vec<WordItem>,
    settings: &QuizSettings,
    collaborator: Option<Arc<dyn GenerationCollaborator>>,
  ) -> Self {
    Self {
      bank,
      batch_size: settings.batch_size,
      min_viable: settings.min_viable_pool,
      collaborator,
    }
  }

  pub fn bank(&self) -> &[WordItem] {
    &self.bank
  }

  pub fn has_collaborator(&self) -> bool {
    self.collaborator.is_some()
  }

  /// Shuffled batch from the bank, skipping `excluding`.
  ///
  /// If fewer than the minimum viable number of words survive the filter, the
  /// unfiltered bank is used instead: repeats beat starvation.
  pub fn static_batch<R: Rng + ?Sized>(&self, excluding: &[String], rng: &mut R) -> Vec<WordItem> {
    let excluded: HashSet<String> = excluding.iter().map(|w| word_key(w)).collect();
    let filtered: Vec<WordItem> = self
      .bank
      .iter()
      .filter(|w| !excluded.contains(&word_key(&w.word)))
      .cloned()
      .collect();

    let mut pool = if filtered.len() >= self.min_viable {
      filtered
    } else {
      self.bank.clone()
    };
    pool.shuffle(rng);
    pool.truncate(self.batch_size);
    pool
  }

  /// Batch from the collaborator. Empty on any failure; the caller falls back.
  #[instrument(level = "info", skip(self, excluding), fields(%difficulty, excluded = excluding.len()))]
  pub async fn generated_batch(&self, difficulty: DifficultyLevel, excluding: &[String]) -> Vec<WordItem> {
    let Some(collab) = &self.collaborator else {
      warn!(target: "quiz", %difficulty, "No generation collaborator configured; generated batch is empty");
      return Vec::new();
    };

    let start = std::time::Instant::now();
    match collab.generate_words(difficulty, excluding).await {
      Ok(words) => {
        info!(target: "quiz", backend = collab.name(), count = words.len(), elapsed = ?start.elapsed(), "Generated word batch received");
        words
      }
      Err(e) => {
        error!(target: "quiz", backend = collab.name(), error = %e, elapsed = ?start.elapsed(), "Word generation failed");
        Vec::new()
      }
    }
  }

  /// Resolve a controller request into a batch, applying the fallback policy.
  #[instrument(level = "info", skip(self, request), fields(token = request.token, generated = request.use_generated, difficulty = %request.difficulty))]
  pub async fn fetch(&self, request: &BatchRequest) -> Batch {
    if request.use_generated {
      let items = self.generated_batch(request.difficulty, &request.excluded).await;
      if !items.is_empty() {
        return Batch { items, origin: BatchOrigin::Generated };
      }
      warn!(target: "quiz", token = request.token, "Generated batch empty; falling back to the full static list");
      return Batch { items: self.bank.clone(), origin: BatchOrigin::Fallback };
    }

    let mut rng = StdRng::from_entropy();
    Batch {
      items: self.static_batch(&request.excluded, &mut rng),
      origin: BatchOrigin::Static,
    }
  }
}
