//! Error types for the quiz core and its adapters.

use thiserror::Error;

use crate::domain::Mode;

/// Errors from the generation collaborator (word lists, rule examples, speech).
///
/// These never reach the user: callers degrade to static content or keep prior content.
#[derive(Debug, Error)]
pub enum CollaboratorError {
  /// The API returned a non-success status.
  #[error("API error (HTTP {status}): {message}")]
  Api { status: u16, message: String },

  /// Transport-level failure (DNS, TLS, timeout).
  #[error("network error: {0}")]
  Network(#[from] reqwest::Error),

  /// The model answered with something that is not the expected JSON shape.
  #[error("unexpected response shape: {0}")]
  Parse(String),
}

/// Evaluating an answer without a current item. A programming-invariant
/// violation: the controller guards against it.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EvaluateError {
  #[error("no question at index {index} (session has {len} items)")]
  OutOfRange { index: usize, len: usize },
}

/// Rejected controller operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuizError {
  #[error("cannot answer while in {mode:?} mode")]
  NotAnswerable { mode: Mode },

  #[error("cannot {action} while in {mode:?} mode")]
  InvalidTransition { mode: Mode, action: &'static str },

  #[error("difficulty is locked while a session is running")]
  DifficultyLocked,

  #[error(transparent)]
  Evaluate(#[from] EvaluateError),
}

/// PCM decode failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AudioError {
  #[error("channel count must be at least 1")]
  NoChannels,

  #[error("audio payload is empty")]
  Empty,
}
