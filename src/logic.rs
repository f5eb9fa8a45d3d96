//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Resolving word batches (generated with static fallback, or static)
//!   - Fetching rule examples with the exactly-three check
//!   - Synthesizing and decoding speech clips
//!   - Stateless answer evaluation
//!
//! Every function here degrades silently: failures are logged and turned into
//! fallbacks, never surfaced as errors to the client.

use tracing::{debug, error, info, instrument, warn};

use crate::audio::{decode_pcm16, AudioBuffer};
use crate::domain::{DifficultyLevel, Mode, RuleCategory, Sound};
use crate::error::EvaluateError;
use crate::session::{evaluate, SessionState};
use crate::state::AppState;
use crate::util::trunc_for_log;
use crate::word_source::{Batch, BatchRequest};

/// A decoded clip ready to hand to the client.
#[derive(Clone, Debug)]
pub struct SpeechClip {
  pub text: String,
  pub pcm: Vec<u8>,
  pub buffer: AudioBuffer,
}

#[instrument(level = "info", skip(state, excluded), fields(%difficulty, excluded = excluded.len()))]
pub async fn word_batch(
  state: &AppState,
  difficulty: DifficultyLevel,
  excluded: Vec<String>,
  use_generated: bool,
) -> Batch {
  let request = BatchRequest { token: 0, use_generated, difficulty, excluded };
  let batch = state.words.fetch(&request).await;
  info!(target: "quiz", origin = batch.origin.as_str(), count = batch.items.len(), "Word batch served");
  batch
}

/// Fresh rule cards when the collaborator supplies exactly the expected
/// number, otherwise the defaults. The second value names the origin.
#[instrument(level = "info", skip(state))]
pub async fn rule_examples(state: &AppState) -> (Vec<RuleCategory>, &'static str) {
  if let Some(collab) = &state.collaborator {
    match collab.generate_rule_examples().await {
      Ok(rules) if rules.len() == state.settings.rule_count => return (rules, "generated"),
      Ok(rules) => {
        warn!(target: "quiz", got = rules.len(), expected = state.settings.rule_count, "Rule examples had unexpected length; serving defaults");
      }
      Err(e) => error!(target: "quiz", error = %e, "Rule example generation failed; serving defaults"),
    }
  }
  (state.default_rules.clone(), "default")
}

/// Synthesize and decode `text`. None when speech is unavailable or fails.
#[instrument(level = "info", skip(state, text), fields(text = %trunc_for_log(text, 40)))]
pub async fn speech_clip(state: &AppState, text: &str) -> Option<SpeechClip> {
  let Some(collab) = &state.collaborator else {
    debug!(target: "edmaster_backend", "Speech requested without a collaborator; staying silent");
    return None;
  };

  let pcm = match collab.synthesize_speech(text).await {
    Ok(Some(pcm)) => pcm,
    Ok(None) => {
      warn!(target: "edmaster_backend", "Speech backend returned no audio");
      return None;
    }
    Err(e) => {
      error!(target: "edmaster_backend", error = %e, "Speech synthesis failed");
      return None;
    }
  };

  match decode_pcm16(&pcm, state.settings.channels, state.settings.sample_rate) {
    Ok(buffer) => {
      debug!(target: "edmaster_backend", frames = buffer.frames(), duration = ?buffer.duration(), "Speech decoded");
      Some(SpeechClip { text: text.to_string(), pcm, buffer })
    }
    Err(e) => {
      error!(target: "edmaster_backend", error = %e, bytes = pcm.len(), "Speech payload could not be decoded");
      None
    }
  }
}

/// Evaluate without server-side state: the client sends its state, gets the next one.
/// Moves a finished quiz to Results. A state already at or past `totalQuestions`
/// is rejected even when `items` holds more words.
pub fn evaluate_stateless(state: &SessionState, choice: Sound) -> Result<(SessionState, bool), EvaluateError> {
  if state.is_finished() || state.current_index >= state.total_questions {
    return Err(EvaluateError::OutOfRange { index: state.current_index, len: state.total_questions });
  }
  let mut next = evaluate(state, choice)?;
  let correct = next.history.last().map(|h| h.is_correct).unwrap_or(false);
  if next.is_finished() {
    next.mode = Mode::Results;
  }
  Ok((next, correct))
}
