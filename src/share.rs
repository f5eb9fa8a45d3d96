//! Results export: a plain-text practice summary handed to a mail-compose target.

use serde::Serialize;

use crate::domain::DifficultyLevel;
use crate::session::SessionState;

const APP_NAME: &str = "ED-Master Pro";
const SUBJECT: &str = "My English Pronunciation Practice";
const GMAIL_COMPOSE: &str = "https://mail.google.com/mail/";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ShareSummary {
  pub subject: String,
  pub body: String,
  pub url: String,
}

/// Compose the summary of a finished (or abandoned) session.
pub fn compose(state: &SessionState, level: DifficultyLevel) -> ShareSummary {
  let score_text = format!(
    "I scored {}/{} on {} (Level {})!",
    state.score, state.total_questions, APP_NAME, level
  );
  let word_list = state
    .history
    .iter()
    .map(|h| {
      format!(
        "{} {:<15} - Predicted: /{}/",
        if h.is_correct { '✓' } else { '✗' },
        h.word,
        h.user_choice
      )
    })
    .collect::<Vec<_>>()
    .join("\n");

  let body = format!(
    "Hi,\n\nI just finished a pronunciation practice session for English -ed endings.\n\nSummary: {}\n\nWord List:\n{}\n\nKeep practicing!\nSent from {}",
    score_text, word_list, APP_NAME
  );
  let url = gmail_compose_url(SUBJECT, &body);
  ShareSummary { subject: SUBJECT.into(), body, url }
}

fn gmail_compose_url(subject: &str, body: &str) -> String {
  reqwest::Url::parse_with_params(
    GMAIL_COMPOSE,
    &[("view", "cm"), ("fs", "1"), ("su", subject), ("body", body)],
  )
  .map(String::from)
  .unwrap_or_else(|_| GMAIL_COMPOSE.to_string())
}

/// Short coaching note shown next to the results.
pub fn coaching_note(percentage: u32) -> &'static str {
  if percentage >= 90 {
    "Excellent job! You are mastering this level."
  } else if percentage >= 70 {
    "Good work. Try focusing on the voiced vs voiceless distinction."
  } else {
    "Keep practicing! Focus on the /id/ sound, it only happens after 't' and 'd'."
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::Sound;
  use crate::seeds::bundled_words;
  use crate::session::evaluate;

  #[test]
  fn body_lists_every_answer() {
    let mut state = SessionState::new(bundled_words()[..2].to_vec());
    state = evaluate(&state, Sound::T).unwrap(); // walked: correct
    state = evaluate(&state, Sound::Id).unwrap(); // played: wrong

    let summary = compose(&state, DifficultyLevel::B2);
    assert_eq!(summary.subject, "My English Pronunciation Practice");
    assert!(summary.body.contains("I scored 1/2 on ED-Master Pro (Level B2)!"));
    assert!(summary.body.contains("✓ walked          - Predicted: /t/"));
    assert!(summary.body.contains("✗ played          - Predicted: /id/"));
    assert!(summary.url.starts_with("https://mail.google.com/mail/?view=cm&fs=1&su="));
    assert!(!summary.url.contains(' '));
  }

  #[test]
  fn coaching_note_thresholds() {
    assert!(coaching_note(100).starts_with("Excellent"));
    assert!(coaching_note(90).starts_with("Excellent"));
    assert!(coaching_note(70).starts_with("Good"));
    assert!(coaching_note(69).starts_with("Keep"));
  }
}
