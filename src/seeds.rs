//! Seed data: the bundled word list and the default rules screen content.

use crate::domain::{RuleCategory, Sound, WordItem};

/// Built-in practice words that keep the app useful without external config or OpenAI.
pub fn bundled_words() -> Vec<WordItem> {
  vec![
    WordItem::new("walked", Sound::T, "Ends with voiceless /k/", "He walked to the park."),
    WordItem::new("played", Sound::D, "Ends with voiced vowel /eɪ/", "They played soccer all afternoon."),
    WordItem::new("wanted", Sound::Id, "Ends with /t/", "She wanted a new bicycle."),
    WordItem::new("needed", Sound::Id, "Ends with /d/", "We needed some milk."),
    WordItem::new("laughed", Sound::T, "Ends with voiceless /f/", "He laughed at the joke."),
    WordItem::new("cleaned", Sound::D, "Ends with voiced /n/", "She cleaned her room."),
    WordItem::new("fixed", Sound::T, "Ends with voiceless /ks/", "The mechanic fixed the car."),
    WordItem::new("climbed", Sound::D, "Ends with voiced /m/", "They climbed the mountain."),
    WordItem::new("stopped", Sound::T, "Ends with voiceless /p/", "The bus stopped at the corner."),
    WordItem::new("added", Sound::Id, "Ends with /d/", "She added sugar to her tea."),
  ]
}

/// The three rule cards shown until (and unless) fresh examples are generated.
pub fn default_rules() -> Vec<RuleCategory> {
  fn card(category: &str, description: &str, examples: &[&str]) -> RuleCategory {
    RuleCategory {
      category: category.into(),
      description: description.into(),
      examples: examples.iter().map(|s| s.to_string()).collect(),
    }
  }

  vec![
    card(
      "/t/ Sound",
      "Used after voiceless consonant sounds: /p/, /k/, /f/, /s/, /ʃ/ (sh), /tʃ/ (ch), /θ/ (th).",
      &["jumped", "kicked", "sniffed", "kissed", "washed", "watched"],
    ),
    card(
      "/d/ Sound",
      "Used after voiced sounds: /b/, /g/, /v/, /z/, /l/, /m/, /n/, /r/, and all vowels.",
      &["robbed", "hugged", "lived", "buzzed", "called", "named", "turned", "shared"],
    ),
    card(
      "/ɪd/ Sound",
      "Used only after the consonant sounds /t/ or /d/.",
      &["painted", "shouted", "started", "decided", "ended", "folded"],
    ),
  ]
}
