//! Domain models used by the backend: sounds, difficulty levels, quiz words,
//! answer records, rule categories and screen modes.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize};

/// The three pronunciations of the past-tense "-ed" suffix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sound {
  /// /t/ after voiceless consonants (walked, stopped).
  T,
  /// /d/ after voiced sounds and vowels (played, cleaned).
  D,
  /// /ɪd/ after /t/ and /d/ (wanted, needed).
  Id,
}

impl Sound {
  pub const ALL: [Sound; 3] = [Sound::T, Sound::D, Sound::Id];

  /// Wire form: "t", "d", "id".
  pub fn as_str(self) -> &'static str {
    match self {
      Sound::T => "t",
      Sound::D => "d",
      Sound::Id => "id",
    }
  }

  /// IPA form shown on answer buttons.
  pub fn ipa(self) -> &'static str {
    match self {
      Sound::T => "/t/",
      Sound::D => "/d/",
      Sound::Id => "/ɪd/",
    }
  }

  /// Lenient parser for user and model input.
  ///
  /// Accepts the wire form, slash-wrapped IPA ("/ɪd/"), and the keyboard
  /// shortcut letter "i" for /ɪd/.
  pub fn from_input(input: &str) -> Option<Sound> {
    let s = input.trim().trim_matches('/').trim().to_lowercase();
    match s.as_str() {
      "t" => Some(Sound::T),
      "d" => Some(Sound::D),
      "id" | "ɪd" | "i" => Some(Sound::Id),
      _ => None,
    }
  }
}

impl fmt::Display for Sound {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// CEFR proficiency scale used as the difficulty selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum DifficultyLevel {
  A1,
  A2,
  B1,
  B2,
  C1,
  C2,
}

impl Default for DifficultyLevel {
  fn default() -> Self { DifficultyLevel::B1 }
}

impl DifficultyLevel {
  pub const ALL: [DifficultyLevel; 6] = [
    DifficultyLevel::A1,
    DifficultyLevel::A2,
    DifficultyLevel::B1,
    DifficultyLevel::B2,
    DifficultyLevel::C1,
    DifficultyLevel::C2,
  ];

  pub fn label(self) -> &'static str {
    match self {
      DifficultyLevel::A1 => "A1",
      DifficultyLevel::A2 => "A2",
      DifficultyLevel::B1 => "B1",
      DifficultyLevel::B2 => "B2",
      DifficultyLevel::C1 => "C1",
      DifficultyLevel::C2 => "C2",
    }
  }

  /// Slider position, 0 (A1) to 5 (C2).
  pub fn from_index(index: usize) -> Option<DifficultyLevel> {
    Self::ALL.get(index).copied()
  }
}

impl fmt::Display for DifficultyLevel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

impl FromStr for DifficultyLevel {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let wanted = s.trim().to_ascii_uppercase();
    if let Ok(position) = wanted.parse::<usize>() {
      return Self::from_index(position).ok_or_else(|| format!("difficulty position {} out of range", position));
    }
    Self::ALL
      .iter()
      .copied()
      .find(|l| l.label() == wanted)
      .ok_or_else(|| format!("unknown difficulty level '{}'", s))
  }
}

/// Accepts a label in any case ("b1") or a slider position, as string or number.
impl<'de> Deserialize<'de> for DifficultyLevel {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
      Label(String),
      Position(u64),
    }

    match Raw::deserialize(deserializer)? {
      Raw::Label(label) => label.parse().map_err(de::Error::custom),
      Raw::Position(position) => usize::try_from(position)
        .ok()
        .and_then(Self::from_index)
        .ok_or_else(|| de::Error::custom(format!("difficulty position {} out of range", position))),
    }
  }
}

/// One quiz item. Immutable once fetched; identity is `word` within a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordItem {
  pub word: String,
  #[serde(rename = "sound", alias = "expectedSound")]
  pub expected_sound: Sound,
  pub rule: String,
  pub example_sentence: String,
}

impl WordItem {
  pub fn new(word: &str, expected_sound: Sound, rule: &str, example_sentence: &str) -> Self {
    Self {
      word: word.into(),
      expected_sound,
      rule: rule.into(),
      example_sentence: example_sentence.into(),
    }
  }
}

/// One answered question. Appended once, never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
  pub word: String,
  pub user_choice: Sound,
  pub is_correct: bool,
}

/// A card on the rules screen.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCategory {
  pub category: String,
  pub description: String,
  #[serde(default)]
  pub examples: Vec<String>,
}

/// Which screen the client is on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
  #[default]
  Idle,
  Loading,
  InQuiz,
  Results,
  Learning,
}
