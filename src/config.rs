//! Loading agent configuration (prompts, quiz settings, optional word bank) from TOML.
//!
//! See `AgentConfig`, `Prompts` and `QuizSettings` for the expected schema.

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::domain::{Sound, WordItem};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub quiz: QuizSettings,
  #[serde(default)]
  pub words: Vec<WordCfg>,
}

/// Word bank entry accepted in TOML configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct WordCfg {
  pub word: String,
  pub sound: String,
  #[serde(default)] pub rule: String,
  #[serde(default, alias = "exampleSentence")] pub example_sentence: String,
}

impl WordCfg {
  /// Convert to a quiz item; None if the sound is not one of t / d / id.
  pub fn to_item(&self) -> Option<WordItem> {
    let word = self.word.trim();
    if word.is_empty() {
      return None;
    }
    let sound = Sound::from_input(&self.sound)?;
    Some(WordItem::new(word, sound, &self.rule, &self.example_sentence))
  }
}

/// Knobs for the quiz flow. Defaults match the classic app.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct QuizSettings {
  /// Maximum number of words per static batch.
  pub batch_size: usize,
  /// Below this many unseen words, the static source reuses the full bank.
  pub min_viable_pool: usize,
  /// How long per-answer feedback stays up before the quiz advances.
  pub feedback_delay_ms: u64,
  /// Sample rate of synthesized speech (PCM16).
  pub sample_rate: u32,
  /// Interleaved channels in synthesized speech.
  pub channels: u16,
  /// Number of cards the rules screen expects.
  pub rule_count: usize,
}

impl Default for QuizSettings {
  fn default() -> Self {
    Self {
      batch_size: 10,
      min_viable_pool: 5,
      feedback_delay_ms: 2500,
      sample_rate: 24_000,
      channels: 1,
      rule_count: 3,
    }
  }
}

impl QuizSettings {
  pub fn feedback_delay(&self) -> Duration {
    Duration::from_millis(self.feedback_delay_ms)
  }
}

/// Prompts used by the OpenAI client. Override in TOML to tune tone/structure.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub words_system: String,
  pub words_user_template: String,
  pub exclusion_template: String,
  pub rules_system: String,
  pub rules_user_template: String,
  pub speech_instructions: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      words_system: "You are an English pronunciation content generator. Respond ONLY with strict JSON.".into(),
      words_user_template: "Generate {count} English regular verbs in past tense (ending in -ed) suitable for CEFR level {difficulty}. Include a mix of the three pronunciation sounds: /t/, /d/, and /id/.{exclusion} Return JSON {\"words\": [{\"word\": string, \"sound\": \"t\" | \"d\" | \"id\", \"rule\": string, \"exampleSentence\": string}]}. 'rule' names the final sound of the base verb and whether it is voiced.".into(),
      exclusion_template: " DO NOT use any of these words: {words}.".into(),
      rules_system: "You are an English pronunciation teacher. Respond ONLY with strict JSON.".into(),
      rules_user_template: "Generate a set of English regular verb examples for the three -ed pronunciation sounds. Return exactly 3 categories: '/t/ Sound', '/d/ Sound', and '/ɪd/ Sound'. For each category, provide a short description of when it's used and exactly 8 example words ending in -ed. Return JSON {\"rules\": [{\"category\": string, \"description\": string, \"examples\": [string]}]}.".into(),
      speech_instructions: "Pronounce the word clearly and slowly, like a pronunciation coach.".into(),
    }
  }
}

/// Attempt to load `AgentConfig` from AGENT_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("AGENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_agent_config(&s) {
      Ok(cfg) => {
        info!(target: "edmaster_backend", %path, words = cfg.words.len(), "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "edmaster_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "edmaster_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

pub fn parse_agent_config(s: &str) -> Result<AgentConfig, toml::de::Error> {
  let mut cfg = toml::from_str::<AgentConfig>(s)?;
  if cfg.quiz.channels == 0 {
    warn!(target: "edmaster_backend", "quiz.channels = 0 is invalid; using mono");
    cfg.quiz.channels = 1;
  }
  if cfg.quiz.batch_size == 0 {
    warn!(target: "edmaster_backend", "quiz.batch_size = 0 is invalid; using default");
    cfg.quiz.batch_size = QuizSettings::default().batch_size;
  }
  Ok(cfg)
}
