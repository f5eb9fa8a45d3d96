//! Application state shared by every handler: the word source, the optional
//! generation collaborator, default rules and quiz settings.
//!
//! Nothing here is per-user. Quiz progress lives in a `QuizController` owned by
//! each WebSocket connection (see `routes::ws`) and dies with it.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::collaborator::GenerationCollaborator;
use crate::config::{load_agent_config_from_env, AgentConfig, QuizSettings, WordCfg};
use crate::controller::QuizController;
use crate::domain::{RuleCategory, Sound, WordItem};
use crate::openai::OpenAI;
use crate::seeds::{bundled_words, default_rules};
use crate::word_source::WordSource;

#[derive(Clone)]
pub struct AppState {
    pub words: WordSource,
    pub collaborator: Option<Arc<dyn GenerationCollaborator>>,
    pub default_rules: Vec<RuleCategory>,
    pub settings: QuizSettings,
}

impl AppState {
    /// Build state from env: load config, pick the word bank, init OpenAI.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_agent_config_from_env().unwrap_or_default();

        let openai = OpenAI::from_env(cfg.prompts.clone());
        let collaborator: Option<Arc<dyn GenerationCollaborator>> = match openai {
            Some(oa) => {
                info!(target: "edmaster_backend", base_url = %oa.base_url, fast_model = %oa.fast_model, strong_model = %oa.strong_model, tts_model = %oa.tts_model, "OpenAI enabled.");
                Some(Arc::new(oa))
            }
            None => {
                info!(target: "edmaster_backend", "OpenAI disabled (no OPENAI_API_KEY). Using the static word bank only.");
                None
            }
        };

        Self::from_parts(cfg, collaborator)
    }

    pub fn from_parts(cfg: AgentConfig, collaborator: Option<Arc<dyn GenerationCollaborator>>) -> Self {
        let words = WordSource::new(word_bank(&cfg.words), &cfg.quiz, collaborator.clone());
        for sound in Sound::ALL {
            let count = words.bank().iter().filter(|w| w.expected_sound == sound).count();
            info!(target: "quiz", %sound, count, "Startup word bank inventory");
        }

        Self {
            words,
            collaborator,
            default_rules: default_rules(),
            settings: cfg.quiz,
        }
    }

    /// A fresh controller for one client connection.
    pub fn new_controller(&self) -> QuizController {
        QuizController::new(self.default_rules.clone(), self.settings.rule_count)
    }
}

/// Configured words if any are valid, otherwise the bundled list.
fn word_bank(configured: &[WordCfg]) -> Vec<WordItem> {
    let mut bank = Vec::new();
    for cfg in configured {
        match cfg.to_item() {
            Some(item) => bank.push(item),
            None => warn!(target: "quiz", word = %cfg.word, sound = %cfg.sound, "Skipping bank word: empty word or unknown sound."),
        }
    }
    if bank.is_empty() {
        bundled_words()
    } else {
        bank
    }
}
