//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::controller::{Feedback, QuizController};
use crate::domain::{AnswerRecord, DifficultyLevel, Mode, RuleCategory, Sound, WordItem};
use crate::logic::SpeechClip;
use crate::session::SessionState;
use crate::share::{coaching_note, ShareSummary};
use crate::word_source::BatchOrigin;

fn default_true() -> bool {
    true
}

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    Snapshot,
    SetDifficulty {
        level: DifficultyLevel,
    },
    StartSession {
        #[serde(rename = "useGenerated", default)]
        use_generated: bool,
        #[serde(default)]
        difficulty: Option<DifficultyLevel>,
    },
    NewBatch {
        #[serde(rename = "useGenerated", default = "default_true")]
        use_generated: bool,
    },
    /// `choice` accepts "t", "d", "id", IPA forms, or the shortcut key "i".
    Answer {
        choice: String,
    },
    ReturnHome,
    ViewRules,
    GenerateExamples,
    Speak {
        text: String,
    },
    SpeechEnded,
    Share,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    State {
        view: SessionView,
    },
    Feedback {
        feedback: FeedbackOut,
    },
    Speech {
        speech: SpeechOut,
    },
    SpeechIdle,
    Share {
        share: ShareSummary,
    },
    Error {
        message: String,
    },
}

/// Everything the client needs to render the current screen.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub mode: Mode,
    pub difficulty: DifficultyLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<QuestionOut>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<ResultsOut>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<RuleCategory>>,
    pub generating_examples: bool,
    pub speaking: bool,
    pub seen_words: usize,
}

/// The word on screen. The expected sound is withheld until feedback.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOut {
    pub word: String,
    pub index: usize,
    pub total: usize,
    pub awaiting_advance: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsOut {
    pub score: usize,
    pub total: usize,
    pub percentage: u32,
    pub note: String,
    pub history: Vec<AnswerRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackOut {
    pub word: String,
    pub chosen: Sound,
    pub expected: Sound,
    /// Display form of `expected`, e.g. "/ɪd/".
    pub expected_ipa: &'static str,
    pub correct: bool,
    pub rule: String,
    pub example_sentence: String,
    pub advance_in_ms: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechOut {
    pub text: String,
    pub audio_base64: String,
    pub sample_rate: u32,
    pub channels: usize,
    pub frames: usize,
    pub duration_ms: u64,
}

/// Build the client view of a controller.
pub fn view_of(c: &QuizController, speaking: bool) -> SessionView {
    let s = c.session();
    let question = match c.mode() {
        Mode::InQuiz => s.current_word().map(|w| QuestionOut {
            word: w.word.clone(),
            index: s.current_index,
            total: s.total_questions,
            awaiting_advance: c.parked_question().is_some(),
        }),
        _ => None,
    };
    let results = match c.mode() {
        Mode::Results => Some(results_of(s)),
        _ => None,
    };
    let rules = match c.mode() {
        Mode::Learning => Some(c.rules().to_vec()),
        _ => None,
    };

    SessionView {
        mode: c.mode(),
        difficulty: c.difficulty(),
        question,
        results,
        rules,
        generating_examples: c.is_generating_examples(),
        speaking,
        seen_words: c.ledger().len(),
    }
}

pub fn results_of(s: &SessionState) -> ResultsOut {
    let percentage = s.percentage();
    ResultsOut {
        score: s.score,
        total: s.total_questions,
        percentage,
        note: coaching_note(percentage).to_string(),
        history: s.history.clone(),
    }
}

pub fn feedback_out(f: &Feedback, advance_in_ms: u64) -> FeedbackOut {
    FeedbackOut {
        word: f.word.clone(),
        chosen: f.chosen,
        expected: f.expected,
        expected_ipa: f.expected.ipa(),
        correct: f.correct,
        rule: f.rule.clone(),
        example_sentence: f.example_sentence.clone(),
        advance_in_ms,
    }
}

pub fn speech_out(clip: &SpeechClip) -> SpeechOut {
    SpeechOut {
        text: clip.text.clone(),
        audio_base64: base64::engine::general_purpose::STANDARD.encode(&clip.pcm),
        sample_rate: clip.buffer.sample_rate,
        channels: clip.buffer.channel_count(),
        frames: clip.buffer.frames(),
        duration_ms: clip.buffer.duration().as_millis() as u64,
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct WordsQuery {
    pub difficulty: Option<String>,
    /// Comma-separated words to avoid.
    pub exclude: Option<String>,
    pub generated: Option<bool>,
}
#[derive(Serialize)]
pub struct WordsOut {
    pub difficulty: DifficultyLevel,
    pub origin: BatchOrigin,
    pub words: Vec<WordItem>,
}

#[derive(Serialize)]
pub struct RulesOut {
    pub origin: String,
    pub rules: Vec<RuleCategory>,
}

#[derive(Deserialize)]
pub struct SpeechIn {
    pub text: String,
}
#[derive(Serialize)]
pub struct SpeechResponse {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech: Option<SpeechOut>,
}

#[derive(Deserialize)]
pub struct EvaluateIn {
    pub state: SessionState,
    pub choice: String,
}
#[derive(Serialize)]
pub struct EvaluateOut {
    pub correct: bool,
    pub finished: bool,
    pub state: SessionState,
}

#[derive(Deserialize)]
pub struct ShareIn {
    pub state: SessionState,
    #[serde(default)]
    pub difficulty: DifficultyLevel,
}

#[derive(Serialize)]
pub struct LevelsOut {
    pub levels: Vec<DifficultyLevel>,
    pub default: DifficultyLevel,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub error: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub generation: bool,
}
