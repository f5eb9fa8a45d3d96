//! Quiz session controller: owns the session state, the seen-words ledger, the
//! chosen difficulty and the rules content, and drives mode transitions.
//!
//! ```text
//! Idle -[start]-> Loading -[batch ready]-> InQuiz -[all answered]-> Results
//! InQuiz | Loading | Results | Learning -[home]-> Idle
//! Results -[new batch]-> Loading
//! Idle -[view rules]-> Learning
//! ```
//!
//! Async work (word batches, rule examples) is split into `begin_*` /
//! `complete_*` halves. Each `begin_*` mints a token and each `complete_*`
//! applies its result only if that token is still the one being waited on, so
//! a late response can never clobber a newer session.

use tracing::{debug, info, instrument, warn};

use crate::domain::{DifficultyLevel, Mode, RuleCategory, Sound};
use crate::error::QuizError;
use crate::ledger::SeenWordsLedger;
use crate::session::{evaluate, SessionState};
use crate::share::{self, ShareSummary};
use crate::word_source::{Batch, BatchRequest};

/// Identity of one question: the session token plus the item index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuestionKey {
    pub token: u64,
    pub index: usize,
}

/// What the client shows between picking an answer and moving on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Feedback {
    pub question: QuestionKey,
    pub word: String,
    pub chosen: Sound,
    pub expected: Sound,
    pub correct: bool,
    pub rule: String,
    pub example_sentence: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RulesRequest {
    pub token: u64,
}

#[derive(Debug)]
pub struct QuizController {
    session: SessionState,
    ledger: SeenWordsLedger,
    difficulty: DifficultyLevel,
    rules: Vec<RuleCategory>,
    rule_count: usize,
    generation: u64,
    awaiting_batch: Option<u64>,
    parked: Option<(QuestionKey, Sound)>,
    rules_generation: u64,
    awaiting_rules: Option<u64>,
}

impl QuizController {
    pub fn new(rules: Vec<RuleCategory>, rule_count: usize) -> Self {
        Self {
            session: SessionState::default(),
            ledger: SeenWordsLedger::new(),
            difficulty: DifficultyLevel::default(),
            rules,
            rule_count,
            generation: 0,
            awaiting_batch: None,
            parked: None,
            rules_generation: 0,
            awaiting_rules: None,
        }
    }

    pub fn mode(&self) -> Mode {
        self.session.mode
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn ledger(&self) -> &SeenWordsLedger {
        &self.ledger
    }

    pub fn difficulty(&self) -> DifficultyLevel {
        self.difficulty
    }

    pub fn rules(&self) -> &[RuleCategory] {
        &self.rules
    }

    pub fn is_generating_examples(&self) -> bool {
        self.awaiting_rules.is_some()
    }

    /// Feedback currently on screen, if any.
    pub fn parked_question(&self) -> Option<QuestionKey> {
        self.parked.map(|(key, _)| key)
    }

    /// Change difficulty between sessions.
    pub fn set_difficulty(&mut self, level: DifficultyLevel) -> Result<(), QuizError> {
        if matches!(self.mode(), Mode::Loading | Mode::InQuiz) {
            return Err(QuizError::DifficultyLocked);
        }
        self.difficulty = level;
        Ok(())
    }

    /// Enter Loading and describe the batch to fetch. Supersedes any earlier request.
    #[instrument(level = "info", skip(self), fields(%difficulty))]
    pub fn begin_session(&mut self, use_generated: bool, difficulty: DifficultyLevel) -> BatchRequest {
        self.generation += 1;
        self.difficulty = difficulty;
        self.parked = None;
        self.awaiting_batch = Some(self.generation);
        self.session.mode = Mode::Loading;
        info!(target: "quiz", token = self.generation, use_generated, seen = self.ledger.len(), "Session loading");
        BatchRequest {
            token: self.generation,
            use_generated,
            difficulty,
            excluded: self.ledger.words().to_vec(),
        }
    }

    /// Same difficulty, fresh words.
    pub fn begin_new_batch(&mut self, use_generated: bool) -> BatchRequest {
        self.begin_session(use_generated, self.difficulty)
    }

    /// Apply a fetched batch. Returns false if the batch is stale (superseded
    /// or the user left the loading screen) and was dropped.
    #[instrument(level = "info", skip(self, batch), fields(origin = batch.origin.as_str(), count = batch.items.len()))]
    pub fn complete_session(&mut self, token: u64, batch: Batch) -> bool {
        if self.awaiting_batch != Some(token) || self.mode() != Mode::Loading {
            debug!(target: "quiz", token, current = self.generation, mode = ?self.mode(), "Dropping stale word batch");
            return false;
        }
        self.awaiting_batch = None;

        if batch.items.is_empty() {
            warn!(target: "quiz", token, "Word batch empty even after fallback; returning to idle");
            self.session.mode = Mode::Idle;
            return false;
        }

        let added = self.ledger.record(batch.items.iter().map(|w| w.word.as_str()));
        self.session = SessionState::new(batch.items);
        info!(
            target: "quiz",
            token,
            total = self.session.total_questions,
            new_words = added,
            seen = self.ledger.len(),
            origin = batch.origin.as_str(),
            "Session started"
        );
        true
    }

    /// Score `choice` against the current word immediately.
    #[instrument(level = "debug", skip(self), fields(choice = %choice))]
    pub fn submit_answer(&mut self, choice: Sound) -> Result<&SessionState, QuizError> {
        if self.mode() != Mode::InQuiz || self.session.is_finished() {
            return Err(QuizError::NotAnswerable { mode: self.mode() });
        }
        let next = evaluate(&self.session, choice)?;
        if let Some(last) = next.history.last() {
            debug!(target: "quiz", word = %last.word, correct = last.is_correct, index = next.current_index, "Answer recorded");
        }
        self.session = next;
        self.parked = None;
        self.transition_if_finished();
        Ok(&self.session)
    }

    /// Move to Results once every item is answered. True only on the transition itself.
    pub fn transition_if_finished(&mut self) -> bool {
        if self.mode() == Mode::InQuiz && self.session.is_finished() {
            self.session.mode = Mode::Results;
            info!(
                target: "quiz",
                token = self.generation,
                score = self.session.score,
                total = self.session.total_questions,
                percentage = self.session.percentage(),
                "Session finished"
            );
            true
        } else {
            false
        }
    }

    /// Show feedback for `choice` and park it until `advance`. Choices made
    /// while feedback is already showing are ignored (`Ok(None)`).
    pub fn select_answer(&mut self, choice: Sound) -> Result<Option<Feedback>, QuizError> {
        if self.mode() != Mode::InQuiz {
            return Err(QuizError::NotAnswerable { mode: self.mode() });
        }
        if self.parked.is_some() {
            return Ok(None);
        }
        let word = self
            .session
            .current_word()
            .ok_or(QuizError::NotAnswerable { mode: self.mode() })?;

        let question = QuestionKey { token: self.generation, index: self.session.current_index };
        let feedback = Feedback {
            question,
            word: word.word.clone(),
            chosen: choice,
            expected: word.expected_sound,
            correct: choice == word.expected_sound,
            rule: word.rule.clone(),
            example_sentence: word.example_sentence.clone(),
        };
        self.parked = Some((question, choice));
        Ok(Some(feedback))
    }

    /// Commit the parked answer for `question`. Returns false (and does
    /// nothing) if that question is no longer on screen.
    pub fn advance(&mut self, question: QuestionKey) -> Result<bool, QuizError> {
        match self.parked {
            Some((key, choice)) if key == question && self.mode() == Mode::InQuiz => {
                self.submit_answer(choice)?;
                Ok(true)
            }
            _ => {
                debug!(target: "quiz", ?question, "Ignoring stale advance");
                Ok(false)
            }
        }
    }

    /// Back to Idle from anywhere. Outstanding batches become stale; the
    /// ledger and the last history are kept.
    pub fn return_home(&mut self) {
        if self.mode() != Mode::Idle {
            info!(target: "quiz", from = ?self.mode(), "Returning home");
        }
        self.awaiting_batch = None;
        self.parked = None;
        self.session.mode = Mode::Idle;
    }

    pub fn view_rules(&mut self) -> Result<(), QuizError> {
        if self.mode() != Mode::Idle {
            return Err(QuizError::InvalidTransition { mode: self.mode(), action: "view rules" });
        }
        self.session.mode = Mode::Learning;
        Ok(())
    }

    /// Start a rule-example refresh. None while one is already outstanding.
    pub fn begin_rule_examples(&mut self) -> Option<RulesRequest> {
        if self.awaiting_rules.is_some() {
            return None;
        }
        self.rules_generation += 1;
        self.awaiting_rules = Some(self.rules_generation);
        Some(RulesRequest { token: self.rules_generation })
    }

    /// Apply fresh rule cards if exactly the expected number arrived; otherwise keep prior content.
    pub fn complete_rule_examples(&mut self, token: u64, rules: Vec<RuleCategory>) -> bool {
        if self.awaiting_rules != Some(token) {
            return false;
        }
        self.awaiting_rules = None;
        if rules.len() != self.rule_count {
            warn!(target: "quiz", got = rules.len(), expected = self.rule_count, "Discarding rule examples with unexpected length");
            return false;
        }
        self.rules = rules;
        info!(target: "quiz", "Rule examples refreshed");
        true
    }

    pub fn share(&self) -> ShareSummary {
        share::compose(&self.session, self.difficulty)
    }
}
