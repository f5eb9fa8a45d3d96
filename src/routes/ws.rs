//! WebSocket upgrade + per-connection quiz driver.
//!
//! Each connection owns one `QuizController`, so quiz state lives exactly as
//! long as the socket. The loop `select!`s between client frames and an
//! internal event channel fed by spawned tasks (word batches, rule examples,
//! speech) and timers (feedback auto-advance, end of clip). Every event carries
//! the token it was started with; the controller and the speech player drop
//! events whose token is no longer current.

use std::sync::Arc;
use std::time::Duration;

use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::audio::{ClipTicket, SpeechPlayer};
use crate::controller::{QuestionKey, QuizController};
use crate::domain::{RuleCategory, Sound};
use crate::logic::{speech_clip, SpeechClip};
use crate::protocol::{feedback_out, speech_out, view_of, ClientWsMessage, ServerWsMessage};
use crate::state::AppState;
use crate::word_source::{Batch, BatchRequest};

/// Results of background work, posted back to the connection loop.
#[derive(Debug)]
pub enum Event {
  BatchReady { token: u64, batch: Batch },
  RulesReady { token: u64, rules: Vec<RuleCategory> },
  Advance(QuestionKey),
  SpeechReady { ticket: ClipTicket, clip: Option<SpeechClip> },
  SpeechDone(ClipTicket),
}

pub struct Connection {
  id: Uuid,
  state: Arc<AppState>,
  quiz: QuizController,
  player: SpeechPlayer,
  events: mpsc::UnboundedSender<Event>,
  advance_timer: Option<JoinHandle<()>>,
  speech_timer: Option<JoinHandle<()>>,
}

impl Connection {
  pub fn new(state: Arc<AppState>, events: mpsc::UnboundedSender<Event>) -> Self {
    let quiz = state.new_controller();
    Self {
      id: Uuid::new_v4(),
      state,
      quiz,
      player: SpeechPlayer::new(),
      events,
      advance_timer: None,
      speech_timer: None,
    }
  }

  pub fn quiz(&self) -> &QuizController {
    &self.quiz
  }

  pub fn snapshot(&self) -> ServerWsMessage {
    ServerWsMessage::State { view: view_of(&self.quiz, self.player.is_speaking()) }
  }

  #[instrument(level = "debug", skip(self), fields(conn = %self.id))]
  pub fn on_client(&mut self, msg: ClientWsMessage) -> Vec<ServerWsMessage> {
    match msg {
      ClientWsMessage::Ping => vec![ServerWsMessage::Pong],

      ClientWsMessage::Snapshot => vec![self.snapshot()],

      ClientWsMessage::SetDifficulty { level } => match self.quiz.set_difficulty(level) {
        Ok(()) => vec![self.snapshot()],
        Err(e) => vec![error_msg(e)],
      },

      ClientWsMessage::StartSession { use_generated, difficulty } => {
        let difficulty = difficulty.unwrap_or_else(|| self.quiz.difficulty());
        self.cancel_advance();
        let request = self.quiz.begin_session(use_generated, difficulty);
        self.spawn_batch(request);
        vec![self.snapshot()]
      }

      ClientWsMessage::NewBatch { use_generated } => {
        self.cancel_advance();
        let request = self.quiz.begin_new_batch(use_generated);
        self.spawn_batch(request);
        vec![self.snapshot()]
      }

      ClientWsMessage::Answer { choice } => {
        let Some(sound) = Sound::from_input(&choice) else {
          return vec![ServerWsMessage::Error { message: format!("Unknown choice '{}'", choice) }];
        };
        match self.quiz.select_answer(sound) {
          Ok(Some(feedback)) => {
            let delay = self.state.settings.feedback_delay();
            info!(target: "quiz", conn = %self.id, word = %feedback.word, correct = feedback.correct, "Answer selected");
            self.schedule_advance(feedback.question, delay);
            vec![
              ServerWsMessage::Feedback { feedback: feedback_out(&feedback, delay.as_millis() as u64) },
              self.snapshot(),
            ]
          }
          Ok(None) => Vec::new(),
          Err(e) => vec![error_msg(e)],
        }
      }

      ClientWsMessage::ReturnHome => {
        self.cancel_advance();
        self.quiz.return_home();
        vec![self.snapshot()]
      }

      ClientWsMessage::ViewRules => match self.quiz.view_rules() {
        Ok(()) => vec![self.snapshot()],
        Err(e) => vec![error_msg(e)],
      },

      ClientWsMessage::GenerateExamples => {
        let Some(request) = self.quiz.begin_rule_examples() else {
          return Vec::new();
        };
        let collab = self.state.collaborator.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
          let rules = match collab {
            Some(c) => c.generate_rule_examples().await.unwrap_or_else(|e| {
              error!(target: "quiz", error = %e, "Rule example generation failed; keeping current rules");
              Vec::new()
            }),
            None => Vec::new(),
          };
          let _ = tx.send(Event::RulesReady { token: request.token, rules });
        });
        vec![self.snapshot()]
      }

      ClientWsMessage::Speak { text } => {
        let Some(ticket) = self.player.try_begin() else {
          debug!(target: "edmaster_backend", conn = %self.id, "Speak ignored: a clip is already playing");
          return Vec::new();
        };
        let state = self.state.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
          let clip = speech_clip(&state, &text).await;
          let _ = tx.send(Event::SpeechReady { ticket, clip });
        });
        vec![self.snapshot()]
      }

      ClientWsMessage::SpeechEnded => {
        abort(&mut self.speech_timer);
        if self.player.stop() { vec![ServerWsMessage::SpeechIdle] } else { Vec::new() }
      }

      ClientWsMessage::Share => vec![ServerWsMessage::Share { share: self.quiz.share() }],
    }
  }

  #[instrument(level = "debug", skip(self, event), fields(conn = %self.id))]
  pub fn on_event(&mut self, event: Event) -> Vec<ServerWsMessage> {
    match event {
      Event::BatchReady { token, batch } => {
        let before = self.quiz.mode();
        let applied = self.quiz.complete_session(token, batch);
        if applied || self.quiz.mode() != before { vec![self.snapshot()] } else { Vec::new() }
      }

      Event::RulesReady { token, rules } => {
        let was_generating = self.quiz.is_generating_examples();
        self.quiz.complete_rule_examples(token, rules);
        if was_generating && !self.quiz.is_generating_examples() { vec![self.snapshot()] } else { Vec::new() }
      }

      Event::Advance(question) => {
        self.advance_timer = None;
        match self.quiz.advance(question) {
          Ok(true) => vec![self.snapshot()],
          Ok(false) => Vec::new(),
          Err(e) => vec![error_msg(e)],
        }
      }

      Event::SpeechReady { ticket, clip } => {
        if !self.player.is_current(ticket) {
          debug!(target: "edmaster_backend", conn = %self.id, "Dropping speech for a clip that already ended");
          return Vec::new();
        }
        match clip {
          Some(clip) => {
            let tx = self.events.clone();
            let duration = clip.buffer.duration();
            abort(&mut self.speech_timer);
            self.speech_timer = Some(tokio::spawn(async move {
              tokio::time::sleep(duration).await;
              let _ = tx.send(Event::SpeechDone(ticket));
            }));
            vec![ServerWsMessage::Speech { speech: speech_out(&clip) }]
          }
          None => {
            self.player.finish(ticket);
            vec![ServerWsMessage::SpeechIdle]
          }
        }
      }

      Event::SpeechDone(ticket) => {
        self.speech_timer = None;
        if self.player.finish(ticket) { vec![ServerWsMessage::SpeechIdle] } else { Vec::new() }
      }
    }
  }

  fn spawn_batch(&self, request: BatchRequest) {
    let state = self.state.clone();
    let tx = self.events.clone();
    tokio::spawn(async move {
      let batch = state.words.fetch(&request).await;
      let _ = tx.send(Event::BatchReady { token: request.token, batch });
    });
  }

  fn schedule_advance(&mut self, question: QuestionKey, delay: Duration) {
    abort(&mut self.advance_timer);
    let tx = self.events.clone();
    self.advance_timer = Some(tokio::spawn(async move {
      tokio::time::sleep(delay).await;
      let _ = tx.send(Event::Advance(question));
    }));
  }

  fn cancel_advance(&mut self) {
    abort(&mut self.advance_timer);
  }
}

impl Drop for Connection {
  fn drop(&mut self) {
    abort(&mut self.advance_timer);
    abort(&mut self.speech_timer);
  }
}

fn abort(timer: &mut Option<JoinHandle<()>>) {
  if let Some(handle) = timer.take() {
    handle.abort();
  }
}

fn error_msg(e: impl std::fmt::Display) -> ServerWsMessage {
  ServerWsMessage::Error { message: e.to_string() }
}

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "edmaster_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

enum Step {
  Client(Option<Result<Message, axum::Error>>),
  Internal(Event),
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  let (tx, mut rx) = mpsc::unbounded_channel();
  let mut conn = Connection::new(state, tx);
  info!(target: "edmaster_backend", conn = %conn.id, "WebSocket connected");

  let mut outgoing = vec![conn.snapshot()];
  loop {
    if let Err(e) = send_all(&mut socket, std::mem::take(&mut outgoing)).await {
      error!(target: "edmaster_backend", conn = %conn.id, error = %e, "WS send error");
      break;
    }

    let step = tokio::select! {
      incoming = socket.recv() => Step::Client(incoming),
      Some(event) = rx.recv() => Step::Internal(event),
    };

    match step {
      Step::Client(Some(Ok(msg))) => match client_frame(msg) {
        Frame::Message(incoming) => {
          debug!(target: "edmaster_backend", conn = %conn.id, "WS received: {:?}", &incoming);
          outgoing = conn.on_client(incoming);
        }
        Frame::Invalid(reply) => outgoing = vec![reply],
        Frame::Close => break,
        Frame::Ignored => {}
      },
      Step::Client(None) => break,
      Step::Client(Some(Err(e))) => {
        warn!(target: "edmaster_backend", conn = %conn.id, error = %e, "WS receive error");
        break;
      }
      Step::Internal(event) => outgoing = conn.on_event(event),
    }
  }

  let ledger = conn.quiz().ledger();
  if ledger.is_empty() {
    info!(target: "edmaster_backend", conn = %conn.id, "WebSocket disconnected before any session");
  } else {
    info!(target: "edmaster_backend", conn = %conn.id, seen = ledger.len(), "WebSocket disconnected");
  }
}

/// What one incoming frame means to the connection loop.
#[derive(Debug)]
enum Frame {
  Message(ClientWsMessage),
  Invalid(ServerWsMessage),
  Close,
  /// Binary, ping and pong frames. Pings are answered by the socket itself.
  Ignored,
}

fn client_frame(msg: Message) -> Frame {
  match msg {
    Message::Text(txt) => match serde_json::from_str::<ClientWsMessage>(&txt) {
      Ok(incoming) => Frame::Message(incoming),
      Err(e) => Frame::Invalid(ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) }),
    },
    Message::Close(_) => Frame::Close,
    _ => Frame::Ignored,
  }
}

async fn send_all(socket: &mut WebSocket, messages: Vec<ServerWsMessage>) -> Result<(), axum::Error> {
  for msg in messages {
    let out = serde_json::to_string(&msg).unwrap_or_else(|e| {
      serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
    });
    socket.send(Message::Text(out)).await?;
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::collaborator::GenerationCollaborator;
  use crate::config::AgentConfig;
  use crate::domain::Mode;
  use crate::mock::MockCollaborator;
  use crate::seeds::bundled_words;

  fn connection(mock: MockCollaborator) -> (Connection, mpsc::UnboundedReceiver<Event>) {
    connection_with(Arc::new(mock))
  }

  fn connection_with(mock: Arc<MockCollaborator>) -> (Connection, mpsc::UnboundedReceiver<Event>) {
    let collab: Arc<dyn GenerationCollaborator> = mock;
    let state = Arc::new(AppState::from_parts(AgentConfig::default(), Some(collab)));
    let (tx, rx) = mpsc::unbounded_channel();
    (Connection::new(state, tx), rx)
  }

  #[test]
  fn frames_are_classified() {
    assert!(matches!(client_frame(Message::Text(r#"{"type":"ping"}"#.into())), Frame::Message(ClientWsMessage::Ping)));
    assert!(matches!(
      client_frame(Message::Text("{not json".into())),
      Frame::Invalid(ServerWsMessage::Error { .. })
    ));
    assert!(matches!(client_frame(Message::Close(None)), Frame::Close));
    // No reply of our own: the socket already answers pings.
    assert!(matches!(client_frame(Message::Ping(vec![1, 2])), Frame::Ignored));
    assert!(matches!(client_frame(Message::Binary(vec![0])), Frame::Ignored));
  }

  fn last_mode(msgs: &[ServerWsMessage]) -> Option<Mode> {
    msgs.iter().rev().find_map(|m| match m {
      ServerWsMessage::State { view } => Some(view.mode),
      _ => None,
    })
  }

  async fn started(conn: &mut Connection, rx: &mut mpsc::UnboundedReceiver<Event>) {
    let out = conn.on_client(ClientWsMessage::StartSession { use_generated: false, difficulty: None });
    assert_eq!(last_mode(&out), Some(Mode::Loading));
    let event = rx.recv().await.unwrap();
    assert_eq!(last_mode(&conn.on_event(event)), Some(Mode::InQuiz));
  }

  #[tokio::test]
  async fn failed_generation_lands_in_quiz_with_static_words() {
    let (mut conn, mut rx) = connection(MockCollaborator::new().with_words(vec![]));
    let out = conn.on_client(ClientWsMessage::StartSession { use_generated: true, difficulty: None });
    assert_eq!(last_mode(&out), Some(Mode::Loading));

    let event = rx.recv().await.unwrap();
    let out = conn.on_event(event);
    assert_eq!(last_mode(&out), Some(Mode::InQuiz));
    assert_eq!(conn.quiz().session().items, bundled_words());
  }

  #[tokio::test]
  async fn batch_arriving_after_return_home_is_ignored() {
    let (mut conn, mut rx) = connection(MockCollaborator::new());
    conn.on_client(ClientWsMessage::StartSession { use_generated: false, difficulty: None });
    conn.on_client(ClientWsMessage::ReturnHome);

    let event = rx.recv().await.unwrap();
    assert!(conn.on_event(event).is_empty());
    assert_eq!(conn.quiz().mode(), Mode::Idle);
    assert!(conn.quiz().ledger().is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn feedback_advances_after_delay() {
    let (mut conn, mut rx) = connection(MockCollaborator::new());
    started(&mut conn, &mut rx).await;
    let word = conn.quiz().session().current_word().unwrap().clone();

    let out = conn.on_client(ClientWsMessage::Answer { choice: word.expected_sound.as_str().into() });
    assert!(matches!(&out[0], ServerWsMessage::Feedback { feedback } if feedback.correct && feedback.advance_in_ms == 2500));
    assert_eq!(conn.quiz().session().current_index, 0);

    // A second pick while feedback shows is ignored.
    assert!(conn.on_client(ClientWsMessage::Answer { choice: "t".into() }).is_empty());

    let event = rx.recv().await.unwrap();
    assert!(matches!(event, Event::Advance(_)));
    conn.on_event(event);
    assert_eq!(conn.quiz().session().current_index, 1);
    assert_eq!(conn.quiz().session().score, 1);
  }

  #[tokio::test(start_paused = true)]
  async fn leaving_mid_feedback_cancels_the_advance() {
    let (mut conn, mut rx) = connection(MockCollaborator::new());
    started(&mut conn, &mut rx).await;
    conn.on_client(ClientWsMessage::Answer { choice: "d".into() });
    conn.on_client(ClientWsMessage::ReturnHome);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(rx.try_recv().is_err(), "advance timer should have been aborted");
    assert!(conn.quiz().session().history.is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn full_session_reaches_results() {
    let (mut conn, mut rx) = connection(MockCollaborator::new());
    started(&mut conn, &mut rx).await;
    let mut last = Vec::new();
    while let Some(word) = conn.quiz().session().current_word().cloned() {
      conn.on_client(ClientWsMessage::Answer { choice: word.expected_sound.as_str().into() });
      let event = rx.recv().await.unwrap();
      last = conn.on_event(event);
    }
    assert_eq!(last_mode(&last), Some(Mode::Results));
    match &last[0] {
      ServerWsMessage::State { view } => {
        let results = view.results.as_ref().unwrap();
        assert_eq!(results.score, 10);
        assert_eq!(results.percentage, 100);
      }
      other => panic!("unexpected {:?}", other),
    }
  }

  #[tokio::test]
  async fn unknown_choice_is_an_error() {
    let (mut conn, mut rx) = connection(MockCollaborator::new());
    started(&mut conn, &mut rx).await;
    let out = conn.on_client(ClientWsMessage::Answer { choice: "x".into() });
    assert!(matches!(&out[0], ServerWsMessage::Error { .. }));
  }

  #[tokio::test(start_paused = true)]
  async fn speech_plays_one_clip_at_a_time() {
    let pcm = vec![0u8; 4800]; // 2400 frames = 100ms at 24 kHz
    let mock = Arc::new(MockCollaborator::new().with_speech(pcm));
    let (mut conn, mut rx) = connection_with(mock.clone());

    assert_eq!(conn.on_client(ClientWsMessage::Speak { text: "walked".into() }).len(), 1);
    assert!(conn.on_client(ClientWsMessage::Speak { text: "played".into() }).is_empty());

    let event = rx.recv().await.unwrap();
    assert_eq!(mock.speech_calls(), 1);
    match &conn.on_event(event)[0] {
      ServerWsMessage::Speech { speech } => {
        assert_eq!(speech.text, "walked");
        assert_eq!(speech.frames, 2400);
        assert_eq!(speech.duration_ms, 100);
      }
      other => panic!("unexpected {:?}", other),
    }

    let event = rx.recv().await.unwrap();
    assert!(matches!(event, Event::SpeechDone(_)));
    assert!(matches!(conn.on_event(event)[0], ServerWsMessage::SpeechIdle));
    assert_eq!(conn.on_client(ClientWsMessage::Speak { text: "played".into() }).len(), 1);
  }

  #[tokio::test]
  async fn missing_speech_resets_the_player() {
    let (mut conn, mut rx) = connection(MockCollaborator::new());
    conn.on_client(ClientWsMessage::Speak { text: "walked".into() });
    let event = rx.recv().await.unwrap();
    assert!(matches!(conn.on_event(event)[0], ServerWsMessage::SpeechIdle));
    assert_eq!(conn.on_client(ClientWsMessage::Speak { text: "walked".into() }).len(), 1);
  }

  #[tokio::test]
  async fn invalid_rule_examples_keep_defaults() {
    let two = crate::seeds::default_rules()[..2].to_vec();
    let (mut conn, mut rx) = connection(MockCollaborator::new().with_rules(two));
    conn.on_client(ClientWsMessage::ViewRules);
    conn.on_client(ClientWsMessage::GenerateExamples);
    assert!(conn.quiz().is_generating_examples());
    assert!(conn.on_client(ClientWsMessage::GenerateExamples).is_empty());

    let event = rx.recv().await.unwrap();
    let out = conn.on_event(event);
    assert_eq!(last_mode(&out), Some(Mode::Learning));
    assert_eq!(conn.quiz().rules(), crate::seeds::default_rules().as_slice());
    assert!(!conn.quiz().is_generating_examples());
  }
}
