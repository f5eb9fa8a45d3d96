//! Minimal OpenAI client for our use-cases.
//!
//! We call chat.completions with a strict JSON-object response for word lists
//! and rule examples, and audio.speech with raw PCM output for pronunciation.
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::collaborator::GenerationCollaborator;
use crate::config::Prompts;
use crate::domain::{DifficultyLevel, RuleCategory, Sound, WordItem};
use crate::error::CollaboratorError;
use crate::util::fill_template;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const AGENT: &str = "edmaster-backend/0.1";
const WORDS_PER_BATCH: usize = 10;

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub fast_model: String,
  pub strong_model: String,
  pub tts_model: String,
  pub tts_voice: String,
  pub prompts: Prompts,
}

#[derive(Deserialize)]
struct WordsGen {
  #[serde(default)]
  words: Vec<RawWord>,
}

#[derive(Deserialize)]
struct RawWord {
  #[serde(default)] word: String,
  #[serde(default)] sound: String,
  #[serde(default)] rule: String,
  #[serde(default, rename = "exampleSentence", alias = "example_sentence")] example_sentence: String,
}

#[derive(Deserialize)]
struct RulesGen {
  #[serde(default)]
  rules: Vec<RuleCategory>,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env(prompts: Prompts) -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok()?;
    let base_url = std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
    let mut oa = Self::new(&api_key, &base_url, prompts).ok()?;
    if let Ok(m) = std::env::var("OPENAI_FAST_MODEL") { oa.fast_model = m; }
    if let Ok(m) = std::env::var("OPENAI_STRONG_MODEL") { oa.strong_model = m; }
    if let Ok(m) = std::env::var("OPENAI_TTS_MODEL") { oa.tts_model = m; }
    if let Ok(v) = std::env::var("OPENAI_TTS_VOICE") { oa.tts_voice = v; }
    Some(oa)
  }

  pub fn new(api_key: &str, base_url: &str, prompts: Prompts) -> Result<Self, CollaboratorError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(20))
      .build()?;

    Ok(Self {
      client,
      api_key: api_key.to_string(),
      base_url: base_url.trim_end_matches('/').to_string(),
      fast_model: "gpt-4o-mini".into(),
      strong_model: "gpt-4o".into(),
      tts_model: "gpt-4o-mini-tts".into(),
      tts_voice: "coral".into(),
      prompts,
    })
  }

  /// JSON-object chat completion. Generic over the target type T.
  #[instrument(level = "info", skip(self, system, user), fields(model = %model))]
  async fn chat_json<T: for<'a> Deserialize<'a>>(
    &self,
    model: &str,
    system: &str,
    user: &str,
    temperature: f32,
  ) -> Result<T, CollaboratorError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: model.to_string(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: system.into() },
        ChatMessageReq { role: "user".into(), content: user.into() },
      ],
      temperature,
      response_format: Some(ResponseFormat { r#type: "json_object".into() }),
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, AGENT)
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await?;

    if !res.status().is_success() {
      return Err(api_error(res).await);
    }

    let body: ChatCompletionResponse = res.json().await?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body.choices.first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default();

    serde_json::from_str::<T>(&text).map_err(|e| CollaboratorError::Parse(format!("JSON parse error: {}", e)))
  }

  /// Text-to-speech as raw PCM (24 kHz, 16-bit LE, mono).
  #[instrument(level = "info", skip(self, text), fields(model = %self.tts_model, voice = %self.tts_voice, text_len = text.len()))]
  async fn speech_pcm(&self, text: &str) -> Result<Vec<u8>, CollaboratorError> {
    let url = format!("{}/audio/speech", self.base_url);
    let req = SpeechRequest {
      model: self.tts_model.clone(),
      voice: self.tts_voice.clone(),
      input: text.to_string(),
      instructions: Some(self.prompts.speech_instructions.clone()).filter(|s| !s.is_empty()),
      response_format: "pcm".into(),
    };

    let res = self.client.post(&url)
      .header(USER_AGENT, AGENT)
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await?;

    if !res.status().is_success() {
      return Err(api_error(res).await);
    }
    Ok(res.bytes().await?.to_vec())
  }
}

#[async_trait]
impl GenerationCollaborator for OpenAI {
  fn name(&self) -> &str {
    "openai"
  }

  #[instrument(level = "info", skip(self, excluded), fields(%difficulty, excluded = excluded.len(), model = %self.strong_model))]
  async fn generate_words(
    &self,
    difficulty: DifficultyLevel,
    excluded: &[String],
  ) -> Result<Vec<WordItem>, CollaboratorError> {
    let exclusion = if excluded.is_empty() {
      String::new()
    } else {
      fill_template(&self.prompts.exclusion_template, &[("words", &excluded.join(", "))])
    };
    let count = WORDS_PER_BATCH.to_string();
    let user = fill_template(
      &self.prompts.words_user_template,
      &[("difficulty", difficulty.label()), ("count", &count), ("exclusion", &exclusion)],
    );

    let start = Instant::now();
    let gen: WordsGen = match self.chat_json(&self.strong_model, &self.prompts.words_system, &user, 0.9).await {
      Ok(g) => g,
      Err(e) => {
        error!(elapsed = ?start.elapsed(), error = %e, "Model call failed during word generation");
        return Err(e);
      }
    };

    let raw_len = gen.words.len();
    let words: Vec<WordItem> = gen.words.into_iter().filter_map(to_word_item).collect();
    if words.len() < raw_len {
      warn!(dropped = raw_len - words.len(), "Dropped generated words with missing fields or unknown sound");
    }
    info!(elapsed = ?start.elapsed(), count = words.len(), "Word batch generated");
    Ok(words)
  }

  #[instrument(level = "info", skip(self), fields(model = %self.fast_model))]
  async fn generate_rule_examples(&self) -> Result<Vec<RuleCategory>, CollaboratorError> {
    let gen: RulesGen = self
      .chat_json(&self.fast_model, &self.prompts.rules_system, &self.prompts.rules_user_template, 0.8)
      .await?;
    info!(count = gen.rules.len(), "Rule examples generated");
    Ok(gen.rules)
  }

  async fn synthesize_speech(&self, text: &str) -> Result<Option<Vec<u8>>, CollaboratorError> {
    let text = text.trim();
    if text.is_empty() {
      return Ok(None);
    }
    let pcm = self.speech_pcm(text).await?;
    info!(bytes = pcm.len(), "Speech synthesized");
    Ok(Some(pcm).filter(|b| !b.is_empty()))
  }
}

fn to_word_item(raw: RawWord) -> Option<WordItem> {
  let word = raw.word.trim();
  if word.is_empty() {
    return None;
  }
  let sound = Sound::from_input(&raw.sound)?;
  Some(WordItem::new(word, sound, raw.rule.trim(), raw.example_sentence.trim()))
}

async fn api_error(res: reqwest::Response) -> CollaboratorError {
  let status = res.status().as_u16();
  let body = res.text().await.unwrap_or_default();
  let message = extract_openai_error(&body).unwrap_or(body);
  CollaboratorError::Api { status, message }
}

// --- DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

#[derive(Serialize)]
struct SpeechRequest {
  model: String,
  voice: String,
  input: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  instructions: Option<String>,
  response_format: String,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;
  use wiremock::matchers::{body_partial_json, header, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn chat_reply(content: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
      "choices": [{"message": {"role": "assistant", "content": content.to_string()}, "index": 0}],
      "usage": {"prompt_tokens": 40, "completion_tokens": 15, "total_tokens": 55}
    })
  }

  async fn client(server: &MockServer) -> OpenAI {
    OpenAI::new("test-key", &server.uri(), Prompts::default()).unwrap()
  }

  #[tokio::test]
  async fn generates_words_and_drops_invalid_entries() {
    let server = MockServer::start().await;
    let content = serde_json::json!({"words": [
      {"word": "hoped", "sound": "/t/", "rule": "Ends with voiceless /p/", "exampleSentence": "She hoped so."},
      {"word": "rained", "sound": "d", "rule": "Ends with voiced /n/", "exampleSentence": "It rained."},
      {"word": "painted", "sound": "ɪd", "rule": "Ends with /t/", "exampleSentence": "We painted it."},
      {"word": "broken", "sound": "n", "rule": "?", "exampleSentence": "?"},
      {"word": "", "sound": "t", "rule": "", "exampleSentence": ""}
    ]});

    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .and(header("Authorization", "Bearer test-key"))
      .and(body_partial_json(serde_json::json!({"response_format": {"type": "json_object"}})))
      .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply(content)))
      .mount(&server)
      .await;

    let oa = client(&server).await;
    let words = oa.generate_words(DifficultyLevel::B2, &["walked".into()]).await.unwrap();
    assert_eq!(words.len(), 3);
    assert_eq!(words[0].expected_sound, Sound::T);
    assert_eq!(words[2].expected_sound, Sound::Id);
    assert_eq!(words[1].example_sentence, "It rained.");
  }

  #[test]
  fn chat_request_carries_only_used_fields() {
    let req = ChatCompletionRequest {
      model: "gpt-4o".into(),
      messages: vec![ChatMessageReq { role: "user".into(), content: "hi".into() }],
      temperature: 0.5,
      response_format: Some(ResponseFormat { r#type: "json_object".into() }),
    };
    let v = serde_json::to_value(&req).unwrap();
    let mut keys: Vec<&str> = v.as_object().unwrap().keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, ["messages", "model", "response_format", "temperature"]);
  }

  #[tokio::test]
  async fn api_errors_carry_status_and_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
        "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
      })))
      .mount(&server)
      .await;

    let oa = client(&server).await;
    match oa.generate_rule_examples().await {
      Err(CollaboratorError::Api { status, message }) => {
        assert_eq!(status, 401);
        assert_eq!(message, "Incorrect API key provided");
      }
      other => panic!("expected API error, got {:?}", other.map(|r| r.len())),
    }
  }

  #[tokio::test]
  async fn non_json_content_is_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "choices": [{"message": {"content": "sorry, no"}}]
      })))
      .mount(&server)
      .await;

    let oa = client(&server).await;
    assert!(matches!(oa.generate_rule_examples().await, Err(CollaboratorError::Parse(_))));
  }

  #[tokio::test]
  async fn speech_returns_raw_pcm() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/audio/speech"))
      .and(body_partial_json(serde_json::json!({"response_format": "pcm", "input": "walked"})))
      .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8, 1, 2, 3]))
      .mount(&server)
      .await;

    let oa = client(&server).await;
    assert_eq!(oa.synthesize_speech(" walked ").await.unwrap(), Some(vec![0, 1, 2, 3]));
    assert_eq!(oa.synthesize_speech("   ").await.unwrap(), None);
  }
}
