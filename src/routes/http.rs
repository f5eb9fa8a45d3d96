//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! None of them keep state: quiz progress travels with the request.

use std::sync::Arc;
use axum::{extract::{State, Query}, http::StatusCode, Json, response::IntoResponse};
use tracing::{info, instrument, warn};

use crate::domain::{DifficultyLevel, Sound};
use crate::error::EvaluateError;
use crate::logic::*;
use crate::protocol::*;
use crate::share;
use crate::state::AppState;
use crate::util::split_list;

type ApiError = (StatusCode, Json<ErrorOut>);

fn api_error(status: StatusCode, error: impl ToString) -> ApiError {
  (status, Json(ErrorOut { error: error.to_string() }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, generation: state.words.has_collaborator() })
}

#[instrument(level = "info")]
pub async fn http_levels() -> impl IntoResponse {
  Json(LevelsOut { levels: DifficultyLevel::ALL.to_vec(), default: DifficultyLevel::default() })
}

#[instrument(level = "info", skip(state, q), fields(difficulty = ?q.difficulty, generated = ?q.generated))]
pub async fn http_get_words(
  State(state): State<Arc<AppState>>,
  Query(q): Query<WordsQuery>,
) -> Result<Json<WordsOut>, ApiError> {
  let difficulty = match q.difficulty.as_deref() {
    Some(raw) => raw.parse::<DifficultyLevel>().map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?,
    None => DifficultyLevel::default(),
  };
  let excluded = q.exclude.as_deref().map(split_list).unwrap_or_default();
  let use_generated = q.generated.unwrap_or_else(|| state.words.has_collaborator());

  let batch = word_batch(&state, difficulty, excluded, use_generated).await;
  Ok(Json(WordsOut { difficulty, origin: batch.origin, words: batch.items }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_rules(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let (rules, origin) = rule_examples(&state).await;
  info!(target: "quiz", %origin, "HTTP rules served");
  Json(RulesOut { origin: origin.to_string(), rules })
}

#[instrument(level = "info", skip(state, body), fields(text_len = body.text.len()))]
pub async fn http_post_speech(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SpeechIn>,
) -> impl IntoResponse {
  let speech = speech_clip(&state, &body.text).await.map(|clip| speech_out(&clip));
  Json(SpeechResponse { available: speech.is_some(), speech })
}

#[instrument(level = "info", skip(body), fields(index = body.state.current_index, total = body.state.total_questions, choice = %body.choice))]
pub async fn http_post_evaluate(Json(body): Json<EvaluateIn>) -> Result<Json<EvaluateOut>, ApiError> {
  let choice = Sound::from_input(&body.choice)
    .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, format!("unknown choice '{}'", body.choice)))?;

  let (state, correct) = evaluate_stateless(&body.state, choice).map_err(|e| match e {
    EvaluateError::OutOfRange { .. } => {
      warn!(target: "quiz", error = %e, "HTTP evaluate past the end of the session");
      api_error(StatusCode::UNPROCESSABLE_ENTITY, e)
    }
  })?;
  let finished = state.is_finished();
  info!(target: "quiz", correct, finished, score = state.score, "HTTP answer evaluated");
  Ok(Json(EvaluateOut { correct, finished, state }))
}

#[instrument(level = "info", skip(body), fields(difficulty = %body.difficulty, answered = body.state.history.len()))]
pub async fn http_post_share(Json(body): Json<ShareIn>) -> impl IntoResponse {
  Json(share::compose(&body.state, body.difficulty))
}
