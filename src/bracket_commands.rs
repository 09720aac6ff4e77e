use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

use crate::bracket::{generate_bracket, list_matches};
use crate::error::BracketError;
use crate::match_set::MatchSet;
use crate::store::{validate_tournament_id, TournamentRecord, TournamentStore};
use crate::types::{BracketSection, BracketSettings, MatchId, Participant, ParticipantId};

#[derive(Clone)]
pub struct BracketServerState {
    pub store: Arc<TournamentStore>,
    /// Settings for tournaments created without their own.
    pub defaults: BracketSettings,
}

/// Error body returned by every handler: `{ "error": message }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError { status: StatusCode::NOT_FOUND, message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError { status: StatusCode::BAD_REQUEST, message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError { status: StatusCode::INTERNAL_SERVER_ERROR, message: message.into() }
    }
}

impl From<BracketError> for ApiError {
    fn from(err: BracketError) -> Self {
        match err {
            BracketError::UnknownMatch(_) => ApiError::not_found(err.to_string()),
            _ if err.is_client_error() => ApiError::bad_request(err.to_string()),
            _ => {
                error!("bracket graph rejected an operation: {err}");
                ApiError::internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

// ── Request bodies ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTournamentBody {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub participants: Vec<Participant>,
    pub settings: Option<BracketSettings>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetWinnerBody {
    pub winner_id: ParticipantId,
    pub score: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MatchQuery {
    pub section: Option<BracketSection>,
}

// ── Helpers ────────────────────────────────────────────────────────────

fn with_tournament<T>(
    state: &BracketServerState,
    id: &str,
    f: impl FnOnce(&mut TournamentRecord) -> Result<T, ApiError>,
) -> Result<T, ApiError> {
    let shared = state
        .store
        .get(id)
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found(format!("Tournament {id} not found")))?;
    let mut guard = shared.lock().map_err(|e| ApiError::internal(e.to_string()))?;
    f(&mut guard)
}

/// Persist `matches` as the tournament's new match set, then swap it in.
/// Nothing changes in memory if the write fails.
fn commit(state: &BracketServerState, record: &mut TournamentRecord, matches: MatchSet) -> Result<(), ApiError> {
    let mut staged = record.clone();
    staged.matches = Some(matches);
    staged.touch();
    state.store.persist(&staged).map_err(ApiError::internal)?;
    *record = staged;
    Ok(())
}

fn current_matches(record: &TournamentRecord) -> Result<&MatchSet, ApiError> {
    record
        .matches
        .as_ref()
        .ok_or_else(|| ApiError::bad_request(format!("Bracket for {} has not been generated", record.id)))
}

fn matches_payload(set: &MatchSet, section: Option<BracketSection>) -> Value {
    json!({
        "matches": list_matches(set, section),
        "champion": set.champion(),
    })
}

// ── Handlers ───────────────────────────────────────────────────────────

pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

pub async fn list_tournaments(State(state): State<BracketServerState>) -> Result<Json<Value>, ApiError> {
    let ids = state.store.ids().map_err(ApiError::internal)?;
    Ok(Json(json!({ "tournaments": ids })))
}

pub async fn create_tournament(
    State(state): State<BracketServerState>,
    Json(body): Json<CreateTournamentBody>,
) -> Result<impl IntoResponse, ApiError> {
    let id = validate_tournament_id(&body.id).map_err(ApiError::bad_request)?;
    let name = if body.name.trim().is_empty() { id.clone() } else { body.name.trim().to_string() };
    let settings = body.settings.unwrap_or_else(|| state.defaults.clone());
    let record = TournamentRecord::new(id, name, body.participants, settings);
    state.store.upsert(record.clone()).map_err(ApiError::internal)?;
    info!("tournament {} registered with {} participants", record.id, record.participants.len());
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get_tournament(
    State(state): State<BracketServerState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    with_tournament(&state, &id, |record| {
        let ordered = record.matches.as_ref().map(|set| list_matches(set, None));
        Ok(Json(json!({
            "id": record.id,
            "name": record.name,
            "participants": record.participants,
            "settings": record.settings,
            "createdAt": record.created_at,
            "updatedAt": record.updated_at,
            "matches": ordered,
            "champion": record.matches.as_ref().and_then(MatchSet::champion),
        })))
    })
}

/// Discard any existing bracket and build a fresh one from the registrations.
pub async fn generate(
    State(state): State<BracketServerState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    with_tournament(&state, &id, |record| {
        let set = generate_bracket(&record.id, &record.participants, &record.settings)?;
        let payload = matches_payload(&set, None);
        commit(&state, record, set)?;
        Ok(Json(payload))
    })
}

pub async fn list_tournament_matches(
    State(state): State<BracketServerState>,
    Path(id): Path<String>,
    Query(query): Query<MatchQuery>,
) -> Result<Json<Value>, ApiError> {
    with_tournament(&state, &id, |record| {
        let set = current_matches(record)?;
        Ok(Json(matches_payload(set, query.section)))
    })
}

pub async fn set_match_winner(
    State(state): State<BracketServerState>,
    Path((id, match_id)): Path<(String, MatchId)>,
    Json(body): Json<SetWinnerBody>,
) -> Result<Json<Value>, ApiError> {
    with_tournament(&state, &id, |record| {
        let mut next = current_matches(record)?.clone();
        let changed = next.set_winner(match_id, body.winner_id, body.score)?;
        let payload = json!({ "changed": changed, "champion": next.champion() });
        if !changed.is_empty() {
            commit(&state, record, next)?;
        }
        Ok(Json(payload))
    })
}

pub async fn clear_match_winner(
    State(state): State<BracketServerState>,
    Path((id, match_id)): Path<(String, MatchId)>,
) -> Result<Json<Value>, ApiError> {
    with_tournament(&state, &id, |record| {
        let mut next = current_matches(record)?.clone();
        let changed = next.clear_winner(match_id)?;
        let payload = json!({ "changed": changed, "champion": next.champion() });
        if !changed.is_empty() {
            commit(&state, record, next)?;
        }
        Ok(Json(payload))
    })
}
