use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::engine::history::{Block, HistoryDay};
use crate::engine::StreakStatus;
use crate::error::{AppError, AppResult};
use crate::handlers::ws::{notify, Change};
use crate::models::tracker::{
    HabitRequest, HistoryQuery, NewTracker, StreakRequest, Tracker, TrackerKind,
};
use crate::AppState;

fn caller(auth_user: &Option<AuthUser>) -> Option<&str> {
    auth_user.as_ref().map(|u| u.id.as_str())
}

pub async fn list_trackers(
    State(state): State<AppState>,
    auth_user: Option<AuthUser>,
) -> AppResult<Json<Vec<Tracker>>> {
    let Some(auth_user) = auth_user else {
        return Ok(Json(Vec::new()));
    };
    let trackers = state.store.list_trackers_by_owner(&auth_user.id).await?;
    Ok(Json(trackers))
}

pub async fn get_tracker(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(tracker_id): Path<Uuid>,
) -> AppResult<Json<Tracker>> {
    let tracker = owned_tracker(&state, &auth_user, tracker_id).await?;
    Ok(Json(tracker))
}

pub async fn delete_tracker(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(tracker_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    owned_tracker(&state, &auth_user, tracker_id).await?;
    state.store.delete_tracker(tracker_id).await?;

    tracing::info!(user_id = %auth_user.id, tracker_id = %tracker_id, "tracker deleted");
    notify(&state, &auth_user.id, Change::Tracker(tracker_id));
    Ok(Json(json!({ "deleted": true })))
}

pub async fn tracker_status(
    State(state): State<AppState>,
    auth_user: Option<AuthUser>,
    Path(tracker_id): Path<Uuid>,
) -> AppResult<Json<StreakStatus>> {
    let status = state
        .consistency
        .get_status(caller(&auth_user), tracker_id)
        .await?;
    Ok(Json(status))
}

pub async fn tracker_statuses(
    State(state): State<AppState>,
    auth_user: Option<AuthUser>,
) -> AppResult<Json<BTreeMap<Uuid, StreakStatus>>> {
    let statuses = state.consistency.get_statuses(caller(&auth_user)).await?;
    Ok(Json(statuses))
}

pub async fn tracker_history(
    State(state): State<AppState>,
    auth_user: Option<AuthUser>,
    Path(tracker_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<Vec<HistoryDay>>> {
    let rows = state
        .consistency
        .get_history(caller(&auth_user), tracker_id, query.days)
        .await?;
    Ok(Json(rows))
}

pub async fn tracker_blocks(
    State(state): State<AppState>,
    auth_user: Option<AuthUser>,
    Path(tracker_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<Vec<Block>>> {
    let blocks = state
        .consistency
        .get_blocks(caller(&auth_user), tracker_id, query.days)
        .await?;
    Ok(Json(blocks))
}

pub async fn create_habit(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(body): Json<HabitRequest>,
) -> AppResult<Json<Tracker>> {
    body.validate()?;
    let new = body.into_new_tracker().map_err(AppError::Validation)?;
    insert_tracker(&state, &auth_user, new).await
}

pub async fn update_habit(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(tracker_id): Path<Uuid>,
    Json(body): Json<HabitRequest>,
) -> AppResult<Json<Tracker>> {
    body.validate()?;
    let new = body.into_new_tracker().map_err(AppError::Validation)?;

    let mut tracker = owned_tracker(&state, &auth_user, tracker_id).await?;
    if tracker.kind != TrackerKind::Habit {
        return Err(AppError::Validation("Tracker is not a habit".into()));
    }
    check_references(&state, &auth_user, &new).await?;
    tracker.apply(new);
    state.store.update_tracker(&tracker).await?;

    notify(&state, &auth_user.id, Change::Tracker(tracker.id));
    Ok(Json(tracker))
}

pub async fn create_streak(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(body): Json<StreakRequest>,
) -> AppResult<Json<Tracker>> {
    body.validate()?;
    let new = body.into_new_tracker().map_err(AppError::Validation)?;
    insert_tracker(&state, &auth_user, new).await
}

async fn insert_tracker(
    state: &AppState,
    auth_user: &AuthUser,
    new: NewTracker,
) -> AppResult<Json<Tracker>> {
    check_references(state, auth_user, &new).await?;
    let tracker = Tracker::from_new(&auth_user.id, new);
    state.store.insert_tracker(&tracker).await?;

    tracing::info!(
        user_id = %auth_user.id,
        tracker_id = %tracker.id,
        kind = tracker.kind.as_str(),
        interval = %tracker.interval,
        "tracker created"
    );
    notify(state, &auth_user.id, Change::Tracker(tracker.id));
    Ok(Json(tracker))
}

/// Referenced log types must exist, belong to the caller, and at least one
/// of them must declare the tracked field.
async fn check_references(state: &AppState, auth_user: &AuthUser, new: &NewTracker) -> AppResult<()> {
    let mut declared = false;
    for type_id in &new.log_type_ids {
        let log_type = state
            .store
            .get_log_type(*type_id)
            .await?
            .ok_or_else(|| AppError::Validation(format!("Unknown log type {type_id}")))?;
        if log_type.user_id != auth_user.id {
            return Err(AppError::Forbidden);
        }
        declared |= log_type.has_field(&new.field);
    }
    if !declared {
        return Err(AppError::Validation(format!(
            "No referenced log type declares field '{}'",
            new.field
        )));
    }
    Ok(())
}

async fn owned_tracker(state: &AppState, auth_user: &AuthUser, tracker_id: Uuid) -> AppResult<Tracker> {
    let tracker = state
        .store
        .get_tracker(tracker_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Tracker not found".into()))?;
    if tracker.user_id != auth_user.id {
        return Err(AppError::Forbidden);
    }
    Ok(tracker)
}
