use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::handlers::log_types::owned_log_type;
use crate::handlers::ws::{notify, Change};
use crate::models::log_entry::{
    now_millis, CreateLogEntryRequest, ExistingLogQuery, LogEntry, TimeRange,
    UpdateLogEntryRequest,
};
use crate::AppState;

/// All of the caller's entries, newest first.
pub async fn list_logs(
    State(state): State<AppState>,
    auth_user: Option<AuthUser>,
) -> AppResult<Json<Vec<LogEntry>>> {
    let Some(auth_user) = auth_user else {
        return Ok(Json(Vec::new()));
    };
    let entries = state.store.list_entries_by_owner(&auth_user.id).await?;
    Ok(Json(entries))
}

/// The caller's entry of a type on the local day containing `timestamp`.
pub async fn find_existing_log(
    State(state): State<AppState>,
    auth_user: Option<AuthUser>,
    Query(query): Query<ExistingLogQuery>,
) -> AppResult<Json<Option<LogEntry>>> {
    let Some(auth_user) = auth_user else {
        return Ok(Json(None));
    };
    let day = day_window(&state, query.timestamp)?;
    let entry = state
        .store
        .find_entry_in_range(&auth_user.id, query.type_id, day)
        .await?;
    Ok(Json(entry))
}

pub async fn create_log(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(body): Json<CreateLogEntryRequest>,
) -> AppResult<Json<LogEntry>> {
    body.validate()?;
    owned_log_type(&state, &auth_user, body.type_id).await?;

    let timestamp = body.timestamp.unwrap_or_else(now_millis);
    day_window(&state, timestamp)?;

    let entry = LogEntry {
        id: Uuid::new_v4(),
        user_id: auth_user.id.clone(),
        type_id: body.type_id,
        timestamp,
        values: body.values,
        notes: body.notes,
    };
    state.store.insert_entry(&entry).await?;

    tracing::debug!(user_id = %auth_user.id, log_id = %entry.id, type_id = %entry.type_id, "log entry created");
    notify(
        &state,
        &auth_user.id,
        Change::Log {
            id: entry.id,
            type_id: entry.type_id,
        },
    );
    Ok(Json(entry))
}

pub async fn update_log(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(log_id): Path<Uuid>,
    Json(body): Json<UpdateLogEntryRequest>,
) -> AppResult<Json<LogEntry>> {
    body.validate()?;

    let mut entry = owned_entry(&state, &auth_user, log_id).await?;
    if let Some(values) = body.values {
        entry.values = values;
    }
    if let Some(notes) = body.notes {
        entry.notes = Some(notes);
    }
    state.store.update_entry(&entry).await?;

    notify(
        &state,
        &auth_user.id,
        Change::Log {
            id: entry.id,
            type_id: entry.type_id,
        },
    );
    Ok(Json(entry))
}

pub async fn delete_log(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(log_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    let entry = owned_entry(&state, &auth_user, log_id).await?;
    state.store.delete_entry(log_id).await?;

    notify(
        &state,
        &auth_user.id,
        Change::Log {
            id: entry.id,
            type_id: entry.type_id,
        },
    );
    Ok(Json(json!({ "deleted": true })))
}

/// The local day containing `timestamp`. Instants whose day cannot be
/// expressed as a window are rejected.
fn day_window(state: &AppState, timestamp: i64) -> AppResult<TimeRange> {
    let zone = state.consistency.zone();
    zone.date_of(timestamp)
        .and_then(|date| zone.window(date, date))
        .ok_or_else(|| AppError::Validation("Timestamp out of range".into()))
}

async fn owned_entry(state: &AppState, auth_user: &AuthUser, log_id: Uuid) -> AppResult<LogEntry> {
    let entry = state
        .store
        .get_entry(log_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Log entry not found".into()))?;
    if entry.user_id != auth_user.id {
        return Err(AppError::Forbidden);
    }
    Ok(entry)
}
