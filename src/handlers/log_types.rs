use std::collections::HashSet;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::handlers::ws::{notify, Change};
use crate::models::log_type::{
    default_catalogue, CreateLogTypeRequest, LogType, UpdateLogTypeRequest,
};
use crate::AppState;

pub async fn list_log_types(
    State(state): State<AppState>,
    auth_user: Option<AuthUser>,
) -> AppResult<Json<Vec<LogType>>> {
    let Some(auth_user) = auth_user else {
        return Ok(Json(Vec::new()));
    };
    let types = state.store.list_log_types_by_owner(&auth_user.id).await?;
    Ok(Json(types))
}

pub async fn create_log_type(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(body): Json<CreateLogTypeRequest>,
) -> AppResult<Json<LogType>> {
    body.validate()?;

    let log_type = LogType {
        id: Uuid::new_v4(),
        user_id: auth_user.id.clone(),
        name: body.name.trim().to_string(),
        icon_id: body.icon_id,
        fields: body.fields,
        created_at: Utc::now(),
    };
    state.store.insert_log_type(&log_type).await?;

    tracing::info!(user_id = %auth_user.id, log_type_id = %log_type.id, "log type created");
    notify(&state, &auth_user.id, Change::LogType(log_type.id));
    Ok(Json(log_type))
}

/// Seed the starter catalogue. Names the caller already has are skipped.
pub async fn create_default_log_types(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<Vec<LogType>>> {
    let existing: HashSet<String> = state
        .store
        .list_log_types_by_owner(&auth_user.id)
        .await?
        .into_iter()
        .map(|t| t.name)
        .collect();

    let mut created = Vec::new();
    for (name, fields) in default_catalogue() {
        if existing.contains(name) {
            continue;
        }
        let log_type = LogType {
            id: Uuid::new_v4(),
            user_id: auth_user.id.clone(),
            name: name.to_string(),
            icon_id: None,
            fields,
            created_at: Utc::now(),
        };
        state.store.insert_log_type(&log_type).await?;
        notify(&state, &auth_user.id, Change::LogType(log_type.id));
        created.push(log_type);
    }

    tracing::info!(user_id = %auth_user.id, created = created.len(), "default log types seeded");
    Ok(Json(created))
}

pub async fn update_log_type(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(log_type_id): Path<Uuid>,
    Json(body): Json<UpdateLogTypeRequest>,
) -> AppResult<Json<LogType>> {
    body.validate()?;

    let mut log_type = owned_log_type(&state, &auth_user, log_type_id).await?;
    if let Some(name) = body.name {
        log_type.name = name.trim().to_string();
    }
    if let Some(icon_id) = body.icon_id {
        log_type.icon_id = Some(icon_id);
    }
    if let Some(fields) = body.fields {
        log_type.fields = fields;
    }
    state.store.update_log_type(&log_type).await?;

    notify(&state, &auth_user.id, Change::LogType(log_type.id));
    Ok(Json(log_type))
}

/// Deletes the log type and every entry recorded against it.
pub async fn delete_log_type(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(log_type_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    owned_log_type(&state, &auth_user, log_type_id).await?;
    let removed = state.store.delete_log_type(log_type_id).await?;

    tracing::info!(
        user_id = %auth_user.id,
        log_type_id = %log_type_id,
        entries_removed = removed,
        "log type deleted"
    );
    notify(&state, &auth_user.id, Change::LogType(log_type_id));
    Ok(Json(json!({ "deleted": true, "entries_removed": removed })))
}

pub(crate) async fn owned_log_type(
    state: &AppState,
    auth_user: &AuthUser,
    log_type_id: Uuid,
) -> AppResult<LogType> {
    let log_type = state
        .store
        .get_log_type(log_type_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Log type not found".into()))?;
    if log_type.user_id != auth_user.id {
        return Err(AppError::Forbidden);
    }
    Ok(log_type)
}
