use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::db::enums::ChannelType;
use crate::db::models::{NewTemplate, TemplateDto, UpdateTemplate};
use crate::db::services::template_service;
use crate::web::{AppError, AppState};

use super::current_operator;

#[derive(Deserialize)]
pub struct ActiveQuery {
    channel: Option<ChannelType>,
}

#[derive(Deserialize)]
pub struct SearchQuery {
    q: String,
}

// --- Route Handlers ---

async fn list_templates_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<TemplateDto>>, AppError> {
    Ok(Json(template_service::get_all(&app_state.db_pool).await?))
}

async fn create_template_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<NewTemplate>,
) -> Result<(StatusCode, Json<TemplateDto>), AppError> {
    let template = template_service::create(&app_state.db_pool, payload).await?;
    info!(
        template_id = template.id,
        name = %template.name,
        operator = %current_operator(&app_state, &headers)
            .map(|s| s.operator_name)
            .unwrap_or_else(|| "anonymous".to_owned()),
        "Template created."
    );
    Ok((StatusCode::CREATED, Json(template)))
}

async fn get_template_handler(
    State(app_state): State<Arc<AppState>>,
    Path(template_id): Path<i32>,
) -> Result<Json<TemplateDto>, AppError> {
    Ok(Json(
        template_service::get_by_id(&app_state.db_pool, template_id).await?,
    ))
}

async fn update_template_handler(
    State(app_state): State<Arc<AppState>>,
    Path(template_id): Path<i32>,
    headers: HeaderMap,
    Json(payload): Json<UpdateTemplate>,
) -> Result<Json<TemplateDto>, AppError> {
    let template = template_service::update(&app_state.db_pool, template_id, payload).await?;
    info!(
        template_id,
        operator = %current_operator(&app_state, &headers)
            .map(|s| s.operator_name)
            .unwrap_or_else(|| "anonymous".to_owned()),
        "Template updated."
    );
    Ok(Json(template))
}

async fn delete_template_handler(
    State(app_state): State<Arc<AppState>>,
    Path(template_id): Path<i32>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    template_service::delete(&app_state.db_pool, template_id).await?;
    info!(
        template_id,
        operator = %current_operator(&app_state, &headers)
            .map(|s| s.operator_name)
            .unwrap_or_else(|| "anonymous".to_owned()),
        "Template deleted."
    );
    Ok(StatusCode::NO_CONTENT)
}

async fn duplicate_template_handler(
    State(app_state): State<Arc<AppState>>,
    Path(template_id): Path<i32>,
) -> Result<(StatusCode, Json<TemplateDto>), AppError> {
    let copy = template_service::duplicate(&app_state.db_pool, template_id).await?;
    Ok((StatusCode::CREATED, Json(copy)))
}

async fn active_templates_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<ActiveQuery>,
) -> Result<Json<Vec<TemplateDto>>, AppError> {
    Ok(Json(
        template_service::get_active(&app_state.db_pool, query.channel).await?,
    ))
}

async fn search_templates_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<TemplateDto>>, AppError> {
    Ok(Json(
        template_service::search(&app_state.db_pool, &query.q).await?,
    ))
}

async fn templates_by_module_handler(
    State(app_state): State<Arc<AppState>>,
    Path(module): Path<String>,
) -> Result<Json<Vec<TemplateDto>>, AppError> {
    Ok(Json(
        template_service::get_by_module(&app_state.db_pool, &module).await?,
    ))
}

// --- Router ---

pub fn create_templates_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/",
            get(list_templates_handler).post(create_template_handler),
        )
        .route("/active", get(active_templates_handler))
        .route("/search", get(search_templates_handler))
        .route("/module/{module}", get(templates_by_module_handler))
        .route(
            "/{template_id}",
            get(get_template_handler)
                .put(update_template_handler)
                .delete(delete_template_handler),
        )
        .route("/{template_id}/duplicate", post(duplicate_template_handler))
}
