//! Admin API handlers

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{debug, info};

use super::types::{ApiError, DeletedResponse, HealthResponse, ListQuery, ProductCreate, ProductUpdate};
use crate::application::ScrapeService;
use crate::domain::ProductRecord;
use crate::infrastructure::product_repository::ProductRepository;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub repository: ProductRepository,
    pub scraper: ScrapeService,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn create_product(
    State(state): State<AppState>,
    body: Result<Json<ProductCreate>, JsonRejection>,
) -> Result<(StatusCode, Json<ProductRecord>), ApiError> {
    let Json(body) = body?;
    let product = body.into_new_product()?;
    let record = state.repository.create(&product).await?;
    info!("➕ Created product #{} {}", record.id, record.product_link);
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list_products(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Vec<ProductRecord>>, ApiError> {
    let Query(query) = query?;
    let (skip, limit) = query.bounds();
    debug!("Listing products skip={} limit={}", skip, limit);
    Ok(Json(state.repository.list(skip, limit).await?))
}

pub async fn get_product(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<ProductRecord>, ApiError> {
    let Path(id) = id?;
    Ok(Json(state.repository.get(id).await?))
}

pub async fn update_product(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<ProductUpdate>, JsonRejection>,
) -> Result<Json<ProductRecord>, ApiError> {
    let Path(id) = id?;
    let Json(body) = body?;
    let patch = body.into_patch()?;
    let record = state.repository.update(id, &patch).await?;
    info!("✏️ Updated product #{}", id);
    Ok(Json(record))
}

pub async fn delete_product(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id?;
    state.repository.delete(id).await?;
    info!("🗑️ Deleted product #{}", id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_all_products(State(state): State<AppState>) -> Result<Json<DeletedResponse>, ApiError> {
    let deleted = state.repository.delete_all().await?;
    info!("🗑️ Deleted all {} products", deleted);
    Ok(Json(DeletedResponse { deleted }))
}

/// 202 once the job is spawned, 404 for a site without adapter
pub async fn trigger_scrape(
    State(state): State<AppState>,
    Path(site_name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let ack = state.scraper.trigger(&site_name)?;
    Ok((StatusCode::ACCEPTED, Json(ack)))
}
