//! Request and response bodies of the admin API

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::domain::{NewProduct, ProductPatch, UnknownSite};
use crate::infrastructure::errors::StoreError;

pub const DEFAULT_LIMIT: i64 = 100;
pub const MAX_LIMIT: i64 = 1000;

/// `POST /products` body. List fields may be omitted or `null`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductCreate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub sizes: Option<Vec<String>>,
    #[serde(default)]
    pub colors: Option<Vec<String>>,
    #[serde(default)]
    pub image_urls: Option<Vec<String>>,
    pub product_link: String,
}

impl ProductCreate {
    pub fn into_new_product(self) -> Result<NewProduct, ApiError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ApiError::Validation("name must not be empty".to_string()));
        }
        let product_link = self.product_link.trim().to_string();
        if product_link.is_empty() {
            return Err(ApiError::Validation("product_link must not be empty".to_string()));
        }
        Ok(NewProduct {
            name,
            description: self.description,
            price: self.price,
            sizes: self.sizes.unwrap_or_default(),
            colors: self.colors.unwrap_or_default(),
            image_urls: self.image_urls.unwrap_or_default(),
            product_link,
        })
    }
}

/// `PUT /products/{id}` body. Absent or `null` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub sizes: Option<Vec<String>>,
    #[serde(default)]
    pub colors: Option<Vec<String>>,
    #[serde(default)]
    pub image_urls: Option<Vec<String>>,
    #[serde(default)]
    pub product_link: Option<String>,
}

impl ProductUpdate {
    pub fn into_patch(self) -> Result<ProductPatch, ApiError> {
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(ApiError::Validation("name must not be empty".to_string()));
        }
        if self.product_link.as_deref().is_some_and(|l| l.trim().is_empty()) {
            return Err(ApiError::Validation("product_link must not be empty".to_string()));
        }
        Ok(ProductPatch {
            name: self.name.map(|n| n.trim().to_string()),
            description: self.description,
            price: self.price,
            sizes: self.sizes,
            colors: self.colors,
            image_urls: self.image_urls,
            product_link: self.product_link.map(|l| l.trim().to_string()),
        })
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

const fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

impl ListQuery {
    /// Negative values are floored at zero, `limit` is capped
    pub fn bounds(self) -> (i64, i64) {
        (self.skip.max(0), self.limit.clamp(0, MAX_LIMIT))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedResponse {
    pub deleted: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self { error: error.into(), message: message.into() }
    }
}

/// Handler error, rendered as `{ "error", "message" }`
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    /// Unparseable body, path or query string
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    UnknownSite(#[from] UnknownSite),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            // well formed JSON of the wrong shape
            JsonRejection::JsonDataError(e) => Self::Validation(e.body_text()),
            other => Self::BadRequest(other.body_text()),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Self::UnknownSite(_) => (StatusCode::NOT_FOUND, "unknown_site"),
            Self::Store(StoreError::NotFound { .. }) => (StatusCode::NOT_FOUND, "not_found"),
            Self::Store(StoreError::Conflict { .. }) => (StatusCode::CONFLICT, "conflict"),
            Self::Store(StoreError::Unavailable(_)) => (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable"),
            Self::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };
        if status.is_server_error() {
            error!("❌ Request failed: {}", self);
        }
        (status, Json(ErrorResponse::new(code, self.to_string()))).into_response()
    }
}
