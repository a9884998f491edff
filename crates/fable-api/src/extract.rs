//! Request extractors whose rejections render as [`ApiError`] bodies.

use axum::Json;
use axum::extract::Path;
use axum_extra::extract::WithRejection;

use crate::error::ApiError;

/// JSON request body. Malformed, mistyped or missing bodies are a 412.
pub type JsonBody<T> = WithRejection<Json<T>, ApiError>;

/// Path parameters. Ids that do not parse are a 412.
pub type PathParams<T> = WithRejection<Path<T>, ApiError>;
