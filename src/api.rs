//! Framework-agnostic request routing for the admin image endpoints.
//!
//! The HTTP server, authentication and sessions belong to the host
//! application. It hands this module a method, a path and a raw body and
//! writes back the returned status and JSON.
//!
//! | Method | Path | Body | Response |
//! |--------|------|------|----------|
//! | `GET` | `/status` | none | [`StatusResponse`](crate::optimize::StatusResponse) |
//! | `POST` | `/optimize-batch` | [`BatchRequest`] | [`BatchResponse`](crate::optimize::BatchResponse) |
//! | `POST` | `/cleanup-old-sizes` | none or `{}` | [`CleanupResponse`](crate::optimize::CleanupResponse) |
//!
//! Errors are `{"error": "<message>"}`: 400 for malformed requests, 404 for
//! unknown paths, 405 for a known path with the wrong method, 409 for a run id
//! that is not the current run, 500 for storage and index failures.

use crate::imaging::ImageCodec;
use crate::optimize::{BatchRequest, OptimizeError, Optimizer};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, error};

/// An incoming request, already authenticated by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: String,
    pub path: String,
    pub body: Vec<u8>,
}

impl ApiRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            body: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    fn ok<T: Serialize>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(body) => Self { status: 200, body },
            Err(e) => Self::error(500, format!("response serialization failed: {e}")),
        }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }
}

impl From<OptimizeError> for ApiResponse {
    fn from(e: OptimizeError) -> Self {
        ApiResponse::error(e.status_code(), e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Status,
    OptimizeBatch,
    CleanupOldSizes,
}

impl Route {
    fn from_path(path: &str) -> Option<Self> {
        match path {
            "/status" => Some(Route::Status),
            "/optimize-batch" => Some(Route::OptimizeBatch),
            "/cleanup-old-sizes" => Some(Route::CleanupOldSizes),
            _ => None,
        }
    }

    fn method(self) -> &'static str {
        match self {
            Route::Status => "GET",
            Route::OptimizeBatch | Route::CleanupOldSizes => "POST",
        }
    }
}

/// Routes requests to an [`Optimizer`].
pub struct Api<C: ImageCodec> {
    optimizer: Arc<Optimizer<C>>,
    mount: String,
}

impl<C: ImageCodec + 'static> Api<C> {
    pub fn new(optimizer: Arc<Optimizer<C>>) -> Self {
        Self {
            optimizer,
            mount: String::new(),
        }
    }

    /// Serve the endpoints under `mount` (`/api/images` → `/api/images/status`).
    pub fn mounted_at(mut self, mount: &str) -> Self {
        self.mount = mount.trim_end_matches('/').to_string();
        self
    }

    pub async fn handle(&self, request: &ApiRequest) -> ApiResponse {
        let response = self.dispatch(request).await;
        if response.status >= 500 {
            error!(
                method = %request.method,
                path = %request.path,
                status = response.status,
                body = %response.body,
                "admin image request failed"
            );
        } else {
            debug!(
                method = %request.method,
                path = %request.path,
                status = response.status,
                "admin image request"
            );
        }
        response
    }

    async fn dispatch(&self, request: &ApiRequest) -> ApiResponse {
        let Some(route) = self.route(&request.path) else {
            return ApiResponse::error(404, format!("no route for {}", request.path));
        };
        if !request.method.eq_ignore_ascii_case(route.method()) {
            return ApiResponse::error(
                405,
                format!("{} requires {}", request.path, route.method()),
            );
        }

        match route {
            Route::Status => match self.optimizer.status().await {
                Ok(status) => ApiResponse::ok(&status),
                Err(e) => e.into(),
            },
            Route::OptimizeBatch => {
                let batch: BatchRequest = match parse_body(&request.body) {
                    Ok(Some(batch)) => batch,
                    Ok(None) => {
                        return ApiResponse::error(400, "request body with an offset is required");
                    }
                    Err(message) => return ApiResponse::error(400, message),
                };
                match self.optimizer.optimize_batch(batch).await {
                    Ok(response) => ApiResponse::ok(&response),
                    Err(e) => e.into(),
                }
            }
            Route::CleanupOldSizes => {
                match parse_body::<serde_json::Map<String, Value>>(&request.body) {
                    Ok(None) => {}
                    Ok(Some(map)) if map.is_empty() => {}
                    Ok(Some(_)) => {
                        return ApiResponse::error(400, "cleanup-old-sizes takes no parameters");
                    }
                    Err(message) => return ApiResponse::error(400, message),
                }
                match self.optimizer.cleanup_old_sizes().await {
                    Ok(response) => ApiResponse::ok(&response),
                    Err(e) => e.into(),
                }
            }
        }
    }

    fn route(&self, raw: &str) -> Option<Route> {
        let path = raw.split(['?', '#']).next().unwrap_or_default();
        let path = path.strip_prefix(self.mount.as_str())?;
        let path = path.trim_end_matches('/');
        Route::from_path(path)
    }
}

/// `Ok(None)` for an empty or whitespace-only body.
fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<Option<T>, String> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| format!("malformed request body: {e}"))
}
