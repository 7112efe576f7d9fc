use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use reslock_core::config::RegistryConfig;
use reslock_core::infrastructure_in_memory::InMemoryOrderedStore;
use reslock_core::types::{Holder, ResourceType, SweepReport};
use reslock_core::{LockError, LockRegistry};

use crate::handlers::*;

pub type AppState = Arc<LockRegistry>;

type ApiResult<T> = Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiResponse<T>>)>;

pub async fn run(host: &str, port: u16, storage: &str, default_ttl: u64) {
    let registry = match create_registry(storage, default_ttl) {
        Ok(registry) => registry,
        Err(e) => {
            tracing::error!("{}", e);
            match create_registry("memory", default_ttl) {
                Ok(registry) => {
                    tracing::warn!("Falling back to in-memory storage.");
                    registry
                }
                Err(e) => {
                    tracing::error!("{}", e);
                    return;
                }
            }
        }
    };

    let app = router(Arc::new(registry));
    let addr = format!("{}:{}", host, port);

    if std::env::var("RESLOCK_API_KEY").is_ok() {
        tracing::info!("🔐 API key authentication enabled");
    } else {
        tracing::warn!("⚠️  No RESLOCK_API_KEY set — server is open (dev mode)");
    }

    tracing::info!("🔒 reslock server starting on http://{}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        // Health is always open (no auth)
        .route("/health", get(health))
        // Protected routes
        .route("/locks", post(acquire_lock))
        .route("/locks/{resource_type}", get(locked_resources))
        .route("/locks/{resource_type}/{resource_id}", get(holders))
        .route(
            "/locks/{resource_type}/{resource_id}/{user_id}",
            get(lock_expiry).delete(release_lock),
        )
        .route("/sweep", post(sweep))
        .layer(middleware::from_fn(auth_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ─── Auth Middleware ────────────────────────────────────────────────────────

async fn auth_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // If no API key is configured, allow all requests (dev mode)
    let expected_key = match std::env::var("RESLOCK_API_KEY") {
        Ok(key) if !key.is_empty() => key,
        _ => return Ok(next.run(request).await),
    };

    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");

    if token == expected_key {
        Ok(next.run(request).await)
    } else {
        tracing::warn!("🚫 Unauthorized request to {}", request.uri().path());
        Err(StatusCode::UNAUTHORIZED)
    }
}

// ─── Handlers ───────────────────────────────────────────────────────────────

fn failure<T: Serialize>(e: LockError) -> (StatusCode, Json<ApiResponse<T>>) {
    let status = status_for(&e);
    if status.is_server_error() {
        tracing::error!(error = %e, "Lock store call failed");
    }
    (status, Json(ApiResponse::err(e.to_string())))
}

fn parse_type<T: Serialize>(
    resource_type: &str,
) -> Result<ResourceType, (StatusCode, Json<ApiResponse<T>>)> {
    ResourceType::new(resource_type).map_err(failure)
}

async fn health(State(registry): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::ok(HealthResponse {
        status: "ok".to_string(),
        default_ttl_secs: registry.default_ttl().as_secs(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

async fn acquire_lock(
    State(registry): State<AppState>,
    Json(req): Json<AcquireLockRequest>,
) -> Result<(StatusCode, Json<ApiResponse<LockResponse>>), (StatusCode, Json<ApiResponse<LockResponse>>)>
{
    if let Err(e) = req.validate() {
        return Err((StatusCode::BAD_REQUEST, Json(ApiResponse::err(e))));
    }
    let resource_type = parse_type(&req.resource_type)?;
    let ttl = req.ttl(registry.default_ttl());

    let expires_at = registry
        .acquire_for(&resource_type, &req.resource_id, &req.user_id, ttl)
        .map_err(failure)?;

    tracing::info!(
        resource_type = %resource_type,
        resource_id = %req.resource_id,
        user_id = %req.user_id,
        expires_at,
        "Lock acquired"
    );
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(LockResponse {
            resource_type: req.resource_type,
            resource_id: req.resource_id,
            user_id: req.user_id,
            expires_at,
        })),
    ))
}

async fn release_lock(
    State(registry): State<AppState>,
    Path((resource_type, resource_id, user_id)): Path<(String, String, String)>,
) -> ApiResult<String> {
    let parsed = parse_type(&resource_type)?;
    registry
        .release(&parsed, &resource_id, &user_id)
        .map_err(failure)?;

    tracing::info!(
        resource_type = %resource_type,
        resource_id = %resource_id,
        user_id = %user_id,
        "Lock released"
    );
    Ok(Json(ApiResponse::ok(format!(
        "Lock on {}:{} released for '{}'",
        resource_type, resource_id, user_id
    ))))
}

async fn holders(
    State(registry): State<AppState>,
    Path((resource_type, resource_id)): Path<(String, String)>,
) -> ApiResult<HoldersResponse> {
    let parsed = parse_type(&resource_type)?;
    let holders: Vec<Holder> = registry
        .holder_entries(&parsed, &resource_id)
        .map_err(failure)?;

    Ok(Json(ApiResponse::ok(HoldersResponse {
        resource_type,
        resource_id,
        holders,
    })))
}

async fn locked_resources(
    State(registry): State<AppState>,
    Path(resource_type): Path<String>,
) -> ApiResult<LockedResourcesResponse> {
    let parsed = parse_type(&resource_type)?;
    let resource_ids = registry.locked_resources(&parsed).map_err(failure)?;

    Ok(Json(ApiResponse::ok(LockedResourcesResponse {
        resource_type,
        resource_ids,
    })))
}

async fn lock_expiry(
    State(registry): State<AppState>,
    Path((resource_type, resource_id, user_id)): Path<(String, String, String)>,
) -> ApiResult<ExpiryResponse> {
    let parsed = parse_type(&resource_type)?;
    match registry
        .expiry_of(&parsed, &resource_id, &user_id)
        .map_err(failure)?
    {
        Some(expires_at) => Ok(Json(ApiResponse::ok(ExpiryResponse {
            user_id,
            expires_at,
        }))),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ApiResponse::err(format!(
                "'{}' holds no lock on {}:{}",
                user_id, resource_type, resource_id
            ))),
        )),
    }
}

async fn sweep(
    State(registry): State<AppState>,
    Json(req): Json<SweepRequest>,
) -> ApiResult<SweepReport> {
    let parsed = parse_type(&req.resource_type)?;
    let report = registry
        .sweep(&parsed, req.resource_id.as_deref())
        .map_err(failure)?;

    tracing::info!(
        resource_type = %parsed,
        reaped = report.total(),
        "Expired locks swept"
    );
    Ok(Json(ApiResponse::ok(report)))
}

// ─── Storage Backend Selection ──────────────────────────────────────────────

pub fn create_registry(storage: &str, default_ttl: u64) -> Result<LockRegistry, String> {
    let config = RegistryConfig {
        default_ttl_secs: default_ttl,
        ..RegistryConfig::default()
    };

    if storage == "memory" {
        tracing::info!("💾 Storage backend: in-memory (locks will not persist)");
        LockRegistry::with_config(Arc::new(InMemoryOrderedStore::new()), &config)
            .map_err(|e| e.to_string())
    } else if let Some(path) = storage.strip_prefix("sqlite:") {
        #[cfg(feature = "sqlite")]
        {
            tracing::info!("💾 Storage backend: SQLite ({})", path);
            LockRegistry::with_sqlite(path, &config)
                .map_err(|e| format!("Failed to open SQLite database at '{}': {}", path, e))
        }
        #[cfg(not(feature = "sqlite"))]
        {
            let _ = path;
            Err("SQLite storage requested but `sqlite` feature is not enabled. \
                 Rebuild with: cargo build --features sqlite"
                .to_string())
        }
    } else {
        Err(format!(
            "Unknown storage backend: '{}'. Use 'memory' or 'sqlite:<path>'",
            storage
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> Router {
        router(Arc::new(create_registry("memory", 600).unwrap()))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        let request = builder
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_acquire_query_release_over_http() {
        let app = app();

        let (status, body) = call(
            &app,
            "POST",
            "/locks",
            Some(r#"{"resource_type":"Order","resource_id":42,"user_id":7,"ttl_secs":60}"#),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["resource_id"], "42");

        let (status, body) = call(&app, "GET", "/locks/Order/42", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["holders"][0]["user_id"], "7");

        let (_, body) = call(&app, "GET", "/locks/Order", None).await;
        assert_eq!(body["data"]["resource_ids"], serde_json::json!(["42"]));

        let (status, _) = call(&app, "GET", "/locks/Order/42/7", None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(&app, "DELETE", "/locks/Order/42/7", None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(&app, "GET", "/locks/Order/42/7", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_bad_requests_are_rejected() {
        let app = app();

        let (status, _) = call(
            &app,
            "POST",
            "/locks",
            Some(r#"{"resource_type":"Order","resource_id":"42","user_id":"7","ttl_secs":0}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&app, "GET", "/locks/Sales%20Order", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health_reports_default_ttl() {
        let (status, body) = call(&app(), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["default_ttl_secs"], 600);
    }

    #[tokio::test]
    async fn test_sweep_reaps_expired_holders_over_http() {
        use reslock_core::clock::ManualClock;

        let clock = ManualClock::new(1_700_000_000_000);
        let store = InMemoryOrderedStore::with_clock(Arc::new(clock.clone()));
        let registry = LockRegistry::new(Arc::new(store)).with_clock(Arc::new(clock.clone()));
        let app = router(Arc::new(registry));

        for (user, ttl) in [(7, 10), (9, 100)] {
            let body = format!(
                r#"{{"resource_type":"Order","resource_id":42,"user_id":{},"ttl_secs":{}}}"#,
                user, ttl
            );
            let (status, _) = call(&app, "POST", "/locks", Some(body.as_str())).await;
            assert_eq!(status, StatusCode::CREATED);
        }

        clock.advance(std::time::Duration::from_secs(20));

        let (status, body) = call(
            &app,
            "POST",
            "/sweep",
            Some(r#"{"resource_type":"Order","resource_id":"42"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["resource_entries"], 1);
        assert_eq!(body["data"]["type_entries"], 0);

        let (_, body) = call(&app, "GET", "/locks/Order/42", None).await;
        assert_eq!(body["data"]["holders"][0]["user_id"], "9");

        let (status, _) = call(&app, "POST", "/sweep", Some(r#"{"resource_type":"a:b"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_unknown_storage_backend_is_an_error() {
        assert!(create_registry("redis://localhost", 600).is_err());
        assert!(create_registry("memory", 0).is_err());
    }
}
