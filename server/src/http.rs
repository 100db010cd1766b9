use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{self, HeaderName, HeaderValue, Method, StatusCode},
    routing::{get, post},
};
use platform_api::{ApiError, ApiResult};
use products_hr::{Directory, DirectoryError, Employee, EmployeePatch, NewEmployee};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, instrument, warn};

use crate::{config::AppConfig, flusher};

#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<Directory>,
    pub config: Arc<AppConfig>,
}

#[derive(Clone, Debug)]
pub struct ServeConfig {
    addr: SocketAddr,
}

impl ServeConfig {
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self {
            addr: SocketAddr::from((host, port)),
        }
    }
}

/// Serve until a shutdown signal arrives, then stop the flusher and write
/// out whatever is still pending.
pub async fn serve(config: ServeConfig, state: AppState) -> anyhow::Result<()> {
    let directory = state.directory.clone();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let flusher = flusher::spawn(
        directory.clone(),
        state.config.flush_interval,
        shutdown_rx,
    );

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    info!(%config.addr, "hr server listening");
    let served = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        })
        .await
        .context("HTTP server error");

    if let Some(handle) = flusher {
        if let Err(err) = handle.await {
            warn!(error = %err, "flusher task ended abnormally");
        }
    }
    final_flush(&directory, served).await
}

/// Write out pending changes once the server has stopped. A failed flush is
/// always logged; it only becomes the result when the server itself exited
/// cleanly.
async fn final_flush(
    directory: &Arc<Directory>,
    served: anyhow::Result<()>,
) -> anyhow::Result<()> {
    match flusher::flush(directory).await {
        Ok(true) => info!("pending changes flushed on shutdown"),
        Ok(false) => {}
        Err(err) => {
            error!(error = ?err, "final flush failed");
            return served.and(Err(err.context("final flush failed")));
        }
    }
    served
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();
    let allow_origin = if allowed.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed)
    };
    CorsLayer::new()
        .allow_headers([http::header::CONTENT_TYPE])
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_origin(allow_origin)
}

pub fn build_router(state: AppState) -> Router {
    let header_name = HeaderName::from_static("x-request-id");
    Router::new()
        .route("/health", get(health_handler))
        .route("/employees", get(list_employees).post(create_employee))
        .route(
            "/employees/{id}",
            get(get_employee)
                .patch(update_employee)
                .delete(delete_employee),
        )
        .route("/admin/flush", post(flush_handler))
        .route("/admin/reload", post(reload_handler))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(header_name.clone(), MakeRequestUuid))
                .layer(PropagateRequestIdLayer::new(header_name))
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.cors_allowed_origins)),
        )
        .with_state(state)
}

fn directory_error(err: DirectoryError) -> ApiError {
    match err {
        DirectoryError::NotFound { .. } => ApiError::NotFound(err.to_string()),
        DirectoryError::AlreadyExists { .. } => ApiError::Conflict(err.to_string()),
        DirectoryError::IdentityChange { .. } => ApiError::InvalidInput(err.to_string()),
        DirectoryError::Store(_) => ApiError::internal(err.into()),
    }
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    department: Option<String>,
}

#[instrument(name = "employees.list", skip(state))]
async fn list_employees(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Json<Vec<Employee>> {
    Json(state.directory.get_all(query.department.as_deref()))
}

#[instrument(name = "employees.get", skip(state))]
async fn get_employee(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Employee>> {
    state
        .directory
        .get(&id)
        .map(Json)
        .ok_or_else(|| directory_error(DirectoryError::NotFound { id }))
}

#[instrument(name = "employees.create", skip_all)]
async fn create_employee(
    State(state): State<AppState>,
    Json(record): Json<NewEmployee>,
) -> ApiResult<(StatusCode, Json<Employee>)> {
    let stored = state.directory.add(record).map_err(directory_error)?;
    Ok((StatusCode::CREATED, Json(stored)))
}

#[instrument(name = "employees.update", skip(state, patch))]
async fn update_employee(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<EmployeePatch>,
) -> ApiResult<Json<Employee>> {
    state
        .directory
        .update(&id, patch)
        .map(Json)
        .map_err(directory_error)
}

#[instrument(name = "employees.delete", skip(state))]
async fn delete_employee(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Employee>> {
    state.directory.delete(&id).map(Json).map_err(directory_error)
}

#[derive(Debug, Serialize)]
struct FlushResponse {
    flushed: bool,
}

#[instrument(name = "admin.flush", skip_all)]
async fn flush_handler(State(state): State<AppState>) -> ApiResult<Json<FlushResponse>> {
    let flushed = flusher::flush(&state.directory).await?;
    Ok(Json(FlushResponse { flushed }))
}

#[derive(Debug, Serialize)]
struct ReloadResponse {
    loaded: usize,
    skipped: usize,
}

#[instrument(name = "admin.reload", skip_all)]
async fn reload_handler(State(state): State<AppState>) -> ApiResult<Json<ReloadResponse>> {
    let directory = state.directory.clone();
    let report = tokio::task::spawn_blocking(move || directory.reload())
        .await
        .context("reload task failed")?
        .map_err(directory_error)?;
    Ok(Json(ReloadResponse {
        loaded: report.loaded,
        skipped: report.skipped,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    ok: bool,
    employees: usize,
    unsaved_changes: bool,
    version: &'static str,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        employees: state.directory.len(),
        unsaved_changes: state.directory.has_unsaved_changes(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for CTRL+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    };
    info!("shutdown signal received");
}
