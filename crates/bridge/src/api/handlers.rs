//! HTTP API request handlers

use crate::api::extract::CnlForm;
use crate::app::AppState;
use crate::cnl::{self, CnlSubmission};
use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use types::{
    utils::sanitize_filename, Accepted, BridgeError, BufferDetails, ErrorKind, LinkSubmission,
    ReplayOutcome, SystemStatus,
};
use uuid::Uuid;

type ApiResult = Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)>;

const DASHBOARD_SOURCE: &str = "dashboard";

/// `/downloads/links` accepts a bare array or a package object
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum LinksBody {
    Bare(Vec<String>),
    Package(LinkSubmission),
}

/// Map a bridge error onto an HTTP status and JSON body
pub fn error_response(err: &BridgeError) -> (StatusCode, Json<Value>) {
    let status = match err.kind() {
        ErrorKind::InvalidSubmission => StatusCode::BAD_REQUEST,
        ErrorKind::RemoteRejected => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
        ErrorKind::Unreachable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Storage | ErrorKind::Config | ErrorKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    if status.is_server_error() {
        tracing::error!(error = %err, "Request failed");
    }

    (status, Json(json!({ "error": err.to_string() })))
}

fn accepted_body(accepted: &Accepted) -> Value {
    match accepted {
        Accepted::Delivered => json!({ "status": accepted.status_text() }),
        Accepted::Buffered { reason, key } => json!({
            "status": accepted.status_text(),
            "reason": reason,
            "id": key,
        }),
    }
}

/// Submit links from the dashboard or extension
pub async fn submit_links(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LinksBody>,
) -> ApiResult {
    let mut submission = match body {
        LinksBody::Bare(links) => LinkSubmission {
            links,
            ..LinkSubmission::default()
        },
        LinksBody::Package(submission) => submission,
    };
    submission.source.get_or_insert_with(|| DASHBOARD_SOURCE.to_string());

    let accepted = state
        .intake
        .submit_links(submission)
        .await
        .map_err(|e| error_response(&e))?;

    Ok((StatusCode::OK, Json(accepted_body(&accepted))))
}

/// Upload a container file (multipart field `file`)
pub async fn add_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult {
    let invalid = |message: String| error_response(&BridgeError::InvalidSubmission(message));

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| invalid(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let raw_name = field.file_name().unwrap_or_default().to_string();
        let payload = field
            .bytes()
            .await
            .map_err(|e| invalid(format!("Failed to read upload: {}", e)))?;

        let accepted = state
            .intake
            .submit_container(&raw_name, payload.to_vec())
            .await
            .map_err(|e| error_response(&e))?;

        let (status, filename) = match &accepted {
            Accepted::Delivered => ("added", sanitize_filename(&raw_name).unwrap_or(raw_name)),
            Accepted::Buffered { key, .. } => ("buffered", key.clone()),
        };

        return Ok((StatusCode::OK, Json(json!({ "status": status, "filename": filename }))));
    }

    Err(invalid("Missing multipart field 'file'".to_string()))
}

/// Click'n'Load submission forwarded by the extension or posted by a page
pub async fn cnl_submit(
    State(state): State<Arc<AppState>>,
    Path(subpath): Path<String>,
    CnlForm(fields): CnlForm,
) -> Response {
    let result = match cnl::parse_submission(&subpath, &fields) {
        Ok(CnlSubmission::Links(submission)) => state.intake.submit_links(submission).await,
        Ok(CnlSubmission::Container { filename, payload }) => {
            state.intake.submit_container(&filename, payload).await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(accepted) => {
            tracing::info!(endpoint = %subpath, outcome = accepted.status_text(), "CNL submission accepted");
            plain_text(StatusCode::OK, "success")
        }
        Err(e) => {
            tracing::warn!(endpoint = %subpath, error = %e, "CNL submission failed");
            let (status, _) = error_response(&e);
            plain_text(status, "failed")
        }
    }
}

pub async fn cnl_probe() -> Response {
    plain_text(StatusCode::OK, cnl::PROBE_RESPONSE)
}

pub async fn cnl_jdcheck() -> Response {
    (
        [(header::CONTENT_TYPE, "application/javascript")],
        cnl::JDCHECK_RESPONSE,
    )
        .into_response()
}

pub async fn cnl_crossdomain() -> Response {
    (
        [(header::CONTENT_TYPE, "application/xml")],
        cnl::CROSSDOMAIN_POLICY,
    )
        .into_response()
}

fn plain_text(status: StatusCode, body: &'static str) -> Response {
    (status, [(header::CONTENT_TYPE, "text/plain")], body).into_response()
}

/// Connectivity and buffer summary
pub async fn system_status(State(state): State<Arc<AppState>>) -> ApiResult {
    let snapshot = state.monitor.snapshot().await;
    let buffer_count = state.store.count().await.map_err(|e| error_response(&e))?;

    let status = SystemStatus {
        jd_online: snapshot.online,
        buffer_count,
        last_probe_at: snapshot.last_probe_at,
    };

    Ok((StatusCode::OK, Json(json!(status))))
}

/// Full buffer listing
pub async fn buffer_details(State(state): State<Arc<AppState>>) -> ApiResult {
    let packages = state.store.list_packages().await.map_err(|e| error_response(&e))?;
    let dlc_files = state.store.list_containers().await.map_err(|e| error_response(&e))?;

    Ok((
        StatusCode::OK,
        Json(json!(BufferDetails { packages, dlc_files })),
    ))
}

/// Manual replay trigger
pub async fn replay_buffer(State(state): State<Arc<AppState>>) -> ApiResult {
    // the pass runs detached so a timed out or dropped request cannot cut it short
    let pass = {
        let state = state.clone();
        tokio::spawn(async move { state.dispatcher.replay().await })
    };
    let outcome = pass
        .await
        .map_err(|e| error_response(&BridgeError::Internal(format!("Replay task failed: {}", e))))?
        .map_err(|e| error_response(&e))?;

    let status = match outcome {
        ReplayOutcome::Completed(_) | ReplayOutcome::NothingToReplay => StatusCode::OK,
        ReplayOutcome::AlreadyRunning => StatusCode::CONFLICT,
        ReplayOutcome::Offline => StatusCode::SERVICE_UNAVAILABLE,
    };

    let mut body = json!({
        "status": outcome.status_text(),
        "message": outcome.message(),
    });
    if let ReplayOutcome::Completed(report) = outcome {
        body["report"] = json!(report);
    }

    Ok((status, Json(body)))
}

pub async fn clear_buffer(State(state): State<Arc<AppState>>) -> ApiResult {
    let cleared = state.store.clear().await.map_err(|e| error_response(&e))?;

    tracing::info!(
        deleted_packages = cleared.deleted_packages,
        deleted_dlcs = cleared.deleted_dlcs,
        "Buffer cleared"
    );

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "cleared",
            "deleted_packages": cleared.deleted_packages,
            "deleted_dlcs": cleared.deleted_dlcs,
        })),
    ))
}

pub async fn delete_package(
    State(state): State<Arc<AppState>>,
    Path(package_id): Path<String>,
) -> ApiResult {
    let not_found = || error_response(&BridgeError::not_found(format!("package {}", package_id)));

    let id = Uuid::parse_str(&package_id).map_err(|_| not_found())?;
    let package = state
        .store
        .get_package(id)
        .await
        .map_err(|e| error_response(&e))?
        .ok_or_else(not_found)?;

    if !state.store.remove_package(id).await.map_err(|e| error_response(&e))? {
        return Err(not_found());
    }

    tracing::info!(package_id = %id, "Buffered package deleted");
    Ok((
        StatusCode::OK,
        Json(json!({ "status": "deleted", "deleted": package })),
    ))
}

pub async fn delete_container(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> ApiResult {
    let removed = state
        .store
        .remove_container(&filename)
        .await
        .map_err(|e| error_response(&e))?;

    if !removed {
        return Err(error_response(&BridgeError::not_found(format!("container {}", filename))));
    }

    tracing::info!(filename = %filename, "Buffered container deleted");
    Ok((
        StatusCode::OK,
        Json(json!({ "status": "deleted", "filename": filename })),
    ))
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> ApiResult {
    let db_healthy = state.database.health_check().await.is_ok();
    let jd_online = state.monitor.is_online().await;

    let status = if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    Ok((
        status,
        Json(json!({
            "status": if db_healthy { "healthy" } else { "unhealthy" },
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "components": {
                "database": if db_healthy { "healthy" } else { "unhealthy" },
                "jdownloader": if jd_online { "online" } else { "offline" }
            }
        })),
    ))
}
