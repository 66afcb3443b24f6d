//! HTTP request handlers

use std::sync::Arc;

use axum::{
    body::{to_bytes, Bytes},
    extract::{FromRequest, Multipart, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

use crate::device::state::UpdateState;
use crate::errors::AgentError;
use crate::inventory::InventoryMode;
use crate::filesys::file::File;
use crate::models::service::{
    ActionScope, LogLine, ManagedService, SshKey, UpdateCandidate, WifiCredential,
};
use crate::server::payload::{form_value, parse_service_action, WifiRequest, SSH_KEY_FIELD};
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Multipart field carrying the firmware bundle
const BUNDLE_FIELD: &str = "bundle";

/// Largest accepted `/ssh-setkey` body
const SSH_FORM_LIMIT: usize = 64 * 1024;

type HandlerError = (StatusCode, String);

/// Translate an error into a response, logging it
fn failure(context: &str, err: AgentError) -> HandlerError {
    let status = match &err {
        AgentError::ValidationError(_) => StatusCode::BAD_REQUEST,
        AgentError::AlreadyUpdating => StatusCode::CONFLICT,
        AgentError::ExecutionError { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error!("{} failed: {}", context, err);
    (status, err.to_string())
}

/// Plain 404 used for unsupported methods on dual-purpose endpoints
pub async fn not_found() -> impl IntoResponse {
    StatusCode::NOT_FOUND
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "mapiod".to_string(),
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: UpdateState,
}

/// Update state handler
pub async fn status_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(StatusResponse {
        status: state.orchestrator.get_status(),
    })
}

#[derive(Debug, Serialize)]
pub struct OsVersionResponse {
    pub os_version: String,
}

/// OS version handler
pub async fn os_version_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<impl IntoResponse, HandlerError> {
    let os_version = state
        .orchestrator
        .get_os_version()
        .await
        .map_err(|e| failure("Reading OS version", e))?;
    Ok(Json(OsVersionResponse { os_version }))
}

// ================================== WIFI ====================================== //

pub async fn wifi_ack() -> impl IntoResponse {
    (StatusCode::OK, "wifi")
}

/// Wifi setup handler. An empty password is acknowledged without touching
/// the network configuration.
pub async fn wifi_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<WifiRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    info!("Setup wifi network {:?}", request.selected_wifi);
    let credential = WifiCredential {
        ssid: request.selected_wifi,
        passphrase: request.password,
    };

    match state.orchestrator.configure_wifi(credential).await {
        Ok(report) => {
            debug!("Network activation report: {:?}", report);
            Ok((StatusCode::OK, "wifi"))
        }
        Err(AgentError::ValidationError(reason)) => {
            warn!("Wifi configuration skipped: {}", reason);
            Ok((StatusCode::OK, "wifi"))
        }
        Err(e) => Err(failure("Wifi configuration", e)),
    }
}

#[derive(Debug, Serialize)]
pub struct NetworkEntry {
    pub name: String,
}

/// Wifi scan handler
pub async fn scan_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<impl IntoResponse, HandlerError> {
    let networks = state
        .orchestrator
        .scan_wifi()
        .await
        .map_err(|e| failure("Wifi scan", e))?;
    let entries: Vec<NetworkEntry> = networks
        .into_iter()
        .map(|name| NetworkEntry { name })
        .collect();
    Ok(Json(entries))
}

// ================================ SERVICES ==================================== //

async fn apply_action(
    state: &ServerState,
    scope: ActionScope,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(), HandlerError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let request =
        parse_service_action(content_type, body).map_err(|e| failure("Service action", e))?;
    info!(
        "Service action {:?} on {:?}",
        request.select_action, request.selected_services
    );

    let report = state
        .orchestrator
        .apply_service_action(&request.selected_services, &request.select_action, scope)
        .await
        .map_err(|e| failure("Service action", e))?;
    if !report.is_success() {
        warn!("Service action finished with failures: {:?}", report);
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct DesiredView {
    pub name: String,
    pub image: String,
    pub version: String,
}

impl From<ManagedService> for DesiredView {
    fn from(service: ManagedService) -> Self {
        Self {
            name: service.name,
            image: service.image,
            version: service.version,
        }
    }
}

/// Desired services handler
pub async fn compose_list_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<Vec<DesiredView>>, HandlerError> {
    let services = state
        .orchestrator
        .list_services(InventoryMode::Desired)
        .await
        .map_err(|e| failure("Listing desired services", e))?;
    Ok(Json(services.into_iter().map(DesiredView::from).collect()))
}

/// Pull / recreate handler
pub async fn compose_action_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, HandlerError> {
    apply_action(&state, ActionScope::Compose, &headers, &body).await?;
    Ok((StatusCode::OK, "docker"))
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct ContainerView {
    pub name: String,
    pub status: String,
    pub port: String,
}

impl From<ManagedService> for ContainerView {
    fn from(service: ManagedService) -> Self {
        Self {
            name: service.name,
            status: service.status,
            port: service.ports.join(", "),
        }
    }
}

/// Running containers handler
pub async fn docker_list_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<Vec<ContainerView>>, HandlerError> {
    let services = state
        .orchestrator
        .list_services(InventoryMode::RuntimeOnly)
        .await
        .map_err(|e| failure("Listing containers", e))?;
    Ok(Json(services.into_iter().map(ContainerView::from).collect()))
}

/// Container lifecycle handler
pub async fn docker_action_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, HandlerError> {
    apply_action(&state, ActionScope::Runtime, &headers, &body).await?;
    Ok((StatusCode::OK, "docker"))
}

/// Available container updates handler
pub async fn docker_update_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<Vec<UpdateCandidate>>, HandlerError> {
    let candidates = state
        .orchestrator
        .list_update_candidates()
        .await
        .map_err(|e| failure("Checking container updates", e))?;
    Ok(Json(candidates))
}

// ================================ FIRMWARE ==================================== //

pub async fn update_ack() -> impl IntoResponse {
    (StatusCode::OK, "update")
}

fn invalid_multipart(err: impl std::fmt::Display) -> AgentError {
    AgentError::ValidationError(format!("malformed multipart body: {}", err))
}

/// Stream the bundle field into `upload`, returning the number of bytes
/// written
async fn receive_bundle(multipart: &mut Multipart, upload: &File) -> Result<u64, AgentError> {
    while let Some(mut field) = multipart.next_field().await.map_err(invalid_multipart)? {
        if field.name() != Some(BUNDLE_FIELD) {
            continue;
        }
        if let Some(dir) = upload.parent() {
            dir.create().await?;
        }
        let mut writer = upload.create_writer().await?;
        let mut size = 0u64;
        while let Some(chunk) = field.chunk().await.map_err(invalid_multipart)? {
            writer.write_all(&chunk).await?;
            size += chunk.len() as u64;
        }
        writer.sync_all().await?;
        return Ok(size);
    }
    Err(AgentError::ValidationError(format!(
        "missing multipart field `{}`",
        BUNDLE_FIELD
    )))
}

/// Firmware upload handler. The bundle is streamed to disk; the device
/// reboots once the installer returns, so the acknowledgment is usually
/// never delivered.
pub async fn update_handler(
    State(state): State<Arc<ServerState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HandlerError> {
    if state.orchestrator.get_status() == UpdateState::Updating {
        return Err(failure("Firmware upload", AgentError::AlreadyUpdating));
    }

    let upload = state.upload_file();
    let installed = async {
        let size = receive_bundle(&mut multipart, &upload).await?;
        info!("Received firmware bundle ({} bytes)", size);
        state.orchestrator.install_firmware(upload.path()).await
    }
    .await;

    match installed {
        Ok(token) => {
            info!("Firmware install {} handed over to reboot", token.id);
            Ok((StatusCode::OK, "update"))
        }
        Err(e) => {
            if let Err(cleanup) = upload.remove().await {
                warn!("Could not remove upload {:?}: {}", upload.path(), cleanup);
            }
            Err(failure("Firmware install", e))
        }
    }
}

// ================================== SSH ======================================= //

pub async fn ssh_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "ssh-setkey")
}

/// Key posted as a multipart or urlencoded form field, or as a query
/// argument
async fn read_user_key(request: Request) -> Option<String> {
    let from_query = request
        .uri()
        .query()
        .and_then(|query| form_value(query.as_bytes(), SSH_KEY_FIELD));
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.trim_start().starts_with("multipart/form-data"))
        .unwrap_or(false);

    let from_body = if is_multipart {
        match Multipart::from_request(request, &()).await {
            Ok(mut multipart) => read_text_field(&mut multipart, SSH_KEY_FIELD).await,
            Err(e) => {
                debug!("Unreadable multipart SSH key form: {}", e);
                None
            }
        }
    } else {
        match to_bytes(request.into_body(), SSH_FORM_LIMIT).await {
            Ok(body) => form_value(&body, SSH_KEY_FIELD),
            Err(e) => {
                debug!("Unreadable SSH key form: {}", e);
                None
            }
        }
    };
    from_body.or(from_query)
}

async fn read_text_field(multipart: &mut Multipart, name: &str) -> Option<String> {
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some(name) {
            return field.text().await.ok();
        }
    }
    None
}

/// SSH key handler. A missing, empty or unreadable key answers 404.
pub async fn ssh_setkey_handler(
    State(state): State<Arc<ServerState>>,
    request: Request,
) -> Result<impl IntoResponse, HandlerError> {
    let Some(key) = read_user_key(request).await else {
        warn!("SSH key request without `{}`", SSH_KEY_FIELD);
        return Ok((StatusCode::NOT_FOUND, "ssh-setkey"));
    };

    match state.orchestrator.add_ssh_key(SshKey(key)).await {
        Ok(()) => Ok((StatusCode::OK, "ssh-setkey")),
        Err(AgentError::ValidationError(reason)) => {
            warn!("SSH key rejected: {}", reason);
            Ok((StatusCode::NOT_FOUND, "ssh-setkey"))
        }
        Err(e) => Err(failure("Adding SSH key", e)),
    }
}

// ================================== LOGS ====================================== //

/// Compose logs handler
pub async fn logs_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<Vec<LogLine>>, HandlerError> {
    let lines = state
        .orchestrator
        .tail_logs(state.log_tail_lines)
        .await
        .map_err(|e| failure("Reading logs", e))?;
    debug!("Returning {} log lines", lines.len());
    Ok(Json(lines))
}
