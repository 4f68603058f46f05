//! HTTP backend: upload intake, transfer metadata, downloads, SMTP settings,
//! and the admin login endpoint

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    Router,
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{StatusCode, header},
    response::{Json, Response},
    routing::{get, post},
};
use base64::Engine;
use chrono::Local;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::archive;
use crate::config::{ServerConfig, SmtpSettings};
use crate::notify::{self, TransferNotification};
use crate::store::{StoredFile, TransferRecord, TransferStore};

const MAIL_WARNING: &str = "The transfer was stored but the notification email could not be sent";

/// Shared state for the backend
pub struct AppState {
    pub config: Mutex<ServerConfig>,
    pub config_path: PathBuf,
    pub store: TransferStore,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(message: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: message.into() }))
}

fn not_found(message: impl Into<String>) -> ApiError {
    (StatusCode::NOT_FOUND, Json(ErrorResponse { error: message.into() }))
}

fn internal_error(message: impl ToString) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse { error: message.to_string() }),
    )
}

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/upload", post(upload))
        .route("/transfer/{id}", get(get_transfer))
        .route("/download/{id}", get(download))
        .route("/api/save-smtp-settings", post(save_smtp_settings))
        .route("/login", post(login))
        .layer(DefaultBodyLimit::disable())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the iTransfer server
pub async fn run_server(config: ServerConfig, config_path: PathBuf, port: Option<u16>) -> Result<()> {
    let port = port.unwrap_or(config.bind_port);
    let data_dir = config.resolve_data_dir()?;

    let store = TransferStore::open(&data_dir)?;
    let state = Arc::new(AppState {
        config: Mutex::new(config),
        config_path,
        store,
    });

    let app = router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, data_dir = %data_dir.display(), "iTransfer server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Keep only the final path component of a client-supplied filename
fn sanitize_filename(raw: &str) -> String {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    if name.is_empty() { "upload".to_string() } else { name.to_string() }
}

#[derive(Serialize)]
struct UploadCreated {
    message: String,
    transfer_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

/// Handle a multipart upload: repeated `files[]` parts, repeated `paths[]`
/// parts in the same order, plus `email` and `sender_email`.
async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadCreated>), ApiError> {
    let mut payloads: Vec<(String, Vec<u8>)> = Vec::new();
    let mut paths: Vec<String> = Vec::new();
    let mut email: Option<String> = None;
    let mut sender_email: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Failed to read multipart field: {}", e)))?
    {
        match field.name().unwrap_or("") {
            "files[]" => {
                let filename = sanitize_filename(field.file_name().unwrap_or("upload"));
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(format!("Failed to read file data: {}", e)))?;
                payloads.push((filename, data.to_vec()));
            }
            "paths[]" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| bad_request(format!("Failed to read path: {}", e)))?;
                paths.push(text);
            }
            "email" => {
                email = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| bad_request(format!("Failed to read email: {}", e)))?,
                );
            }
            "sender_email" => {
                sender_email = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| bad_request(format!("Failed to read sender email: {}", e)))?,
                );
            }
            _ => {}
        }
    }

    if payloads.is_empty() {
        return Err(bad_request("No files provided"));
    }
    let email = match email {
        Some(e) if !e.trim().is_empty() => e,
        _ => return Err(bad_request("Email required")),
    };
    let sender_email = sender_email.unwrap_or_default();

    // Pair each payload with its relative path; files without one land at the root
    let entries: Vec<(String, Vec<u8>)> = payloads
        .into_iter()
        .enumerate()
        .map(|(i, (name, bytes))| {
            let path = paths
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("/{}", name));
            (path, bytes)
        })
        .collect();

    let files: Vec<StoredFile> = entries
        .iter()
        .map(|(path, bytes)| StoredFile {
            name: path.trim_start_matches('/').to_string(),
            size: bytes.len() as u64,
        })
        .collect();

    let transfer_id = Uuid::new_v4().to_string();
    let transfer_dir = state.store.transfer_dir(&transfer_id);
    std::fs::create_dir_all(&transfer_dir).map_err(internal_error)?;

    // Multi-file transfers are packaged as one zip; single files are stored as-is
    let (stored_name, is_archive) = if entries.len() > 1 {
        let name = archive::archive_name(Local::now());
        archive::build_zip(&transfer_dir.join(&name), &entries).map_err(internal_error)?;
        (name, true)
    } else {
        let (path, bytes) = &entries[0];
        let name = sanitize_filename(path);
        tokio::fs::write(transfer_dir.join(&name), bytes)
            .await
            .map_err(internal_error)?;
        (name, false)
    };

    let record = TransferRecord {
        id: transfer_id.clone(),
        stored_name,
        files,
        recipient_email: email.clone(),
        sender_email: sender_email.clone(),
        is_archive,
        created_at: Local::now().to_rfc3339(),
    };
    let file_count = record.files.len();
    state.store.insert(record).map_err(internal_error)?;

    info!(transfer_id = %transfer_id, files = file_count, recipient = %email, "Transfer stored");

    // Notification failure is a partial failure: the upload stays successful
    // and the response carries a warning instead.
    let (public_url, smtp) = {
        let config = state.config.lock().await;
        (config.public_url.clone(), config.smtp.clone())
    };
    let warning = match smtp {
        Some(smtp) => {
            let notification = TransferNotification {
                transfer_id: &transfer_id,
                recipient_email: &email,
                sender_email: &sender_email,
                file_count,
                public_url: &public_url,
            };
            match notify::send_download_link(&smtp, &notification).await {
                Ok(()) => None,
                Err(e) => {
                    error!(transfer_id = %transfer_id, error = %e, "Notification email failed");
                    Some(MAIL_WARNING.to_string())
                }
            }
        }
        None => {
            warn!(transfer_id = %transfer_id, "SMTP is not configured; skipping notification");
            Some(MAIL_WARNING.to_string())
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(UploadCreated {
            message: "Upload successful".to_string(),
            transfer_id,
            warning,
        }),
    ))
}

#[derive(Serialize)]
struct TransferDetails {
    files: Vec<StoredFile>,
}

/// Metadata for the download page
async fn get_transfer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TransferDetails>, ApiError> {
    match state.store.get(&id) {
        Some(record) => Ok(Json(TransferDetails { files: record.files })),
        None => Err(not_found("Transfer not found")),
    }
}

/// Serve the payload (the zip for multi-file transfers) as an attachment
async fn download(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let record = state
        .store
        .get(&id)
        .ok_or_else(|| not_found("Transfer not found"))?;

    let payload_path = state.store.payload_path(&record);
    let content = tokio::fs::read(&payload_path)
        .await
        .map_err(internal_error)?;

    let mime_type = mime_guess::from_path(&record.stored_name)
        .first_or_octet_stream()
        .to_string();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime_type)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", record.stored_name),
        )
        .body(Body::from(content))
        .map_err(internal_error)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SmtpSettingsPayload {
    smtp_server: String,
    smtp_port: u16,
    smtp_user: String,
    smtp_password: String,
    smtp_sender_email: String,
}

#[derive(Serialize)]
struct SavedResponse {
    message: String,
}

/// Persist SMTP settings into the server config file
async fn save_smtp_settings(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SmtpSettingsPayload>,
) -> Result<Json<SavedResponse>, ApiError> {
    let mut config = state.config.lock().await;
    config.smtp = Some(SmtpSettings {
        server: payload.smtp_server,
        port: payload.smtp_port,
        user: payload.smtp_user,
        password: payload.smtp_password,
        sender_email: payload.smtp_sender_email,
    });
    config.save_to_path(&state.config_path).map_err(internal_error)?;

    info!("SMTP settings updated");
    Ok(Json(SavedResponse { message: "SMTP settings saved".to_string() }))
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    token: String,
}

/// Generate a random URL-safe session token
fn generate_token() -> String {
    let token: [u8; 32] = rand::rng().random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(token)
}

/// Admin login gate for the settings area
async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let config = state.config.lock().await;
    if config.verify_admin(&request.username, &request.password) {
        Ok(Json(LoginResponse { token: generate_token() }))
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse { error: "Invalid credentials".to_string() }),
        ))
    }
}
