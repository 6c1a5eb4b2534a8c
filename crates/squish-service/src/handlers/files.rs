//! Session file cache handlers.
//!
//! Uploads are raw request bodies with the filename in `X-File-Name`; the
//! bytes are spooled under the configured directory and indexed in the
//! in-memory cache so a follow-up operation (convert, then compress) can
//! reference the same upload by ID.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use crate::auth::ClientSession;
use crate::cache::{CachedFile, FileCache};
use crate::error::ApiError;
use crate::state::AppState;

/// Fallback MIME type when the upload does not declare one.
const DEFAULT_MIME: &str = "application/octet-stream";

/// A cached file as returned to clients.
#[derive(Debug, Serialize)]
pub struct FileMeta {
    /// Cache identifier.
    pub id: String,
    /// Original upload filename.
    pub original_name: String,
    /// Declared MIME type.
    pub mime_type: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// When the file was cached.
    pub stored_at: String,
    /// When the entry stops resolving.
    pub expires_at: String,
}

impl FileMeta {
    fn new(file: &CachedFile, cache: &FileCache) -> Self {
        Self {
            id: file.id.clone(),
            original_name: file.original_name.clone(),
            mime_type: file.mime_type.clone(),
            size_bytes: file.size_bytes,
            stored_at: file.stored_at.to_rfc3339(),
            expires_at: (file.stored_at + cache.ttl()).to_rfc3339(),
        }
    }
}

/// Upload response.
#[derive(Debug, Serialize)]
pub struct FileUploadResponse {
    /// The cached file.
    pub file: FileMeta,
    /// Whether an existing live entry with the same content tuple was
    /// reused instead of storing the body again.
    pub deduplicated: bool,
}

/// `POST /api/files`
///
/// Cache an upload for the session. Identical (name, size, mime) re-uploads
/// within the TTL resolve to the already-cached entry.
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    session: ClientSession,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<FileUploadResponse>, ApiError> {
    let original_name = headers
        .get("x-file-name")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing X-File-Name header".into()))?
        .to_string();

    let mime_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_MIME)
        .to_string();

    if body.is_empty() {
        return Err(ApiError::BadRequest("empty upload body".into()));
    }
    let size_bytes = body.len() as u64;

    // A live duplicate means the client is re-sending the same file within
    // the TTL (typically a convert-then-compress sequence); reuse it.
    if let Some(existing) =
        state
            .cache
            .find_duplicate(&session.session_id, &original_name, size_bytes, &mime_type)
    {
        tracing::debug!(
            session = %session.session_id,
            file_id = %existing.id,
            "Upload deduplicated against cached file"
        );
        return Ok(Json(FileUploadResponse {
            file: FileMeta::new(&existing, &state.cache),
            deduplicated: true,
        }));
    }

    let id = FileCache::file_id(&session.session_id, &original_name, size_bytes, &mime_type);
    let path = state.config.spool_dir.join(&id);

    tokio::fs::write(&path, &body).await.map_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "Failed to spool upload");
        ApiError::Internal("failed to store upload".into())
    })?;

    let (stored, evicted) = state.cache.insert(CachedFile {
        id,
        session: session.session_id,
        original_name,
        mime_type,
        size_bytes,
        path,
        stored_at: state.clock.now(),
    });

    // Capacity eviction happened under the cache lock; unlink the spooled
    // bytes off the request path.
    if !evicted.is_empty() {
        tokio::spawn(async move {
            for file in evicted {
                if let Err(e) = tokio::fs::remove_file(&file.path).await {
                    tracing::debug!(path = %file.path.display(), error = %e, "Failed to unlink evicted file");
                }
            }
        });
    }

    tracing::info!(
        session = %session.session_id,
        file_id = %stored.id,
        size_bytes,
        "Upload cached"
    );

    Ok(Json(FileUploadResponse {
        file: FileMeta::new(&stored, &state.cache),
        deduplicated: false,
    }))
}

/// File listing response.
#[derive(Debug, Serialize)]
pub struct FileListResponse {
    /// Live entries for the session, oldest first.
    pub files: Vec<FileMeta>,
    /// Number of entries.
    pub count: usize,
}

/// `GET /api/files`
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    session: ClientSession,
) -> Result<Json<FileListResponse>, ApiError> {
    let files: Vec<FileMeta> = state
        .cache
        .list_session(&session.session_id)
        .iter()
        .map(|f| FileMeta::new(f, &state.cache))
        .collect();

    let count = files.len();
    Ok(Json(FileListResponse { files, count }))
}

/// `GET /api/files/{id}`
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    session: ClientSession,
    Path(id): Path<String>,
) -> Result<Json<FileMeta>, ApiError> {
    let file = state
        .cache
        .get(&id)
        .filter(|f| f.session == session.session_id)
        .ok_or_else(|| ApiError::NotFound("file not found or expired".into()))?;

    Ok(Json(FileMeta::new(&file, &state.cache)))
}

/// `DELETE /api/files`
///
/// Clear the session's cached files and unlink their spooled bytes.
pub async fn clear_files(
    State(state): State<Arc<AppState>>,
    session: ClientSession,
) -> Result<Json<serde_json::Value>, ApiError> {
    let removed = state.cache.clear_session(&session.session_id);
    let cleared = removed.len();

    for file in removed {
        if let Err(e) = tokio::fs::remove_file(&file.path).await {
            tracing::debug!(path = %file.path.display(), error = %e, "Failed to unlink cleared file");
        }
    }

    tracing::info!(session = %session.session_id, cleared, "Session files cleared");

    Ok(Json(serde_json::json!({ "cleared": cleared })))
}
