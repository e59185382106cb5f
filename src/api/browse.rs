//! Server-side file chooser
//!
//! Lists one directory at a time for the UI's browse dialogs. Directories
//! always appear; files are filtered to the requested kind (mp3 for song
//! selection, jpg/jpeg/png for cover selection). Dotfiles are skipped.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

const AUDIO_EXTENSIONS: &[&str] = &["mp3"];
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

#[derive(Debug, Deserialize)]
pub struct BrowseParams {
    /// Directory to list; the server working directory when absent
    pub path: Option<String>,
    /// File filter: "audio", "image", or absent for all files
    pub kind: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BrowseEntry {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
}

#[derive(Debug, Serialize)]
pub struct BrowseResponse {
    /// Canonical path of the listed directory
    pub path: String,
    /// Parent directory, absent at a filesystem root
    pub parent: Option<String>,
    /// Directories first, then matching files, each group sorted by name
    pub entries: Vec<BrowseEntry>,
}

/// GET /files/browse?path=&kind= - list one directory for the UI chooser
pub async fn browse_files(
    State(ctx): State<AppState>,
    Query(params): Query<BrowseParams>,
) -> ApiResult<Json<BrowseResponse>> {
    let extensions = match params.kind.as_deref() {
        None => None,
        Some("audio") => Some(AUDIO_EXTENSIONS),
        Some("image") => Some(IMAGE_EXTENSIONS),
        Some(other) => {
            return Err(ApiError::BadRequest(format!(
                "Unknown browse kind: {}",
                other
            )))
        }
    };

    let dir = match params.path.as_deref().filter(|p| !p.trim().is_empty()) {
        Some(path) => PathBuf::from(path),
        None => ctx.state.work_dir().to_path_buf(),
    };

    let listing = list_directory(&dir, extensions)?;
    Ok(Json(listing))
}

fn list_directory(dir: &Path, extensions: Option<&[&str]>) -> ApiResult<BrowseResponse> {
    if !dir.exists() {
        return Err(ApiError::NotFound(format!(
            "Directory not found: {}",
            dir.display()
        )));
    }
    if !dir.is_dir() {
        return Err(ApiError::BadRequest(format!(
            "Not a directory: {}",
            dir.display()
        )));
    }
    let canonical = dir.canonicalize()?;

    let mut dirs = Vec::new();
    let mut files = Vec::new();
    for entry in std::fs::read_dir(&canonical)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let file_type = match entry.file_type() {
            Ok(file_type) => file_type,
            Err(_) => continue,
        };
        let path = entry.path().display().to_string();

        if file_type.is_dir() {
            dirs.push(BrowseEntry {
                name,
                path,
                is_dir: true,
            });
        } else if matches_kind(&entry.path(), extensions) {
            files.push(BrowseEntry {
                name,
                path,
                is_dir: false,
            });
        }
    }

    dirs.sort_by_key(|e| e.name.to_lowercase());
    files.sort_by_key(|e| e.name.to_lowercase());
    dirs.extend(files);

    Ok(BrowseResponse {
        path: canonical.display().to_string(),
        parent: canonical.parent().map(|p| p.display().to_string()),
        entries: dirs,
    })
}

fn matches_kind(path: &Path, extensions: Option<&[&str]>) -> bool {
    let exts = match extensions {
        Some(exts) => exts,
        None => return true,
    };
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| exts.iter().any(|x| e.eq_ignore_ascii_case(x)))
        .unwrap_or(false)
}
