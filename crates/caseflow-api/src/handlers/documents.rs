//! Document and folder handlers.
//!
//! The wire protocol addresses the top of the hierarchy with the
//! `"root"` sentinel; everything else is a folder UUID.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use caseflow_core::{
    parse_folder_ref, CreateDocumentRequest, CreateFolderRequest, Document, DocumentRepository,
    Folder, ROOT_FOLDER,
};

use crate::auth::OrgScope;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct FolderQuery {
    pub parent: Option<String>,
}

pub async fn list_folders(
    scope: OrgScope,
    State(state): State<AppState>,
    Query(query): Query<FolderQuery>,
) -> Result<Json<Vec<Folder>>, ApiError> {
    let parent = parse_folder_ref(query.parent.as_deref().unwrap_or(ROOT_FOLDER))?;
    let folders = state.db.documents.list_folders(scope.org_id, parent).await?;
    Ok(Json(folders))
}

pub async fn create_folder(
    scope: OrgScope,
    State(state): State<AppState>,
    Json(req): Json<CreateFolderRequest>,
) -> Result<(StatusCode, Json<Folder>), ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Folder name cannot be empty".to_string(),
        ));
    }

    let folder = state.db.documents.create_folder(scope.org_id, req).await?;
    Ok((StatusCode::CREATED, Json(folder)))
}

#[derive(Debug, Deserialize)]
pub struct DocumentQuery {
    pub folder: Option<String>,
}

pub async fn list_documents(
    scope: OrgScope,
    State(state): State<AppState>,
    Query(query): Query<DocumentQuery>,
) -> Result<Json<Vec<Document>>, ApiError> {
    let folder = parse_folder_ref(query.folder.as_deref().unwrap_or(ROOT_FOLDER))?;
    let documents = state
        .db
        .documents
        .list_documents(scope.org_id, folder)
        .await?;
    Ok(Json(documents))
}

/// Record metadata for an uploaded document. The bytes live in the
/// storage service under `storage_key`; this endpoint only persists the
/// record.
pub async fn create_document(
    scope: OrgScope,
    State(state): State<AppState>,
    Json(req): Json<CreateDocumentRequest>,
) -> Result<(StatusCode, Json<Document>), ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Document name cannot be empty".to_string(),
        ));
    }
    if req.size_bytes < 0 {
        return Err(ApiError::BadRequest(
            "Document size cannot be negative".to_string(),
        ));
    }

    let document = state
        .db
        .documents
        .create_document(scope.org_id, req)
        .await?;
    Ok((StatusCode::CREATED, Json(document)))
}

pub async fn get_document(
    scope: OrgScope,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Document>, ApiError> {
    let document = state
        .db
        .documents
        .get_document(scope.org_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Document not found".to_string()))?;
    Ok(Json(document))
}

pub async fn delete_document(
    scope: OrgScope,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let deleted = state.db.documents.delete_document(scope.org_id, id).await?;
    if !deleted {
        return Err(ApiError::NotFound("Document not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
