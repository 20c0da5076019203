//! Document and folder repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use caseflow_core::{
    parse_folder_ref, CreateDocumentRequest, CreateFolderRequest, Document, DocumentRepository,
    Error, Folder, Result,
};

/// PostgreSQL implementation of DocumentRepository.
#[derive(Clone)]
pub struct PgDocumentRepository {
    pool: Pool<Postgres>,
}

impl PgDocumentRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_folder(row: sqlx::postgres::PgRow) -> Folder {
        Folder {
            id: row.get("id"),
            org_id: row.get("org_id"),
            case_id: row.get("case_id"),
            parent_id: row.get("parent_id"),
            name: row.get("name"),
            created_at: row.get("created_at"),
        }
    }

    fn parse_document(row: sqlx::postgres::PgRow) -> Document {
        Document {
            id: row.get("id"),
            org_id: row.get("org_id"),
            case_id: row.get("case_id"),
            folder_id: row.get("folder_id"),
            name: row.get("name"),
            content_type: row.get("content_type"),
            size_bytes: row.get("size_bytes"),
            storage_key: row.get("storage_key"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl DocumentRepository for PgDocumentRepository {
    async fn create_folder(&self, org_id: Uuid, req: CreateFolderRequest) -> Result<Folder> {
        let parent_id = parse_folder_ref(&req.parent)?;

        let row = sqlx::query(
            "INSERT INTO folders (id, org_id, case_id, parent_id, name, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id, org_id, case_id, parent_id, name, created_at",
        )
        .bind(Uuid::now_v7())
        .bind(org_id)
        .bind(req.case_id)
        .bind(parent_id)
        .bind(&req.name)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(Self::parse_folder(row))
    }

    async fn list_folders(&self, org_id: Uuid, parent: Option<Uuid>) -> Result<Vec<Folder>> {
        let rows = sqlx::query(
            "SELECT id, org_id, case_id, parent_id, name, created_at FROM folders
             WHERE org_id = $1 AND parent_id IS NOT DISTINCT FROM $2
             ORDER BY name",
        )
        .bind(org_id)
        .bind(parent)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_folder).collect())
    }

    async fn create_document(&self, org_id: Uuid, req: CreateDocumentRequest) -> Result<Document> {
        let folder_id = parse_folder_ref(&req.folder)?;

        let row = sqlx::query(
            "INSERT INTO documents
                 (id, org_id, case_id, folder_id, name, content_type, size_bytes, storage_key, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING id, org_id, case_id, folder_id, name, content_type, size_bytes, storage_key, created_at",
        )
        .bind(Uuid::now_v7())
        .bind(org_id)
        .bind(req.case_id)
        .bind(folder_id)
        .bind(&req.name)
        .bind(&req.content_type)
        .bind(req.size_bytes)
        .bind(&req.storage_key)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(Self::parse_document(row))
    }

    async fn list_documents(&self, org_id: Uuid, folder: Option<Uuid>) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT id, org_id, case_id, folder_id, name, content_type, size_bytes, storage_key, created_at
             FROM documents
             WHERE org_id = $1 AND folder_id IS NOT DISTINCT FROM $2
             ORDER BY name",
        )
        .bind(org_id)
        .bind(folder)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_document).collect())
    }

    async fn get_document(&self, org_id: Uuid, id: Uuid) -> Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, org_id, case_id, folder_id, name, content_type, size_bytes, storage_key, created_at
             FROM documents WHERE org_id = $1 AND id = $2",
        )
        .bind(org_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_document))
    }

    async fn delete_document(&self, org_id: Uuid, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE org_id = $1 AND id = $2")
            .bind(org_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
