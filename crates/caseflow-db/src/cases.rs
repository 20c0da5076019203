//! Case repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use caseflow_core::{
    Case, CaseRepository, CaseStatus, CreateCaseRequest, Error, Result, UpdateCaseRequest,
};

/// PostgreSQL implementation of CaseRepository.
#[derive(Clone)]
pub struct PgCaseRepository {
    pool: Pool<Postgres>,
}

impl PgCaseRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn status_to_str(status: CaseStatus) -> &'static str {
        match status {
            CaseStatus::Open => "open",
            CaseStatus::Pending => "pending",
            CaseStatus::Closed => "closed",
            CaseStatus::Archived => "archived",
        }
    }

    fn str_to_status(s: &str) -> CaseStatus {
        match s {
            "pending" => CaseStatus::Pending,
            "closed" => CaseStatus::Closed,
            "archived" => CaseStatus::Archived,
            _ => CaseStatus::Open,
        }
    }

    fn parse_row(row: sqlx::postgres::PgRow) -> Case {
        Case {
            id: row.get("id"),
            org_id: row.get("org_id"),
            case_number: row.get("case_number"),
            title: row.get("title"),
            status: Self::str_to_status(row.get("status")),
            parties: row.get("parties"),
            case_type: row.get("case_type"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

const CASE_COLUMNS: &str =
    "id, org_id, case_number, title, status, parties, case_type, created_at, updated_at";

#[async_trait]
impl CaseRepository for PgCaseRepository {
    async fn create(&self, org_id: Uuid, req: CreateCaseRequest) -> Result<Case> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            "INSERT INTO cases (id, org_id, case_number, title, status, parties, case_type, created_at, updated_at)
             VALUES ($1, $2, $3, $4, 'open', $5, $6, $7, $7)
             RETURNING {CASE_COLUMNS}"
        ))
        .bind(Uuid::now_v7())
        .bind(org_id)
        .bind(&req.case_number)
        .bind(&req.title)
        .bind(req.parties.unwrap_or_else(|| serde_json::json!([])))
        .bind(&req.case_type)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(Self::parse_row(row))
    }

    async fn get(&self, org_id: Uuid, id: Uuid) -> Result<Option<Case>> {
        let row = sqlx::query(&format!(
            "SELECT {CASE_COLUMNS} FROM cases WHERE org_id = $1 AND id = $2"
        ))
        .bind(org_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_row))
    }

    async fn list(&self, org_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Case>> {
        let rows = sqlx::query(&format!(
            "SELECT {CASE_COLUMNS} FROM cases WHERE org_id = $1
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(org_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_row).collect())
    }

    async fn update(&self, org_id: Uuid, id: Uuid, req: UpdateCaseRequest) -> Result<Option<Case>> {
        let row = sqlx::query(&format!(
            "UPDATE cases SET
                 title = COALESCE($3, title),
                 status = COALESCE($4, status),
                 parties = COALESCE($5, parties),
                 case_type = COALESCE($6, case_type),
                 updated_at = $7
             WHERE org_id = $1 AND id = $2
             RETURNING {CASE_COLUMNS}"
        ))
        .bind(org_id)
        .bind(id)
        .bind(&req.title)
        .bind(req.status.map(Self::status_to_str))
        .bind(&req.parties)
        .bind(&req.case_type)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_row))
    }

    async fn delete(&self, org_id: Uuid, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cases WHERE org_id = $1 AND id = $2")
            .bind(org_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_conversion_roundtrip() {
        for status in [
            CaseStatus::Open,
            CaseStatus::Pending,
            CaseStatus::Closed,
            CaseStatus::Archived,
        ] {
            let s = PgCaseRepository::status_to_str(status);
            assert_eq!(PgCaseRepository::str_to_status(s), status);
        }
    }

    #[test]
    fn test_unknown_status_falls_back_to_open() {
        assert_eq!(
            PgCaseRepository::str_to_status("corrupted"),
            CaseStatus::Open
        );
    }
}
