//! Expense repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use caseflow_core::{
    CreateExpenseRequest, Error, Expense, ExpenseRepository, QbSyncStatus, Result,
};

/// PostgreSQL implementation of ExpenseRepository.
#[derive(Clone)]
pub struct PgExpenseRepository {
    pool: Pool<Postgres>,
}

impl PgExpenseRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn str_to_sync_status(s: &str) -> QbSyncStatus {
        match s {
            "synced" => QbSyncStatus::Synced,
            "error" => QbSyncStatus::Error,
            _ => QbSyncStatus::NotSynced,
        }
    }

    fn parse_row(row: sqlx::postgres::PgRow) -> Expense {
        Expense {
            id: row.get("id"),
            org_id: row.get("org_id"),
            case_id: row.get("case_id"),
            description: row.get("description"),
            amount_cents: row.get("amount_cents"),
            incurred_on: row.get("incurred_on"),
            qb_sync_status: Self::str_to_sync_status(row.get("qb_sync_status")),
            qb_id: row.get("qb_id"),
            qb_sync_error: row.get("qb_sync_error"),
            synced_at: row.get("synced_at"),
            created_at: row.get("created_at"),
        }
    }
}

const EXPENSE_COLUMNS: &str = "id, org_id, case_id, description, amount_cents, incurred_on, \
                               qb_sync_status, qb_id, qb_sync_error, synced_at, created_at";

#[async_trait]
impl ExpenseRepository for PgExpenseRepository {
    async fn create(&self, org_id: Uuid, req: CreateExpenseRequest) -> Result<Expense> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            "INSERT INTO expenses
                 (id, org_id, case_id, description, amount_cents, incurred_on, qb_sync_status, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, 'not_synced', $7)
             RETURNING {EXPENSE_COLUMNS}"
        ))
        .bind(Uuid::now_v7())
        .bind(org_id)
        .bind(req.case_id)
        .bind(&req.description)
        .bind(req.amount_cents)
        .bind(req.incurred_on.unwrap_or(now))
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(Self::parse_row(row))
    }

    async fn get(&self, org_id: Uuid, id: Uuid) -> Result<Option<Expense>> {
        let row = sqlx::query(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE org_id = $1 AND id = $2"
        ))
        .bind(org_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_row))
    }

    async fn list_for_case(&self, org_id: Uuid, case_id: Uuid) -> Result<Vec<Expense>> {
        let rows = sqlx::query(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses
             WHERE org_id = $1 AND case_id = $2
             ORDER BY incurred_on DESC"
        ))
        .bind(org_id)
        .bind(case_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_row).collect())
    }

    async fn mark_synced(&self, org_id: Uuid, id: Uuid, qb_id: &str) -> Result<Option<Expense>> {
        let row = sqlx::query(&format!(
            "UPDATE expenses SET
                 qb_sync_status = 'synced', qb_id = $3, qb_sync_error = NULL, synced_at = $4
             WHERE org_id = $1 AND id = $2
             RETURNING {EXPENSE_COLUMNS}"
        ))
        .bind(org_id)
        .bind(id)
        .bind(qb_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_row))
    }

    async fn mark_sync_error(
        &self,
        org_id: Uuid,
        id: Uuid,
        error: &str,
    ) -> Result<Option<Expense>> {
        let row = sqlx::query(&format!(
            "UPDATE expenses SET qb_sync_status = 'error', qb_sync_error = $3
             WHERE org_id = $1 AND id = $2
             RETURNING {EXPENSE_COLUMNS}"
        ))
        .bind(org_id)
        .bind(id)
        .bind(error)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_status_parse() {
        assert_eq!(
            PgExpenseRepository::str_to_sync_status("synced"),
            QbSyncStatus::Synced
        );
        assert_eq!(
            PgExpenseRepository::str_to_sync_status("error"),
            QbSyncStatus::Error
        );
        assert_eq!(
            PgExpenseRepository::str_to_sync_status("not_synced"),
            QbSyncStatus::NotSynced
        );
        // Unknown values fall back to not_synced
        assert_eq!(
            PgExpenseRepository::str_to_sync_status("garbage"),
            QbSyncStatus::NotSynced
        );
    }
}
