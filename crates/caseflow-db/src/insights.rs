//! AI task insight repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use caseflow_core::{
    AiTaskInsight, Error, InsightCounts, InsightRepository, InsightSource, InsightStatus, Result,
};

/// PostgreSQL implementation of InsightRepository.
#[derive(Clone)]
pub struct PgInsightRepository {
    pool: Pool<Postgres>,
}

impl PgInsightRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn source_to_str(source: InsightSource) -> &'static str {
        match source {
            InsightSource::Document => "document",
            InsightSource::Transcript => "transcript",
            InsightSource::Email => "email",
            InsightSource::Chat => "chat",
        }
    }

    fn str_to_source(s: &str) -> InsightSource {
        match s {
            "transcript" => InsightSource::Transcript,
            "email" => InsightSource::Email,
            "chat" => InsightSource::Chat,
            _ => InsightSource::Document,
        }
    }

    fn parse_row(row: sqlx::postgres::PgRow) -> AiTaskInsight {
        let status: String = row.get("status");
        AiTaskInsight {
            id: row.get("id"),
            org_id: row.get("org_id"),
            case_id: row.get("case_id"),
            source: Self::str_to_source(row.get("source")),
            suggested_title: row.get("suggested_title"),
            confidence: row.get("confidence"),
            entities: row.get("entities"),
            status: InsightStatus::parse(&status).unwrap_or(InsightStatus::Pending),
            created_at: row.get("created_at"),
            reviewed_at: row.get("reviewed_at"),
            reviewed_by: row.get("reviewed_by"),
        }
    }
}

const INSIGHT_COLUMNS: &str = "id, org_id, case_id, source, suggested_title, confidence, \
                               entities, status, created_at, reviewed_at, reviewed_by";

#[async_trait]
impl InsightRepository for PgInsightRepository {
    async fn insert(&self, insight: &AiTaskInsight) -> Result<()> {
        sqlx::query(
            "INSERT INTO ai_task_insights
                 (id, org_id, case_id, source, suggested_title, confidence, entities, status, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(insight.id)
        .bind(insight.org_id)
        .bind(insight.case_id)
        .bind(Self::source_to_str(insight.source))
        .bind(&insight.suggested_title)
        .bind(insight.confidence)
        .bind(&insight.entities)
        .bind(insight.status.as_str())
        .bind(insight.created_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(())
    }

    async fn get(&self, org_id: Uuid, id: Uuid) -> Result<Option<AiTaskInsight>> {
        let row = sqlx::query(&format!(
            "SELECT {INSIGHT_COLUMNS} FROM ai_task_insights WHERE org_id = $1 AND id = $2"
        ))
        .bind(org_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_row))
    }

    async fn list(
        &self,
        org_id: Uuid,
        status: Option<InsightStatus>,
        limit: i64,
    ) -> Result<Vec<AiTaskInsight>> {
        let rows = sqlx::query(&format!(
            "SELECT {INSIGHT_COLUMNS} FROM ai_task_insights
             WHERE org_id = $1 AND ($2::text IS NULL OR status = $2)
             ORDER BY created_at DESC LIMIT $3"
        ))
        .bind(org_id)
        .bind(status.map(|s| s.as_str()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_row).collect())
    }

    async fn counts(&self, org_id: Uuid) -> Result<InsightCounts> {
        let row = sqlx::query(
            "SELECT
                 COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                 COUNT(*) FILTER (WHERE status = 'accepted') AS accepted,
                 COUNT(*) FILTER (WHERE status = 'rejected') AS rejected,
                 COUNT(*) FILTER (WHERE status = 'auto_applied') AS auto_applied,
                 COUNT(*) AS total
             FROM ai_task_insights WHERE org_id = $1",
        )
        .bind(org_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(InsightCounts {
            pending: row.get("pending"),
            accepted: row.get("accepted"),
            rejected: row.get("rejected"),
            auto_applied: row.get("auto_applied"),
            total: row.get("total"),
        })
    }

    async fn review(
        &self,
        org_id: Uuid,
        id: Uuid,
        status: InsightStatus,
        new_title: Option<&str>,
        reviewed_by: Uuid,
    ) -> Result<Option<AiTaskInsight>> {
        let row = sqlx::query(&format!(
            "UPDATE ai_task_insights SET
                 status = $3,
                 suggested_title = COALESCE($4, suggested_title),
                 reviewed_at = $5,
                 reviewed_by = $6
             WHERE org_id = $1 AND id = $2
             RETURNING {INSIGHT_COLUMNS}"
        ))
        .bind(org_id)
        .bind(id)
        .bind(status.as_str())
        .bind(new_title)
        .bind(Utc::now())
        .bind(reviewed_by)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_row))
    }

    async fn delete(&self, org_id: Uuid, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM ai_task_insights WHERE org_id = $1 AND id = $2")
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
    fn test_source_conversion_roundtrip() {
        for source in [
            InsightSource::Document,
            InsightSource::Transcript,
            InsightSource::Email,
            InsightSource::Chat,
        ] {
            let s = PgInsightRepository::source_to_str(source);
            assert_eq!(PgInsightRepository::str_to_source(s), source);
        }
    }
}
