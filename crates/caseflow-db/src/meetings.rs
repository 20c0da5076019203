//! Meeting/call-recording repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use caseflow_core::{
    CreateShareRequest, Error, Meeting, MeetingRepository, MeetingShare, Result,
};

/// PostgreSQL implementation of MeetingRepository.
#[derive(Clone)]
pub struct PgMeetingRepository {
    pool: Pool<Postgres>,
}

impl PgMeetingRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_meeting(row: sqlx::postgres::PgRow) -> Meeting {
        Meeting {
            id: row.get("id"),
            org_id: row.get("org_id"),
            case_id: row.get("case_id"),
            owner_id: row.get("owner_id"),
            title: row.get("title"),
            transcript: row.get("transcript"),
            analysis: row.get("analysis"),
            recorded_at: row.get("recorded_at"),
            created_at: row.get("created_at"),
        }
    }

    fn parse_share(row: sqlx::postgres::PgRow) -> MeetingShare {
        MeetingShare {
            id: row.get("id"),
            meeting_id: row.get("meeting_id"),
            member_id: row.get("member_id"),
            expires_at: row.get("expires_at"),
            created_at: row.get("created_at"),
        }
    }
}

const MEETING_COLUMNS: &str =
    "id, org_id, case_id, owner_id, title, transcript, analysis, recorded_at, created_at";

#[async_trait]
impl MeetingRepository for PgMeetingRepository {
    async fn get(&self, org_id: Uuid, id: Uuid) -> Result<Option<Meeting>> {
        let row = sqlx::query(&format!(
            "SELECT {MEETING_COLUMNS} FROM meetings WHERE org_id = $1 AND id = $2"
        ))
        .bind(org_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_meeting))
    }

    async fn list(&self, org_id: Uuid, limit: i64) -> Result<Vec<Meeting>> {
        let rows = sqlx::query(&format!(
            "SELECT {MEETING_COLUMNS} FROM meetings WHERE org_id = $1
             ORDER BY recorded_at DESC LIMIT $2"
        ))
        .bind(org_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_meeting).collect())
    }

    async fn list_accessible(
        &self,
        org_id: Uuid,
        member_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Meeting>> {
        // The share predicate mirrors MeetingShare::is_active.
        let rows = sqlx::query(&format!(
            "SELECT {MEETING_COLUMNS} FROM meetings
             WHERE org_id = $1
               AND (owner_id = $2 OR EXISTS (
                   SELECT 1 FROM meeting_shares s
                   WHERE s.meeting_id = meetings.id
                     AND s.member_id = $2
                     AND (s.expires_at IS NULL OR s.expires_at > $3)
               ))
             ORDER BY recorded_at DESC LIMIT $4"
        ))
        .bind(org_id)
        .bind(member_id)
        .bind(Utc::now())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_meeting).collect())
    }

    async fn set_analysis(&self, org_id: Uuid, id: Uuid, analysis: &JsonValue) -> Result<bool> {
        let result = sqlx::query("UPDATE meetings SET analysis = $3 WHERE org_id = $1 AND id = $2")
            .bind(org_id)
            .bind(id)
            .bind(analysis)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    }

    async fn shares_for(&self, meeting_id: Uuid) -> Result<Vec<MeetingShare>> {
        let rows = sqlx::query(
            "SELECT id, meeting_id, member_id, expires_at, created_at
             FROM meeting_shares WHERE meeting_id = $1",
        )
        .bind(meeting_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_share).collect())
    }

    async fn create_share(
        &self,
        meeting_id: Uuid,
        req: CreateShareRequest,
    ) -> Result<MeetingShare> {
        let row = sqlx::query(
            "INSERT INTO meeting_shares (id, meeting_id, member_id, expires_at, created_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, meeting_id, member_id, expires_at, created_at",
        )
        .bind(Uuid::now_v7())
        .bind(meeting_id)
        .bind(req.member_id)
        .bind(req.expires_at)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(Self::parse_share(row))
    }

    async fn delete_share(&self, meeting_id: Uuid, share_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM meeting_shares WHERE meeting_id = $1 AND id = $2")
            .bind(meeting_id)
            .bind(share_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
