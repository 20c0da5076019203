//! Organization, member, and API key repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use caseflow_core::{
    ApiKey, AuthPrincipal, Error, Member, MemberRole, OrgRepository, Organization, Result,
};

/// Prefix identifying caseflow API keys on the wire.
pub const API_KEY_PREFIX: &str = "cf_key_";

/// PostgreSQL implementation of OrgRepository.
#[derive(Clone)]
pub struct PgOrgRepository {
    pool: Pool<Postgres>,
}

impl PgOrgRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn role_to_str(role: MemberRole) -> &'static str {
        role.as_str()
    }

    fn str_to_role(s: &str) -> MemberRole {
        match s {
            "admin" => MemberRole::Admin,
            _ => MemberRole::Member,
        }
    }

    fn parse_member(row: sqlx::postgres::PgRow) -> Member {
        Member {
            id: row.get("id"),
            org_id: row.get("org_id"),
            email: row.get("email"),
            display_name: row.get("display_name"),
            role: Self::str_to_role(row.get("role")),
            created_at: row.get("created_at"),
        }
    }

    /// SHA-256 hex digest of a plaintext key. Only digests are stored.
    pub fn hash_key(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Generate a new plaintext API key with the caseflow prefix.
    pub fn generate_key() -> String {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(40)
            .map(char::from)
            .collect();
        format!("{}{}", API_KEY_PREFIX, suffix)
    }

    /// Create an API key for a member. Returns the record and the
    /// plaintext key, which is not retrievable later.
    pub async fn create_api_key(
        &self,
        org_id: Uuid,
        member_id: Uuid,
        label: &str,
    ) -> Result<(ApiKey, String)> {
        let plaintext = Self::generate_key();
        let key_hash = Self::hash_key(&plaintext);
        let id = Uuid::now_v7();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO api_keys (id, org_id, member_id, label, key_hash, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(id)
        .bind(org_id)
        .bind(member_id)
        .bind(label)
        .bind(&key_hash)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        let key = ApiKey {
            id,
            org_id,
            member_id,
            label: label.to_string(),
            key_hash,
            created_at: now,
            revoked_at: None,
        };
        Ok((key, plaintext))
    }

    /// Revoke an API key.
    pub async fn revoke_api_key(&self, org_id: Uuid, key_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE api_keys SET revoked_at = $3
             WHERE org_id = $1 AND id = $2 AND revoked_at IS NULL",
        )
        .bind(org_id)
        .bind(key_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl OrgRepository for PgOrgRepository {
    async fn get(&self, org_id: Uuid) -> Result<Option<Organization>> {
        let row = sqlx::query("SELECT id, name, created_at FROM organizations WHERE id = $1")
            .bind(org_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.map(|r| Organization {
            id: r.get("id"),
            name: r.get("name"),
            created_at: r.get("created_at"),
        }))
    }

    async fn list_members(&self, org_id: Uuid) -> Result<Vec<Member>> {
        let rows = sqlx::query(
            "SELECT id, org_id, email, display_name, role, created_at
             FROM members WHERE org_id = $1 ORDER BY created_at",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_member).collect())
    }

    async fn add_member(
        &self,
        org_id: Uuid,
        email: &str,
        display_name: Option<&str>,
        role: MemberRole,
    ) -> Result<Member> {
        let row = sqlx::query(
            "INSERT INTO members (id, org_id, email, display_name, role, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id, org_id, email, display_name, role, created_at",
        )
        .bind(Uuid::now_v7())
        .bind(org_id)
        .bind(email)
        .bind(display_name)
        .bind(Self::role_to_str(role))
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(Self::parse_member(row))
    }

    async fn remove_member(&self, org_id: Uuid, member_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM members WHERE org_id = $1 AND id = $2")
            .bind(org_id)
            .bind(member_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    }

    async fn validate_api_key(&self, token: &str) -> Result<Option<AuthPrincipal>> {
        if !token.starts_with(API_KEY_PREFIX) {
            return Ok(None);
        }
        let key_hash = Self::hash_key(token);

        let row = sqlx::query(
            "SELECT k.id AS key_id, k.org_id, k.member_id, m.role
             FROM api_keys k
             JOIN members m ON m.id = k.member_id
             WHERE k.key_hash = $1 AND k.revoked_at IS NULL",
        )
        .bind(&key_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|r| AuthPrincipal::ApiKey {
            key_id: r.get("key_id"),
            org_id: r.get("org_id"),
            member_id: r.get("member_id"),
            role: Self::str_to_role(r.get("role")),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_keys_carry_prefix_and_differ() {
        let a = PgOrgRepository::generate_key();
        let b = PgOrgRepository::generate_key();
        assert!(a.starts_with(API_KEY_PREFIX));
        assert!(b.starts_with(API_KEY_PREFIX));
        assert_ne!(a, b);
        assert_eq!(a.len(), API_KEY_PREFIX.len() + 40);
    }

    #[test]
    fn test_hash_is_stable_and_hex() {
        let h1 = PgOrgRepository::hash_key("cf_key_abc");
        let h2 = PgOrgRepository::hash_key("cf_key_abc");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
        assert!(h1.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(h1, PgOrgRepository::hash_key("cf_key_abd"));
    }
}
