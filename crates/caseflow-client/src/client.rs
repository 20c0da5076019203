//! Authenticated, typed HTTP client for the caseflow API.
//!
//! Every method performs exactly one HTTP call. There are no retries,
//! no request timeout, and no circuit breaking; callers own those
//! policies.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value as JsonValue};
use thiserror::Error;
use uuid::Uuid;

use caseflow_core::{
    Case, Document, Expense, Folder, InsightCounts, InsightFeedback, Job, Meeting, MeetingShare,
    Member, Organization, Task,
};

/// Normalized client-side error.
#[derive(Debug, Error)]
pub enum ApiClientError {
    /// The server answered with a non-2xx status.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
    /// The request never produced a response.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// No session token could be acquired.
    #[error("no session token: {0}")]
    Token(String),
    /// The response body did not match the expected shape.
    #[error("malformed response: {0}")]
    Decode(String),
}

pub type ClientResult<T> = std::result::Result<T, ApiClientError>;

/// Supplies the bearer token attached to every request.
///
/// Acquisition is async and may fail when no session is active; the
/// failure surfaces as [`ApiClientError::Token`] without any HTTP call
/// being made.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self) -> ClientResult<String>;
}

/// Fixed-token source for tests and service accounts.
pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> ClientResult<String> {
        Ok(self.0.clone())
    }
}

/// Typed caseflow API client, scoped to one organization.
pub struct ApiClient {
    http: Client,
    base_url: String,
    org_id: Uuid,
    tokens: Arc<dyn TokenSource>,
}

impl ApiClient {
    pub fn new(base_url: String, org_id: Uuid, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            org_id,
            tokens,
        }
    }

    pub fn org_id(&self) -> Uuid {
        self.org_id
    }

    async fn request(&self, method: Method, path: &str) -> ClientResult<RequestBuilder> {
        let token = self.tokens.token().await?;
        Ok(self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .header("X-Org-Id", self.org_id.to_string()))
    }

    /// Shared response handler: 2xx resolves to the typed body,
    /// everything else becomes a normalized [`ApiClientError::Api`].
    async fn handle_response<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
        let status = response.status();
        if status.is_success() {
            response
                .json::<T>()
                .await
                .map_err(|e| ApiClientError::Decode(e.to_string()))
        } else {
            Err(Self::error_from(status, response).await)
        }
    }

    /// Response handler for endpoints without a body (204).
    async fn handle_empty(response: Response) -> ClientResult<()> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Self::error_from(status, response).await)
        }
    }

    async fn error_from(status: StatusCode, response: Response) -> ApiClientError {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<JsonValue>(&body)
            .ok()
            .and_then(|v| v["error"].as_str().map(String::from))
            .unwrap_or(body);
        ApiClientError::Api {
            status: status.as_u16(),
            message,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let response = self.request(Method::GET, path).await?.send().await?;
        Self::handle_response(response).await
    }

    async fn post_json<T: DeserializeOwned>(&self, path: &str, body: JsonValue) -> ClientResult<T> {
        let response = self
            .request(Method::POST, path)
            .await?
            .json(&body)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    async fn delete(&self, path: &str) -> ClientResult<()> {
        let response = self.request(Method::DELETE, path).await?.send().await?;
        Self::handle_empty(response).await
    }

    // ----- cases -----

    pub async fn list_cases(&self, limit: i64, offset: i64) -> ClientResult<Vec<Case>> {
        self.get_json(&format!("/api/v1/cases?limit={}&offset={}", limit, offset))
            .await
    }

    pub async fn get_case(&self, id: Uuid) -> ClientResult<Case> {
        self.get_json(&format!("/api/v1/cases/{}", id)).await
    }

    pub async fn create_case(
        &self,
        case_number: &str,
        title: &str,
        case_type: Option<&str>,
    ) -> ClientResult<Case> {
        self.post_json(
            "/api/v1/cases",
            json!({
                "case_number": case_number,
                "title": title,
                "case_type": case_type,
            }),
        )
        .await
    }

    pub async fn update_case(&self, id: Uuid, patch: JsonValue) -> ClientResult<Case> {
        let response = self
            .request(Method::PATCH, &format!("/api/v1/cases/{}", id))
            .await?
            .json(&patch)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn delete_case(&self, id: Uuid) -> ClientResult<()> {
        self.delete(&format!("/api/v1/cases/{}", id)).await
    }

    // ----- tasks -----

    pub async fn list_tasks(&self, case_id: Option<Uuid>) -> ClientResult<Vec<Task>> {
        let path = match case_id {
            Some(id) => format!("/api/v1/tasks?case_id={}", id),
            None => "/api/v1/tasks".to_string(),
        };
        self.get_json(&path).await
    }

    pub async fn create_task(&self, title: &str, case_id: Option<Uuid>) -> ClientResult<Task> {
        self.post_json(
            "/api/v1/tasks",
            json!({ "title": title, "case_id": case_id }),
        )
        .await
    }

    // ----- insights -----

    pub async fn list_insights(
        &self,
        status: Option<&str>,
    ) -> ClientResult<Vec<caseflow_core::AiTaskInsight>> {
        let path = match status {
            Some(s) => format!("/api/v1/insights?status={}", s),
            None => "/api/v1/insights".to_string(),
        };
        self.get_json(&path).await
    }

    /// Authoritative counts, used by the realtime bridge to reconcile
    /// its optimistic projection.
    pub async fn insight_counts(&self) -> ClientResult<InsightCounts> {
        self.get_json("/api/v1/insights/counts").await
    }

    pub async fn send_insight_feedback(
        &self,
        id: Uuid,
        feedback: &InsightFeedback,
    ) -> ClientResult<caseflow_core::AiTaskInsight> {
        let body = serde_json::to_value(feedback)
            .map_err(|e| ApiClientError::Decode(e.to_string()))?;
        self.post_json(&format!("/api/v1/insights/{}/feedback", id), body)
            .await
    }

    // ----- expenses -----

    pub async fn create_expense(
        &self,
        case_id: Uuid,
        description: &str,
        amount_cents: i64,
    ) -> ClientResult<Expense> {
        self.post_json(
            "/api/v1/expenses",
            json!({
                "case_id": case_id,
                "description": description,
                "amount_cents": amount_cents,
            }),
        )
        .await
    }

    pub async fn list_expenses(&self, case_id: Uuid) -> ClientResult<Vec<Expense>> {
        self.get_json(&format!("/api/v1/expenses?case_id={}", case_id))
            .await
    }

    /// Explicitly push an expense to QuickBooks.
    pub async fn sync_expense(&self, id: Uuid) -> ClientResult<Expense> {
        self.post_json(&format!("/api/v1/expenses/{}/sync", id), json!({}))
            .await
    }

    // ----- documents / folders -----

    /// `parent` is a folder id or the `"root"` sentinel.
    pub async fn list_folders(&self, parent: &str) -> ClientResult<Vec<Folder>> {
        self.get_json(&format!("/api/v1/folders?parent={}", parent))
            .await
    }

    pub async fn create_folder(&self, name: &str, parent: &str) -> ClientResult<Folder> {
        self.post_json(
            "/api/v1/folders",
            json!({ "name": name, "parent": parent }),
        )
        .await
    }

    /// `folder` is a folder id or the `"root"` sentinel.
    pub async fn list_documents(&self, folder: &str) -> ClientResult<Vec<Document>> {
        self.get_json(&format!("/api/v1/documents?folder={}", folder))
            .await
    }

    pub async fn delete_document(&self, id: Uuid) -> ClientResult<()> {
        self.delete(&format!("/api/v1/documents/{}", id)).await
    }

    // ----- meetings -----

    pub async fn list_meetings(&self) -> ClientResult<Vec<Meeting>> {
        self.get_json("/api/v1/meetings").await
    }

    pub async fn get_meeting(&self, id: Uuid) -> ClientResult<Meeting> {
        self.get_json(&format!("/api/v1/meetings/{}", id)).await
    }

    pub async fn create_meeting_share(
        &self,
        meeting_id: Uuid,
        member_id: Uuid,
        expires_at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> ClientResult<MeetingShare> {
        self.post_json(
            &format!("/api/v1/meetings/{}/shares", meeting_id),
            json!({ "member_id": member_id, "expires_at": expires_at }),
        )
        .await
    }

    pub async fn delete_meeting_share(&self, meeting_id: Uuid, share_id: Uuid) -> ClientResult<()> {
        self.delete(&format!("/api/v1/meetings/{}/shares/{}", meeting_id, share_id))
            .await
    }

    // ----- jobs -----

    pub async fn list_jobs(&self) -> ClientResult<Vec<Job>> {
        self.get_json("/api/v1/jobs").await
    }

    pub async fn get_job(&self, id: Uuid) -> ClientResult<Job> {
        self.get_json(&format!("/api/v1/jobs/{}", id)).await
    }

    pub async fn retry_job(&self, id: Uuid) -> ClientResult<Job> {
        self.post_json(&format!("/api/v1/jobs/{}/retry", id), json!({}))
            .await
    }

    pub async fn worker_action(&self, action: &str) -> ClientResult<JsonValue> {
        self.post_json("/api/v1/jobs/workers", json!({ "action": action }))
            .await
    }

    // ----- org / members -----

    pub async fn get_org(&self) -> ClientResult<Organization> {
        self.get_json("/api/v1/org").await
    }

    pub async fn list_members(&self) -> ClientResult<Vec<Member>> {
        self.get_json("/api/v1/org/members").await
    }

    pub async fn add_member(&self, email: &str, role: &str) -> ClientResult<Member> {
        self.post_json(
            "/api/v1/org/members",
            json!({ "email": email, "role": role }),
        )
        .await
    }

    pub async fn remove_member(&self, member_id: Uuid) -> ClientResult<()> {
        self.delete(&format!("/api/v1/org/members/{}", member_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_token_failure_short_circuits() {
        struct NoSession;

        #[async_trait]
        impl TokenSource for NoSession {
            async fn token(&self) -> ClientResult<String> {
                Err(ApiClientError::Token("session expired".to_string()))
            }
        }

        // The base URL is unroutable; a token failure must surface
        // before any connection attempt.
        let client = ApiClient::new(
            "http://192.0.2.1".to_string(),
            Uuid::new_v4(),
            Arc::new(NoSession),
        );

        match client.get_org().await {
            Err(ApiClientError::Token(msg)) => assert!(msg.contains("session expired")),
            other => panic!("expected token error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_base_url_trailing_slash_normalized() {
        let client = ApiClient::new(
            "http://localhost:8080/".to_string(),
            Uuid::new_v4(),
            Arc::new(StaticToken("t".to_string())),
        );
        assert_eq!(client.base_url, "http://localhost:8080");
    }
}
