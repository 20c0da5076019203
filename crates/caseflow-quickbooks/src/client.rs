//! QuickBooks Online API client.

use std::sync::Arc;

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use caseflow_core::{Error, Expense, Result};

use crate::token::AccessTokenProvider;

/// Default QuickBooks Online API endpoint.
pub const DEFAULT_QBO_URL: &str = "https://quickbooks.api.intuit.com";

/// QuickBooks Online client scoped to a single company (realm).
pub struct QuickBooksClient {
    client: Client,
    base_url: String,
    realm_id: String,
    tokens: Arc<dyn AccessTokenProvider>,
}

#[derive(Debug, Deserialize)]
struct PurchaseResponse {
    #[serde(rename = "Purchase")]
    purchase: PurchaseEntity,
}

#[derive(Debug, Deserialize)]
struct PurchaseEntity {
    #[serde(rename = "Id")]
    id: String,
}

impl QuickBooksClient {
    /// Create a client for the given realm.
    pub fn new(base_url: String, realm_id: String, tokens: Arc<dyn AccessTokenProvider>) -> Self {
        Self {
            client: Client::new(),
            base_url,
            realm_id,
            tokens,
        }
    }

    /// Create from environment variables.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `QBO_BASE_URL` | production endpoint | API base URL |
    /// | `QBO_REALM_ID` | (required) | Company realm id |
    pub fn from_env(tokens: Arc<dyn AccessTokenProvider>) -> Result<Self> {
        let base_url =
            std::env::var("QBO_BASE_URL").unwrap_or_else(|_| DEFAULT_QBO_URL.to_string());
        let realm_id = std::env::var("QBO_REALM_ID")
            .map_err(|_| Error::Config("QBO_REALM_ID is not set".to_string()))?;

        Ok(Self::new(base_url, realm_id, tokens))
    }

    /// Push an expense to QuickBooks as a Purchase. Returns the
    /// QuickBooks entity id on success.
    ///
    /// The caller records the outcome on the expense row; this method
    /// never retries on its own.
    pub async fn push_expense(&self, expense: &Expense) -> Result<String> {
        let token = self.tokens.access_token().await?;

        let url = format!(
            "{}/v3/company/{}/purchase?minorversion=73",
            self.base_url, self.realm_id
        );
        let body = purchase_body(expense);

        debug!(expense_id = %expense.id, %url, "Pushing expense to QuickBooks");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Sync(format!("QuickBooks request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(expense_id = %expense.id, %status, "QuickBooks rejected expense");
            return Err(Error::Sync(format!(
                "QuickBooks returned {}: {}",
                status,
                truncate(&detail, 500)
            )));
        }

        let parsed: PurchaseResponse = response
            .json()
            .await
            .map_err(|e| Error::Sync(format!("Malformed QuickBooks response: {}", e)))?;

        info!(expense_id = %expense.id, qb_id = %parsed.purchase.id, "Expense synced to QuickBooks");
        Ok(parsed.purchase.id)
    }
}

/// Build the Purchase payload for an expense.
///
/// Amounts are stored as cents and QuickBooks wants decimal dollars.
fn purchase_body(expense: &Expense) -> serde_json::Value {
    json!({
        "PaymentType": "Cash",
        "TotalAmt": amount_decimal(expense.amount_cents),
        "TxnDate": expense.incurred_on.format("%Y-%m-%d").to_string(),
        "PrivateNote": expense.description,
        "AccountRef": { "value": "1" },
        "Line": [{
            "Amount": amount_decimal(expense.amount_cents),
            "DetailType": "AccountBasedExpenseLineDetail",
            "Description": expense.description,
            "AccountBasedExpenseLineDetail": {
                "AccountRef": { "value": "1" }
            }
        }]
    })
}

fn amount_decimal(cents: i64) -> f64 {
    cents as f64 / 100.0
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caseflow_core::QbSyncStatus;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn expense(amount_cents: i64) -> Expense {
        Expense {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            case_id: Uuid::new_v4(),
            description: "Court filing fee".to_string(),
            amount_cents,
            incurred_on: Utc.with_ymd_and_hms(2026, 3, 14, 0, 0, 0).unwrap(),
            qb_sync_status: QbSyncStatus::NotSynced,
            qb_id: None,
            qb_sync_error: None,
            synced_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_purchase_body_shape() {
        let body = purchase_body(&expense(12345));

        assert_eq!(body["TotalAmt"], 123.45);
        assert_eq!(body["TxnDate"], "2026-03-14");
        assert_eq!(body["PrivateNote"], "Court filing fee");
        assert_eq!(body["Line"][0]["Amount"], 123.45);
        assert_eq!(
            body["Line"][0]["DetailType"],
            "AccountBasedExpenseLineDetail"
        );
    }

    #[test]
    fn test_amount_conversion() {
        assert_eq!(amount_decimal(0), 0.0);
        assert_eq!(amount_decimal(100), 1.0);
        assert_eq!(amount_decimal(99), 0.99);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 3), "hel");
        assert_eq!(truncate("hi", 10), "hi");
        assert_eq!(truncate("日本語テスト", 2), "日本");
    }
}
