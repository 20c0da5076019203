//! Expense handlers, including the explicit QuickBooks sync endpoint.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use caseflow_core::{CreateExpenseRequest, Expense, ExpenseRepository, QbSyncStatus};

use crate::auth::OrgScope;
use crate::error::ApiError;
use crate::state::AppState;

pub async fn create_expense(
    scope: OrgScope,
    State(state): State<AppState>,
    Json(req): Json<CreateExpenseRequest>,
) -> Result<(StatusCode, Json<Expense>), ApiError> {
    if req.amount_cents <= 0 {
        return Err(ApiError::BadRequest(
            "Expense amount must be positive".to_string(),
        ));
    }
    if req.description.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Description cannot be empty".to_string(),
        ));
    }

    let expense = state.db.expenses.create(scope.org_id, req).await?;
    Ok((StatusCode::CREATED, Json(expense)))
}

#[derive(Debug, Deserialize)]
pub struct ListExpensesQuery {
    pub case_id: Uuid,
}

pub async fn list_expenses(
    scope: OrgScope,
    State(state): State<AppState>,
    Query(query): Query<ListExpensesQuery>,
) -> Result<Json<Vec<Expense>>, ApiError> {
    let expenses = state
        .db
        .expenses
        .list_for_case(scope.org_id, query.case_id)
        .await?;
    Ok(Json(expenses))
}

pub async fn get_expense(
    scope: OrgScope,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Expense>, ApiError> {
    let expense = state
        .db
        .expenses
        .get(scope.org_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Expense not found".to_string()))?;
    Ok(Json(expense))
}

/// Push an expense to QuickBooks.
///
/// Sync is explicit-only: a failed sync leaves the expense in `error`
/// and is never retried automatically. Re-syncing an already-`synced`
/// expense is refused.
pub async fn sync_expense(
    scope: OrgScope,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Expense>, ApiError> {
    let expense = state
        .db
        .expenses
        .get(scope.org_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Expense not found".to_string()))?;

    if expense.qb_sync_status == QbSyncStatus::Synced {
        return Err(ApiError::BadRequest(
            "Expense is already synced".to_string(),
        ));
    }

    let qbo = state
        .qbo
        .as_ref()
        .ok_or_else(|| ApiError::BadRequest("QuickBooks sync is not configured".to_string()))?;

    let updated = match qbo.push_expense(&expense).await {
        Ok(qb_id) => {
            tracing::info!(expense_id = %id, org_id = %scope.org_id, qb_id = %qb_id, "Expense synced");
            state
                .db
                .expenses
                .mark_synced(scope.org_id, id, &qb_id)
                .await?
        }
        Err(e) => {
            tracing::warn!(expense_id = %id, org_id = %scope.org_id, error = %e, "Expense sync failed");
            state
                .db
                .expenses
                .mark_sync_error(scope.org_id, id, &e.to_string())
                .await?
        }
    }
    .ok_or_else(|| ApiError::NotFound("Expense not found".to_string()))?;

    Ok(Json(updated))
}
