use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use shared_database::SupabaseClient;
use shared_models::auth::User;
use shared_utils::AppState;

use crate::models::{CreateExpenseRequest, Expense, FinanceError};
use crate::services::reports::month_bounds;

pub struct ExpenseService {
    db: Arc<SupabaseClient>,
}

impl ExpenseService {
    pub fn new(state: &AppState) -> Self {
        Self { db: state.db.clone() }
    }

    pub fn from_client(db: Arc<SupabaseClient>) -> Self {
        Self { db }
    }

    pub async fn create_expense(
        &self,
        clinic_id: Uuid,
        creator: &User,
        request: CreateExpenseRequest,
    ) -> Result<Expense, FinanceError> {
        if !request.amount.is_finite() || request.amount <= 0.0 {
            return Err(FinanceError::InvalidAmount);
        }

        let expense: Expense = self
            .db
            .insert(
                "expenses",
                json!({
                    "clinic_id": clinic_id,
                    "category": request.category,
                    "amount": request.amount,
                    "date": request.date,
                    "note": request.note,
                    "created_by": creator.id,
                    "created_at": Utc::now(),
                }),
            )
            .await?;

        info!(expense_id = %expense.id, category = %expense.category, amount = expense.amount, "Expense recorded");
        Ok(expense)
    }

    /// All expenses, or only those dated within `year`/`month`.
    pub async fn list_expenses(
        &self,
        clinic_id: Uuid,
        month: Option<(i32, u32)>,
    ) -> Result<Vec<Expense>, FinanceError> {
        match month {
            Some((year, month)) => {
                let (first, last) = month_bounds(year, month)?;
                self.expenses_between(clinic_id, first, last).await
            }
            None => Ok(self
                .db
                .select("expenses", &format!("clinic_id=eq.{}&order=date.desc", clinic_id))
                .await?),
        }
    }

    pub async fn expenses_between(
        &self,
        clinic_id: Uuid,
        first: NaiveDate,
        last: NaiveDate,
    ) -> Result<Vec<Expense>, FinanceError> {
        Ok(self
            .db
            .select(
                "expenses",
                &format!(
                    "clinic_id=eq.{}&date=gte.{}&date=lte.{}&order=date.desc",
                    clinic_id, first, last
                ),
            )
            .await?)
    }

    pub async fn delete_expense(&self, clinic_id: Uuid, expense_id: Uuid) -> Result<(), FinanceError> {
        let removed = self
            .db
            .delete(
                "expenses",
                &format!("id=eq.{}&clinic_id=eq.{}", expense_id, clinic_id),
            )
            .await?;

        if removed == 0 {
            return Err(FinanceError::NotFound("Expense"));
        }
        info!(%expense_id, "Expense deleted");
        Ok(())
    }
}
