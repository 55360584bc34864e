use std::sync::Arc;

use uuid::Uuid;

use shared_database::SupabaseClient;
use shared_models::pagination::{Page, PageQuery};
use shared_utils::AppState;

use crate::models::{AuditLog, FinanceError};

pub struct AuditLogService {
    db: Arc<SupabaseClient>,
}

impl AuditLogService {
    pub fn new(state: &AppState) -> Self {
        Self { db: state.db.clone() }
    }

    /// Newest first. `entity_type` is matched exactly.
    pub async fn list_logs(
        &self,
        clinic_id: Uuid,
        entity_type: Option<&str>,
        entity_id: Option<Uuid>,
        page: &PageQuery,
    ) -> Result<Page<AuditLog>, FinanceError> {
        let mut filter = format!("clinic_id=eq.{}", clinic_id);
        if let Some(entity_type) = entity_type {
            filter.push_str(&format!("&entity_type=eq.{}", urlencoding::encode(entity_type)));
        }
        if let Some(entity_id) = entity_id {
            filter.push_str(&format!("&entity_id=eq.{}", entity_id));
        }

        let logs: Vec<AuditLog> = self
            .db
            .select(
                "audit_logs",
                &format!("{}&order=created_at.desc&{}", filter, page.to_query()),
            )
            .await?;
        let total = self.db.count("audit_logs", &filter).await?;

        Ok(Page::new(logs, total, page))
    }
}
