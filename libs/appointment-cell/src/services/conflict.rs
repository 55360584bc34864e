use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use shared_database::{format_timestamp, StoreError, SupabaseClient};

/// Advisory slot check. The partial unique index on
/// `(clinic_id, doctor_id, start_time) WHERE status <> 'cancelled'` is what actually
/// prevents double booking; this only lets the common case fail before a write.
pub struct OverlapGuard {
    db: Arc<SupabaseClient>,
}

impl OverlapGuard {
    pub fn new(db: Arc<SupabaseClient>) -> Self {
        Self { db }
    }

    pub async fn check_overlap(
        &self,
        clinic_id: Uuid,
        doctor_id: Uuid,
        start_time: DateTime<Utc>,
        exclude_id: Option<Uuid>,
    ) -> Result<bool, StoreError> {
        let taken = self
            .db
            .count("appointments", &overlap_query(clinic_id, doctor_id, start_time, exclude_id))
            .await?;

        debug!(%doctor_id, %start_time, taken, "Slot occupancy checked");
        Ok(taken > 0)
    }
}

/// Cancelled appointments never occupy a slot.
pub fn overlap_query(
    clinic_id: Uuid,
    doctor_id: Uuid,
    start_time: DateTime<Utc>,
    exclude_id: Option<Uuid>,
) -> String {
    let mut query = format!(
        "clinic_id=eq.{}&doctor_id=eq.{}&start_time=eq.{}&status=neq.cancelled",
        clinic_id,
        doctor_id,
        format_timestamp(&start_time)
    );
    if let Some(id) = exclude_id {
        query.push_str(&format!("&id=neq.{}", id));
    }
    query
}
