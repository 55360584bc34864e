use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use shared_database::{StoreError, SupabaseClient};
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::validation::require_text;
use shared_utils::AppState;

use crate::models::{
    CreateServiceRequest, FinanceError, ImportReport, Service, UpdateServiceRequest,
    DEFAULT_SERVICE_DURATION,
};

pub struct CatalogService {
    db: Arc<SupabaseClient>,
}

impl CatalogService {
    pub fn new(state: &AppState) -> Self {
        Self { db: state.db.clone() }
    }

    pub fn from_client(db: Arc<SupabaseClient>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, creator, request))]
    pub async fn create_service(
        &self,
        clinic_id: Uuid,
        creator: &User,
        request: CreateServiceRequest,
    ) -> Result<Service, FinanceError> {
        let name = require_text(&request.name, "name", 100)?;
        validate_price(request.price)?;
        let duration = match request.duration {
            None | Some(0) => DEFAULT_SERVICE_DURATION,
            Some(minutes) => validate_duration(minutes)?,
        };

        let now = Utc::now();
        let service: Service = self
            .db
            .insert(
                "services",
                json!({
                    "clinic_id": clinic_id,
                    "name": name,
                    "description": request.description,
                    "price": request.price,
                    "duration": duration,
                    "is_active": true,
                    "created_by": creator.id,
                    "created_at": now,
                    "updated_at": now,
                }),
            )
            .await
            .map_err(name_conflict)?;

        info!(service_id = %service.id, %clinic_id, "Service created");
        Ok(service)
    }

    pub async fn list_services(&self, clinic_id: Uuid, active_only: bool) -> Result<Vec<Service>, FinanceError> {
        let mut query = format!("clinic_id=eq.{}", clinic_id);
        if active_only {
            query.push_str("&is_active=is.true");
        }
        query.push_str("&order=name.asc");

        Ok(self.db.select("services", &query).await?)
    }

    pub async fn get_service(&self, clinic_id: Uuid, service_id: Uuid) -> Result<Service, FinanceError> {
        self.db
            .select_one(
                "services",
                &format!("id=eq.{}&clinic_id=eq.{}", service_id, clinic_id),
            )
            .await?
            .ok_or(FinanceError::NotFound("Service"))
    }

    /// Clinic services among `ids`; unknown or foreign ids are simply absent.
    pub async fn find_many(&self, clinic_id: Uuid, ids: &[Uuid]) -> Result<Vec<Service>, FinanceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let list = ids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(",");
        Ok(self
            .db
            .select(
                "services",
                &format!("clinic_id=eq.{}&id=in.({})", clinic_id, list),
            )
            .await?)
    }

    pub async fn update_service(
        &self,
        clinic_id: Uuid,
        service_id: Uuid,
        request: UpdateServiceRequest,
    ) -> Result<Service, FinanceError> {
        let mut update = Map::new();

        if let Some(name) = request.name {
            update.insert("name".into(), json!(require_text(&name, "name", 100)?));
        }
        if let Some(description) = request.description {
            update.insert("description".into(), json!(description));
        }
        if let Some(price) = request.price {
            validate_price(price)?;
            update.insert("price".into(), json!(price));
        }
        if let Some(duration) = request.duration {
            update.insert("duration".into(), json!(validate_duration(duration)?));
        }
        if let Some(active) = request.is_active {
            update.insert("is_active".into(), json!(active));
        }
        update.insert("updated_at".into(), json!(Utc::now()));

        let service = self
            .db
            .update(
                "services",
                &format!("id=eq.{}&clinic_id=eq.{}", service_id, clinic_id),
                Value::Object(update),
            )
            .await
            .map_err(name_conflict)?
            .ok_or(FinanceError::NotFound("Service"))?;

        info!(%service_id, "Service updated");
        Ok(service)
    }

    /// Soft delete; completed visits keep their copied name and price.
    pub async fn deactivate_service(&self, clinic_id: Uuid, service_id: Uuid) -> Result<(), FinanceError> {
        let updated: Option<Service> = self
            .db
            .update(
                "services",
                &format!("id=eq.{}&clinic_id=eq.{}", service_id, clinic_id),
                json!({ "is_active": false, "updated_at": Utc::now() }),
            )
            .await?;

        updated.ok_or(FinanceError::NotFound("Service"))?;
        info!(%service_id, "Service deactivated");
        Ok(())
    }

    pub async fn import_services(
        &self,
        clinic_id: Uuid,
        creator: &User,
        rows: Vec<CreateServiceRequest>,
    ) -> Result<ImportReport, FinanceError> {
        if rows.is_empty() {
            return Err(AppError::ValidationError("No services provided".to_string()).into());
        }

        let mut report = ImportReport { imported: 0, errors: Vec::new() };
        for (index, row) in rows.into_iter().enumerate() {
            match self.create_service(clinic_id, creator, row).await {
                Ok(_) => report.imported += 1,
                Err(err) => {
                    let message = AppError::from(err).public_message();
                    report.errors.push(format!("Row {}: {}", index + 1, message));
                }
            }
        }

        if !report.errors.is_empty() {
            warn!(%clinic_id, failed = report.errors.len(), "Service import finished with errors");
        }
        info!(%clinic_id, imported = report.imported, "Service import finished");
        Ok(report)
    }
}

fn name_conflict(err: StoreError) -> FinanceError {
    match err {
        StoreError::UniqueViolation(_) => FinanceError::ServiceNameTaken,
        other => FinanceError::Store(other),
    }
}

fn validate_price(price: f64) -> Result<(), FinanceError> {
    if !price.is_finite() || price < 0.0 {
        return Err(FinanceError::InvalidPrice);
    }
    Ok(())
}

fn validate_duration(minutes: i32) -> Result<i32, FinanceError> {
    if !(5..=480).contains(&minutes) {
        return Err(FinanceError::InvalidDuration);
    }
    Ok(minutes)
}
