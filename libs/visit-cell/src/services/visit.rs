use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use appointment_cell::services::{AppointmentBookingService, AppointmentLifecycleService};
use appointment_cell::{Appointment, AppointmentStatus};
use finance_cell::services::CatalogService;
use finance_cell::Service;
use patient_cell::services::PatientService;
use shared_database::{AuditAction, AuditEntry, AuditQueue, StoreError, SupabaseClient};
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::AppState;
use staff_cell::services::ContractService;

use crate::models::{
    CompleteVisitRequest, DiscountType, SaveDraftRequest, StartVisitRequest, Visit, VisitError,
    VisitServiceInput, VisitServiceLine, VisitStatus, VisitView,
};
use crate::services::calculator::{calculate, lines_subtotal, validate_discount};

/// Upper bound for one service line, checked before any arithmetic.
pub const MAX_QUANTITY: i32 = 1000;

pub struct VisitService {
    db: Arc<SupabaseClient>,
    audit: AuditQueue,
}

impl VisitService {
    pub fn new(state: &AppState) -> Self {
        Self {
            db: state.db.clone(),
            audit: state.audit.clone(),
        }
    }

    fn bookings(&self) -> AppointmentBookingService {
        AppointmentBookingService::from_parts(self.db.clone(), self.audit.clone())
    }

    // ==========================================================================
    // START
    // ==========================================================================

    #[instrument(skip(self, doctor, request), fields(doctor_id = %doctor.id))]
    pub async fn start_visit(
        &self,
        clinic_id: Uuid,
        doctor: &User,
        request: StartVisitRequest,
    ) -> Result<Visit, VisitError> {
        PatientService::from_client(self.db.clone())
            .ensure_in_clinic(clinic_id, request.patient_id)
            .await?;

        let appointment = match request.appointment_id {
            Some(appointment_id) => Some(self.claim_appointment(clinic_id, doctor, appointment_id).await?),
            None => None,
        };

        let now = Utc::now();
        let visit: Visit = self
            .db
            .insert(
                "visits",
                json!({
                    "clinic_id": clinic_id,
                    "appointment_id": request.appointment_id,
                    "patient_id": request.patient_id,
                    "doctor_id": doctor.id,
                    "date": now.date_naive(),
                    "status": VisitStatus::Started,
                    "affected_teeth": [],
                    "plan_steps": [],
                    "xray_images": [],
                    "services": [],
                    "subtotal": 0.0,
                    "discount_type": DiscountType::None,
                    "discount_value": 0.0,
                    "discount_amount": 0.0,
                    "total": 0.0,
                    "doctor_share": 0.0,
                    "doctor_earning": 0.0,
                    "created_at": now,
                    "updated_at": now,
                }),
            )
            .await
            .map_err(|err| match err {
                StoreError::UniqueViolation(_) => VisitError::AppointmentTaken,
                other => VisitError::Store(other),
            })?;

        if let Some(appointment) = appointment {
            if let Err(e) = self
                .bookings()
                .apply_status(clinic_id, doctor, appointment, AppointmentStatus::InProgress)
                .await
            {
                warn!(visit_id = %visit.id, "Visit started but appointment status was not updated: {}", e);
            }
        }

        self.audit.record(AuditEntry::new(
            clinic_id,
            doctor.id,
            AuditAction::VisitStarted,
            "visit",
            visit.id,
            json!({
                "patient_id": visit.patient_id,
                "appointment_id": visit.appointment_id,
            }),
        ));

        info!(visit_id = %visit.id, patient_id = %visit.patient_id, "Visit started");
        Ok(visit)
    }

    /// The appointment must be the doctor's own, have no visit yet and be able to move
    /// to `in_progress`.
    async fn claim_appointment(
        &self,
        clinic_id: Uuid,
        doctor: &User,
        appointment_id: Uuid,
    ) -> Result<Appointment, VisitError> {
        let appointment = self.bookings().get_appointment(clinic_id, appointment_id).await?;
        if appointment.doctor_id != doctor.id {
            return Err(VisitError::ForeignAppointment);
        }

        let existing = self
            .db
            .count(
                "visits",
                &format!("clinic_id=eq.{}&appointment_id=eq.{}", clinic_id, appointment_id),
            )
            .await?;
        if existing > 0 {
            return Err(VisitError::AppointmentTaken);
        }

        AppointmentLifecycleService::validate_status_transition(appointment.status, AppointmentStatus::InProgress)?;
        Ok(appointment)
    }

    // ==========================================================================
    // DRAFT
    // ==========================================================================

    #[instrument(skip(self, doctor, request), fields(doctor_id = %doctor.id))]
    pub async fn save_draft(
        &self,
        clinic_id: Uuid,
        doctor: &User,
        visit_id: Uuid,
        request: SaveDraftRequest,
    ) -> Result<Visit, VisitError> {
        let visit = self.get_visit(clinic_id, doctor, visit_id).await?;
        if visit.is_completed() {
            return Err(VisitError::Locked);
        }

        let mut update = Map::new();

        if let Some(diagnosis) = request.diagnosis.filter(|d| !d.trim().is_empty()) {
            update.insert("diagnosis".into(), json!(diagnosis.trim()));
        }
        if let Some(comment) = request.comment {
            update.insert("comment".into(), json!(comment));
        }
        if let Some(teeth) = request.affected_teeth {
            update.insert("affected_teeth".into(), json!(teeth));
        }
        if let Some(steps) = request.plan_steps {
            update.insert("plan_steps".into(), json!(steps));
        }
        if let Some(images) = request.xray_images {
            update.insert("xray_images".into(), json!(images));
        }
        if let Some(payment_type) = request.payment_type {
            update.insert("payment_type".into(), json!(payment_type));
        }

        let (discount_type, discount_value) = match request.discount_type {
            Some(kind) => {
                let value = request.discount_value.unwrap_or(0.0);
                if value < 0.0 {
                    return Err(AppError::ValidationError("Discount value must not be negative".to_string()).into());
                }
                update.insert("discount_type".into(), json!(kind));
                update.insert("discount_value".into(), json!(value));
                (kind, value)
            }
            None => (visit.discount_type, visit.discount_value),
        };

        let lines = match request.services.filter(|s| !s.is_empty()) {
            Some(inputs) => Some(self.draft_lines(clinic_id, &inputs).await?),
            None => None,
        };

        if lines.is_some() || request.discount_type.is_some() {
            let charge = calculate(
                lines.unwrap_or_else(|| visit.services.clone()),
                discount_type,
                discount_value,
                visit.doctor_share,
            );
            update.insert("services".into(), json!(charge.lines));
            update.insert("subtotal".into(), json!(charge.subtotal));
            update.insert("discount_amount".into(), json!(charge.discount_amount));
            update.insert("total".into(), json!(charge.total));
            update.insert("doctor_earning".into(), json!(charge.doctor_earning));
        }
        update.insert("updated_at".into(), json!(Utc::now()));

        let saved: Visit = self
            .db
            .update(
                "visits",
                &format!("id=eq.{}&clinic_id=eq.{}&status=eq.started", visit_id, clinic_id),
                Value::Object(update),
            )
            .await?
            .ok_or(VisitError::Locked)?;

        debug!(%visit_id, "Visit draft saved");
        Ok(saved)
    }

    /// Lenient line building for drafts: unknown services are skipped and a missing
    /// quantity counts as one.
    async fn draft_lines(&self, clinic_id: Uuid, inputs: &[VisitServiceInput]) -> Result<Vec<VisitServiceLine>, VisitError> {
        if inputs.iter().any(|input| input.quantity > MAX_QUANTITY) {
            return Err(quantity_error());
        }
        let requested = merge_quantities(inputs.iter().map(|input| (input.service_id, input.quantity.max(1))))?;
        let ids: Vec<Uuid> = requested.iter().map(|(id, _)| *id).collect();
        let services = CatalogService::from_client(self.db.clone())
            .find_many(clinic_id, &ids)
            .await?;

        Ok(build_lines(&requested, &services))
    }

    // ==========================================================================
    // COMPLETE
    // ==========================================================================

    #[instrument(skip(self, doctor, request), fields(doctor_id = %doctor.id))]
    pub async fn complete_visit(
        &self,
        clinic_id: Uuid,
        doctor: &User,
        visit_id: Uuid,
        request: CompleteVisitRequest,
    ) -> Result<Visit, VisitError> {
        let visit = self.get_visit(clinic_id, doctor, visit_id).await?;
        if visit.is_completed() {
            return Err(VisitError::AlreadyCompleted);
        }

        let diagnosis = request
            .diagnosis
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .or_else(|| visit.saved_diagnosis())
            .map(str::to_string)
            .ok_or(VisitError::DiagnosisRequired)?;

        if request
            .services
            .iter()
            .any(|input| !(1..=MAX_QUANTITY).contains(&input.quantity))
        {
            return Err(quantity_error());
        }
        let requested = merge_quantities(request.services.iter().map(|input| (input.service_id, input.quantity)))?;
        let ids: Vec<Uuid> = requested.iter().map(|(id, _)| *id).collect();
        let services = CatalogService::from_client(self.db.clone())
            .find_many(clinic_id, &ids)
            .await?;
        if services.len() != ids.len() {
            return Err(VisitError::ServicesNotFound);
        }
        let lines = build_lines(&requested, &services);

        validate_discount(lines_subtotal(&lines), request.discount_type, request.discount_value)?;

        let today = Utc::now().date_naive();
        let doctor_share = ContractService::from_client(self.db.clone())
            .share_for(clinic_id, visit.doctor_id, today)
            .await?;
        let charge = calculate(lines, request.discount_type, request.discount_value, doctor_share);

        let now = Utc::now();
        let mut update = json!({
            "status": VisitStatus::Completed,
            "diagnosis": diagnosis,
            "services": charge.lines,
            "subtotal": charge.subtotal,
            "discount_type": request.discount_type,
            "discount_value": request.discount_value,
            "discount_amount": charge.discount_amount,
            "total": charge.total,
            "doctor_share": doctor_share,
            "doctor_earning": charge.doctor_earning,
            "payment_type": request.payment_type,
            "completed_at": now,
            "updated_at": now,
        });
        if let Some(fields) = update.as_object_mut() {
            if let Some(notes) = request.notes {
                fields.insert("notes".into(), json!(notes));
            }
            if let Some(teeth) = request.affected_teeth {
                fields.insert("affected_teeth".into(), json!(teeth));
            }
            if let Some(images) = request.xray_images {
                fields.insert("xray_images".into(), json!(images));
            }
        }

        let completed: Visit = self
            .db
            .update(
                "visits",
                &format!("id=eq.{}&clinic_id=eq.{}&status=eq.started", visit_id, clinic_id),
                update,
            )
            .await?
            .ok_or(VisitError::AlreadyCompleted)?;

        self.audit.record(AuditEntry::new(
            clinic_id,
            doctor.id,
            AuditAction::VisitFinished,
            "visit",
            completed.id,
            json!({
                "total": completed.total,
                "doctor_earning": completed.doctor_earning,
                "payment_type": completed.payment_type,
            }),
        ));

        if let Some(appointment_id) = completed.appointment_id {
            self.finish_appointment(clinic_id, doctor, appointment_id).await;
        }

        info!(
            %visit_id,
            total = completed.total,
            doctor_earning = completed.doctor_earning,
            "Visit completed"
        );
        Ok(completed)
    }

    /// The visit is already final, so a failed appointment update is only logged.
    async fn finish_appointment(&self, clinic_id: Uuid, doctor: &User, appointment_id: Uuid) {
        let bookings = self.bookings();
        let result = match bookings.get_appointment(clinic_id, appointment_id).await {
            Ok(appointment) => bookings
                .apply_status(clinic_id, doctor, appointment, AppointmentStatus::Completed)
                .await
                .map(|_| ()),
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            warn!(%appointment_id, "Could not mark appointment completed: {}", e);
        }
    }

    // ==========================================================================
    // READS
    // ==========================================================================

    /// Doctors only ever see their own visits.
    pub async fn get_visit(&self, clinic_id: Uuid, doctor: &User, visit_id: Uuid) -> Result<Visit, VisitError> {
        self.db
            .select_one(
                "visits",
                &format!(
                    "id=eq.{}&clinic_id=eq.{}&doctor_id=eq.{}",
                    visit_id, clinic_id, doctor.id
                ),
            )
            .await?
            .ok_or(VisitError::NotFound("Visit"))
    }

    pub async fn list_visits(
        &self,
        clinic_id: Uuid,
        doctor: &User,
        date: NaiveDate,
    ) -> Result<Vec<VisitView>, VisitError> {
        let visits: Vec<Visit> = self
            .db
            .select(
                "visits",
                &format!(
                    "clinic_id=eq.{}&doctor_id=eq.{}&date=eq.{}&order=created_at.asc",
                    clinic_id, doctor.id, date
                ),
            )
            .await?;

        let names = self.patient_names(&visits).await;
        Ok(visits
            .into_iter()
            .map(|visit| VisitView {
                patient_name: names.get(&visit.patient_id).cloned().unwrap_or_default(),
                visit,
            })
            .collect())
    }

    async fn patient_names(&self, visits: &[Visit]) -> HashMap<Uuid, String> {
        let ids: HashSet<Uuid> = visits.iter().map(|v| v.patient_id).collect();
        if ids.is_empty() {
            return HashMap::new();
        }

        let list = ids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(",");
        match self
            .db
            .select::<PatientName>("patients", &format!("select=id,first_name,last_name&id=in.({})", list))
            .await
        {
            Ok(rows) => rows
                .into_iter()
                .map(|row| (row.id, format!("{} {}", row.first_name, row.last_name)))
                .collect(),
            Err(e) => {
                warn!("Could not resolve patient names: {}", e);
                HashMap::new()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct PatientName {
    id: Uuid,
    first_name: String,
    last_name: String,
}

/// Folds repeated services into one entry, keeping first-seen order. A merged
/// quantity above `MAX_QUANTITY` is rejected.
pub fn merge_quantities(inputs: impl IntoIterator<Item = (Uuid, i32)>) -> Result<Vec<(Uuid, i32)>, VisitError> {
    let mut merged: Vec<(Uuid, i32)> = Vec::new();
    for (service_id, quantity) in inputs {
        match merged.iter_mut().find(|(id, _)| *id == service_id) {
            Some((_, total)) => {
                *total = total
                    .checked_add(quantity)
                    .filter(|sum| *sum <= MAX_QUANTITY)
                    .ok_or_else(quantity_error)?;
            }
            None => merged.push((service_id, quantity)),
        }
    }
    Ok(merged)
}

fn quantity_error() -> VisitError {
    AppError::ValidationError(format!("Service quantity must be between 1 and {}", MAX_QUANTITY)).into()
}

/// Lines in request order, priced from the catalog. Ids missing from `services` are dropped.
pub fn build_lines(requested: &[(Uuid, i32)], services: &[Service]) -> Vec<VisitServiceLine> {
    requested
        .iter()
        .filter_map(|(service_id, quantity)| {
            services.iter().find(|s| s.id == *service_id).map(|service| VisitServiceLine {
                service_id: service.id,
                service_name: service.name.clone(),
                price: service.price,
                quantity: *quantity,
                subtotal: 0.0,
            })
        })
        .collect()
}
