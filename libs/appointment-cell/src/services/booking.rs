use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use patient_cell::services::PatientService;
use shared_database::{AuditAction, AuditEntry, AuditQueue, StoreError, SupabaseClient};
use shared_models::auth::{Role, User};
use shared_models::pagination::Page;
use shared_utils::AppState;
use staff_cell::services::UserService;

use crate::models::{
    Appointment, AppointmentError, AppointmentFilter, AppointmentStatus, AppointmentView,
    CreateAppointmentRequest,
};
use crate::services::conflict::OverlapGuard;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::slot::{normalize, slot_date, slot_end};

pub struct AppointmentBookingService {
    db: Arc<SupabaseClient>,
    audit: AuditQueue,
}

impl AppointmentBookingService {
    pub fn new(state: &AppState) -> Self {
        Self::from_parts(state.db.clone(), state.audit.clone())
    }

    pub fn from_parts(db: Arc<SupabaseClient>, audit: AuditQueue) -> Self {
        Self { db, audit }
    }

    // ==========================================================================
    // WRITES
    // ==========================================================================

    #[instrument(skip(self, creator, request), fields(doctor_id = %request.doctor_id))]
    pub async fn book_appointment(
        &self,
        clinic_id: Uuid,
        creator: &User,
        request: CreateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        PatientService::from_client(self.db.clone())
            .ensure_in_clinic(clinic_id, request.patient_id)
            .await?;
        self.ensure_bookable_doctor(clinic_id, request.doctor_id).await?;

        let start_time = normalize(request.start_time);
        if start_time < Utc::now() {
            return Err(AppointmentError::PastSlot);
        }

        let guard = OverlapGuard::new(self.db.clone());
        if guard.check_overlap(clinic_id, request.doctor_id, start_time, None).await? {
            return Err(AppointmentError::SlotTaken);
        }

        let now = Utc::now();
        let appointment: Appointment = self
            .db
            .insert(
                "appointments",
                json!({
                    "clinic_id": clinic_id,
                    "patient_id": request.patient_id,
                    "doctor_id": request.doctor_id,
                    "date": slot_date(start_time),
                    "start_time": start_time,
                    "end_time": slot_end(start_time),
                    "status": AppointmentStatus::Scheduled,
                    "notes": request.notes,
                    "created_by": creator.id,
                    "created_at": now,
                    "updated_at": now,
                }),
            )
            .await
            .map_err(slot_conflict)?;

        info!(
            appointment_id = %appointment.id,
            start_time = %appointment.start_time,
            "Appointment booked"
        );
        Ok(appointment)
    }

    /// Moves the appointment in place with one PATCH; the unique slot index still
    /// rejects a target slot that is already taken.
    #[instrument(skip(self))]
    pub async fn reschedule_appointment(
        &self,
        clinic_id: Uuid,
        appointment_id: Uuid,
        new_start_time: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.get_appointment(clinic_id, appointment_id).await?;
        if AppointmentLifecycleService::is_terminal(appointment.status) {
            return Err(AppointmentError::NotReschedulable(appointment.status));
        }

        let start_time = normalize(new_start_time);
        if start_time < Utc::now() {
            return Err(AppointmentError::PastSlot);
        }
        if start_time == appointment.start_time {
            return Ok(appointment);
        }

        let guard = OverlapGuard::new(self.db.clone());
        if guard
            .check_overlap(clinic_id, appointment.doctor_id, start_time, Some(appointment_id))
            .await?
        {
            return Err(AppointmentError::SlotTaken);
        }

        let moved: Appointment = self
            .db
            .update(
                "appointments",
                &format!("id=eq.{}&clinic_id=eq.{}", appointment_id, clinic_id),
                json!({
                    "start_time": start_time,
                    "end_time": slot_end(start_time),
                    "date": slot_date(start_time),
                    "updated_at": Utc::now(),
                }),
            )
            .await
            .map_err(slot_conflict)?
            .ok_or(AppointmentError::NotFound)?;

        info!(
            %appointment_id,
            from = %appointment.start_time,
            to = %moved.start_time,
            "Appointment rescheduled"
        );
        Ok(moved)
    }

    pub async fn cancel_appointment(
        &self,
        clinic_id: Uuid,
        actor: &User,
        appointment_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        self.update_status(clinic_id, actor, appointment_id, AppointmentStatus::Cancelled)
            .await
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn update_status(
        &self,
        clinic_id: Uuid,
        actor: &User,
        appointment_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.get_appointment(clinic_id, appointment_id).await?;
        self.apply_status(clinic_id, actor, appointment, status).await
    }

    /// Doctors may only move their own appointments.
    pub async fn update_status_as_doctor(
        &self,
        clinic_id: Uuid,
        doctor: &User,
        appointment_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.get_appointment(clinic_id, appointment_id).await?;
        if appointment.doctor_id != doctor.id {
            return Err(AppointmentError::NotOwner);
        }
        self.apply_status(clinic_id, doctor, appointment, status).await
    }

    /// Validates and writes a transition on an already loaded appointment.
    pub async fn apply_status(
        &self,
        clinic_id: Uuid,
        actor: &User,
        appointment: Appointment,
        status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        AppointmentLifecycleService::validate_status_transition(appointment.status, status)?;

        // Guarded by the status the transition was validated against; a concurrent
        // change leaves no row to update.
        let updated: Appointment = self
            .db
            .update(
                "appointments",
                &format!(
                    "id=eq.{}&clinic_id=eq.{}&status=eq.{}",
                    appointment.id,
                    clinic_id,
                    appointment.status.as_str()
                ),
                json!({ "status": status, "updated_at": Utc::now() }),
            )
            .await
            .map_err(slot_conflict)?
            .ok_or(AppointmentError::InvalidTransition {
                from: appointment.status,
                to: status,
            })?;

        self.audit.record(AuditEntry::new(
            clinic_id,
            actor.id,
            AuditAction::AppointmentStatusChanged,
            "appointment",
            appointment.id,
            json!({ "from": appointment.status, "to": status }),
        ));

        info!(appointment_id = %appointment.id, from = %appointment.status, to = %status, "Appointment status changed");
        Ok(updated)
    }

    // ==========================================================================
    // READS
    // ==========================================================================

    pub async fn get_appointment(&self, clinic_id: Uuid, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.db
            .select_one(
                "appointments",
                &format!("id=eq.{}&clinic_id=eq.{}", appointment_id, clinic_id),
            )
            .await?
            .ok_or(AppointmentError::NotFound)
    }

    pub async fn get_appointment_view(
        &self,
        clinic_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<AppointmentView, AppointmentError> {
        let appointment = self.get_appointment(clinic_id, appointment_id).await?;
        let mut views = self.with_names(vec![appointment]).await;
        views.pop().ok_or(AppointmentError::NotFound)
    }

    pub async fn list_appointments(
        &self,
        clinic_id: Uuid,
        filter: &AppointmentFilter,
    ) -> Result<Page<AppointmentView>, AppointmentError> {
        let mut query = format!("clinic_id=eq.{}", clinic_id);
        if let Some(date) = filter.date {
            query.push_str(&format!("&date=eq.{}", date));
        }
        if let Some(doctor_id) = filter.doctor_id {
            query.push_str(&format!("&doctor_id=eq.{}", doctor_id));
        }
        if let Some(status) = filter.status {
            query.push_str(&format!("&status=eq.{}", status));
        }

        let appointments: Vec<Appointment> = self
            .db
            .select(
                "appointments",
                &format!("{}&order=start_time.asc&{}", query, filter.page.to_query()),
            )
            .await?;
        let total = self.db.count("appointments", &query).await?;

        let views = self.with_names(appointments).await;
        Ok(Page::new(views, total, &filter.page))
    }

    /// A doctor's appointments for one day, in slot order.
    pub async fn doctor_schedule(
        &self,
        clinic_id: Uuid,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<AppointmentView>, AppointmentError> {
        let appointments: Vec<Appointment> = self
            .db
            .select(
                "appointments",
                &format!(
                    "clinic_id=eq.{}&doctor_id=eq.{}&date=eq.{}&order=start_time.asc",
                    clinic_id, doctor_id, date
                ),
            )
            .await?;

        debug!(%doctor_id, %date, count = appointments.len(), "Loaded doctor schedule");
        Ok(self.with_names(appointments).await)
    }

    // ==========================================================================
    // HELPERS
    // ==========================================================================

    async fn ensure_bookable_doctor(&self, clinic_id: Uuid, doctor_id: Uuid) -> Result<(), AppointmentError> {
        let doctor = UserService::from_client(self.db.clone())
            .find_in_clinic(clinic_id, doctor_id)
            .await?
            .ok_or(AppointmentError::DoctorNotFound)?;

        if doctor.role != Role::Doctor || !doctor.is_active {
            return Err(AppointmentError::DoctorNotFound);
        }
        Ok(())
    }

    /// Names are cosmetic; a lookup failure leaves them empty instead of failing the read.
    async fn with_names(&self, appointments: Vec<Appointment>) -> Vec<AppointmentView> {
        if appointments.is_empty() {
            return Vec::new();
        }

        let patient_ids: HashSet<Uuid> = appointments.iter().map(|a| a.patient_id).collect();
        let doctor_ids: HashSet<Uuid> = appointments.iter().map(|a| a.doctor_id).collect();

        let patients = self.load_names("patients", &patient_ids).await;
        let doctors = self.load_names("users", &doctor_ids).await;

        appointments
            .into_iter()
            .map(|appointment| AppointmentView {
                patient_name: patients.get(&appointment.patient_id).cloned().unwrap_or_default(),
                doctor_name: doctors.get(&appointment.doctor_id).cloned().unwrap_or_default(),
                appointment,
            })
            .collect()
    }

    async fn load_names(&self, table: &str, ids: &HashSet<Uuid>) -> HashMap<Uuid, String> {
        let list = ids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(",");
        let rows: Vec<NameRow> = match self
            .db
            .select(table, &format!("select=id,first_name,last_name&id=in.({})", list))
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                warn!(table, "Could not resolve display names: {}", e);
                Vec::new()
            }
        };

        rows.into_iter()
            .map(|row| (row.id, format!("{} {}", row.first_name, row.last_name)))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct NameRow {
    id: Uuid,
    first_name: String,
    last_name: String,
}

fn slot_conflict(err: StoreError) -> AppointmentError {
    match err {
        StoreError::UniqueViolation(_) => AppointmentError::SlotTaken,
        other => AppointmentError::Store(other),
    }
}
