use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use patient_cell::services::PatientService;
use shared_database::SupabaseClient;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::validation::require_text;
use shared_utils::AppState;

use crate::models::{
    CreateTreatmentPlanRequest, PlanStatus, PlanStep, StepStatus, TreatmentPlan, TreatmentPlanView,
    UpdatePlanStepRequest, VisitError,
};

const TITLE_MAX: usize = 200;
const STEP_MAX: usize = 500;

pub struct TreatmentPlanService {
    db: Arc<SupabaseClient>,
}

impl TreatmentPlanService {
    pub fn new(state: &AppState) -> Self {
        Self { db: state.db.clone() }
    }

    pub async fn create_plan(
        &self,
        clinic_id: Uuid,
        doctor: &User,
        request: CreateTreatmentPlanRequest,
    ) -> Result<TreatmentPlanView, VisitError> {
        let title = require_text(&request.title, "title", TITLE_MAX)?;
        if request.steps.is_empty() {
            return Err(AppError::ValidationError("At least one step is required".to_string()).into());
        }
        let steps = request
            .steps
            .iter()
            .enumerate()
            .map(|(index, step)| -> Result<PlanStep, VisitError> {
                Ok(PlanStep {
                    step_number: index as u32 + 1,
                    description: require_text(&step.description, "description", STEP_MAX)?,
                    status: StepStatus::Pending,
                    visit_id: None,
                    completed_at: None,
                    notes: None,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        PatientService::from_client(self.db.clone())
            .ensure_in_clinic(clinic_id, request.patient_id)
            .await?;

        let now = Utc::now();
        let plan: TreatmentPlan = self
            .db
            .insert(
                "treatment_plans",
                json!({
                    "clinic_id": clinic_id,
                    "patient_id": request.patient_id,
                    "doctor_id": doctor.id,
                    "title": title,
                    "steps": steps,
                    "status": PlanStatus::Pending,
                    "created_at": now,
                    "updated_at": now,
                }),
            )
            .await?;

        info!(plan_id = %plan.id, steps = plan.steps.len(), "Treatment plan created");
        Ok(view(plan))
    }

    pub async fn get_plan(&self, clinic_id: Uuid, plan_id: Uuid) -> Result<TreatmentPlan, VisitError> {
        self.db
            .select_one(
                "treatment_plans",
                &format!("id=eq.{}&clinic_id=eq.{}", plan_id, clinic_id),
            )
            .await?
            .ok_or(VisitError::NotFound("Treatment plan"))
    }

    pub async fn get_plan_view(&self, clinic_id: Uuid, plan_id: Uuid) -> Result<TreatmentPlanView, VisitError> {
        self.get_plan(clinic_id, plan_id).await.map(view)
    }

    /// Every plan of a patient, whoever wrote it.
    pub async fn list_by_patient(&self, clinic_id: Uuid, patient_id: Uuid) -> Result<Vec<TreatmentPlanView>, VisitError> {
        let plans: Vec<TreatmentPlan> = self
            .db
            .select(
                "treatment_plans",
                &format!(
                    "clinic_id=eq.{}&patient_id=eq.{}&order=created_at.desc",
                    clinic_id, patient_id
                ),
            )
            .await?;
        Ok(plans.into_iter().map(view).collect())
    }

    pub async fn list_by_doctor(
        &self,
        clinic_id: Uuid,
        doctor_id: Uuid,
        status: Option<PlanStatus>,
    ) -> Result<Vec<TreatmentPlanView>, VisitError> {
        let mut query = format!("clinic_id=eq.{}&doctor_id=eq.{}", clinic_id, doctor_id);
        if let Some(status) = status {
            query.push_str(&format!("&status=eq.{}", status.as_str()));
        }
        query.push_str("&order=created_at.desc");

        let plans: Vec<TreatmentPlan> = self.db.select("treatment_plans", &query).await?;
        Ok(plans.into_iter().map(view).collect())
    }

    pub async fn update_step(
        &self,
        clinic_id: Uuid,
        plan_id: Uuid,
        step_number: u32,
        request: UpdatePlanStepRequest,
    ) -> Result<TreatmentPlanView, VisitError> {
        let mut plan = self.get_plan(clinic_id, plan_id).await?;

        let step = plan
            .steps
            .iter_mut()
            .find(|step| step.step_number == step_number)
            .ok_or(VisitError::InvalidStep)?;

        step.status = request.status;
        step.completed_at = match request.status {
            StepStatus::Completed => step.completed_at.or(Some(Utc::now())),
            StepStatus::Pending => None,
        };
        if request.visit_id.is_some() {
            step.visit_id = request.visit_id;
        }
        if let Some(notes) = request.notes {
            step.notes = Some(notes);
        }

        let status = plan_status(&plan.steps);
        let updated: TreatmentPlan = self
            .db
            .update(
                "treatment_plans",
                &format!("id=eq.{}&clinic_id=eq.{}", plan_id, clinic_id),
                json!({
                    "steps": plan.steps,
                    "status": status,
                    "updated_at": Utc::now(),
                }),
            )
            .await?
            .ok_or(VisitError::NotFound("Treatment plan"))?;

        info!(%plan_id, step_number, status = status.as_str(), "Treatment plan step updated");
        Ok(view(updated))
    }

    pub async fn delete_plan(&self, clinic_id: Uuid, plan_id: Uuid) -> Result<(), VisitError> {
        let removed = self
            .db
            .delete(
                "treatment_plans",
                &format!("id=eq.{}&clinic_id=eq.{}", plan_id, clinic_id),
            )
            .await?;

        if removed == 0 {
            return Err(VisitError::NotFound("Treatment plan"));
        }
        info!(%plan_id, "Treatment plan deleted");
        Ok(())
    }
}

/// Nothing done is pending, everything done is completed, anything between is in progress.
pub fn plan_status(steps: &[PlanStep]) -> PlanStatus {
    let done = steps.iter().filter(|s| s.status == StepStatus::Completed).count();
    if done == 0 {
        PlanStatus::Pending
    } else if done == steps.len() {
        PlanStatus::Completed
    } else {
        PlanStatus::InProgress
    }
}

pub fn progress(steps: &[PlanStep]) -> String {
    let done = steps.iter().filter(|s| s.status == StepStatus::Completed).count();
    format!("{}/{}", done, steps.len())
}

fn view(plan: TreatmentPlan) -> TreatmentPlanView {
    TreatmentPlanView {
        progress: progress(&plan.steps),
        plan,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(number: u32, status: StepStatus) -> PlanStep {
        PlanStep {
            step_number: number,
            description: format!("Step {}", number),
            status,
            visit_id: None,
            completed_at: None,
            notes: None,
        }
    }

    #[test]
    fn plan_status_follows_steps() {
        let pending = vec![step(1, StepStatus::Pending), step(2, StepStatus::Pending)];
        let partial = vec![step(1, StepStatus::Completed), step(2, StepStatus::Pending)];
        let done = vec![step(1, StepStatus::Completed), step(2, StepStatus::Completed)];

        assert_eq!(plan_status(&pending), PlanStatus::Pending);
        assert_eq!(plan_status(&partial), PlanStatus::InProgress);
        assert_eq!(plan_status(&done), PlanStatus::Completed);
    }

    #[test]
    fn progress_counts_completed_steps() {
        let steps = vec![
            step(1, StepStatus::Completed),
            step(2, StepStatus::Completed),
            step(3, StepStatus::Pending),
        ];
        assert_eq!(progress(&steps), "2/3");
    }
}
