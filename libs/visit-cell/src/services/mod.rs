pub mod calculator;
pub mod treatment_plan;
pub mod upload;
pub mod visit;

pub use treatment_plan::TreatmentPlanService;
pub use upload::ImageStore;
pub use visit::VisitService;
