pub mod audit_log;
pub mod catalog;
pub mod expenses;
pub mod reports;

pub use audit_log::AuditLogService;
pub use catalog::CatalogService;
pub use expenses::ExpenseService;
pub use reports::ReportService;
