pub mod audit;
pub mod supabase;

pub use audit::{AuditAction, AuditEntry, AuditQueue, AuditSink, AuditWorker, RetryPolicy};
pub use supabase::{format_timestamp, StoreError, SupabaseClient};
