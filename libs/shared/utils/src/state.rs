use std::sync::Arc;

use tokio::task::JoinHandle;

use shared_config::AppConfig;
use shared_database::{AuditQueue, AuditSink, SupabaseClient};

use crate::jwt::JwtService;

/// Everything a handler needs, shared behind one `Arc` by every cell router.
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Arc<SupabaseClient>,
    pub jwt: JwtService,
    pub audit: AuditQueue,
}

impl AppState {
    /// Builds the store client and spawns the audit worker on the current runtime.
    pub fn new(config: AppConfig) -> (Arc<Self>, JoinHandle<()>) {
        let db = Arc::new(SupabaseClient::new(&config));
        let sink: Arc<dyn AuditSink> = db.clone();
        let (audit, worker) = AuditQueue::start(sink, config.audit_queue_capacity);

        (Self::with_parts(config, db, audit), worker)
    }

    pub fn with_parts(config: AppConfig, db: Arc<SupabaseClient>, audit: AuditQueue) -> Arc<Self> {
        Arc::new(Self {
            jwt: JwtService::new(&config),
            config: Arc::new(config),
            db,
            audit,
        })
    }
}
