//! HTTP surface: gateway webhooks, sweep triggers, and the queue API.

pub mod auth;
pub mod handlers;
pub mod server;

use std::sync::Arc;

use crate::automation::scheduler::AutomationScheduler;
use crate::automation::writer::QueueWriter;
use crate::config::GlobalConfig;
use crate::delivery::gateway::Gateway;
use crate::delivery::pacer::Pacer;
use crate::delivery::processor::QueueProcessor;
use crate::persistence::db::Database;
use crate::reconcile::Reconciler;

/// Shared state behind every route.
pub struct AppState {
    /// Global configuration, including the loaded API token.
    pub config: Arc<GlobalConfig>,
    /// Manual enqueue path.
    pub writer: QueueWriter,
    /// Daily automation sweep.
    pub scheduler: Arc<AutomationScheduler>,
    /// Delivery sweep and manual retry.
    pub processor: Arc<QueueProcessor>,
    /// Webhook reconciliation.
    pub reconciler: Reconciler,
}

impl AppState {
    /// Wire every component over one database pool.
    #[must_use]
    pub fn new(
        config: Arc<GlobalConfig>,
        db: &Arc<Database>,
        gateway: Arc<dyn Gateway>,
        pacer: Arc<dyn Pacer>,
    ) -> Self {
        Self {
            writer: QueueWriter::new(Arc::clone(db), config.queue.max_attempts),
            scheduler: Arc::new(AutomationScheduler::new(Arc::clone(db), &config)),
            processor: Arc::new(QueueProcessor::new(
                Arc::clone(db),
                gateway,
                pacer,
                config.queue.clone(),
            )),
            reconciler: Reconciler::new(Arc::clone(db), config.reconcile.echo_window_seconds),
            config,
        }
    }
}
