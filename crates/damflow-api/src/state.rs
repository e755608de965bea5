//! Application state shared by handlers and the job worker.

use std::sync::{Arc, Weak};

use damflow_core::{AccessChecker, GroupMembership, MembershipAccessChecker, ToolSettings};
use damflow_db::{AssetStore, JobStore};
use damflow_processing::AssetPipeline;
use damflow_storage::StorageLocator;
use damflow_worker::{JobHandlerContext, JobQueue, JobQueueConfig};
use sqlx::PgPool;

/// Everything needed to assemble [`AppState`]. Stores are trait objects so tests can
/// swap in the in-memory implementations.
pub struct AppDependencies {
    pub assets: Arc<dyn AssetStore>,
    pub jobs: Arc<dyn JobStore>,
    pub membership: Arc<dyn GroupMembership>,
    pub locator: StorageLocator,
    pub tools: ToolSettings,
    pub queue: JobQueueConfig,
    pub max_upload_size_bytes: u64,
    /// Enables LISTEN/NOTIFY wake-ups for the worker pool
    pub pool: Option<PgPool>,
}

pub struct AppState {
    pub assets: Arc<dyn AssetStore>,
    pub access: Arc<dyn AccessChecker>,
    pub locator: StorageLocator,
    pub pipeline: AssetPipeline,
    pub queue: JobQueue,
    pub max_upload_size_bytes: u64,
    pub pool: Option<PgPool>,
}

impl AppState {
    /// Builds the state and starts the worker pool, which dispatches claimed jobs back
    /// into this state through a weak reference.
    pub fn new(deps: AppDependencies) -> Arc<Self> {
        let AppDependencies {
            assets,
            jobs,
            membership,
            locator,
            tools,
            queue,
            max_upload_size_bytes,
            pool,
        } = deps;

        Arc::new_cyclic(|weak: &Weak<AppState>| {
            let context: Weak<dyn JobHandlerContext> = weak.clone();
            let queue = JobQueue::new(jobs, queue, context, pool.clone());

            AppState {
                pipeline: AssetPipeline::new(assets.clone(), locator.clone(), tools),
                access: Arc::new(MembershipAccessChecker::new(membership)),
                assets,
                locator,
                queue,
                max_upload_size_bytes,
                pool,
            }
        })
    }
}
