use std::sync::Arc;

use crate::brain::AgentBrain;
use crate::executors::ExecutorSet;
use crate::store::Store;

/// Shared, explicitly constructed dependencies. Built once at startup and
/// cloned into handlers. No module-level singletons, so tests can assemble
/// a state from doubles.
#[derive(Clone)]
pub struct AppState {
    pub brain: Arc<AgentBrain>,
    pub store: Arc<dyn Store>,
    pub executors: Arc<ExecutorSet>,
}
