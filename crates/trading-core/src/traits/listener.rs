//! Typed hook invoked after accepted executions.

use crate::types::ExecutionResult;

/// Observer notified by the orchestrator after an execution is accepted and
/// journaled.
pub trait ExecutionListener: Send + Sync {
    fn on_execution(&self, result: &ExecutionResult);
}
