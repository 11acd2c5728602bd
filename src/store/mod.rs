pub mod connection;
pub mod findings;
pub mod schema;

use async_trait::async_trait;

use crate::errors::TriageError;
use crate::models::Finding;

pub use connection::Database;

/// Durable keyed storage of findings per task. Reads reflect all writes from
/// the same or an earlier completed triage run.
#[async_trait]
pub trait FindingStore: Send + Sync {
    async fn insert(&self, finding: &Finding) -> Result<(), TriageError>;

    /// Rewrite one finding's triage fields, atomically per finding.
    async fn update(&self, finding: &Finding) -> Result<(), TriageError>;

    /// Rewrite two findings' triage fields in a single transaction. Used for
    /// the demotion unit: a newly-matched finding and the finding it demotes
    /// must never be persisted half-applied.
    async fn update_pair(&self, first: &Finding, second: &Finding) -> Result<(), TriageError>;

    async fn list_by_task(&self, task_id: &str) -> Result<Vec<Finding>, TriageError>;

    async fn list_by_agent_and_task(
        &self,
        task_id: &str,
        agent_id: &str,
    ) -> Result<Vec<Finding>, TriageError>;
}
