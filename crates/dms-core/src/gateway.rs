use async_trait::async_trait;

use crate::error::GatewayError;
use crate::model::{StartMode, TableStatRecord, TaskRecord};

/// Client-side view of the replication control plane.
#[async_trait]
pub trait FleetGateway: Send + Sync {
    async fn list_tasks(&self) -> Result<Vec<TaskRecord>, GatewayError>;

    /// Not-found is reported as [`GatewayError::NotFound`].
    async fn describe_task(&self, arn: &str) -> Result<TaskRecord, GatewayError>;

    async fn table_statistics(&self, arn: &str) -> Result<Vec<TableStatRecord>, GatewayError>;

    async fn start_task(&self, arn: &str, mode: StartMode) -> Result<(), GatewayError>;

    async fn stop_task(&self, arn: &str) -> Result<(), GatewayError>;
}
