pub mod error;
pub mod executor;
pub mod format;
pub mod gateway;
pub mod glob;
pub mod model;
pub mod resolve;

pub use error::{AttemptError, ConstructionError, EmptyTargetSet, GatewayError, ResolutionError};
pub use executor::{FanOutExecutor, RestartPolicy};
pub use gateway::FleetGateway;
pub use model::{
    count_succeeded, Operation, OperationOutcome, ProgressStats, StartMode, StatusClass,
    TableStatRecord, TaskRecord, TaskStatus, ValidationKind, ValidationState,
};
pub use resolve::{resolve, resolve_targets, Resolution};
