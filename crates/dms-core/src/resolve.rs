use std::collections::HashSet;

use tracing::debug;

use crate::error::{EmptyTargetSet, GatewayError, ResolutionError};
use crate::gateway::FleetGateway;
use crate::glob;
use crate::model::TaskRecord;

pub const ARN_PREFIX: &str = "arn:";
pub const ALL_TOKEN: &str = "all";

/// Identifiers resolved from user input, plus the non-fatal problems found
/// along the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub identifiers: Vec<String>,
    pub warnings: Vec<ResolutionError>,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    /// Command-mode view: an empty set is an error.
    pub fn require_targets(&self) -> Result<&[String], EmptyTargetSet> {
        if self.identifiers.is_empty() {
            Err(EmptyTargetSet)
        } else {
            Ok(&self.identifiers)
        }
    }

    fn push(&mut self, seen: &mut HashSet<String>, arn: &str) {
        if seen.insert(arn.to_string()) {
            self.identifiers.push(arn.to_string());
        }
    }
}

pub fn is_identifier(input: &str) -> bool {
    input.starts_with(ARN_PREFIX)
}

fn is_all(input: &str) -> bool {
    input == ALL_TOKEN || input == "*"
}

/// True when at least one requested string needs the fleet listing.
pub fn needs_fleet<S: AsRef<str>>(requested: &[S]) -> bool {
    requested.iter().any(|item| !is_identifier(item.as_ref()))
}

/// Resolve names, patterns and identifiers against one fleet snapshot.
/// Identifiers appear once, at the position they were first resolved.
pub fn resolve<S: AsRef<str>>(requested: &[S], fleet: &[TaskRecord]) -> Resolution {
    let mut resolution = Resolution::default();
    let mut seen = HashSet::new();

    for item in requested {
        let item = item.as_ref();
        if is_identifier(item) {
            resolution.push(&mut seen, item);
        } else if is_all(item) {
            for task in fleet {
                resolution.push(&mut seen, &task.arn);
            }
        } else if glob::is_pattern(item) {
            let mut matched = 0usize;
            for task in fleet.iter().filter(|task| glob::matches(item, &task.name)) {
                resolution.push(&mut seen, &task.arn);
                matched += 1;
            }
            debug!(pattern = item, matched, "pattern resolved");
            if matched == 0 {
                resolution
                    .warnings
                    .push(ResolutionError::PatternMatchedNothing(item.to_string()));
            }
        } else {
            let found: Vec<&TaskRecord> = fleet.iter().filter(|task| task.name == item).collect();
            match found.as_slice() {
                [task] => resolution.push(&mut seen, &task.arn),
                [] => resolution
                    .warnings
                    .push(ResolutionError::NameNotFound(item.to_string())),
                many => resolution.warnings.push(ResolutionError::AmbiguousName {
                    name: item.to_string(),
                    count: many.len(),
                }),
            }
        }
    }

    resolution
}

/// Gateway-backed resolution. Lists the fleet at most once, and not at all
/// when every requested string is already an identifier.
pub async fn resolve_targets<S: AsRef<str> + Sync>(
    gateway: &dyn FleetGateway,
    requested: &[S],
) -> Result<Resolution, GatewayError> {
    let fleet = if needs_fleet(requested) {
        gateway.list_tasks().await?
    } else {
        Vec::new()
    };
    Ok(resolve(requested, &fleet))
}
