use crate::domain::models::Plan;
use crate::infrastructure::error::InfraError;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

pub fn load_plan(path: &Path) -> Result<Plan, InfraError> {
    let raw = fs::read_to_string(path).map_err(|error| match error.kind() {
        ErrorKind::NotFound => InfraError::NotFound {
            path: path.to_path_buf(),
        },
        _ => InfraError::Io(error),
    })?;

    let plan: Plan = serde_json::from_str(&raw).map_err(|error| InfraError::Parse {
        path: path.to_path_buf(),
        message: error.to_string(),
    })?;

    tracing::debug!(
        path = %path.display(),
        phases = plan.phases.len(),
        total_weeks = plan.total_weeks(),
        "loaded workout plan"
    );
    Ok(plan)
}
