//! Pipeline domain types

use serde::{Deserialize, Serialize};

/// Pipeline definition
///
/// Defined once at startup and never mutated. Runs are started by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub name: String,
    pub steps: Vec<StepDefinition>,
}

/// A single simulated step of a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    pub name: String,
    pub min_duration_ms: u64,
    pub max_duration_ms: u64,
    /// Probability in `[0.0, 1.0]` that the step fails
    pub failure_probability: f64,
}

impl StepDefinition {
    pub fn new(
        name: impl Into<String>,
        min_duration_ms: u64,
        max_duration_ms: u64,
        failure_probability: f64,
    ) -> Self {
        Self {
            name: name.into(),
            min_duration_ms,
            max_duration_ms,
            failure_probability,
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("step name cannot be empty".to_string());
        }

        if self.min_duration_ms > self.max_duration_ms {
            return Err(format!(
                "step '{}' has min_duration_ms {} greater than max_duration_ms {}",
                self.name, self.min_duration_ms, self.max_duration_ms
            ));
        }

        if !(0.0..=1.0).contains(&self.failure_probability) {
            return Err(format!(
                "step '{}' has failure_probability {} outside [0.0, 1.0]",
                self.name, self.failure_probability
            ));
        }

        Ok(())
    }
}

impl PipelineDefinition {
    pub fn new(name: impl Into<String>, steps: Vec<StepDefinition>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    /// Checks that the pipeline is well-formed
    ///
    /// A pipeline needs a name, at least one step, and every step must have a
    /// sane duration range and a failure probability within `[0.0, 1.0]`.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("pipeline name cannot be empty".to_string());
        }

        if self.steps.is_empty() {
            return Err(format!("pipeline '{}' has no steps", self.name));
        }

        for step in &self.steps {
            step.validate()
                .map_err(|e| format!("pipeline '{}': {}", self.name, e))?;
        }

        Ok(())
    }
}
