//! Pipeline catalog
//!
//! The static, immutable set of pipelines that runs can be started from.
//! Built once at startup, either from the built-in definitions or from a
//! JSON document, and shared read-only afterwards.

use std::collections::BTreeMap;

use crate::domain::pipeline::{PipelineDefinition, StepDefinition};

/// Pipeline started when a run request does not name one
pub const DEFAULT_PIPELINE: &str = "app-ci";

/// Immutable lookup of pipeline definitions by name
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pipelines: BTreeMap<String, PipelineDefinition>,
}

impl Catalog {
    /// Builds a catalog, validating every pipeline and rejecting duplicate names
    pub fn new(pipelines: Vec<PipelineDefinition>) -> Result<Self, String> {
        let mut map = BTreeMap::new();

        for pipeline in pipelines {
            pipeline.validate()?;

            if map.contains_key(&pipeline.name) {
                return Err(format!("duplicate pipeline name '{}'", pipeline.name));
            }

            map.insert(pipeline.name.clone(), pipeline);
        }

        Ok(Self { pipelines: map })
    }

    /// Parses a catalog from a JSON array of pipeline definitions
    pub fn from_json(json: &str) -> Result<Self, String> {
        let pipelines: Vec<PipelineDefinition> =
            serde_json::from_str(json).map_err(|e| format!("invalid catalog JSON: {}", e))?;
        Self::new(pipelines)
    }

    /// The built-in `app-ci` and `api-ci` pipelines
    pub fn builtin() -> Self {
        let step = |name: &str| {
            let (min, max, p) = builtin_step_profile(name);
            StepDefinition::new(name, min, max, p)
        };

        let app_ci = PipelineDefinition::new(
            "app-ci",
            [
                "checkout",
                "install-deps",
                "lint",
                "unit-tests",
                "build-artifact",
                "deploy-staging",
            ]
            .into_iter()
            .map(step)
            .collect(),
        );

        let api_ci = PipelineDefinition::new(
            "api-ci",
            [
                "checkout",
                "install-deps",
                "unit-tests",
                "integration-tests",
                "security-scan",
                "docker-build",
                "deploy-prod",
            ]
            .into_iter()
            .map(step)
            .collect(),
        );

        let mut pipelines = BTreeMap::new();
        pipelines.insert(app_ci.name.clone(), app_ci);
        pipelines.insert(api_ci.name.clone(), api_ci);
        Self { pipelines }
    }

    pub fn get(&self, name: &str) -> Option<&PipelineDefinition> {
        self.pipelines.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pipelines.keys().map(String::as_str)
    }

    pub fn pipelines(&self) -> impl Iterator<Item = &PipelineDefinition> {
        self.pipelines.values()
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }
}

/// Duration range in milliseconds and failure probability of a built-in step
fn builtin_step_profile(name: &str) -> (u64, u64, f64) {
    match name {
        "checkout" => (400, 900, 0.01),
        "install-deps" => (800, 1600, 0.04),
        "lint" => (600, 1400, 0.10),
        "unit-tests" => (1000, 2500, 0.12),
        "integration-tests" => (1300, 3000, 0.18),
        "security-scan" => (1000, 2800, 0.22),
        "build-artifact" => (800, 1800, 0.05),
        "docker-build" => (1200, 3200, 0.08),
        "deploy-staging" => (900, 2000, 0.10),
        "deploy-prod" => (1200, 2600, 0.16),
        _ => (800, 1800, 0.10),
    }
}
