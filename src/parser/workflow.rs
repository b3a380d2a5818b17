// ABOUTME: Core workflow data structures and parsing functionality
// ABOUTME: Defines the main Workflow struct and YAML loading helpers

use indexmap::IndexMap;
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use super::error::{ParserError, Result};
use super::step::StepConfig;
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub name: String,
    pub description: Option<String>,
    /// Workflow parameters with their default values; caller-supplied
    /// values override these at execution time.
    #[serde(default)]
    pub parameters: IndexMap<String, String>,
    #[serde(deserialize_with = "unique_steps")]
    pub steps: IndexMap<String, StepConfig>,
    /// Default timeout applied to steps that do not set their own.
    #[serde(with = "humantime_serde", default)]
    pub timeout: Option<Duration>,
}

/// Step names are unique by invariant; a plain map deserialize would
/// silently keep only the last definition of a duplicated key.
fn unique_steps<'de, D>(deserializer: D) -> std::result::Result<IndexMap<String, StepConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    struct StepsVisitor;

    impl<'de> Visitor<'de> for StepsVisitor {
        type Value = IndexMap<String, StepConfig>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a map of uniquely named step definitions")
        }

        fn visit_map<A>(self, mut access: A) -> std::result::Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut steps = IndexMap::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((name, step)) = access.next_entry::<String, StepConfig>()? {
                if steps.insert(name.clone(), step).is_some() {
                    return Err(de::Error::custom(format!(
                        "duplicate step name '{}'",
                        name
                    )));
                }
            }
            Ok(steps)
        }
    }

    deserializer.deserialize_map(StepsVisitor)
}

impl Workflow {
    /// Parse a workflow from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ParserError::IoError)?;
        Self::from_yaml(&content)
    }

    /// Parse a workflow from a YAML file, asynchronously
    pub async fn from_file_async<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .await
            .map_err(ParserError::IoError)?;
        Self::from_yaml(&content)
    }

    /// Parse a workflow from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self> {
        let workflow: Workflow = serde_yaml::from_str(content).map_err(ParserError::YamlError)?;
        workflow.validate_structure()?;
        Ok(workflow)
    }

    /// Validate basic workflow structure; deeper validation is the
    /// compiler's job so that all issues can be aggregated at once.
    fn validate_structure(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ParserError::MissingField("name".to_string()));
        }
        if self.steps.is_empty() {
            return Err(ParserError::EmptyWorkflow);
        }
        Ok(())
    }

    /// Get all step names in definition order
    pub fn step_names(&self) -> Vec<String> {
        self.steps.keys().cloned().collect()
    }

    pub fn get_step(&self, name: &str) -> Option<&StepConfig> {
        self.steps.get(name)
    }

    /// Get all steps that list the given step as a dependency
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        self.steps
            .iter()
            .filter_map(|(id, step)| {
                if step.depends.iter().any(|d| d == name) {
                    Some(id.clone())
                } else {
                    None
                }
            })
            .collect()
    }

    /// Serialize the workflow back to YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(ParserError::YamlError)
    }
}
