// ABOUTME: Resolution scope for placeholder interpolation
// ABOUTME: Holds workflow parameters and prior-step outputs as literal values

use std::collections::HashMap;

/// Names visible to `${...}` placeholders when a step is dispatched.
/// Parameters shadow step outputs on a name collision.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    parameters: HashMap<String, String>,
    outputs: HashMap<String, String>,
}

impl Scope {
    pub fn new(parameters: HashMap<String, String>, outputs: HashMap<String, String>) -> Self {
        Self {
            parameters,
            outputs,
        }
    }

    /// Build a scope from workflow defaults merged with caller-supplied
    /// parameter values; caller values take precedence.
    pub fn from_parameters<I>(defaults: I, overrides: &HashMap<String, String>) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut parameters: HashMap<String, String> = defaults.into_iter().collect();
        parameters.extend(overrides.clone());
        Self {
            parameters,
            outputs: HashMap::new(),
        }
    }

    pub fn with_outputs(mut self, outputs: HashMap<String, String>) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn set_output(&mut self, name: String, value: String) {
        self.outputs.insert(name, value);
    }

    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.parameters
            .get(name)
            .or_else(|| self.outputs.get(name))
            .map(String::as_str)
    }

    pub fn parameters(&self) -> &HashMap<String, String> {
        &self.parameters
    }
}
