//! Terraform root-module outputs
//!
//! Parses the document printed by `terraform output -json`.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One output value as reported by Terraform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputMeta {
    /// Whether the output is marked `sensitive = true`
    pub sensitive: bool,
    /// Terraform type constraint (e.g. `"string"`, `["list","string"]`)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<serde_json::Value>,
    /// The output value
    pub value: serde_json::Value,
}

impl OutputMeta {
    pub fn new(value: serde_json::Value, sensitive: bool) -> Self {
        OutputMeta {
            sensitive,
            value_type: None,
            value,
        }
    }

    /// Render the value for display: strings bare, everything else as JSON.
    pub fn render_value(&self) -> String {
        match &self.value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// All outputs of a state, keyed by output name
pub type OutputSet = BTreeMap<String, OutputMeta>;

/// Parse `terraform output -json` stdout. Empty output means no outputs.
pub fn parse_outputs(stdout: &[u8]) -> Result<OutputSet> {
    if stdout.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(OutputSet::new());
    }
    Ok(serde_json::from_slice(stdout)?)
}
