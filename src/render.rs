//! Turn output rendering
//!
//! A node's display is its template with `{{.name}}` placeholders filled
//! from MAP-ed symbols, followed by one `selector:label` line per menu item
//! collected during the run.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::resource::Resource;
use crate::storage::StorageBackend;
use crate::vm::{MenuKind, PendingOutput, State};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*\.([A-Za-z0-9_]+)\s*\}\}").expect("placeholder pattern compiles")
});

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RenderError {
    /// Template refers to a symbol the node did not MAP
    #[error("Template uses unmapped symbol: {0}")]
    UnmappedSymbol(String),

    /// Rendered output exceeds the configured size
    #[error("Output is {size} bytes, limit is {limit}")]
    OutputTooLarge { size: usize, limit: usize },

    /// Template or label could not be read
    #[error("Storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, Default)]
pub struct Renderer {
    /// Maximum rendered size in bytes, 0 for unlimited
    output_size: usize,
}

impl Renderer {
    pub fn new(output_size: usize) -> Self {
        Self { output_size }
    }

    /// Substitute placeholders in `template`
    pub fn fill(&self, template: &str, st: &State, pending: &PendingOutput) -> Result<String, RenderError> {
        let mut out = String::with_capacity(template.len());
        let mut last = 0;
        for caps in PLACEHOLDER.captures_iter(template) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let name = name.as_str();
            let value = if pending.is_mapped(name) {
                st.symbols().get(name)
            } else {
                None
            };
            let value = value.ok_or_else(|| RenderError::UnmappedSymbol(name.to_string()))?;
            out.push_str(&template[last..whole.start()]);
            out.push_str(value);
            last = whole.end();
        }
        out.push_str(&template[last..]);
        Ok(out)
    }

    /// Render the display of `node` for the current turn
    pub fn render<S: StorageBackend>(
        &self,
        node: &str,
        st: &State,
        pending: &PendingOutput,
        rs: &Resource<S>,
    ) -> Result<String, RenderError> {
        let storage = |e: crate::storage::StorageError| RenderError::Storage(e.to_string());
        let template = rs.get_template(node).map_err(storage)?.unwrap_or_default();
        let mut lines = Vec::new();
        let body = self.fill(&template, st, pending)?;
        if !body.is_empty() {
            lines.push(body);
        }
        for item in pending.items() {
            if item.kind == MenuKind::Previous && st.page() == 0 {
                continue;
            }
            let label = rs.get_menu(&item.text).map_err(storage)?;
            lines.push(format!("{}:{}", item.selector, label));
        }

        let output = lines.join("\n");
        if self.output_size > 0 && output.len() > self.output_size {
            return Err(RenderError::OutputTooLarge {
                size: output.len(),
                limit: self.output_size,
            });
        }
        Ok(output)
    }
}
