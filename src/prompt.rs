//! Prompt templates and prompt assembly.
//!
//! Each mode has an optional template file `prompt_<key>.txt` in the prompts
//! directory (`prompt_ir.txt`, `prompt_threat_intel.txt`, `prompt_hybrid.txt`).
//! A missing file is not an error: [`DEFAULT_TEMPLATE`] is used instead.
//!
//! The composed prompt carries every instruction the model gets. The
//! generation client adds no system prompt of its own.

use std::path::{Path, PathBuf};

use crate::mode::Mode;
use crate::models::RetrievedChunk;

/// Used when a mode has no template file.
pub const DEFAULT_TEMPLATE: &str = "You are a cybersecurity analyst. Return valid JSON.";

const CONTEXT_HEADER: &str = "### Retrieved context";
const INPUT_HEADER: &str = "### User input";
const SCHEMA_HEADER: &str = "### Output format";

/// File-backed template lookup keyed by [`Mode::template_key`].
#[derive(Debug, Clone)]
pub struct PromptStore {
    dir: PathBuf,
}

impl PromptStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn template_path(&self, mode: Mode) -> PathBuf {
        self.dir
            .join(format!("prompt_{}.txt", mode.template_key()))
    }

    /// Template text for `mode`, or [`DEFAULT_TEMPLATE`] when absent.
    pub fn load_template(&self, mode: Mode) -> String {
        let path = self.template_path(mode);
        match read_template(&path) {
            Some(text) => text,
            None => {
                tracing::debug!(path = %path.display(), "no template, using default");
                DEFAULT_TEMPLATE.to_string()
            }
        }
    }

    /// Load the mode's template and assemble the full prompt.
    pub fn compose(&self, mode: Mode, user_input: &str, context: &[RetrievedChunk]) -> String {
        compose_prompt(&self.load_template(mode), mode, user_input, context)
    }
}

fn read_template(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(text) if !text.trim().is_empty() => Some(text),
        Ok(_) => None,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unreadable template, using default");
            None
        }
    }
}

/// Assemble a prompt in fixed order: template, retrieved context, user input,
/// output schema.
///
/// Chunk texts are joined with blank lines; the context block is left empty
/// when nothing was retrieved. The user input is inserted verbatim.
pub fn compose_prompt(
    template: &str,
    mode: Mode,
    user_input: &str,
    context: &[RetrievedChunk],
) -> String {
    let context_text = context
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "{template}\n\n{CONTEXT_HEADER}\n{context_text}\n\n{INPUT_HEADER}\n{user_input}\n\n{schema}",
        template = template.trim_end(),
        schema = schema_instruction(mode),
    )
}

/// Output contract the model must follow, with the applied mode pinned.
pub fn schema_instruction(mode: Mode) -> String {
    format!(
        r#"{SCHEMA_HEADER}
Respond with a single JSON object and nothing else. Required fields:
- "mode": exactly "{mode}"
- "events": list of {{"description": string, "severity": "High" | "Medium" | "Low", "tags": [string]}}
- "ioc": list of indicators of compromise (IP addresses, hashes, domains, file paths)
- "mitre": list of MITRE ATT&CK techniques (ID and name)
- "summary": string describing the main risk
- "severity": overall threat level, the highest severity seen among events ("High" | "Medium" | "Low")

Severity rules:
- High: reverse shells, malware creation or execution, outbound C2 traffic, privilege escalation.
- Medium: repeated failed logins, brute force, scans.
- Low: normal or benign activity."#,
        mode = mode.display_name()
    )
}
