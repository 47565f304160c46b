use anyhow::Result;
use codeflow_block_engine::Diagnostic;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Ok,
    Error,
}

/// JSON envelope printed on stdout with `--json`
#[derive(Debug, Serialize)]
pub struct Envelope<'a> {
    pub status: CommandStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: &'a Value,
    pub diagnostics: &'a [Diagnostic],
}

/// Result of one command: human text, structured data and diagnostics
#[derive(Debug, Default)]
pub struct CommandOutput {
    pub text: String,
    pub data: Value,
    pub diagnostics: Vec<Diagnostic>,
}

impl CommandOutput {
    pub fn new(text: impl Into<String>, data: Value) -> Self {
        Self {
            text: text.into(),
            data,
            diagnostics: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Vec<Diagnostic>) -> Self {
        self.diagnostics.extend(diagnostics);
        self
    }
}

/// `warning[kind] block: message`
pub fn render_diagnostic(diagnostic: &Diagnostic) -> String {
    match &diagnostic.block {
        Some(block) => format!(
            "warning[{}] {block}: {}",
            diagnostic.kind.as_str(),
            diagnostic.message
        ),
        None => format!("warning[{}] {}", diagnostic.kind.as_str(), diagnostic.message),
    }
}

pub fn emit(output: &CommandOutput, json: bool) -> Result<()> {
    if json {
        let envelope = Envelope {
            status: CommandStatus::Ok,
            message: None,
            data: &output.data,
            diagnostics: &output.diagnostics,
        };
        println!("{}", serde_json::to_string_pretty(&envelope)?);
        return Ok(());
    }

    for diagnostic in &output.diagnostics {
        eprintln!("{}", render_diagnostic(diagnostic));
    }
    if !output.text.is_empty() {
        if output.text.ends_with('\n') {
            print!("{}", output.text);
        } else {
            println!("{}", output.text);
        }
    }
    Ok(())
}

pub fn emit_error(err: &anyhow::Error, json: bool) -> Result<()> {
    if json {
        let envelope = Envelope {
            status: CommandStatus::Error,
            message: Some(format!("{err:#}")),
            data: &Value::Null,
            diagnostics: &[],
        };
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    } else {
        eprintln!("Error: {err:#}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeflow_block_engine::DiagnosticKind;

    #[test]
    fn diagnostic_rendering() {
        let tagged = Diagnostic::new(DiagnosticKind::Syntax, "block excluded").for_block("bad");
        assert_eq!(render_diagnostic(&tagged), "warning[syntax] bad: block excluded");

        let untagged = Diagnostic::new(DiagnosticKind::Style, "driver renamed");
        assert_eq!(render_diagnostic(&untagged), "warning[style] driver renamed");
    }

    #[test]
    fn envelope_shape() {
        let data = serde_json::json!(["a"]);
        let envelope = Envelope {
            status: CommandStatus::Ok,
            message: None,
            data: &data,
            diagnostics: &[],
        };
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"status": "ok", "data": ["a"], "diagnostics": []})
        );
    }
}
