//! Output formatting for CLI commands.
//!
//! Supports table (human-readable) and JSON output formats.

use std::io::Write;

use locksmith_pki::Response;
use serde::Serialize;
use serde_json::Value;

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter that handles both table and JSON output.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Write a serializable value to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)
                    .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Table => {
                value.write_table(writer)?;
            }
        }
        Ok(())
    }

    /// Writes a response and turns a failed one into an error.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Failed`] when the response reports a failure.
    pub fn report<W: Write>(&self, writer: &mut W, response: Response) -> Result<(), CliError> {
        self.write(writer, &response)?;
        if response.success {
            Ok(())
        } else {
            Err(CliError::Failed {
                status: response.status,
                messages: response.messages,
            })
        }
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Table)
    }
}

/// Trait for types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value as a human-readable table.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

impl TableDisplay for Response {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        let mark = if self.success { "ok" } else { "failed" };
        writeln!(writer, "Status: {} ({mark})", self.status)?;
        writeln!(writer, "{}", "─".repeat(48))?;
        if let Some(data) = &self.data {
            write_value(writer, data, 0)?;
        }
        for message in &self.messages {
            writeln!(writer, "  - {message}")?;
        }
        for error in &self.errors {
            writeln!(writer, "Error: {error}")?;
        }
        Ok(())
    }
}

fn write_value<W: Write>(writer: &mut W, value: &Value, depth: usize) -> Result<(), CliError> {
    let indent = "  ".repeat(depth);
    match value {
        Value::Object(fields) => {
            for (key, field) in fields {
                match field {
                    Value::Object(_) | Value::Array(_) => {
                        writeln!(writer, "{indent}{key}:")?;
                        write_value(writer, field, depth + 1)?;
                    }
                    Value::String(text) if text.contains('\n') => {
                        writeln!(writer, "{indent}{key}:")?;
                        writeln!(writer, "{}", text.trim_end())?;
                    }
                    other => writeln!(writer, "{indent}{key:<16}  {}", scalar(other))?,
                }
            }
        }
        Value::Array(items) if items.is_empty() => writeln!(writer, "{indent}(none)")?,
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::Object(_) | Value::Array(_) => {
                        writeln!(writer, "{indent}-")?;
                        write_value(writer, item, depth + 1)?;
                    }
                    other => writeln!(writer, "{indent}{}", scalar(other))?,
                }
            }
        }
        Value::String(text) => writeln!(writer, "{}", text.trim_end())?,
        other => writeln!(writer, "{indent}{}", scalar(other))?,
    }
    Ok(())
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}
