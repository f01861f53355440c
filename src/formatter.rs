use std::io::{self, Write};

use serde_json::Value;

use crate::record::Record;

/// Renders records for console output.
///
/// Formatting is a side effect of `log()`: a failing formatter is reported
/// through `tracing` but never aborts the call.
pub trait Formatter: Send {
    fn format(&self, record: &Record, out: &mut dyn Write) -> io::Result<()>;
}

/// Prints one `key: value` line per field, indenting nested maps.
///
/// ```text
/// step: 3
/// loss: 0.25
/// optimizer:
///   lr: 0.001
/// ```
pub struct SimpleFormatter {
    padding: &'static str,
}

impl SimpleFormatter {
    pub fn new() -> Self {
        Self { padding: "  " }
    }

    fn write_map(
        &self,
        record: &Record,
        out: &mut dyn Write,
        depth: usize,
    ) -> io::Result<()> {
        for (key, value) in record {
            let indent = self.padding.repeat(depth);
            match value {
                Value::Object(nested) => {
                    writeln!(out, "{indent}{key}:")?;
                    self.write_map(nested, out, depth + 1)?;
                }
                other => writeln!(out, "{indent}{key}: {other}")?,
            }
        }
        Ok(())
    }
}

impl Default for SimpleFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter for SimpleFormatter {
    fn format(&self, record: &Record, out: &mut dyn Write) -> io::Result<()> {
        self.write_map(record, out, 0)
    }
}
