//! Output formatting: table, JSON, YAML, plain.
//!
//! Table uses `tabled`, structured formats use serde, plain emits one
//! name per line.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use wnetctl_core::CompensationWarning;

use crate::cli::OutputFormat;
use crate::error::CliError;

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list in the chosen format.
pub fn render_list<T, R>(
    format: OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            Ok(render_table(&rows))
        }
        OutputFormat::Json => render_json(data),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => Ok(data.iter().map(&id_fn).collect::<Vec<_>>().join("\n")),
    }
}

/// Render a single item. Tables use `detail_fn` instead of a `Tabled` row.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => Ok(detail_fn(data)),
        OutputFormat::Json => render_json(data),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => Ok(id_fn(data)),
    }
}

/// Print to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

/// Confirmation line on stderr, so stdout stays machine-readable.
pub fn print_done(message: &str, quiet: bool) {
    if quiet {
        return;
    }
    if io::stderr().is_terminal() {
        eprintln!("{} {message}", "✓".green());
    } else {
        eprintln!("{message}");
    }
}

/// Warnings are printed even with `--quiet`.
pub fn print_warnings(warnings: &[CompensationWarning]) {
    let color = io::stderr().is_terminal();
    for warning in warnings {
        if color {
            eprintln!("{} {warning}", "warning:".yellow().bold());
        } else {
            eprintln!("warning: {warning}");
        }
    }
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json<T: serde::Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(data).map_err(|e| CliError::Validation {
        field: "output".into(),
        reason: e.to_string(),
    })
}

pub(crate) fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    Ok(serde_yaml::to_string(data)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(serde::Serialize)]
    struct Item {
        name: String,
    }

    #[derive(Tabled)]
    struct Row {
        #[tabled(rename = "Name")]
        name: String,
    }

    fn items() -> Vec<Item> {
        vec![Item { name: "hall".into() }, Item { name: "yard".into() }]
    }

    #[test]
    fn plain_lists_one_name_per_line() {
        let out = render_list(
            OutputFormat::Plain,
            &items(),
            |i| Row { name: i.name.clone() },
            |i| i.name.clone(),
        )
        .unwrap();
        assert_eq!(out, "hall\nyard");
    }

    #[test]
    fn table_has_header_and_rows() {
        let out = render_list(
            OutputFormat::Table,
            &items(),
            |i| Row { name: i.name.clone() },
            |i| i.name.clone(),
        )
        .unwrap();
        assert!(out.contains("Name"));
        assert!(out.contains("yard"));
    }

    #[test]
    fn json_serializes_original_data() {
        let out = render_list(
            OutputFormat::Json,
            &items(),
            |i| Row { name: i.name.clone() },
            |i| i.name.clone(),
        )
        .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed[1]["name"], "yard");
    }
}
