//! Output formatters for discovery results.

use clap::ValueEnum;
use comfy_table::{Cell, Table};
use serde_json::json;
use uniqguard_core::constraint::sql::Param;
use uniqguard_core::Value;

use crate::commands::{CheckReport, DescriptorRow, QueryRow};

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format
    Table,
    /// JSON format
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Trait for formatting output.
pub trait Formatter: Send + Sync {
    /// Format extracted descriptors.
    fn format_descriptors(&self, rows: &[DescriptorRow]) -> String;

    /// Format an extraction check report.
    fn format_check(&self, report: &CheckReport) -> String;

    /// Format rendered existence queries.
    fn format_queries(&self, rows: &[QueryRow]) -> String;
}

/// Create a formatter for the given output format.
pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Table => Box::new(TableFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// Table formatter using comfy-table.
pub struct TableFormatter;

impl Formatter for TableFormatter {
    fn format_descriptors(&self, rows: &[DescriptorRow]) -> String {
        if rows.is_empty() {
            return "No unique constraints".to_string();
        }

        let mut table = Table::new();
        table.set_header(vec!["App", "Entity", "Constraint", "Fields", "Condition"]);
        for row in rows {
            table.add_row(vec![
                Cell::new(&row.app),
                Cell::new(&row.entity),
                Cell::new(&row.name),
                Cell::new(row.fields.join(", ")),
                Cell::new(row.condition.as_deref().unwrap_or("-")),
            ]);
        }

        format!("{}\n({} constraints)", table, rows.len())
    }

    fn format_check(&self, report: &CheckReport) -> String {
        let mut table = Table::new();
        table.set_header(vec!["Entity", "Status", "Detail"]);
        for (entity, count) in &report.passed {
            table.add_row(vec![
                Cell::new(entity),
                Cell::new("ok"),
                Cell::new(format!("{} constraints", count)),
            ]);
        }
        for (entity, error) in &report.failed {
            table.add_row(vec![Cell::new(entity), Cell::new("error"), Cell::new(error)]);
        }

        format!(
            "{}\n{} ok, {} failed",
            table,
            report.passed.len(),
            report.failed.len()
        )
    }

    fn format_queries(&self, rows: &[QueryRow]) -> String {
        if rows.is_empty() {
            return "No unique constraints".to_string();
        }

        let mut table = Table::new();
        table.set_header(vec!["Entity", "Constraint", "SQL", "Parameters"]);
        for row in rows {
            let params: Vec<String> = row.query.params.iter().map(format_param).collect();
            table.add_row(vec![
                Cell::new(&row.entity),
                Cell::new(&row.name),
                Cell::new(&row.query.sql),
                Cell::new(params.join(", ")),
            ]);
        }

        table.to_string()
    }
}

/// JSON formatter.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_descriptors(&self, rows: &[DescriptorRow]) -> String {
        let items: Vec<serde_json::Value> = rows
            .iter()
            .map(|row| {
                json!({
                    "app": row.app,
                    "entity": row.entity,
                    "name": row.name,
                    "fields": row.fields,
                    "condition": row.condition,
                })
            })
            .collect();
        to_pretty(&serde_json::Value::Array(items))
    }

    fn format_check(&self, report: &CheckReport) -> String {
        let passed: Vec<serde_json::Value> = report
            .passed
            .iter()
            .map(|(entity, count)| json!({"entity": entity, "constraints": count}))
            .collect();
        let failed: Vec<serde_json::Value> = report
            .failed
            .iter()
            .map(|(entity, error)| json!({"entity": entity, "error": error.to_string()}))
            .collect();
        to_pretty(&json!({"ok": report.is_ok(), "passed": passed, "failed": failed}))
    }

    fn format_queries(&self, rows: &[QueryRow]) -> String {
        let items: Vec<serde_json::Value> = rows
            .iter()
            .map(|row| {
                let params: Vec<String> = row.query.params.iter().map(format_param).collect();
                json!({
                    "entity": row.entity,
                    "name": row.name,
                    "sql": row.query.sql,
                    "params": params,
                    "locked": row.query.locked,
                })
            })
            .collect();
        to_pretty(&serde_json::Value::Array(items))
    }
}

fn to_pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}

/// Describe a parameter slot: the row field it binds, or the literal.
fn format_param(param: &Param) -> String {
    match param {
        Param::Key(field) => format!(":{}", field),
        Param::Literal(Value::String(s)) => format!("'{}'", s),
        Param::Literal(value) => value.to_string(),
        Param::Identity => ":identity".to_string(),
    }
}
