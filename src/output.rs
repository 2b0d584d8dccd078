//! Table and JSON output formatting for CLI commands.

use serde::Serialize;
use serde_json::Value;
use tabled::{Table, Tabled};

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text and tables
    #[default]
    Table,
    /// JSON output
    Json,
}

/// Print a list of items in the selected format
pub fn print_list<T: Serialize + Tabled>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("No entries.");
            } else {
                let table = Table::new(items).to_string();
                println!("{}", table);
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(items).unwrap_or_else(|_| "[]".to_string());
            println!("{}", json);
        }
    }
}

/// Print a single item in the selected format.
///
/// In table mode a struct of sections prints as `[section]` headers
/// followed by aligned fields.
pub fn print_item<T: Serialize + std::fmt::Debug>(item: &T, format: OutputFormat) {
    match (format, serde_json::to_value(item)) {
        (OutputFormat::Table, Ok(Value::Object(sections))) => {
            for (name, section) in sections {
                match section {
                    Value::Object(fields) => {
                        println!("[{}]", name);
                        for (key, value) in fields {
                            print_kv(&key, &scalar(&value));
                        }
                    }
                    other => print_kv(&name, &scalar(&other)),
                }
            }
        }
        (OutputFormat::Table, _) => println!("{:#?}", item),
        (OutputFormat::Json, _) => {
            let json = serde_json::to_string_pretty(item).unwrap_or_else(|_| "{}".to_string());
            println!("{}", json);
        }
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Print a cached value. Strings print bare in table mode.
pub fn print_value(value: &Value, format: OutputFormat) {
    match (format, value) {
        (OutputFormat::Table, Value::String(s)) => println!("{}", s),
        (OutputFormat::Table, other) => println!("{}", other),
        (OutputFormat::Json, other) => {
            let json = serde_json::to_string_pretty(other).unwrap_or_else(|_| "null".to_string());
            println!("{}", json);
        }
    }
}

/// Print a success message
pub fn print_success(msg: &str) {
    println!("✓ {}", msg);
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("⚠ {}", msg);
}

/// Print an error message
pub fn print_error(msg: &str) {
    eprintln!("✗ {}", msg);
}

/// Print a key-value pair
pub fn print_kv(key: &str, value: &str) {
    println!("  {:<24} {}", format!("{}:", key), value);
}
