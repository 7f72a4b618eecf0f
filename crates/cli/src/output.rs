//! Output formatting for CLI

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use orderprobe_harness::{Outcome, RunReport};

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

impl TableDisplay for Outcome {
    fn headers() -> Vec<&'static str> {
        vec!["Account", "Index", "Result", "Order", "Detail", "ms"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.actor.user_name.clone(),
            self.actor.order_index.to_string(),
            if self.succeeded { "✓ pass".to_string() } else { "✗ fail".to_string() },
            self.order_id.clone().unwrap_or_else(|| "-".to_string()),
            self.failure
                .as_ref()
                .map(|f| f.to_string())
                .unwrap_or_default(),
            self.duration_ms.to_string(),
        ]
    }
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    if items.is_empty() {
        println!("No accounts to run.");
        return;
    }

    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }

            println!("{table}");
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(items).unwrap_or_default());
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(items).unwrap_or_default());
        }
    }
}

/// Print the outcomes and a one-line summary of a run
pub fn print_report(report: &RunReport, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            print_list(&report.outcomes, format);
            let summary = format!(
                "{} passed, {} failed of {} ({} ms)",
                report.passed, report.failed, report.total, report.duration_ms
            );
            if report.all_passed() {
                print_success(&summary);
            } else {
                print_error(&summary);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report).unwrap_or_default());
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(report).unwrap_or_default());
        }
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}
