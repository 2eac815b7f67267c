//! Table and text formatting for command output.

use serde::Serialize;
use tabled::{Table, Tabled};

use wave_host::{CommandResult, CommandStatus};
use wave_module::ModuleRecord;

/// One row of the `module list` table.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct ModuleRow {
    /// Module name.
    #[tabled(rename = "Name")]
    pub name: String,
    /// Module version.
    #[tabled(rename = "Version")]
    pub version: String,
    /// Lifecycle state.
    #[tabled(rename = "State")]
    pub state: String,
    /// Load time.
    #[tabled(rename = "Loaded At")]
    pub loaded_at: String,
    /// Source binary.
    #[tabled(rename = "Path")]
    pub path: String,
}

impl From<&ModuleRecord> for ModuleRow {
    fn from(record: &ModuleRecord) -> Self {
        Self {
            name: record.name.clone(),
            version: record.version.clone(),
            state: record.state.to_string(),
            loaded_at: record
                .loaded_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string()),
            path: record.path.display().to_string(),
        }
    }
}

/// Renders records as a table, or a placeholder when empty.
pub fn module_table(records: &[ModuleRecord]) -> String {
    if records.is_empty() {
        return "No modules loaded.".to_string();
    }
    let rows: Vec<ModuleRow> = records.iter().map(ModuleRow::from).collect();
    Table::new(rows).to_string()
}

/// Formats a command result for the interactive session.
pub fn format_result(result: &CommandResult) -> String {
    let status = match result.status {
        CommandStatus::Success => "SUCCESS",
        CommandStatus::Warning => "WARNING",
        CommandStatus::Error => "ERROR",
    };
    let mut text = format!("[{status}] {}", result.message);
    if let Some(serde_json::Value::String(data)) = &result.data {
        text.push_str(&format!("\nData: {data}"));
    }
    text
}
