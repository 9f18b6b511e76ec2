//! Terminal presentation for stage outputs and errors.

use crate::error::CoreError;
use crate::request::Stage;
use comfy_table::{presets, Table};
use owo_colors::OwoColorize;

pub fn success_line(message: &str) -> String {
    format!("{} {}", "✓".green(), message)
}

/// Version report rendered as a small field/value table.
pub fn format_version_report(report: &serde_json::Value) -> String {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_BORDERS_ONLY);
    table.set_header(["Field", "Value"]);
    for field in ["version", "source", "state", "tracking_id"] {
        let value = match &report[field] {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => "-".to_string(),
            other => other.to_string(),
        };
        table.add_row([field.to_string(), value]);
    }
    table.to_string()
}

pub fn format_validation_report(report: &serde_json::Value) -> String {
    if report["valid"].as_bool().unwrap_or(false) {
        return success_line("Project is valid");
    }
    let mut out = format!("{} Project has problems:", "✗".red());
    if let Some(problems) = report["problems"].as_array() {
        for problem in problems {
            if let Some(text) = problem.as_str() {
                out.push_str("\n  - ");
                out.push_str(text);
            }
        }
    }
    out
}

/// Generic JSON output: a success line plus the per-plugin outputs.
pub fn format_json_output(stage: Stage, value: &serde_json::Value) -> String {
    let mut out = success_line(&format!("{} finished", stage));
    if let Some(object) = value.as_object() {
        for (plugin, output) in object {
            out.push_str(&format!("\n  {}: {}", plugin, compact(output)));
        }
    }
    out
}

fn compact(value: &serde_json::Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
}

/// User-facing message for an error. Partial failures are surfaced
/// distinctly so the caller can tell some steps already completed.
pub fn map_error(err: &CoreError) -> String {
    match err {
        CoreError::UserCancelled => "Cancelled.".to_string(),
        CoreError::ResourceBusy(who) => format!(
            "{} Another operation is running on this project ({}). Try again once it finishes.",
            "✗".red(),
            who
        ),
        CoreError::PartialFailure { source, completed } => {
            let mut out = format!(
                "{} {}. {} step(s) already completed and their outputs were kept:",
                "✗".red(),
                source,
                completed.len()
            );
            for plugin in completed.keys() {
                out.push_str("\n  ✓ ");
                out.push_str(plugin);
            }
            out.push_str("\nFix the cause and re-run to resume from this state.");
            out
        }
        CoreError::NoUpgradeNeeded => {
            format!("{} {}", "✓".green(), "Project is already up to date")
        }
        other => format!("{} {}", "✗".red(), other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use serde_json::json;

    #[test]
    fn partial_failure_names_completed_steps() {
        let mut completed = IndexMap::new();
        completed.insert("web".to_string(), json!({"WEB_URL": "https://web.test"}));
        let err = CoreError::PartialFailure {
            source: Box::new(CoreError::Plugin("bot exploded".to_string())),
            completed,
        };

        let message = map_error(&err);
        assert!(message.contains("web"));
        assert!(message.contains("already completed"));
    }

    #[test]
    fn version_report_renders_all_fields() {
        let report = json!({
            "version": "2.0",
            "source": "manifest",
            "state": "compatible",
            "tracking_id": null,
        });
        let table = format_version_report(&report);
        assert!(table.contains("2.0"));
        assert!(table.contains("compatible"));
    }
}
